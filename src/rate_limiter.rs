// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared rate limiter with one token bucket per endpoint class.
/// Callers are delayed until a permit is available, never dropped.
pub struct ApiRateLimiter {
    limiters: RwLock<HashMap<String, Arc<DirectLimiter>>>,
    default_quota: NonZeroU32,
    quotas: HashMap<String, NonZeroU32>,
}

impl ApiRateLimiter {
    pub fn new() -> Self {
        let mut quotas = HashMap::new();
        // Management reads are generous; auth and write-adjacent classes
        // get tighter buckets.
        quotas.insert("management.read".to_string(), nonzero!(50u32));
        quotas.insert("management.list".to_string(), nonzero!(20u32));
        quotas.insert("auth.token".to_string(), nonzero!(10u32));
        Self {
            limiters: RwLock::new(HashMap::new()),
            default_quota: nonzero!(20u32),
            quotas,
        }
    }

    fn quota_for(&self, label: &str) -> Quota {
        let per_second = self
            .quotas
            .get(label)
            .copied()
            .unwrap_or(self.default_quota);
        Quota::per_second(per_second)
    }

    /// Wait until the endpoint class has capacity
    pub async fn acquire(&self, label: &str) {
        let limiter = {
            let read = self.limiters.read().await;
            read.get(label).cloned()
        };
        let limiter = match limiter {
            Some(l) => l,
            None => {
                let mut write = self.limiters.write().await;
                write
                    .entry(label.to_string())
                    .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota_for(label))))
                    .clone()
            }
        };
        limiter.until_ready().await;
    }

    /// Discard all limiter state. Called at the start of every run so no
    /// throttling window leaks across tenants.
    pub async fn reset(&self) {
        let mut write = self.limiters.write().await;
        let dropped = write.len();
        write.clear();
        debug!(classes = dropped, "rate limiter state reset");
    }

    pub async fn active_classes(&self) -> usize {
        self.limiters.read().await.len()
    }
}

impl Default for ApiRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

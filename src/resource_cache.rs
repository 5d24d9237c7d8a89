// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::errors::EngineResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Per-run resource cache with single-flight fetch collapsing.
///
/// The first caller for a key runs the fetcher; concurrent callers for the
/// same key await the same in-flight computation. Entries are never
/// invalidated mid-run; the whole cache is discarded at run start. Failed
/// fetches are not cached, so a later caller may retry.
pub struct ResourceCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<serde_json::Value>>>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Build a cache key from component identifiers. The unit separator
    /// cannot appear in resource ids or api-version strings, so distinct
    /// component lists never collide.
    pub fn cache_key(parts: &[&str]) -> String {
        parts.join("\u{1f}")
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        fetcher: F,
    ) -> EngineResult<serde_json::Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<serde_json::Value>>,
    {
        let cell = {
            let mut entries = self.entries.lock();
            entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        let value = cell.get_or_try_init(fetcher).await?;
        Ok(value.clone())
    }

    /// Discard everything. Called at the start of every orchestrator run.
    pub fn reset(&self) {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        debug!(entries = dropped, "resource cache reset");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::errors::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const CACHE_TTL: Duration = Duration::from_secs(60);
const FETCH_ATTEMPTS: u32 = 3;
const FETCH_BACKOFF: [Duration; 2] = [Duration::from_millis(500), Duration::from_millis(1000)];

pub const ENV_CLIENT_ID: &str = "VARTIJA_APP_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "VARTIJA_APP_CLIENT_SECRET";

/// The application-level service principal credentials shared by tenants
/// that have not brought their own secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSecret {
    pub client_id: String,
    pub client_secret: String,
}

/// External store holding the central app secret (key vault, config
/// service). The engine only reads it.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch_app_secret(&self) -> Result<AppSecret, AuthError>;

    /// When the secret was last rotated in the store, if the store tracks it
    async fn last_rotated_at(&self) -> Option<DateTime<Utc>>;
}

struct CachedSecret {
    secret: AppSecret,
    filled_at: Instant,
    filled_at_wall: DateTime<Utc>,
}

/// Process-wide cache in front of the central secret store.
///
/// Entries live 60 seconds. A store fetch is attempted three times with
/// 500ms/1000ms backoff; when all attempts fail, environment variables are
/// the fallback, cached only when non-empty so a misconfigured environment
/// does not poison the cache.
pub struct CentralSecretCache {
    store: Box<dyn SecretStore>,
    cached: Mutex<Option<CachedSecret>>,
    fill_lock: tokio::sync::Mutex<()>,
}

impl CentralSecretCache {
    pub fn new(store: Box<dyn SecretStore>) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
            fill_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn cached_fresh(&self) -> Option<AppSecret> {
        let cached = self.cached.lock();
        cached.as_ref().and_then(|entry| {
            if entry.filled_at.elapsed() < CACHE_TTL {
                Some(entry.secret.clone())
            } else {
                None
            }
        })
    }

    /// True when the store reports a rotation after the cache was filled
    pub async fn is_stale(&self) -> bool {
        let filled_at_wall = {
            let cached = self.cached.lock();
            match cached.as_ref() {
                Some(entry) => entry.filled_at_wall,
                None => return false,
            }
        };
        match self.store.last_rotated_at().await {
            Some(rotated) => rotated > filled_at_wall,
            None => false,
        }
    }

    /// Drop the cached entry, forcing the next read to hit the store
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    fn cache(&self, secret: &AppSecret) {
        *self.cached.lock() = Some(CachedSecret {
            secret: secret.clone(),
            filled_at: Instant::now(),
            filled_at_wall: Utc::now(),
        });
    }

    fn env_fallback(&self) -> Option<AppSecret> {
        let client_id = std::env::var(ENV_CLIENT_ID).ok()?;
        let client_secret = std::env::var(ENV_CLIENT_SECRET).ok()?;
        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }
        Some(AppSecret {
            client_id,
            client_secret,
        })
    }

    pub async fn get(&self) -> Result<AppSecret, AuthError> {
        if let Some(secret) = self.cached_fresh() {
            // A rotation after the fill beats the TTL.
            if !self.is_stale().await {
                return Ok(secret);
            }
            debug!("cached app secret rotated in store, refetching");
            self.invalidate();
        }

        // Collapse concurrent fills; the winner populates the cache.
        let _guard = self.fill_lock.lock().await;
        if let Some(secret) = self.cached_fresh() {
            if !self.is_stale().await {
                return Ok(secret);
            }
            self.invalidate();
        }

        let mut last_error = None;
        for attempt in 1..=FETCH_ATTEMPTS {
            match self.store.fetch_app_secret().await {
                Ok(secret) => {
                    self.cache(&secret);
                    debug!(attempt, "central app secret fetched");
                    return Ok(secret);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "central secret fetch failed");
                    last_error = Some(err);
                    if (attempt as usize) <= FETCH_BACKOFF.len() {
                        tokio::time::sleep(FETCH_BACKOFF[attempt as usize - 1]).await;
                    }
                }
            }
        }

        if let Some(secret) = self.env_fallback() {
            warn!("using environment fallback for central app secret");
            self.cache(&secret);
            return Ok(secret);
        }

        Err(last_error
            .unwrap_or_else(|| AuthError::SecretStoreUnavailable("no attempts made".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyStore {
        calls: Arc<AtomicU32>,
        fail_first: u32,
    }

    #[async_trait]
    impl SecretStore for FlakyStore {
        async fn fetch_app_secret(&self) -> Result<AppSecret, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(AuthError::SecretStoreUnavailable("down".into()))
            } else {
                Ok(AppSecret {
                    client_id: "app-id".into(),
                    client_secret: "app-secret".into(),
                })
            }
        }

        async fn last_rotated_at(&self) -> Option<DateTime<Utc>> {
            None
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = CentralSecretCache::new(Box::new(FlakyStore {
            calls: calls.clone(),
            fail_first: 2,
        }));
        let secret = cache.get().await.unwrap();
        assert_eq!(secret.client_id, "app-id");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = CentralSecretCache::new(Box::new(FlakyStore {
            calls: calls.clone(),
            fail_first: 0,
        }));
        cache.get().await.unwrap();
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = CentralSecretCache::new(Box::new(FlakyStore {
            calls: calls.clone(),
            fail_first: 0,
        }));
        cache.get().await.unwrap();
        cache.invalidate();
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct RotatingStore {
        calls: Arc<AtomicU32>,
        rotated_at: Arc<Mutex<Option<DateTime<Utc>>>>,
    }

    #[async_trait]
    impl SecretStore for RotatingStore {
        async fn fetch_app_secret(&self) -> Result<AppSecret, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AppSecret {
                client_id: "app-id".into(),
                client_secret: format!("secret-v{n}"),
            })
        }

        async fn last_rotated_at(&self) -> Option<DateTime<Utc>> {
            *self.rotated_at.lock()
        }
    }

    #[tokio::test]
    async fn test_rotation_marker_beats_ttl() {
        let calls = Arc::new(AtomicU32::new(0));
        let rotated_at = Arc::new(Mutex::new(None));
        let cache = CentralSecretCache::new(Box::new(RotatingStore {
            calls: calls.clone(),
            rotated_at: rotated_at.clone(),
        }));

        let first = cache.get().await.unwrap();
        assert_eq!(first.client_secret, "secret-v1");

        // No rotation yet: still served from cache.
        assert_eq!(cache.get().await.unwrap().client_secret, "secret-v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Store reports a rotation after the cache fill; the next read
        // must refetch even though the TTL has not elapsed.
        *rotated_at.lock() = Some(Utc::now() + chrono::Duration::seconds(1));
        assert!(cache.is_stale().await);
        assert_eq!(cache.get().await.unwrap().client_secret, "secret-v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_fail_without_env() {
        std::env::remove_var(ENV_CLIENT_ID);
        std::env::remove_var(ENV_CLIENT_SECRET);
        let calls = Arc::new(AtomicU32::new(0));
        let cache = CentralSecretCache::new(Box::new(FlakyStore {
            calls: calls.clone(),
            fail_first: 10,
        }));
        assert!(cache.get().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

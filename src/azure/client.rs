// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::backoff::{retry_with_backoff, RetryConfig};
use crate::errors::{EngineError, EngineResult};
use crate::rate_limiter::ApiRateLimiter;
use crate::resource_cache::ResourceCache;
use crate::transport::ApiTransport;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MANAGEMENT_BASE: &str = "https://management.azure.com";

/// Upper bound on continuation pages for one listing. A `nextLink` chain
/// longer than this is treated as a malformed response.
const MAX_PAGES: u32 = 1000;

/// Management API client shared by every scanner in a run.
///
/// Every read goes through the per-run cache (single-flight), the shared
/// rate limiter for its endpoint class, and the retry policy for transient
/// failures, in that order.
pub struct AzureClient {
    transport: Arc<dyn ApiTransport>,
    cache: ResourceCache,
    limiter: ApiRateLimiter,
    retry: RetryConfig,
    base_url: String,
}

impl AzureClient {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            transport,
            cache: ResourceCache::new(),
            limiter: ApiRateLimiter::new(),
            retry: RetryConfig::default(),
            base_url: DEFAULT_MANAGEMENT_BASE.to_string(),
        }
    }

    /// Override the management endpoint, used by tests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Discard cache and limiter state. Called before every orchestrator run
    /// so nothing leaks across runs or tenants.
    pub async fn reset_run_state(&self) {
        self.cache.reset();
        self.limiter.reset().await;
        info!("per-run client state reset");
    }

    async fn fetch_raw(
        &self,
        url: &str,
        label: &str,
        token: &str,
    ) -> EngineResult<serde_json::Value> {
        self.limiter.acquire(label).await;
        let response = self.transport.get(url, Some(token)).await?;
        match response.status {
            status if (200..300).contains(&status) => {
                serde_json::from_str(&response.body).map_err(|e| EngineError::Parse {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            404 => Err(EngineError::NotFound {
                url: url.to_string(),
            }),
            429 => Err(EngineError::Api {
                status: 429,
                url: url.to_string(),
                message: "throttled by provider".to_string(),
            }),
            status => Err(EngineError::Api {
                status,
                url: url.to_string(),
                // Provider bodies are never forwarded
                message: "management API request rejected".to_string(),
            }),
        }
    }

    /// Fetch one URL through cache, limiter, and retry
    pub async fn get_json(
        &self,
        url: &str,
        label: &str,
        token: &str,
    ) -> EngineResult<serde_json::Value> {
        let key = ResourceCache::cache_key(&[label, url]);
        self.cache
            .get_or_fetch(&key, || {
                retry_with_backoff(&self.retry, label, || self.fetch_raw(url, label, token))
            })
            .await
    }

    /// Fetch a single resource by its ARM id with a pinned api-version
    pub async fn get_resource(
        &self,
        token: &str,
        resource_id: &str,
        api_version: &str,
        label: &str,
    ) -> EngineResult<serde_json::Value> {
        let url = format!(
            "{}{}?api-version={}",
            self.base_url, resource_id, api_version
        );
        self.get_json(&url, label, token).await
    }

    /// List a collection, following `nextLink` to exhaustion. Returns the
    /// concatenation of every page's `value` array. Each page is cached
    /// under its full URL.
    pub async fn list_all(
        &self,
        token: &str,
        path: &str,
        api_version: &str,
        label: &str,
    ) -> EngineResult<Vec<serde_json::Value>> {
        let mut url = format!("{}{}?api-version={}", self.base_url, path, api_version);
        let mut items = Vec::new();
        let mut pages = 0u32;

        loop {
            let page = self.get_json(&url, label, token).await?;
            pages += 1;
            if let Some(values) = page.get("value").and_then(|v| v.as_array()) {
                items.extend(values.iter().cloned());
            }
            match page.get("nextLink").and_then(|v| v.as_str()) {
                Some(next) if !next.is_empty() => {
                    // Continuation links must stay on the management host
                    if !self.same_host(next) {
                        return Err(EngineError::Parse {
                            url: next.to_string(),
                            reason: "continuation link leaves the management endpoint"
                                .to_string(),
                        });
                    }
                    if pages >= MAX_PAGES {
                        return Err(EngineError::Parse {
                            url: next.to_string(),
                            reason: format!(
                                "pagination did not terminate after {MAX_PAGES} pages"
                            ),
                        });
                    }
                    url = next.to_string();
                }
                _ => break,
            }
        }

        debug!(path, pages, items = items.len(), "listed collection");
        Ok(items)
    }

    fn same_host(&self, link: &str) -> bool {
        match (url::Url::parse(&self.base_url), url::Url::parse(link)) {
            (Ok(base), Ok(next)) => base.host_str() == next.host_str(),
            _ => false,
        }
    }
}

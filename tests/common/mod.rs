// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use vartija::errors::{EngineError, EngineResult};
use vartija::transport::{ApiResponse, ApiTransport};

/// Counting transport fake. Routes are exact-URL matches; unregistered
/// URLs return 404.
pub struct MockTransport {
    routes: Mutex<HashMap<String, (u16, String)>>,
    post_response: Mutex<Option<(u16, String)>>,
    pub get_calls: AtomicUsize,
    pub post_calls: AtomicUsize,
    pub posts: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl MockTransport {
    pub fn new() -> Self {
        init_tracing();
        Self {
            routes: Mutex::new(HashMap::new()),
            post_response: Mutex::new(None),
            get_calls: AtomicUsize::new(0),
            post_calls: AtomicUsize::new(0),
            posts: Mutex::new(Vec::new()),
        }
    }

    pub fn route(&self, url: &str, status: u16, body: serde_json::Value) {
        self.routes
            .lock()
            .insert(url.to_string(), (status, body.to_string()));
    }

    pub fn set_post_response(&self, status: u16, body: serde_json::Value) {
        *self.post_response.lock() = Some((status, body.to_string()));
    }

    pub fn get_count(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn get(&self, url: &str, _bearer: Option<&str>) -> EngineResult<ApiResponse> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let routes = self.routes.lock();
        match routes.get(url) {
            Some((status, body)) => Ok(ApiResponse {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(ApiResponse {
                status: 404,
                body: r#"{"error":{"code":"ResourceNotFound"}}"#.to_string(),
            }),
        }
    }

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> EngineResult<ApiResponse> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        self.posts.lock().push((
            url.to_string(),
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        match self.post_response.lock().clone() {
            Some((status, body)) => Ok(ApiResponse { status, body }),
            None => Err(EngineError::Network("no post response configured".into())),
        }
    }
}

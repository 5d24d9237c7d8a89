// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Raw response from the management or token endpoint
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> EngineResult<serde_json::Value> {
        serde_json::from_str(&self.body).map_err(|e| EngineError::Parse {
            url: String::new(),
            reason: e.to_string(),
        })
    }
}

/// Seam between the engine and the wire. Production uses a pooled reqwest
/// client; tests substitute counting mocks.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get(&self, url: &str, bearer: Option<&str>) -> EngineResult<ApiResponse>;

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> EngineResult<ApiResponse>;
}

/// Default transport over a shared reqwest client
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(16)
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent("vartija/1.2")
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn get(&self, url: &str, bearer: Option<&str>) -> EngineResult<ApiResponse> {
        debug!(url, "GET");
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;
        Ok(ApiResponse { status, body })
    }

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> EngineResult<ApiResponse> {
        debug!(url, "POST form");
        let response = self
            .client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        let ok = ApiResponse {
            status: 204,
            body: String::new(),
        };
        assert!(ok.is_success());
        let throttled = ApiResponse {
            status: 429,
            body: String::new(),
        };
        assert!(!throttled.is_success());
    }

    #[test]
    fn test_response_json_parse() {
        let response = ApiResponse {
            status: 200,
            body: r#"{"value": []}"#.to_string(),
        };
        let json = response.json().unwrap();
        assert!(json["value"].as_array().unwrap().is_empty());

        let bad = ApiResponse {
            status: 200,
            body: "not json".to_string(),
        };
        assert!(bad.json().is_err());
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

mod app_service;
mod compute;
mod container;
mod cosmos;
mod identity;
mod keyvault;
mod monitoring;
mod network;
mod sql;
mod storage;

pub use app_service::AppServiceScanner;
pub use compute::ComputeScanner;
pub use container::ContainerScanner;
pub use cosmos::CosmosScanner;
pub use identity::IdentityScanner;
pub use keyvault::KeyVaultScanner;
pub use monitoring::MonitoringScanner;
pub use network::NetworkScanner;
pub use sql::SqlScanner;
pub use storage::StorageScanner;

use crate::azure::AzureClient;
use crate::types::{ScanContext, ScanResult, ScannerCategory};
use async_trait::async_trait;
use std::sync::Arc;

/// Contract every scanner plugin implements. `scan` never propagates
/// errors; internal failures are recorded as `ScanError` entries so one
/// bad plugin cannot take down the batch.
#[async_trait]
pub trait Scanner: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> ScannerCategory;
    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult;
}

/// All registered scanners in advisory priority order:
/// identity/network first, then security services, compute, data.
pub fn all_scanners() -> Vec<Arc<dyn Scanner>> {
    vec![
        Arc::new(IdentityScanner),
        Arc::new(NetworkScanner),
        Arc::new(KeyVaultScanner),
        Arc::new(MonitoringScanner),
        Arc::new(ComputeScanner),
        Arc::new(AppServiceScanner),
        Arc::new(ContainerScanner),
        Arc::new(StorageScanner),
        Arc::new(SqlScanner),
        Arc::new(CosmosScanner),
    ]
}

/// Shared accessors for ARM resource JSON
pub(crate) mod arm {
    use serde_json::Value;

    pub fn str_prop<'a>(resource: &'a Value, pointer: &str) -> Option<&'a str> {
        resource.pointer(pointer).and_then(Value::as_str)
    }

    pub fn bool_prop(resource: &Value, pointer: &str) -> Option<bool> {
        resource.pointer(pointer).and_then(Value::as_bool)
    }

    pub fn id(resource: &Value) -> String {
        resource["id"].as_str().unwrap_or_default().to_string()
    }

    pub fn name(resource: &Value) -> String {
        resource["name"].as_str().unwrap_or_default().to_string()
    }

    pub fn location(resource: &Value) -> String {
        resource["location"].as_str().unwrap_or("global").to_string()
    }

    pub fn numbered_remediation(steps: &[&str]) -> String {
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

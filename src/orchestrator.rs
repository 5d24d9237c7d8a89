// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Orchestrator
 *
 * Fans all registered scanners out over a JoinSet, isolates per-scanner
 * failures, and aggregates findings into one run result.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::azure::AzureClient;
use crate::scanners::{all_scanners, Scanner};
use crate::types::{AggregateScanResult, ScanContext, ScanError, ScanResult};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline applied to each scanner individually. A scanner that
    /// exceeds it is recorded as failed without aborting the batch.
    pub scanner_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scanner_timeout: Duration::from_secs(300),
        }
    }
}

pub struct ScanOrchestrator {
    scanners: Vec<Arc<dyn Scanner>>,
    client: Arc<AzureClient>,
    config: OrchestratorConfig,
}

impl ScanOrchestrator {
    pub fn new(client: Arc<AzureClient>) -> Self {
        Self {
            scanners: all_scanners(),
            client,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_scanners(mut self, scanners: Vec<Arc<dyn Scanner>>) -> Self {
        self.scanners = scanners;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run every registered scanner concurrently against one context.
    /// Cache and rate limiter state is discarded before the run starts so
    /// nothing leaks across runs or tenants.
    pub async fn run(&self, ctx: Arc<ScanContext>) -> AggregateScanResult {
        let started = Instant::now();
        self.client.reset_run_state().await;

        info!(
            scanners = self.scanners.len(),
            subscription = %ctx.subscription_id,
            "starting orchestrated scan"
        );

        let mut join_set = JoinSet::new();
        for scanner in &self.scanners {
            let scanner = scanner.clone();
            let client = self.client.clone();
            let ctx = ctx.clone();
            let timeout = self.config.scanner_timeout;
            join_set.spawn(async move {
                let name = scanner.name();
                // Catch panics inside the task so the failure stays
                // attributable to the scanner that raised it.
                let outcome = tokio::time::timeout(
                    timeout,
                    AssertUnwindSafe(scanner.scan(&ctx, &client)).catch_unwind(),
                )
                .await;
                (name, timeout, outcome)
            });
        }

        let mut scanner_results: HashMap<String, ScanResult> = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, _, Ok(Ok(result)))) => {
                    scanner_results.insert(name.to_string(), result);
                }
                Ok((name, _, Ok(Err(_panic)))) => {
                    error!(scanner = name, "scanner panicked");
                    let mut result = ScanResult::default();
                    result.errors.push(ScanError {
                        scanner: name.to_string(),
                        message: "scanner panicked".to_string(),
                        recoverable: false,
                        resource_type: None,
                    });
                    scanner_results.insert(name.to_string(), result);
                }
                Ok((name, timeout, Err(_elapsed))) => {
                    warn!(scanner = name, timeout_secs = timeout.as_secs(), "scanner deadline exceeded");
                    let mut result = ScanResult::default();
                    result.errors.push(ScanError {
                        scanner: name.to_string(),
                        message: format!(
                            "scanner exceeded its {}s deadline",
                            timeout.as_secs()
                        ),
                        recoverable: false,
                        resource_type: None,
                    });
                    scanner_results.insert(name.to_string(), result);
                }
                Err(join_err) => {
                    // Panics are caught in the task, so this only fires if
                    // the runtime aborts the task itself.
                    error!(error = %join_err, "scanner task aborted by runtime");
                }
            }
        }

        let mut findings = Vec::new();
        let mut total_resources_scanned = 0u64;
        let mut scanners_succeeded = 0usize;
        for result in scanner_results.values() {
            findings.extend(result.findings.iter().cloned());
            total_resources_scanned += result.resources_scanned;
            if result.succeeded() {
                scanners_succeeded += 1;
            }
        }
        let scanners_executed = scanner_results.len();
        let scanners_failed = scanners_executed - scanners_succeeded;

        let aggregate = AggregateScanResult {
            findings,
            total_resources_scanned,
            scanner_results,
            total_duration_ms: started.elapsed().as_millis() as u64,
            scanners_executed,
            scanners_succeeded,
            scanners_failed,
        };

        info!(
            findings = aggregate.findings.len(),
            resources = aggregate.total_resources_scanned,
            succeeded = aggregate.scanners_succeeded,
            failed = aggregate.scanners_failed,
            duration_ms = aggregate.total_duration_ms,
            "orchestrated scan completed"
        );
        aggregate
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Managed Kubernetes Configuration Scanner
 *
 * Detects:
 * - Kubernetes RBAC disabled
 * - Public API server endpoint
 * - No network policy configured
 * - Local accounts enabled
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::azure::AzureClient;
use crate::errors::EngineResult;
use crate::scanners::arm;
use crate::scanners::Scanner;
use crate::types::{
    resource_group_from_id, Finding, ScanContext, ScanError, ScanResult, ScannerCategory,
    Severity,
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::info;

const API_VERSION: &str = "2024-01-01";
const RESOURCE_TYPE: &str = "Microsoft.ContainerService/managedClusters";

pub struct ContainerScanner;

#[async_trait]
impl Scanner for ContainerScanner {
    fn name(&self) -> &'static str {
        "container"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::Compute
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting managed cluster configuration scan");
        if let Err(err) = self.scan_clusters(ctx, client, &mut result).await {
            result.errors.push(ScanError {
                scanner: self.name().to_string(),
                message: err.to_string(),
                recoverable: err.is_retryable(),
                resource_type: Some(RESOURCE_TYPE.to_string()),
            });
        }
        result.scan_duration_ms = started.elapsed().as_millis() as u64;

        info!(
            resources = result.resources_scanned,
            findings = result.findings.len(),
            "Managed cluster scan completed"
        );
        result
    }
}

impl ContainerScanner {
    async fn scan_clusters(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, RESOURCE_TYPE
        );
        let clusters = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned = clusters.len() as u64;

        for cluster in &clusters {
            result.findings.extend(self.check_rbac(cluster));
            result.findings.extend(self.check_private_cluster(cluster));
            result.findings.extend(self.check_network_policy(cluster));
            result.findings.extend(self.check_local_accounts(cluster));
        }
        Ok(())
    }

    fn check_rbac(&self, cluster: &Value) -> Option<Finding> {
        if arm::bool_prop(cluster, "/properties/enableRBAC") == Some(false) {
            return Some(self.create_finding(
                cluster,
                Severity::High,
                "Kubernetes RBAC Disabled",
                format!(
                    "Cluster '{}' runs without Kubernetes RBAC; any authenticated \
                     principal has full cluster access.",
                    arm::name(cluster)
                ),
                &[
                    "Recreate the cluster with RBAC enabled (cannot be enabled in place)",
                    "Define roles and bindings for each workload team",
                ],
                &["CIS Azure 10.1", "NIST 800-53 AC-3", "ISO 27001 A.9.4.1"],
            ));
        }
        None
    }

    fn check_private_cluster(&self, cluster: &Value) -> Option<Finding> {
        if arm::bool_prop(cluster, "/properties/apiServerAccessProfile/enablePrivateCluster")
            != Some(true)
        {
            return Some(self.create_finding(
                cluster,
                Severity::Medium,
                "Kubernetes API Server Publicly Reachable",
                format!(
                    "Cluster '{}' exposes its API server on a public endpoint.",
                    arm::name(cluster)
                ),
                &[
                    "Enable private cluster mode, or",
                    "Restrict the API server with authorized IP ranges",
                ],
                &["CIS Azure 10.3", "NIST 800-53 SC-7"],
            ));
        }
        None
    }

    fn check_network_policy(&self, cluster: &Value) -> Option<Finding> {
        let policy = arm::str_prop(cluster, "/properties/networkProfile/networkPolicy");
        if policy.is_none() || policy == Some("none") {
            return Some(self.create_finding(
                cluster,
                Severity::Medium,
                "Kubernetes Cluster Without Network Policy",
                format!(
                    "Cluster '{}' has no network policy plugin; all pods can reach \
                     all other pods.",
                    arm::name(cluster)
                ),
                &[
                    "Enable a network policy plugin (Azure or Calico)",
                    "Define default-deny policies per namespace",
                ],
                &["CIS Azure 10.4", "NIST 800-53 SC-7", "ISO 27001 A.13.1.3"],
            ));
        }
        None
    }

    fn check_local_accounts(&self, cluster: &Value) -> Option<Finding> {
        if arm::bool_prop(cluster, "/properties/disableLocalAccounts") != Some(true) {
            return Some(self.create_finding(
                cluster,
                Severity::Low,
                "Kubernetes Local Accounts Enabled",
                format!(
                    "Cluster '{}' allows local account credentials that bypass \
                     directory-based authentication and audit.",
                    arm::name(cluster)
                ),
                &[
                    "Disable local accounts on the cluster",
                    "Use Azure AD integration for all cluster access",
                ],
                &["CIS Azure 10.5", "NIST 800-53 IA-2"],
            ));
        }
        None
    }

    fn create_finding(
        &self,
        cluster: &Value,
        severity: Severity,
        title: &str,
        description: String,
        remediation_steps: &[&str],
        frameworks: &[&str],
    ) -> Finding {
        let resource_id = arm::id(cluster);
        Finding {
            severity,
            title: title.to_string(),
            description,
            resource_type: RESOURCE_TYPE.to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(cluster),
            region: arm::location(cluster),
            resource_id,
            remediation: arm::numbered_remediation(remediation_steps),
            compliance_frameworks: frameworks.iter().map(|f| f.to_string()).collect(),
        }
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Key Vault Configuration Scanner
 *
 * Detects:
 * - Soft delete disabled
 * - Purge protection disabled
 * - Network rules defaulting to Allow
 * - Legacy access policies instead of RBAC
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

const API_VERSION: &str = "2023-07-01";
const RESOURCE_TYPE: &str = "Microsoft.KeyVault/vaults";

pub struct KeyVaultScanner;

#[async_trait]
impl Scanner for KeyVaultScanner {
    fn name(&self) -> &'static str {
        "keyvault"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::SecurityServices
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting key vault configuration scan");
        if let Err(err) = self.scan_vaults(ctx, client, &mut result).await {
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
            "Key vault scan completed"
        );
        result
    }
}

impl KeyVaultScanner {
    async fn scan_vaults(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, RESOURCE_TYPE
        );
        let vaults = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned = vaults.len() as u64;

        for vault in &vaults {
            result.findings.extend(self.check_soft_delete(vault));
            result.findings.extend(self.check_purge_protection(vault));
            result.findings.extend(self.check_network_default_action(vault));
            result.findings.extend(self.check_rbac_authorization(vault));
        }
        Ok(())
    }

    fn check_soft_delete(&self, vault: &Value) -> Option<Finding> {
        if arm::bool_prop(vault, "/properties/enableSoftDelete") == Some(false) {
            return Some(self.create_finding(
                vault,
                Severity::High,
                "Key Vault Soft Delete Disabled",
                format!(
                    "Key vault '{}' has soft delete disabled. Deleted keys, secrets \
                     and certificates are unrecoverable.",
                    arm::name(vault)
                ),
                &[
                    "Enable soft delete on the vault",
                    "Set a retention period appropriate for your recovery objectives",
                ],
                &["CIS Azure 8.4", "NIST 800-53 CP-9", "ISO 27001 A.12.3.1"],
            ));
        }
        None
    }

    fn check_purge_protection(&self, vault: &Value) -> Option<Finding> {
        if arm::bool_prop(vault, "/properties/enablePurgeProtection") != Some(true) {
            return Some(self.create_finding(
                vault,
                Severity::Medium,
                "Key Vault Purge Protection Disabled",
                format!(
                    "Key vault '{}' can be permanently purged during the soft delete \
                     retention window, defeating the recovery guarantee.",
                    arm::name(vault)
                ),
                &[
                    "Enable purge protection on the vault",
                    "Review role assignments that grant purge permission",
                ],
                &["CIS Azure 8.4", "NIST 800-53 CP-9"],
            ));
        }
        None
    }

    fn check_network_default_action(&self, vault: &Value) -> Option<Finding> {
        if arm::str_prop(vault, "/properties/networkAcls/defaultAction") == Some("Allow") {
            return Some(self.create_finding(
                vault,
                Severity::Medium,
                "Key Vault Accessible From All Networks",
                format!(
                    "Key vault '{}' accepts traffic from all networks by default.",
                    arm::name(vault)
                ),
                &[
                    "Set the network rule default action to Deny",
                    "Add firewall or virtual network rules for known consumers",
                    "Use private endpoints for internal workloads",
                ],
                &["CIS Azure 8.6", "NIST 800-53 AC-4", "ISO 27001 A.13.1.3"],
            ));
        }
        None
    }

    fn check_rbac_authorization(&self, vault: &Value) -> Option<Finding> {
        if arm::bool_prop(vault, "/properties/enableRbacAuthorization") == Some(false) {
            return Some(self.create_finding(
                vault,
                Severity::Low,
                "Key Vault Uses Legacy Access Policies",
                format!(
                    "Key vault '{}' uses vault access policies instead of Azure RBAC \
                     for data plane authorization.",
                    arm::name(vault)
                ),
                &[
                    "Migrate data plane authorization to Azure RBAC",
                    "Remove stale access policy entries after migration",
                ],
                &["CIS Azure 8.5", "NIST 800-53 AC-6"],
            ));
        }
        None
    }

    fn create_finding(
        &self,
        vault: &Value,
        severity: Severity,
        title: &str,
        description: String,
        remediation_steps: &[&str],
        frameworks: &[&str],
    ) -> Finding {
        let resource_id = arm::id(vault);
        Finding {
            severity,
            title: title.to_string(),
            description,
            resource_type: RESOURCE_TYPE.to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(vault),
            region: arm::location(vault),
            resource_id,
            remediation: arm::numbered_remediation(remediation_steps),
            compliance_frameworks: frameworks.iter().map(|f| f.to_string()).collect(),
        }
    }
}

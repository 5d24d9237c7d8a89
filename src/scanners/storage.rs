// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Storage Account Configuration Scanner
 *
 * Detects:
 * - HTTP traffic allowed (secure transfer not required)
 * - Minimum TLS version below 1.2
 * - Blob public access enabled
 * - Network rules defaulting to Allow
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

const API_VERSION: &str = "2023-01-01";
const RESOURCE_TYPE: &str = "Microsoft.Storage/storageAccounts";

pub struct StorageScanner;

#[async_trait]
impl Scanner for StorageScanner {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::Data
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting storage account configuration scan");
        if let Err(err) = self.scan_accounts(ctx, client, &mut result).await {
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
            "Storage account scan completed"
        );
        result
    }
}

impl StorageScanner {
    async fn scan_accounts(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, RESOURCE_TYPE
        );
        let accounts = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned = accounts.len() as u64;

        for account in &accounts {
            result.findings.extend(self.check_https_only(account));
            result.findings.extend(self.check_minimum_tls(account));
            result.findings.extend(self.check_blob_public_access(account));
            result.findings.extend(self.check_network_default_action(account));
        }
        Ok(())
    }

    fn check_https_only(&self, account: &Value) -> Option<Finding> {
        if arm::bool_prop(account, "/properties/supportsHttpsTrafficOnly") == Some(false) {
            return Some(self.create_finding(
                account,
                Severity::High,
                "Storage Account Allows HTTP Traffic",
                format!(
                    "Storage account '{}' accepts unencrypted HTTP connections. \
                     All data in transit to this account can be intercepted.",
                    arm::name(account)
                ),
                &[
                    "Enable 'Secure transfer required' on the storage account",
                    "Update clients still using http:// endpoints",
                    "Enforce the setting subscription-wide with Azure Policy",
                ],
                &["CIS Azure 3.1", "NIST 800-53 SC-8", "ISO 27001 A.10.1.1"],
            ));
        }
        None
    }

    fn check_minimum_tls(&self, account: &Value) -> Option<Finding> {
        let version = arm::str_prop(account, "/properties/minimumTlsVersion")?;
        if matches!(version, "TLS1_0" | "TLS1_1") {
            return Some(self.create_finding(
                account,
                Severity::Medium,
                "Storage Account Accepts Legacy TLS",
                format!(
                    "Storage account '{}' accepts TLS {} connections. Protocol \
                     versions below 1.2 have known weaknesses.",
                    arm::name(account),
                    version.trim_start_matches("TLS").replace('_', ".")
                ),
                &[
                    "Set minimum TLS version to 1.2",
                    "Audit clients for legacy TLS usage before enforcing",
                ],
                &["CIS Azure 3.12", "NIST 800-53 SC-13"],
            ));
        }
        None
    }

    fn check_blob_public_access(&self, account: &Value) -> Option<Finding> {
        if arm::bool_prop(account, "/properties/allowBlobPublicAccess") == Some(true) {
            return Some(self.create_finding(
                account,
                Severity::High,
                "Storage Account Permits Public Blob Access",
                format!(
                    "Storage account '{}' allows containers to be configured for \
                     anonymous public read access.",
                    arm::name(account)
                ),
                &[
                    "Set 'Allow Blob public access' to disabled",
                    "Serve public content through a CDN or dedicated account instead",
                    "Audit existing containers for anonymous access levels",
                ],
                &["CIS Azure 3.7", "NIST 800-53 AC-3", "ISO 27001 A.9.4.1"],
            ));
        }
        None
    }

    fn check_network_default_action(&self, account: &Value) -> Option<Finding> {
        if arm::str_prop(account, "/properties/networkAcls/defaultAction") == Some("Allow") {
            return Some(self.create_finding(
                account,
                Severity::Medium,
                "Storage Account Network Rules Default To Allow",
                format!(
                    "Storage account '{}' accepts traffic from all networks by \
                     default instead of denying unlisted sources.",
                    arm::name(account)
                ),
                &[
                    "Set the network rule default action to Deny",
                    "Add explicit firewall rules or virtual network rules for known clients",
                    "Use private endpoints for internal workloads",
                ],
                &["CIS Azure 3.8", "NIST 800-53 AC-4"],
            ));
        }
        None
    }

    fn create_finding(
        &self,
        account: &Value,
        severity: Severity,
        title: &str,
        description: String,
        remediation_steps: &[&str],
        frameworks: &[&str],
    ) -> Finding {
        let resource_id = arm::id(account);
        Finding {
            severity,
            title: title.to_string(),
            description,
            resource_type: RESOURCE_TYPE.to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(account),
            region: arm::location(account),
            resource_id,
            remediation: arm::numbered_remediation(remediation_steps),
            compliance_frameworks: frameworks.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account(properties: Value) -> Value {
        json!({
            "id": "/subscriptions/s/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/acct1",
            "name": "acct1",
            "location": "westeurope",
            "properties": properties
        })
    }

    #[test]
    fn test_http_allowed_flagged() {
        let scanner = StorageScanner;
        let finding = scanner
            .check_https_only(&account(json!({"supportsHttpsTrafficOnly": false})))
            .unwrap();
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.title, "Storage Account Allows HTTP Traffic");
        assert_eq!(finding.resource_group, "rg1");
        assert!(scanner
            .check_https_only(&account(json!({"supportsHttpsTrafficOnly": true})))
            .is_none());
    }

    #[test]
    fn test_legacy_tls_flagged() {
        let scanner = StorageScanner;
        assert!(scanner
            .check_minimum_tls(&account(json!({"minimumTlsVersion": "TLS1_0"})))
            .is_some());
        assert!(scanner
            .check_minimum_tls(&account(json!({"minimumTlsVersion": "TLS1_2"})))
            .is_none());
    }

    #[test]
    fn test_blob_public_access_flagged() {
        let scanner = StorageScanner;
        assert!(scanner
            .check_blob_public_access(&account(json!({"allowBlobPublicAccess": true})))
            .is_some());
        assert!(scanner
            .check_blob_public_access(&account(json!({"allowBlobPublicAccess": false})))
            .is_none());
    }

    #[test]
    fn test_network_default_allow_flagged() {
        let scanner = StorageScanner;
        assert!(scanner
            .check_network_default_action(&account(
                json!({"networkAcls": {"defaultAction": "Allow"}})
            ))
            .is_some());
        assert!(scanner
            .check_network_default_action(&account(
                json!({"networkAcls": {"defaultAction": "Deny"}})
            ))
            .is_none());
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - App Service Configuration Scanner
 *
 * Detects:
 * - HTTPS-only disabled
 * - Minimum TLS version below 1.2
 * - Unencrypted FTP deployments allowed
 * - No managed identity assigned
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
use tracing::{debug, info};

const API_VERSION: &str = "2023-01-01";
const RESOURCE_TYPE: &str = "Microsoft.Web/sites";

pub struct AppServiceScanner;

#[async_trait]
impl Scanner for AppServiceScanner {
    fn name(&self) -> &'static str {
        "app_service"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::Compute
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting app service configuration scan");
        if let Err(err) = self.scan_sites(ctx, client, &mut result).await {
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
            "App service scan completed"
        );
        result
    }
}

impl AppServiceScanner {
    async fn scan_sites(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, RESOURCE_TYPE
        );
        let sites = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned = sites.len() as u64;

        for site in &sites {
            result.findings.extend(self.check_https_only(site));
            result.findings.extend(self.check_managed_identity(site));
            self.check_site_config(ctx, client, site, result).await;
        }
        Ok(())
    }

    fn check_https_only(&self, site: &Value) -> Option<Finding> {
        if arm::bool_prop(site, "/properties/httpsOnly") != Some(true) {
            return Some(self.create_finding(
                site,
                Severity::High,
                "App Service Accepts HTTP Traffic",
                format!(
                    "App service '{}' serves traffic over unencrypted HTTP.",
                    arm::name(site)
                ),
                &[
                    "Enable 'HTTPS Only' on the app",
                    "Verify custom domains have valid TLS bindings",
                ],
                &["CIS Azure 9.2", "NIST 800-53 SC-8", "ISO 27001 A.10.1.1"],
            ));
        }
        None
    }

    fn check_managed_identity(&self, site: &Value) -> Option<Finding> {
        let identity_type = site.pointer("/identity/type").and_then(Value::as_str);
        if identity_type.is_none() || identity_type == Some("None") {
            return Some(self.create_finding(
                site,
                Severity::Low,
                "App Service Without Managed Identity",
                format!(
                    "App service '{}' has no managed identity; credentials to other \
                     services are likely stored in app settings.",
                    arm::name(site)
                ),
                &[
                    "Assign a system-assigned managed identity",
                    "Replace connection strings and keys with identity-based access",
                ],
                &["CIS Azure 9.5", "NIST 800-53 IA-2"],
            ));
        }
        None
    }

    /// Site config lives at a child endpoint; fetched through the shared
    /// cache keyed by the config resource id.
    async fn check_site_config(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        site: &Value,
        result: &mut ScanResult,
    ) {
        let resource_id = format!("{}/config/web", arm::id(site));
        let config = match client
            .get_resource(&ctx.access_token, &resource_id, API_VERSION, "management.read")
            .await
        {
            Ok(config) => config,
            Err(err) => {
                debug!(site = %arm::name(site), error = %err, "site config fetch failed");
                result.errors.push(ScanError {
                    scanner: "app_service".to_string(),
                    message: format!("site configuration unavailable: {err}"),
                    recoverable: err.is_retryable(),
                    resource_type: Some("config/web".to_string()),
                });
                return;
            }
        };

        if let Some(version) = arm::str_prop(&config, "/properties/minTlsVersion") {
            if matches!(version, "1.0" | "1.1") {
                result.findings.push(self.create_finding(
                    site,
                    Severity::Medium,
                    "App Service Accepts Legacy TLS",
                    format!(
                        "App service '{}' accepts TLS {} connections.",
                        arm::name(site),
                        version
                    ),
                    &["Set the minimum TLS version to 1.2"],
                    &["CIS Azure 9.3", "NIST 800-53 SC-13"],
                ));
            }
        }

        if arm::str_prop(&config, "/properties/ftpsState") == Some("AllAllowed") {
            result.findings.push(self.create_finding(
                site,
                Severity::Medium,
                "App Service Allows Unencrypted FTP",
                format!(
                    "App service '{}' accepts plain FTP deployments.",
                    arm::name(site)
                ),
                &[
                    "Set the FTP state to 'FTPS Only' or 'Disabled'",
                    "Prefer deployment through the platform's build service or CI pipelines",
                ],
                &["CIS Azure 9.4", "NIST 800-53 SC-8"],
            ));
        }
    }

    fn create_finding(
        &self,
        site: &Value,
        severity: Severity,
        title: &str,
        description: String,
        remediation_steps: &[&str],
        frameworks: &[&str],
    ) -> Finding {
        let resource_id = arm::id(site);
        Finding {
            severity,
            title: title.to_string(),
            description,
            resource_type: RESOURCE_TYPE.to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(site),
            region: arm::location(site),
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

    fn site(value: Value) -> Value {
        let mut base = json!({
            "id": "/subscriptions/s/resourceGroups/web-rg/providers/Microsoft.Web/sites/app1",
            "name": "app1",
            "location": "westeurope"
        });
        if let (Some(base_map), Some(extra)) = (base.as_object_mut(), value.as_object()) {
            for (k, v) in extra {
                base_map.insert(k.clone(), v.clone());
            }
        }
        base
    }

    #[test]
    fn test_https_only_missing_or_false_flagged() {
        let scanner = AppServiceScanner;
        assert!(scanner
            .check_https_only(&site(json!({"properties": {"httpsOnly": false}})))
            .is_some());
        assert!(scanner
            .check_https_only(&site(json!({"properties": {}})))
            .is_some());
        assert!(scanner
            .check_https_only(&site(json!({"properties": {"httpsOnly": true}})))
            .is_none());
    }

    #[test]
    fn test_managed_identity() {
        let scanner = AppServiceScanner;
        assert!(scanner.check_managed_identity(&site(json!({}))).is_some());
        assert!(scanner
            .check_managed_identity(&site(json!({"identity": {"type": "None"}})))
            .is_some());
        assert!(scanner
            .check_managed_identity(&site(json!({"identity": {"type": "SystemAssigned"}})))
            .is_none());
    }
}

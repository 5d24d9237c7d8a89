// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - SQL Server Configuration Scanner
 *
 * Detects:
 * - Minimum TLS version below 1.2
 * - Public network access enabled
 * - Auditing disabled or retention below 90 days
 * - Service-managed TDE protector instead of customer-managed keys
 * - Firewall rule spanning the whole IPv4 range
 *
 * Databases are enumerated per server; system databases are skipped.
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

const API_VERSION: &str = "2021-11-01";
const RESOURCE_TYPE: &str = "Microsoft.Sql/servers";
const MIN_AUDIT_RETENTION_DAYS: i64 = 90;

/// Provider-managed databases that carry no tenant configuration
const SYSTEM_DATABASES: &[&str] = &["master"];

pub struct SqlScanner;

#[async_trait]
impl Scanner for SqlScanner {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::Data
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting SQL server configuration scan");
        if let Err(err) = self.scan_servers(ctx, client, &mut result).await {
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
            errors = result.errors.len(),
            "SQL server scan completed"
        );
        result
    }
}

impl SqlScanner {
    async fn scan_servers(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, RESOURCE_TYPE
        );
        let servers = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned = servers.len() as u64;

        for server in &servers {
            result.findings.extend(self.check_minimal_tls(server));
            result.findings.extend(self.check_public_network_access(server));

            // Secondary per-server fetches go through the shared cache, so
            // two scanners inspecting the same server fetch each child once.
            self.check_auditing(ctx, client, server, result).await;
            self.check_tde_protector(ctx, client, server, result).await;
            self.check_firewall_rules(ctx, client, server, result).await;
            self.scan_databases(ctx, client, server, result).await;
        }
        Ok(())
    }

    fn check_minimal_tls(&self, server: &Value) -> Option<Finding> {
        let version = arm::str_prop(server, "/properties/minimalTlsVersion")?;
        if matches!(version, "1.0" | "1.1") {
            return Some(self.create_finding(
                server,
                Severity::Medium,
                "SQL Server Accepts Legacy TLS",
                format!(
                    "SQL server '{}' accepts TLS {} connections.",
                    arm::name(server),
                    version
                ),
                &[
                    "Set the minimal TLS version to 1.2",
                    "Audit client drivers for legacy TLS usage before enforcing",
                ],
                &["CIS Azure 4.1.5", "NIST 800-53 SC-13"],
            ));
        }
        None
    }

    fn check_public_network_access(&self, server: &Value) -> Option<Finding> {
        if arm::str_prop(server, "/properties/publicNetworkAccess") == Some("Enabled") {
            return Some(self.create_finding(
                server,
                Severity::Medium,
                "SQL Server Allows Public Network Access",
                format!(
                    "SQL server '{}' is reachable from public networks.",
                    arm::name(server)
                ),
                &[
                    "Disable public network access",
                    "Use private endpoints for application connectivity",
                    "If public access is required, scope firewall rules tightly",
                ],
                &["CIS Azure 4.1.2", "NIST 800-53 AC-4", "ISO 27001 A.13.1.3"],
            ));
        }
        None
    }

    async fn check_auditing(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        server: &Value,
        result: &mut ScanResult,
    ) {
        let server_id = arm::id(server);
        let resource_id = format!("{}/auditingSettings/default", server_id);
        let settings = match client
            .get_resource(&ctx.access_token, &resource_id, API_VERSION, "management.read")
            .await
        {
            Ok(settings) => settings,
            Err(err) => {
                debug!(server = %arm::name(server), error = %err, "auditing settings fetch failed");
                result.errors.push(ScanError {
                    scanner: "sql".to_string(),
                    message: format!("auditing settings unavailable: {err}"),
                    recoverable: err.is_retryable(),
                    resource_type: Some("auditingSettings".to_string()),
                });
                return;
            }
        };

        let enabled = arm::str_prop(&settings, "/properties/state") == Some("Enabled");
        let retention = settings
            .pointer("/properties/retentionDays")
            .and_then(Value::as_i64)
            .unwrap_or(0);

        if !enabled {
            result.findings.push(self.create_finding(
                server,
                Severity::Medium,
                "SQL Server Auditing Disabled",
                format!(
                    "SQL server '{}' has auditing disabled. Access to databases is \
                     not being recorded.",
                    arm::name(server)
                ),
                &[
                    "Enable server-level auditing",
                    "Send audit logs to a Log Analytics workspace or storage account",
                ],
                &["CIS Azure 4.1.1", "NIST 800-53 AU-2", "ISO 27001 A.12.4.1"],
            ));
        } else if retention != 0 && retention < MIN_AUDIT_RETENTION_DAYS {
            result.findings.push(self.create_finding(
                server,
                Severity::Low,
                "SQL Server Audit Retention Below 90 Days",
                format!(
                    "SQL server '{}' keeps audit logs for {} days.",
                    arm::name(server),
                    retention
                ),
                &["Set audit log retention to at least 90 days"],
                &["CIS Azure 4.1.6", "NIST 800-53 AU-11"],
            ));
        }
    }

    async fn check_tde_protector(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        server: &Value,
        result: &mut ScanResult,
    ) {
        let resource_id = format!("{}/encryptionProtector/current", arm::id(server));
        let protector = match client
            .get_resource(&ctx.access_token, &resource_id, API_VERSION, "management.read")
            .await
        {
            Ok(protector) => protector,
            Err(err) => {
                debug!(server = %arm::name(server), error = %err, "encryption protector fetch failed");
                result.errors.push(ScanError {
                    scanner: "sql".to_string(),
                    message: format!("encryption protector unavailable: {err}"),
                    recoverable: err.is_retryable(),
                    resource_type: Some("encryptionProtector".to_string()),
                });
                return;
            }
        };

        if arm::str_prop(&protector, "/properties/serverKeyType") != Some("AzureKeyVault") {
            result.findings.push(self.create_finding(
                server,
                Severity::Low,
                "SQL Server TDE Uses Service-Managed Key",
                format!(
                    "SQL server '{}' uses a service-managed key for transparent data \
                     encryption instead of a customer-managed key.",
                    arm::name(server)
                ),
                &[
                    "Configure a customer-managed key in Key Vault as the TDE protector",
                    "Enable soft delete and purge protection on the vault holding the key",
                ],
                &["CIS Azure 4.5", "NIST 800-53 SC-12"],
            ));
        }
    }

    async fn check_firewall_rules(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        server: &Value,
        result: &mut ScanResult,
    ) {
        let path = format!("{}/firewallRules", arm::id(server));
        let rules = match client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.read")
            .await
        {
            Ok(rules) => rules,
            Err(err) => {
                debug!(server = %arm::name(server), error = %err, "firewall rules fetch failed");
                result.errors.push(ScanError {
                    scanner: "sql".to_string(),
                    message: format!("firewall rules unavailable: {err}"),
                    recoverable: err.is_retryable(),
                    resource_type: Some("firewallRules".to_string()),
                });
                return;
            }
        };

        for rule in &rules {
            let start = arm::str_prop(rule, "/properties/startIpAddress");
            let end = arm::str_prop(rule, "/properties/endIpAddress");
            if start == Some("0.0.0.0") && end == Some("255.255.255.255") {
                result.findings.push(self.create_finding(
                    server,
                    Severity::Critical,
                    "SQL Server Firewall Open To All Addresses",
                    format!(
                        "SQL server '{}' firewall rule '{}' spans 0.0.0.0 to \
                         255.255.255.255, admitting every IPv4 address.",
                        arm::name(server),
                        arm::name(rule)
                    ),
                    &[
                        "Delete the open firewall rule",
                        "Add rules only for the specific client address ranges required",
                        "Review server audit logs for unexpected source addresses",
                    ],
                    &["CIS Azure 4.1.2", "NIST 800-53 SC-7", "ISO 27001 A.13.1.1"],
                ));
            }
        }
    }

    async fn scan_databases(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        server: &Value,
        result: &mut ScanResult,
    ) {
        let path = format!("{}/databases", arm::id(server));
        let databases = match client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.read")
            .await
        {
            Ok(databases) => databases,
            Err(err) => {
                debug!(server = %arm::name(server), error = %err, "database listing failed");
                result.errors.push(ScanError {
                    scanner: "sql".to_string(),
                    message: format!("database listing unavailable: {err}"),
                    recoverable: err.is_retryable(),
                    resource_type: Some("databases".to_string()),
                });
                return;
            }
        };

        for database in &databases {
            let name = arm::name(database);
            if SYSTEM_DATABASES.contains(&name.as_str()) {
                continue;
            }
            result.resources_scanned += 1;

            if arm::str_prop(
                database,
                "/properties/transparentDataEncryption/status",
            ) == Some("Disabled")
            {
                result.findings.push(self.create_finding(
                    database,
                    Severity::High,
                    "Database Transparent Data Encryption Disabled",
                    format!("Database '{}' is stored without encryption at rest.", name),
                    &["Enable transparent data encryption on the database"],
                    &["CIS Azure 4.1.4", "NIST 800-53 SC-28"],
                ));
            }
        }
    }

    fn create_finding(
        &self,
        resource: &Value,
        severity: Severity,
        title: &str,
        description: String,
        remediation_steps: &[&str],
        frameworks: &[&str],
    ) -> Finding {
        let resource_id = arm::id(resource);
        Finding {
            severity,
            title: title.to_string(),
            description,
            resource_type: resource["type"]
                .as_str()
                .unwrap_or(RESOURCE_TYPE)
                .to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(resource),
            region: arm::location(resource),
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

    fn server(properties: Value) -> Value {
        json!({
            "id": "/subscriptions/s/resourceGroups/db-rg/providers/Microsoft.Sql/servers/sql1",
            "name": "sql1",
            "type": "Microsoft.Sql/servers",
            "location": "westeurope",
            "properties": properties
        })
    }

    #[test]
    fn test_legacy_tls_flagged() {
        let scanner = SqlScanner;
        assert!(scanner
            .check_minimal_tls(&server(json!({"minimalTlsVersion": "1.0"})))
            .is_some());
        assert!(scanner
            .check_minimal_tls(&server(json!({"minimalTlsVersion": "1.2"})))
            .is_none());
    }

    #[test]
    fn test_public_access_flagged() {
        let scanner = SqlScanner;
        let finding = scanner
            .check_public_network_access(&server(json!({"publicNetworkAccess": "Enabled"})))
            .unwrap();
        assert_eq!(finding.severity, Severity::Medium);
        assert!(scanner
            .check_public_network_access(&server(json!({"publicNetworkAccess": "Disabled"})))
            .is_none());
    }

    #[test]
    fn test_system_database_names() {
        assert!(SYSTEM_DATABASES.contains(&"master"));
        assert!(!SYSTEM_DATABASES.contains(&"orders"));
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Network Security Group Scanner
 *
 * Detects:
 * - SSH (22) open to the internet
 * - RDP (3389) open to the internet
 * - All ports open to the internet
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

const API_VERSION: &str = "2023-09-01";
const RESOURCE_TYPE: &str = "Microsoft.Network/networkSecurityGroups";

pub struct NetworkScanner;

#[async_trait]
impl Scanner for NetworkScanner {
    fn name(&self) -> &'static str {
        "network"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::Network
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting network security group scan");
        if let Err(err) = self.scan_groups(ctx, client, &mut result).await {
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
            "Network security group scan completed"
        );
        result
    }
}

impl NetworkScanner {
    async fn scan_groups(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, RESOURCE_TYPE
        );
        let groups = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned = groups.len() as u64;

        for group in &groups {
            result.findings.extend(self.check_inbound_rules(group));
        }
        Ok(())
    }

    fn check_inbound_rules(&self, group: &Value) -> Vec<Finding> {
        let mut findings = Vec::new();
        let rules = group
            .pointer("/properties/securityRules")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for rule in &rules {
            if !Self::is_internet_inbound_allow(rule) {
                continue;
            }
            let rule_name = arm::name(rule);
            let port = arm::str_prop(rule, "/properties/destinationPortRange").unwrap_or("");

            if Self::rule_covers_port(rule, "22") {
                findings.push(self.create_finding(
                    group,
                    Severity::High,
                    "SSH Exposed To The Internet",
                    format!(
                        "Security group '{}' rule '{}' allows inbound SSH (port 22) \
                         from any internet source.",
                        arm::name(group),
                        rule_name
                    ),
                    &[
                        "Restrict the source to known management IP ranges",
                        "Use Azure Bastion or a jump host for administrative access",
                        "Enable just-in-time VM access where available",
                    ],
                    &["CIS Azure 6.1", "NIST 800-53 AC-17", "ISO 27001 A.13.1.1"],
                ));
            }
            if Self::rule_covers_port(rule, "3389") {
                findings.push(self.create_finding(
                    group,
                    Severity::High,
                    "RDP Exposed To The Internet",
                    format!(
                        "Security group '{}' rule '{}' allows inbound RDP (port 3389) \
                         from any internet source.",
                        arm::name(group),
                        rule_name
                    ),
                    &[
                        "Restrict the source to known management IP ranges",
                        "Use Azure Bastion for remote desktop sessions",
                        "Enable just-in-time VM access where available",
                    ],
                    &["CIS Azure 6.2", "NIST 800-53 AC-17", "ISO 27001 A.13.1.1"],
                ));
            }
            if port == "*" {
                findings.push(self.create_finding(
                    group,
                    Severity::Critical,
                    "All Ports Exposed To The Internet",
                    format!(
                        "Security group '{}' rule '{}' allows inbound traffic on every \
                         port from any internet source.",
                        arm::name(group),
                        rule_name
                    ),
                    &[
                        "Remove or scope the rule to the specific ports required",
                        "Restrict the source address prefix to trusted ranges",
                        "Review flow logs for traffic that already reached exposed services",
                    ],
                    &["CIS Azure 6.2", "NIST 800-53 SC-7", "ISO 27001 A.13.1.3"],
                ));
            }
        }
        findings
    }

    fn is_internet_inbound_allow(rule: &Value) -> bool {
        let props = &rule["properties"];
        props["direction"].as_str() == Some("Inbound")
            && props["access"].as_str() == Some("Allow")
            && matches!(
                props["sourceAddressPrefix"].as_str(),
                Some("*") | Some("0.0.0.0/0") | Some("Internet")
            )
    }

    fn rule_covers_port(rule: &Value, port: &str) -> bool {
        match arm::str_prop(rule, "/properties/destinationPortRange") {
            Some("*") => true,
            Some(range) if range == port => true,
            Some(range) if range.contains('-') => {
                let mut bounds = range.splitn(2, '-');
                match (
                    bounds.next().and_then(|s| s.parse::<u32>().ok()),
                    bounds.next().and_then(|s| s.parse::<u32>().ok()),
                    port.parse::<u32>().ok(),
                ) {
                    (Some(low), Some(high), Some(p)) => low <= p && p <= high,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn create_finding(
        &self,
        group: &Value,
        severity: Severity,
        title: &str,
        description: String,
        remediation_steps: &[&str],
        frameworks: &[&str],
    ) -> Finding {
        let resource_id = arm::id(group);
        Finding {
            severity,
            title: title.to_string(),
            description,
            resource_type: RESOURCE_TYPE.to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(group),
            region: arm::location(group),
            resource_id,
            remediation: arm::numbered_remediation(remediation_steps),
            compliance_frameworks: frameworks.iter().map(|f| f.to_string()).collect(),
        }
    }
}

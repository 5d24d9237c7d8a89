// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Cosmos DB Configuration Scanner
 *
 * Detects:
 * - Public network access with no firewall or virtual network filter
 * - Public network access enabled at all
 * - Automatic failover disabled
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

const API_VERSION: &str = "2023-11-15";
const RESOURCE_TYPE: &str = "Microsoft.DocumentDB/databaseAccounts";

pub struct CosmosScanner;

#[async_trait]
impl Scanner for CosmosScanner {
    fn name(&self) -> &'static str {
        "cosmos"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::Data
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting Cosmos DB configuration scan");
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
            "Cosmos DB scan completed"
        );
        result
    }
}

impl CosmosScanner {
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
            result.findings.extend(self.check_network_exposure(account));
            result.findings.extend(self.check_automatic_failover(account));
        }
        Ok(())
    }

    fn check_network_exposure(&self, account: &Value) -> Option<Finding> {
        if arm::str_prop(account, "/properties/publicNetworkAccess") != Some("Enabled") {
            return None;
        }

        let has_ip_rules = account
            .pointer("/properties/ipRules")
            .and_then(Value::as_array)
            .map(|rules| !rules.is_empty())
            .unwrap_or(false);
        let vnet_filter =
            arm::bool_prop(account, "/properties/isVirtualNetworkFilterEnabled")
                .unwrap_or(false);

        if !has_ip_rules && !vnet_filter {
            // Enabled with no filter at all: open to the internet.
            return Some(self.create_finding(
                account,
                Severity::High,
                "Cosmos DB Account Open To All Networks",
                format!(
                    "Cosmos DB account '{}' allows public network access with no IP \
                     rules and no virtual network filter.",
                    arm::name(account)
                ),
                &[
                    "Disable public network access and use private endpoints, or",
                    "Add IP firewall rules for the specific client ranges required",
                    "Enable the virtual network filter for in-network workloads",
                ],
                &["CIS Azure 4.4", "NIST 800-53 AC-4", "ISO 27001 A.13.1.3"],
            ));
        }

        Some(self.create_finding(
            account,
            Severity::Medium,
            "Cosmos DB Account Allows Public Network Access",
            format!(
                "Cosmos DB account '{}' is reachable over public networks, limited \
                 only by its firewall configuration.",
                arm::name(account)
            ),
            &[
                "Disable public network access",
                "Use private endpoints for application connectivity",
            ],
            &["CIS Azure 4.4", "NIST 800-53 AC-4"],
        ))
    }

    fn check_automatic_failover(&self, account: &Value) -> Option<Finding> {
        if arm::bool_prop(account, "/properties/enableAutomaticFailover") != Some(true) {
            return Some(self.create_finding(
                account,
                Severity::Low,
                "Cosmos DB Automatic Failover Disabled",
                format!(
                    "Cosmos DB account '{}' will not fail over automatically during \
                     a regional outage.",
                    arm::name(account)
                ),
                &[
                    "Enable automatic failover on the account",
                    "Configure at least one secondary read region",
                ],
                &["NIST 800-53 CP-10", "ISO 27001 A.17.1.2"],
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

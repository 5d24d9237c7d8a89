// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Monitoring Coverage Scanner
 *
 * Detects:
 * - No activity log profile configured
 * - Log retention below 90 days
 * - Log profile not covering all regions
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

const API_VERSION: &str = "2016-03-01";
const RESOURCE_TYPE: &str = "microsoft.insights/logprofiles";
const MIN_RETENTION_DAYS: i64 = 90;

pub struct MonitoringScanner;

#[async_trait]
impl Scanner for MonitoringScanner {
    fn name(&self) -> &'static str {
        "monitoring"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::SecurityServices
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting monitoring coverage scan");
        if let Err(err) = self.scan_log_profiles(ctx, client, &mut result).await {
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
            "Monitoring scan completed"
        );
        result
    }
}

impl MonitoringScanner {
    async fn scan_log_profiles(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, RESOURCE_TYPE
        );
        let profiles = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned = profiles.len() as u64;

        if profiles.is_empty() {
            result.findings.push(Finding {
                severity: Severity::Medium,
                title: "No Activity Log Profile Configured".to_string(),
                description: "The subscription has no activity log profile. Control \
                              plane operations are not being exported or retained."
                    .to_string(),
                resource_type: RESOURCE_TYPE.to_string(),
                resource_id: format!("/subscriptions/{}", ctx.subscription_id),
                resource_name: ctx.subscription_id.clone(),
                resource_group: String::new(),
                region: "global".to_string(),
                remediation: arm::numbered_remediation(&[
                    "Create a log profile or diagnostic setting exporting the activity log",
                    "Retain exported logs for at least 90 days",
                ]),
                compliance_frameworks: vec![
                    "CIS Azure 5.1.1".to_string(),
                    "NIST 800-53 AU-2".to_string(),
                    "ISO 27001 A.12.4.1".to_string(),
                ],
            });
            return Ok(());
        }

        for profile in &profiles {
            result.findings.extend(self.check_retention(profile));
            result.findings.extend(self.check_region_coverage(ctx, profile));
        }
        Ok(())
    }

    fn check_retention(&self, profile: &Value) -> Option<Finding> {
        let enabled =
            arm::bool_prop(profile, "/properties/retentionPolicy/enabled").unwrap_or(false);
        let days = profile
            .pointer("/properties/retentionPolicy/days")
            .and_then(Value::as_i64)
            .unwrap_or(0);

        // days == 0 with retention enabled means keep forever
        if !enabled || (days > 0 && days < MIN_RETENTION_DAYS) {
            return Some(self.create_finding(
                profile,
                Severity::Medium,
                "Activity Log Retention Below 90 Days",
                format!(
                    "Log profile '{}' retains activity logs for {} days.",
                    arm::name(profile),
                    if enabled { days } else { 0 }
                ),
                &[
                    "Enable the retention policy on the log profile",
                    "Set retention to at least 90 days, or 0 for indefinite retention",
                ],
                &["CIS Azure 5.1.2", "NIST 800-53 AU-11"],
            ));
        }
        None
    }

    fn check_region_coverage(&self, ctx: &ScanContext, profile: &Value) -> Option<Finding> {
        let locations: Vec<&str> = profile
            .pointer("/properties/locations")
            .and_then(Value::as_array)
            .map(|l| l.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        if locations.contains(&"global") {
            return None;
        }
        let missing: Vec<&str> = ctx
            .regions
            .iter()
            .map(String::as_str)
            .filter(|region| !locations.contains(region))
            .collect();
        if missing.is_empty() {
            return None;
        }

        Some(self.create_finding(
            profile,
            Severity::Low,
            "Activity Log Profile Missing Regions",
            format!(
                "Log profile '{}' does not cover regions: {}.",
                arm::name(profile),
                missing.join(", ")
            ),
            &["Include all active regions plus 'global' in the log profile locations"],
            &["CIS Azure 5.1.3", "NIST 800-53 AU-2"],
        ))
    }

    fn create_finding(
        &self,
        profile: &Value,
        severity: Severity,
        title: &str,
        description: String,
        remediation_steps: &[&str],
        frameworks: &[&str],
    ) -> Finding {
        let resource_id = arm::id(profile);
        Finding {
            severity,
            title: title.to_string(),
            description,
            resource_type: RESOURCE_TYPE.to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(profile),
            region: "global".to_string(),
            resource_id,
            remediation: arm::numbered_remediation(remediation_steps),
            compliance_frameworks: frameworks.iter().map(|f| f.to_string()).collect(),
        }
    }
}

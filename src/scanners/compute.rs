// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Virtual Machine Configuration Scanner
 *
 * Detects:
 * - Unmanaged OS disks
 * - Encryption at host disabled
 * - Linux password authentication enabled
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
const RESOURCE_TYPE: &str = "Microsoft.Compute/virtualMachines";

pub struct ComputeScanner;

#[async_trait]
impl Scanner for ComputeScanner {
    fn name(&self) -> &'static str {
        "compute"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::Compute
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting virtual machine configuration scan");
        if let Err(err) = self.scan_machines(ctx, client, &mut result).await {
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
            "Virtual machine scan completed"
        );
        result
    }
}

impl ComputeScanner {
    async fn scan_machines(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, RESOURCE_TYPE
        );
        let machines = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned = machines.len() as u64;

        for machine in &machines {
            result.findings.extend(self.check_managed_disks(machine));
            result.findings.extend(self.check_encryption_at_host(machine));
            result.findings.extend(self.check_password_authentication(machine));
        }
        Ok(())
    }

    fn check_managed_disks(&self, machine: &Value) -> Option<Finding> {
        // An unmanaged disk carries a vhd URI instead of a managedDisk block
        let os_disk = machine.pointer("/properties/storageProfile/osDisk")?;
        if os_disk.get("managedDisk").is_none() && os_disk.get("vhd").is_some() {
            return Some(self.create_finding(
                machine,
                Severity::Medium,
                "Virtual Machine Uses Unmanaged Disks",
                format!(
                    "Virtual machine '{}' stores its OS disk as an unmanaged VHD, \
                     outside platform-managed encryption and reliability guarantees.",
                    arm::name(machine)
                ),
                &[
                    "Migrate the VM to managed disks",
                    "Remove the legacy storage account once migration completes",
                ],
                &["CIS Azure 7.2", "NIST 800-53 SC-28"],
            ));
        }
        None
    }

    fn check_encryption_at_host(&self, machine: &Value) -> Option<Finding> {
        if arm::bool_prop(machine, "/properties/securityProfile/encryptionAtHost") != Some(true)
        {
            return Some(self.create_finding(
                machine,
                Severity::Low,
                "Virtual Machine Encryption At Host Disabled",
                format!(
                    "Virtual machine '{}' does not encrypt data on the host, leaving \
                     temp disks and disk caches unencrypted.",
                    arm::name(machine)
                ),
                &[
                    "Enable encryption at host on the VM",
                    "Confirm the VM size supports the feature before enabling",
                ],
                &["CIS Azure 7.3", "NIST 800-53 SC-28"],
            ));
        }
        None
    }

    fn check_password_authentication(&self, machine: &Value) -> Option<Finding> {
        let linux = machine.pointer("/properties/osProfile/linuxConfiguration")?;
        if linux["disablePasswordAuthentication"].as_bool() == Some(false) {
            return Some(self.create_finding(
                machine,
                Severity::Medium,
                "Linux VM Allows Password Authentication",
                format!(
                    "Virtual machine '{}' accepts SSH password logins instead of \
                     requiring key-based authentication.",
                    arm::name(machine)
                ),
                &[
                    "Disable password authentication in the Linux configuration",
                    "Distribute SSH keys through the platform or configuration management",
                    "Rotate any passwords that were in use",
                ],
                &["CIS Azure 7.4", "NIST 800-53 IA-2", "ISO 27001 A.9.4.2"],
            ));
        }
        None
    }

    fn create_finding(
        &self,
        machine: &Value,
        severity: Severity,
        title: &str,
        description: String,
        remediation_steps: &[&str],
        frameworks: &[&str],
    ) -> Finding {
        let resource_id = arm::id(machine);
        Finding {
            severity,
            title: title.to_string(),
            description,
            resource_type: RESOURCE_TYPE.to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(machine),
            region: arm::location(machine),
            resource_id,
            remediation: arm::numbered_remediation(remediation_steps),
            compliance_frameworks: frameworks.iter().map(|f| f.to_string()).collect(),
        }
    }
}

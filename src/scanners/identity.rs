// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Identity & Access Scanner
 *
 * Detects:
 * - Owner role assigned to service principals
 * - Custom roles granting wildcard actions
 * - Excessive subscription owner count
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

const API_VERSION: &str = "2022-04-01";
const ASSIGNMENT_TYPE: &str = "Microsoft.Authorization/roleAssignments";
const DEFINITION_TYPE: &str = "Microsoft.Authorization/roleDefinitions";

/// Built-in Owner role definition id
const OWNER_ROLE_ID: &str = "8e3af657-a8ff-443c-a75c-2fe8c4bcb635";
const MAX_OWNERS: usize = 5;

pub struct IdentityScanner;

#[async_trait]
impl Scanner for IdentityScanner {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn category(&self) -> ScannerCategory {
        ScannerCategory::Identity
    }

    async fn scan(&self, ctx: &ScanContext, client: &AzureClient) -> ScanResult {
        let started = Instant::now();
        let mut result = ScanResult::default();

        info!("Starting identity and access scan");
        if let Err(err) = self.scan_assignments(ctx, client, &mut result).await {
            result.errors.push(ScanError {
                scanner: self.name().to_string(),
                message: err.to_string(),
                recoverable: err.is_retryable(),
                resource_type: Some(ASSIGNMENT_TYPE.to_string()),
            });
        }
        if let Err(err) = self.scan_custom_roles(ctx, client, &mut result).await {
            result.errors.push(ScanError {
                scanner: self.name().to_string(),
                message: err.to_string(),
                recoverable: err.is_retryable(),
                resource_type: Some(DEFINITION_TYPE.to_string()),
            });
        }
        result.scan_duration_ms = started.elapsed().as_millis() as u64;

        info!(
            resources = result.resources_scanned,
            findings = result.findings.len(),
            "Identity scan completed"
        );
        result
    }
}

impl IdentityScanner {
    async fn scan_assignments(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, ASSIGNMENT_TYPE
        );
        let assignments = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;
        result.resources_scanned += assignments.len() as u64;

        let mut owner_count = 0usize;
        for assignment in &assignments {
            if !Self::is_owner_assignment(assignment) {
                continue;
            }
            owner_count += 1;
            if arm::str_prop(assignment, "/properties/principalType") == Some("ServicePrincipal")
            {
                result.findings.push(self.create_finding(
                    assignment,
                    ASSIGNMENT_TYPE,
                    Severity::High,
                    "Owner Role Assigned To Service Principal",
                    format!(
                        "Role assignment '{}' grants the Owner role to a service \
                         principal. Automation identities should not control access \
                         management.",
                        arm::name(assignment)
                    ),
                    &[
                        "Replace Owner with the narrowest built-in role that covers the workload",
                        "Use separate identities for deployment and for access management",
                        "Review the principal's recent activity in the activity log",
                    ],
                    &["CIS Azure 1.23", "NIST 800-53 AC-6", "ISO 27001 A.9.2.3"],
                ));
            }
        }

        if owner_count > MAX_OWNERS {
            // Synthetic subscription-scope finding; there is no single
            // offending resource.
            result.findings.push(Finding {
                severity: Severity::Medium,
                title: "Excessive Subscription Owners".to_string(),
                description: format!(
                    "The subscription has {} Owner role assignments. A small, \
                     auditable set of owners limits blast radius.",
                    owner_count
                ),
                resource_type: ASSIGNMENT_TYPE.to_string(),
                resource_id: format!("/subscriptions/{}", ctx.subscription_id),
                resource_name: ctx.subscription_id.clone(),
                resource_group: String::new(),
                region: "global".to_string(),
                remediation: arm::numbered_remediation(&[
                    "Reduce Owner assignments to the minimum set of break-glass accounts",
                    "Grant Contributor or narrower roles for day-to-day work",
                    "Use Privileged Identity Management for just-in-time elevation",
                ]),
                compliance_frameworks: vec![
                    "CIS Azure 1.24".to_string(),
                    "NIST 800-53 AC-6(5)".to_string(),
                ],
            });
        }
        Ok(())
    }

    async fn scan_custom_roles(
        &self,
        ctx: &ScanContext,
        client: &AzureClient,
        result: &mut ScanResult,
    ) -> EngineResult<()> {
        let path = format!(
            "/subscriptions/{}/providers/{}",
            ctx.subscription_id, DEFINITION_TYPE
        );
        let definitions = client
            .list_all(&ctx.access_token, &path, API_VERSION, "management.list")
            .await?;

        for definition in &definitions {
            if arm::str_prop(definition, "/properties/type") != Some("CustomRole") {
                continue;
            }
            result.resources_scanned += 1;
            if Self::grants_wildcard_actions(definition) {
                let role_name = arm::str_prop(definition, "/properties/roleName")
                    .unwrap_or_default()
                    .to_string();
                result.findings.push(self.create_finding(
                    definition,
                    DEFINITION_TYPE,
                    Severity::High,
                    "Custom Role Grants Wildcard Actions",
                    format!(
                        "Custom role '{}' grants '*' actions, making it equivalent \
                         to Owner under another name.",
                        role_name
                    ),
                    &[
                        "Enumerate the concrete actions the role actually needs",
                        "Replace '*' with that explicit action list",
                        "Audit principals currently holding the role",
                    ],
                    &["CIS Azure 1.23", "NIST 800-53 AC-6", "ISO 27001 A.9.2.3"],
                ));
            }
        }
        Ok(())
    }

    fn is_owner_assignment(assignment: &Value) -> bool {
        arm::str_prop(assignment, "/properties/roleDefinitionId")
            .map(|id| id.ends_with(OWNER_ROLE_ID))
            .unwrap_or(false)
    }

    fn grants_wildcard_actions(definition: &Value) -> bool {
        definition
            .pointer("/properties/permissions")
            .and_then(Value::as_array)
            .map(|permissions| {
                permissions.iter().any(|permission| {
                    permission["actions"]
                        .as_array()
                        .map(|actions| actions.iter().any(|a| a.as_str() == Some("*")))
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    fn create_finding(
        &self,
        resource: &Value,
        resource_type: &str,
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
            resource_type: resource_type.to_string(),
            resource_group: resource_group_from_id(&resource_id),
            resource_name: arm::name(resource),
            region: "global".to_string(),
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

    #[test]
    fn test_owner_assignment_detected() {
        let assignment = json!({
            "id": "/subscriptions/s/providers/Microsoft.Authorization/roleAssignments/a1",
            "name": "a1",
            "properties": {
                "roleDefinitionId": format!(
                    "/subscriptions/s/providers/Microsoft.Authorization/roleDefinitions/{}",
                    OWNER_ROLE_ID
                ),
                "principalType": "ServicePrincipal"
            }
        });
        assert!(IdentityScanner::is_owner_assignment(&assignment));

        let reader = json!({
            "properties": {"roleDefinitionId": "/subscriptions/s/providers/Microsoft.Authorization/roleDefinitions/acdd72a7-3385-48ef-bd42-f606fba81ae7"}
        });
        assert!(!IdentityScanner::is_owner_assignment(&reader));
    }

    #[test]
    fn test_wildcard_custom_role_detected() {
        let wildcard = json!({
            "properties": {
                "type": "CustomRole",
                "roleName": "do-everything",
                "permissions": [{"actions": ["*"], "notActions": []}]
            }
        });
        assert!(IdentityScanner::grants_wildcard_actions(&wildcard));

        let scoped = json!({
            "properties": {
                "type": "CustomRole",
                "roleName": "vm-operator",
                "permissions": [{"actions": ["Microsoft.Compute/virtualMachines/start/action"]}]
            }
        });
        assert!(!IdentityScanner::grants_wildcard_actions(&scoped));
    }
}

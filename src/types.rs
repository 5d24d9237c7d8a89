// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Finding severity, ordered from most to least severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// Scanner category, used for advisory priority ordering
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScannerCategory {
    Identity,
    Network,
    SecurityServices,
    Compute,
    Data,
}

/// Immutable per-run scan context. Built once after credential resolution
/// and shared read-only by every scanner in the run.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub access_token: String,
    pub subscription_id: String,
    pub regions: Vec<String>,
}

impl ScanContext {
    pub fn new(access_token: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            subscription_id: subscription_id.into(),
            regions: Vec::new(),
        }
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }
}

/// One normalized misconfiguration record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: String,
    pub resource_group: String,
    pub region: String,
    pub remediation: String,
    pub compliance_frameworks: Vec<String>,
}

/// Non-fatal, scanner-local failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanError {
    pub scanner: String,
    pub message: String,
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

/// Result of one scanner's run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub findings: Vec<Finding>,
    pub resources_scanned: u64,
    pub errors: Vec<ScanError>,
    pub scan_duration_ms: u64,
}

impl ScanResult {
    /// A scanner succeeded when it completed without recording any errors
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Aggregate of a full orchestrator run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateScanResult {
    pub findings: Vec<Finding>,
    pub total_resources_scanned: u64,
    pub scanner_results: HashMap<String, ScanResult>,
    pub total_duration_ms: u64,
    pub scanners_executed: usize,
    pub scanners_succeeded: usize,
    pub scanners_failed: usize,
}

impl AggregateScanResult {
    pub fn findings_by_severity(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

/// Extract the resource group segment from an ARM resource id
/// (`/subscriptions/{sub}/resourceGroups/{rg}/providers/...`)
pub fn resource_group_from_id(resource_id: &str) -> String {
    let mut segments = resource_id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next().unwrap_or("").to_string();
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert_eq!(Severity::Info.to_string(), "INFO");
    }

    #[test]
    fn test_severity_serialization() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
    }

    #[test]
    fn test_resource_group_from_id() {
        let id = "/subscriptions/abc/resourceGroups/prod-rg/providers/Microsoft.Storage/storageAccounts/acct1";
        assert_eq!(resource_group_from_id(id), "prod-rg");
        assert_eq!(resource_group_from_id("/subscriptions/abc"), "");
    }

    #[test]
    fn test_scan_result_succeeded() {
        let mut result = ScanResult::default();
        assert!(result.succeeded());

        result.errors.push(ScanError {
            scanner: "storage".to_string(),
            message: "fetch failed".to_string(),
            recoverable: true,
            resource_type: None,
        });
        assert!(!result.succeeded());
    }
}

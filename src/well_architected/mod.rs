// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Well-Architected Analyzer
 *
 * Buckets a pre-fetched resource inventory into six architecture pillars,
 * runs pure check batteries per pillar, and scores each.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

mod inventory;
mod pillars;

pub use inventory::ResourceInventory;

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Security,
    Reliability,
    PerformanceEfficiency,
    CostOptimization,
    OperationalExcellence,
    Sustainability,
}

impl Pillar {
    pub const ALL: [Pillar; 6] = [
        Pillar::Security,
        Pillar::Reliability,
        Pillar::PerformanceEfficiency,
        Pillar::CostOptimization,
        Pillar::OperationalExcellence,
        Pillar::Sustainability,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub pillar: Pillar,
    pub title: String,
    pub detail: String,
    pub resource_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PillarResult {
    pub pillar: Pillar,
    /// 0-100; 100 when no checks were applicable
    pub score: u8,
    pub checks_passed: u32,
    pub checks_failed: u32,
    pub critical_issues: u32,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellArchitectedReport {
    pub pillars: Vec<PillarResult>,
    pub overall_score: u8,
}

/// Analyze an inventory across all six pillars. Pure: no network access,
/// the inventory is fetched separately.
pub fn analyze(inventory: &ResourceInventory) -> WellArchitectedReport {
    let pillars: Vec<PillarResult> = Pillar::ALL
        .iter()
        .map(|pillar| pillars::evaluate(*pillar, inventory))
        .collect();

    let overall_score = if pillars.is_empty() {
        100
    } else {
        let sum: u32 = pillars.iter().map(|p| p.score as u32).sum();
        ((sum as f64) / (pillars.len() as f64)).round() as u8
    };

    info!(
        overall = overall_score,
        resources = inventory.total_resources(),
        "well-architected analysis completed"
    );
    WellArchitectedReport {
        pillars,
        overall_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inventory_scores_100() {
        let report = analyze(&ResourceInventory::default());
        assert_eq!(report.overall_score, 100);
        assert_eq!(report.pillars.len(), 6);
        for pillar in &report.pillars {
            assert_eq!(pillar.score, 100);
            assert_eq!(pillar.checks_passed + pillar.checks_failed, 0);
        }
    }

    #[test]
    fn test_overall_is_unweighted_mean() {
        let mut inventory = ResourceInventory::default();
        // One storage account failing every security check but passing
        // elsewhere shifts only the affected pillar scores.
        inventory.storage_accounts.push(serde_json::json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/a",
            "name": "a",
            "properties": {"supportsHttpsTrafficOnly": false, "allowBlobPublicAccess": true}
        }));
        let report = analyze(&inventory);
        let mean: f64 = report.pillars.iter().map(|p| p.score as f64).sum::<f64>()
            / report.pillars.len() as f64;
        assert_eq!(report.overall_score, mean.round() as u8);
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

mod common;

use common::MockTransport;
use serde_json::json;
use std::sync::Arc;
use vartija::azure::AzureClient;
use vartija::types::ScanContext;
use vartija::well_architected::{self, ResourceInventory};

const BASE: &str = "https://mgmt.test";
const SUB: &str = "11111111-2222-3333-4444-555555555555";

fn list_url(resource_type: &str, api_version: &str) -> String {
    format!("{BASE}/subscriptions/{SUB}/providers/{resource_type}?api-version={api_version}")
}

#[tokio::test]
async fn inventory_fetch_degrades_per_list_and_analysis_scores() {
    let transport = Arc::new(MockTransport::new());
    // Only storage accounts resolve; the other six lists 404 and degrade
    // to empty without failing the fetch.
    transport.route(
        &list_url("Microsoft.Storage/storageAccounts", "2023-01-01"),
        200,
        json!({"value": [{
            "id": format!("/subscriptions/{SUB}/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/a1"),
            "name": "a1",
            "tags": {"owner": "platform"},
            "properties": {
                "supportsHttpsTrafficOnly": false,
                "allowBlobPublicAccess": false
            }
        }]}),
    );

    let client = AzureClient::new(transport.clone()).with_base_url(BASE);
    let ctx = ScanContext::new("token", SUB);
    let inventory = ResourceInventory::fetch(&ctx, &client).await;

    assert_eq!(inventory.storage_accounts.len(), 1);
    assert_eq!(inventory.total_resources(), 1);

    let report = well_architected::analyze(&inventory);
    assert_eq!(report.pillars.len(), 6);

    // Security: HTTPS check fails, public-access check passes.
    let security = report
        .pillars
        .iter()
        .find(|p| matches!(p.pillar, well_architected::Pillar::Security))
        .unwrap();
    assert_eq!(security.checks_passed, 1);
    assert_eq!(security.checks_failed, 1);
    assert_eq!(security.score, 50);
    assert_eq!(security.critical_issues, 1);

    // Pillars with no applicable checks score 100.
    let sustainability = report
        .pillars
        .iter()
        .find(|p| matches!(p.pillar, well_architected::Pillar::Sustainability))
        .unwrap();
    assert_eq!(sustainability.score, 100);
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::azure::AzureClient;
use crate::types::ScanContext;
use serde_json::Value;
use tracing::{info, warn};

/// Broad resource inventory backing the pillar analysis. Fetched once per
/// run through the shared client; individual list failures degrade to an
/// empty list for that type rather than failing the analysis.
#[derive(Debug, Clone, Default)]
pub struct ResourceInventory {
    pub virtual_machines: Vec<Value>,
    pub disks: Vec<Value>,
    pub sql_servers: Vec<Value>,
    pub load_balancers: Vec<Value>,
    pub network_security_groups: Vec<Value>,
    pub storage_accounts: Vec<Value>,
    pub app_services: Vec<Value>,
}

const LISTS: &[(&str, &str)] = &[
    ("Microsoft.Compute/virtualMachines", "2023-09-01"),
    ("Microsoft.Compute/disks", "2023-10-02"),
    ("Microsoft.Sql/servers", "2021-11-01"),
    ("Microsoft.Network/loadBalancers", "2023-09-01"),
    ("Microsoft.Network/networkSecurityGroups", "2023-09-01"),
    ("Microsoft.Storage/storageAccounts", "2023-01-01"),
    ("Microsoft.Web/sites", "2023-01-01"),
];

impl ResourceInventory {
    pub fn total_resources(&self) -> usize {
        self.virtual_machines.len()
            + self.disks.len()
            + self.sql_servers.len()
            + self.load_balancers.len()
            + self.network_security_groups.len()
            + self.storage_accounts.len()
            + self.app_services.len()
    }

    /// Fetch all inventory lists through the shared cached client. Lists
    /// are fetched concurrently; the rate limiter paces them.
    pub async fn fetch(ctx: &ScanContext, client: &AzureClient) -> Self {
        let fetches = LISTS.iter().map(|&(resource_type, api_version)| async move {
            let path = format!(
                "/subscriptions/{}/providers/{}",
                ctx.subscription_id, resource_type
            );
            let items = match client
                .list_all(&ctx.access_token, &path, api_version, "management.list")
                .await
            {
                Ok(items) => items,
                Err(err) => {
                    warn!(resource_type, error = %err, "inventory list failed, continuing without it");
                    Vec::new()
                }
            };
            (resource_type, items)
        });

        let mut inventory = Self::default();
        for (resource_type, items) in futures::future::join_all(fetches).await {
            match resource_type {
                "Microsoft.Compute/virtualMachines" => inventory.virtual_machines = items,
                "Microsoft.Compute/disks" => inventory.disks = items,
                "Microsoft.Sql/servers" => inventory.sql_servers = items,
                "Microsoft.Network/loadBalancers" => inventory.load_balancers = items,
                "Microsoft.Network/networkSecurityGroups" => {
                    inventory.network_security_groups = items
                }
                "Microsoft.Storage/storageAccounts" => inventory.storage_accounts = items,
                "Microsoft.Web/sites" => inventory.app_services = items,
                _ => {}
            }
        }
        info!(
            resources = inventory.total_resources(),
            "resource inventory fetched"
        );
        inventory
    }
}

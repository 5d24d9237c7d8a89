// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::well_architected::{Pillar, PillarResult, Recommendation, ResourceInventory};
use serde_json::Value;

/// Score a pillar: percentage of passed checks, rounded. A pillar with no
/// applicable checks scores 100.
pub(crate) fn score(passed: u32, failed: u32) -> u8 {
    if passed + failed == 0 {
        return 100;
    }
    ((passed as f64 / (passed + failed) as f64) * 100.0).round() as u8
}

struct CheckRun {
    pillar: Pillar,
    passed: u32,
    failed: u32,
    critical_issues: u32,
    recommendations: Vec<Recommendation>,
}

impl CheckRun {
    fn new(pillar: Pillar) -> Self {
        Self {
            pillar,
            passed: 0,
            failed: 0,
            critical_issues: 0,
            recommendations: Vec::new(),
        }
    }

    fn check(&mut self, ok: bool, critical: bool, resource: &Value, title: &str, detail: &str) {
        if ok {
            self.passed += 1;
            return;
        }
        self.failed += 1;
        if critical {
            self.critical_issues += 1;
        }
        self.recommendations.push(Recommendation {
            pillar: self.pillar,
            title: title.to_string(),
            detail: detail.to_string(),
            resource_id: resource["id"].as_str().unwrap_or_default().to_string(),
        });
    }

    fn finish(self) -> PillarResult {
        PillarResult {
            pillar: self.pillar,
            score: score(self.passed, self.failed),
            checks_passed: self.passed,
            checks_failed: self.failed,
            critical_issues: self.critical_issues,
            recommendations: self.recommendations,
        }
    }
}

pub(crate) fn evaluate(pillar: Pillar, inventory: &ResourceInventory) -> PillarResult {
    match pillar {
        Pillar::Security => security(inventory),
        Pillar::Reliability => reliability(inventory),
        Pillar::PerformanceEfficiency => performance(inventory),
        Pillar::CostOptimization => cost(inventory),
        Pillar::OperationalExcellence => operations(inventory),
        Pillar::Sustainability => sustainability(inventory),
    }
}

fn prop_bool(resource: &Value, pointer: &str) -> Option<bool> {
    resource.pointer(pointer).and_then(Value::as_bool)
}

fn prop_str<'a>(resource: &'a Value, pointer: &str) -> Option<&'a str> {
    resource.pointer(pointer).and_then(Value::as_str)
}

fn security(inventory: &ResourceInventory) -> PillarResult {
    let mut run = CheckRun::new(Pillar::Security);
    for account in &inventory.storage_accounts {
        run.check(
            prop_bool(account, "/properties/supportsHttpsTrafficOnly") != Some(false),
            true,
            account,
            "Require secure transfer on storage",
            "Enable HTTPS-only on the storage account.",
        );
        run.check(
            prop_bool(account, "/properties/allowBlobPublicAccess") != Some(true),
            true,
            account,
            "Disable public blob access",
            "Turn off anonymous blob access at the account level.",
        );
    }
    for site in &inventory.app_services {
        run.check(
            prop_bool(site, "/properties/httpsOnly") == Some(true),
            false,
            site,
            "Enforce HTTPS on app services",
            "Enable the HTTPS-only setting on the app.",
        );
    }
    for server in &inventory.sql_servers {
        run.check(
            prop_str(server, "/properties/publicNetworkAccess") != Some("Enabled"),
            false,
            server,
            "Restrict SQL public network access",
            "Disable public network access or scope firewall rules.",
        );
    }
    run.finish()
}

fn reliability(inventory: &ResourceInventory) -> PillarResult {
    let mut run = CheckRun::new(Pillar::Reliability);
    for vm in &inventory.virtual_machines {
        let in_zone_or_set = vm.get("zones").and_then(Value::as_array).map(|z| !z.is_empty())
            == Some(true)
            || vm.pointer("/properties/availabilitySet").is_some();
        run.check(
            in_zone_or_set,
            false,
            vm,
            "Place VMs in availability zones or sets",
            "Single-instance VMs have no protection against host or zone failure.",
        );
        run.check(
            vm.pointer("/properties/storageProfile/osDisk/managedDisk")
                .is_some(),
            false,
            vm,
            "Use managed disks",
            "Unmanaged VHDs lack platform redundancy guarantees.",
        );
    }
    for lb in &inventory.load_balancers {
        run.check(
            prop_str(lb, "/sku/name") == Some("Standard"),
            false,
            lb,
            "Use Standard load balancer SKU",
            "Basic SKU load balancers carry no availability SLA.",
        );
    }
    run.finish()
}

fn performance(inventory: &ResourceInventory) -> PillarResult {
    let mut run = CheckRun::new(Pillar::PerformanceEfficiency);
    for disk in &inventory.disks {
        run.check(
            prop_str(disk, "/sku/name") != Some("Standard_LRS"),
            false,
            disk,
            "Prefer SSD-backed disks for attached workloads",
            "Standard HDD disks bottleneck latency-sensitive workloads.",
        );
    }
    for site in &inventory.app_services {
        run.check(
            prop_bool(site, "/properties/siteConfig/alwaysOn").unwrap_or(false)
                || prop_str(site, "/properties/sku") != Some("Free"),
            false,
            site,
            "Keep production apps warm",
            "Enable Always On so cold starts do not hit first requests.",
        );
    }
    run.finish()
}

fn cost(inventory: &ResourceInventory) -> PillarResult {
    let mut run = CheckRun::new(Pillar::CostOptimization);
    for disk in &inventory.disks {
        run.check(
            prop_str(disk, "/properties/diskState") != Some("Unattached"),
            false,
            disk,
            "Remove unattached disks",
            "Unattached disks accrue cost with no workload benefit.",
        );
    }
    for vm in &inventory.virtual_machines {
        // Deallocated machines stop compute billing; stopped ones do not.
        run.check(
            prop_str(vm, "/properties/instanceView/powerState") != Some("VM stopped"),
            false,
            vm,
            "Deallocate stopped VMs",
            "Stopped-but-allocated VMs continue to bill for compute.",
        );
    }
    run.finish()
}

fn operations(inventory: &ResourceInventory) -> PillarResult {
    let mut run = CheckRun::new(Pillar::OperationalExcellence);
    for vm in &inventory.virtual_machines {
        let has_tags = vm
            .get("tags")
            .and_then(Value::as_object)
            .map(|t| !t.is_empty())
            .unwrap_or(false);
        run.check(
            has_tags,
            false,
            vm,
            "Tag resources for ownership",
            "Untagged resources cannot be traced to an owning team.",
        );
    }
    for account in &inventory.storage_accounts {
        let has_tags = account
            .get("tags")
            .and_then(Value::as_object)
            .map(|t| !t.is_empty())
            .unwrap_or(false);
        run.check(
            has_tags,
            false,
            account,
            "Tag resources for ownership",
            "Untagged resources cannot be traced to an owning team.",
        );
    }
    run.finish()
}

fn sustainability(inventory: &ResourceInventory) -> PillarResult {
    let mut run = CheckRun::new(Pillar::Sustainability);
    for vm in &inventory.virtual_machines {
        let generation_current = prop_str(vm, "/properties/hardwareProfile/vmSize")
            .map(|size| !size.contains("_A") && !size.starts_with("Basic"))
            .unwrap_or(true);
        run.check(
            generation_current,
            false,
            vm,
            "Retire legacy VM series",
            "Older VM series deliver less work per watt than current generations.",
        );
    }
    run.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_vacuous_pass() {
        assert_eq!(score(0, 0), 100);
    }

    #[test]
    fn test_score_half() {
        assert_eq!(score(2, 2), 50);
    }

    #[test]
    fn test_score_rounding() {
        assert_eq!(score(1, 2), 33);
        assert_eq!(score(2, 1), 67);
        assert_eq!(score(5, 0), 100);
        assert_eq!(score(0, 5), 0);
    }

    #[test]
    fn test_security_pillar_counts() {
        let mut inventory = ResourceInventory::default();
        inventory.storage_accounts.push(json!({
            "id": "/s/a1",
            "properties": {"supportsHttpsTrafficOnly": false, "allowBlobPublicAccess": false}
        }));
        let result = security(&inventory);
        assert_eq!(result.checks_passed, 1);
        assert_eq!(result.checks_failed, 1);
        assert_eq!(result.critical_issues, 1);
        assert_eq!(result.score, 50);
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].resource_id, "/s/a1");
    }

    #[test]
    fn test_cost_pillar_unattached_disk() {
        let mut inventory = ResourceInventory::default();
        inventory.disks.push(json!({
            "id": "/s/d1",
            "properties": {"diskState": "Unattached"}
        }));
        let result = cost(&inventory);
        assert_eq!(result.checks_failed, 1);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_reliability_zoned_vm_passes() {
        let mut inventory = ResourceInventory::default();
        inventory.virtual_machines.push(json!({
            "id": "/s/vm1",
            "zones": ["1"],
            "properties": {"storageProfile": {"osDisk": {"managedDisk": {"id": "/d"}}}}
        }));
        let result = reliability(&inventory);
        assert_eq!(result.checks_failed, 0);
        assert_eq!(result.score, 100);
    }
}

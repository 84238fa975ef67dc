//! AVL001: No PodDisruptionBudget for a multi-replica workload.

use super::{OptimizationRule, chart_label_selector, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};
use serde_yaml::Value;

/// Rule: multi-replica workload without a disruption budget.
pub struct NoPdbRule;

/// True when `value` is a PDB block that has not been switched off.
pub(super) fn pdb_is_enabled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Mapping(map) => !matches!(map.get("enabled"), Some(Value::Bool(false))),
        _ => true,
    }
}

impl OptimizationRule for NoPdbRule {
    fn id(&self) -> &'static str {
        codes::NO_PDB
    }

    fn name(&self) -> &'static str {
        "No Pod Disruption Budget"
    }

    fn description(&self) -> &'static str {
        "Multi-replica workload does not have a PodDisruptionBudget configured"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Availability
    }

    fn check(&self, record: &ResourceRecord, _thresholds: &RuleThresholds) -> Vec<Violation> {
        let replicas = record.replicas_or_default();
        if replicas <= 1 {
            return Vec::new();
        }

        let has_pdb = ["podDisruptionBudget", "pdb"]
            .iter()
            .filter_map(|key| record.get(key))
            .any(pdb_is_enabled);
        if has_pdb {
            return Vec::new();
        }

        vec![violation_for(
            self,
            "Workload does not have a PodDisruptionBudget configured",
            format!("replicas={}", replicas),
            Patch::empty()
                .with(&["podDisruptionBudget", "enabled"], true)
                .with(&["podDisruptionBudget", "maxUnavailable"], 1)
                .with(&["podDisruptionBudget", "unhealthyPodEvictionPolicy"], "AlwaysAllow")
                .with(&["podDisruptionBudget", "labelSelector"], chart_label_selector()),
        )]
    }
}

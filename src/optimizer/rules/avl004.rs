//! AVL004: Multi-replica workload without topology spread constraints.

use super::{OptimizationRule, chart_label_selector, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::{ResourceRecord, is_truthy};
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};
use serde_yaml::{Mapping, Value};

/// Rule: no topologySpreadConstraints for a multi-replica workload.
pub struct NoTopologySpreadRule;

impl OptimizationRule for NoTopologySpreadRule {
    fn id(&self) -> &'static str {
        codes::NO_TOPOLOGY_SPREAD
    }

    fn name(&self) -> &'static str {
        "Missing Topology Spread"
    }

    fn description(&self) -> &'static str {
        "No topologySpreadConstraints defined for a multi-replica workload"
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn category(&self) -> Category {
        Category::Availability
    }

    fn check(&self, record: &ResourceRecord, _thresholds: &RuleThresholds) -> Vec<Violation> {
        let replicas = record.replicas_or_default();
        if replicas <= 1 {
            return Vec::new();
        }
        if record.flag("has_topology_spread")
            || record.get("topologySpreadConstraints").is_some_and(is_truthy)
        {
            return Vec::new();
        }

        let mut constraint = Mapping::new();
        constraint.insert("maxSkew".into(), 1.into());
        constraint.insert("topologyKey".into(), "kubernetes.io/hostname".into());
        constraint.insert("whenUnsatisfiable".into(), "ScheduleAnyway".into());
        constraint.insert("labelSelector".into(), chart_label_selector());

        vec![violation_for(
            self,
            "No topologySpreadConstraints defined for a multi-replica workload, which may lead to uneven pod distribution",
            format!("replicas={}", replicas),
            Patch::empty().with(
                &["topologySpreadConstraints"],
                Value::Sequence(vec![Value::Mapping(constraint)]),
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_spread() {
        let t = RuleThresholds::default();
        let empty_list = ResourceRecord::from_yaml_str("replicas: 3\ntopologySpreadConstraints: []\n").unwrap();
        let v = NoTopologySpreadRule.check(&empty_list, &t);
        assert_eq!(v.len(), 1);
        // list previews replace wholesale
        assert!(matches!(
            v[0].fix_preview.get(&["topologySpreadConstraints"]),
            Some(Patch::Value(Value::Sequence(_)))
        ));

        let single = ResourceRecord::from_yaml_str("replicas: 1\n").unwrap();
        assert!(NoTopologySpreadRule.check(&single, &t).is_empty());

        let rendered = ResourceRecord::from_yaml_str("replicas: 3\nhas_topology_spread: true\n").unwrap();
        assert!(NoTopologySpreadRule.check(&rendered, &t).is_empty());
    }
}

//! AVL005: Single replica, no redundancy.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: replicas explicitly set to one.
///
/// An absent replica count is not flagged.
pub struct SingleReplicaRule;

impl OptimizationRule for SingleReplicaRule {
    fn id(&self) -> &'static str {
        codes::SINGLE_REPLICA
    }

    fn name(&self) -> &'static str {
        "Single Replica (No Redundancy)"
    }

    fn description(&self) -> &'static str {
        "Chart runs with a single replica, no redundancy"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Availability
    }

    fn check(&self, record: &ResourceRecord, _thresholds: &RuleThresholds) -> Vec<Violation> {
        if record.replicas() != Some(1) {
            return Vec::new();
        }
        vec![violation_for(
            self,
            "Chart runs with a single replica, providing no redundancy during failures or deployments",
            "replicas=1",
            Patch::empty().with(&["replicaCount"], 2),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_single_replica_only() {
        let t = RuleThresholds::default();
        let one = ResourceRecord::from_yaml_str("replicas: 1\n").unwrap();
        assert_eq!(SingleReplicaRule.check(&one, &t).len(), 1);
        assert!(SingleReplicaRule.check(&ResourceRecord::new(), &t).is_empty());
        let three = ResourceRecord::from_yaml_str("replicas: 3\n").unwrap();
        assert!(SingleReplicaRule.check(&three, &t).is_empty());
    }
}

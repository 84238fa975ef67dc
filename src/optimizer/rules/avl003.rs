//! AVL003: PodDisruptionBudget blocks node drains.

use super::avl001::pdb_is_enabled;
use super::{OptimizationRule, codes, display_value, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::{ResourceRecord, is_truthy};
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};
use serde_yaml::Value;

/// Rule: the budget allows fewer evictions than the blocking threshold.
///
/// `maxUnavailable` and `minAvailable` are judged independently, so one
/// budget can produce two violations.
pub struct BlockingPdbRule;

/// A PDB bound as written in values: an absolute count or a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PdbBound {
    Count(i64),
    Percent(i64),
}

impl PdbBound {
    fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Count),
            Value::String(s) => {
                let s = s.trim();
                if let Some(pct) = s.strip_suffix('%') {
                    pct.trim().parse().ok().map(Self::Percent)
                } else {
                    s.parse().ok().map(Self::Count)
                }
            }
            _ => None,
        }
    }
}

impl OptimizationRule for BlockingPdbRule {
    fn id(&self) -> &'static str {
        codes::BLOCKING_PDB
    }

    fn name(&self) -> &'static str {
        "Blocking PDB Configuration"
    }

    fn description(&self) -> &'static str {
        "PDB configuration allows too few disruptions (minAvailable too high or maxUnavailable too low)"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn category(&self) -> Category {
        Category::Availability
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        let Some(pdb) = record.pdb() else {
            return Vec::new();
        };
        if !is_truthy(pdb) || !pdb_is_enabled(pdb) {
            return Vec::new();
        }
        let Some(pdb) = pdb.as_mapping() else {
            return Vec::new();
        };

        let replicas = record.replicas_or_default();
        let threshold = thresholds.pdb_blocking_threshold;
        // widened so oversized input values cannot overflow
        let (replicas_wide, threshold_wide) = (i128::from(replicas), i128::from(threshold));
        let mut violations = Vec::new();

        if let Some(raw) = pdb.get("maxUnavailable") {
            let blocking = match PdbBound::parse(raw) {
                Some(PdbBound::Count(n)) => n < threshold,
                Some(PdbBound::Percent(pct)) => {
                    (replicas_wide * i128::from(pct)).div_euclid(100) < threshold_wide
                }
                None => false,
            };
            if blocking {
                let shown = display_value(raw);
                let mut v = violation_for(
                    self,
                    format!(
                        "PDB maxUnavailable={} allows fewer than {} disruption(s), which can block node drains",
                        shown, threshold
                    ),
                    format!("maxUnavailable={}", shown),
                    Patch::empty()
                        .with(&["podDisruptionBudget", "maxUnavailable"], threshold)
                        .with(&["podDisruptionBudget", "unhealthyPodEvictionPolicy"], "AlwaysAllow"),
                );
                v.name = "Blocking PDB - maxUnavailable too low".to_string();
                violations.push(v);
            }
        }

        if let Some(raw) = pdb.get("minAvailable").filter(|v| !v.is_null()) {
            let blocking = match PdbBound::parse(raw) {
                Some(PdbBound::Count(n)) => replicas_wide - i128::from(n) < threshold_wide,
                // 100% (or more) leaves nothing to evict
                Some(PdbBound::Percent(pct)) => pct >= 100,
                None => false,
            };
            if blocking {
                let shown = display_value(raw);
                let mut v = violation_for(
                    self,
                    format!(
                        "PDB minAvailable={} blocks evictions for {} replica workload",
                        shown, replicas
                    ),
                    format!("minAvailable={}", shown),
                    Patch::empty()
                        .with(&["podDisruptionBudget", "maxUnavailable"], 1)
                        .with(&["podDisruptionBudget", "unhealthyPodEvictionPolicy"], "AlwaysAllow")
                        // a PDB may not set both fields
                        .with(&["podDisruptionBudget", "minAvailable"], Value::Null),
                );
                v.name = "Blocking PDB - minAvailable too high".to_string();
                violations.push(v);
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> Vec<Violation> {
        BlockingPdbRule.check(
            &ResourceRecord::from_yaml_str(text).unwrap(),
            &RuleThresholds::default(),
        )
    }

    #[test]
    fn test_percentage_max_unavailable() {
        let v = check("replicas: 5\npodDisruptionBudget:\n  maxUnavailable: '0%'\n");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].current_value, "maxUnavailable=0%");

        assert!(check("replicas: 5\npodDisruptionBudget:\n  maxUnavailable: '20%'\n").is_empty());
        assert_eq!(check("replicas: 4\npodDisruptionBudget:\n  maxUnavailable: '20%'\n").len(), 1);
    }

    #[test]
    fn test_count_forms() {
        assert_eq!(check("replicas: 3\npdb:\n  maxUnavailable: 0\n").len(), 1);
        assert_eq!(check("replicas: 3\npdb:\n  maxUnavailable: '0'\n").len(), 1);
        assert!(check("replicas: 3\npdb:\n  maxUnavailable: 1\n").is_empty());
        assert_eq!(check("replicas: 3\npdb:\n  minAvailable: 3\n").len(), 1);
        assert!(check("replicas: 3\npdb:\n  minAvailable: 2\n").is_empty());
    }

    #[test]
    fn test_full_min_available_percentage() {
        let v = check("replicas: 10\npodDisruptionBudget:\n  minAvailable: 100%\n");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].name, "Blocking PDB - minAvailable too high");
        assert_eq!(
            v[0].fix_preview.get_value(&["podDisruptionBudget", "minAvailable"]),
            Some(&Value::Null)
        );
        assert!(check("replicas: 10\npodDisruptionBudget:\n  minAvailable: 50%\n").is_empty());
    }

    #[test]
    fn test_both_fields_can_fire() {
        let v = check("replicas: 2\npodDisruptionBudget:\n  maxUnavailable: 0\n  minAvailable: 2\n");
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_oversized_values_do_not_overflow() {
        assert!(check("replicas: 100\npodDisruptionBudget:\n  maxUnavailable: '100000000000000000%'\n").is_empty());

        let v = check("replicas: -9223372036854775808\npodDisruptionBudget:\n  minAvailable: 9223372036854775807\n");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].name, "Blocking PDB - minAvailable too high");
    }

    #[test]
    fn test_disabled_or_missing_pdb() {
        assert!(check("replicas: 3\n").is_empty());
        assert!(check("replicas: 3\npodDisruptionBudget:\n  enabled: false\n  maxUnavailable: 0\n").is_empty());
    }
}

//! AVL002: No pod anti-affinity.

use super::{OptimizationRule, chart_label_selector, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::{ResourceRecord, is_truthy};
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};
use serde_yaml::{Mapping, Value};

/// Rule: replicas may all land on one node.
pub struct NoAntiAffinityRule;

impl OptimizationRule for NoAntiAffinityRule {
    fn id(&self) -> &'static str {
        codes::NO_ANTI_AFFINITY
    }

    fn name(&self) -> &'static str {
        "No Pod Anti-Affinity"
    }

    fn description(&self) -> &'static str {
        "Workload does not have pod anti-affinity for high availability"
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

        let has_anti_affinity = record.flag("has_anti_affinity")
            || [
                "preferredDuringSchedulingIgnoredDuringExecution",
                "requiredDuringSchedulingIgnoredDuringExecution",
            ]
            .iter()
            .any(|term| {
                record
                    .path(&["affinity", "podAntiAffinity", *term])
                    .is_some_and(is_truthy)
            });
        if has_anti_affinity {
            return Vec::new();
        }

        vec![violation_for(
            self,
            "Workload does not have pod anti-affinity for high availability",
            format!("replicas={}", replicas),
            Patch::empty().with(
                &[
                    "affinity",
                    "podAntiAffinity",
                    "preferredDuringSchedulingIgnoredDuringExecution",
                ],
                Value::Sequence(vec![preferred_hostname_term()]),
            ),
        )]
    }
}

fn preferred_hostname_term() -> Value {
    let mut term = Mapping::new();
    term.insert("labelSelector".into(), chart_label_selector());
    term.insert("topologyKey".into(), "kubernetes.io/hostname".into());

    let mut weighted = Mapping::new();
    weighted.insert("weight".into(), 100.into());
    weighted.insert("podAffinityTerm".into(), Value::Mapping(term));
    Value::Mapping(weighted)
}

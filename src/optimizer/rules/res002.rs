//! RES002: No CPU limit defined.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::{ResourceField, RuleThresholds};
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: container has no CPU limit.
pub struct NoCpuLimitsRule;

impl OptimizationRule for NoCpuLimitsRule {
    fn id(&self) -> &'static str {
        codes::NO_CPU_LIMITS
    }

    fn name(&self) -> &'static str {
        "No CPU Limits"
    }

    fn description(&self) -> &'static str {
        "Container has no CPU limits defined"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Resources
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        if thresholds.is_fixed(ResourceField::CpuLimit) {
            return Vec::new();
        }
        if record.has_resource("limits", "cpu") {
            return Vec::new();
        }

        vec![violation_for(
            self,
            "Container has no CPU limits defined, which can lead to resource starvation",
            "not set",
            Patch::empty().with(&["resources", "limits", "cpu"], "500m"),
        )]
    }
}

//! RES003: No memory limit defined.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::{ResourceField, RuleThresholds};
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: container has no memory limit.
pub struct NoMemoryLimitsRule;

impl OptimizationRule for NoMemoryLimitsRule {
    fn id(&self) -> &'static str {
        codes::NO_MEMORY_LIMITS
    }

    fn name(&self) -> &'static str {
        "No Memory Limits"
    }

    fn description(&self) -> &'static str {
        "Container has no memory limits defined"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Resources
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        if thresholds.is_fixed(ResourceField::MemoryLimit)
            || record.has_resource("limits", "memory")
        {
            return Vec::new();
        }

        vec![violation_for(
            self,
            "Container has no memory limits defined, which can lead to OOM kills",
            "not set",
            Patch::empty().with(&["resources", "limits", "memory"], "512Mi"),
        )]
    }
}

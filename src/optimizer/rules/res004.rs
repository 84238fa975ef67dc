//! RES004: No resource requests at all.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::{ResourceField, RuleThresholds};
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: container declares neither a CPU nor a memory request.
///
/// Declared BestEffort workloads are downgraded to a warning.
pub struct NoResourceRequestsRule;

impl OptimizationRule for NoResourceRequestsRule {
    fn id(&self) -> &'static str {
        codes::NO_RESOURCE_REQUESTS
    }

    fn name(&self) -> &'static str {
        "No Resource Requests"
    }

    fn description(&self) -> &'static str {
        "Container has no resource requests"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn category(&self) -> Category {
        Category::Resources
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        if thresholds.is_fixed(ResourceField::CpuRequest)
            && thresholds.is_fixed(ResourceField::MemoryRequest)
        {
            return Vec::new();
        }
        if record.has_resource("requests", "cpu") || record.has_resource("requests", "memory") {
            return Vec::new();
        }

        let best_effort = record.is_best_effort();
        let description = if best_effort {
            "BestEffort workload has no resource requests, which increases eviction risk under node pressure"
        } else {
            "Container has no resource requests, which prevents effective scheduling"
        };

        let mut violation = violation_for(
            self,
            description,
            "not set",
            Patch::empty()
                .with(&["resources", "requests", "cpu"], "100m")
                .with(&["resources", "requests", "memory"], "128Mi"),
        );
        if best_effort {
            violation.severity = Severity::Warning;
        }
        vec![violation]
    }
}

//! RES008: No memory request defined.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::{ResourceField, RuleThresholds};
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: CPU request present but no memory request.
///
/// The case where both requests are missing belongs to RES004.
pub struct NoMemoryRequestRule;

impl OptimizationRule for NoMemoryRequestRule {
    fn id(&self) -> &'static str {
        codes::NO_MEMORY_REQUEST
    }

    fn name(&self) -> &'static str {
        "No Memory Request"
    }

    fn description(&self) -> &'static str {
        "Container does not have a memory request defined"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Resources
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        if thresholds.is_fixed(ResourceField::MemoryRequest) {
            return Vec::new();
        }
        let has_cpu = record.has_resource("requests", "cpu");
        let has_memory = record.has_resource("requests", "memory");
        if !has_cpu || has_memory {
            return Vec::new();
        }

        vec![violation_for(
            self,
            "Container does not have a memory request defined",
            "not set",
            Patch::empty().with(&["resources", "requests", "memory"], "128Mi"),
        )]
    }
}

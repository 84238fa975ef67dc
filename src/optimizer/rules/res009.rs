//! RES009: Memory request is very low.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: memory request below the low-memory floor while the limit is also
/// low or absent.
pub struct LowMemoryRequestRule;

impl OptimizationRule for LowMemoryRequestRule {
    fn id(&self) -> &'static str {
        codes::LOW_MEMORY_REQUEST
    }

    fn name(&self) -> &'static str {
        "Very Low Memory Request"
    }

    fn description(&self) -> &'static str {
        "Memory request is below recommended minimum (32Mi)"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Resources
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        let Some(request_mi) = record.memory_request_mi() else {
            return Vec::new();
        };
        if request_mi <= 0.0 || request_mi >= thresholds.low_memory_mi {
            return Vec::new();
        }
        if record
            .memory_limit_mi()
            .is_some_and(|limit| limit >= thresholds.memory_bump_min_mi)
        {
            return Vec::new();
        }

        let request_text = record.resource_text("requests", "memory");
        vec![violation_for(
            self,
            format!(
                "Memory request ({}) is below {}Mi, which may cause OOM kills",
                request_text, thresholds.low_memory_mi
            ),
            request_text,
            Patch::empty().with(&["resources", "requests", "memory"], "128Mi"),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_memory_request() {
        let t = RuleThresholds::default();
        let low = ResourceRecord::from_yaml_str(
            "resources:\n  requests:\n    memory: 16Mi\n  limits:\n    memory: 64Mi\n",
        )
        .unwrap();
        assert_eq!(LowMemoryRequestRule.check(&low, &t).len(), 1);

        let high_limit = ResourceRecord::from_yaml_str(
            "resources:\n  requests:\n    memory: 16Mi\n  limits:\n    memory: 512Mi\n",
        )
        .unwrap();
        assert!(LowMemoryRequestRule.check(&high_limit, &t).is_empty());
    }
}

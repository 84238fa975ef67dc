//! RES006: Memory limit to request ratio is too high.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::{BURSTABLE_TARGET_RATIO, ResourceField, RuleThresholds};
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: high memory limit/request ratio.
pub struct HighMemoryRatioRule;

impl OptimizationRule for HighMemoryRatioRule {
    fn id(&self) -> &'static str {
        codes::HIGH_MEMORY_RATIO
    }

    fn name(&self) -> &'static str {
        "High Memory Limit/Request Ratio"
    }

    fn description(&self) -> &'static str {
        "Memory limit is too high compared to request"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Resources
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        if thresholds.is_fixed(ResourceField::MemoryRequest) || record.is_best_effort() {
            return Vec::new();
        }

        let (Some(limit_mi), Some(request_mi)) =
            (record.memory_limit_mi(), record.memory_request_mi())
        else {
            return Vec::new();
        };
        if limit_mi <= 0.0 || request_mi <= 0.0 {
            return Vec::new();
        }

        let ratio = limit_mi / request_mi;
        if ratio < thresholds.limit_request_ratio {
            return Vec::new();
        }

        let target_mi = (limit_mi / BURSTABLE_TARGET_RATIO) as u64;
        let limit_text = record.resource_text("limits", "memory");
        let request_text = record.resource_text("requests", "memory");

        vec![violation_for(
            self,
            format!(
                "Memory limit ({}) is {:.1}x the request ({}), increasing request to bring ratio to {:.1}x",
                limit_text, ratio, request_text, BURSTABLE_TARGET_RATIO
            ),
            format!("limit {} / request {}", limit_text, request_text),
            Patch::empty().with(
                &["resources", "requests", "memory"],
                format!("{}Mi", target_mi),
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_ratio_target() {
        let r = ResourceRecord::from_yaml_str(
            "resources:\n  requests:\n    memory: 256Mi\n  limits:\n    memory: 1Gi\n",
        )
        .unwrap();
        let v = HighMemoryRatioRule.check(&r, &RuleThresholds::default());
        assert_eq!(v.len(), 1);
        // 1024 / 1.5 = 682.67, truncated
        assert_eq!(
            v[0].fix_preview
                .get_value(&["resources", "requests", "memory"])
                .and_then(|v| v.as_str()),
            Some("682Mi")
        );
    }

    #[test]
    fn test_missing_side_does_not_fire() {
        let r = ResourceRecord::from_yaml_str("resources:\n  limits:\n    memory: 1Gi\n").unwrap();
        assert!(HighMemoryRatioRule.check(&r, &RuleThresholds::default()).is_empty());
    }
}

//! RES005: CPU limit to request ratio is too high.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::{BURSTABLE_TARGET_RATIO, ResourceField, RuleThresholds};
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: high CPU limit/request ratio.
///
/// The fix raises the request to `limit / 1.5`. Limits are left alone.
pub struct HighCpuRatioRule;

impl OptimizationRule for HighCpuRatioRule {
    fn id(&self) -> &'static str {
        codes::HIGH_CPU_RATIO
    }

    fn name(&self) -> &'static str {
        "High CPU Limit/Request Ratio"
    }

    fn description(&self) -> &'static str {
        "CPU limit is too high compared to request"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Resources
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        if thresholds.is_fixed(ResourceField::CpuRequest) || record.is_best_effort() {
            return Vec::new();
        }

        let (Some(limit), Some(request)) = (record.cpu_limit(), record.cpu_request()) else {
            return Vec::new();
        };
        if limit <= 0.0 || request <= 0.0 {
            return Vec::new();
        }

        let ratio = limit / request;
        if ratio < thresholds.limit_request_ratio {
            return Vec::new();
        }

        let target_request = (limit / BURSTABLE_TARGET_RATIO) as u64;
        let limit_text = record.resource_text("limits", "cpu");
        let request_text = record.resource_text("requests", "cpu");

        vec![violation_for(
            self,
            format!(
                "CPU limit ({}) is {:.1}x the request ({}), increasing request to bring ratio to {:.1}x",
                limit_text, ratio, request_text, BURSTABLE_TARGET_RATIO
            ),
            format!("limit {} / request {}", limit_text, request_text),
            Patch::empty().with(
                &["resources", "requests", "cpu"],
                format!("{}m", target_request),
            ),
        )]
    }
}

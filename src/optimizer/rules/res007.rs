//! RES007: CPU request is very low.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: CPU request below the low-CPU floor.
///
/// Only fires while the limit is absent or also below the bump target.
/// Otherwise RES005 raises the request and this rule stays quiet, so the
/// two never prescribe different values for the same field.
pub struct LowCpuRequestRule;

impl OptimizationRule for LowCpuRequestRule {
    fn id(&self) -> &'static str {
        codes::LOW_CPU_REQUEST
    }

    fn name(&self) -> &'static str {
        "Very Low CPU Request"
    }

    fn description(&self) -> &'static str {
        "CPU request is below recommended minimum"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Resources
    }

    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
        let Some(request) = record.cpu_request() else {
            return Vec::new();
        };
        if request <= 0.0 || request >= thresholds.low_cpu_millicores {
            return Vec::new();
        }

        let limit_is_also_low = record
            .cpu_limit()
            .is_none_or(|limit| limit < thresholds.cpu_bump_min_millicores);
        if !limit_is_also_low {
            return Vec::new();
        }

        let request_text = record.resource_text("requests", "cpu");
        vec![violation_for(
            self,
            format!(
                "CPU request ({}) is below {}m, which may cause CPU throttling",
                request_text, thresholds.low_cpu_millicores
            ),
            request_text,
            Patch::empty().with(&["resources", "requests", "cpu"], "100m"),
        )]
    }
}

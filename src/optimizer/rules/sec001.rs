//! SEC001: Container runs as root.

use super::{OptimizationRule, codes, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: `securityContext.runAsUser` is literally 0.
pub struct RunningAsRootRule;

impl OptimizationRule for RunningAsRootRule {
    fn id(&self) -> &'static str {
        codes::RUNNING_AS_ROOT
    }

    fn name(&self) -> &'static str {
        "Running As Root"
    }

    fn description(&self) -> &'static str {
        "Container runs as root user"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn category(&self) -> Category {
        Category::Security
    }

    fn check(&self, record: &ResourceRecord, _thresholds: &RuleThresholds) -> Vec<Violation> {
        let run_as_user = record
            .path(&["securityContext", "runAsUser"])
            .and_then(|v| v.as_i64());
        if run_as_user != Some(0) {
            return Vec::new();
        }

        vec![violation_for(
            self,
            "Container runs as root (runAsUser=0), which is a security risk",
            "runAsUser=0",
            Patch::empty()
                .with(&["securityContext", "runAsNonRoot"], true)
                .with(&["securityContext", "runAsUser"], 1000)
                .with(&["securityContext", "fsGroup"], 1000),
        )]
    }
}

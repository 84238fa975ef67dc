//! PRB001: Missing liveness probe.

use super::probes::{ProbeKind, check_missing_probe};
use super::{OptimizationRule, codes};
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: no liveness probe configured.
pub struct MissingLivenessProbeRule;

impl OptimizationRule for MissingLivenessProbeRule {
    fn id(&self) -> &'static str {
        codes::MISSING_LIVENESS_PROBE
    }

    fn name(&self) -> &'static str {
        "Missing Liveness Probe"
    }

    fn description(&self) -> &'static str {
        "Container does not have a liveness probe defined"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Probes
    }

    fn check(&self, record: &ResourceRecord, _thresholds: &RuleThresholds) -> Vec<Violation> {
        check_missing_probe(self, ProbeKind::Liveness, record)
    }
}

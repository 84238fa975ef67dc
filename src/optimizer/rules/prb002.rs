//! PRB002: Missing readiness probe.

use super::probes::{ProbeKind, check_missing_probe};
use super::{OptimizationRule, codes};
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: no readiness probe configured.
pub struct MissingReadinessProbeRule;

impl OptimizationRule for MissingReadinessProbeRule {
    fn id(&self) -> &'static str {
        codes::MISSING_READINESS_PROBE
    }

    fn name(&self) -> &'static str {
        "Missing Readiness Probe"
    }

    fn description(&self) -> &'static str {
        "Container does not have a readiness probe defined"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn category(&self) -> Category {
        Category::Probes
    }

    fn check(&self, record: &ResourceRecord, _thresholds: &RuleThresholds) -> Vec<Violation> {
        check_missing_probe(self, ProbeKind::Readiness, record)
    }
}

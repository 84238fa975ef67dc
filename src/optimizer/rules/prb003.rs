//! PRB003: Missing startup probe.

use super::probes::{ProbeKind, check_missing_probe};
use super::{OptimizationRule, codes};
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};

/// Rule: no startup probe configured.
///
/// Informational only: many workloads start fast enough without one.
pub struct MissingStartupProbeRule;

impl OptimizationRule for MissingStartupProbeRule {
    fn id(&self) -> &'static str {
        codes::MISSING_STARTUP_PROBE
    }

    fn name(&self) -> &'static str {
        "Missing Startup Probe"
    }

    fn description(&self) -> &'static str {
        "Container has no startupProbe defined"
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn category(&self) -> Category {
        Category::Probes
    }

    fn check(&self, record: &ResourceRecord, _thresholds: &RuleThresholds) -> Vec<Violation> {
        check_missing_probe(self, ProbeKind::Startup, record)
    }
}

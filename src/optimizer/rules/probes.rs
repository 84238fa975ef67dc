//! Shared probe detection and default probe shapes.

use super::{OptimizationRule, violation_for};
use crate::optimizer::patch::Patch;
use crate::optimizer::record::{ResourceRecord, is_truthy};
use crate::optimizer::types::Violation;

/// Container probe kinds the probe rules look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Liveness,
    Readiness,
    Startup,
}

impl ProbeKind {
    /// Key the probe lives under in values and container specs.
    pub fn values_key(&self) -> &'static str {
        match self {
            Self::Liveness => "livenessProbe",
            Self::Readiness => "readinessProbe",
            Self::Startup => "startupProbe",
        }
    }

    /// Short name used in the nested `probes.<name>` layout.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Liveness => "liveness",
            Self::Readiness => "readiness",
            Self::Startup => "startup",
        }
    }

    /// Startup probes tolerate a long boot; the others fail fast.
    pub fn default_failure_threshold(&self) -> i64 {
        match self {
            Self::Startup => 30,
            _ => 3,
        }
    }

    /// Default HTTP probe against `/health` on the `http` port.
    pub fn default_preview(&self) -> Patch {
        let key = self.values_key();
        Patch::empty()
            .with(&[key, "httpGet", "path"], "/health")
            .with(&[key, "httpGet", "port"], "http")
            .with(&[key, "initialDelaySeconds"], 10)
            .with(&[key, "timeoutSeconds"], 10)
            .with(&[key, "periodSeconds"], 30)
            .with(&[key, "failureThreshold"], self.default_failure_threshold())
    }

    /// True when the record declares this probe.
    ///
    /// A top-level key counts even when empty; the nested layout must hold
    /// something truthy.
    pub fn is_configured(&self, record: &ResourceRecord) -> bool {
        record.contains_key(self.values_key())
            || record
                .path(&["probes", self.short_name()])
                .is_some_and(is_truthy)
    }
}

/// Shared check body for the three probe rules.
pub(super) fn check_missing_probe<R: OptimizationRule + ?Sized>(
    rule: &R,
    kind: ProbeKind,
    record: &ResourceRecord,
) -> Vec<Violation> {
    if kind.is_configured(record) {
        return Vec::new();
    }
    vec![violation_for(
        rule,
        format!(
            "Container does not have a {} probe defined",
            kind.short_name()
        ),
        "not set",
        kind.default_preview(),
    )]
}

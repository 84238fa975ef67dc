//! Fix generation and application.
//!
//! A fix is a [`Patch`] that, merged into a chart's values, should make a
//! violation go away. Callers may inject a chart-aware [`FixGenerator`]; when
//! it declines or fails, the deterministic default table in [`default_fix`]
//! takes over. Both paths agree with each rule's own `fix_preview` policy.

use super::parser::{
    MIB, format_bytes, format_millicores, parse_cpu_millicores, parse_memory_bytes,
    quantity_text,
};
use super::patch::Patch;
use super::record::ResourceRecord;
use super::rules::probes::ProbeKind;
use super::rules::{CHART_NAME_PLACEHOLDER, codes};
use super::thresholds::{BURSTABLE_TARGET_RATIO, ResourceField};
use super::types::{ChartInfo, Violation};
use crate::error::{OptimizerError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default CPU limit when nothing better is known (millicores).
pub const DEFAULT_CPU_LIMIT_MILLICORES: f64 = 500.0;
/// Default memory limit when nothing better is known (bytes).
pub const DEFAULT_MEMORY_LIMIT_BYTES: f64 = 512.0 * MIB;
/// Request floor applied by the CPU bump and fill-in fixes (millicores).
pub const DEFAULT_CPU_REQUEST_MILLICORES: f64 = 100.0;
/// Request floor applied by the memory bump and fill-in fixes (bytes).
pub const DEFAULT_MEMORY_REQUEST_BYTES: f64 = 128.0 * MIB;
/// Replica count proposed for single-replica workloads.
pub const DEFAULT_REPLICA_TARGET: u32 = 2;

/// Rules whose fixes bump a low request and are never trimmed by locks.
const LOCK_EXEMPT_RULES: [&str; 2] = [codes::LOW_CPU_REQUEST, codes::LOW_MEMORY_REQUEST];

// ============================================================================
// Generator contract
// ============================================================================

/// Why a generator could not produce a fix.
#[derive(Debug, Error)]
pub enum FixError {
    /// The chart's values could not be read
    #[error("values for chart `{chart}` are unavailable: {message}")]
    ValuesUnavailable { chart: String, message: String },

    /// The generator does not handle this rule
    #[error("no fix available for rule {0}")]
    Unsupported(String),

    /// Anything else a custom generator wants to report
    #[error("{0}")]
    Other(String),
}

/// Maps a (chart, violation) pair to a patch.
///
/// `Ok(None)` means "no opinion"; callers fall back to the default table.
pub trait FixGenerator: Send + Sync {
    fn generate(
        &self,
        chart: &ChartInfo,
        violation: &Violation,
    ) -> std::result::Result<Option<Patch>, FixError>;
}

// ============================================================================
// Running resource values
// ============================================================================

/// Per-replica resource values a fix is projected onto.
///
/// CPU in millicores, memory in bytes. Zero means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceValues {
    pub cpu_request: f64,
    pub cpu_limit: f64,
    pub memory_request: f64,
    pub memory_limit: f64,
}

impl ResourceValues {
    pub fn from_chart(chart: &ChartInfo) -> Self {
        Self {
            cpu_request: chart.cpu_request,
            cpu_limit: chart.cpu_limit,
            memory_request: chart.memory_request,
            memory_limit: chart.memory_limit,
        }
    }

    /// Overwrite only the fields the patch sets under `resources`.
    ///
    /// Unparseable quantities in the patch are ignored.
    pub fn apply_patch(&mut self, patch: &Patch) {
        let cpu = |section: &str| {
            patch
                .get_value(&["resources", section, "cpu"])
                .and_then(quantity_text)
                .and_then(|t| parse_cpu_millicores(&t))
        };
        let memory = |section: &str| {
            patch
                .get_value(&["resources", section, "memory"])
                .and_then(quantity_text)
                .and_then(|t| parse_memory_bytes(&t))
        };

        if let Some(v) = cpu("requests") {
            self.cpu_request = v;
        }
        if let Some(v) = cpu("limits") {
            self.cpu_limit = v;
        }
        if let Some(v) = memory("requests") {
            self.memory_request = v;
        }
        if let Some(v) = memory("limits") {
            self.memory_limit = v;
        }
    }
}

// ============================================================================
// Default table
// ============================================================================

/// Deterministic fallback fix, computed from the running values.
///
/// Resource rules are projected from `current`; every other rule reuses its
/// own preview with the chart name filled in.
pub fn default_fix(chart_name: &str, violation: &Violation, current: &ResourceValues) -> Option<Patch> {
    let cpu_patch = |section: &str, millicores: f64| {
        Patch::empty().with(&["resources", section, "cpu"], format_millicores(millicores))
    };
    let memory_patch = |section: &str, bytes: f64| {
        Patch::empty().with(&["resources", section, "memory"], format_bytes(bytes))
    };

    let patch = match violation.rule_id.as_str() {
        codes::NO_CPU_LIMITS => {
            let limit = if current.cpu_request > 0.0 {
                (current.cpu_request * 2.0).max(DEFAULT_CPU_LIMIT_MILLICORES)
            } else {
                DEFAULT_CPU_LIMIT_MILLICORES
            };
            cpu_patch("limits", limit)
        }
        codes::NO_MEMORY_LIMITS => {
            let limit = if current.memory_request > 0.0 {
                (current.memory_request * 2.0).max(DEFAULT_MEMORY_LIMIT_BYTES)
            } else {
                DEFAULT_MEMORY_LIMIT_BYTES
            };
            memory_patch("limits", limit)
        }
        codes::NO_RESOURCE_REQUESTS => {
            let mut patch = Patch::empty();
            let fills = [
                (current.cpu_request, "requests", "cpu", format_millicores(DEFAULT_CPU_REQUEST_MILLICORES)),
                (current.memory_request, "requests", "memory", format_bytes(DEFAULT_MEMORY_REQUEST_BYTES)),
                (current.cpu_limit, "limits", "cpu", format_millicores(DEFAULT_CPU_LIMIT_MILLICORES)),
                (current.memory_limit, "limits", "memory", format_bytes(DEFAULT_MEMORY_LIMIT_BYTES)),
            ];
            for (value, section, name, fill) in fills {
                if value <= 0.0 {
                    patch = patch.with(&["resources", section, name], fill);
                }
            }
            patch
        }
        codes::HIGH_CPU_RATIO => {
            if current.cpu_limit <= 0.0 {
                return None;
            }
            let target = (current.cpu_limit / BURSTABLE_TARGET_RATIO).floor();
            Patch::empty().with(&["resources", "requests", "cpu"], format!("{}m", target as u64))
        }
        codes::HIGH_MEMORY_RATIO => {
            if current.memory_limit <= 0.0 {
                return None;
            }
            let target_mi = (current.memory_limit / MIB / BURSTABLE_TARGET_RATIO).floor();
            Patch::empty().with(
                &["resources", "requests", "memory"],
                format!("{}Mi", target_mi as u64),
            )
        }
        codes::LOW_CPU_REQUEST => cpu_patch(
            "requests",
            current.cpu_request.max(DEFAULT_CPU_REQUEST_MILLICORES),
        ),
        codes::NO_MEMORY_REQUEST => {
            if current.memory_request > 0.0 {
                return None;
            }
            memory_patch("requests", DEFAULT_MEMORY_REQUEST_BYTES)
        }
        codes::LOW_MEMORY_REQUEST => memory_patch(
            "requests",
            current.memory_request.max(DEFAULT_MEMORY_REQUEST_BYTES),
        ),
        codes::SINGLE_REPLICA => Patch::empty().with(&["replicaCount"], DEFAULT_REPLICA_TARGET),
        _ => substitute_chart_name(&violation.fix_preview, chart_name),
    };

    (!patch.is_empty()).then_some(patch)
}

/// Ask `generator` first, then fall back to [`default_fix`].
///
/// A failing generator is logged and never aborts the caller.
pub fn resolve_fix(
    generator: Option<&dyn FixGenerator>,
    chart: &ChartInfo,
    violation: &Violation,
    current: &ResourceValues,
) -> Option<Patch> {
    if let Some(generator) = generator {
        match generator.generate(chart, violation) {
            Ok(Some(patch)) => return Some(patch),
            Ok(None) => {}
            Err(e) => log::debug!(
                "Fix generator failed for {} on {}: {}; using default fix",
                violation.rule_id,
                chart.name,
                e
            ),
        }
    }
    default_fix(&chart.name, violation, current)
}

/// Replace the chart-name placeholder anywhere in a patch.
pub fn substitute_chart_name(patch: &Patch, chart_name: &str) -> Patch {
    fn walk(value: &Value, chart_name: &str) -> Value {
        match value {
            Value::String(s) if s == CHART_NAME_PLACEHOLDER => Value::String(chart_name.to_string()),
            Value::Sequence(items) => {
                Value::Sequence(items.iter().map(|v| walk(v, chart_name)).collect())
            }
            Value::Mapping(map) => {
                let mut out = Mapping::new();
                for (k, v) in map {
                    out.insert(k.clone(), walk(v, chart_name));
                }
                Value::Mapping(out)
            }
            other => other.clone(),
        }
    }
    Patch::from_value(walk(&patch.to_value(), chart_name))
}

/// Drop resource fields the optimizer must not touch.
///
/// Returns `None` when nothing is left. Low-request bump rules are exempt.
pub fn strip_fixed_fields(
    patch: Patch,
    fixed: &BTreeSet<ResourceField>,
    rule_id: &str,
) -> Option<Patch> {
    if fixed.is_empty() || LOCK_EXEMPT_RULES.contains(&rule_id) {
        return Some(patch);
    }
    let Patch::Map(mut top) = patch else {
        return Some(patch);
    };
    let Some(Patch::Map(mut resources)) = top.remove("resources") else {
        return Some(Patch::Map(top));
    };

    for field in fixed {
        let (section, name) = field.values_path();
        if let Some(Patch::Map(entries)) = resources.get_mut(section) {
            entries.remove(name);
            if entries.is_empty() {
                resources.remove(section);
            }
        }
    }

    if !resources.is_empty() {
        top.insert("resources".to_string(), Patch::Map(resources));
    }
    let patch = Patch::Map(top);
    (!patch.is_empty()).then_some(patch)
}

// ============================================================================
// Values-aware generator
// ============================================================================

/// How far the ratio fixes pull the request towards the limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatioStrategy {
    /// limit / request = 1.5
    #[default]
    #[serde(rename = "burstable_1_5")]
    Burstable15,
    /// limit / request = 2.0
    #[serde(rename = "burstable_2_0")]
    Burstable20,
    /// request = limit
    #[serde(rename = "guaranteed")]
    Guaranteed,
}

impl RatioStrategy {
    /// Divisor applied to the limit, `None` for request == limit.
    pub fn multiplier(&self) -> Option<f64> {
        match self {
            Self::Burstable15 => Some(BURSTABLE_TARGET_RATIO),
            Self::Burstable20 => Some(2.0),
            Self::Guaranteed => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "burstable_1_5" => Some(Self::Burstable15),
            "burstable_2_0" => Some(Self::Burstable20),
            "guaranteed" => Some(Self::Guaranteed),
            _ => None,
        }
    }
}

/// Probe port as written in values: a number or a named port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbePort {
    Number(u16),
    Name(String),
}

/// Overrides for generated HTTP probes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub path: Option<String>,
    pub port: Option<ProbePort>,
    /// `HTTP` or `HTTPS`; anything else is ignored
    pub scheme: Option<String>,
    pub host: Option<String>,
    /// Single `Name: value` header
    pub header: Option<String>,
    pub initial_delay_seconds: Option<i64>,
    pub timeout_seconds: Option<i64>,
    pub period_seconds: Option<i64>,
    pub success_threshold: Option<i64>,
    pub failure_threshold: Option<i64>,
    pub termination_grace_period_seconds: Option<i64>,
}

/// Default HTTP probe timings per kind: (path, initial delay, timeout, period).
fn probe_defaults(kind: ProbeKind) -> (&'static str, i64, i64, i64) {
    match kind {
        ProbeKind::Liveness => ("/health", 15, 3, 10),
        ProbeKind::Readiness => ("/ready", 5, 3, 5),
        ProbeKind::Startup => ("/health", 5, 3, 5),
    }
}

/// Build an HTTP probe, applying any valid overrides.
pub fn build_http_probe(kind: ProbeKind, settings: Option<&ProbeSettings>) -> Patch {
    let (path, initial_delay, timeout, period) = probe_defaults(kind);
    let mut http_get = Patch::empty()
        .with(&["path"], path)
        .with(&["port"], "http");
    let mut probe = Patch::empty()
        .with(&["initialDelaySeconds"], initial_delay)
        .with(&["timeoutSeconds"], timeout)
        .with(&["periodSeconds"], period)
        .with(&["failureThreshold"], kind.default_failure_threshold());

    if let Some(settings) = settings {
        let non_blank = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(path) = non_blank(&settings.path) {
            http_get = http_get.with(&["path"], path);
        }
        match &settings.port {
            Some(ProbePort::Number(port)) => http_get = http_get.with(&["port"], *port),
            Some(ProbePort::Name(name)) if !name.trim().is_empty() => {
                http_get = http_get.with(&["port"], name.trim())
            }
            _ => {}
        }
        if let Some(scheme) = settings.scheme.as_deref().map(|s| s.trim().to_uppercase())
            && (scheme == "HTTP" || scheme == "HTTPS")
        {
            http_get = http_get.with(&["scheme"], scheme);
        }
        if let Some(host) = non_blank(&settings.host) {
            http_get = http_get.with(&["host"], host);
        }
        if let Some((name, value)) = settings.header.as_deref().and_then(|h| h.split_once(':')) {
            let (name, value) = (name.trim(), value.trim());
            if !name.is_empty() && !value.is_empty() {
                let mut header = Mapping::new();
                header.insert("name".into(), name.into());
                header.insert("value".into(), value.into());
                http_get = http_get.with(&["httpHeaders"], Value::Sequence(vec![Value::Mapping(header)]));
            }
        }

        let timings = [
            ("initialDelaySeconds", settings.initial_delay_seconds),
            ("timeoutSeconds", settings.timeout_seconds),
            ("periodSeconds", settings.period_seconds),
            ("successThreshold", settings.success_threshold),
            ("failureThreshold", settings.failure_threshold),
            ("terminationGracePeriodSeconds", settings.termination_grace_period_seconds),
        ];
        for (field, value) in timings {
            if let Some(v) = value.filter(|v| *v > 0) {
                probe = probe.with(&[field], v);
            }
        }
    }

    probe.insert(&["httpGet"], http_get);
    let mut wrapped = Patch::empty();
    wrapped.insert(&[kind.values_key()], probe);
    wrapped
}

/// Chart-aware generator that reads the chart's values file.
#[derive(Debug, Clone, Default)]
pub struct ValuesFixGenerator {
    ratio_strategy: RatioStrategy,
    probe_settings: Option<ProbeSettings>,
    fixed_fields: BTreeSet<ResourceField>,
}

impl ValuesFixGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ratio_strategy(mut self, strategy: RatioStrategy) -> Self {
        self.ratio_strategy = strategy;
        self
    }

    pub fn with_probe_settings(mut self, settings: ProbeSettings) -> Self {
        self.probe_settings = Some(settings);
        self
    }

    pub fn with_fixed_fields(mut self, fields: BTreeSet<ResourceField>) -> Self {
        self.fixed_fields = fields;
        self
    }

    /// Compute a fix from an already-loaded values tree.
    pub fn fix_for_values(
        &self,
        chart_name: &str,
        violation: &Violation,
        values: &Value,
    ) -> Option<Patch> {
        let record = ResourceRecord::from_value(values.clone());
        let rule_id = violation.rule_id.as_str();

        let patch = match rule_id {
            codes::NO_CPU_LIMITS => {
                let limit = record
                    .cpu_request()
                    .filter(|v| *v > 0.0)
                    .map(|request| format_millicores(request * 2.0))
                    .unwrap_or_else(|| "500m".to_string());
                Patch::empty().with(&["resources", "limits", "cpu"], limit)
            }
            codes::NO_MEMORY_LIMITS => {
                let limit = record
                    .memory_request_mi()
                    .filter(|v| *v > 0.0)
                    .map(|request_mi| format_bytes((request_mi * 2.0).trunc() * MIB))
                    .unwrap_or_else(|| "256Mi".to_string());
                Patch::empty().with(&["resources", "limits", "memory"], limit)
            }
            codes::NO_RESOURCE_REQUESTS => Patch::empty()
                .with(&["resources", "requests", "cpu"], "100m")
                .with(&["resources", "requests", "memory"], "128Mi")
                .with(&["resources", "limits", "cpu"], "500m")
                .with(&["resources", "limits", "memory"], "512Mi"),
            codes::HIGH_CPU_RATIO => {
                let limit = record.cpu_limit().filter(|v| *v > 0.0)?;
                let target = self.ratio_target(limit);
                Patch::empty().with(&["resources", "requests", "cpu"], format!("{}m", target))
            }
            codes::HIGH_MEMORY_RATIO => {
                let limit_mi = record.memory_limit_mi().filter(|v| *v > 0.0)?;
                let target = self.ratio_target(limit_mi);
                Patch::empty().with(&["resources", "requests", "memory"], format!("{}Mi", target))
            }
            codes::LOW_CPU_REQUEST => Patch::empty().with(&["resources", "requests", "cpu"], "100m"),
            codes::NO_MEMORY_REQUEST | codes::LOW_MEMORY_REQUEST => {
                Patch::empty().with(&["resources", "requests", "memory"], "128Mi")
            }
            codes::MISSING_LIVENESS_PROBE => build_http_probe(ProbeKind::Liveness, self.probe_settings.as_ref()),
            codes::MISSING_READINESS_PROBE => build_http_probe(ProbeKind::Readiness, self.probe_settings.as_ref()),
            codes::MISSING_STARTUP_PROBE => build_http_probe(ProbeKind::Startup, self.probe_settings.as_ref()),
            codes::SINGLE_REPLICA => Patch::empty().with(&["replicaCount"], DEFAULT_REPLICA_TARGET),
            _ => substitute_chart_name(&violation.fix_preview, chart_name),
        };

        strip_fixed_fields(patch, &self.fixed_fields, rule_id)
    }

    /// Request for a limit under the configured strategy, at least one unit.
    fn ratio_target(&self, limit: f64) -> u64 {
        let target = match self.ratio_strategy.multiplier() {
            Some(multiplier) => limit / multiplier,
            None => limit,
        };
        (target as u64).max(1)
    }
}

impl FixGenerator for ValuesFixGenerator {
    fn generate(
        &self,
        chart: &ChartInfo,
        violation: &Violation,
    ) -> std::result::Result<Option<Patch>, FixError> {
        let Some(path) = chart.values_file.local_path() else {
            return Err(FixError::ValuesUnavailable {
                chart: chart.name.clone(),
                message: "values are not backed by a local file".to_string(),
            });
        };
        let values = load_values(path).map_err(|e| FixError::ValuesUnavailable {
            chart: chart.name.clone(),
            message: e.to_string(),
        })?;
        Ok(self.fix_for_values(&chart.name, violation, &values))
    }
}

// ============================================================================
// Applying fixes
// ============================================================================

/// Read and parse a values file. An empty file is an empty mapping.
pub fn load_values(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    parse_values(&content)
}

pub(crate) fn parse_values(content: &str) -> Result<Value> {
    let value: Value = serde_yaml::from_str(content)?;
    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

/// Deep-merge `patch` into the values file at `values_path`.
///
/// The original content is written back if the new content cannot be
/// written.
pub fn apply_fix(values_path: &Path, patch: &Patch) -> Result<()> {
    let content = fs::read_to_string(values_path)?;
    let current = parse_values(&content).map_err(|e| OptimizerError::InvalidInput {
        path: PathBuf::from(values_path),
        message: e.to_string(),
    })?;

    let merged = patch.apply_to(&current);
    let rendered = serde_yaml::to_string(&merged)?;

    if let Err(e) = fs::write(values_path, rendered) {
        log::error!("Failed to write values file {}: {}", values_path.display(), e);
        if let Err(rollback) = fs::write(values_path, &content) {
            log::error!(
                "Failed to roll back values file {}: {}",
                values_path.display(),
                rollback
            );
        }
        return Err(e.into());
    }

    log::info!("Applied fix to {}", values_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::types::{Category, Severity};

    fn violation(rule_id: &str) -> Violation {
        Violation {
            rule_id: rule_id.to_string(),
            name: String::new(),
            description: String::new(),
            severity: Severity::Warning,
            category: Category::Resources,
            current_value: String::new(),
            fix_preview: Patch::empty(),
            auto_fixable: true,
        }
    }

    fn str_at<'a>(patch: &'a Patch, path: &[&str]) -> Option<&'a str> {
        patch.get_value(path).and_then(|v| v.as_str())
    }

    #[test]
    fn test_default_cpu_limit_policy() {
        let none = ResourceValues::default();
        let patch = default_fix("api", &violation(codes::NO_CPU_LIMITS), &none).unwrap();
        assert_eq!(str_at(&patch, &["resources", "limits", "cpu"]), Some("500m"));

        let busy = ResourceValues { cpu_request: 400.0, ..Default::default() };
        let patch = default_fix("api", &violation(codes::NO_CPU_LIMITS), &busy).unwrap();
        assert_eq!(str_at(&patch, &["resources", "limits", "cpu"]), Some("800m"));

        let small = ResourceValues { cpu_request: 100.0, ..Default::default() };
        let patch = default_fix("api", &violation(codes::NO_CPU_LIMITS), &small).unwrap();
        assert_eq!(str_at(&patch, &["resources", "limits", "cpu"]), Some("500m"));
    }

    #[test]
    fn test_default_ratio_fix_raises_request_only() {
        let current = ResourceValues { cpu_request: 100.0, cpu_limit: 1000.0, ..Default::default() };
        let patch = default_fix("api", &violation(codes::HIGH_CPU_RATIO), &current).unwrap();
        assert_eq!(str_at(&patch, &["resources", "requests", "cpu"]), Some("666m"));
        assert!(patch.get(&["resources", "limits"]).is_none());
    }

    #[test]
    fn test_default_fill_only_missing_fields() {
        let current = ResourceValues { cpu_limit: 2000.0, ..Default::default() };
        let patch = default_fix("api", &violation(codes::NO_RESOURCE_REQUESTS), &current).unwrap();
        assert_eq!(str_at(&patch, &["resources", "requests", "cpu"]), Some("100m"));
        assert_eq!(str_at(&patch, &["resources", "limits", "memory"]), Some("512Mi"));
        assert!(patch.get(&["resources", "limits", "cpu"]).is_none());
    }

    #[test]
    fn test_apply_patch_is_field_partial() {
        let mut values = ResourceValues {
            cpu_request: 100.0,
            cpu_limit: 200.0,
            memory_request: 64.0 * MIB,
            memory_limit: 128.0 * MIB,
        };
        values.apply_patch(&Patch::empty().with(&["resources", "limits", "cpu"], "1"));
        assert_eq!(values.cpu_limit, 1000.0);
        assert_eq!(values.memory_limit, 128.0 * MIB);
        assert_eq!(values.cpu_request, 100.0);
    }

    struct Failing;
    impl FixGenerator for Failing {
        fn generate(&self, _: &ChartInfo, _: &Violation) -> std::result::Result<Option<Patch>, FixError> {
            Err(FixError::Other("boom".into()))
        }
    }

    struct Fixed;
    impl FixGenerator for Fixed {
        fn generate(&self, _: &ChartInfo, _: &Violation) -> std::result::Result<Option<Patch>, FixError> {
            Ok(Some(Patch::empty().with(&["resources", "requests", "memory"], "1Gi")))
        }
    }

    #[test]
    fn test_resolve_prefers_generator_and_survives_failure() {
        let chart = ChartInfo::new("api");
        let v = violation(codes::NO_MEMORY_REQUEST);
        let current = ResourceValues::default();

        let from_generator = resolve_fix(Some(&Fixed), &chart, &v, &current).unwrap();
        assert_eq!(str_at(&from_generator, &["resources", "requests", "memory"]), Some("1Gi"));

        let fallback = resolve_fix(Some(&Failing), &chart, &v, &current).unwrap();
        assert_eq!(str_at(&fallback, &["resources", "requests", "memory"]), Some("128Mi"));
    }

    #[test]
    fn test_chart_name_substitution() {
        let mut v = violation(codes::NO_PDB);
        v.fix_preview = Patch::empty()
            .with(&["podDisruptionBudget", "labelSelector", "matchLabels", "app"], CHART_NAME_PLACEHOLDER);
        let patch = default_fix("payments", &v, &ResourceValues::default()).unwrap();
        assert_eq!(
            str_at(&patch, &["podDisruptionBudget", "labelSelector", "matchLabels", "app"]),
            Some("payments")
        );
    }

    #[test]
    fn test_values_generator_ratio_strategies() {
        let values: Value =
            serde_yaml::from_str("resources:\n  requests:\n    cpu: 100m\n  limits:\n    cpu: 1\n").unwrap();
        let v = violation(codes::HIGH_CPU_RATIO);

        let default = ValuesFixGenerator::new().fix_for_values("api", &v, &values).unwrap();
        assert_eq!(str_at(&default, &["resources", "requests", "cpu"]), Some("666m"));

        let relaxed = ValuesFixGenerator::new()
            .with_ratio_strategy(RatioStrategy::Burstable20)
            .fix_for_values("api", &v, &values)
            .unwrap();
        assert_eq!(str_at(&relaxed, &["resources", "requests", "cpu"]), Some("500m"));

        let guaranteed = ValuesFixGenerator::new()
            .with_ratio_strategy(RatioStrategy::Guaranteed)
            .fix_for_values("api", &v, &values)
            .unwrap();
        assert_eq!(str_at(&guaranteed, &["resources", "requests", "cpu"]), Some("1000m"));
    }

    #[test]
    fn test_values_generator_doubles_requests() {
        let values: Value =
            serde_yaml::from_str("resources:\n  requests:\n    cpu: 500m\n    memory: 512Mi\n").unwrap();
        let g = ValuesFixGenerator::new();

        let cpu = g.fix_for_values("api", &violation(codes::NO_CPU_LIMITS), &values).unwrap();
        assert_eq!(str_at(&cpu, &["resources", "limits", "cpu"]), Some("1"));
        let mem = g.fix_for_values("api", &violation(codes::NO_MEMORY_LIMITS), &values).unwrap();
        assert_eq!(str_at(&mem, &["resources", "limits", "memory"]), Some("1Gi"));

        let empty = Value::Mapping(Mapping::new());
        let cpu = g.fix_for_values("api", &violation(codes::NO_CPU_LIMITS), &empty).unwrap();
        assert_eq!(str_at(&cpu, &["resources", "limits", "cpu"]), Some("500m"));
    }

    #[test]
    fn test_strip_fixed_fields() {
        let fixed: BTreeSet<_> = [ResourceField::CpuLimit, ResourceField::MemoryLimit].into_iter().collect();
        let patch = Patch::empty()
            .with(&["resources", "requests", "cpu"], "100m")
            .with(&["resources", "limits", "cpu"], "500m");

        let stripped = strip_fixed_fields(patch.clone(), &fixed, codes::NO_RESOURCE_REQUESTS).unwrap();
        assert!(stripped.get(&["resources", "limits"]).is_none());
        assert_eq!(str_at(&stripped, &["resources", "requests", "cpu"]), Some("100m"));

        let only_limit = Patch::empty().with(&["resources", "limits", "cpu"], "500m");
        assert!(strip_fixed_fields(only_limit.clone(), &fixed, codes::NO_CPU_LIMITS).is_none());
        assert!(strip_fixed_fields(only_limit, &fixed, codes::LOW_CPU_REQUEST).is_some());
    }

    #[test]
    fn test_probe_overrides() {
        let settings = ProbeSettings {
            path: Some(" /livez ".into()),
            port: Some(ProbePort::Number(8080)),
            scheme: Some("https".into()),
            header: Some("X-Probe: yes".into()),
            period_seconds: Some(20),
            timeout_seconds: Some(0),
            ..Default::default()
        };
        let patch = build_http_probe(ProbeKind::Liveness, Some(&settings));
        assert_eq!(str_at(&patch, &["livenessProbe", "httpGet", "path"]), Some("/livez"));
        assert_eq!(str_at(&patch, &["livenessProbe", "httpGet", "scheme"]), Some("HTTPS"));
        assert_eq!(
            patch.get_value(&["livenessProbe", "httpGet", "port"]).and_then(|v| v.as_u64()),
            Some(8080)
        );
        assert_eq!(
            patch.get_value(&["livenessProbe", "periodSeconds"]).and_then(|v| v.as_i64()),
            Some(20)
        );
        assert_eq!(
            patch.get_value(&["livenessProbe", "timeoutSeconds"]).and_then(|v| v.as_i64()),
            Some(3)
        );
    }

    #[test]
    fn test_apply_fix_merges_into_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.yaml");
        fs::write(&path, "replicaCount: 1\nresources:\n  limits:\n    memory: 1Gi\n").unwrap();

        apply_fix(&path, &Patch::empty().with(&["resources", "limits", "cpu"], "500m")).unwrap();

        let merged = load_values(&path).unwrap();
        assert_eq!(merged["resources"]["limits"]["cpu"], Value::from("500m"));
        assert_eq!(merged["resources"]["limits"]["memory"], Value::from("1Gi"));
        assert_eq!(merged["replicaCount"], Value::from(1));
    }

    #[test]
    fn test_apply_fix_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(apply_fix(&dir.path().join("nope.yaml"), &Patch::empty()).is_err());
    }
}

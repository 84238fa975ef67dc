//! Rule thresholds and the process-wide threshold registry.
//!
//! Rule checks take an explicit [`RuleThresholds`] value. The registry only
//! decides which value a run starts from: [`configure_thresholds`] builds a
//! new immutable value and swaps it in under a single write lock, so readers
//! always see either the old set or the new one.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Default limit/request ratio at or above which the ratio rules fire.
pub const DEFAULT_LIMIT_REQUEST_RATIO: f64 = 2.0;
/// CPU requests below this many millicores count as very low.
pub const DEFAULT_LOW_CPU_MILLICORES: f64 = 10.0;
/// Memory requests below this many MiB count as very low.
pub const DEFAULT_LOW_MEMORY_MI: f64 = 32.0;
/// A PDB allowing fewer evictions than this blocks node drains.
pub const DEFAULT_PDB_BLOCKING_THRESHOLD: i64 = 1;
/// Low CPU requests are only bumped when the limit is also below this.
pub const DEFAULT_CPU_BUMP_MIN_MILLICORES: f64 = 100.0;
/// Low memory requests are only bumped when the limit is also below this.
pub const DEFAULT_MEMORY_BUMP_MIN_MI: f64 = 128.0;
/// Limit/request ratio the ratio fixes aim for.
pub const BURSTABLE_TARGET_RATIO: f64 = 1.5;

/// A resource field that can be protected from optimizer edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceField {
    CpuRequest,
    CpuLimit,
    MemoryRequest,
    MemoryLimit,
}

impl ResourceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CpuRequest => "cpu_request",
            Self::CpuLimit => "cpu_limit",
            Self::MemoryRequest => "memory_request",
            Self::MemoryLimit => "memory_limit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "cpu_request" => Some(Self::CpuRequest),
            "cpu_limit" => Some(Self::CpuLimit),
            "memory_request" => Some(Self::MemoryRequest),
            "memory_limit" => Some(Self::MemoryLimit),
            _ => None,
        }
    }

    /// `(section, name)` under `resources` this field lives at.
    pub fn values_path(&self) -> (&'static str, &'static str) {
        match self {
            Self::CpuRequest => ("requests", "cpu"),
            Self::CpuLimit => ("limits", "cpu"),
            Self::MemoryRequest => ("requests", "memory"),
            Self::MemoryLimit => ("limits", "memory"),
        }
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable threshold set used by one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    pub limit_request_ratio: f64,
    pub low_cpu_millicores: f64,
    pub low_memory_mi: f64,
    pub pdb_blocking_threshold: i64,
    pub cpu_bump_min_millicores: f64,
    pub memory_bump_min_mi: f64,
    /// Fields the optimizer must never modify
    pub fixed_resource_fields: BTreeSet<ResourceField>,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            limit_request_ratio: DEFAULT_LIMIT_REQUEST_RATIO,
            low_cpu_millicores: DEFAULT_LOW_CPU_MILLICORES,
            low_memory_mi: DEFAULT_LOW_MEMORY_MI,
            pdb_blocking_threshold: DEFAULT_PDB_BLOCKING_THRESHOLD,
            cpu_bump_min_millicores: DEFAULT_CPU_BUMP_MIN_MILLICORES,
            memory_bump_min_mi: DEFAULT_MEMORY_BUMP_MIN_MI,
            fixed_resource_fields: BTreeSet::new(),
        }
    }
}

impl RuleThresholds {
    /// True when the optimizer may not touch `field`.
    pub fn is_fixed(&self, field: ResourceField) -> bool {
        self.fixed_resource_fields.contains(&field)
    }

    /// Builder: lock a resource field.
    pub fn with_fixed_field(mut self, field: ResourceField) -> Self {
        self.fixed_resource_fields.insert(field);
        self
    }

    /// Copy with the valid entries of `overrides` applied.
    ///
    /// Numeric overrides that are not strictly positive are ignored. A
    /// supplied fixed-field set replaces the current one wholesale.
    pub fn with_overrides(&self, overrides: &ThresholdOverrides) -> Self {
        fn positive(v: Option<f64>) -> Option<f64> {
            v.filter(|v| *v > 0.0 && v.is_finite())
        }

        let mut next = self.clone();
        if let Some(v) = positive(overrides.limit_request_ratio) {
            next.limit_request_ratio = v;
        }
        if let Some(v) = positive(overrides.low_cpu_millicores) {
            next.low_cpu_millicores = v;
        }
        if let Some(v) = positive(overrides.low_memory_mi) {
            next.low_memory_mi = v;
        }
        if let Some(v) = overrides.pdb_blocking_threshold.filter(|v| *v > 0) {
            next.pdb_blocking_threshold = v;
        }
        if let Some(v) = positive(overrides.cpu_bump_min_millicores) {
            next.cpu_bump_min_millicores = v;
        }
        if let Some(v) = positive(overrides.memory_bump_min_mi) {
            next.memory_bump_min_mi = v;
        }
        if let Some(fields) = &overrides.fixed_resource_fields {
            next.fixed_resource_fields = fields.clone();
        }
        next
    }
}

/// Partial threshold update, as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOverrides {
    pub limit_request_ratio: Option<f64>,
    pub low_cpu_millicores: Option<f64>,
    pub low_memory_mi: Option<f64>,
    pub pdb_blocking_threshold: Option<i64>,
    pub cpu_bump_min_millicores: Option<f64>,
    pub memory_bump_min_mi: Option<f64>,
    pub fixed_resource_fields: Option<BTreeSet<ResourceField>>,
}

impl ThresholdOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ============================================================================
// Registry
// ============================================================================

static REGISTRY: LazyLock<RwLock<Arc<RuleThresholds>>> =
    LazyLock::new(|| RwLock::new(Arc::new(RuleThresholds::default())));

/// Snapshot of the thresholds currently in effect.
pub fn current_thresholds() -> Arc<RuleThresholds> {
    REGISTRY.read().clone()
}

/// Apply a partial update and return the new threshold set.
pub fn configure_thresholds(overrides: &ThresholdOverrides) -> Arc<RuleThresholds> {
    let mut slot = REGISTRY.write();
    let next = Arc::new(slot.with_overrides(overrides));
    *slot = Arc::clone(&next);
    log::debug!("Rule thresholds updated: {:?}", next);
    next
}

/// Restore the built-in defaults.
pub fn reset_thresholds() -> Arc<RuleThresholds> {
    let next = Arc::new(RuleThresholds::default());
    *REGISTRY.write() = Arc::clone(&next);
    next
}

//! Core types for chart optimization analysis.
//!
//! These types describe rule violations, the charts they are attached to,
//! and the before/after resource projections produced for a fleet.

use super::parser::{cpu_from_value, memory_from_value};
use super::patch::Patch;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Severity
// ============================================================================

/// Severity levels for rule violations.
///
/// Ordered from most severe to least severe: `Error > Warning > Info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be fixed: the workload is at real risk
    Error,
    /// Should be fixed
    #[default]
    Warning,
    /// Informational suggestion
    Info,
}

impl Severity {
    /// Parse a severity from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warning" | "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Error => 2,
            Self::Warning => 1,
            Self::Info => 0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Category
// ============================================================================

/// Rule family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// CPU/memory requests and limits
    Resources,
    /// Liveness, readiness and startup probes
    Probes,
    /// Disruption budgets, spreading and redundancy
    Availability,
    /// Pod and container security context
    Security,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::Probes => "probes",
            Self::Availability => "availability",
            Self::Security => "security",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// QoS
// ============================================================================

/// Kubernetes Quality-of-Service tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QosClass {
    BestEffort,
    Burstable,
    Guaranteed,
}

impl QosClass {
    /// Parse a QoS class name (case-insensitive, surrounding space ignored).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "besteffort" => Some(Self::BestEffort),
            "burstable" => Some(Self::Burstable),
            "guaranteed" => Some(Self::Guaranteed),
            _ => None,
        }
    }
}

// ============================================================================
// Violations
// ============================================================================

/// A single rule violation found in a resource record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Catalog id of the rule that fired (e.g. "RES005")
    pub rule_id: String,
    /// Human-readable rule name
    pub name: String,
    /// What was found, with observed values filled in
    pub description: String,
    pub severity: Severity,
    pub category: Category,
    /// What the rule observed, for display and identity
    pub current_value: String,
    /// Patch the rule itself proposes
    pub fix_preview: Patch,
    pub auto_fixable: bool,
}

/// A violation attached to the chart it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartViolation {
    pub chart_name: String,
    #[serde(flatten)]
    pub violation: Violation,
}

impl ChartViolation {
    pub fn new(chart_name: impl Into<String>, violation: Violation) -> Self {
        Self {
            chart_name: chart_name.into(),
            violation,
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.violation.rule_id
    }

    /// Stable key for per-violation result maps.
    ///
    /// Violations carry no numeric id, so identity is
    /// `chart|rule_id|rule_name|current_value`.
    pub fn identity_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.chart_name, self.violation.rule_id, self.violation.name, self.violation.current_value
        )
    }
}

// ============================================================================
// Charts
// ============================================================================

/// Prefix marking values that came from a live release rather than a file.
pub const CLUSTER_VALUES_PREFIX: &str = "cluster:";

/// Where a chart's values came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValuesSource {
    /// A values file on local disk
    File(PathBuf),
    /// Values read from a deployed release (`cluster:<release>`)
    Cluster(String),
    /// Unknown origin
    #[default]
    Unknown,
}

impl ValuesSource {
    /// Local path, when the values are backed by a file.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path.as_path()),
            _ => None,
        }
    }
}

impl From<Option<String>> for ValuesSource {
    fn from(raw: Option<String>) -> Self {
        match raw {
            None => Self::Unknown,
            Some(s) if s.trim().is_empty() => Self::Unknown,
            Some(s) => match s.strip_prefix(CLUSTER_VALUES_PREFIX) {
                Some(release) => Self::Cluster(release.to_string()),
                None => Self::File(PathBuf::from(s)),
            },
        }
    }
}

impl From<ValuesSource> for Option<String> {
    fn from(source: ValuesSource) -> Self {
        match source {
            ValuesSource::File(path) => Some(path.to_string_lossy().into_owned()),
            ValuesSource::Cluster(release) => Some(format!("{}{}", CLUSTER_VALUES_PREFIX, release)),
            ValuesSource::Unknown => None,
        }
    }
}

impl Serialize for ValuesSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Option::<String>::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValuesSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<String>::deserialize(deserializer).map(ValuesSource::from)
    }
}

/// Fleet-normalized view of one chart.
///
/// CPU values are millicores and memory values bytes, per replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartInfo {
    pub name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub values_file: ValuesSource,
    #[serde(default)]
    pub cpu_request: f64,
    #[serde(default)]
    pub cpu_limit: f64,
    #[serde(default)]
    pub memory_request: f64,
    #[serde(default)]
    pub memory_limit: f64,
    #[serde(default)]
    pub replicas: Option<u32>,
}

impl ChartInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team: String::new(),
            values_file: ValuesSource::Unknown,
            cpu_request: 0.0,
            cpu_limit: 0.0,
            memory_request: 0.0,
            memory_limit: 0.0,
            replicas: None,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    pub fn with_values_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.values_file = ValuesSource::File(path.into());
        self
    }

    /// Set per-replica CPU request/limit (millicores).
    pub fn with_cpu(mut self, request: f64, limit: f64) -> Self {
        self.cpu_request = request;
        self.cpu_limit = limit;
        self
    }

    /// Set per-replica memory request/limit (bytes).
    pub fn with_memory(mut self, request: f64, limit: f64) -> Self {
        self.memory_request = request;
        self.memory_limit = limit;
        self
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Replica count used for fleet totals (never below one).
    pub fn effective_replicas(&self) -> u32 {
        self.replicas.unwrap_or(1).max(1)
    }
}

/// A node from the live cluster inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterNode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instance_type: Option<String>,
    /// Allocatable CPU in millicores
    #[serde(deserialize_with = "deserialize_cpu_quantity")]
    pub cpu_allocatable: f64,
    /// Allocatable memory in bytes
    #[serde(deserialize_with = "deserialize_memory_quantity")]
    pub memory_allocatable: f64,
}

impl ClusterNode {
    pub fn new(
        name: impl Into<String>,
        instance_type: impl Into<String>,
        cpu_allocatable: f64,
        memory_allocatable: f64,
    ) -> Self {
        Self {
            name: name.into(),
            instance_type: Some(instance_type.into()),
            cpu_allocatable,
            memory_allocatable,
        }
    }
}

/// Accept either millicores as a number or a Kubernetes CPU quantity.
fn deserialize_cpu_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("invalid cpu number")),
        _ => cpu_from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid cpu quantity: {:?}", value))),
    }
}

/// Accept either bytes as a number or a Kubernetes memory quantity.
fn deserialize_memory_quantity<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    memory_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid memory quantity: {:?}", value)))
}

// ============================================================================
// Resource Impact
// ============================================================================

/// Per-chart resource snapshot (before or after optimization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartResourceSnapshot {
    pub name: String,
    pub team: String,
    pub replicas: u32,
    pub cpu_request_per_replica: f64,
    pub cpu_limit_per_replica: f64,
    pub memory_request_per_replica: f64,
    pub memory_limit_per_replica: f64,
    pub cpu_request_total: f64,
    pub cpu_limit_total: f64,
    pub memory_request_total: f64,
    pub memory_limit_total: f64,
}

impl ChartResourceSnapshot {
    /// Build a snapshot; totals are always per-replica × max(1, replicas).
    pub fn new(
        name: &str,
        team: &str,
        replicas: u32,
        cpu_request: f64,
        cpu_limit: f64,
        memory_request: f64,
        memory_limit: f64,
    ) -> Self {
        let replicas = replicas.max(1);
        let factor = f64::from(replicas);
        Self {
            name: name.to_string(),
            team: team.to_string(),
            replicas,
            cpu_request_per_replica: cpu_request,
            cpu_limit_per_replica: cpu_limit,
            memory_request_per_replica: memory_request,
            memory_limit_per_replica: memory_limit,
            cpu_request_total: cpu_request * factor,
            cpu_limit_total: cpu_limit * factor,
            memory_request_total: memory_request * factor,
            memory_limit_total: memory_limit * factor,
        }
    }
}

/// Aggregated fleet resource totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetResourceSummary {
    pub cpu_request_total: f64,
    pub cpu_limit_total: f64,
    pub memory_request_total: f64,
    pub memory_limit_total: f64,
    pub chart_count: usize,
    pub total_replicas: u64,
}

/// Difference between before and after summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDelta {
    pub cpu_request_diff: f64,
    pub cpu_limit_diff: f64,
    pub memory_request_diff: f64,
    pub memory_limit_diff: f64,
    pub cpu_request_pct: f64,
    pub cpu_limit_pct: f64,
    pub memory_request_pct: f64,
    pub memory_limit_pct: f64,
    pub replicas_diff: i64,
    pub replicas_pct: f64,
}

/// Instance type used for fixed-catalog node estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceTypeSpec {
    pub name: String,
    pub vcpus: u32,
    pub memory_gib: f64,
    pub cpu_millicores: f64,
    pub memory_bytes: f64,
    /// On-demand hourly price (USD)
    pub hourly_price_usd: f64,
    /// Spot hourly price (USD)
    pub spot_price_usd: f64,
}

impl InstanceTypeSpec {
    pub fn new(
        name: impl Into<String>,
        vcpus: u32,
        memory_gib: f64,
        hourly_price_usd: f64,
        spot_price_usd: f64,
    ) -> Self {
        Self {
            name: name.into(),
            vcpus,
            memory_gib,
            cpu_millicores: f64::from(vcpus) * 1000.0,
            memory_bytes: (memory_gib * 1024.0 * 1024.0 * 1024.0).trunc(),
            hourly_price_usd,
            spot_price_usd,
        }
    }
}

/// Node count estimate for one catalog instance type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEstimation {
    pub instance_type: String,
    pub vcpus: u32,
    pub memory_gib: f64,
    pub nodes_before: u64,
    pub nodes_after: u64,
    pub reduction: i64,
    pub reduction_pct: f64,
    pub spot_price_usd: f64,
    pub cost_before_monthly: f64,
    pub cost_after_monthly: f64,
    pub cost_savings_monthly: f64,
}

/// Live cluster nodes of one instance type, with the projected need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterNodeGroup {
    pub instance_type: String,
    pub node_count: u64,
    pub cpu_allocatable_per_node: f64,
    pub memory_allocatable_per_node: f64,
    pub cpu_allocatable_total: f64,
    pub memory_allocatable_total: f64,
    pub nodes_needed_after: u64,
    pub reduction: i64,
    pub reduction_pct: f64,
    /// Hourly spot price, 0.0 when the instance type is unknown
    pub spot_price_usd: f64,
    pub cost_current_monthly: f64,
    pub cost_after_monthly: f64,
    pub cost_savings_monthly: f64,
}

/// Complete resource impact analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    pub before: FleetResourceSummary,
    pub after: FleetResourceSummary,
    pub delta: ResourceDelta,
    pub before_charts: Vec<ChartResourceSnapshot>,
    pub after_charts: Vec<ChartResourceSnapshot>,
    pub node_estimations: Vec<NodeEstimation>,
    #[serde(default)]
    pub cluster_node_groups: Vec<ClusterNodeGroup>,
    #[serde(default)]
    pub total_spot_savings_monthly: f64,
}

// ============================================================================
// Analysis report
// ============================================================================

/// Output of a full `analyze` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub violations: Vec<ChartViolation>,
    pub impact: ImpactResult,
    pub metadata: AnalysisMetadata,
}

/// Run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub source: String,
    pub timestamp: String,
    pub duration_ms: u64,
    pub version: String,
}

impl AnalysisMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_ms: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

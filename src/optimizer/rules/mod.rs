//! Individual optimization rules for chart workloads.
//!
//! Each rule is implemented as a separate module with a consistent interface.
//! Rules are identified by family codes: RES (resources), PRB (probes),
//! AVL (availability) and SEC (security).

mod avl001;
mod avl002;
mod avl003;
mod avl004;
mod avl005;
mod prb001;
mod prb002;
mod prb003;
pub mod probes;
mod res002;
mod res003;
mod res004;
mod res005;
mod res006;
mod res007;
mod res008;
mod res009;
mod sec001;

use crate::optimizer::patch::Patch;
use crate::optimizer::record::ResourceRecord;
use crate::optimizer::thresholds::RuleThresholds;
use crate::optimizer::types::{Category, Severity, Violation};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Placeholder substituted with the chart name when a fix is generated.
pub const CHART_NAME_PLACEHOLDER: &str = "CHART_NAME";

// ============================================================================
// Rule Trait
// ============================================================================

/// Trait for optimization rules.
///
/// A check is a pure function of the record and the thresholds passed in.
pub trait OptimizationRule: Send + Sync {
    /// Get the rule id (e.g., "RES002").
    fn id(&self) -> &'static str;

    /// Short human-readable name.
    fn name(&self) -> &'static str;

    /// Get the rule description.
    fn description(&self) -> &'static str;

    /// Get the default severity for this rule.
    fn severity(&self) -> Severity;

    fn category(&self) -> Category;

    fn auto_fixable(&self) -> bool {
        true
    }

    /// Evaluate the rule against one record.
    fn check(&self, record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation>;
}

// ============================================================================
// Rule Codes
// ============================================================================

/// Rule id constants.
pub mod codes {
    pub const NO_CPU_LIMITS: &str = "RES002";
    pub const NO_MEMORY_LIMITS: &str = "RES003";
    pub const NO_RESOURCE_REQUESTS: &str = "RES004";
    pub const HIGH_CPU_RATIO: &str = "RES005";
    pub const HIGH_MEMORY_RATIO: &str = "RES006";
    pub const LOW_CPU_REQUEST: &str = "RES007";
    pub const NO_MEMORY_REQUEST: &str = "RES008";
    pub const LOW_MEMORY_REQUEST: &str = "RES009";
    pub const MISSING_LIVENESS_PROBE: &str = "PRB001";
    pub const MISSING_READINESS_PROBE: &str = "PRB002";
    pub const MISSING_STARTUP_PROBE: &str = "PRB003";
    pub const NO_PDB: &str = "AVL001";
    pub const NO_ANTI_AFFINITY: &str = "AVL002";
    pub const BLOCKING_PDB: &str = "AVL003";
    pub const NO_TOPOLOGY_SPREAD: &str = "AVL004";
    pub const SINGLE_REPLICA: &str = "AVL005";
    pub const RUNNING_AS_ROOT: &str = "SEC001";
}

// ============================================================================
// Rule Catalog
// ============================================================================

/// Serializable summary of a rule, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct RuleDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub category: Category,
    pub auto_fixable: bool,
}

/// Ordered rule list with an id index built once.
pub struct RuleCatalog {
    rules: Vec<Box<dyn OptimizationRule>>,
    index: HashMap<&'static str, usize>,
}

impl RuleCatalog {
    fn new(rules: Vec<Box<dyn OptimizationRule>>) -> Self {
        let index = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.id(), i))
            .collect();
        Self { rules, index }
    }

    /// Look up a rule by id in O(1).
    pub fn get(&self, id: &str) -> Option<&dyn OptimizationRule> {
        self.index.get(id).map(|&i| self.rules[i].as_ref())
    }

    /// Catalog position of a rule, used to fold fixes in a stable order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn OptimizationRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn descriptors(&self) -> Vec<RuleDescriptor> {
        self.iter()
            .map(|rule| RuleDescriptor {
                id: rule.id(),
                name: rule.name(),
                description: rule.description(),
                severity: rule.severity(),
                category: rule.category(),
                auto_fixable: rule.auto_fixable(),
            })
            .collect()
    }
}

static CATALOG: LazyLock<RuleCatalog> = LazyLock::new(|| RuleCatalog::new(all_rules()));

/// The process-wide rule catalog.
pub fn catalog() -> &'static RuleCatalog {
    &CATALOG
}

/// Get a rule by id.
pub fn get_rule(id: &str) -> Option<&'static dyn OptimizationRule> {
    CATALOG.get(id)
}

/// All optimization rules, in catalog order.
pub fn all_rules() -> Vec<Box<dyn OptimizationRule>> {
    vec![
        Box::new(res002::NoCpuLimitsRule),
        Box::new(res003::NoMemoryLimitsRule),
        Box::new(res004::NoResourceRequestsRule),
        Box::new(res005::HighCpuRatioRule),
        Box::new(res006::HighMemoryRatioRule),
        Box::new(res007::LowCpuRequestRule),
        Box::new(res008::NoMemoryRequestRule),
        Box::new(res009::LowMemoryRequestRule),
        Box::new(prb001::MissingLivenessProbeRule),
        Box::new(prb002::MissingReadinessProbeRule),
        Box::new(prb003::MissingStartupProbeRule),
        Box::new(avl001::NoPdbRule),
        Box::new(avl002::NoAntiAffinityRule),
        Box::new(avl003::BlockingPdbRule),
        Box::new(avl004::NoTopologySpreadRule),
        Box::new(avl005::SingleReplicaRule),
        Box::new(sec001::RunningAsRootRule),
    ]
}

// ============================================================================
// Helpers shared by rule implementations
// ============================================================================

/// Build a violation carrying the rule's own metadata.
pub(crate) fn violation_for<R: OptimizationRule + ?Sized>(
    rule: &R,
    description: impl Into<String>,
    current_value: impl Into<String>,
    fix_preview: Patch,
) -> Violation {
    Violation {
        rule_id: rule.id().to_string(),
        name: rule.name().to_string(),
        description: description.into(),
        severity: rule.severity(),
        category: rule.category(),
        current_value: current_value.into(),
        fix_preview,
        auto_fixable: rule.auto_fixable(),
    }
}

/// Short display form of a values-tree scalar.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// `labelSelector` pointing at the chart's pods.
pub(crate) fn chart_label_selector() -> Value {
    let mut match_labels = serde_yaml::Mapping::new();
    match_labels.insert("app".into(), CHART_NAME_PLACEHOLDER.into());
    let mut selector = serde_yaml::Mapping::new();
    selector.insert("matchLabels".into(), Value::Mapping(match_labels));
    Value::Mapping(selector)
}

// Re-export rule implementations for direct access
pub use avl001::NoPdbRule;
pub use avl002::NoAntiAffinityRule;
pub use avl003::BlockingPdbRule;
pub use avl004::NoTopologySpreadRule;
pub use avl005::SingleReplicaRule;
pub use prb001::MissingLivenessProbeRule;
pub use prb002::MissingReadinessProbeRule;
pub use prb003::MissingStartupProbeRule;
pub use res002::NoCpuLimitsRule;
pub use res003::NoMemoryLimitsRule;
pub use res004::NoResourceRequestsRule;
pub use res005::HighCpuRatioRule;
pub use res006::HighMemoryRatioRule;
pub use res007::LowCpuRequestRule;
pub use res008::NoMemoryRequestRule;
pub use res009::LowMemoryRequestRule;
pub use sec001::RunningAsRootRule;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_indexed_and_ordered() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 17);
        assert_eq!(catalog.position(codes::NO_CPU_LIMITS), Some(0));
        assert_eq!(catalog.position(codes::RUNNING_AS_ROOT), Some(16));
        assert_eq!(get_rule("AVL003").map(|r| r.name()), Some("Blocking PDB Configuration"));
        assert!(get_rule("RES001").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let rules = all_rules();
        let mut ids: Vec<_> = rules.iter().map(|r| r.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn test_every_rule_is_auto_fixable() {
        assert!(catalog().descriptors().iter().all(|d| d.auto_fixable));
    }
}

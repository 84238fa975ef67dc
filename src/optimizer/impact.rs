//! Resource Impact Calculator
//!
//! Projects the fleet's resource usage after all resource-affecting fixes are
//! applied, aggregates before/after totals, and estimates node counts and
//! spot cost. Two node strategies exist: a fixed instance-type catalog and,
//! when a live inventory is supplied, the cluster's real node groups.
//!
//! Node counts are a lower-bound `max(ceil(cpu), ceil(mem), 1)` estimate, not
//! bin packing. The cluster split is proportional to each group's share of
//! allocatable capacity, not a scheduler simulation.

use super::fixer::{FixGenerator, ResourceValues, resolve_fix};
use super::instance_types::{
    ALLOCATABLE_RATIO, DEFAULT_OVERHEAD_PCT, HOURS_PER_MONTH, default_instance_types, spot_price,
};
use super::rules::{catalog, codes};
use super::types::{
    ChartInfo, ChartResourceSnapshot, ChartViolation, ClusterNode, ClusterNodeGroup,
    FleetResourceSummary, ImpactResult, InstanceTypeSpec, NodeEstimation, ResourceDelta,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Rules whose fixes change CPU or memory values.
pub const RESOURCE_RULE_IDS: [&str; 8] = [
    codes::NO_CPU_LIMITS,
    codes::NO_MEMORY_LIMITS,
    codes::NO_RESOURCE_REQUESTS,
    codes::HIGH_CPU_RATIO,
    codes::HIGH_MEMORY_RATIO,
    codes::LOW_CPU_REQUEST,
    codes::NO_MEMORY_REQUEST,
    codes::LOW_MEMORY_REQUEST,
];

/// Rules whose fixes change the replica count.
pub const REPLICA_RULE_IDS: [&str; 1] = [codes::SINGLE_REPLICA];

/// Node group name used when a node reports no instance type.
const UNKNOWN_INSTANCE_TYPE: &str = "unknown";

/// Computes before/after resource impact for a fleet of charts.
#[derive(Clone)]
pub struct ResourceImpactCalculator {
    overhead_pct: f64,
    instance_types: Vec<InstanceTypeSpec>,
    fix_generator: Option<Arc<dyn FixGenerator>>,
}

impl Default for ResourceImpactCalculator {
    fn default() -> Self {
        Self {
            overhead_pct: DEFAULT_OVERHEAD_PCT,
            instance_types: default_instance_types(),
            fix_generator: None,
        }
    }
}

impl ResourceImpactCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// System overhead share (0.0 to 1.0).
    pub fn with_overhead_pct(mut self, overhead_pct: f64) -> Self {
        self.overhead_pct = overhead_pct;
        self
    }

    /// Replace the fixed instance-type catalog. An empty list keeps the defaults.
    pub fn with_instance_types(mut self, instance_types: Vec<InstanceTypeSpec>) -> Self {
        if !instance_types.is_empty() {
            self.instance_types = instance_types;
        }
        self
    }

    pub fn with_fix_generator(mut self, generator: Arc<dyn FixGenerator>) -> Self {
        self.fix_generator = Some(generator);
        self
    }

    pub fn overhead_pct(&self) -> f64 {
        self.overhead_pct
    }

    /// Run the full impact analysis.
    pub fn compute_impact(
        &self,
        charts: &[ChartInfo],
        violations: &[ChartViolation],
        cluster_nodes: Option<&[ClusterNode]>,
    ) -> ImpactResult {
        let mut by_chart: HashMap<&str, Vec<&ChartViolation>> = HashMap::new();
        for v in violations {
            let rule_id = v.rule_id();
            if RESOURCE_RULE_IDS.contains(&rule_id) || REPLICA_RULE_IDS.contains(&rule_id) {
                by_chart.entry(v.chart_name.as_str()).or_default().push(v);
            }
        }

        let mut before_charts = Vec::with_capacity(charts.len());
        let mut after_charts = Vec::with_capacity(charts.len());
        for chart in charts {
            before_charts.push(before_snapshot(chart));
            let chart_violations = by_chart.get(chart.name.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            after_charts.push(self.after_snapshot(chart, chart_violations));
        }

        let before = aggregate(&before_charts);
        let after = aggregate(&after_charts);
        let delta = compute_delta(&before, &after);

        let node_estimations =
            estimate_nodes(&before, &after, &self.instance_types, self.overhead_pct);
        let cluster_node_groups = match cluster_nodes {
            Some(nodes) if !nodes.is_empty() => {
                estimate_from_cluster_nodes(&after, nodes, self.overhead_pct)
            }
            _ => Vec::new(),
        };

        let total_spot_savings_monthly = if cluster_node_groups.is_empty() {
            node_estimations.iter().map(|e| e.cost_savings_monthly).sum()
        } else {
            cluster_node_groups.iter().map(|g| g.cost_savings_monthly).sum()
        };

        log::info!(
            "Impact: {} chart(s), cpu request {:+.1}%, memory request {:+.1}%",
            before.chart_count,
            delta.cpu_request_pct,
            delta.memory_request_pct
        );

        ImpactResult {
            before,
            after,
            delta,
            before_charts,
            after_charts,
            node_estimations,
            cluster_node_groups,
            total_spot_savings_monthly,
        }
    }

    /// Project a chart's values with its impact-relevant violations fixed.
    ///
    /// Violations are folded in catalog order. Each rule touches its own
    /// fields, so the order only matters for determinism.
    fn after_snapshot(&self, chart: &ChartInfo, violations: &[&ChartViolation]) -> ChartResourceSnapshot {
        let mut ordered: Vec<&ChartViolation> = violations.to_vec();
        ordered.sort_by_key(|v| catalog().position(v.rule_id()).unwrap_or(usize::MAX));

        let generator = self.fix_generator.as_deref();
        let mut values = ResourceValues::from_chart(chart);
        let mut replicas = chart.effective_replicas();

        for v in ordered {
            let rule_id = v.rule_id();
            if RESOURCE_RULE_IDS.contains(&rule_id) {
                if let Some(patch) = resolve_fix(generator, chart, &v.violation, &values) {
                    values.apply_patch(&patch);
                }
            } else if REPLICA_RULE_IDS.contains(&rule_id) {
                let from_generator = generator
                    .and_then(|g| g.generate(chart, &v.violation).ok().flatten())
                    .and_then(|patch| patch.get_value(&["replicaCount"]).and_then(|r| r.as_u64()));
                replicas = match from_generator {
                    Some(count) => u32::try_from(count).unwrap_or(u32::MAX).max(1),
                    None => replicas.max(2),
                };
            }
        }

        ChartResourceSnapshot::new(
            &chart.name,
            &chart.team,
            replicas,
            values.cpu_request,
            values.cpu_limit,
            values.memory_request,
            values.memory_limit,
        )
    }
}

/// Snapshot of a chart's current values.
pub fn before_snapshot(chart: &ChartInfo) -> ChartResourceSnapshot {
    ChartResourceSnapshot::new(
        &chart.name,
        &chart.team,
        chart.effective_replicas(),
        chart.cpu_request,
        chart.cpu_limit,
        chart.memory_request,
        chart.memory_limit,
    )
}

/// Sum snapshot totals into a fleet summary.
pub fn aggregate(snapshots: &[ChartResourceSnapshot]) -> FleetResourceSummary {
    snapshots.iter().fold(
        FleetResourceSummary {
            chart_count: snapshots.len(),
            ..Default::default()
        },
        |mut acc, snap| {
            acc.cpu_request_total += snap.cpu_request_total;
            acc.cpu_limit_total += snap.cpu_limit_total;
            acc.memory_request_total += snap.memory_request_total;
            acc.memory_limit_total += snap.memory_limit_total;
            acc.total_replicas += u64::from(snap.replicas);
            acc
        },
    )
}

/// Percentage change with a zero baseline: 0 -> 0 is 0%, 0 -> anything is 100%.
pub fn pct_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        if new == 0.0 { 0.0 } else { 100.0 }
    } else {
        (new - old) / old * 100.0
    }
}

/// Difference between two fleet summaries.
pub fn compute_delta(before: &FleetResourceSummary, after: &FleetResourceSummary) -> ResourceDelta {
    ResourceDelta {
        cpu_request_diff: after.cpu_request_total - before.cpu_request_total,
        cpu_limit_diff: after.cpu_limit_total - before.cpu_limit_total,
        memory_request_diff: after.memory_request_total - before.memory_request_total,
        memory_limit_diff: after.memory_limit_total - before.memory_limit_total,
        cpu_request_pct: pct_change(before.cpu_request_total, after.cpu_request_total),
        cpu_limit_pct: pct_change(before.cpu_limit_total, after.cpu_limit_total),
        memory_request_pct: pct_change(before.memory_request_total, after.memory_request_total),
        memory_limit_pct: pct_change(before.memory_limit_total, after.memory_limit_total),
        replicas_diff: after.total_replicas as i64 - before.total_replicas as i64,
        replicas_pct: pct_change(before.total_replicas as f64, after.total_replicas as f64),
    }
}

/// `max(ceil(cpu / usable_cpu), ceil(mem / usable_mem), 1)`
fn nodes_for(cpu: f64, memory: f64, usable_cpu: f64, usable_memory: f64) -> u64 {
    let by_cpu = (cpu / usable_cpu).ceil().max(0.0) as u64;
    let by_memory = (memory / usable_memory).ceil().max(0.0) as u64;
    by_cpu.max(by_memory).max(1)
}

fn reduction_pct(reduction: i64, baseline: u64) -> f64 {
    if baseline == 0 {
        0.0
    } else {
        reduction as f64 / baseline as f64 * 100.0
    }
}

/// Node counts per catalog instance type, before and after.
pub fn estimate_nodes(
    before: &FleetResourceSummary,
    after: &FleetResourceSummary,
    instance_types: &[InstanceTypeSpec],
    overhead_pct: f64,
) -> Vec<NodeEstimation> {
    let mut estimations = Vec::with_capacity(instance_types.len());

    for spec in instance_types {
        let usable_cpu = spec.cpu_millicores * ALLOCATABLE_RATIO * (1.0 - overhead_pct);
        let usable_memory = spec.memory_bytes * ALLOCATABLE_RATIO * (1.0 - overhead_pct);
        if usable_cpu <= 0.0 || usable_memory <= 0.0 {
            log::debug!("Skipping {}: no usable capacity", spec.name);
            continue;
        }

        let nodes_before = nodes_for(
            before.cpu_request_total,
            before.memory_request_total,
            usable_cpu,
            usable_memory,
        );
        let nodes_after = nodes_for(
            after.cpu_request_total,
            after.memory_request_total,
            usable_cpu,
            usable_memory,
        );
        let reduction = nodes_before as i64 - nodes_after as i64;

        let cost_before = nodes_before as f64 * spec.spot_price_usd * HOURS_PER_MONTH;
        let cost_after = nodes_after as f64 * spec.spot_price_usd * HOURS_PER_MONTH;

        estimations.push(NodeEstimation {
            instance_type: spec.name.clone(),
            vcpus: spec.vcpus,
            memory_gib: spec.memory_gib,
            nodes_before,
            nodes_after,
            reduction,
            reduction_pct: reduction_pct(reduction, nodes_before),
            spot_price_usd: spec.spot_price_usd,
            cost_before_monthly: cost_before,
            cost_after_monthly: cost_after,
            cost_savings_monthly: cost_before - cost_after,
        });
    }

    estimations
}

/// Node needs per live instance-type group, after optimization.
///
/// The fleet's after totals are split across groups by each group's share of
/// cluster allocatable capacity.
pub fn estimate_from_cluster_nodes(
    after: &FleetResourceSummary,
    nodes: &[ClusterNode],
    overhead_pct: f64,
) -> Vec<ClusterNodeGroup> {
    let mut groups: BTreeMap<&str, Vec<&ClusterNode>> = BTreeMap::new();
    for node in nodes {
        let instance_type = node
            .instance_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_INSTANCE_TYPE);
        groups.entry(instance_type).or_default().push(node);
    }

    let cluster_cpu: f64 = nodes.iter().map(|n| n.cpu_allocatable).sum();
    let cluster_memory: f64 = nodes.iter().map(|n| n.memory_allocatable).sum();

    let mut result = Vec::with_capacity(groups.len());
    for (instance_type, members) in groups {
        let node_count = members.len() as u64;
        let cpu_total: f64 = members.iter().map(|n| n.cpu_allocatable).sum();
        let memory_total: f64 = members.iter().map(|n| n.memory_allocatable).sum();
        let cpu_per_node = cpu_total / node_count as f64;
        let memory_per_node = memory_total / node_count as f64;

        let usable_cpu = cpu_per_node * (1.0 - overhead_pct);
        let usable_memory = memory_per_node * (1.0 - overhead_pct);
        if usable_cpu <= 0.0 || usable_memory <= 0.0 {
            log::debug!("Skipping node group {}: no usable capacity", instance_type);
            continue;
        }

        let cpu_share = if cluster_cpu > 0.0 { cpu_total / cluster_cpu } else { 0.0 };
        let memory_share = if cluster_memory > 0.0 { memory_total / cluster_memory } else { 0.0 };

        let nodes_needed = nodes_for(
            after.cpu_request_total * cpu_share,
            after.memory_request_total * memory_share,
            usable_cpu,
            usable_memory,
        );
        let reduction = node_count as i64 - nodes_needed as i64;

        // Unknown types are priced at zero rather than guessed
        let price = spot_price(instance_type).unwrap_or(0.0);
        let cost_current = node_count as f64 * price * HOURS_PER_MONTH;
        let cost_after = nodes_needed as f64 * price * HOURS_PER_MONTH;

        result.push(ClusterNodeGroup {
            instance_type: instance_type.to_string(),
            node_count,
            cpu_allocatable_per_node: cpu_per_node,
            memory_allocatable_per_node: memory_per_node,
            cpu_allocatable_total: cpu_total,
            memory_allocatable_total: memory_total,
            nodes_needed_after: nodes_needed,
            reduction,
            reduction_pct: reduction_pct(reduction, node_count),
            spot_price_usd: price,
            cost_current_monthly: cost_current,
            cost_after_monthly: cost_after,
            cost_savings_monthly: cost_current - cost_after,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::fixer::FixError;
    use crate::optimizer::parser::{GIB, MIB};
    use crate::optimizer::patch::Patch;
    use crate::optimizer::types::{Category, Severity, Violation};

    fn violation(chart: &str, rule_id: &str) -> ChartViolation {
        ChartViolation::new(
            chart,
            Violation {
                rule_id: rule_id.to_string(),
                name: rule_id.to_string(),
                description: String::new(),
                severity: Severity::Warning,
                category: Category::Resources,
                current_value: String::new(),
                fix_preview: Patch::empty(),
                auto_fixable: true,
            },
        )
    }

    fn chart() -> ChartInfo {
        ChartInfo::new("api")
            .with_team("core")
            .with_cpu(100.0, 1000.0)
            .with_memory(128.0 * MIB, 512.0 * MIB)
            .with_replicas(2)
    }

    #[test]
    fn test_no_violations_means_no_change() {
        let result = ResourceImpactCalculator::new().compute_impact(&[chart()], &[], None);
        assert_eq!(result.before, result.after);
        assert_eq!(result.delta, ResourceDelta::default());
        assert!(result.node_estimations.iter().all(|e| e.reduction == 0));
        assert_eq!(result.total_spot_savings_monthly, 0.0);
    }

    #[test]
    fn test_ratio_fix_raises_request() {
        let violations = vec![violation("api", codes::HIGH_CPU_RATIO)];
        let result = ResourceImpactCalculator::new().compute_impact(&[chart()], &violations, None);

        let after = &result.after_charts[0];
        assert_eq!(after.cpu_request_per_replica, 666.0);
        assert_eq!(after.cpu_limit_per_replica, 1000.0);
        assert_eq!(after.cpu_request_total, 1332.0);
        assert!(result.delta.cpu_request_pct > 0.0);
    }

    #[test]
    fn test_non_impact_rules_are_ignored() {
        let violations = vec![
            violation("api", codes::MISSING_LIVENESS_PROBE),
            violation("api", codes::RUNNING_AS_ROOT),
        ];
        let result = ResourceImpactCalculator::new().compute_impact(&[chart()], &violations, None);
        assert_eq!(result.before, result.after);
    }

    #[test]
    fn test_single_replica_defaults_to_two() {
        let single = ChartInfo::new("worker").with_cpu(100.0, 200.0).with_replicas(1);
        let violations = vec![violation("worker", codes::SINGLE_REPLICA)];
        let result = ResourceImpactCalculator::new().compute_impact(&[single], &violations, None);
        assert_eq!(result.after_charts[0].replicas, 2);
        assert_eq!(result.delta.replicas_diff, 1);
        assert_eq!(result.delta.replicas_pct, 100.0);
    }

    struct ThreeReplicas;
    impl FixGenerator for ThreeReplicas {
        fn generate(&self, _: &ChartInfo, v: &Violation) -> Result<Option<Patch>, FixError> {
            if v.rule_id == codes::SINGLE_REPLICA {
                Ok(Some(Patch::empty().with(&["replicaCount"], 3)))
            } else {
                Err(FixError::Other("not mine".into()))
            }
        }
    }

    #[test]
    fn test_generator_overrides_defaults() {
        let single = ChartInfo::new("worker").with_replicas(1);
        let violations = vec![
            violation("worker", codes::SINGLE_REPLICA),
            violation("worker", codes::NO_CPU_LIMITS),
        ];
        let result = ResourceImpactCalculator::new()
            .with_fix_generator(Arc::new(ThreeReplicas))
            .compute_impact(&[single], &violations, None);
        assert_eq!(result.after_charts[0].replicas, 3);
        // generator failed for RES002, default table applied
        assert_eq!(result.after_charts[0].cpu_limit_per_replica, 500.0);
    }

    #[test]
    fn test_pct_zero_baseline() {
        assert_eq!(pct_change(0.0, 0.0), 0.0);
        assert_eq!(pct_change(0.0, 5.0), 100.0);
        assert_eq!(pct_change(7.0, 7.0), 0.0);
        assert_eq!(pct_change(200.0, 100.0), -50.0);
    }

    #[test]
    fn test_fixed_catalog_node_estimate() {
        let spec = InstanceTypeSpec::new("m5.large", 2, 8.0, 0.096, 0.035);
        let summary = FleetResourceSummary {
            cpu_request_total: 3100.0,
            memory_request_total: GIB,
            chart_count: 1,
            total_replicas: 1,
            ..Default::default()
        };
        let est = estimate_nodes(&summary, &summary, &[spec], 0.15);
        // usable cpu = 2000 * 0.92 * 0.85 = 1564
        assert_eq!(est[0].nodes_before, 2);
        assert_eq!(est[0].cost_before_monthly, 2.0 * 0.035 * 730.0);
        assert_eq!(est[0].reduction_pct, 0.0);
    }

    #[test]
    fn test_instance_without_capacity_is_skipped() {
        let spec = InstanceTypeSpec::new("nano", 0, 0.5, 0.001, 0.001);
        let summary = FleetResourceSummary::default();
        assert!(estimate_nodes(&summary, &summary, &[spec], 0.15).is_empty());
    }

    #[test]
    fn test_cluster_groups_split_proportionally() {
        let nodes = vec![
            ClusterNode::new("a", "m5.large", 2000.0, 8.0 * GIB),
            ClusterNode::new("b", "m5.large", 2000.0, 8.0 * GIB),
            ClusterNode::new("c", "x9.custom", 4000.0, 16.0 * GIB),
        ];
        let after = FleetResourceSummary {
            cpu_request_total: 2000.0,
            memory_request_total: 4.0 * GIB,
            ..Default::default()
        };

        let groups = estimate_from_cluster_nodes(&after, &nodes, 0.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].instance_type, "m5.large");
        assert_eq!(groups[0].node_count, 2);
        assert_eq!(groups[0].nodes_needed_after, 1);
        assert_eq!(groups[0].reduction, 1);
        assert_eq!(groups[0].spot_price_usd, 0.035);
        // unknown type is never priced
        assert_eq!(groups[1].spot_price_usd, 0.0);
        assert_eq!(groups[1].cost_savings_monthly, 0.0);
    }

    #[test]
    fn test_cluster_groups_win_for_total_savings() {
        let nodes = vec![
            ClusterNode::new("a", "m5.large", 2000.0, 8.0 * GIB),
            ClusterNode::new("b", "m5.large", 2000.0, 8.0 * GIB),
        ];
        let small = ChartInfo::new("tiny").with_cpu(50.0, 100.0).with_memory(64.0 * MIB, 64.0 * MIB);
        let result = ResourceImpactCalculator::new().compute_impact(&[small], &[], Some(&nodes));
        assert_eq!(result.cluster_node_groups.len(), 1);
        let expected = result.cluster_node_groups[0].cost_savings_monthly;
        assert_eq!(result.total_spot_savings_monthly, expected);
        assert!(expected > 0.0);
    }

    #[test]
    fn test_unnamed_nodes_group_as_unknown() {
        let mut node = ClusterNode::new("a", "", 1000.0, GIB);
        node.instance_type = None;
        let groups = estimate_from_cluster_nodes(&FleetResourceSummary::default(), &[node], 0.15);
        assert_eq!(groups[0].instance_type, "unknown");
    }
}

//! Violation detection.
//!
//! Runs the rule catalog over resource records and attaches the results to
//! their chart. Rules see the thresholds handed in for the run and nothing
//! else.

use super::record::ResourceRecord;
use super::rules::catalog;
use super::thresholds::RuleThresholds;
use super::types::{ChartViolation, Severity, Violation};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Filters applied while detecting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// Rule ids to skip entirely
    pub ignore_rules: BTreeSet<String>,
    /// Violations below this severity are dropped
    pub min_severity: Severity,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            ignore_rules: BTreeSet::new(),
            min_severity: Severity::Info,
        }
    }
}

impl DetectorOptions {
    pub fn with_ignored_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.ignore_rules.insert(rule_id.into());
        self
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Check if a rule should be skipped.
    pub fn should_ignore_rule(&self, rule_id: &str) -> bool {
        self.ignore_rules.contains(rule_id)
    }
}

/// Run every catalog rule against one record.
pub fn detect(record: &ResourceRecord, thresholds: &RuleThresholds) -> Vec<Violation> {
    detect_with(record, thresholds, &DetectorOptions::default())
}

/// Run the catalog against one record, honoring `options`.
pub fn detect_with(
    record: &ResourceRecord,
    thresholds: &RuleThresholds,
    options: &DetectorOptions,
) -> Vec<Violation> {
    catalog()
        .iter()
        .filter(|rule| !options.should_ignore_rule(rule.id()))
        .flat_map(|rule| rule.check(record, thresholds))
        .filter(|v| v.severity >= options.min_severity)
        .collect()
}

/// Detect violations across all container records of one chart.
///
/// Identical violations raised by several containers are reported once.
pub fn analyze_chart(
    chart_name: &str,
    records: &[ResourceRecord],
    thresholds: &RuleThresholds,
    options: &DetectorOptions,
) -> Vec<ChartViolation> {
    let mut found: Vec<ChartViolation> = Vec::new();
    for record in records {
        for violation in detect_with(record, thresholds, options) {
            if !found.iter().any(|existing| existing.violation == violation) {
                found.push(ChartViolation::new(chart_name, violation));
            }
        }
    }
    found
}

/// Detect violations for a whole fleet in parallel.
///
/// Results keep the order of `inputs`.
pub fn analyze_fleet(
    inputs: &[(&str, &[ResourceRecord])],
    thresholds: &RuleThresholds,
    options: &DetectorOptions,
) -> Vec<ChartViolation> {
    let per_chart: Vec<Vec<ChartViolation>> = inputs
        .par_iter()
        .map(|(name, records)| analyze_chart(name, records, thresholds, options))
        .collect();

    let violations: Vec<ChartViolation> = per_chart.into_iter().flatten().collect();
    log::info!(
        "Detected {} violation(s) across {} chart(s)",
        violations.len(),
        inputs.len()
    );
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::rules::codes;

    fn record(text: &str) -> ResourceRecord {
        ResourceRecord::from_yaml_str(text).unwrap()
    }

    fn healthy() -> ResourceRecord {
        record(
            r#"
replicas: 3
resources:
  requests: {cpu: 250m, memory: 256Mi}
  limits: {cpu: 300m, memory: 320Mi}
livenessProbe: {httpGet: {path: /health, port: http}}
readinessProbe: {httpGet: {path: /ready, port: http}}
startupProbe: {httpGet: {path: /health, port: http}}
podDisruptionBudget: {maxUnavailable: 1}
has_anti_affinity: true
topologySpreadConstraints: [{maxSkew: 1}]
securityContext: {runAsUser: 1000}
"#,
        )
    }

    #[test]
    fn test_healthy_record_is_clean() {
        assert!(detect(&healthy(), &RuleThresholds::default()).is_empty());
    }

    #[test]
    fn test_empty_record_reports_presence_rules() {
        let ids: Vec<String> = detect(&ResourceRecord::new(), &RuleThresholds::default())
            .into_iter()
            .map(|v| v.rule_id)
            .collect();
        assert!(ids.contains(&codes::NO_CPU_LIMITS.to_string()));
        assert!(ids.contains(&codes::NO_RESOURCE_REQUESTS.to_string()));
        assert!(!ids.contains(&codes::NO_MEMORY_REQUEST.to_string()));
        assert!(!ids.contains(&codes::NO_PDB.to_string()));
    }

    #[test]
    fn test_options_filter() {
        let options = DetectorOptions::default()
            .with_ignored_rule(codes::MISSING_STARTUP_PROBE)
            .with_min_severity(Severity::Warning);
        let violations = detect_with(&ResourceRecord::new(), &RuleThresholds::default(), &options);
        assert!(violations.iter().all(|v| v.severity >= Severity::Warning));
        assert!(violations.iter().all(|v| v.rule_id != codes::MISSING_STARTUP_PROBE));
    }

    #[test]
    fn test_chart_level_dedup() {
        let mut root = healthy();
        root.set("securityContext", record("runAsUser: 0").into_value());

        let records = vec![root.clone(), root, healthy()];
        let found = analyze_chart("api", &records, &RuleThresholds::default(), &DetectorOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].chart_name, "api");
        assert_eq!(found[0].rule_id(), codes::RUNNING_AS_ROOT);
    }

    #[test]
    fn test_fleet_keeps_input_order() {
        let limits_only = "replicas: 1\nresources:\n  limits:\n    cpu: 500m\n";
        let a = vec![record(limits_only)];
        let b = vec![healthy()];
        let c = vec![record(limits_only)];
        let inputs: Vec<(&str, &[ResourceRecord])> =
            vec![("a", a.as_slice()), ("b", b.as_slice()), ("c", c.as_slice())];
        let options = DetectorOptions::default().with_min_severity(Severity::Error);

        let found = analyze_fleet(&inputs, &RuleThresholds::default(), &options);
        let charts: Vec<&str> = found.iter().map(|v| v.chart_name.as_str()).collect();
        assert!(!charts.contains(&"b"));
        let first_c = charts.iter().position(|c| *c == "c").unwrap();
        assert!(charts[..first_c].iter().all(|c| *c == "a"));
    }
}

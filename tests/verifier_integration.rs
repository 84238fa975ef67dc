use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use chart_optimizer::optimizer::{
    ChartRenderer, FixVerificationStatus, FixVerifier, Patch, RenderErrorKind, RenderResult,
    ResourceRecord, RuleThresholds, VerificationJob, codes, get_rule, parse_documents,
    types::{ChartInfo, ChartViolation, Violation},
};
use serde_yaml::Value;
use std::sync::Arc;

/// Renders a single Deployment named after the chart from `replicaCount`
/// and `resources`, the way a minimal chart template would.
struct TemplateRenderer {
    calls: AtomicUsize,
}

impl TemplateRenderer {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

fn render_deployment(values: &Value) -> RenderResult {
    let replicas = values.get("replicaCount").cloned().unwrap_or(Value::from(1));
    let resources = values
        .get("resources")
        .cloned()
        .unwrap_or(Value::Mapping(Default::default()));
    let manifest = format!(
        "---\n# Source: api/templates/deployment.yaml\n\
         apiVersion: apps/v1\nkind: Deployment\nmetadata: {{name: api}}\n\
         spec:\n  replicas: {}\n  template:\n    metadata: {{labels: {{app: api}}}}\n    spec:\n      containers:\n        - name: app\n          resources: {}\n",
        serde_json::to_string(&replicas).unwrap(),
        serde_json::to_string(&resources).unwrap(),
    );
    RenderResult::ok(parse_documents(&manifest).unwrap())
}

impl ChartRenderer for TemplateRenderer {
    fn render(&self, _chart_dir: &Path, values: &Value) -> RenderResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        render_deployment(values)
    }
}

/// Fails every render whose `replicaCount` equals `fail_at`.
struct FailingRenderer {
    fail_at: Option<u64>,
}

impl ChartRenderer for FailingRenderer {
    fn render(&self, _chart_dir: &Path, values: &Value) -> RenderResult {
        let replicas = values.get("replicaCount").and_then(Value::as_u64);
        if self.fail_at.is_none() || replicas == self.fail_at {
            return RenderResult::failed(RenderErrorKind::RenderFailed, "")
                .with_stderr("Error: found in Chart.yaml, but missing in charts/ directory: common");
        }
        render_deployment(values)
    }
}

fn write_chart(dir: &Path, values: &str) -> PathBuf {
    fs::write(dir.join("Chart.yaml"), "apiVersion: v2\nname: api\nversion: 1.0.0\n").unwrap();
    let values_path = dir.join("values.yaml");
    fs::write(&values_path, values).unwrap();
    values_path
}

const VALUES: &str = "replicaCount: 1\nresources:\n  requests:\n    cpu: 100m\n  limits:\n    cpu: 1000m\n";

fn violation(rule_id: &str, record: &str) -> Violation {
    let record = ResourceRecord::from_yaml_str(record).unwrap();
    let rule = get_rule(rule_id).unwrap();
    rule.check(&record, &RuleThresholds::default()).remove(0)
}

fn single_replica() -> Violation {
    violation(codes::SINGLE_REPLICA, "replicas: 1\n")
}

fn chart(values_path: &Path) -> ChartInfo {
    ChartInfo::new("api")
        .with_values_file(values_path)
        .with_cpu(100.0, 1000.0)
        .with_replicas(1)
}

fn verifier<R: ChartRenderer>(renderer: R) -> FixVerifier<R> {
    FixVerifier::new(renderer).with_thresholds(Arc::new(RuleThresholds::default()))
}

#[test]
fn test_fix_verified_by_rendered_output() {
    let temp_dir = TempDir::new().unwrap();
    let chart = chart(&write_chart(temp_dir.path(), VALUES));
    let verifier = verifier(TemplateRenderer::new());

    let patch = Patch::empty().with(&["replicaCount"], 2);
    let result = verifier.verify_fix(&chart, &single_replica(), &patch);

    assert_eq!(result.status, FixVerificationStatus::Verified);
    assert_eq!(result.before_has_violation, Some(true));
    assert_eq!(result.after_has_violation, Some(false));
    assert_eq!(verifier.renderer().calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_ineffective_fix_is_unresolved() {
    let temp_dir = TempDir::new().unwrap();
    let chart = chart(&write_chart(temp_dir.path(), VALUES));
    let verifier = verifier(TemplateRenderer::new());

    let patch = Patch::empty().with(&["podAnnotations", "team"], "core");
    let result = verifier.verify_fix(&chart, &single_replica(), &patch);

    assert_eq!(result.status, FixVerificationStatus::Unresolved);
    assert_eq!(result.after_has_violation, Some(true));
}

#[test]
fn test_baseline_render_failure_is_unverified() {
    let temp_dir = TempDir::new().unwrap();
    let chart = chart(&write_chart(temp_dir.path(), VALUES));
    let verifier = verifier(FailingRenderer { fail_at: None });

    let patch = Patch::empty().with(&["replicaCount"], 2);
    let result = verifier.verify_fix(&chart, &single_replica(), &patch);

    assert_eq!(result.status, FixVerificationStatus::Unverified);
    assert_eq!(result.before_has_violation, None);
    assert_eq!(result.after_has_violation, None);
    assert!(result.note.contains("rendering current values"));
    assert!(result.note.contains("Parent-chart-only verification mode"));
}

#[test]
fn test_patched_render_failure_keeps_baseline() {
    let temp_dir = TempDir::new().unwrap();
    let chart = chart(&write_chart(temp_dir.path(), VALUES));
    let verifier = verifier(FailingRenderer { fail_at: Some(2) });

    let patch = Patch::empty().with(&["replicaCount"], 2);
    let result = verifier.verify_fix(&chart, &single_replica(), &patch);

    assert_eq!(result.status, FixVerificationStatus::Unverified);
    assert_eq!(result.before_has_violation, Some(true));
    assert_eq!(result.after_has_violation, None);
    assert!(result.note.contains("rendering patched values"));
}

#[test]
fn test_chart_without_local_directory_is_not_run() {
    let temp_dir = TempDir::new().unwrap();
    let values_path = temp_dir.path().join("values.yaml");
    fs::write(&values_path, VALUES).unwrap();
    let verifier = verifier(TemplateRenderer::new());

    let no_chart_yaml = chart(&values_path);
    let result = verifier.verify_fix(&no_chart_yaml, &single_replica(), &Patch::empty());
    assert_eq!(result.status, FixVerificationStatus::NotRun);

    let unknown = ChartInfo::new("api");
    let result = verifier.verify_fix(&unknown, &single_replica(), &Patch::empty());
    assert_eq!(result.status, FixVerificationStatus::NotRun);
    assert_eq!(verifier.renderer().calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_bundle_with_one_unresolved_violation() {
    let temp_dir = TempDir::new().unwrap();
    let chart = chart(&write_chart(temp_dir.path(), VALUES));
    let verifier = verifier(TemplateRenderer::new());

    let ratio_record = "resources:\n  requests:\n    cpu: 100m\n  limits:\n    cpu: 1000m\n";
    let violations = vec![
        ChartViolation::new("api", single_replica()),
        ChartViolation::new("api", violation(codes::HIGH_CPU_RATIO, ratio_record)),
        ChartViolation::new("api", violation(codes::NO_MEMORY_LIMITS, ratio_record)),
    ];
    let patch = Patch::empty()
        .with(&["replicaCount"], 2)
        .with(&["resources", "requests", "cpu"], "666m");

    let bundle = verifier.verify_bundle(&chart, &violations, &patch);

    assert_eq!(bundle.status, FixVerificationStatus::Unresolved);
    assert_eq!(bundle.per_violation.len(), 3);
    assert_eq!(
        bundle.note,
        "Bundle verification: 2 verified, 1 unresolved, 0 unverified."
    );
    let memory = &bundle.per_violation[&violations[2].identity_key()];
    assert_eq!(memory.status, FixVerificationStatus::Unresolved);
    assert_eq!(verifier.renderer().calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_verify_many_keeps_job_order() {
    let temp_dir = TempDir::new().unwrap();
    let local = chart(&write_chart(temp_dir.path(), VALUES));
    let verifier = verifier(TemplateRenderer::new());

    let fix = Patch::empty().with(&["replicaCount"], 2);
    let jobs: Vec<VerificationJob> = (0..6)
        .map(|i| VerificationJob {
            chart: if i % 2 == 0 { local.clone() } else { ChartInfo::new("remote") },
            violation: single_replica(),
            patch: fix.clone(),
        })
        .collect();

    let results = verifier.verify_many(&jobs, 64);

    assert_eq!(results.len(), jobs.len());
    for (i, result) in results.iter().enumerate() {
        let expected = if i % 2 == 0 {
            FixVerificationStatus::Verified
        } else {
            FixVerificationStatus::NotRun
        };
        assert_eq!(result.status, expected, "job {}", i);
    }
}

//! Fix verification using rendered manifests as the source of truth.
//!
//! A fix is verified by rendering the chart twice, with the current values
//! and with the patch merged in, then re-running the violated rule against
//! both renders. Only the patched render decides the status; the baseline
//! is diagnostic.

use super::fixer::load_values;
use super::parser::build_rule_inputs_from_rendered;
use super::patch::Patch;
use super::record::ResourceRecord;
use super::renderer::{ChartRenderer, RenderResult};
use super::rules::get_rule;
use super::thresholds::{RuleThresholds, current_thresholds};
use super::types::{ChartInfo, ChartViolation, Violation};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upper bound on concurrent verifications.
pub const MAX_PARALLELISM: usize = 8;

const MISSING_DEPENDENCY_HINT: &str =
    " Parent-chart-only verification mode could not render this chart.";

/// Verification state for one fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixVerificationStatus {
    /// The patched render no longer triggers the rule
    Verified,
    /// The patched render still triggers the rule
    Unresolved,
    /// Verification could not reach a verdict
    Unverified,
    /// Verification was skipped
    NotRun,
}

impl FixVerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Unresolved => "unresolved",
            Self::Unverified => "unverified",
            Self::NotRun => "not_run",
        }
    }
}

impl fmt::Display for FixVerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verification result for a single violation fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixVerificationResult {
    pub status: FixVerificationStatus,
    pub note: String,
    pub before_has_violation: Option<bool>,
    pub after_has_violation: Option<bool>,
}

impl FixVerificationResult {
    fn new(status: FixVerificationStatus, note: impl Into<String>) -> Self {
        Self {
            status,
            note: note.into(),
            before_has_violation: None,
            after_has_violation: None,
        }
    }

    pub fn not_run(note: impl Into<String>) -> Self {
        Self::new(FixVerificationStatus::NotRun, note)
    }

    pub fn unverified(note: impl Into<String>) -> Self {
        Self::new(FixVerificationStatus::Unverified, note)
    }
}

/// Verification result for a chart-level bundle of fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleVerificationResult {
    pub status: FixVerificationStatus,
    pub note: String,
    /// Keyed by [`ChartViolation::identity_key`]
    pub per_violation: BTreeMap<String, FixVerificationResult>,
}

/// One unit of work for [`FixVerifier::verify_many`].
#[derive(Debug, Clone)]
pub struct VerificationJob {
    pub chart: ChartInfo,
    pub violation: Violation,
    pub patch: Patch,
}

/// Verification outcome for one violation, as reported by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationEntry {
    pub chart_name: String,
    pub rule_id: String,
    pub rule_name: String,
    pub patch: Patch,
    pub result: FixVerificationResult,
}

impl VerificationEntry {
    pub fn new(violation: &ChartViolation, patch: Patch, result: FixVerificationResult) -> Self {
        Self {
            chart_name: violation.chart_name.clone(),
            rule_id: violation.violation.rule_id.clone(),
            rule_name: violation.violation.name.clone(),
            patch,
            result,
        }
    }
}

/// Output of a `verify` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub entries: Vec<VerificationEntry>,
}

impl VerificationReport {
    /// Number of entries with `status`.
    pub fn count(&self, status: FixVerificationStatus) -> usize {
        self.entries.iter().filter(|e| e.result.status == status).count()
    }
}

/// Verifies fixes by re-rendering charts.
pub struct FixVerifier<R: ChartRenderer> {
    renderer: R,
    thresholds: Arc<RuleThresholds>,
}

impl<R: ChartRenderer> FixVerifier<R> {
    /// Create a verifier using the thresholds active right now.
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            thresholds: current_thresholds(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Arc<RuleThresholds>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Verify that `patch` resolves `violation` for `chart`.
    pub fn verify_fix(&self, chart: &ChartInfo, violation: &Violation, patch: &Patch) -> FixVerificationResult {
        let Some((chart_dir, values_path)) = resolve_local_paths(chart) else {
            return FixVerificationResult::not_run(
                "Chart values are not backed by a local chart directory.",
            );
        };
        let values = match load_values(&values_path) {
            Ok(values) if values.is_mapping() => values,
            Ok(_) => {
                return FixVerificationResult::unverified(format!(
                    "Values file {} is not a mapping.",
                    values_path.display()
                ));
            }
            Err(e) => {
                return FixVerificationResult::unverified(format!(
                    "Could not read values file {}: {}",
                    values_path.display(),
                    e
                ));
            }
        };
        let patched = patch.apply_to(&values);

        let before = self.renderer.render(&chart_dir, &values);
        if !before.is_ok() {
            return unverified_from_render(&before, "current values");
        }
        let before_inputs = build_rule_inputs_from_rendered(&before.documents, &chart.name);
        let before_has = self.rule_matches(&violation.rule_id, &before_inputs);

        let after = self.renderer.render(&chart_dir, &patched);
        if !after.is_ok() {
            let mut result = unverified_from_render(&after, "patched values");
            result.before_has_violation = before_has;
            return result;
        }
        let after_inputs = build_rule_inputs_from_rendered(&after.documents, &chart.name);
        let after_has = self.rule_matches(&violation.rule_id, &after_inputs);

        let (status, note) = match after_has {
            None => (
                FixVerificationStatus::Unverified,
                format!("Rule {} could not be evaluated against rendered output.", violation.rule_id),
            ),
            Some(true) => (
                FixVerificationStatus::Unresolved,
                format!("Rendered output still triggers {} after the fix.", violation.rule_id),
            ),
            Some(false) => (
                FixVerificationStatus::Verified,
                format!("Rendered output no longer triggers {}.", violation.rule_id),
            ),
        };
        log::debug!("Verification of {} on {}: {}", violation.rule_id, chart.name, status);

        FixVerificationResult {
            status,
            note,
            before_has_violation: before_has,
            after_has_violation: after_has,
        }
    }

    /// Verify one shared patch against several violations of a chart.
    ///
    /// The patched chart is rendered once. Any unverified violation makes the
    /// bundle unverified; otherwise any unresolved one makes it unresolved.
    pub fn verify_bundle(
        &self,
        chart: &ChartInfo,
        violations: &[ChartViolation],
        patch: &Patch,
    ) -> BundleVerificationResult {
        let Some((chart_dir, values_path)) = resolve_local_paths(chart) else {
            let note = "Chart values are not backed by a local chart directory.";
            return uniform_bundle(violations, FixVerificationResult::not_run(note), note);
        };
        let values = match load_values(&values_path) {
            Ok(values) if values.is_mapping() => values,
            Ok(_) | Err(_) => {
                let note = format!("Could not read values file {}.", values_path.display());
                return uniform_bundle(violations, FixVerificationResult::unverified(&note), &note);
            }
        };

        let after = self.renderer.render(&chart_dir, &patch.apply_to(&values));
        if !after.is_ok() {
            let failure = unverified_from_render(&after, "patched values");
            let note = failure.note.clone();
            return uniform_bundle(violations, failure, &note);
        }
        let inputs = build_rule_inputs_from_rendered(&after.documents, &chart.name);

        let mut per_violation = BTreeMap::new();
        let (mut verified, mut unresolved, mut unverified) = (0usize, 0usize, 0usize);
        for violation in violations {
            let result = match self.rule_matches(violation.rule_id(), &inputs) {
                None => {
                    unverified += 1;
                    FixVerificationResult::unverified("Rule could not be evaluated against rendered output.")
                }
                Some(true) => {
                    unresolved += 1;
                    FixVerificationResult {
                        after_has_violation: Some(true),
                        ..FixVerificationResult::new(
                            FixVerificationStatus::Unresolved,
                            "Violation still present after the bundled fix.",
                        )
                    }
                }
                Some(false) => {
                    verified += 1;
                    FixVerificationResult {
                        after_has_violation: Some(false),
                        ..FixVerificationResult::new(
                            FixVerificationStatus::Verified,
                            "Violation resolved by the bundled fix.",
                        )
                    }
                }
            };
            per_violation.insert(violation.identity_key(), result);
        }

        let status = if unverified > 0 {
            FixVerificationStatus::Unverified
        } else if unresolved > 0 {
            FixVerificationStatus::Unresolved
        } else {
            FixVerificationStatus::Verified
        };

        BundleVerificationResult {
            status,
            note: format!(
                "Bundle verification: {} verified, {} unresolved, {} unverified.",
                verified, unresolved, unverified
            ),
            per_violation,
        }
    }

    /// Run many verifications on a bounded worker pool.
    ///
    /// `parallelism` is clamped to `1..=8`. Results keep the order of `jobs`.
    pub fn verify_many(&self, jobs: &[VerificationJob], parallelism: usize) -> Vec<FixVerificationResult> {
        let threads = parallelism.clamp(1, MAX_PARALLELISM);
        let run = |job: &VerificationJob| self.verify_fix(&job.chart, &job.violation, &job.patch);

        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| jobs.par_iter().map(run).collect()),
            Err(e) => {
                log::warn!("Could not start verification pool ({}); verifying sequentially", e);
                jobs.iter().map(run).collect()
            }
        }
    }

    /// Whether `rule_id` fires on any input.
    ///
    /// `None` for an unknown rule or a panicking check; no inputs means no
    /// violation.
    fn rule_matches(&self, rule_id: &str, inputs: &[ResourceRecord]) -> Option<bool> {
        let rule = get_rule(rule_id)?;
        if inputs.is_empty() {
            return Some(false);
        }
        let thresholds = self.thresholds.as_ref();
        catch_unwind(AssertUnwindSafe(|| {
            inputs.iter().any(|record| !rule.check(record, thresholds).is_empty())
        }))
        .map_err(|_| log::warn!("Rule {} panicked while verifying", rule_id))
        .ok()
    }
}

/// Chart directory and values path when the chart is verifiable locally.
fn resolve_local_paths(chart: &ChartInfo) -> Option<(PathBuf, PathBuf)> {
    let values_path = chart.values_file.local_path()?;
    let values_path = values_path.canonicalize().ok()?;
    if !values_path.is_file() {
        return None;
    }
    let chart_dir = values_path.parent().map(Path::to_path_buf)?;
    if !chart_dir.join("Chart.yaml").is_file() {
        return None;
    }
    Some((chart_dir, values_path))
}

/// Unverified result describing a failed render.
fn unverified_from_render(render: &RenderResult, label: &str) -> FixVerificationResult {
    let mut parts: Vec<String> = Vec::new();
    if let Some(error) = &render.error {
        parts.push(error.kind.to_string());
        if !error.message.trim().is_empty() {
            parts.push(error.message.trim().to_string());
        } else if !render.stderr.trim().is_empty() {
            parts.push(render.stderr.trim().to_string());
        }
    } else if !render.stderr.trim().is_empty() {
        parts.push(render.stderr.trim().to_string());
    }

    let mut error_text = parts.join(" | ");
    if error_text.is_empty() {
        error_text = "unknown render error".to_string();
    }
    let hint = if error_text.to_lowercase().contains("missing in charts/") {
        MISSING_DEPENDENCY_HINT
    } else {
        ""
    };

    FixVerificationResult::unverified(format!(
        "Verification failed while rendering {}: {}{}",
        label, error_text, hint
    ))
}

fn uniform_bundle(
    violations: &[ChartViolation],
    result: FixVerificationResult,
    note: &str,
) -> BundleVerificationResult {
    BundleVerificationResult {
        status: result.status,
        note: note.to_string(),
        per_violation: violations
            .iter()
            .map(|v| (v.identity_key(), result.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::renderer::RenderErrorKind;

    #[test]
    fn test_render_failure_note() {
        let render = RenderResult::failed(
            RenderErrorKind::RenderFailed,
            "found in Chart.yaml, but missing in charts/ directory: common",
        );
        let result = unverified_from_render(&render, "current values");
        assert_eq!(result.status, FixVerificationStatus::Unverified);
        assert!(result.note.starts_with("Verification failed while rendering current values: render_failed | "));
        assert!(result.note.ends_with(MISSING_DEPENDENCY_HINT));
    }

    #[test]
    fn test_render_failure_falls_back_to_stderr() {
        let render = RenderResult::failed(RenderErrorKind::Timeout, "").with_stderr("  killed \n");
        let result = unverified_from_render(&render, "patched values");
        assert_eq!(
            result.note,
            "Verification failed while rendering patched values: timeout | killed"
        );
    }

    #[test]
    fn test_cluster_values_are_not_run() {
        struct Unreachable;
        impl ChartRenderer for Unreachable {
            fn render(&self, _: &Path, _: &serde_yaml::Value) -> RenderResult {
                unreachable!("render must not be called")
            }
        }

        let mut chart = ChartInfo::new("payments");
        chart.values_file = Some("cluster:payments".to_string()).into();
        let violation = crate::optimizer::detector::detect(&ResourceRecord::new(), &RuleThresholds::default())
            .remove(0);

        let verifier = FixVerifier::new(Unreachable);
        let result = verifier.verify_fix(&chart, &violation, &Patch::empty());
        assert_eq!(result.status, FixVerificationStatus::NotRun);
        assert!(result.before_has_violation.is_none());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(FixVerificationStatus::NotRun.to_string(), "not_run");
        assert_eq!(
            serde_json::to_string(&FixVerificationStatus::Unresolved).unwrap(),
            "\"unresolved\""
        );
    }
}

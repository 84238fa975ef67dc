use crate::{
    cli::OutputFormat,
    config::OptimizerConfig,
    optimizer::{
        ChartRenderer, FixGenerator, FixVerificationResult, FixVerifier, FleetFile, Patch,
        ResourceValues, VerificationJob, analyze_fleet, configure_thresholds, format_verification, resolve_fix,
        verifier::{VerificationEntry, VerificationReport},
    },
};
use std::path::PathBuf;

/// Options for the `verify` command
pub struct VerifyOptions {
    /// Fleet file whose violations are verified
    pub fleet: PathBuf,
    /// Only verify this chart
    pub chart: Option<String>,
    /// Parallelism override; falls back to the config value
    pub parallel: Option<usize>,
    pub format: OutputFormat,
}

pub fn handle_verify(config: &OptimizerConfig, options: VerifyOptions) -> crate::Result<VerificationReport> {
    let renderer = config.helm_renderer();
    handle_verify_with(config, options, renderer)
}

/// Run `verify` with a specific renderer.
pub fn handle_verify_with<R: ChartRenderer>(
    config: &OptimizerConfig,
    options: VerifyOptions,
    renderer: R,
) -> crate::Result<VerificationReport> {
    if !config.verification.enabled {
        log::warn!("Verification is disabled in configuration");
        let report = VerificationReport::default();
        format_verification(&report, options.format.into());
        return Ok(report);
    }

    let fleet = FleetFile::load(&options.fleet)?;
    let thresholds = configure_thresholds(&config.thresholds);
    let violations = analyze_fleet(&fleet.detector_inputs(), &thresholds, &config.detector);
    let generator = config.fix_generator();

    // One slot per violation, in detection order; `None` means no fix exists
    let mut planned = Vec::new();
    for violation in violations
        .iter()
        .filter(|v| options.chart.as_deref().is_none_or(|c| v.chart_name == c))
    {
        let Some(entry) = fleet.find(&violation.chart_name) else {
            continue;
        };
        let current = ResourceValues::from_chart(&entry.chart);
        let job = resolve_fix(Some(&generator as &dyn FixGenerator), &entry.chart, &violation.violation, &current)
            .map(|patch| VerificationJob {
                chart: entry.chart.clone(),
                violation: violation.violation.clone(),
                patch,
            });
        planned.push((violation, job));
    }

    let jobs: Vec<VerificationJob> = planned.iter().filter_map(|(_, job)| job.clone()).collect();
    let parallelism = options.parallel.unwrap_or(config.verification.parallelism);
    log::info!("Verifying {} fix(es) with parallelism {}", jobs.len(), parallelism);

    let verifier = FixVerifier::new(renderer).with_thresholds(thresholds);
    let mut results = verifier.verify_many(&jobs, parallelism).into_iter();
    let entries = planned
        .into_iter()
        .map(|(violation, job)| match job {
            Some(job) => {
                let result = results
                    .next()
                    .unwrap_or_else(|| FixVerificationResult::unverified("No verification result was produced."));
                VerificationEntry::new(violation, job.patch, result)
            }
            None => VerificationEntry::new(
                violation,
                Patch::empty(),
                FixVerificationResult::not_run("No fix available for this violation."),
            ),
        })
        .collect();

    let report = VerificationReport { entries };
    format_verification(&report, options.format.into());
    Ok(report)
}

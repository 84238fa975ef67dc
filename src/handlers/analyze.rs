use crate::{
    cli::OutputFormat,
    config::OptimizerConfig,
    error::ConfigError,
    optimizer::{
        FleetFile, analyze_fleet, configure_thresholds, format_report, load_nodes,
        types::{AnalysisMetadata, AnalysisReport},
    },
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Options for the `analyze` command
pub struct AnalyzeOptions {
    /// Fleet file to analyze
    pub fleet: PathBuf,
    /// Optional cluster node inventory
    pub nodes: Option<PathBuf>,
    /// Overhead override; falls back to the config value
    pub overhead: Option<f64>,
    pub format: OutputFormat,
    /// Read values files to generate chart-aware fixes
    pub use_generator: bool,
}

pub fn handle_analyze(config: &OptimizerConfig, options: AnalyzeOptions) -> crate::Result<AnalysisReport> {
    let start = Instant::now();

    let overhead = options.overhead.unwrap_or(config.impact.overhead_pct);
    if !(0.0..1.0).contains(&overhead) {
        return Err(ConfigError::InvalidValue {
            key: "overhead".to_string(),
            message: format!("{} is outside [0.0, 1.0)", overhead),
        }
        .into());
    }

    if options.format == OutputFormat::Table {
        println!("🔍 Analyzing fleet: {}", options.fleet.display());
    }

    let fleet = FleetFile::load(&options.fleet)?;
    let nodes = options.nodes.as_deref().map(load_nodes).transpose()?;

    let thresholds = configure_thresholds(&config.thresholds);
    let violations = analyze_fleet(&fleet.detector_inputs(), &thresholds, &config.detector);

    let mut calculator = config.impact_calculator().with_overhead_pct(overhead);
    if options.use_generator {
        calculator = calculator.with_fix_generator(Arc::new(config.fix_generator()));
    }
    let impact = calculator.compute_impact(&fleet.charts(), &violations, nodes.as_deref());

    let mut metadata = AnalysisMetadata::new(options.fleet.display().to_string());
    metadata.duration_ms = start.elapsed().as_millis() as u64;

    let report = AnalysisReport {
        violations,
        impact,
        metadata,
    };
    format_report(&report, options.format.into());
    Ok(report)
}

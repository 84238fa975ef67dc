//! # Chart Optimizer
//!
//! A Rust command-line application that checks a fleet of Helm chart
//! configurations against resource, probe, availability and security best
//! practices, proposes deterministic fixes, and projects the fleet-wide
//! resource, node and spot-cost impact of applying them.
//!
//! ## Features
//!
//! - **Rule Catalog**: Seventeen rules with tunable thresholds
//! - **Fix Generation**: Chart-aware fixes with a deterministic fallback table
//! - **Impact Projection**: Before/after totals, node counts and spot cost
//! - **Fix Verification**: Re-renders charts with `helm template` to confirm a fix
//!
//! ## Example
//!
//! ```rust,no_run
//! use chart_optimizer::optimizer::{FleetFile, ResourceImpactCalculator, analyze_fleet};
//! use chart_optimizer::config::load_config;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let fleet = FleetFile::load(Path::new("fleet.yaml"))?;
//! let violations = analyze_fleet(
//!     &fleet.detector_inputs(),
//!     &config.rule_thresholds(),
//!     &config.detector,
//! );
//! let impact = ResourceImpactCalculator::new().compute_impact(&fleet.charts(), &violations, None);
//! println!("{:+.1}% CPU requests", impact.delta.cpu_request_pct);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod optimizer;

// Re-export commonly used types and functions
pub use error::{OptimizerError, Result};
pub use handlers::*;
use cli::Commands;
use config::OptimizerConfig;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run_command(command: Commands, config: &OptimizerConfig) -> Result<()> {
    match command {
        Commands::Rules { format } => handlers::handle_rules(format),
        Commands::Analyze {
            fleet,
            nodes,
            overhead,
            format,
            no_generator,
        } => handlers::handle_analyze(
            config,
            AnalyzeOptions {
                fleet,
                nodes,
                overhead,
                format,
                use_generator: !no_generator,
            },
        )
        .map(|_| ()),
        Commands::Verify {
            fleet,
            chart,
            parallel,
            format,
        } => handlers::handle_verify(
            config,
            VerifyOptions {
                fleet,
                chart,
                parallel,
                format,
            },
        )
        .map(|_| ()),
    }
}

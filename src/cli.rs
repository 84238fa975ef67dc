use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::optimizer::formatter::OutputFormat as ReportFormat;

#[derive(Parser)]
#[command(name = "chart-opt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check Helm chart fleets against resource and availability best practices")]
#[command(long_about = "Analyzes a fleet of Helm chart configurations against a catalog of resource, probe, availability and security rules, projects the node and spot-cost impact of fixing them, and verifies fixes by re-rendering charts with helm.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the rule catalog
    Rules {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Detect violations and project their resource impact
    Analyze {
        /// Fleet file (YAML or JSON)
        #[arg(value_name = "FLEET")]
        fleet: PathBuf,

        /// Cluster node inventory (node list or `kubectl get nodes -o json`)
        #[arg(long, value_name = "FILE")]
        nodes: Option<PathBuf>,

        /// System overhead share for node estimates (0.0 to 1.0)
        #[arg(long)]
        overhead: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Project fixes from the default table only, without reading values files
        #[arg(long)]
        no_generator: bool,
    },

    /// Verify each violation's fix by re-rendering its chart
    Verify {
        /// Fleet file (YAML or JSON)
        #[arg(value_name = "FLEET")]
        fleet: PathBuf,

        /// Only verify this chart
        #[arg(long)]
        chart: Option<String>,

        /// Concurrent renders (1-8)
        #[arg(long)]
        parallel: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
    Summary,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => ReportFormat::Table,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Yaml => ReportFormat::Yaml,
            OutputFormat::Summary => ReportFormat::Summary,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::parse_from([
            "chart-opt", "-vv", "analyze", "fleet.yaml", "--nodes", "nodes.json", "--overhead", "0.2",
            "--format", "json",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Analyze { fleet, nodes, overhead, format, no_generator } => {
                assert_eq!(fleet, PathBuf::from("fleet.yaml"));
                assert_eq!(nodes, Some(PathBuf::from("nodes.json")));
                assert_eq!(overhead, Some(0.2));
                assert_eq!(format, OutputFormat::Json);
                assert!(!no_generator);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_parse_verify_with_global_config() {
        let cli = Cli::parse_from(["chart-opt", "verify", "fleet.yaml", "--chart", "api", "-c", "opt.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("opt.toml")));
        assert!(matches!(cli.command, Commands::Verify { chart: Some(ref c), .. } if c == "api"));
    }
}

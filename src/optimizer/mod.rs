//! Helm Chart Optimization Engine
//!
//! Analyzes a fleet of chart configurations against a catalog of resource,
//! probe, availability and security rules, proposes deterministic fixes,
//! projects the fleet-wide resource and cost impact of those fixes, and
//! optionally verifies fixes by re-rendering the charts.
//!
//! # Example
//!
//! ```rust
//! use chart_optimizer::optimizer::{
//!     DetectorOptions, ResourceImpactCalculator, ResourceRecord, RuleThresholds, analyze_chart,
//!     types::ChartInfo,
//! };
//!
//! let record = ResourceRecord::from_yaml_str(
//!     "replicas: 1\nresources:\n  requests: {cpu: 100m, memory: 128Mi}\n",
//! )
//! .unwrap();
//! let violations = analyze_chart(
//!     "api",
//!     &[record],
//!     &RuleThresholds::default(),
//!     &DetectorOptions::default(),
//! );
//!
//! let chart = ChartInfo::new("api").with_cpu(100.0, 0.0).with_replicas(1);
//! let impact = ResourceImpactCalculator::new().compute_impact(&[chart], &violations, None);
//! assert_eq!(impact.after.total_replicas, 2);
//! ```

pub mod detector;
pub mod fixer;
pub mod fleet;
pub mod formatter;
pub mod impact;
pub mod instance_types;
pub mod parser;
pub mod patch;
pub mod record;
pub mod renderer;
pub mod rules;
pub mod thresholds;
pub mod types;
pub mod verifier;

pub use detector::{DetectorOptions, analyze_chart, analyze_fleet, detect, detect_with};
pub use fixer::{
    FixError, FixGenerator, ProbeSettings, RatioStrategy, ResourceValues, ValuesFixGenerator,
    apply_fix, default_fix, resolve_fix,
};
pub use fleet::{FleetEntry, FleetFile, load_nodes};
pub use formatter::{OutputFormat, format_report, format_verification};
pub use impact::ResourceImpactCalculator;
pub use patch::Patch;
pub use record::ResourceRecord;
pub use renderer::{
    ChartRenderer, HelmRenderer, RenderError, RenderErrorKind, RenderResult, parse_documents,
};
pub use rules::{OptimizationRule, RuleCatalog, catalog, codes, get_rule};
pub use thresholds::{
    RuleThresholds, ThresholdOverrides, configure_thresholds, current_thresholds,
    reset_thresholds,
};
pub use types::{
    AnalysisReport, ChartInfo, ChartViolation, ClusterNode, ImpactResult, Severity, Violation,
};
pub use verifier::{
    BundleVerificationResult, FixVerificationResult, FixVerificationStatus, FixVerifier,
    VerificationJob,
};

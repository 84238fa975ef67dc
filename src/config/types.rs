use crate::error::ConfigError;
use crate::optimizer::detector::DetectorOptions;
use crate::optimizer::fixer::{ProbeSettings, RatioStrategy, ValuesFixGenerator};
use crate::optimizer::impact::ResourceImpactCalculator;
use crate::optimizer::instance_types::DEFAULT_OVERHEAD_PCT;
use crate::optimizer::renderer::{DEFAULT_RELEASE_NAME, HelmRenderer};
use crate::optimizer::thresholds::{RuleThresholds, ThresholdOverrides};
use crate::optimizer::types::{InstanceTypeSpec, Severity};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub thresholds: ThresholdOverrides,
    pub detector: DetectorOptions,
    pub impact: ImpactConfig,
    pub verification: VerificationConfig,
    pub fixer: FixerConfig,
}

/// Resource impact configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Share of allocatable capacity reserved for system pods (0.0 to 1.0)
    pub overhead_pct: f64,
    /// Custom instance catalog; empty uses the built-in one
    pub instance_types: Vec<InstanceTypeConfig>,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            overhead_pct: DEFAULT_OVERHEAD_PCT,
            instance_types: Vec::new(),
        }
    }
}

/// One custom instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceTypeConfig {
    pub name: String,
    pub vcpus: u32,
    pub memory_gib: f64,
    #[serde(default)]
    pub hourly_price_usd: f64,
    pub spot_price_usd: f64,
}

impl From<&InstanceTypeConfig> for InstanceTypeSpec {
    fn from(entry: &InstanceTypeConfig) -> Self {
        InstanceTypeSpec::new(
            entry.name.clone(),
            entry.vcpus,
            entry.memory_gib,
            entry.hourly_price_usd,
            entry.spot_price_usd,
        )
    }
}

/// Render-based verification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub enabled: bool,
    /// Concurrent renders (clamped to 1..=8)
    pub parallelism: usize,
    /// helm binary name or path
    pub binary: String,
    pub release_name: String,
    pub timeout_seconds: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parallelism: 4,
            binary: "helm".to_string(),
            release_name: DEFAULT_RELEASE_NAME.to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Fix generation configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixerConfig {
    pub ratio_strategy: RatioStrategy,
    /// Overrides for generated HTTP probes
    pub probe: Option<ProbeSettings>,
}

impl OptimizerConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system overhead share used for node estimates.
    pub fn with_overhead_pct(mut self, overhead_pct: f64) -> Self {
        self.impact.overhead_pct = overhead_pct;
        self
    }

    /// Set the minimum severity threshold.
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.detector.min_severity = severity;
        self
    }

    /// Add a rule to ignore.
    pub fn ignore_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.detector.ignore_rules.insert(rule_id.into());
        self
    }

    pub fn with_thresholds(mut self, overrides: ThresholdOverrides) -> Self {
        self.thresholds = overrides;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.verification.parallelism = parallelism;
        self
    }

    pub fn with_ratio_strategy(mut self, strategy: RatioStrategy) -> Self {
        self.fixer.ratio_strategy = strategy;
        self
    }

    /// Reject values no analysis can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let overhead = self.impact.overhead_pct;
        if !(0.0..1.0).contains(&overhead) {
            return Err(ConfigError::InvalidValue {
                key: "impact.overhead_pct".to_string(),
                message: format!("{} is outside [0.0, 1.0)", overhead),
            });
        }
        if self.verification.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "verification.timeout_seconds".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if let Some(entry) = self.impact.instance_types.iter().find(|e| e.name.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "impact.instance_types".to_string(),
                message: format!("instance type with {} vCPUs has no name", entry.vcpus),
            });
        }
        Ok(())
    }

    /// Default thresholds with this config's overrides applied.
    pub fn rule_thresholds(&self) -> RuleThresholds {
        RuleThresholds::default().with_overrides(&self.thresholds)
    }

    pub fn fix_generator(&self) -> ValuesFixGenerator {
        let generator = ValuesFixGenerator::new()
            .with_ratio_strategy(self.fixer.ratio_strategy)
            .with_fixed_fields(self.rule_thresholds().fixed_resource_fields);
        match &self.fixer.probe {
            Some(settings) => generator.with_probe_settings(settings.clone()),
            None => generator,
        }
    }

    /// Impact calculator without a fix generator attached.
    pub fn impact_calculator(&self) -> ResourceImpactCalculator {
        ResourceImpactCalculator::new()
            .with_overhead_pct(self.impact.overhead_pct)
            .with_instance_types(self.impact.instance_types.iter().map(InstanceTypeSpec::from).collect())
    }

    pub fn helm_renderer(&self) -> HelmRenderer {
        HelmRenderer::new()
            .with_binary(&self.verification.binary)
            .with_release_name(&self.verification.release_name)
            .with_timeout(Duration::from_secs(self.verification.timeout_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::thresholds::ResourceField;

    #[test]
    fn test_partial_toml() {
        let config: OptimizerConfig = toml::from_str(
            r#"
[thresholds]
limit_request_ratio = 3.0
fixed_resource_fields = ["cpu_limit"]

[detector]
ignore_rules = ["PRB003"]
min_severity = "warning"

[impact]
overhead_pct = 0.1

[[impact.instance_types]]
name = "m5.large"
vcpus = 2
memory_gib = 8.0
spot_price_usd = 0.035

[fixer]
ratio_strategy = "guaranteed"
"#,
        )
        .unwrap();

        assert_eq!(config.detector.min_severity, Severity::Warning);
        assert!(config.detector.should_ignore_rule("PRB003"));
        assert_eq!(config.verification, VerificationConfig::default());
        assert_eq!(config.fixer.ratio_strategy, RatioStrategy::Guaranteed);

        let thresholds = config.rule_thresholds();
        assert_eq!(thresholds.limit_request_ratio, 3.0);
        assert!(thresholds.is_fixed(ResourceField::CpuLimit));
        assert_eq!(config.impact_calculator().overhead_pct(), 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_overhead() {
        let config = OptimizerConfig::new().with_overhead_pct(1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "impact.overhead_pct"
        ));
    }
}

//! Instance type catalog and spot price lookup for node estimation.
//!
//! Prices are approximate us-east-1 hourly averages in USD.

use super::types::InstanceTypeSpec;

/// Fraction of instance capacity allocatable by Kubernetes after kubelet
/// and system reservations.
pub const ALLOCATABLE_RATIO: f64 = 0.92;

/// Default share of allocatable capacity taken by system pods and daemonsets.
pub const DEFAULT_OVERHEAD_PCT: f64 = 0.15;

/// Hours per month used for cost projection (365 * 24 / 12).
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Default catalog: (name, vcpus, memory GiB, on-demand hourly, spot hourly).
const DEFAULT_INSTANCE_TYPES: &[(&str, u32, f64, f64, f64)] = &[
    ("m5.large", 2, 8.0, 0.096, 0.035),
    ("m5.xlarge", 4, 16.0, 0.192, 0.067),
    ("m5.2xlarge", 8, 32.0, 0.384, 0.134),
    ("m5.4xlarge", 16, 64.0, 0.768, 0.268),
    ("m6i.large", 2, 8.0, 0.096, 0.034),
    ("m6i.xlarge", 4, 16.0, 0.192, 0.067),
];

/// Spot prices for instance types commonly seen in node inventories.
const SPOT_PRICES: &[(&str, f64)] = &[
    // M5
    ("m5.large", 0.035),
    ("m5.xlarge", 0.067),
    ("m5.2xlarge", 0.134),
    ("m5.4xlarge", 0.268),
    ("m5.8xlarge", 0.536),
    ("m5.12xlarge", 0.804),
    ("m5.16xlarge", 1.072),
    ("m5.24xlarge", 1.608),
    // M6i
    ("m6i.large", 0.034),
    ("m6i.xlarge", 0.067),
    ("m6i.2xlarge", 0.134),
    ("m6i.4xlarge", 0.268),
    ("m6i.8xlarge", 0.536),
    ("m6i.12xlarge", 0.804),
    ("m6i.16xlarge", 1.072),
    ("m6i.24xlarge", 1.608),
    // M7i
    ("m7i.large", 0.036),
    ("m7i.xlarge", 0.071),
    ("m7i.2xlarge", 0.142),
    ("m7i.4xlarge", 0.284),
    ("m7i.8xlarge", 0.568),
    ("m7i.12xlarge", 0.852),
    ("m7i.16xlarge", 1.136),
    ("m7i.24xlarge", 1.704),
    // C5
    ("c5.large", 0.031),
    ("c5.xlarge", 0.062),
    ("c5.2xlarge", 0.124),
    ("c5.4xlarge", 0.248),
    ("c5.9xlarge", 0.558),
    ("c5.12xlarge", 0.744),
    ("c5.18xlarge", 1.116),
    ("c5.24xlarge", 1.488),
    // C6i
    ("c6i.large", 0.030),
    ("c6i.xlarge", 0.061),
    ("c6i.2xlarge", 0.122),
    ("c6i.4xlarge", 0.243),
    ("c6i.8xlarge", 0.486),
    ("c6i.12xlarge", 0.729),
    ("c6i.16xlarge", 0.972),
    ("c6i.24xlarge", 1.458),
    // R5 (memory-optimized)
    ("r5.large", 0.038),
    ("r5.xlarge", 0.076),
    ("r5.2xlarge", 0.152),
    ("r5.4xlarge", 0.304),
    ("r5.8xlarge", 0.608),
    ("r5.12xlarge", 0.912),
    ("r5.16xlarge", 1.216),
    ("r5.24xlarge", 1.824),
    // R6i
    ("r6i.large", 0.038),
    ("r6i.xlarge", 0.075),
    ("r6i.2xlarge", 0.150),
    ("r6i.4xlarge", 0.300),
    ("r6i.8xlarge", 0.600),
    ("r6i.12xlarge", 0.900),
    ("r6i.16xlarge", 1.200),
    ("r6i.24xlarge", 1.800),
    // T3 (burstable)
    ("t3.medium", 0.013),
    ("t3.large", 0.026),
    ("t3.xlarge", 0.053),
    ("t3.2xlarge", 0.106),
];

/// The built-in instance type catalog.
pub fn default_instance_types() -> Vec<InstanceTypeSpec> {
    DEFAULT_INSTANCE_TYPES
        .iter()
        .map(|&(name, vcpus, memory_gib, price, spot)| {
            InstanceTypeSpec::new(name, vcpus, memory_gib, price, spot)
        })
        .collect()
}

/// Hourly spot price for an instance type, `None` when unknown.
pub fn spot_price(instance_type: &str) -> Option<f64> {
    SPOT_PRICES
        .iter()
        .find(|(name, _)| *name == instance_type)
        .map(|(_, price)| *price)
}

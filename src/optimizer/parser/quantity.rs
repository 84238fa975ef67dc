//! Kubernetes quantity parsing.
//!
//! Converts CPU and memory quantities from their string (or bare numeric)
//! representations into millicores and bytes. Anything that does not parse
//! is reported as `None` so callers can treat it as "not configured".

use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

/// Bytes in one mebibyte.
pub const MIB: f64 = 1024.0 * 1024.0;

/// Bytes in one gibibyte.
pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

// ============================================================================
// CPU Parsing
// ============================================================================

/// Regex for parsing CPU values (e.g., "100m", "1", "1.5", "0.1")
static CPU_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(m)?$").expect("valid cpu regex"));

/// Parse a CPU value string to millicores.
///
/// # Examples
/// - "100m" -> 100.0
/// - "1" -> 1000.0
/// - "1.5" -> 1500.0
pub fn parse_cpu_millicores(cpu: &str) -> Option<f64> {
    let cpu = cpu.trim();
    if cpu.is_empty() {
        return None;
    }

    let caps = CPU_REGEX.captures(cpu)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    if caps.get(2).is_some() {
        Some(value)
    } else {
        Some(value * 1000.0)
    }
}

/// Render millicores the way chart values usually spell them.
///
/// Whole cores are rendered as a bare number, everything else with the `m`
/// suffix (fractions are truncated).
pub fn format_millicores(millicores: f64) -> String {
    let whole = millicores.max(0.0) as u64;
    if whole >= 1000 && whole % 1000 == 0 {
        format!("{}", whole / 1000)
    } else {
        format!("{}m", whole)
    }
}

// ============================================================================
// Memory Parsing
// ============================================================================

/// Regex for parsing memory values (e.g., "128Mi", "1Gi", "1024Ki", "1000000000")
static MEMORY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)(Ki|Mi|Gi|Ti|Pi|Ei|K|M|G|T|P|E)?$").expect("valid memory regex")
});

/// Parse a memory value string to bytes.
///
/// # Examples
/// - "128Mi" -> 134217728.0
/// - "1Gi" -> 1073741824.0
/// - "1000000000" -> 1000000000.0
pub fn parse_memory_bytes(memory: &str) -> Option<f64> {
    let memory = memory.trim();
    if memory.is_empty() {
        return None;
    }

    let caps = MEMORY_REGEX.captures(memory)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let multiplier: f64 = match unit {
        "" => 1.0,
        "Ki" => 1024.0,
        "Mi" => MIB,
        "Gi" => GIB,
        "Ti" => GIB * 1024.0,
        "Pi" => GIB * 1024.0 * 1024.0,
        "Ei" => GIB * 1024.0 * 1024.0 * 1024.0,
        // Decimal units
        "K" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        _ => return None,
    };

    Some(value * multiplier)
}

/// Parse a memory value string to mebibytes.
pub fn parse_memory_mi(memory: &str) -> Option<f64> {
    parse_memory_bytes(memory).map(|bytes| bytes / MIB)
}

/// Render a byte count using the largest exact binary unit, falling back
/// to whole mebibytes.
pub fn format_bytes(bytes: f64) -> String {
    const KI: u64 = 1024;
    const MI: u64 = KI * 1024;
    const GI: u64 = MI * 1024;

    let bytes = bytes.max(0.0) as u64;
    if bytes >= GI && bytes % GI == 0 {
        format!("{}Gi", bytes / GI)
    } else if bytes >= MI {
        // Round down to Mi for readability
        format!("{}Mi", bytes / MI)
    } else if bytes >= KI && bytes % KI == 0 {
        format!("{}Ki", bytes / KI)
    } else {
        format!("{}", bytes)
    }
}

// ============================================================================
// YAML values
// ============================================================================

/// Textual form of a quantity stored in a values tree.
///
/// Helm values hold quantities either as strings (`"500m"`) or as bare
/// numbers (`cpu: 1`, `memory: 134217728`).
pub fn quantity_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Millicores for a CPU quantity held in a values tree.
pub fn cpu_from_value(value: &Value) -> Option<f64> {
    quantity_text(value).and_then(|text| parse_cpu_millicores(&text))
}

/// Bytes for a memory quantity held in a values tree.
pub fn memory_from_value(value: &Value) -> Option<f64> {
    quantity_text(value).and_then(|text| parse_memory_bytes(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu() {
        assert_eq!(parse_cpu_millicores("100m"), Some(100.0));
        assert_eq!(parse_cpu_millicores("1"), Some(1000.0));
        assert_eq!(parse_cpu_millicores("1.5"), Some(1500.0));
        assert_eq!(parse_cpu_millicores("0.1"), Some(100.0));
        assert_eq!(parse_cpu_millicores(""), None);
        assert_eq!(parse_cpu_millicores("lots"), None);
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(parse_memory_bytes("128Mi"), Some(128.0 * MIB));
        assert_eq!(parse_memory_bytes("1Gi"), Some(GIB));
        assert_eq!(parse_memory_bytes("1024Ki"), Some(MIB));
        assert_eq!(parse_memory_bytes("1G"), Some(1e9));
        assert_eq!(parse_memory_bytes("500"), Some(500.0));
        assert_eq!(parse_memory_bytes("12XB"), None);
        assert_eq!(parse_memory_mi("512Mi"), Some(512.0));
    }

    #[test]
    fn test_format_roundtrip_units() {
        assert_eq!(format_millicores(100.0), "100m");
        assert_eq!(format_millicores(2000.0), "2");
        assert_eq!(format_millicores(1500.0), "1500m");
        assert_eq!(format_bytes(128.0 * MIB), "128Mi");
        assert_eq!(format_bytes(GIB), "1Gi");
        assert_eq!(format_bytes(512.0), "512");
    }

    #[test]
    fn test_quantities_from_values() {
        assert_eq!(cpu_from_value(&Value::from(1)), Some(1000.0));
        assert_eq!(cpu_from_value(&Value::from("250m")), Some(250.0));
        assert_eq!(memory_from_value(&Value::from("64Mi")), Some(64.0 * MIB));
        assert_eq!(cpu_from_value(&Value::Null), None);
    }
}

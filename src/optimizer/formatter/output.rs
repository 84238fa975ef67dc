//! Output formatting for analysis and verification results.
//!
//! Supports multiple output formats: table, JSON, YAML, and plain text.

use crate::optimizer::parser::GIB;
use crate::optimizer::rules::RuleDescriptor;
use crate::optimizer::types::{AnalysisReport, FleetResourceSummary, Severity};
use crate::optimizer::verifier::{FixVerificationStatus, VerificationReport};
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};

const RULE_WIDE: &str =
    "═══════════════════════════════════════════════════════════════════════════════════════════";
const RULE_THIN: &str =
    "───────────────────────────────────────────────────────────────────────────────────────────";

// ============================================================================
// Output Format
// ============================================================================

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text summary
    Summary,
}

impl OutputFormat {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(Self::Table),
            "json" => Some(Self::Json),
            "yaml" => Some(Self::Yaml),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn cores(millicores: f64) -> String {
    format!("{:.2} cores", millicores / 1000.0)
}

fn gib(bytes: f64) -> String {
    format!("{:.1} GiB", bytes / GIB)
}

fn signed_pct(pct: f64) -> ColoredString {
    let text = format!("{:+.1}%", pct);
    if pct > 0.0 {
        text.yellow()
    } else if pct < 0.0 {
        text.green()
    } else {
        text.dimmed()
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => severity.as_str().bright_red().bold(),
        Severity::Warning => severity.as_str().yellow().bold(),
        Severity::Info => severity.as_str().blue().bold(),
    }
}

fn status_label(status: FixVerificationStatus) -> ColoredString {
    match status {
        FixVerificationStatus::Verified => status.as_str().green().bold(),
        FixVerificationStatus::Unresolved => status.as_str().yellow().bold(),
        FixVerificationStatus::Unverified => status.as_str().red().bold(),
        FixVerificationStatus::NotRun => status.as_str().dimmed(),
    }
}

fn header(title: &str) -> String {
    format!(
        "\n{}\n{}\n{}\n\n",
        RULE_WIDE.bright_blue(),
        title.bright_white().bold(),
        RULE_WIDE.bright_blue()
    )
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn to_yaml<T: Serialize>(value: &T) -> String {
    serde_yaml::to_string(value).unwrap_or_default()
}

// ============================================================================
// Analysis report
// ============================================================================

/// Format an analysis report to string.
pub fn format_report_to_string(report: &AnalysisReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_report_table(report),
        OutputFormat::Json => to_json(report),
        OutputFormat::Yaml => to_yaml(report),
        OutputFormat::Summary => format_report_summary(report),
    }
}

/// Format and print an analysis report.
pub fn format_report(report: &AnalysisReport, format: OutputFormat) {
    println!("{}", format_report_to_string(report, format));
}

fn totals_line(label: &str, summary: &FleetResourceSummary) -> String {
    format!(
        "│ {:<8} cpu req {:>12}  cpu lim {:>12}  mem req {:>10}  mem lim {:>10}  replicas {:>5}\n",
        label.dimmed(),
        cores(summary.cpu_request_total),
        cores(summary.cpu_limit_total),
        gib(summary.memory_request_total),
        gib(summary.memory_limit_total),
        summary.total_replicas
    )
}

fn format_report_table(report: &AnalysisReport) -> String {
    let mut output = header("⎈ HELM CHART OPTIMIZATION REPORT");

    // Violations
    if report.violations.is_empty() {
        output.push_str(&format!(
            "{}\n",
            "✅ No violations found! Your charts follow the rule catalog.".green()
        ));
    } else {
        output.push_str(&format!(
            "{}\n",
            format!("┌─ Violations ({}) ", report.violations.len()).bright_blue()
        ));
        for cv in &report.violations {
            let v = &cv.violation;
            output.push_str(&format!(
                "│ {} {:<7} {} {}\n",
                format!("[{}]", v.rule_id).bright_cyan(),
                severity_label(v.severity),
                cv.chart_name.bright_white(),
                v.name.dimmed()
            ));
            output.push_str(&format!("│   {}\n", v.description));
            if !v.current_value.is_empty() {
                output.push_str(&format!("│   {} {}\n", "Current:".dimmed(), v.current_value.red()));
            }
        }
        output.push_str(&format!("└{}\n", RULE_THIN.bright_blue()));
    }

    // Impact
    let impact = &report.impact;
    output.push_str(&format!("\n{}\n", "┌─ Resource Impact ".bright_blue()));
    output.push_str(&totals_line("Before", &impact.before));
    output.push_str(&totals_line("After", &impact.after));
    output.push_str(&format!(
        "│ {:<8} cpu req {}  cpu lim {}  mem req {}  mem lim {}  replicas {:+}\n",
        "Delta".dimmed(),
        signed_pct(impact.delta.cpu_request_pct),
        signed_pct(impact.delta.cpu_limit_pct),
        signed_pct(impact.delta.memory_request_pct),
        signed_pct(impact.delta.memory_limit_pct),
        impact.delta.replicas_diff
    ));

    if !impact.cluster_node_groups.is_empty() {
        output.push_str(&format!("│\n│ {}\n", "Cluster node groups:".dimmed()));
        for group in &impact.cluster_node_groups {
            output.push_str(&format!(
                "│   {:<14} {:>4} → {:<4} nodes  {:>10}/month\n",
                group.instance_type.cyan(),
                group.node_count,
                group.nodes_needed_after,
                format!("${:.2}", group.cost_savings_monthly).green()
            ));
        }
    } else if !impact.node_estimations.is_empty() {
        output.push_str(&format!("│\n│ {}\n", "Node estimate by instance type:".dimmed()));
        for est in &impact.node_estimations {
            output.push_str(&format!(
                "│   {:<14} {:>4} → {:<4} nodes  {:>10}/month\n",
                est.instance_type.cyan(),
                est.nodes_before,
                est.nodes_after,
                format!("${:.2}", est.cost_savings_monthly).green()
            ));
        }
    }
    output.push_str(&format!(
        "│\n│ {} {}\n",
        "Spot savings:".dimmed(),
        format!("${:.2}/month", impact.total_spot_savings_monthly).green().bold()
    ));
    output.push_str(&format!(
        "│ {} {}ms     {} {}\n",
        "Duration:".dimmed(),
        report.metadata.duration_ms.to_string().dimmed(),
        "Source:".dimmed(),
        report.metadata.source.dimmed()
    ));
    output.push_str(&format!("└{}\n", RULE_THIN.bright_blue()));

    output
}

fn format_report_summary(report: &AnalysisReport) -> String {
    let count = |severity: Severity| {
        report
            .violations
            .iter()
            .filter(|v| v.violation.severity == severity)
            .count()
    };

    let mut output = String::new();
    output.push_str("▶ CHART OPTIMIZATION SUMMARY\n");
    output.push_str("──────────────────────────────────────────────────\n");
    output.push_str(&format!("│ Charts: {}\n", report.impact.before.chart_count));
    output.push_str(&format!(
        "│ Violations: {} ({} error, {} warning, {} info)\n",
        report.violations.len(),
        count(Severity::Error),
        count(Severity::Warning),
        count(Severity::Info)
    ));
    output.push_str(&format!(
        "│ CPU requests: {:+.1}%  Memory requests: {:+.1}%\n",
        report.impact.delta.cpu_request_pct, report.impact.delta.memory_request_pct
    ));
    output.push_str(&format!(
        "│ Spot savings: ${:.2}/month\n",
        report.impact.total_spot_savings_monthly
    ));
    output.push_str(&format!("│ Analysis Time: {}ms\n", report.metadata.duration_ms));
    output.push_str("──────────────────────────────────────────────────\n");
    output
}

// ============================================================================
// Verification report
// ============================================================================

/// Format a verification report to string.
pub fn format_verification_to_string(report: &VerificationReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Yaml => to_yaml(report),
        OutputFormat::Table | OutputFormat::Summary => format_verification_table(report),
    }
}

/// Format and print a verification report.
pub fn format_verification(report: &VerificationReport, format: OutputFormat) {
    println!("{}", format_verification_to_string(report, format));
}

fn format_verification_table(report: &VerificationReport) -> String {
    let mut output = header("🔎 FIX VERIFICATION REPORT");

    for entry in &report.entries {
        output.push_str(&format!(
            "│ {:<11} {} {} {}\n",
            status_label(entry.result.status),
            format!("[{}]", entry.rule_id).bright_cyan(),
            entry.chart_name.bright_white(),
            entry.rule_name.dimmed()
        ));
        if !entry.result.note.is_empty() {
            output.push_str(&format!("│   {}\n", entry.result.note));
        }
    }

    output.push_str(&format!(
        "└{}\n{} verified, {} unresolved, {} unverified, {} not run\n",
        RULE_THIN.bright_blue(),
        report.count(FixVerificationStatus::Verified).to_string().green(),
        report.count(FixVerificationStatus::Unresolved).to_string().yellow(),
        report.count(FixVerificationStatus::Unverified).to_string().red(),
        report.count(FixVerificationStatus::NotRun)
    ));
    output
}

// ============================================================================
// Rule listing
// ============================================================================

/// Format the rule catalog.
pub fn format_rules_to_string(rules: &[RuleDescriptor], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&rules),
        OutputFormat::Yaml => to_yaml(&rules),
        OutputFormat::Table | OutputFormat::Summary => {
            let mut output = String::new();
            for rule in rules {
                output.push_str(&format!(
                    "{} {:<8} {:<13} {}\n",
                    rule.id.bright_cyan(),
                    severity_label(rule.severity),
                    rule.category.as_str().dimmed(),
                    rule.name
                ));
            }
            output
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::impact::ResourceImpactCalculator;
    use crate::optimizer::rules::catalog;
    use crate::optimizer::types::{AnalysisMetadata, ChartInfo};

    fn report() -> AnalysisReport {
        let charts = vec![ChartInfo::new("api").with_cpu(100.0, 200.0)];
        AnalysisReport {
            violations: Vec::new(),
            impact: ResourceImpactCalculator::new().compute_impact(&charts, &[], None),
            metadata: AnalysisMetadata::new("fleet.yaml"),
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("table"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("summary"), Some(OutputFormat::Summary));
        assert_eq!(OutputFormat::parse("invalid"), None);
    }

    #[test]
    fn test_format_json() {
        let json = format_report_to_string(&report(), OutputFormat::Json);
        assert!(json.contains("\"violations\""));
        assert!(json.contains("\"node_estimations\""));
    }

    #[test]
    fn test_format_table() {
        let table = format_report_to_string(&report(), OutputFormat::Table);
        assert!(table.contains("HELM CHART OPTIMIZATION REPORT"));
        assert!(table.contains("Resource Impact"));
    }

    #[test]
    fn test_format_summary() {
        let summary = format_report_to_string(&report(), OutputFormat::Summary);
        assert!(summary.contains("Charts: 1"));
        assert!(summary.contains("Violations: 0"));
    }

    #[test]
    fn test_format_rules() {
        let listing = format_rules_to_string(&catalog().descriptors(), OutputFormat::Table);
        assert_eq!(listing.lines().count(), catalog().len());
        assert!(listing.contains("SEC001"));
    }
}

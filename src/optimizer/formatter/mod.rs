//! Output formatting for analysis and verification results.
//!
//! Supports multiple output formats: table, JSON, YAML, and plain text.

mod output;

pub use output::{
    OutputFormat, format_report, format_report_to_string, format_rules_to_string,
    format_verification, format_verification_to_string,
};

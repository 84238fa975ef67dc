//! Parsing utilities for quantities and rendered manifests.

pub mod quantity;
pub mod rendered;

pub use quantity::{
    GIB, MIB, cpu_from_value, format_bytes, format_millicores, memory_from_value,
    parse_cpu_millicores, parse_memory_bytes, parse_memory_mi, quantity_text,
};
pub use rendered::build_rule_inputs_from_rendered;

use crate::{
    cli::OutputFormat,
    optimizer::{catalog, formatter::format_rules_to_string},
};

pub fn handle_rules(format: OutputFormat) -> crate::Result<()> {
    let listing = format_rules_to_string(&catalog().descriptors(), format.into());
    println!("{}", listing.trim_end());
    Ok(())
}

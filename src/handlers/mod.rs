// Handler modules
pub mod analyze;
pub mod rules;
pub mod verify;

// Re-export all handler functions
pub use analyze::{AnalyzeOptions, handle_analyze};
pub use rules::handle_rules;
pub use verify::{VerifyOptions, handle_verify, handle_verify_with};

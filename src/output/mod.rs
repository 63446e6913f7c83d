//! Output writers for translation results.
//!
//! - JSON reports (result wrapped with schema version and timestamp)
//! - Text rendering, one frame per line

pub mod json;
pub mod text;

// Re-export main functions
pub use json::{read_report, report_to_string, write_report, TranslationReport};
pub use text::{format_frame, format_stacktrace};

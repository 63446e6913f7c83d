//! Plain-text rendering of a translated stacktrace.

use crate::parser::{ResolvedFrame, TranslationResult};
use std::fmt::Write;

/// `<module> [<address>] <file>:<line>`
pub fn format_frame(frame: &ResolvedFrame) -> String {
    format!("{} [{}] {}:{}", frame.module, frame.address, frame.file, frame.line)
}

/// Header line, one line per frame, then any warnings
pub fn format_stacktrace(result: &TranslationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Spring {} (config={}, branch={}): {}/{} frames resolved",
        result.revision,
        result.config,
        result.branch,
        result.resolved_count(),
        result.stacktrace.len()
    );
    for frame in &result.stacktrace {
        let _ = writeln!(out, "{}", format_frame(frame));
    }
    for warning in &result.warnings {
        let _ = writeln!(out, "warning: {}", warning);
    }
    out
}

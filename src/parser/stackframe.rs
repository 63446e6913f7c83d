//! Stack frame collection from infolog text.
//!
//! Frames are grouped by module (because addr2line has a huge per-module
//! overhead) but keep their position in the log so the final stacktrace can
//! be put back in order.

use super::schema::CollectedFrames;
use super::version::{RE_PREFIX, RE_SUFFIX};
use log::{debug, info};
use regex::Regex;

/// Frame number, module path ending in .exe/.dll, optional `(symbol+0x..)`
/// annotation and bracketed address.
///
/// Example: `[      0] (0) C:\Program Files\Spring\spring.exe [0x0080F268]`
/// -> (`C:\Program Files\Spring\spring.exe`, `0x0080F268`)
fn stackframe_pattern() -> String {
    format!(
        r"(?m){RE_PREFIX}\(\d+\)[ \t]+(.*(?i:\.exe|\.dll))(?:\([^)\r\n]*\))?[ \t]+\[(0x[0-9A-Fa-f]+)\]{RE_SUFFIX}"
    )
}

/// Extracts (module, address) pairs from a log
#[derive(Debug, Clone)]
pub struct StackframeCollector {
    /// Group 1 is the module, group 2 the address
    pattern: Regex,
}

impl StackframeCollector {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    /// Collect frames top to bottom
    ///
    /// Finding no frames is not an error here; the caller decides.
    pub fn collect(&self, infolog: &str) -> CollectedFrames {
        info!("Collecting stackframes per module...");

        let mut frames = CollectedFrames::default();
        for caps in self.pattern.captures_iter(infolog) {
            if let (Some(module), Some(address)) = (caps.get(1), caps.get(2)) {
                frames.push(module.as_str(), address.as_str());
            }
        }

        debug!(
            "frames = {:?}, frame_count = {}",
            frames.by_module, frames.frame_count
        );
        info!("\t[OK]");
        frames
    }
}

impl Default for StackframeCollector {
    fn default() -> Self {
        Self::new(Regex::new(&stackframe_pattern()).expect("built-in stackframe pattern must compile"))
    }
}

/// Collect frames with the default grammar
pub fn collect_frames(infolog: &str) -> CollectedFrames {
    StackframeCollector::default().collect(infolog)
}

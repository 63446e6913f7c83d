//! Data model shared by the parser, the symbol resolver and the wire format.
//!
//! `TranslationResult` is what callers receive, both from the library and
//! over JSON-RPC.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File name reported for frames without debug information
pub const UNKNOWN_FILE: &str = "??";

/// Build identity detected in an infolog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub config: String,
    pub branch: String,
    pub revision: String,
}

/// A single (module, address) pair taken from a backtrace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Position in the log, 0-based; defines output order
    pub index: usize,

    /// Module path exactly as it appeared in the log
    pub module: String,

    /// Return address in `0x...` form
    pub address: String,
}

/// Frame index and address, stored per module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameAddress {
    pub index: usize,
    pub address: String,
}

/// Stack frames grouped by module so every module is resolved in one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedFrames {
    pub by_module: BTreeMap<String, Vec<FrameAddress>>,
    pub frame_count: usize,
}

impl CollectedFrames {
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Add the next frame in log order
    pub fn push(&mut self, module: &str, address: &str) {
        self.by_module
            .entry(module.to_string())
            .or_default()
            .push(FrameAddress {
                index: self.frame_count,
                address: address.to_string(),
            });
        self.frame_count += 1;
    }

    /// All frames back in log order
    pub fn frames(&self) -> Vec<StackFrame> {
        let mut frames: Vec<StackFrame> = self
            .by_module
            .iter()
            .flat_map(|(module, addresses)| {
                addresses.iter().map(move |frame| StackFrame {
                    index: frame.index,
                    module: module.clone(),
                    address: frame.address.clone(),
                })
            })
            .collect();
        frames.sort_by_key(|frame| frame.index);
        frames
    }
}

/// A frame after symbol lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFrame {
    /// Implied by the position in `TranslationResult::stacktrace` on the wire
    #[serde(skip)]
    pub index: usize,

    pub module: String,
    pub address: String,

    /// `??` if unresolved
    pub file: String,

    /// 0 if unresolved
    pub line: u32,
}

impl ResolvedFrame {
    /// Frame for which no debug information is available
    pub fn unresolved(index: usize, module: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            index,
            module: module.into(),
            address: address.into(),
            file: UNKNOWN_FILE.to_string(),
            line: 0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.file != UNKNOWN_FILE
    }
}

/// Complete answer to a translation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub config: String,
    pub branch: String,
    pub revision: String,

    /// One entry per stack frame, in log order
    pub stacktrace: Vec<ResolvedFrame>,

    /// Non-fatal problems (unknown archive entries, modules that failed to resolve)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl TranslationResult {
    /// Restore frame indices after deserialization
    pub fn reindex(&mut self) {
        for (index, frame) in self.stacktrace.iter_mut().enumerate() {
            frame.index = index;
        }
    }

    pub fn resolved_count(&self) -> usize {
        self.stacktrace.iter().filter(|f| f.is_resolved()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_running_index() {
        let mut frames = CollectedFrames::default();
        frames.push("a.exe", "0x1");
        frames.push("b.dll", "0x2");
        frames.push("a.exe", "0x3");

        assert_eq!(frames.frame_count, 3);
        let a = &frames.by_module["a.exe"];
        assert_eq!(a[0].index, 0);
        assert_eq!(a[1].index, 2);
        assert_eq!(frames.by_module["b.dll"][0].index, 1);

        let addresses: Vec<_> = frames.frames().into_iter().map(|f| f.address).collect();
        assert_eq!(addresses, vec!["0x1", "0x2", "0x3"]);
    }

    #[test]
    fn test_wire_format_omits_index_and_empty_warnings() {
        let result = TranslationResult {
            config: "default".to_string(),
            branch: "master".to_string(),
            revision: "0.81.2.1".to_string(),
            stacktrace: vec![ResolvedFrame::unresolved(0, "spring.exe", "0x1")],
            warnings: Vec::new(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("warnings").is_none());
        assert_eq!(
            json["stacktrace"][0],
            serde_json::json!({"module": "spring.exe", "address": "0x1", "file": "??", "line": 0})
        );
    }

    #[test]
    fn test_reindex() {
        let json = r#"{"config":"default","branch":"master","revision":"1",
            "stacktrace":[{"module":"a","address":"0x1","file":"??","line":0},
                          {"module":"b","address":"0x2","file":"x.cpp","line":3}]}"#;
        let mut result: TranslationResult = serde_json::from_str(json).unwrap();
        result.reindex();
        assert_eq!(result.stacktrace[1].index, 1);
        assert_eq!(result.resolved_count(), 1);
    }
}

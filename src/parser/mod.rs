//! Infolog parsing and result schema.
//!
//! This module handles:
//! - Detecting the build version that produced a log
//! - Collecting stack frames grouped by module
//! - Defining the translation result schema

pub mod schema;
pub mod stackframe;
pub mod version;

// Re-export main types
pub use schema::{
    CollectedFrames, FrameAddress, ResolvedFrame, StackFrame, TranslationResult, VersionInfo,
    UNKNOWN_FILE,
};
pub use stackframe::{collect_frames, StackframeCollector};
pub use version::{detect_legacy_version, detect_version, VersionDetector, VersionPattern};

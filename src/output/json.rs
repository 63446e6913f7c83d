//! JSON report writer.
//!
//! Wraps a `TranslationResult` with a schema version and timestamp and
//! writes it to disk.

use crate::parser::TranslationResult;
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::OutputError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// A translation as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationReport {
    /// Report schema version
    pub version: String,
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub result: TranslationResult,
}

impl TranslationReport {
    pub fn new(result: TranslationResult) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            result,
        }
    }
}

/// Write a report to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `report` - Report to write
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_report(report: &TranslationReport, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing report to: {}", output_path.display());

    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!("Cannot create directory {}: {}", parent.display(), e))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    serde_json::to_writer_pretty(BufWriter::new(file), report).map_err(OutputError::SerializationFailed)?;

    info!("Report written successfully ({} bytes)", calculate_file_size(output_path));
    Ok(())
}

/// Serialize a report without touching the filesystem
pub fn report_to_string(report: &TranslationReport) -> Result<String, OutputError> {
    serde_json::to_string_pretty(report).map_err(OutputError::SerializationFailed)
}

fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a report back from a JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_report(input_path: impl AsRef<Path>) -> Result<TranslationReport, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading report from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let mut report: TranslationReport =
        serde_json::from_reader(file).map_err(OutputError::SerializationFailed)?;
    report.result.reindex();

    debug!(
        "Report loaded: version {}, rev {}, {} frames",
        report.version,
        report.result.revision,
        report.result.stacktrace.len()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ResolvedFrame;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn create_test_report() -> TranslationReport {
        TranslationReport::new(TranslationResult {
            config: "default".to_string(),
            branch: "release".to_string(),
            revision: "93.2.1-56-gdca244e".to_string(),
            stacktrace: vec![
                ResolvedFrame {
                    index: 0,
                    module: "C:\\Spring\\spring.exe".to_string(),
                    address: "0x0080F268".to_string(),
                    file: "rts/System/CrashHandler.cpp".to_string(),
                    line: 42,
                },
                ResolvedFrame::unresolved(1, "C:\\Windows\\kernel32.dll", "0x7C80ABC1"),
            ],
            warnings: Vec::new(),
        })
    }

    #[test]
    fn test_write_and_read_report() {
        let report = create_test_report();
        let temp_file = NamedTempFile::new().unwrap();

        write_report(&report, temp_file.path()).unwrap();
        let loaded = read_report(temp_file.path()).unwrap();

        assert_eq!(loaded, report);
    }

    #[test]
    fn test_report_layout() {
        let value: serde_json::Value =
            serde_json::from_str(&report_to_string(&create_test_report()).unwrap()).unwrap();
        assert_eq!(value["version"], SCHEMA_VERSION);
        assert_eq!(value["result"]["stacktrace"][1]["file"], "??");
        assert_eq!(value["result"]["stacktrace"][1]["line"], 0);
        assert!(value["result"].get("warnings").is_none());
    }

    #[test]
    fn test_validate_output_path_empty() {
        assert!(validate_output_path(Path::new("")).is_err());
    }

    #[test]
    fn test_validate_output_path_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(validate_output_path(temp_dir.path()).is_err());
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/report.json");

        write_report(&create_test_report(), &nested_path).unwrap();

        assert!(nested_path.exists());
    }
}

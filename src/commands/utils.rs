use crate::output::{format_stacktrace, write_report, TranslationReport};
use crate::parser::TranslationResult;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

/// Read an infolog from disk
///
/// Logs are not guaranteed to be UTF-8; invalid sequences are replaced.
pub fn read_infolog(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read infolog {}", path.display()))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Check that an infolog path points at a readable file
pub fn validate_infolog_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        anyhow::bail!("Infolog path cannot be empty");
    }
    if !path.is_file() {
        anyhow::bail!("Infolog {} does not exist or is not a file", path.display());
    }
    Ok(())
}

/// Print the stacktrace and optionally write the JSON report
pub fn emit_result(result: &TranslationResult, output_json: Option<&PathBuf>) -> Result<()> {
    print!("{}", format_stacktrace(result));

    if let Some(path) = output_json {
        let report = TranslationReport::new(result.clone());
        write_report(&report, path).context("Failed to write translation report")?;
        log::info!("✓ Report written to: {}", path.display());
    }
    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("Stacktrace Translator v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Translates Spring crash and hang-detection stacktraces into source locations.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_infolog_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infolog.txt");
        std::fs::write(&path, b"Spring \xff 0.82.5\n").unwrap();

        let text = read_infolog(&path).unwrap();
        assert!(text.starts_with("Spring "));
        assert!(text.contains("0.82.5"));
    }

    #[test]
    fn test_validate_infolog_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_infolog_path(Path::new("")).is_err());
        assert!(validate_infolog_path(dir.path()).is_err());
        assert!(validate_infolog_path(&dir.path().join("missing.txt")).is_err());

        let path = dir.path().join("infolog.txt");
        std::fs::write(&path, "").unwrap();
        assert!(validate_infolog_path(&path).is_ok());
    }
}

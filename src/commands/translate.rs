//! Translate command implementation.
//!
//! The translate command:
//! 1. Reads the infolog
//! 2. Translates it against the local symbol tree
//! 3. Prints the frames and writes the optional JSON report

use super::utils::{emit_result, read_infolog, validate_infolog_path};
use crate::parser::TranslationResult;
use crate::translator::StacktraceTranslator;
use crate::utils::config::Config;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the translate command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone, Default)]
pub struct TranslateArgs {
    /// Infolog to translate
    pub infolog: PathBuf,

    /// Overrides `[symbols] root`
    pub symbols: Option<PathBuf>,

    /// Overrides `[symbols] platform`
    pub platform: Option<String>,

    /// Output path for the JSON report
    pub output_json: Option<PathBuf>,
}

/// Execute the translate command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `config` - Loaded configuration, before CLI overrides
/// * `args` - Translate command arguments
///
/// # Returns
/// The translation, after it has been printed
///
/// # Errors
/// * Unreadable infolog
/// * Translation failure (reason as the service would report it)
/// * Report write errors
pub fn execute_translate(mut config: Config, args: TranslateArgs) -> Result<TranslationResult> {
    let start_time = Instant::now();

    if let Some(root) = &args.symbols {
        config.symbols.root = root.clone();
    }
    if let Some(platform) = &args.platform {
        config.symbols.platform = platform.clone();
    }
    info!("Symbol root: {} ({})", config.symbols.root.display(), config.symbols.platform);

    info!("Step 1/3: Reading infolog {}...", args.infolog.display());
    let infolog = read_infolog(&args.infolog)?;

    info!("Step 2/3: Translating stacktrace...");
    let translator = StacktraceTranslator::new(config).context("Invalid configuration")?;
    let result = translator
        .translate_stacktrace(&infolog)
        .context("Translation failed")?;

    info!("Step 3/3: Writing output...");
    emit_result(&result, args.output_json.as_ref())?;

    info!(
        "Translation completed in {:.2}s ({}/{} frames resolved)",
        start_time.elapsed().as_secs_f64(),
        result.resolved_count(),
        result.stacktrace.len()
    );
    Ok(result)
}

/// Validate translate arguments
///
/// **Public** - can be called before execute_translate for early validation
pub fn validate_args(args: &TranslateArgs) -> Result<()> {
    validate_infolog_path(&args.infolog)?;

    if let Some(root) = &args.symbols {
        if !root.is_dir() {
            anyhow::bail!("Symbol directory {} does not exist", root.display());
        }
    }

    if args.platform.as_deref().is_some_and(str::is_empty) {
        anyhow::bail!("Platform cannot be empty");
    }

    Ok(())
}

//! Remote command implementation: translate through a running service.

use super::utils::{emit_result, read_infolog, validate_infolog_path};
use crate::parser::TranslationResult;
use crate::rpc::RpcClient;
use crate::utils::config::DEFAULT_SERVICE_URL;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the remote command
#[derive(Debug, Clone)]
pub struct RemoteArgs {
    /// Service URL
    pub url: String,

    /// Infolog to translate
    pub infolog: PathBuf,

    /// Output path for the JSON report
    pub output_json: Option<PathBuf>,
}

impl Default for RemoteArgs {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVICE_URL.to_string(),
            infolog: PathBuf::new(),
            output_json: None,
        }
    }
}

/// Execute the remote command
///
/// # Errors
/// * Unreadable infolog
/// * Service unreachable or rejected the log
/// * Report write errors
pub fn execute_remote(args: RemoteArgs) -> Result<TranslationResult> {
    let start_time = Instant::now();

    info!("Step 1/3: Reading infolog {}...", args.infolog.display());
    let infolog = read_infolog(&args.infolog)?;

    info!("Step 2/3: Sending to {}...", args.url);
    let client = RpcClient::new(&args.url).context("Failed to create RPC client")?;
    let result = client
        .translate_stacktrace(&infolog)
        .with_context(|| format!("Remote translation via {} failed", args.url))?;

    info!("Step 3/3: Writing output...");
    emit_result(&result, args.output_json.as_ref())?;

    info!("Remote translation completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(result)
}

/// Validate remote arguments
pub fn validate_args(args: &RemoteArgs) -> Result<()> {
    if args.url.is_empty() {
        anyhow::bail!("Service URL cannot be empty");
    }

    if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
        anyhow::bail!("Service URL must start with http:// or https://");
    }

    validate_infolog_path(&args.infolog)
}

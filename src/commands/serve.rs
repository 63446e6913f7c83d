//! Serve command implementation: run the JSON-RPC translation service.

use crate::rpc;
use crate::translator::StacktraceTranslator;
use crate::utils::config::Config;
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments for the serve command
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Overrides `[server] listen`
    pub listen: Option<String>,

    /// Overrides `[server] pid_file`
    pub pid_file: Option<PathBuf>,
}

/// Holds the PID file for as long as the server runs
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`
    pub fn create(path: &Path) -> Result<Self> {
        std::fs::write(path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write PID file {}", path.display()))?;
        info!("PID file written to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove PID file {}: {}", self.path.display(), e);
        }
    }
}

/// Execute the serve command
///
/// **Public** - main entry point called from main.rs
///
/// Blocks until the server receives ctrl-c.
pub fn execute_serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(pid_file) = args.pid_file {
        config.server.pid_file = Some(pid_file);
    }
    config.validate().context("Invalid configuration")?;

    info!("Symbol root: {} ({})", config.symbols.root.display(), config.symbols.platform);
    info!(
        "Tools: {} / {}",
        config.tools.seven_zip.display(),
        config.tools.addr2line.display()
    );

    let server_config = config.server.clone();
    let translator = Arc::new(StacktraceTranslator::new(config).context("Invalid configuration")?);

    let _pid_file = server_config
        .pid_file
        .as_deref()
        .map(PidFile::create)
        .transpose()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime
        .block_on(rpc::serve(translator, &server_config))
        .with_context(|| format!("Server on {} failed", server_config.listen))?;

    Ok(())
}

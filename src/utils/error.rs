//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Reason given to callers for anything that is not a user-facing error
pub const GENERIC_FATAL_REASON: &str = "unhandled exception";

/// Errors that can occur while detecting the build version in an infolog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Unable to find detailed version in infolog")]
    NoVersionFound,

    #[error("Unable to parse detailed version string \"{0}\"")]
    UnparsableVersion(String),
}

/// Errors raised while running an external helper program
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} not found at {}", .path.display())]
    NotFound { tool: String, path: PathBuf },

    #[error("failed to start {tool}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while talking to {tool}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with status {} running `{command}`: {stderr}", .status.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Failed {
        tool: String,
        /// Program and arguments as run
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("{tool} did not finish within {}s", .timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },
}

/// Errors that can occur during a translation request
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("No stack frames found in infolog")]
    NoStackFrames,

    #[error("No debugging symbols available for config={config}, branch={branch}, rev={revision}, platform={platform}")]
    NoDebugArchive {
        config: String,
        branch: String,
        revision: String,
        platform: String,
    },

    #[error("Failed to list debug archive {}", .archive.display())]
    ArchiveToolFailure {
        archive: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("Failed to extract {entry} from {}", .archive.display())]
    ArchiveExtractFailure {
        archive: PathBuf,
        entry: String,
        #[source]
        source: ToolError,
    },

    #[error("Failed to resolve addresses for module {module}")]
    AddressResolutionFailure {
        module: String,
        #[source]
        source: ToolError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl TranslateError {
    /// Whether this error is meant to be shown to the caller as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            TranslateError::Version(_)
                | TranslateError::NoStackFrames
                | TranslateError::NoDebugArchive { .. }
        )
    }

    /// Convert into the error the caller sees
    ///
    /// User-facing errors keep their message; everything else becomes the
    /// generic reason so no paths, commands or tool output leak out.
    pub fn to_fatal(&self) -> FatalError {
        if self.is_user_facing() {
            FatalError::new(self.to_string())
        } else {
            FatalError::new(GENERIC_FATAL_REASON)
        }
    }
}

/// The only error a translation caller ever receives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct FatalError {
    pub reason: String,
}

impl FatalError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<TranslateError> for FatalError {
    fn from(err: TranslateError) -> Self {
        err.to_fatal()
    }
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that can occur during RPC communication
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Translation failed: {0}")]
    Fatal(String),

    #[error("Method not supported by this RPC endpoint")]
    MethodNotSupported,
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

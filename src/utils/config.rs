//! Configuration and constants for the translator.
//!
//! Every value has a built-in default; a TOML file can override any of them
//! and CLI flags override the file.

use crate::utils::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Address the service listens on when nothing else is configured
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Default URL used by the `remote` command
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000/";

/// Timeout for requests made by the remote client
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(300);

// Helper programs
pub const DEFAULT_SEVENZIP: &str = "/usr/bin/7za";
pub const DEFAULT_ADDR2LINE: &str = "/usr/bin/i586-mingw32msvc-addr2line";
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

/// Everything before (and including) the first of these is stripped from
/// paths returned by addr2line. First one is buildbot, second one is BuildServ.
pub const DEFAULT_PATH_STRIP_UNTIL: &[&str] = &["/build/", "}.mingw32.cmake/"];

/// Symbol root below the home directory
pub const DEFAULT_SYMBOL_ROOT: &str = "www";
pub const DEFAULT_PLATFORM: &str = "win32";
pub const DEFAULT_ARCHIVE_SUFFIX: &str = "_dbg.7z";

/// Pre-migration builds live under `<root>/<LEGACY_SUBDIR>/...`
pub const DEFAULT_LEGACY_SUBDIR: &str = "buildserv";

// Archive entry classification. Executables match by stem prefix, so
// `spring` covers spring-dedicated, spring-headless and friends.
pub const DEFAULT_EXECUTABLES: &[&str] = &["spring"];
pub const DEFAULT_LIBRARIES: &[&str] = &["unitsync"];

pub const DEFAULT_JOBS: usize = 4;
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub symbols: SymbolsConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    pub translate: TranslateConfig,
}

/// Where debug-symbol archives live and how they are named
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SymbolsConfig {
    /// Root of `<config>/<branch>/<rev>/<platform>/` trees
    pub root: PathBuf,
    pub legacy_subdir: String,
    pub platform: String,
    pub archive_suffix: String,
    /// Stem prefixes of `.exe` modules
    pub executables: Vec<String>,
    /// Exact stems of `.dll` modules
    pub libraries: Vec<String>,
}

/// `~/www`, or `www` relative to the working directory when there is no home
pub fn default_symbol_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_SYMBOL_ROOT))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SYMBOL_ROOT))
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            root: default_symbol_root(),
            legacy_subdir: DEFAULT_LEGACY_SUBDIR.to_string(),
            platform: DEFAULT_PLATFORM.to_string(),
            archive_suffix: DEFAULT_ARCHIVE_SUFFIX.to_string(),
            executables: DEFAULT_EXECUTABLES.iter().map(|s| s.to_string()).collect(),
            libraries: DEFAULT_LIBRARIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// External helper programs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub seven_zip: PathBuf,
    pub addr2line: PathBuf,
    pub timeout_secs: u64,
    /// Directory for extracted symbol files (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
    pub path_strip_until: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            seven_zip: PathBuf::from(DEFAULT_SEVENZIP),
            addr2line: PathBuf::from(DEFAULT_ADDR2LINE),
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            temp_dir: None,
            path_strip_until: DEFAULT_PATH_STRIP_UNTIL.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Upper bound on translations running at the same time
    pub max_concurrent: usize,
    pub pid_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN_ADDR.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            pid_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslateConfig {
    /// Number of modules resolved in parallel
    pub jobs: usize,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self { jobs: DEFAULT_JOBS }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and keys fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Check values that would make every translation fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tools.seven_zip.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("tools.seven_zip is empty".to_string()));
        }
        if self.tools.addr2line.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("tools.addr2line is empty".to_string()));
        }
        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "tools.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.translate.jobs == 0 {
            return Err(ConfigError::Invalid(
                "translate.jobs must be greater than 0".to_string(),
            ));
        }
        if self.server.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "server.max_concurrent must be greater than 0".to_string(),
            ));
        }
        if self.symbols.archive_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "symbols.archive_suffix is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_root_is_under_home() {
        let root = SymbolsConfig::default().root;
        assert!(root.ends_with(DEFAULT_SYMBOL_ROOT));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(root, home.join("www"));
            assert!(root.is_absolute());
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [symbols]
            root = "/srv/www"

            [tools]
            timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.symbols.root, PathBuf::from("/srv/www"));
        assert_eq!(config.symbols.platform, DEFAULT_PLATFORM);
        assert_eq!(config.tools.timeout(), Duration::from_secs(30));
        assert_eq!(config.tools.seven_zip, PathBuf::from(DEFAULT_SEVENZIP));
        assert_eq!(config.translate.jobs, DEFAULT_JOBS);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let result = Config::from_toml("[translate]\njobs = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::from_toml("[tools]\ntimeout_secs = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[symbols\nroot = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/nonexistent/translator.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}

//! Locating the debug-symbol archive for a build and classifying its entries.
//!
//! Archives live at `<root>/<config>/<branch>/<revision>/<platform>/`, one
//! file per directory whose name ends in the archive suffix (`_dbg.7z`).
//! Pre-migration builds are published under `<root>/<legacy_subdir>/...`.

use super::tools::ArchiveTool;
use crate::parser::VersionInfo;
use crate::utils::config::SymbolsConfig;
use crate::utils::error::TranslateError;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Extension of debug objects inside an archive
pub const DEBUG_EXTENSION: &str = ".dbg";

/// What kind of binary an archive entry carries symbols for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Main engine binary (`spring.exe`, `spring-dedicated.exe`, ...)
    Executable,
    /// Plain shared library (`unitsync.dll`)
    Library,
    AiInterface,
    SkirmishAi,
}

impl ModuleKind {
    /// Libraries are resolved with addresses relative to `.text`
    pub fn is_library(self) -> bool {
        !matches!(self, ModuleKind::Executable)
    }
}

/// An archive entry together with the name it is matched by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    /// Path inside the archive, e.g. `AI/Skirmish/KAIK/0.13/SkirmishAI.dbg`
    pub entry: String,
    /// Name used for matching, e.g. `KAIK/SkirmishAI.dll`
    pub canonical: String,
    pub kind: ModuleKind,
}

/// A located archive and the modules it has symbols for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugArchive {
    pub path: PathBuf,
    /// In archive order
    pub modules: Vec<ModuleEntry>,
    /// Entries that didn't classify as any known module
    pub unrecognized: Vec<String>,
}

impl DebugArchive {
    pub fn canonical_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.canonical.as_str()).collect()
    }

    pub fn module(&self, canonical: &str) -> Option<&ModuleEntry> {
        self.modules.iter().find(|m| m.canonical == canonical)
    }
}

/// Maps archive entry names to canonical module names
#[derive(Debug, Clone)]
pub struct ModuleClassifier {
    executables: Vec<String>,
    libraries: Vec<String>,
}

impl ModuleClassifier {
    pub fn new(executables: Vec<String>, libraries: Vec<String>) -> Self {
        Self {
            executables,
            libraries,
        }
    }

    pub fn from_config(config: &SymbolsConfig) -> Self {
        Self::new(config.executables.clone(), config.libraries.clone())
    }

    /// Canonical name and kind for `entry`, `None` if it isn't recognized
    ///
    /// - `spring.dbg` -> `spring.exe`, likewise any stem starting with an
    ///   executable prefix (`spring-dedicated.dbg` -> `spring-dedicated.exe`)
    /// - `unitsync.dbg` -> `unitsync.dll`
    /// - `AI/Interfaces/C/0.1/AIInterface.dbg` -> `C/AIInterface.dll`
    /// - `AI/Skirmish/KAIK/0.13/SkirmishAI.dbg` -> `KAIK/SkirmishAI.dll`
    pub fn classify(&self, entry: &str) -> Option<(String, ModuleKind)> {
        let normalized = entry.replace('\\', "/");
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        let file_name = segments.last()?;
        let stem = file_name.strip_suffix(DEBUG_EXTENSION)?;

        // the AI's directory must come before the file name
        let dir_after = |marker: &str| {
            segments
                .iter()
                .position(|s| *s == marker)
                .filter(|&i| i + 1 < segments.len() - 1)
                .map(|i| segments[i + 1])
        };

        if let Some(name) = dir_after("Interfaces") {
            return Some((format!("{name}/AIInterface.dll"), ModuleKind::AiInterface));
        }
        if let Some(name) = dir_after("Skirmish") {
            return Some((format!("{name}/SkirmishAI.dll"), ModuleKind::SkirmishAi));
        }
        if self.executables.iter().any(|e| stem.starts_with(e.as_str())) {
            return Some((format!("{stem}.exe"), ModuleKind::Executable));
        }
        if self.libraries.iter().any(|l| l == stem) {
            return Some((format!("{stem}.dll"), ModuleKind::Library));
        }
        None
    }
}

impl Default for ModuleClassifier {
    fn default() -> Self {
        Self::from_config(&SymbolsConfig::default())
    }
}

/// Finds and lists the archive for a build
pub struct ArchiveLocator<'a> {
    root: PathBuf,
    legacy_subdir: String,
    archive_suffix: String,
    classifier: ModuleClassifier,
    tool: &'a dyn ArchiveTool,
}

impl<'a> ArchiveLocator<'a> {
    pub fn new(config: &SymbolsConfig, classifier: ModuleClassifier, tool: &'a dyn ArchiveTool) -> Self {
        Self {
            root: config.root.clone(),
            legacy_subdir: config.legacy_subdir.clone(),
            archive_suffix: config.archive_suffix.clone(),
            classifier,
            tool,
        }
    }

    /// `<root>[/<legacy_subdir>]/<config>/<branch>/<revision>/<platform>`
    pub fn archive_dir(&self, version: &VersionInfo, platform: &str, legacy: bool) -> PathBuf {
        let mut dir = self.root.clone();
        if legacy {
            dir.push(&self.legacy_subdir);
        }
        dir.push(&version.config);
        dir.push(&version.branch);
        dir.push(&version.revision);
        dir.push(platform);
        dir
    }

    /// The archive file in `dir`, if there is one
    ///
    /// A missing or unreadable directory counts as "no archive".
    pub fn find_archive_file(&self, dir: &Path) -> Option<PathBuf> {
        let listing = match std::fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) => {
                debug!("Cannot list {}: {}", dir.display(), e);
                return None;
            }
        };

        let mut candidates: Vec<PathBuf> = listing
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.ends_with(&self.archive_suffix))
            })
            .map(|entry| entry.path())
            .collect();
        candidates.sort();

        if candidates.len() > 1 {
            warn!(
                "{} archives in {}, using {}",
                candidates.len(),
                dir.display(),
                candidates[0].display()
            );
        }
        candidates.into_iter().next()
    }

    /// Locate the archive for a build and list its modules
    ///
    /// # Returns
    /// `Ok(None)` when no symbols were published for this build
    ///
    /// # Errors
    /// * `TranslateError::ArchiveToolFailure` - the archive exists but can't be listed
    pub fn locate(
        &self,
        version: &VersionInfo,
        platform: &str,
        legacy: bool,
    ) -> Result<Option<DebugArchive>, TranslateError> {
        info!("Checking debug data availability...");

        let dir = self.archive_dir(version, platform, legacy);
        let Some(path) = self.find_archive_file(&dir) else {
            info!("\tNo debug archive in {}", dir.display());
            return Ok(None);
        };

        let entries = self
            .tool
            .list(&path)
            .map_err(|source| TranslateError::ArchiveToolFailure {
                archive: path.clone(),
                source,
            })?;

        let mut modules = Vec::new();
        let mut unrecognized = Vec::new();
        for entry in entries {
            match self.classifier.classify(&entry) {
                Some((canonical, kind)) => modules.push(ModuleEntry {
                    entry,
                    canonical,
                    kind,
                }),
                None => {
                    warn!("Unrecognized entry {} in {}", entry, path.display());
                    unrecognized.push(entry);
                }
            }
        }

        debug!("modules = {:?}", modules);
        info!("\t[OK] {} ({} modules)", path.display(), modules.len());

        Ok(Some(DebugArchive {
            path,
            modules,
            unrecognized,
        }))
    }
}

//! Build identity detection from infolog headers.
//!
//! A crash log names the build that produced it in a line like
//! `Spring 93.2.1-56-gdca244e release (OMP) has crashed.` or
//! `Hang detection triggered for Spring 0.81+.0.0 ([debug2]{pyAiInt}0.81.2.1-1059-g7937d00).`
//!
//! Line patterns are tried in order and the first one that matches anywhere
//! in the log wins. The captured token is then decomposed into
//! (config, branch, revision) by a separate regex.

use super::schema::VersionInfo;
use crate::utils::error::VersionError;
use log::{debug, info};
use regex::Regex;

/// Optional bracketed prefixes: `[      0] ` or `[t=00:00:01.000000][f=-000001] `
pub const RE_PREFIX: &str = r"^(?:\[[^\]\r\n]*\][ \t]*)*";
pub const RE_SUFFIX: &str = r"\r?$";

/// `93.2.1-56-gdca244e release (OMP)`; the branch follows the revision
const RE_VERSION: &str =
    r"Spring ([0-9][0-9.]*(?:-[0-9]+-g[0-9A-Fa-f]+)?(?: \w+)?)(?: \([\w ]*\))*";

/// `0.81+.0.0 ([debug2]{pyAiInt}0.81.2.1-1059-g7937d00)`; details are in parentheses
const RE_PAREN_VERSION: &str = r"Spring [^\(\r\n]+ \(([^\)\r\n]+)\)[\w\(\) ]*";

/// BuildServ builds: `0.81.2.1 (0.81.2.1-0-g884a107{@}-cmake-mingw32)`
const RE_OLD_VERSION: &str = r"Spring [^\(\r\n]+ \(([^\)\r\n]+)\{@\}-cmake-mingw32\)[\w\(\) ]*";

/// `[config]{branch}rev` followed by an optional branch word
const RE_VERSION_DETAILS: &str = r"^(?:\[(?P<config>\w+)\])?(?:\{(?P<branch>\w+)\})?(?P<rev>[0-9.]+(?:-[0-9]+-g[0-9A-Fa-f]+)?)(?:[ \t]+(?P<tail_branch>\w+))?\s";

/// Legacy tokens carry neither config nor branch
const RE_OLD_VERSION_DETAILS: &str = r"^(?P<rev>[0-9.]+(?:-[0-9]+-g[0-9A-Fa-f]+)?)\s";

pub const DEFAULT_CONFIG: &str = "default";
pub const DEFAULT_BRANCH: &str = "master";

/// Wrap a version regex into the crash and hang-detection line patterns
fn version_lines(version: &str) -> [String; 2] {
    [
        format!(r"(?m){RE_PREFIX}{version} has crashed\.{RE_SUFFIX}"),
        format!(r"(?m){RE_PREFIX}Hang detection triggered for {version}\.{RE_SUFFIX}"),
    ]
}

/// A line pattern plus the decomposer for the token it captures
#[derive(Debug, Clone)]
pub struct VersionPattern {
    /// Capture group 1 is the version token
    line: Regex,
    details: Regex,
}

impl VersionPattern {
    pub fn new(line: &str, details: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            line: Regex::new(line)?,
            details: Regex::new(details)?,
        })
    }

    fn builtin(version: &str, details: &str) -> [Self; 2] {
        version_lines(version).map(|line| {
            Self::new(&line, details).expect("built-in version pattern must compile")
        })
    }

    /// Version token from the first matching line, if any
    fn find_token<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.line
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Split a version token into its parts
    fn decompose(&self, token: &str) -> Result<VersionInfo, VersionError> {
        // a space is appended so the pattern can check for (end of string | space)
        let padded = format!("{token} ");
        let caps = self
            .details
            .captures(&padded)
            .ok_or_else(|| VersionError::UnparsableVersion(token.to_string()))?;

        let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

        let revision = group("rev")
            .filter(|rev| !rev.is_empty())
            .ok_or_else(|| VersionError::UnparsableVersion(token.to_string()))?;

        Ok(VersionInfo {
            config: group("config").unwrap_or_else(|| DEFAULT_CONFIG.to_string()),
            branch: group("branch")
                .or_else(|| group("tail_branch"))
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            revision,
        })
    }
}

/// Ordered set of version patterns
#[derive(Debug, Clone)]
pub struct VersionDetector {
    patterns: Vec<VersionPattern>,
}

impl VersionDetector {
    pub fn new(patterns: Vec<VersionPattern>) -> Self {
        Self { patterns }
    }

    /// Current version formats, newest first
    pub fn current() -> Self {
        let mut patterns = Vec::new();
        patterns.extend(VersionPattern::builtin(RE_VERSION, RE_VERSION_DETAILS));
        patterns.extend(VersionPattern::builtin(RE_PAREN_VERSION, RE_VERSION_DETAILS));
        Self::new(patterns)
    }

    /// Pre-migration (BuildServ) version format
    pub fn legacy() -> Self {
        Self::new(VersionPattern::builtin(RE_OLD_VERSION, RE_OLD_VERSION_DETAILS).to_vec())
    }

    /// Detect config, branch and revision in an infolog
    ///
    /// # Errors
    /// * `VersionError::NoVersionFound` - no pattern matches any line
    /// * `VersionError::UnparsableVersion` - the first matching line's token can't be decomposed
    pub fn detect(&self, infolog: &str) -> Result<VersionInfo, VersionError> {
        info!("Detecting version details...");

        let (pattern, token) = self
            .patterns
            .iter()
            .find_map(|pattern| pattern.find_token(infolog).map(|token| (pattern, token)))
            .ok_or(VersionError::NoVersionFound)?;

        debug!("Version token: {:?}", token);

        let version = pattern.decompose(token)?;

        info!(
            "\t[OK] config = {}, branch = {}, rev = {}",
            version.config, version.branch, version.revision
        );
        Ok(version)
    }
}

impl Default for VersionDetector {
    fn default() -> Self {
        Self::current()
    }
}

/// Detect the version with the current formats
pub fn detect_version(infolog: &str) -> Result<VersionInfo, VersionError> {
    VersionDetector::current().detect(infolog)
}

/// Detect the version of a pre-migration build
pub fn detect_legacy_version(infolog: &str) -> Result<VersionInfo, VersionError> {
    VersionDetector::legacy().detect(infolog)
}

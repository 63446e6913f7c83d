//! Stacktrace translation: the single entry point tying everything together.
//!
//! infolog -> version + frames -> debug archive -> per-module addr2line ->
//! stacktrace in log order.
//!
//! Errors about the request as a whole (no version, no frames, no archive)
//! abort it. Errors about one module's symbols only degrade that module's
//! frames to `??:0`.

use crate::parser::{
    CollectedFrames, FrameAddress, ResolvedFrame, StackframeCollector, TranslationResult,
    VersionDetector, VersionInfo,
};
use crate::symbols::{
    best_match, AddressAdjustments, AddressResolver, AddressTranslator, Addr2Line, ArchiveLocator,
    ArchiveTool, DebugArchive, ModuleClassifier, ModuleEntry, SevenZip,
};
use crate::utils::config::Config;
use crate::utils::error::{ConfigError, FatalError, TranslateError, GENERIC_FATAL_REASON};
use log::{debug, error, info};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Frames of one module plus the archive entry they resolve against
struct ModuleJob<'a> {
    module: &'a str,
    frames: &'a [FrameAddress],
    entry: Option<&'a ModuleEntry>,
}

/// Translates crash and hang-detection logs into source locations
pub struct StacktraceTranslator {
    config: Config,
    archive_tool: Arc<dyn ArchiveTool>,
    resolver: Arc<dyn AddressResolver>,
    detector: VersionDetector,
    legacy_detector: VersionDetector,
    collector: StackframeCollector,
    classifier: ModuleClassifier,
    adjustments: AddressAdjustments,
    pool: rayon::ThreadPool,
    requests: AtomicU64,
}

impl StacktraceTranslator {
    /// Translator backed by the configured 7-Zip and addr2line binaries
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let timeout = config.tools.timeout();
        let archive_tool = Arc::new(SevenZip::new(config.tools.seven_zip.clone(), timeout));
        let resolver = Arc::new(Addr2Line::new(config.tools.addr2line.clone(), timeout));
        Self::with_tools(config, archive_tool, resolver)
    }

    /// Translator using the given tool implementations
    pub fn with_tools(
        config: Config,
        archive_tool: Arc<dyn ArchiveTool>,
        resolver: Arc<dyn AddressResolver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.translate.jobs)
            .thread_name(|i| format!("translate-{i}"))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot start worker pool: {e}")))?;

        Ok(Self {
            classifier: ModuleClassifier::from_config(&config.symbols),
            config,
            archive_tool,
            resolver,
            detector: VersionDetector::current(),
            legacy_detector: VersionDetector::legacy(),
            collector: StackframeCollector::default(),
            adjustments: AddressAdjustments::default(),
            pool,
            requests: AtomicU64::new(0),
        })
    }

    /// Replace the current and legacy version patterns
    pub fn with_version_detectors(mut self, current: VersionDetector, legacy: VersionDetector) -> Self {
        self.detector = current;
        self.legacy_detector = legacy;
        self
    }

    pub fn with_collector(mut self, collector: StackframeCollector) -> Self {
        self.collector = collector;
        self
    }

    pub fn with_adjustments(mut self, adjustments: AddressAdjustments) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate a complete stacktrace
    ///
    /// The input may be a complete infolog. At the very least it must contain
    /// the `Spring XXX has crashed.` or `Hang detection triggered for Spring XXX.`
    /// line and at least one stack frame.
    ///
    /// # Errors
    /// A `FatalError` whose reason is safe to show to the caller. Anything
    /// unexpected is logged here in full and reported as a generic reason.
    pub fn translate_stacktrace(&self, infolog: &str) -> Result<TranslationResult, FatalError> {
        let request = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        info!("----- Start of translation process (request {}) -----", request);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.translate_request(request, infolog)));

        match outcome {
            Ok(Ok(result)) => {
                info!("----- End of translation process (request {}) -----", request);
                Ok(result)
            }
            Ok(Err(err)) if err.is_user_facing() => {
                error!("{}", err);
                Err(err.to_fatal())
            }
            Ok(Err(err)) => {
                error!("Request {} failed: {}", request, error_chain(&err));
                Err(err.to_fatal())
            }
            Err(payload) => {
                error!("Request {} panicked: {}", request, panic_message(payload.as_ref()));
                Err(FatalError::new(GENERIC_FATAL_REASON))
            }
        }
    }

    /// Translation with internal error detail kept
    pub fn translate_request(
        &self,
        request: u64,
        infolog: &str,
    ) -> Result<TranslationResult, TranslateError> {
        let detected = self.detect_version(infolog);
        let frames = self.collector.collect(infolog);

        if frames.is_empty() {
            return Err(TranslateError::NoStackFrames);
        }
        let (version, legacy) = detected?;

        let platform = self.config.symbols.platform.as_str();
        let locator = ArchiveLocator::new(&self.config.symbols, self.classifier.clone(), self.archive_tool.as_ref());
        let archive = locator
            .locate(&version, platform, legacy)?
            .ok_or_else(|| TranslateError::NoDebugArchive {
                config: version.config.clone(),
                branch: version.branch.clone(),
                revision: version.revision.clone(),
                platform: platform.to_string(),
            })?;

        let mut warnings: Vec<String> = archive
            .unrecognized
            .iter()
            .map(|entry| format!("debug archive entry not recognized: {entry}"))
            .collect();

        let stacktrace = self.translate_frames(request, &version, &frames, &archive, &mut warnings)?;

        Ok(TranslationResult {
            config: version.config,
            branch: version.branch,
            revision: version.revision,
            stacktrace,
            warnings,
        })
    }

    /// Current formats first, pre-migration format as a fallback
    fn detect_version(&self, infolog: &str) -> Result<(VersionInfo, bool), TranslateError> {
        match self.detector.detect(infolog) {
            Ok(version) => Ok((version, false)),
            Err(current_err) => match self.legacy_detector.detect(infolog) {
                Ok(version) => {
                    info!("Detected pre-migration version string");
                    Ok((version, true))
                }
                Err(_) => Err(current_err.into()),
            },
        }
    }

    /// Resolve all frames, module by module, and put them back in log order
    fn translate_frames(
        &self,
        request: u64,
        version: &VersionInfo,
        frames: &CollectedFrames,
        archive: &DebugArchive,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<ResolvedFrame>, TranslateError> {
        info!("Translating stacktrace...");

        let names = archive.canonical_names();
        let jobs: Vec<ModuleJob> = frames
            .by_module
            .iter()
            .map(|(module, addresses)| {
                let entry = best_match(module, &names).and_then(|name| archive.module(name));
                debug!(
                    "{} -> {}",
                    module,
                    entry.map_or("(no symbols)", |e| e.canonical.as_str())
                );
                ModuleJob {
                    module,
                    frames: addresses,
                    entry,
                }
            })
            .collect();

        let translator = AddressTranslator::new(
            self.archive_tool.as_ref(),
            self.resolver.as_ref(),
            &self.config.tools.path_strip_until,
        )
        .with_temp_dir(self.config.tools.temp_dir.clone())
        .with_request_tag(&request.to_string());

        let outcomes: Vec<(Vec<ResolvedFrame>, Option<String>)> = self.pool.install(|| {
            jobs.par_iter()
                .map(|job| self.resolve_module(&translator, &version.revision, &archive.path, job))
                .collect()
        });

        let mut slots: Vec<Option<ResolvedFrame>> = vec![None; frames.frame_count];
        for (resolved, warning) in outcomes {
            warnings.extend(warning);
            for frame in resolved {
                let index = frame.index;
                let slot = slots.get_mut(index).ok_or_else(|| {
                    TranslateError::Internal(format!("frame index {index} out of range"))
                })?;
                *slot = Some(frame);
            }
        }

        let stacktrace = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TranslateError::Internal("stack frame left unfilled".to_string()))?;

        debug!("translated_stacktrace = {:?}", stacktrace);
        info!("\t[OK]");
        Ok(stacktrace)
    }

    /// Frames of one module; failures degrade to unresolved frames plus a warning
    fn resolve_module(
        &self,
        translator: &AddressTranslator<'_>,
        revision: &str,
        archive: &std::path::Path,
        job: &ModuleJob<'_>,
    ) -> (Vec<ResolvedFrame>, Option<String>) {
        let unresolved = || -> Vec<ResolvedFrame> {
            job.frames
                .iter()
                .map(|f| ResolvedFrame::unresolved(f.index, job.module, f.address.as_str()))
                .collect()
        };

        let Some(entry) = job.entry else {
            return (unresolved(), None);
        };

        let lookup: Vec<String> = job
            .frames
            .iter()
            .map(|f| self.adjustments.adjust(revision, job.module, &f.address))
            .collect();

        match translator.translate(entry, archive, &lookup) {
            Ok(resolved) => {
                let frames = job
                    .frames
                    .iter()
                    .zip(resolved)
                    .map(|(frame, r)| ResolvedFrame {
                        index: frame.index,
                        module: job.module.to_string(),
                        address: frame.address.clone(),
                        file: r.file,
                        line: r.line,
                    })
                    .collect();
                (frames, None)
            }
            Err(err) => {
                error!("{}", error_chain(&err));
                (
                    unresolved(),
                    Some(format!(
                        "symbols for module {} could not be resolved",
                        entry.canonical
                    )),
                )
            }
        }
    }
}

/// `err: cause: cause...`
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ToolError;
    use std::fs::File;
    use std::path::Path;

    struct PanickingArchive;

    impl ArchiveTool for PanickingArchive {
        fn list(&self, _archive: &Path) -> Result<Vec<String>, ToolError> {
            panic!("listing exploded at /secret/path");
        }

        fn extract(&self, _archive: &Path, _entry: &str, _dest: File) -> Result<(), ToolError> {
            Ok(())
        }
    }

    struct NoResolver;

    impl AddressResolver for NoResolver {
        fn resolve(&self, _: &Path, addresses: &[String], _: bool) -> Result<Vec<String>, ToolError> {
            Ok(addresses.iter().map(|_| "??:0".to_string()).collect())
        }
    }

    #[test]
    fn test_panic_is_sanitized() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("default/master/0.82.5/win32");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("spring_0.82.5_dbg.7z"), "").unwrap();

        let mut config = Config::default();
        config.symbols.root = root.path().to_path_buf();
        let translator =
            StacktraceTranslator::with_tools(config, Arc::new(PanickingArchive), Arc::new(NoResolver)).unwrap();

        let err = translator
            .translate_stacktrace("Spring 0.82.5 (0.82.5) has crashed.\n(0) C:/spring.exe [0x1]\n")
            .unwrap_err();
        assert_eq!(err.reason, GENERIC_FATAL_REASON);
    }

    #[test]
    fn test_error_chain_lists_each_cause_once() {
        let err = TranslateError::AddressResolutionFailure {
            module: "spring.exe".to_string(),
            source: ToolError::Timeout {
                tool: "addr2line".to_string(),
                timeout: std::time::Duration::from_secs(5),
            },
        };
        assert_eq!(
            error_chain(&err),
            "Failed to resolve addresses for module spring.exe: addr2line did not finish within 5s"
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.translate.jobs = 0;
        let result = StacktraceTranslator::with_tools(config, Arc::new(PanickingArchive), Arc::new(NoResolver));
        assert!(result.is_err());
    }
}

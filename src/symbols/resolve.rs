//! Per-module address translation.
//!
//! For every matched module the debug object is extracted from the archive
//! into a scoped temporary file and addr2line is invoked exactly once for all
//! of that module's addresses.

use super::archive::ModuleEntry;
use super::tools::{AddressResolver, ArchiveTool};
use crate::parser::UNKNOWN_FILE;
use crate::utils::error::TranslateError;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A single address after lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub address: String,
    pub file: String,
    pub line: u32,
}

impl ResolvedAddress {
    fn unknown(address: &str) -> Self {
        Self {
            address: address.to_string(),
            file: UNKNOWN_FILE.to_string(),
            line: 0,
        }
    }
}

/// Strip everything up to and including the first build-root marker found
///
/// `/home/buildbot/build/rts/Game/Game.cpp` -> `rts/Game/Game.cpp`
pub fn strip_build_root(file: &str, markers: &[String]) -> String {
    for marker in markers {
        if let Some(pos) = file.find(marker.as_str()) {
            return file[pos + marker.len()..].to_string();
        }
    }
    file.to_string()
}

/// Parse one line of addr2line output into (file, line)
///
/// `??:0`, `??:?` and anything unparsable yield (`??`, 0).
pub fn parse_location(output: &str, markers: &[String]) -> (String, u32) {
    let output = output.trim();
    // addr2line may append " (discriminator N)"
    let output = output
        .find(" (discriminator")
        .map_or(output, |pos| &output[..pos]);

    let Some((file, line)) = output.rsplit_once(':') else {
        return (UNKNOWN_FILE.to_string(), 0);
    };
    if file.is_empty() || file == UNKNOWN_FILE {
        return (UNKNOWN_FILE.to_string(), 0);
    }

    let line = line.trim().parse::<u32>().unwrap_or(0);
    (strip_build_root(file, markers), line)
}

/// Extracts symbols and resolves addresses for one module at a time
pub struct AddressTranslator<'a> {
    archive_tool: &'a dyn ArchiveTool,
    resolver: &'a dyn AddressResolver,
    temp_dir: Option<PathBuf>,
    strip_markers: &'a [String],
    /// Prefix of temporary file names, unique per request
    temp_prefix: String,
}

impl<'a> AddressTranslator<'a> {
    pub fn new(
        archive_tool: &'a dyn ArchiveTool,
        resolver: &'a dyn AddressResolver,
        strip_markers: &'a [String],
    ) -> Self {
        Self {
            archive_tool,
            resolver,
            temp_dir: None,
            strip_markers,
            temp_prefix: "stacktrace-".to_string(),
        }
    }

    /// Put extracted symbol files in `dir` instead of the system temp dir
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Tag temporary files with a request identifier
    pub fn with_request_tag(mut self, tag: &str) -> Self {
        self.temp_prefix = format!("stacktrace-{tag}-");
        self
    }

    fn temp_file(&self) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.temp_prefix).suffix(".dbg");
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    /// Resolve `addresses` of `module` using the symbols in `archive`
    ///
    /// # Returns
    /// One entry per input address, in input order
    ///
    /// # Errors
    /// * `TranslateError::ArchiveExtractFailure` - the debug object couldn't be extracted
    /// * `TranslateError::AddressResolutionFailure` - addr2line failed
    pub fn translate(
        &self,
        module: &ModuleEntry,
        archive: &Path,
        addresses: &[String],
    ) -> Result<Vec<ResolvedAddress>, TranslateError> {
        // removed on drop, also when a tool fails
        let symbol_file = self
            .temp_file()
            .map_err(|e| TranslateError::Internal(format!("cannot create temporary file: {e}")))?;

        info!(
            "\tExtracting debug symbols for module {} from archive {}...",
            module.canonical,
            archive.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        );
        let dest = symbol_file
            .reopen()
            .map_err(|e| TranslateError::Internal(format!("cannot reopen temporary file: {e}")))?;
        self.archive_tool
            .extract(archive, &module.entry, dest)
            .map_err(|source| TranslateError::ArchiveExtractFailure {
                archive: archive.to_path_buf(),
                entry: module.entry.clone(),
                source,
            })?;
        info!("\t\t[OK]");

        // each distinct address is looked up once
        let mut unique: Vec<String> = Vec::new();
        let mut slots: HashMap<&str, usize> = HashMap::new();
        for address in addresses {
            slots.entry(address.as_str()).or_insert_with(|| {
                unique.push(address.clone());
                unique.len() - 1
            });
        }

        info!(
            "\tTranslating {} addresses for module {}...",
            unique.len(),
            module.canonical
        );
        let lines = self
            .resolver
            .resolve(symbol_file.path(), &unique, module.kind.is_library())
            .map_err(|source| TranslateError::AddressResolutionFailure {
                module: module.canonical.clone(),
                source,
            })?;
        if lines.len() != unique.len() {
            warn!(
                "addr2line returned {} lines for {} addresses of {}",
                lines.len(),
                unique.len(),
                module.canonical
            );
        }
        info!("\t\t[OK]");

        let resolved: Vec<ResolvedAddress> = addresses
            .iter()
            .map(|address| {
                let line = slots.get(address.as_str()).and_then(|&slot| lines.get(slot));
                match line {
                    Some(line) => {
                        let (file, line) = parse_location(line, self.strip_markers);
                        ResolvedAddress {
                            address: address.clone(),
                            file,
                            line,
                        }
                    }
                    None => ResolvedAddress::unknown(address),
                }
            })
            .collect();

        debug!("resolved {} = {:?}", module.canonical, resolved);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::archive::ModuleKind;
    use crate::utils::error::ToolError;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;

    fn markers() -> Vec<String> {
        vec!["/build/".to_string(), "}.mingw32.cmake/".to_string()]
    }

    struct FakeArchive {
        fail: bool,
    }

    impl ArchiveTool for FakeArchive {
        fn list(&self, _archive: &Path) -> Result<Vec<String>, ToolError> {
            Ok(Vec::new())
        }

        fn extract(&self, _archive: &Path, entry: &str, mut dest: File) -> Result<(), ToolError> {
            if self.fail {
                return Err(ToolError::Failed {
                    tool: "7za".to_string(),
                    command: "7za e -so -y spring_dbg.7z spring.dbg".to_string(),
                    status: Some(2),
                    stderr: String::new(),
                });
            }
            dest.write_all(entry.as_bytes()).map_err(|source| ToolError::Io {
                tool: "7za".to_string(),
                source,
            })
        }
    }

    /// Answers `rts/<address>.cpp:<n>` and remembers what it was asked
    #[derive(Default)]
    struct FakeResolver {
        calls: Mutex<Vec<(String, Vec<String>, bool)>>,
        fail: bool,
    }

    impl AddressResolver for FakeResolver {
        fn resolve(
            &self,
            symbol_file: &Path,
            addresses: &[String],
            section_relative: bool,
        ) -> Result<Vec<String>, ToolError> {
            let contents = std::fs::read_to_string(symbol_file).unwrap();
            self.calls
                .lock()
                .unwrap()
                .push((contents, addresses.to_vec(), section_relative));
            if self.fail {
                return Err(ToolError::Failed {
                    tool: "addr2line".to_string(),
                    command: "addr2line -e spring.dbg".to_string(),
                    status: Some(1),
                    stderr: String::new(),
                });
            }
            Ok(addresses
                .iter()
                .enumerate()
                .map(|(i, a)| format!("/home/buildbot/build/rts/{a}.cpp:{}", i + 1))
                .collect())
        }
    }

    fn spring() -> ModuleEntry {
        ModuleEntry {
            entry: "spring.dbg".to_string(),
            canonical: "spring.exe".to_string(),
            kind: ModuleKind::Executable,
        }
    }

    #[test]
    fn test_parse_location() {
        let m = markers();
        assert_eq!(
            parse_location("/home/buildbot/build/rts/Game/Game.cpp:527", &m),
            ("rts/Game/Game.cpp".to_string(), 527)
        );
        assert_eq!(
            parse_location("C:/x/{spring}.mingw32.cmake/rts/Sim/Unit.cpp:12 (discriminator 3)", &m),
            ("rts/Sim/Unit.cpp".to_string(), 12)
        );
        assert_eq!(parse_location("??:0", &m), ("??".to_string(), 0));
        assert_eq!(parse_location("??:?", &m), ("??".to_string(), 0));
        assert_eq!(parse_location("garbage", &m), ("??".to_string(), 0));
        assert_eq!(parse_location("rts/lib.cpp:?", &m), ("rts/lib.cpp".to_string(), 0));
    }

    #[test]
    fn test_one_batch_in_input_order() {
        let archive = FakeArchive { fail: false };
        let resolver = FakeResolver::default();
        let m = markers();
        let translator = AddressTranslator::new(&archive, &resolver, &m);

        let addresses = vec!["0x3".to_string(), "0x1".to_string(), "0x2".to_string()];
        let resolved = translator
            .translate(&spring(), Path::new("x_dbg.7z"), &addresses)
            .unwrap();

        let calls = resolver.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "spring.dbg");
        assert!(!calls[0].2);

        assert_eq!(resolved.len(), 3);
        for (i, r) in resolved.iter().enumerate() {
            assert_eq!(r.address, addresses[i]);
        }
        assert_eq!(resolved[0].file, "rts/0x3.cpp");
        assert_eq!(resolved[2].line, 3);
    }

    #[test]
    fn test_duplicate_addresses_resolved_once() {
        let archive = FakeArchive { fail: false };
        let resolver = FakeResolver::default();
        let m = markers();
        let translator = AddressTranslator::new(&archive, &resolver, &m);

        let addresses = vec!["0xa".to_string(), "0xb".to_string(), "0xa".to_string()];
        let resolved = translator
            .translate(&spring(), Path::new("x_dbg.7z"), &addresses)
            .unwrap();

        assert_eq!(resolver.calls.lock().unwrap()[0].1, vec!["0xa", "0xb"]);
        assert_eq!(resolved[0], resolved[2]);
        assert_eq!(resolved[1].line, 2);
    }

    #[test]
    fn test_libraries_use_text_section() {
        let archive = FakeArchive { fail: false };
        let resolver = FakeResolver::default();
        let m = markers();
        let translator = AddressTranslator::new(&archive, &resolver, &m);
        let module = ModuleEntry {
            entry: "AI/Skirmish/KAIK/0.13/SkirmishAI.dbg".to_string(),
            canonical: "KAIK/SkirmishAI.dll".to_string(),
            kind: ModuleKind::SkirmishAi,
        };

        translator
            .translate(&module, Path::new("x_dbg.7z"), &["0x1".to_string()])
            .unwrap();
        assert!(resolver.calls.lock().unwrap()[0].2);
    }

    #[test]
    fn test_extract_failure() {
        let archive = FakeArchive { fail: true };
        let resolver = FakeResolver::default();
        let m = markers();
        let translator = AddressTranslator::new(&archive, &resolver, &m);

        let result = translator.translate(&spring(), Path::new("x_dbg.7z"), &["0x1".to_string()]);
        assert!(matches!(result, Err(TranslateError::ArchiveExtractFailure { .. })));
        assert!(resolver.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_resolver_failure() {
        let archive = FakeArchive { fail: false };
        let resolver = FakeResolver {
            fail: true,
            ..Default::default()
        };
        let m = markers();
        let translator = AddressTranslator::new(&archive, &resolver, &m);

        let result = translator.translate(&spring(), Path::new("x_dbg.7z"), &["0x1".to_string()]);
        assert!(matches!(
            result,
            Err(TranslateError::AddressResolutionFailure { .. })
        ));
    }

    #[test]
    fn test_temp_files_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive { fail: false };
        let resolver = FakeResolver {
            fail: true,
            ..Default::default()
        };
        let m = markers();
        let translator = AddressTranslator::new(&archive, &resolver, &m)
            .with_temp_dir(Some(dir.path().to_path_buf()))
            .with_request_tag("7");

        let _ = translator.translate(&spring(), Path::new("x_dbg.7z"), &["0x1".to_string()]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

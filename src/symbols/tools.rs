//! External helper programs: the archive tool (7-Zip) and addr2line.
//!
//! Both are reached through small traits so the translation logic can be
//! driven by fakes returning canned output.

use crate::utils::error::ToolError;
use log::debug;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Lists and extracts entries of a debug-symbol archive
pub trait ArchiveTool: Send + Sync {
    /// Names of all file entries inside `archive`, in archive order
    fn list(&self, archive: &Path) -> Result<Vec<String>, ToolError>;

    /// Write the raw bytes of `entry` into `dest`
    fn extract(&self, archive: &Path, entry: &str, dest: File) -> Result<(), ToolError>;
}

/// Maps addresses in a symbol file to `file:line` strings
pub trait AddressResolver: Send + Sync {
    /// One output line per input address, same order
    ///
    /// `section_relative` resolves addresses as offsets into `.text`, which is
    /// what shared libraries need.
    fn resolve(
        &self,
        symbol_file: &Path,
        addresses: &[String],
        section_relative: bool,
    ) -> Result<Vec<String>, ToolError>;
}

/// What a finished tool wrote
#[derive(Debug, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Program and arguments, space separated
pub fn command_line(command: &Command) -> String {
    let command = command.as_std();
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `command` to completion, feeding `input` on stdin
///
/// Stdout is captured unless the caller already redirected it. The process is
/// killed once `timeout` passes and the call fails with `ToolError::Timeout`.
///
/// Callers are synchronous (rayon workers, blocking tasks), so each call
/// drives its own current-thread runtime.
pub fn run_tool(
    tool: &str,
    mut command: Command,
    input: Option<Vec<u8>>,
    capture_stdout: bool,
    timeout: Duration,
) -> Result<ToolOutput, ToolError> {
    let line = command_line(&command);
    debug!("Running {}: {}", tool, line);

    command
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if capture_stdout {
        command.stdout(Stdio::piped());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|source| ToolError::Io {
            tool: tool.to_string(),
            source,
        })?;

    let finished = runtime.block_on(async {
        tokio::time::timeout(timeout, run_child(tool, &mut command, input)).await
    });
    let output = match finished {
        Ok(output) => output?,
        // the child is killed when its future is dropped
        Err(_elapsed) => {
            return Err(ToolError::Timeout {
                tool: tool.to_string(),
                timeout,
            })
        }
    };

    if !output.stderr.is_empty() {
        debug!("{} stderr: {}", tool, String::from_utf8_lossy(&output.stderr).trim_end());
    }

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool: tool.to_string(),
            command: line,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(ToolOutput {
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Spawn, feed stdin while collecting output, wait for exit
async fn run_child(tool: &str, command: &mut Command, input: Option<Vec<u8>>) -> Result<Output, ToolError> {
    let mut child = command.spawn().map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ToolError::NotFound {
                tool: tool.to_string(),
                path: PathBuf::from(command.as_std().get_program()),
            }
        } else {
            ToolError::Spawn {
                tool: tool.to_string(),
                source,
            }
        }
    })?;

    let stdin = child.stdin.take();
    let feed = async move {
        match (stdin, input) {
            (Some(mut stdin), Some(bytes)) => match stdin.write_all(&bytes).await {
                // the tool may exit before reading everything
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            },
            _ => Ok(()),
        }
        // stdin is closed here so the tool sees EOF
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let io_error = |source| ToolError::Io {
        tool: tool.to_string(),
        source,
    };
    fed.map_err(io_error)?;
    output.map_err(io_error)
}

/// 7-Zip command line (`7za`)
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: PathBuf,
    timeout: Duration,
}

impl SevenZip {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl ArchiveTool for SevenZip {
    fn list(&self, archive: &Path) -> Result<Vec<String>, ToolError> {
        // l = list, -slt = technical listing (one `Key = Value` per line)
        let mut command = Command::new(&self.program);
        command.arg("l").arg("-slt").arg(archive);
        let output = run_tool("7za", command, None, true, self.timeout)?;
        Ok(parse_technical_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn extract(&self, archive: &Path, entry: &str, dest: File) -> Result<(), ToolError> {
        // e = extract without path, -so = write output to stdout, -y = yes to all questions
        let mut command = Command::new(&self.program);
        command
            .arg("e")
            .arg("-so")
            .arg("-y")
            .arg(archive)
            .arg(entry)
            .stdout(Stdio::from(dest));
        run_tool("7za", command, None, false, self.timeout)?;
        Ok(())
    }
}

/// File entries from `7za l -slt` output
///
/// Entries follow the `----------` separator as blocks of `Key = Value`
/// lines; the block before it describes the archive itself.
pub fn parse_technical_listing(listing: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut in_entries = false;
    let mut path: Option<String> = None;
    let mut is_folder = false;

    let mut flush = |path: &mut Option<String>, is_folder: &mut bool| {
        if let Some(p) = path.take() {
            if !*is_folder {
                entries.push(p);
            }
        }
        *is_folder = false;
    };

    for line in listing.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with("----------") {
            in_entries = true;
            continue;
        }
        if !in_entries {
            continue;
        }
        if line.trim().is_empty() {
            flush(&mut path, &mut is_folder);
        } else if let Some(value) = line.strip_prefix("Path = ") {
            flush(&mut path, &mut is_folder);
            path = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("Folder = ") {
            is_folder = value.trim() == "+";
        } else if let Some(value) = line.strip_prefix("Attributes = ") {
            is_folder |= value.trim_start().starts_with('D');
        }
    }
    flush(&mut path, &mut is_folder);

    entries
}

/// GNU addr2line (usually the mingw cross build)
#[derive(Debug, Clone)]
pub struct Addr2Line {
    program: PathBuf,
    timeout: Duration,
}

impl Addr2Line {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl AddressResolver for Addr2Line {
    fn resolve(
        &self,
        symbol_file: &Path,
        addresses: &[String],
        section_relative: bool,
    ) -> Result<Vec<String>, ToolError> {
        let mut command = Command::new(&self.program);
        if section_relative {
            command.arg("-j").arg(".text");
        }
        command.arg("-e").arg(symbol_file);

        let mut input = addresses.join("\n");
        input.push('\n');

        let output = run_tool("addr2line", command, Some(input.into_bytes()), true, self.timeout)?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
7-Zip (a) [64] 16.02 : Copyright (c) 1999-2016 Igor Pavlov : 2016-05-21

Listing archive: default_93.2.1_dbg.7z

--
Path = default_93.2.1_dbg.7z
Type = 7z
Physical Size = 1234

----------
Path = spring.dbg
Size = 100
Attributes = A_ -rw-r--r--

Path = AI/Skirmish/KAIK
Size = 0
Folder = +
Attributes = D_ drwxr-xr-x

Path = AI/Skirmish/KAIK/0.13/SkirmishAI.dbg
Size = 200
Attributes = A_ -rw-r--r--
";

    #[test]
    fn test_parse_technical_listing() {
        assert_eq!(
            parse_technical_listing(LISTING),
            vec!["spring.dbg", "AI/Skirmish/KAIK/0.13/SkirmishAI.dbg"]
        );
    }

    #[test]
    fn test_parse_listing_without_entries() {
        assert!(parse_technical_listing("Listing archive: x.7z\n--\nPath = x.7z\n").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_feeds_stdin() {
        let output = run_tool(
            "cat",
            Command::new("cat"),
            Some(b"0x1\n0x2\n".to_vec()),
            true,
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(output.stdout, b"0x1\n0x2\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_large_input_does_not_block() {
        let input: Vec<u8> = "0x0040F268\n".repeat(100_000).into_bytes();
        let output = run_tool("cat", Command::new("cat"), Some(input.clone()), true, Duration::from_secs(30)).unwrap();
        assert_eq!(output.stdout.len(), input.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_nonzero_exit() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo bad >&2; exit 3");
        let result = run_tool("sh", command, None, true, Duration::from_secs(10));
        match result {
            Err(ToolError::Failed {
                command,
                status,
                stderr,
                ..
            }) => {
                assert_eq!(command, "sh -c echo bad >&2; exit 3");
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "bad");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_timeout() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let started = std::time::Instant::now();
        let result = run_tool("sleep", command, None, true, Duration::from_millis(100));
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_from_blocking_task() {
        let output = tokio::task::spawn_blocking(|| {
            run_tool("echo", Command::new("echo"), None, true, Duration::from_secs(10))
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(output.stdout, b"\n");
    }

    #[test]
    fn test_command_line() {
        let mut command = Command::new("/usr/bin/7za");
        command.arg("l").arg("-slt").arg("spring_dbg.7z");
        assert_eq!(command_line(&command), "/usr/bin/7za l -slt spring_dbg.7z");
    }

    #[test]
    fn test_missing_program() {
        let tool = Addr2Line::new("/nonexistent/addr2line", Duration::from_secs(1));
        let result = tool.resolve(Path::new("x.dbg"), &["0x1".to_string()], false);
        assert!(matches!(result, Err(ToolError::NotFound { .. })));
    }
}

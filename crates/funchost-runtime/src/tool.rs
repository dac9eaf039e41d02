//! Functions host tool discovery.
//!
//! PATH may hold several matches for the tool name, and on Windows some of
//! them are extension-less shell wrappers the OS cannot execute. Every
//! candidate is therefore run once with no arguments and only one that
//! exits cleanly is accepted.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use funchost_core::{CandidateFailure, FunctionsError, FunctionsResult, HarnessSettings};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[cfg(windows)]
const ERROR_BAD_EXE_FORMAT: i32 = 193;

/// Locates a runnable functions host executable.
#[derive(Debug, Clone)]
pub struct ToolResolver {
    tool_name: String,
    probe_timeout: Duration,
}

impl ToolResolver {
    pub fn new(tool_name: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            tool_name: tool_name.into(),
            probe_timeout,
        }
    }

    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self::new(settings.tool_name.clone(), settings.probe_timeout())
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// First PATH candidate that runs and exits with code 0.
    pub async fn resolve(&self) -> FunctionsResult<PathBuf> {
        let candidates = self.locate_candidates().await;
        if candidates.is_empty() {
            return Err(FunctionsError::ToolNotFound {
                tool: self.tool_name.clone(),
            });
        }

        let mut failures = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match probe(&candidate, self.probe_timeout).await {
                Ok(()) => {
                    info!(tool = %self.tool_name, path = %candidate.display(), "Using functions host tool");
                    return Ok(candidate);
                }
                Err(reason) => {
                    debug!(path = %candidate.display(), %reason, "Skipping tool candidate");
                    failures.push(CandidateFailure {
                        path: candidate,
                        reason,
                    });
                }
            }
        }

        Err(FunctionsError::ToolInvocationFailed {
            tool: self.tool_name.clone(),
            candidates: failures,
        })
    }

    /// All PATH matches for the tool name, in PATH order, without duplicates.
    pub async fn locate_candidates(&self) -> Vec<PathBuf> {
        let found = match locate_with_command(&self.tool_name).await {
            Ok(found) => found,
            Err(e) => {
                warn!(tool = %self.tool_name, error = %e, "PATH lookup command unavailable, scanning PATH directly");
                collect_matches(&self.tool_name, which::which_all(&self.tool_name))
            }
        };

        let mut unique: Vec<PathBuf> = Vec::with_capacity(found.len());
        for path in found {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        unique
    }
}

/// Ask the OS (`where` / `which -a`) for every match on PATH.
///
/// "No match" is an empty list; only a failure to run the command is an error.
async fn locate_with_command(tool: &str) -> io::Result<Vec<PathBuf>> {
    let mut command = if cfg!(windows) {
        Command::new("where")
    } else {
        let mut which = Command::new("which");
        which.arg("-a");
        which
    };

    let output = command
        .arg(tool)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await?;

    Ok(parse_locator_output(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_locator_output(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Flatten a `which` search into a list; no match is an empty list.
fn collect_matches(
    tool: &str,
    found: which::Result<impl Iterator<Item = PathBuf>>,
) -> Vec<PathBuf> {
    match found {
        Ok(paths) => paths.collect(),
        Err(e) => {
            debug!(%tool, error = %e, "No PATH match");
            Vec::new()
        }
    }
}

/// Run `candidate` with no arguments. `Err` carries a human-readable reason.
async fn probe(candidate: &Path, limit: Duration) -> Result<(), String> {
    let mut child = Command::new(candidate)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| describe_spawn_error(&e))?;

    match timeout(limit, child.wait()).await {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(format!("exited with {status}")),
        Ok(Err(e)) => Err(format!("could not be waited on: {e}")),
        Err(_) => {
            // kill_on_drop reaps it once `child` goes out of scope
            let _ = child.start_kill();
            Err(format!("did not exit within {}s", limit.as_secs_f32()))
        }
    }
}

fn describe_spawn_error(error: &io::Error) -> String {
    if is_bad_executable_format(error) {
        "not a valid executable for this platform".to_string()
    } else {
        format!("failed to start: {error}")
    }
}

#[cfg(unix)]
fn is_bad_executable_format(error: &io::Error) -> bool {
    error.raw_os_error() == Some(nix::errno::Errno::ENOEXEC as i32)
}

#[cfg(windows)]
fn is_bad_executable_format(error: &io::Error) -> bool {
    error.raw_os_error() == Some(ERROR_BAD_EXE_FORMAT)
}

#[cfg(not(any(unix, windows)))]
const fn is_bad_executable_format(_error: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locator_output() {
        let out = "C:\\Program Files\\func\\func\r\nC:\\Program Files\\func\\func.cmd\r\n\r\n";
        assert_eq!(
            parse_locator_output(out),
            vec![
                PathBuf::from("C:\\Program Files\\func\\func"),
                PathBuf::from("C:\\Program Files\\func\\func.cmd"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_tool_is_not_found() {
        let resolver = ToolResolver::new("funchost-no-such-tool-4d1f", Duration::from_secs(1));
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, FunctionsError::ToolNotFound { ref tool } if tool == "funchost-no-such-tool-4d1f"));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn write_executable(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, body).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn probe_accepts_clean_exit() {
            let dir = TempDir::new().unwrap();
            let tool = write_executable(dir.path(), "func", b"#!/bin/sh\nexit 0\n");
            assert!(probe(&tool, Duration::from_secs(5)).await.is_ok());
        }

        #[tokio::test]
        async fn probe_reports_nonzero_exit() {
            let dir = TempDir::new().unwrap();
            let tool = write_executable(dir.path(), "func", b"#!/bin/sh\nexit 3\n");
            let reason = probe(&tool, Duration::from_secs(5)).await.unwrap_err();
            assert!(reason.contains('3'), "{reason}");
        }

        #[test]
        fn exec_format_error_is_named() {
            let error = io::Error::from_raw_os_error(nix::errno::Errno::ENOEXEC as i32);
            assert_eq!(
                describe_spawn_error(&error),
                "not a valid executable for this platform"
            );
            let other = io::Error::from(io::ErrorKind::PermissionDenied);
            assert!(describe_spawn_error(&other).starts_with("failed to start"));
        }

        #[tokio::test]
        async fn probe_rejects_garbage_binary() {
            let dir = TempDir::new().unwrap();
            let tool = write_executable(dir.path(), "func", &[0x7f, 0x00, 0x01, 0x02, 0xff, 0xfe]);
            // Depending on libc this is ENOEXEC or a /bin/sh fallback that fails.
            assert!(probe(&tool, Duration::from_secs(5)).await.is_err());
        }

        #[tokio::test]
        async fn probe_gives_up_on_hanging_tool() {
            let dir = TempDir::new().unwrap();
            let tool = write_executable(dir.path(), "func", b"#!/bin/sh\nexec sleep 30\n");
            let reason = probe(&tool, Duration::from_millis(200)).await.unwrap_err();
            assert!(reason.starts_with("did not exit"), "{reason}");
        }

        #[test]
        fn scans_directory_for_tool() {
            let dir = TempDir::new().unwrap();
            let tool = write_executable(dir.path(), "func", b"#!/bin/sh\n");
            fs::write(dir.path().join("other"), b"not executable").unwrap();

            let found = collect_matches("func", which::which_in_all("func", Some(dir.path()), dir.path()));
            assert_eq!(found, vec![tool]);

            let missing = collect_matches("other", which::which_in_all("other", Some(dir.path()), dir.path()));
            assert!(missing.is_empty());
        }
    }
}

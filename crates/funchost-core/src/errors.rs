//! Error types for starting and tearing down functions instances.
//!
//! Every failure the controller can report is a distinct variant so callers
//! can match on it. Captured process output travels with the variants that
//! have it; missing output is an empty string, never a separate failure.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::outcome::ExitInfo;

/// Errors raised by the functions controller and its collaborators.
#[derive(Debug, Error)]
pub enum FunctionsError {
    // === Startup ===
    /// Something was still listening on the port after the release retries.
    #[error(
        "port {port} is still in use after {attempts} checks; another process (perhaps a debug instance) is listening on it"
    )]
    PortUnavailable { port: u16, attempts: u32 },

    /// No free port exists in the requested range.
    #[error("no available TCP port in range {lower}..{upper}")]
    NoAvailablePort { lower: u16, upper: u32 },

    /// The OS refused to start the host process.
    #[error("failed to start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The host exited before printing the readiness marker.
    #[error("function host process terminated unexpectedly with {exit}")]
    ProcessExitedDuringStartup {
        exit: ExitInfo,
        stdout: String,
        stderr: String,
    },

    /// Neither readiness nor exit was observed within the startup timeout.
    #[error("timed out after {}s while starting functions instance on port {port}", .timeout.as_secs())]
    StartupTimedOut {
        port: u16,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    /// The host reported readiness but never accepted a connection.
    #[error("function host reported ready but port {port} refused connections after {attempts} attempts")]
    ListenConfirmationFailed {
        port: u16,
        attempts: u32,
        stdout: String,
        stderr: String,
    },

    // === Tool discovery ===
    /// No candidate executable was found on PATH.
    #[error(
        "functions host tool '{tool}' not found on PATH. Have you installed Azure Functions Core Tools?"
    )]
    ToolNotFound { tool: String },

    /// Candidates were found but none of them could be run.
    #[error("no usable '{tool}' executable; tried:\n{}", format_candidates(.candidates))]
    ToolInvocationFailed {
        tool: String,
        candidates: Vec<CandidateFailure>,
    },

    // === Project ===
    /// No ancestor directory contained the expected build output.
    #[error(
        "could not find '{fragment}/{}' in any ancestor of {}",
        .extension.display(),
        .searched_from.display()
    )]
    ProjectPathNotFound {
        fragment: String,
        extension: PathBuf,
        searched_from: PathBuf,
    },

    // === Teardown ===
    /// One or more process trees could not be fully terminated.
    #[error("failed to terminate {} function host process(es):\n{}", .failures.len(), format_teardown(.failures))]
    TeardownPartialFailure { failures: Vec<TeardownFailure> },

    // === Other ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FunctionsError {
    /// Whether this error ended a `start_instance` call (the `StartupFailed` state).
    pub const fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            Self::PortUnavailable { .. }
                | Self::Spawn { .. }
                | Self::ProcessExitedDuringStartup { .. }
                | Self::StartupTimedOut { .. }
                | Self::ListenConfirmationFailed { .. }
                | Self::ToolNotFound { .. }
                | Self::ToolInvocationFailed { .. }
                | Self::ProjectPathNotFound { .. }
        )
    }

    /// Captured `(stdout, stderr)` for variants that carry process output.
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::ProcessExitedDuringStartup { stdout, stderr, .. }
            | Self::StartupTimedOut { stdout, stderr, .. }
            | Self::ListenConfirmationFailed { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

/// Result type alias for functions operations.
pub type FunctionsResult<T> = Result<T, FunctionsError>;

/// Why a tool candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Failure to kill a single process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KillError {
    /// The process was already gone.
    #[error("process has already exited")]
    AlreadyExited,

    /// The OS refused the kill.
    #[error("access denied")]
    AccessDenied,

    #[error("{0}")]
    Failed(String),
}

/// A pid that could not be killed, after any retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillFailure {
    pub pid: u32,
    pub error: KillError,
}

impl fmt::Display for KillFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}: {}", self.pid, self.error)
    }
}

/// All kill failures for one managed instance's process tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    /// Root pid of the instance.
    pub pid: u32,
    pub port: u16,
    pub failures: Vec<KillFailure>,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance pid {} (port {}):", self.pid, self.port)?;
        for failure in &self.failures {
            write!(f, " [{failure}]")?;
        }
        Ok(())
    }
}

fn format_candidates(candidates: &[CandidateFailure]) -> String {
    candidates
        .iter()
        .map(|c| format!("  {c}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_teardown(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

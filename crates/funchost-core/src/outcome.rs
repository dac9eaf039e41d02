//! Lifecycle states and startup outcomes for managed instances.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which standard stream a line of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one managed instance.
///
/// `NotStarted → PortCheckPending → Launching → AwaitingReadiness → Running →
/// TearingDown → Terminated`, with `StartupFailed` reachable from the three
/// startup states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    NotStarted,
    PortCheckPending,
    Launching,
    AwaitingReadiness,
    Running,
    TearingDown,
    Terminated,
    StartupFailed,
}

impl InstanceState {
    /// Whether `next` is a legal successor of this state.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::PortCheckPending)
                | (Self::PortCheckPending, Self::Launching)
                | (Self::Launching, Self::AwaitingReadiness)
                | (Self::AwaitingReadiness, Self::Running)
                | (
                    Self::PortCheckPending | Self::Launching | Self::AwaitingReadiness,
                    Self::StartupFailed
                )
                | (
                    Self::Running | Self::StartupFailed | Self::AwaitingReadiness,
                    Self::TearingDown
                )
                | (Self::TearingDown, Self::Terminated)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    /// Exit code, or `None` if the process was ended by a signal or its status
    /// could not be read.
    pub code: Option<i32>,
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("no exit code (terminated by signal)"),
        }
    }
}

/// Result of racing readiness against process exit and the startup timeout.
///
/// Exactly one of the three signals decides the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The readiness marker was observed.
    Started,
    /// The process exited before the marker appeared.
    ExitedPrematurely {
        exit: ExitInfo,
        stdout: String,
        stderr: String,
    },
    /// Neither readiness nor exit happened within the timeout.
    TimedOut,
}

impl StartupOutcome {
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }
}

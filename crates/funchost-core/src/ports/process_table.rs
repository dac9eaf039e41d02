//! Process table port used for process-tree termination.

use crate::errors::KillError;

/// Live view of the OS process table.
///
/// One implementation per platform family is selected when the runtime is
/// built; the tree-termination logic only ever talks to this trait.
pub trait ProcessTable: Send + Sync {
    /// Direct children of `pid`, as currently recorded by the OS.
    fn children_of(&self, pid: u32) -> Vec<u32>;

    /// Forcibly terminate one process.
    ///
    /// Returns [`KillError::AlreadyExited`] when the pid no longer exists and
    /// [`KillError::AccessDenied`] when the OS refuses.
    fn kill(&self, pid: u32) -> Result<(), KillError>;
}

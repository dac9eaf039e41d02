//! Process table backed by `sysinfo`, with platform kill.

use std::sync::{Mutex, PoisonError};

use funchost_core::{KillError, ProcessTable};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};

/// Live OS process table.
///
/// Every query refreshes the process list; parent links change as processes
/// start and exit.
pub struct SystemProcessTable {
    system: Mutex<System>,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemProcessTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProcessTable").finish_non_exhaustive()
    }
}

impl ProcessTable for SystemProcessTable {
    fn children_of(&self, pid: u32) -> Vec<u32> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );

        let parent = Pid::from_u32(pid);
        let mut children: Vec<u32> = system
            .processes()
            .iter()
            // Linux reports threads as tasks of their process; skip them.
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter(|(_, process)| process.parent() == Some(parent))
            .map(|(child, _)| child.as_u32())
            .collect();
        children.sort_unstable();

        debug!(pid = %pid, children = ?children, "Enumerated child processes");
        children
    }

    fn kill(&self, pid: u32) -> Result<(), KillError> {
        #[cfg(unix)]
        {
            kill_unix(pid)
        }

        #[cfg(not(unix))]
        {
            self.kill_other(pid)
        }
    }
}

#[cfg(unix)]
fn kill_unix(pid: u32) -> Result<(), KillError> {
    let raw = i32::try_from(pid).map_err(|_| KillError::Failed(format!("pid {pid} out of range")))?;
    match signal::kill(nix::unistd::Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(KillError::AlreadyExited),
        Err(Errno::EPERM) => Err(KillError::AccessDenied),
        Err(e) => Err(KillError::Failed(e.to_string())),
    }
}

#[cfg(not(unix))]
impl SystemProcessTable {
    fn kill_other(&self, pid: u32) -> Result<(), KillError> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        let target = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);

        match system.process(target) {
            None => Err(KillError::AlreadyExited),
            Some(process) if process.kill() => Ok(()),
            // sysinfo does not say why; on Windows this is almost always access denied.
            Some(_) => Err(KillError::AccessDenied),
        }
    }
}

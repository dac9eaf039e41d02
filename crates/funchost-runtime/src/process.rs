//! One launched functions host process.
//!
//! The child itself is owned by a waiter task that reaps it and publishes
//! its [`ExitInfo`]; everything else (pid, buffers, readiness) lives on the
//! [`ManagedProcess`] handle the controller registers.

use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use funchost_core::{
    ExitInfo, FunctionsError, FunctionsResult, InstanceState, OutputSinkPort, OutputStream,
    ProcessLaunchSpec, StartupOutcome,
};
use tokio::process::{ChildStdin, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::output::{OutputBuffer, ProcessOutput, ReadinessSignal, spawn_output_reader};

/// How long to wait for pipe readers to hit EOF once the process is gone.
///
/// Grandchildren can inherit the pipes and keep them open after the host
/// itself exits; we stop waiting rather than hang.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to a running (or finished) host process.
pub struct ManagedProcess {
    pid: u32,
    port: u16,
    spec: ProcessLaunchSpec,
    output: Arc<OutputBuffer>,
    readiness: ReadinessSignal,
    exit: watch::Receiver<Option<ExitInfo>>,
    stdin: Mutex<Option<ChildStdin>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    state: Mutex<InstanceState>,
}

impl ManagedProcess {
    /// Start the process described by `spec` and begin draining its output.
    ///
    /// Must be called from within a Tokio runtime. The handle starts in
    /// [`InstanceState::Launching`].
    pub fn spawn(
        spec: ProcessLaunchSpec,
        port: u16,
        readiness_marker: &str,
        sink: Arc<dyn OutputSinkPort>,
    ) -> FunctionsResult<Arc<Self>> {
        let mut command = Command::new(spec.program());
        command
            .args(spec.arguments())
            .current_dir(spec.working_directory())
            .envs(spec.environment())
            .stdin(piped_or_null(spec.redirects_stdin()))
            .stdout(piped_or_null(spec.redirects_stdout()))
            .stderr(piped_or_null(spec.redirects_stderr()));

        let spawn_error = |source: io::Error| FunctionsError::Spawn {
            program: spec.program().to_path_buf(),
            source,
        };

        let mut child = command.spawn().map_err(spawn_error)?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_error(io::Error::other("process exited before its pid was read")))?;

        let readiness = ReadinessSignal::new(readiness_marker);
        let observer = readiness.clone();
        let output = Arc::new(OutputBuffer::with_observer(Box::new(move |stream, line| {
            if stream == OutputStream::Stdout {
                observer.observe(line);
            }
        })));

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_output_reader(
                stdout,
                port,
                OutputStream::Stdout,
                Arc::clone(&output),
                Arc::clone(&sink),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_output_reader(
                stderr,
                port,
                OutputStream::Stderr,
                Arc::clone(&output),
                sink,
            ));
        }
        let stdin = child.stdin.take();

        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => ExitInfo {
                    code: status.code(),
                },
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to wait for function host process");
                    ExitInfo { code: None }
                }
            };
            debug!(pid = %pid, %exit, "Function host process exited");
            let _ = exit_tx.send(Some(exit));
        });

        debug!(pid = %pid, port = %port, process = %spec, "Started function host process");

        Ok(Arc::new(Self {
            pid,
            port,
            spec,
            output,
            readiness,
            exit: exit_rx,
            stdin: Mutex::new(stdin),
            readers: Mutex::new(readers),
            state: Mutex::new(InstanceState::Launching),
        }))
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn spec(&self) -> &ProcessLaunchSpec {
        &self.spec
    }

    pub fn buffer(&self) -> &OutputBuffer {
        &self.output
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn state(&self) -> InstanceState {
        *lock(&self.state)
    }

    /// Move to `next` if that is a legal transition. Re-entering the current
    /// state is a no-op.
    pub fn transition(&self, next: InstanceState) -> bool {
        let mut state = lock(&self.state);
        if *state == next {
            return true;
        }
        if !state.can_transition_to(next) {
            warn!(pid = %self.pid, from = ?*state, to = ?next, "Ignoring invalid state transition");
            return false;
        }
        debug!(pid = %self.pid, port = %self.port, from = ?*state, to = ?next, "Instance state changed");
        *state = next;
        true
    }

    /// Exit information, if the process has been reaped.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_info().is_some()
    }

    /// Wait until the process has exited.
    pub async fn wait_for_exit(&self) -> ExitInfo {
        let mut exit = self.exit.clone();
        let observed = match exit.wait_for(Option::is_some).await {
            Ok(info) => *info,
            // The waiter task always sends before it finishes.
            Err(_) => self.exit_info(),
        };
        observed.unwrap_or(ExitInfo { code: None })
    }

    /// Race exit, readiness and `limit`; the first to complete decides.
    ///
    /// Exit is polled first, so a process that printed the marker and then
    /// died is reported as exited.
    pub async fn race_startup(&self, limit: Duration) -> StartupOutcome {
        tokio::select! {
            biased;
            exit = self.wait_for_exit() => {
                self.drain_readers().await;
                StartupOutcome::ExitedPrematurely {
                    exit,
                    stdout: self.output.stdout(),
                    stderr: self.output.stderr(),
                }
            }
            () = self.readiness.wait() => StartupOutcome::Started,
            () = sleep(limit) => StartupOutcome::TimedOut,
        }
    }

    /// Wait (bounded) for the pipe readers to finish so trailing output is captured.
    pub async fn drain_readers(&self) {
        let readers: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.readers));
        for reader in readers {
            if timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
                debug!(pid = %self.pid, "Output reader still open after process exit");
            }
        }
    }

    /// Close the child's stdin, if it is still held.
    pub fn close_stdin(&self) {
        lock(&self.stdin).take();
    }
}

impl ProcessOutput for ManagedProcess {
    fn description(&self) -> String {
        self.spec.to_string()
    }

    fn stdout(&self) -> String {
        self.output.stdout()
    }

    fn stderr(&self) -> String {
        self.output.stderr()
    }

    fn clear(&self) {
        self.output.clear();
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("pid", &self.pid)
            .field("port", &self.port)
            .field("state", &self.state())
            .field("exit", &self.exit_info())
            .finish_non_exhaustive()
    }
}

fn piped_or_null(redirect: bool) -> Stdio {
    if redirect { Stdio::piped() } else { Stdio::null() }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Functions instance lifecycle controller.
//!
//! Starts host processes, waits for them to become ready, and tears every
//! registered instance down again. One controller belongs to one test scope;
//! it owns its own registry and shares nothing with other controllers.
//!
//! `start_instance` may run concurrently with itself. `teardown_all` must
//! not overlap any `start_instance` call on the same controller.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use funchost_core::{
    FunctionsError, FunctionsResult, HarnessSettings, InstanceRequest, InstanceState, KillError,
    KillFailure, NoopOutputSink, OutputSinkPort, ProcessLaunchSpec, ProcessTable, StartupOutcome,
    TeardownFailure, resolve_project_path_from,
};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::confirm::{ConfirmPolicy, confirm_listening};
use crate::output::{ProcessOutput, log_all_and_clear};
use crate::port_oracle::PortOracle;
use crate::process::ManagedProcess;
use crate::shutdown::{KillPolicy, kill_process_tree};
use crate::system::SystemProcessTable;
use crate::tool::ToolResolver;

/// Starts, tracks and tears down functions host instances.
pub struct FunctionsController {
    settings: HarnessSettings,
    ports: PortOracle,
    processes: Arc<dyn ProcessTable>,
    tools: ToolResolver,
    sink: Arc<dyn OutputSinkPort>,
    instances: Mutex<Vec<Arc<ManagedProcess>>>,
}

impl FunctionsController {
    /// Controller backed by the live OS listener and process tables.
    pub fn new(settings: HarnessSettings) -> Self {
        Self {
            ports: PortOracle::system(),
            processes: Arc::new(SystemProcessTable::new()),
            tools: ToolResolver::from_settings(&settings),
            sink: Arc::new(NoopOutputSink),
            instances: Mutex::new(Vec::new()),
            settings,
        }
    }

    #[must_use]
    pub fn with_port_oracle(mut self, ports: PortOracle) -> Self {
        self.ports = ports;
        self
    }

    #[must_use]
    pub fn with_process_table(mut self, processes: Arc<dyn ProcessTable>) -> Self {
        self.processes = processes;
        self
    }

    /// Forward every output line of every instance to `sink`.
    #[must_use]
    pub fn with_output_sink(mut self, sink: Arc<dyn OutputSinkPort>) -> Self {
        self.sink = sink;
        self
    }

    pub const fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    pub const fn port_oracle(&self) -> &PortOracle {
        &self.ports
    }

    /// Start one functions host and wait until it accepts connections.
    ///
    /// The handle is registered as soon as the process exists, so instances
    /// that time out or fail confirmation are still killed by
    /// [`teardown_all`](Self::teardown_all).
    pub async fn start_instance(
        &self,
        request: InstanceRequest,
    ) -> FunctionsResult<Arc<ManagedProcess>> {
        let port = request.port;
        debug!(port = %port, project = %request.project, state = ?InstanceState::PortCheckPending, "Starting functions instance");

        if let Err(e) = self.wait_for_port_release(port).await {
            return Err(startup_failed(port, InstanceState::PortCheckPending, e));
        }

        debug!(port = %port, state = ?InstanceState::Launching, "Port is free");
        let spec = match self.build_launch_spec(&request).await {
            Ok(spec) => spec,
            Err(e) => return Err(startup_failed(port, InstanceState::Launching, e)),
        };

        info!(port = %port, process = %spec, "Launching function host");
        let instance = match ManagedProcess::spawn(
            spec,
            port,
            &self.settings.readiness_marker,
            Arc::clone(&self.sink),
        ) {
            Ok(instance) => instance,
            Err(e) => return Err(startup_failed(port, InstanceState::Launching, e)),
        };

        self.register(Arc::clone(&instance));
        instance.transition(InstanceState::AwaitingReadiness);

        let limit = self.settings.startup_timeout();
        match instance.race_startup(limit).await {
            StartupOutcome::Started => {}
            StartupOutcome::ExitedPrematurely {
                exit,
                stdout,
                stderr,
            } => {
                instance.transition(InstanceState::StartupFailed);
                error!(port = %port, pid = %instance.pid(), %exit, %stdout, %stderr, "Function host exited during startup");
                return Err(FunctionsError::ProcessExitedDuringStartup {
                    exit,
                    stdout,
                    stderr,
                });
            }
            StartupOutcome::TimedOut => {
                instance.transition(InstanceState::StartupFailed);
                let (stdout, stderr) = (instance.stdout(), instance.stderr());
                error!(port = %port, pid = %instance.pid(), timeout_secs = limit.as_secs(), %stdout, %stderr, "Timed out waiting for function host");
                return Err(FunctionsError::StartupTimedOut {
                    port,
                    timeout: limit,
                    stdout,
                    stderr,
                });
            }
        }

        if let Err(e) = confirm_listening(port, self.confirm_policy()).await {
            instance.transition(InstanceState::StartupFailed);
            let (stdout, stderr) = (instance.stdout(), instance.stderr());
            error!(port = %port, pid = %instance.pid(), error = %e, %stdout, %stderr, "Function host never accepted connections");
            return Err(match e {
                FunctionsError::ListenConfirmationFailed { port, attempts, .. } => {
                    FunctionsError::ListenConfirmationFailed {
                        port,
                        attempts,
                        stdout,
                        stderr,
                    }
                }
                other => other,
            });
        }

        instance.transition(InstanceState::Running);
        info!(port = %port, pid = %instance.pid(), "Functions instance running");
        Ok(instance)
    }

    /// Output views of every registered instance, in start order.
    pub fn get_output(&self) -> Vec<Arc<dyn ProcessOutput>> {
        self.instances()
            .into_iter()
            .map(|instance| instance as Arc<dyn ProcessOutput>)
            .collect()
    }

    /// Every registered instance, in start order.
    pub fn instances(&self) -> Vec<Arc<ManagedProcess>> {
        self.registry().clone()
    }

    pub fn instance_count(&self) -> usize {
        self.registry().len()
    }

    /// Kill every registered instance's process tree, then log and clear all output.
    ///
    /// Every instance is attempted even when earlier ones fail. Instances
    /// already terminated by a previous teardown are skipped. Handles stay
    /// registered so their output can still be read.
    pub async fn teardown_all(&self) -> FunctionsResult<()> {
        let instances = self.instances();
        let mut failures = Vec::new();

        for instance in &instances {
            if instance.state().is_terminal() {
                continue;
            }
            if let Some(failure) = self.teardown_instance(instance).await {
                failures.push(failure);
            }
        }

        let outputs: Vec<Arc<dyn ProcessOutput>> = instances
            .into_iter()
            .map(|instance| instance as Arc<dyn ProcessOutput>)
            .collect();
        log_all_and_clear(&outputs);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FunctionsError::TeardownPartialFailure { failures })
        }
    }

    async fn teardown_instance(&self, instance: &ManagedProcess) -> Option<TeardownFailure> {
        let pid = instance.pid();
        instance.transition(InstanceState::TearingDown);
        instance.close_stdin();

        let mut failures = if instance.has_exited() {
            // Descendants of a reaped process have been re-parented; nothing
            // can be found through its pid any more.
            debug!(pid = %pid, "Function host already exited");
            Vec::new()
        } else {
            kill_process_tree(self.processes.as_ref(), pid, self.kill_policy()).await
        };

        let exit_wait = self.settings.exit_wait();
        match timeout(exit_wait, instance.wait_for_exit()).await {
            Ok(exit) => {
                debug!(pid = %pid, %exit, "Function host stopped");
                instance.drain_readers().await;
                instance.transition(InstanceState::Terminated);
            }
            Err(_) => {
                warn!(pid = %pid, port = %instance.port(), "Unable to shut down functions host");
                if failures.is_empty() {
                    failures.push(KillFailure {
                        pid,
                        error: KillError::Failed(format!(
                            "still running {}s after kill",
                            exit_wait.as_secs()
                        )),
                    });
                }
            }
        }

        if failures.is_empty() {
            None
        } else {
            Some(TeardownFailure {
                pid,
                port: instance.port(),
                failures,
            })
        }
    }

    async fn wait_for_port_release(&self, port: u16) -> FunctionsResult<()> {
        let attempts = self.settings.port_release_attempts;
        for attempt in 1..=attempts {
            if !self.ports.is_listening(port)? {
                return Ok(());
            }
            debug!(port = %port, attempt, "Port still in use, waiting for release");
            if attempt < attempts {
                sleep(self.settings.port_release_delay()).await;
            }
        }
        Err(FunctionsError::PortUnavailable { port, attempts })
    }

    async fn build_launch_spec(&self, request: &InstanceRequest) -> FunctionsResult<ProcessLaunchSpec> {
        let tool = self.resolve_tool().await?;

        let search_root = match &self.settings.search_root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        let working_directory =
            resolve_project_path_from(&search_root, &request.project, &request.runtime)?;

        Ok(ProcessLaunchSpec::for_function_host(
            tool,
            working_directory,
            request.port,
            &request.provider,
            request.configuration.as_ref(),
        ))
    }

    /// An explicitly configured tool path wins over PATH discovery.
    async fn resolve_tool(&self) -> FunctionsResult<PathBuf> {
        if let Some(path) = &self.settings.func_path {
            if path.is_file() {
                debug!(path = %path.display(), "Using configured functions host tool");
                return Ok(path.clone());
            }
            warn!(path = %path.display(), "Configured functions host tool does not exist, searching PATH");
        }
        self.tools.resolve().await
    }

    const fn confirm_policy(&self) -> ConfirmPolicy {
        ConfirmPolicy {
            attempts: self.settings.confirm_attempts,
            delay: self.settings.confirm_delay(),
            request_timeout: self.settings.confirm_request_timeout(),
        }
    }

    const fn kill_policy(&self) -> KillPolicy {
        KillPolicy {
            attempts: self.settings.kill_attempts,
            retry_delay: self.settings.kill_retry_delay(),
        }
    }

    fn register(&self, instance: Arc<ManagedProcess>) {
        self.registry().push(instance);
    }

    fn registry(&self) -> MutexGuard<'_, Vec<Arc<ManagedProcess>>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FunctionsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionsController")
            .field("settings", &self.settings)
            .field("instances", &self.instance_count())
            .finish_non_exhaustive()
    }
}

fn startup_failed(port: u16, state: InstanceState, error: FunctionsError) -> FunctionsError {
    error!(port = %port, from = ?state, error = %error, "Functions instance failed to start");
    error
}

//! Instance requests and the process launch specification built from them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::configuration::FunctionConfiguration;

/// Functions provider used when a request does not name one.
pub const DEFAULT_PROVIDER: &str = "csharp";

/// Stops the host from watching the filesystem and restarting on changes.
pub const FILE_WATCHING_ENV: &str = "AzureFunctionsJobHost__FileWatchingEnabled";

/// Forces host logging to debug so the readiness marker is always printed.
pub const LOG_LEVEL_ENV: &str = "AzureFunctionsJobHost:logging:logLevel:default";

/// Request to start one functions instance.
///
/// This is an intent-based request: it names the project, port and runtime,
/// and leaves tool discovery and directory resolution to the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRequest {
    /// Project folder fragment, relative to some ancestor of the search root.
    pub project: String,
    /// Port the host should listen on.
    pub port: u16,
    /// Target runtime moniker (e.g. `net8.0`); names the build-output folder.
    pub runtime: String,
    /// Functions provider flag passed to the host (`--csharp`, `--node`, ...).
    pub provider: String,
    /// Environment variables for the host process.
    pub configuration: Option<FunctionConfiguration>,
}

impl InstanceRequest {
    /// Create a request with the default provider and no configuration.
    pub fn new(project: impl Into<String>, port: u16, runtime: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            port,
            runtime: runtime.into(),
            provider: DEFAULT_PROVIDER.to_string(),
            configuration: None,
        }
    }

    /// Set the functions provider.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Attach a configuration whose variables are copied into the launch.
    #[must_use]
    pub fn with_configuration(mut self, configuration: FunctionConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }
}

/// Everything needed to start one host process.
///
/// Immutable once built; the controller owns it for the duration of a launch
/// and keeps it afterwards to describe the process in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLaunchSpec {
    program: PathBuf,
    arguments: Vec<String>,
    working_directory: PathBuf,
    environment: HashMap<String, String>,
    redirect_stdin: bool,
    redirect_stdout: bool,
    redirect_stderr: bool,
}

impl ProcessLaunchSpec {
    /// Launch spec with all three standard streams redirected.
    pub fn new(program: impl Into<PathBuf>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            arguments: Vec::new(),
            working_directory: working_directory.into(),
            environment: HashMap::new(),
            redirect_stdin: true,
            redirect_stdout: true,
            redirect_stderr: true,
        }
    }

    /// Launch spec for `<tool> host start --port <port> --<provider>`.
    ///
    /// Configuration variables are applied first, then the two host overrides,
    /// so the overrides always win.
    pub fn for_function_host(
        tool: impl Into<PathBuf>,
        working_directory: impl Into<PathBuf>,
        port: u16,
        provider: &str,
        configuration: Option<&FunctionConfiguration>,
    ) -> Self {
        let mut spec = Self::new(tool, working_directory)
            .arg("host")
            .arg("start")
            .arg("--port")
            .arg(port.to_string())
            .arg(format!("--{provider}"));

        if let Some(configuration) = configuration {
            for (key, value) in configuration.environment_variables() {
                spec = spec.env(key, value);
            }
        }

        spec.env(FILE_WATCHING_ENV, "false").env(LOG_LEVEL_ENV, "Debug")
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Set an environment variable; a later value for the same key wins.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn redirect_stdin(mut self, redirect: bool) -> Self {
        self.redirect_stdin = redirect;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Arguments joined with spaces, as they would appear on a command line.
    pub fn argument_line(&self) -> String {
        self.arguments.join(" ")
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub const fn environment(&self) -> &HashMap<String, String> {
        &self.environment
    }

    pub const fn redirects_stdin(&self) -> bool {
        self.redirect_stdin
    }

    pub const fn redirects_stdout(&self) -> bool {
        self.redirect_stdout
    }

    pub const fn redirects_stderr(&self) -> bool {
        self.redirect_stderr
    }
}

impl fmt::Display for ProcessLaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}, working directory {}",
            self.program.display(),
            self.argument_line(),
            self.working_directory.display()
        )
    }
}

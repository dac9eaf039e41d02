//! Core domain types and port definitions for funchost.
//!
//! This crate describes *what* a functions host instance is (its request,
//! launch specification, configuration, lifecycle states and failures) and
//! the OS-facing seams the runtime plugs into. It never spawns processes or
//! touches the network itself.

pub mod configuration;
pub mod errors;
pub mod launch;
pub mod outcome;
pub mod paths;
pub mod ports;
pub mod settings;

pub use configuration::{FunctionConfiguration, flatten_settings_json};
pub use errors::{
    CandidateFailure, FunctionsError, FunctionsResult, KillError, KillFailure, TeardownFailure,
};
pub use launch::{
    DEFAULT_PROVIDER, FILE_WATCHING_ENV, InstanceRequest, LOG_LEVEL_ENV, ProcessLaunchSpec,
};
pub use outcome::{ExitInfo, InstanceState, OutputStream, StartupOutcome};
pub use paths::{BuildConfiguration, resolve_project_path, resolve_project_path_from};
pub use ports::{ListenerTable, NoopOutputSink, OutputSinkPort, ProcessTable};
pub use settings::{HarnessSettings, SettingsError, validate_settings};

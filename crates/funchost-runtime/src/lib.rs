//! Process runtime for funchost.
//!
//! This crate holds everything that touches the OS: spawning and draining
//! host processes, reading the listener and process tables, PATH discovery
//! and HTTP listen confirmation. [`FunctionsController`] ties it together.
//!
//! # Structure
//!
//! - `output/` - line buffers, readiness detection, pipe readers
//! - `system/` - `ListenerTable` and `ProcessTable` backed by the OS
//! - `shutdown/` - process-tree termination with retry
//! - `port_oracle` - port-in-use queries and free-port selection
//! - `tool` - functions host executable discovery
//! - `confirm` - post-readiness HTTP probe
//! - `process` - one managed host process
//! - `controller` / `scope` - lifecycle orchestration

pub mod confirm;
pub mod controller;
pub mod output;
pub mod port_oracle;
pub mod process;
pub mod scope;
pub mod shutdown;
pub mod system;
pub mod tool;

pub use confirm::{ConfirmPolicy, confirm_listening};
pub use controller::FunctionsController;
pub use output::{
    LineObserver, OutputBuffer, ProcessOutput, ReadinessSignal, log_all_and_clear, log_and_clear,
};
pub use port_oracle::{DEFAULT_PORT_RANGE_END, DEFAULT_PORT_RANGE_START, PortOracle};
pub use process::ManagedProcess;
pub use scope::FunctionsScope;
pub use shutdown::{KillPolicy, kill_process_tree};
pub use system::{SystemListenerTable, SystemProcessTable};
pub use tool::ToolResolver;

// Re-export core types for convenience
pub use funchost_core::{
    ExitInfo, FunctionConfiguration, FunctionsError, FunctionsResult, HarnessSettings,
    InstanceRequest, InstanceState, OutputStream, StartupOutcome,
};

//! Path utilities for locating function project build output.
//!
//! # Design
//!
//! - Returns `PathBuf` and `FunctionsError` for clear error handling
//! - No terminal I/O; progress goes to `tracing`
//! - OS-specific matching rules are kept private in `platform`

mod platform;
mod project;

pub use project::{BuildConfiguration, resolve_project_path, resolve_project_path_from};

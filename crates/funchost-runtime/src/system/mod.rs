//! OS-backed implementations of the core port traits.

mod listeners;
mod processes;

pub use listeners::SystemListenerTable;
pub use processes::SystemProcessTable;

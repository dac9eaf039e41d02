//! Port definitions (OS-facing seams).
//!
//! The runtime provides system implementations; tests substitute fakes. No
//! implementation in this crate talks to the OS.

mod listener_table;
mod output_sink;
mod process_table;

pub use listener_table::ListenerTable;
pub use output_sink::{NoopOutputSink, OutputSinkPort};
pub use process_table::ProcessTable;

//! Output sink port for forwarding host output lines.
//!
//! Lets callers observe child output as it arrives (for example to stream it
//! into a test framework's output) in addition to the in-memory buffers.

use crate::outcome::OutputStream;

/// Port for appending host output lines to a sink.
///
/// Implementations should be thread-safe and non-blocking where possible.
pub trait OutputSinkPort: Send + Sync {
    /// Append a line from a host process.
    ///
    /// * `port` - Port the host was started on (used for grouping output)
    /// * `stream` - Which stream produced the line
    /// * `line` - The line content (without trailing newline)
    fn append(&self, port: u16, stream: OutputStream, line: &str);
}

/// A sink that discards all lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOutputSink;

impl OutputSinkPort for NoopOutputSink {
    fn append(&self, _port: u16, _stream: OutputStream, _line: &str) {}
}

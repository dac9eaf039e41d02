//! Output capture for managed processes.
//!
//! - [`OutputBuffer`]: per-stream text accumulators with an optional line observer
//! - [`ReadinessSignal`]: resolves on the first line containing the marker
//! - [`spawn_output_reader`]: drains a child pipe into a buffer
//! - [`ProcessOutput`]: read-only view handed to callers, plus log-and-clear helpers

mod buffer;
mod readiness;
mod stream;

use std::sync::Arc;

use tracing::{info, warn};

pub use buffer::{CLEARED_PREFIX, LineObserver, OutputBuffer, is_cleared_only};
pub use readiness::ReadinessSignal;
pub use stream::spawn_output_reader;

/// Read-only access to one process's launch description and captured output.
pub trait ProcessOutput: Send + Sync {
    /// Program, arguments and working directory, for log messages.
    fn description(&self) -> String;

    fn stdout(&self) -> String;

    fn stderr(&self) -> String;

    /// Replace the captured text with a timestamped marker line.
    fn clear(&self);
}

/// Log a process's captured output, then clear it.
///
/// Stdout goes to `info`; stderr goes to `warn` and only when the host wrote
/// something to it since the last clear.
pub fn log_and_clear(output: &dyn ProcessOutput) {
    let description = output.description();
    let stdout = output.stdout();
    let stderr = output.stderr();

    info!(process = %description, "Function host output:\n{stdout}");
    if has_host_text(&stderr) {
        warn!(process = %description, "Function host error output:\n{stderr}");
    }

    output.clear();
}

fn has_host_text(text: &str) -> bool {
    !is_cleared_only(text)
}

/// [`log_and_clear`] every output in order.
pub fn log_all_and_clear(outputs: &[Arc<dyn ProcessOutput>]) {
    for output in outputs {
        log_and_clear(output.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funchost_core::OutputStream;

    struct BufferedOutput(OutputBuffer);

    impl ProcessOutput for BufferedOutput {
        fn description(&self) -> String {
            "func host start --port 7071 --csharp, working directory /work".to_string()
        }

        fn stdout(&self) -> String {
            self.0.stdout()
        }

        fn stderr(&self) -> String {
            self.0.stderr()
        }

        fn clear(&self) {
            self.0.clear();
        }
    }

    #[test]
    fn log_all_and_clear_clears_every_output() {
        let first = BufferedOutput(OutputBuffer::new());
        first.0.append_line(OutputStream::Stdout, "Functions:");
        let second = BufferedOutput(OutputBuffer::new());
        second.0.append_line(OutputStream::Stderr, "boom");

        let outputs: Vec<Arc<dyn ProcessOutput>> = vec![Arc::new(first), Arc::new(second)];
        log_all_and_clear(&outputs);

        for output in &outputs {
            assert!(output.stdout().starts_with(CLEARED_PREFIX));
            assert!(output.stderr().starts_with(CLEARED_PREFIX));
        }
    }

    #[test]
    fn cleared_stderr_is_not_host_text() {
        let output = BufferedOutput(OutputBuffer::new());
        assert!(!has_host_text(&output.stderr()));

        output.clear();
        assert!(!has_host_text(&output.stderr()));

        output.0.append_line(OutputStream::Stderr, "Worker crashed");
        assert!(has_host_text(&output.stderr()));

        output.clear();
        assert!(!has_host_text(&output.stderr()));
    }
}

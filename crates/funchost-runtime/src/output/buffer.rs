//! Line accumulators for a child's stdout and stderr.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use funchost_core::OutputStream;

/// Start of the marker line written by [`OutputBuffer::clear`].
pub const CLEARED_PREFIX: &str = "Output cleared at ";

/// Whether `text` holds nothing but a clear marker (or nothing at all).
pub fn is_cleared_only(text: &str) -> bool {
    let mut lines = text.lines();
    match lines.next() {
        None => true,
        Some(first) => first.starts_with(CLEARED_PREFIX) && lines.next().is_none(),
    }
}

/// Callback invoked once per appended line, after the line is stored.
pub type LineObserver = Box<dyn Fn(OutputStream, &str) + Send + Sync>;

/// Thread-safe text accumulators for one process.
///
/// Readers drain the child's pipes into this buffer continuously so the child
/// never blocks on a full OS pipe. Each stream has its own lock; `clear`
/// takes both, always stdout first.
#[derive(Default)]
pub struct OutputBuffer {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
    observer: Option<LineObserver>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer that reports every line to `observer`.
    pub fn with_observer(observer: LineObserver) -> Self {
        Self {
            observer: Some(observer),
            ..Self::default()
        }
    }

    /// Append one line (without its terminator) to `stream`.
    pub fn append_line(&self, stream: OutputStream, line: &str) {
        {
            let mut text = lock(self.slot(stream));
            text.push_str(line);
            text.push('\n');
        }
        if let Some(observer) = &self.observer {
            observer(stream, line);
        }
    }

    /// Snapshot of everything accumulated on `stream` so far.
    pub fn current_text(&self, stream: OutputStream) -> String {
        lock(self.slot(stream)).clone()
    }

    pub fn stdout(&self) -> String {
        self.current_text(OutputStream::Stdout)
    }

    pub fn stderr(&self) -> String {
        self.current_text(OutputStream::Stderr)
    }

    /// Replace both accumulators with a timestamped marker line.
    pub fn clear(&self) {
        let marker = format!("{CLEARED_PREFIX}{}\n", Utc::now().to_rfc3339());
        let mut stdout = lock(&self.stdout);
        let mut stderr = lock(&self.stderr);
        stdout.clone_from(&marker);
        *stderr = marker;
    }

    const fn slot(&self, stream: OutputStream) -> &Mutex<String> {
        match stream {
            OutputStream::Stdout => &self.stdout,
            OutputStream::Stderr => &self.stderr,
        }
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("stdout_len", &lock(&self.stdout).len())
            .field("stderr_len", &lock(&self.stderr).len())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

// A panicking appender cannot leave a String half-written, so the data is
// still usable after poisoning.
fn lock(slot: &Mutex<String>) -> MutexGuard<'_, String> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn appends_lines_in_order_with_terminators() {
        let buffer = OutputBuffer::new();
        buffer.append_line(OutputStream::Stdout, "one");
        buffer.append_line(OutputStream::Stdout, "");
        buffer.append_line(OutputStream::Stdout, "three");
        buffer.append_line(OutputStream::Stderr, "oops");

        assert_eq!(buffer.stdout(), "one\n\nthree\n");
        assert_eq!(buffer.stderr(), "oops\n");
    }

    #[test]
    fn clear_leaves_only_marker() {
        let buffer = OutputBuffer::new();
        buffer.append_line(OutputStream::Stdout, "hello");
        buffer.append_line(OutputStream::Stderr, "world");
        buffer.clear();

        for text in [buffer.stdout(), buffer.stderr()] {
            assert_eq!(text.lines().count(), 1);
            assert!(text.starts_with(CLEARED_PREFIX));
            assert!(is_cleared_only(&text));
        }
    }

    #[test]
    fn clear_on_empty_buffer_is_harmless() {
        let buffer = OutputBuffer::new();
        buffer.clear();
        buffer.clear();
        assert_eq!(buffer.stdout().lines().count(), 1);
    }

    #[test]
    fn observer_sees_every_line() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let buffer = OutputBuffer::with_observer(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        buffer.append_line(OutputStream::Stdout, "a");
        buffer.append_line(OutputStream::Stderr, "b");
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let buffer = Arc::new(OutputBuffer::new());
        let writers: Vec<_> = (0..4)
            .map(|n| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        buffer.append_line(OutputStream::Stdout, &format!("{n}-{i}"));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(buffer.stdout().lines().count(), 400);
    }
}

//! Async pipe readers (non-UTF8-safe).
//!
//! The host and the tools it shells out to can emit non-UTF8 bytes. Using
//! `BufReader::lines()` would end the reader on invalid UTF-8 and leave the
//! pipe undrained, so lines are read as bytes and decoded lossily.

use std::sync::Arc;

use funchost_core::{OutputSinkPort, OutputStream};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::OutputBuffer;

/// Drain `stream` into `buffer` until EOF, forwarding each line to `sink`.
///
/// The returned handle completes once the pipe is closed, which lets callers
/// wait for the last lines of a process that has already exited.
pub fn spawn_output_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    port: u16,
    kind: OutputStream,
    buffer: Arc<OutputBuffer>,
    sink: Arc<dyn OutputSinkPort>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let line = String::from_utf8_lossy(&buf);
                    match kind {
                        OutputStream::Stdout => debug!(port = %port, stream = %kind, "{line}"),
                        OutputStream::Stderr => warn!(port = %port, stream = %kind, "{line}"),
                    }
                    buffer.append_line(kind, &line);
                    sink.append(port, kind, &line);
                }
                Err(e) => {
                    debug!(port = %port, stream = %kind, error = %e, "output reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(port = %port, stream = %kind, "output reader task exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use funchost_core::NoopOutputSink;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<(u16, OutputStream, String)>>,
    }

    impl OutputSinkPort for RecordingSink {
        fn append(&self, port: u16, stream: OutputStream, line: &str) {
            self.lines
                .lock()
                .unwrap()
                .push((port, stream, line.to_string()));
        }
    }

    #[tokio::test]
    async fn drains_lines_and_strips_terminators() {
        let pipe = tokio_test::io::Builder::new()
            .read(b"Host started\r\nFunc")
            .read(b"tions:\n")
            .read(b"no newline at end")
            .build();
        let buffer = Arc::new(OutputBuffer::new());

        spawn_output_reader(
            pipe,
            7071,
            OutputStream::Stdout,
            Arc::clone(&buffer),
            Arc::new(NoopOutputSink),
        )
        .await
        .unwrap();

        assert_eq!(buffer.stdout(), "Host started\nFunctions:\nno newline at end\n");
        assert!(buffer.stderr().is_empty());
    }

    #[tokio::test]
    async fn survives_invalid_utf8() {
        let pipe = tokio_test::io::Builder::new()
            .read(b"bad \xff byte\nafter\n")
            .build();
        let buffer = Arc::new(OutputBuffer::new());

        spawn_output_reader(
            pipe,
            7071,
            OutputStream::Stderr,
            Arc::clone(&buffer),
            Arc::new(NoopOutputSink),
        )
        .await
        .unwrap();

        let stderr = buffer.stderr();
        assert_eq!(stderr.lines().count(), 2);
        assert!(stderr.ends_with("after\n"));
    }

    #[tokio::test]
    async fn forwards_lines_to_sink() {
        let pipe = tokio_test::io::Builder::new().read(b"a\nb\n").build();
        let sink = Arc::new(RecordingSink::default());

        spawn_output_reader(
            pipe,
            9000,
            OutputStream::Stdout,
            Arc::new(OutputBuffer::new()),
            Arc::clone(&sink) as Arc<dyn OutputSinkPort>,
        )
        .await
        .unwrap();

        let lines = sink.lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                (9000, OutputStream::Stdout, "a".to_string()),
                (9000, OutputStream::Stdout, "b".to_string()),
            ]
        );
    }
}

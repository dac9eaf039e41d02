//! Readiness marker detection.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Resolves once, the first time a line containing the marker is observed.
///
/// Cloning shares the same signal. If the marker never appears, [`wait`]
/// never returns; callers race it against exit and a timeout.
///
/// [`wait`]: ReadinessSignal::wait
#[derive(Debug, Clone)]
pub struct ReadinessSignal {
    marker: Arc<str>,
    ready: Arc<watch::Sender<bool>>,
}

impl ReadinessSignal {
    pub fn new(marker: impl AsRef<str>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            marker: Arc::from(marker.as_ref()),
            ready: Arc::new(ready),
        }
    }

    /// Inspect one line. Returns `true` only for the line that resolved the signal.
    pub fn observe(&self, line: &str) -> bool {
        if !line.contains(&*self.marker) {
            return false;
        }
        let resolved = self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if resolved {
            debug!(marker = %self.marker, "Readiness marker observed");
        }
        resolved
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Wait until the marker has been observed.
    pub async fn wait(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this only errors if it is dropped.
        if rx.wait_for(|ready| *ready).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

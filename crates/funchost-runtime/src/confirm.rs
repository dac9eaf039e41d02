//! Post-readiness listen confirmation.

use std::time::Duration;

use funchost_core::{FunctionsError, FunctionsResult};
use tokio::time::sleep;
use tracing::{debug, info};

/// Retry budget for [`confirm_listening`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub request_timeout: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// Poll `http://localhost:{port}/` until it answers.
///
/// Any HTTP response counts, including 404 or 500; only transport errors
/// (refused, reset, timed out) count as "not yet".
pub async fn confirm_listening(port: u16, policy: ConfirmPolicy) -> FunctionsResult<()> {
    let url = format!("http://localhost:{port}/");
    let client = reqwest::Client::builder()
        .timeout(policy.request_timeout)
        .build()
        .map_err(|e| FunctionsError::Io(std::io::Error::other(e)))?;

    for attempt in 1..=policy.attempts {
        match client.get(&url).send().await {
            Ok(response) => {
                info!(port = %port, status = %response.status(), attempt, "Function host is accepting connections");
                return Ok(());
            }
            Err(e) => {
                debug!(port = %port, attempt, error = %e, "Listen confirmation failed, retrying");
            }
        }
        if attempt < policy.attempts {
            sleep(policy.delay).await;
        }
    }

    // Output is attached by the caller that owns the process.
    Err(FunctionsError::ListenConfirmationFailed {
        port,
        attempts: policy.attempts,
        stdout: String::new(),
        stderr: String::new(),
    })
}

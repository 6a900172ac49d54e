//! Fixed-backoff retry for infrastructure connections.
//!
//! Used once per collaborator (store, bus) before the process starts
//! serving, and by the relay to replace a lost update subscription.
//! Exhausting the attempts returns the last error, which the entrypoint
//! treats as fatal.

use std::future::Future;
use std::time::Duration;

/// How many times to try, and how long to wait between tries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(2),
        }
    }
}

/// Run `op` until it succeeds or `policy.attempts` is exhausted.
///
/// `what` names the resource in log lines (e.g. `"database"`).
pub async fn retry_fixed<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(resource = what, attempt, "Connected after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    resource = what,
                    error = %e,
                    "Connection attempt {attempt}/{attempts} failed, retrying in {:?}",
                    policy.delay,
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    resource = what,
                    error = %e,
                    attempts,
                    "Giving up after exhausting connection attempts",
                );
                return Err(e);
            }
        }
    }
}

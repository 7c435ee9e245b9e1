//! Fixed-delay retry for blocking operations.
//!
//! Bluetooth LE links to battery powered sensors drop often enough that a
//! single failed connect or read says little. [`retry`] reruns an operation a
//! bounded number of times with a constant pause in between.

use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between two consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Every attempt failed; carries the error of the final one.
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// `op` receives the 1-based attempt number. Before each pause a warning is
/// logged with the attempt number and its error, then `sleep` is called with
/// `policy.delay`. No pause follows the final attempt. A policy of zero
/// attempts is treated as one.
pub fn retry<T, E, F>(
    policy: &RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
    mut op: F,
) -> Result<T, Exhausted<E>>
where
    E: Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(last) if attempt >= max_attempts => {
                return Err(Exhausted {
                    attempts: attempt,
                    last,
                });
            }
            Err(error) => {
                warn!(
                    attempt,
                    max_attempts,
                    %error,
                    "attempt failed, retrying in {:?}",
                    policy.delay
                );
                sleep(policy.delay);
                attempt += 1;
            }
        }
    }
}

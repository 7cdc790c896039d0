//! Fixed-budget retries: a fixed number of attempts with a fixed pause between them.

use std::thread;
use std::time::Duration;

use tracing::warn;

/// Retry budget. `attempts` includes the first try.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

/// The last error after the budget ran out.
#[derive(Debug, thiserror::Error)]
#[error("failed after {attempts} attempt(s): {last}")]
pub struct Exhausted<E: std::error::Error + 'static> {
    pub attempts: u32,
    #[source]
    pub last: E,
}

/// Run `attempt` until it succeeds or the budget is spent.
///
/// `attempt` receives the 1-based attempt number. Sleeps only between attempts,
/// never after the last one. A zero budget still makes one attempt.
pub fn retry<T, E>(
    policy: RetryPolicy,
    mut attempt: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, Exhausted<E>>
where
    E: std::error::Error + 'static,
{
    let attempts = policy.attempts.max(1);
    let mut number = 1;
    loop {
        match attempt(number) {
            Ok(value) => return Ok(value),
            Err(e) if number >= attempts => {
                return Err(Exhausted {
                    attempts: number,
                    last: e,
                });
            }
            Err(e) => {
                warn!(attempt = number, of = attempts, error = %e, "attempt failed, retrying");
                thread::sleep(policy.delay);
                number += 1;
            }
        }
    }
}

// In: src/reconcile/retry.rs

//! Bounded retry with exponential backoff and a per-call deadline.
//!
//! Every call into an external service (search, create, update, fetch, build)
//! goes through a [`CallPolicy`]. Deterministic failures such as a decode error
//! never reach this layer; only `PlatformError`s flagged retryable are retried.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::CallPolicyConfig;
use crate::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    call_timeout: Duration,
}

impl CallPolicy {
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
            call_timeout,
        }
    }

    /// A single attempt, no waiting. Handy for tests and dry runs.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, Duration::MAX)
    }

    pub fn from_config(config: &CallPolicyConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_backoff(),
            config.max_backoff(),
            config.call_timeout(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before retry number `retry` (1-based): `initial * 2^(retry-1)`, capped.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Runs `call` until it succeeds, fails permanently, runs out of attempts or
    /// would overrun the deadline.
    ///
    /// The deadline is checked between attempts. A blocking call that hangs is
    /// bounded by the collaborator's own client timeout; once it returns, no
    /// further attempt is started past the deadline.
    pub fn call<T, F>(&self, operation: &str, mut call: F) -> Result<T, PlatformError>
    where
        F: FnMut() -> Result<T, PlatformError>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match call() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                log::warn!(
                    "{} failed after {} attempt(s), giving up: {}",
                    operation,
                    attempt,
                    err
                );
                return Err(err);
            }

            let backoff = self.backoff_for(attempt);
            if started.elapsed().saturating_add(backoff) >= self.call_timeout {
                return Err(PlatformError::timeout(format!(
                    "{} exceeded its {:?} budget after {} attempt(s): {}",
                    operation, self.call_timeout, attempt, err.message
                )));
            }

            log::warn!(
                "{} attempt {}/{} failed ({}), retrying in {:?}",
                operation,
                attempt,
                self.max_attempts,
                err,
                backoff
            );
            if !backoff.is_zero() {
                thread::sleep(backoff);
            }
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_config(&CallPolicyConfig::default())
    }
}

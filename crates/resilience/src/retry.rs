//! Bounded retries with deterministic exponential backoff behind an admission gate.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::breaker::{Admission, AdmissionGate};

/// Why a single attempt did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("attempt timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("attempt returned an empty result")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The gate refused an attempt. `attempts` is how many ran before that.
    #[error("circuit open after {attempts} attempt(s)")]
    CircuitOpen { attempts: u32 },

    #[error("gave up after {attempts} attempt(s): {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: AttemptError<E>,
    },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::CircuitOpen { attempts } | RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// `max_retries` is the total number of attempts; attempt `i` (zero-based) is
/// followed by a sleep of `backoff_unit * 2^i` unless it was the last one.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_unit: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            backoff_unit,
            attempt_timeout,
        }
    }

    /// Delay after zero-based attempt `index`.
    pub fn backoff(&self, index: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(index))
    }

    /// Run `attempt` until it yields `Some(value)`, the gate refuses, or the
    /// attempts run out.
    ///
    /// `Ok(None)` from an attempt counts as a failure. A failure that leaves
    /// the gate open ends the run at once, without backing off. Dropping the returned
    /// future stops immediately; if an admitted attempt was in flight the
    /// gate hears about it through [`AdmissionGate::abandon_trial`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        gate: &dyn AdmissionGate,
        mut attempt: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: std::fmt::Display,
    {
        let mut last_error = None;

        for index in 0..self.max_retries {
            let Some(admission) = gate.can_attempt() else {
                debug!(attempt = index + 1, "Attempt refused by circuit breaker");
                return Err(RetryError::CircuitOpen { attempts: index });
            };

            let mut in_flight = InFlight {
                gate,
                admission,
                armed: true,
            };
            let outcome = match tokio::time::timeout(self.attempt_timeout, attempt(index)).await {
                Ok(Ok(Some(value))) => Ok(value),
                Ok(Ok(None)) => Err(AttemptError::Empty),
                Ok(Err(e)) => Err(AttemptError::Failed(e)),
                Err(_) => Err(AttemptError::TimedOut(self.attempt_timeout)),
            };
            in_flight.armed = false;

            match outcome {
                Ok(value) => {
                    gate.record_success(admission);
                    return Ok(value);
                }
                Err(e) => {
                    gate.record_failure(admission);
                    if index + 1 == self.max_retries {
                        warn!(attempt = index + 1, error = %e, "Final attempt failed");
                        last_error = Some(e);
                        break;
                    }
                    if !gate.is_closed() {
                        warn!(attempt = index + 1, error = %e, "Attempt failed and circuit is open");
                        return Err(RetryError::CircuitOpen { attempts: index + 1 });
                    }
                    let delay = self.backoff(index);
                    warn!(
                        attempt = index + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(RetryError::Exhausted {
            attempts: self.max_retries,
            last_error: last_error.unwrap_or(AttemptError::Empty),
        })
    }
}

/// Reports an admitted attempt that never finished.
struct InFlight<'a> {
    gate: &'a dyn AdmissionGate,
    admission: Admission,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.abandon_trial(self.admission);
        }
    }
}

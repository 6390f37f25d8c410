//! Bounded retry for transient per-sink failures.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries).
//! - `should_retry` decides whether an error is transient; non-transient
//!   errors short-circuit as [`RetryError::Fatal`].
//! - `Backoff` calculates the delay before each retry; attempt `0` is the
//!   initial call and never delays.
//! - The injected [`Sleeper`] controls how delays are applied (production
//!   uses `TokioSleeper`; tests inject `InstantSleeper`/`TrackingSleeper`).
//!
//! Invariants:
//! - Attempts never exceed `max_attempts`.
//! - The sleeper is invoked exactly `attempts - 1` times.

use crate::sleeper::{Sleeper, TokioSleeper};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Delays saturate here; a once-per-session tool must never sleep past the
/// shutdown window its caller was granted.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every retry.
    Constant(Duration),
    /// Delay doubles per retry, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    pub fn constant(delay: Duration) -> Self {
        Backoff::Constant(delay)
    }

    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential { base, max: MAX_BACKOFF }
    }

    /// Cap the exponential schedule. No effect on `Constant`.
    pub fn with_max(self, max: Duration) -> Self {
        match self {
            Backoff::Exponential { base, .. } => Backoff::Exponential { base, max },
            constant => constant,
        }
    }

    /// Delay for a given attempt number (0-based; 0 = initial call, no delay).
    pub fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self {
            Backoff::Constant(delay) => *delay,
            Backoff::Exponential { base, max } => {
                let exponent = (attempt - 1).min(32) as u32;
                base.checked_mul(2u32.saturating_pow(exponent))
                    .map(|delay| delay.min(*max))
                    .unwrap_or(*max)
                    .min(MAX_BACKOFF)
            }
        }
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error; `last` is the final one.
    Exhausted { attempts: usize, last: E },
    /// A non-transient error short-circuited the loop on some attempt.
    Fatal(E),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "retry exhausted after {} attempts; last error: {}", attempts, last)
            }
            Self::Fatal(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Fatal(e) => Some(e),
        }
    }
}

/// Errors produced while building a retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// `max_attempts` must be > 0.
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(usize),
}

/// Retry policy combining an attempt budget, a delay schedule, a
/// retryability predicate, and an injected sleeper.
#[derive(Clone)]
pub struct RetryPolicy<E> {
    max_attempts: usize,
    backoff: Backoff,
    should_retry: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("should_retry", &"<predicate>")
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl<E> RetryPolicy<E>
where
    E: fmt::Display,
{
    /// Construct a new builder with defaults.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Total attempts this policy will make.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Execute an async operation with retry semantics.
    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, RetryError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        Op: FnMut() -> Fut,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !(self.should_retry)(&e) {
                        return Err(RetryError::Fatal(e));
                    }
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(RetryError::Exhausted { attempts: attempt, last: e });
                    }
                    let delay = self.backoff.delay(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e,
                        "transient failure, retrying");
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<E> {
    max_attempts: usize,
    backoff: Backoff,
    should_retry: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> RetryPolicyBuilder<E>
where
    E: fmt::Display,
{
    /// Create a builder with sane defaults.
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::constant(Duration::from_secs(1)),
            should_retry: Arc::new(|_| true),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Set total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay schedule.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Predicate deciding whether an error is transient.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.with_sleeper_arc(Arc::new(sleeper))
    }

    /// Provide a shared sleeper.
    pub fn with_sleeper_arc(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Build the retry policy, validating inputs.
    pub fn build(self) -> Result<RetryPolicy<E>, BuildError> {
        if self.max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            should_retry: self.should_retry,
            sleeper: self.sleeper,
        })
    }
}

impl<E> Default for RetryPolicyBuilder<E>
where
    E: fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

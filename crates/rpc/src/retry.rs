//! Retrying calls under a policy.
//!
//! [`on`] runs an operation until it succeeds, the policy runs out of attempts, the
//! error is not one the policy retries, or the caller's token is cancelled. Sleeps
//! between attempts race the token, so cancellation never waits out a backoff.
//!
//! ```no_run
//! # use micro_rpc::retry::{self, ON_RETRYABLE};
//! # use micro_rpc::error::{Error, ServiceError};
//! # use micro_rpc::code::Code;
//! # use tokio_util::sync::CancellationToken;
//! # async fn call() -> Result<String, Error> { Err(ServiceError::new(Code::RETRY_REQUEST, "busy").into()) }
//! # async fn example() {
//! let token = CancellationToken::new();
//! let greeting = retry::on(&token, &ON_RETRYABLE, |_token, _attempt| call()).await;
//! # }
//! ```

use std::borrow::Cow;
use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::code::Code;
use crate::error::{Cancelled, classify};

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interval {
    /// A constant pause.
    Sleep(Duration),
    BackOff(BackOff),
}

impl Interval {
    pub fn next(&self, attempt: u32) -> Duration {
        match self {
            Interval::Sleep(duration) => *duration,
            Interval::BackOff(backoff) => backoff.next(attempt),
        }
    }
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackOff {
    pub min: Duration,
    pub max: Duration,
    pub factor: f64,
    /// The upper bound of the random factor applied to the delay; `0` disables it.
    pub jitter: f64,
}

pub const DEFAULT_BACKOFF: BackOff =
    BackOff { min: Duration::from_millis(500), max: Duration::from_secs(5), factor: 2.0, jitter: 0.2 };

impl BackOff {
    /// `min * factor^attempt`, clamped to `[min, max]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.min.as_secs_f64() * self.factor.powi(exponent);

        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            self.max.max(self.min)
        } else if scaled <= self.min.as_secs_f64() {
            self.min
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    /// The clamped delay scaled by a uniform random factor in `[0, jitter]`.
    pub fn next(&self, attempt: u32) -> Duration {
        let delay = self.delay(attempt);
        if !self.jitter.is_finite() || self.jitter <= 0.0 {
            return delay;
        }
        delay.mul_f64(self.jitter.min(1.0) * rand::random::<f64>())
    }
}

/// The codes retried by [`ON_RETRYABLE`].
pub const RETRYABLE_CODES: &[Code] = &[
    Code::RETRY_REQUEST,
    Code::TOO_MANY_REQUESTS,
    Code::INTERNAL_ERROR,
    Code::BAD_GATEWAY,
    Code::SERVICE_UNAVAILABLE,
    Code::GATEWAY_TIMEOUT,
];

/// When and how often to retry.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub interval: Interval,
    /// Codes worth another attempt; empty retries every error.
    pub on_codes: Cow<'static, [Code]>,
    /// The total number of attempts; `0` never gives up.
    pub attempts: u32,
}

/// Two attempts, any error.
pub const TWICE: Policy = Policy { interval: Interval::BackOff(DEFAULT_BACKOFF), on_codes: Cow::Borrowed(&[]), attempts: 2 };

/// Unbounded attempts, any error.
pub const UNTIL_SUCCESS: Policy =
    Policy { interval: Interval::BackOff(DEFAULT_BACKOFF), on_codes: Cow::Borrowed(&[]), attempts: 0 };

/// Unbounded attempts while the error carries one of [`RETRYABLE_CODES`].
pub const ON_RETRYABLE: Policy =
    Policy { interval: Interval::BackOff(DEFAULT_BACKOFF), on_codes: Cow::Borrowed(RETRYABLE_CODES), attempts: 0 };

impl Policy {
    /// Whether `err` is worth another attempt under this policy.
    ///
    /// With codes configured, only classified errors carrying one of them qualify.
    pub fn should_retry(&self, err: &(dyn StdError + 'static)) -> bool {
        if self.on_codes.is_empty() {
            return true;
        }
        classify(err).is_some_and(|classified| self.on_codes.contains(&classified.code()))
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.attempts != 0 && attempt >= self.attempts
    }
}

#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// The error of the last attempt.
    #[error(transparent)]
    Operation(E),
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled(_))
    }

    pub fn into_operation(self) -> Option<E> {
        match self {
            RetryError::Operation(e) => Some(e),
            RetryError::Cancelled(_) => None,
        }
    }
}

/// Runs `operation` under `policy` until it succeeds or the policy gives up.
///
/// The operation receives the token and the attempt number, starting at 1.
/// Cancellation wins over any result and surfaces as [`RetryError::Cancelled`].
pub async fn on<T, E, F, Fut>(token: &CancellationToken, policy: &Policy, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut(CancellationToken, u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + 'static,
{
    let mut attempt: u32 = 1;
    loop {
        if token.is_cancelled() {
            return Err(Cancelled.into());
        }
        let result = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Cancelled.into()),
            result = operation(token.clone(), attempt) => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if policy.exhausted(attempt) {
            debug!(attempt, cause = %err, "retry attempts exhausted");
            return Err(RetryError::Operation(err));
        }
        if !policy.should_retry(&err) {
            debug!(attempt, cause = %err, "error is not retryable");
            return Err(RetryError::Operation(err));
        }

        let delay = policy.interval.next(attempt);
        debug!(attempt, ?delay, cause = %err, "attempt failed, retrying");
        tokio::select! {
            biased;
            () = token.cancelled() => return Err(Cancelled.into()),
            () = tokio::time::sleep(delay) => {}
        }
        attempt = attempt.saturating_add(1);
    }
}

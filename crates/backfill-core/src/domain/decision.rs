//! Failure handling: what to do with a job whose step failed.
//!
//! The queue owns the job record; when a worker reports a failure the queue
//! asks a `Decider` for a `Decision` and applies it. Deciders are pure apart
//! from jitter: same history + same error + same `now` gives the same choice.
//!
//! Policy per error class:
//! - RateLimited: wait until the source's reset time. Counted separately
//!   from real failures and bounded by `max_rate_limit_waits`.
//! - Transient / Infrastructure: exponential backoff, bounded by `max_attempts`.
//! - Permanent: dead-letter right away.
//!
//! Page size is never reduced on failure.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::{ErrorKind, FetchError, SyncError};

/// Backoff and budget settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry of a failed job.
    pub base_delay_ms: u64,
    /// Backoff multiplier applied per further failure.
    pub multiplier: f64,
    /// Upper bound for a single backoff delay.
    pub max_delay_ms: u64,
    /// Failures (rate limits excluded) before the job is dead-lettered.
    pub max_attempts: u32,
    /// Rate-limit waits before the job is dead-lettered.
    pub max_rate_limit_waits: u32,
    /// Random extra delay, as a fraction of the computed delay (0.0..=1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            multiplier: 2.0,
            max_delay_ms: 15 * 60 * 1_000,
            max_attempts: 5,
            max_rate_limit_waits: 10,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after `failures` failures (1-indexed):
    /// `base * multiplier^(failures - 1)`, capped at `max_delay_ms`.
    pub fn next_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Time left until `reset_at`, zero if it already passed.
    pub fn rate_limit_delay(&self, reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (reset_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let max_extra = delay.as_secs_f64() * self.jitter_factor.min(1.0);
        let extra = rand::thread_rng().gen_range(0.0..=max_extra);
        delay + Duration::from_secs_f64(extra)
    }
}

/// Classified failure as reported by a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    /// Only set for `ErrorKind::RateLimited`.
    pub reset_at: Option<DateTime<Utc>>,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            reset_at: None,
        }
    }
}

impl From<&FetchError> for Failure {
    fn from(err: &FetchError) -> Self {
        let reset_at = match err {
            FetchError::RateLimited { reset_at } => Some(*reset_at),
            _ => None,
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            reset_at,
        }
    }
}

impl From<&SyncError> for Failure {
    fn from(err: &SyncError) -> Self {
        match err.fetch_error() {
            Some(fetch) => Failure::from(fetch),
            None => Failure::new(err.kind(), err.to_string()),
        }
    }
}

/// Failure counters of one job, including the failure being decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailureHistory {
    pub failures: u32,
    pub rate_limit_waits: u32,
}

impl FailureHistory {
    /// Counters after recording `failure`.
    pub fn record(self, failure: &Failure) -> Self {
        match failure.kind {
            ErrorKind::RateLimited => Self {
                rate_limit_waits: self.rate_limit_waits + 1,
                ..self
            },
            _ => Self {
                failures: self.failures + 1,
                ..self
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Put the job back after `delay`.
    Retry { delay: Duration, reason: String },
    /// Give up; the job goes to the dead letters.
    MarkDead { reason: String },
}

pub trait Decider: Send + Sync {
    fn decide(&self, history: FailureHistory, failure: &Failure, now: DateTime<Utc>) -> Decision;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, history: FailureHistory, failure: &Failure, now: DateTime<Utc>) -> Decision {
        let policy = &self.retry_policy;
        match failure.kind {
            ErrorKind::Permanent => Decision::MarkDead {
                reason: format!("permanent failure: {}", failure.message),
            },
            ErrorKind::RateLimited => {
                if history.rate_limit_waits > policy.max_rate_limit_waits {
                    return Decision::MarkDead {
                        reason: format!(
                            "still rate limited after {} waits",
                            policy.max_rate_limit_waits
                        ),
                    };
                }
                // No reset time reported: fall back to the regular backoff.
                let delay = match failure.reset_at {
                    Some(reset_at) => policy.rate_limit_delay(reset_at, now),
                    None => policy.next_delay(history.rate_limit_waits),
                };
                Decision::Retry {
                    delay: policy.with_jitter(delay),
                    reason: format!(
                        "rate limited, wait {}/{}",
                        history.rate_limit_waits, policy.max_rate_limit_waits
                    ),
                }
            }
            ErrorKind::Transient | ErrorKind::Infrastructure => {
                if history.failures >= policy.max_attempts {
                    return Decision::MarkDead {
                        reason: format!(
                            "max attempts reached: {}/{}",
                            history.failures, policy.max_attempts
                        ),
                    };
                }
                let delay = policy.next_delay(history.failures);
                Decision::Retry {
                    delay: policy.with_jitter(delay),
                    reason: format!(
                        "retry {}/{} after {:?}",
                        history.failures + 1,
                        policy.max_attempts,
                        delay
                    ),
                }
            }
        }
    }
}

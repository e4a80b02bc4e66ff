//! # Bounded Retry
//!
//! Re-runs a whole ledger operation after a transient storage fault.
//!
//! ## Retry Decision
//! ```text
//! attempt() ──► Ok(v)                         → return v
//!     │
//!     ├──► Err(rule failure)                  → return err (never retried)
//!     │      InvalidAmount, InvalidCode, SelfReferral, AlreadyReferred,
//!     │      NotFound, Invalid
//!     │
//!     ├──► Err(Timeout) and Replay::AppendOnly → return err
//!     │      (the COMMIT may already have landed)
//!     │
//!     └──► Err(Conflict | Busy | Timeout | Unavailable)
//!            │
//!            ├── attempts left?  yes → sleep(next_backoff) → attempt()
//!            └──                  no → return err
//! ```
//!
//! Each attempt runs its own transaction, so a failed attempt leaves
//! nothing behind for the next one to trip over.
//!
//! ## Timeouts and Appends
//! A deadline that fires while COMMIT is in flight leaves the outcome
//! unknown: SQLite may have committed the transaction. Replaying a read or
//! a get-or-create is harmless. Replaying `record_visit`, `check_in` or
//! `redeem_referral` would append a second visit or report
//! `AlreadyReferred` for an award that did land, so those run as
//! [`Replay::AppendOnly`] and surface the `Timeout` to the caller instead.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};

/// Whether an operation may be re-run after its outcome became unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Re-running after a commit changes nothing (reads, get-or-create).
    Idempotent,
    /// Re-running after a commit would append a second row.
    AppendOnly,
}

impl Replay {
    /// True if `err` may be retried under this replay mode.
    pub fn allows(self, err: &LedgerError) -> bool {
        match self {
            Replay::Idempotent => err.is_retryable(),
            Replay::AppendOnly => err.is_retryable() && !err.may_have_committed(),
        }
    }
}

/// How many times, and how patiently, to retry transient faults.
///
/// `Timeout` is retried only for idempotent operations; see [`Replay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first. 1 disables retry.
    pub max_attempts: u32,

    /// Delay before the second attempt (milliseconds).
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay (milliseconds).
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 25,
            max_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs every operation exactly once.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_millis(self.max_backoff_ms),
            multiplier: 2.0,
            // Attempts are bounded by max_attempts instead
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `attempt` until it succeeds, fails terminally, or the policy's
/// attempts are used up.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    replay: Replay,
    mut attempt: F,
) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let max_attempts = policy.max_attempts.max(1);
    let mut tries = 1u32;

    loop {
        match attempt().await {
            Ok(value) => {
                if tries > 1 {
                    debug!(operation, attempt = tries, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if replay.allows(&err) && tries < max_attempts => {
                let delay = backoff
                    .next_backoff()
                    .unwrap_or(Duration::from_millis(policy.max_backoff_ms));

                warn!(
                    operation,
                    attempt = tries,
                    max_attempts,
                    ?delay,
                    error = %err,
                    "Transient failure, retrying"
                );

                tokio::time::sleep(delay).await;
                tries += 1;
            }
            Err(err) => {
                if replay.allows(&err) {
                    warn!(operation, attempts = tries, error = %err, "Retries exhausted");
                } else if err.may_have_committed() {
                    warn!(operation, error = %err, "Outcome unknown, not replaying");
                }
                return Err(err);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DbError, ErrorKind, LedgerError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tuzo_core::CoreError;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = with_retry(&fast(), "test", Replay::Idempotent, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LedgerError::from(DbError::Busy("database is locked".into())))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: LedgerResult<()> = with_retry(&fast(), "test", Replay::Idempotent, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Timeout { after_ms: 1 }.into())
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rule_failures_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: LedgerResult<()> = with_retry(&fast(), "test", Replay::Idempotent, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::AlreadyReferred {
                customer_id: "d".into(),
            }
            .into())
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::AlreadyReferred);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: LedgerResult<()> = with_retry(&RetryPolicy::no_retry(), "test", Replay::Idempotent, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::PoolExhausted.into())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_append_only_does_not_replay_timeout() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: LedgerResult<()> = with_retry(&fast(), "test", Replay::AppendOnly, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Timeout { after_ms: 1 }.into())
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_append_only_still_retries_busy() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = with_retry(&fast(), "test", Replay::AppendOnly, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::from(DbError::Busy("database is locked".into())))
            } else {
                Ok("visit")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "visit");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}

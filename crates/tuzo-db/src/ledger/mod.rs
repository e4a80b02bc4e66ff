//! # Loyalty Ledger
//!
//! Every balance-changing operation in Tuzo goes through here.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Ledger Operation                                │
//! │                                                                         │
//! │  validate input (pure, tuzo-core)  ── InvalidAmount / InvalidCode ──►  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  with_retry(policy) ◄──────────────────────────────┐                   │
//! │       │                                            │ Conflict / Busy /  │
//! │       ▼                                            │ Timeout /          │
//! │  timeout(operation_timeout)                        │ Unavailable        │
//! │       │                                            │                    │
//! │       ▼                                            │                    │
//! │  BEGIN IMMEDIATE ── reads ── writes ── COMMIT ─────┘                    │
//! │       │                                                                 │
//! │       ▼ (committed only)                                                │
//! │  broadcast LedgerEvent                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Appending operations (visits, check-ins, redemptions) are never replayed
//! after a `Timeout`, since the COMMIT may have landed. See [`retry::Replay`].
//!
//! Balances live in SQLite rows and change only through `UPDATE ... SET
//! points = points + ?` inside the transaction that writes the Visit or
//! Referral row. No balance is cached in process memory.
//!
//! ## Submodules
//! - [`accrual`] - visits, check-in, history, business stats
//! - [`referral`] - code issuance, redemption, summaries
//! - [`retry`] - bounded retry policy
//! - [`events`] - post-commit notifications

pub mod accrual;
pub mod events;
pub mod referral;
pub mod retry;

use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{DbError, LedgerResult};
use crate::pool::Database;
use tuzo_core::LoyaltyRules;

pub use accrual::DEFAULT_HISTORY_LIMIT;
pub use events::{LedgerEvent, EVENT_CHANNEL_CAPACITY};
pub use retry::{Replay, RetryPolicy};

/// Transactional points and referral ledger.
///
/// Cheap to clone; clones share the pool, rules and event channel.
#[derive(Debug, Clone)]
pub struct LoyaltyLedger {
    db: Database,
    rules: Arc<LoyaltyRules>,
    retry: RetryPolicy,
    events: broadcast::Sender<LedgerEvent>,
}

impl LoyaltyLedger {
    /// Creates a ledger over `db` with the given rules.
    ///
    /// Fails with `InvalidRate` if any rule constant is unusable.
    pub fn new(db: Database, rules: LoyaltyRules, retry: RetryPolicy) -> LedgerResult<Self> {
        rules.validate()?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(LoyaltyLedger {
            db,
            rules: Arc::new(rules),
            retry,
            events,
        })
    }

    /// The rules this ledger applies.
    pub fn rules(&self) -> &LoyaltyRules {
        &self.rules
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Subscribes to post-commit events.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: LedgerEvent) {
        // No subscribers is fine
        if self.events.send(event).is_err() {
            debug!("No event subscribers");
        }
    }

    /// Runs an idempotent operation: reads and get-or-create.
    async fn run<T, F, Fut>(&self, operation: &'static str, attempt: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        self.run_with(operation, Replay::Idempotent, attempt).await
    }

    /// Runs an operation that appends a row on every successful attempt.
    async fn run_append<T, F, Fut>(&self, operation: &'static str, attempt: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        self.run_with(operation, Replay::AppendOnly, attempt).await
    }

    /// Runs one attempt per call of `attempt`, each bounded by the
    /// operation timeout, retrying transient failures per the policy.
    async fn run_with<T, F, Fut>(
        &self,
        operation: &'static str,
        replay: Replay,
        mut attempt: F,
    ) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let limit = self.db.operation_timeout();

        retry::with_retry(&self.retry, operation, replay, || {
            let fut = attempt();
            async move {
                match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(operation, ?limit, "Operation timed out");
                        Err(DbError::Timeout {
                            after_ms: limit.as_millis() as u64,
                        }
                        .into())
                    }
                }
            }
        })
        .await
    }
}

// =============================================================================
// Test Support
// =============================================================================

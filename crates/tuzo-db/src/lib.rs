//! # tuzo-db: Storage and Ledger for Tuzo
//!
//! This crate owns the loyalty database: the Directory of businesses and
//! customers, and the LoyaltyLedger that moves points.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tuzo Data Flow                                   │
//! │                                                                         │
//! │  HTTP handler (POST /businesses/{id}/visits)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tuzo-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ LoyaltyLedger │    │   Directory   │    │  Migrations  │  │   │
//! │  │   │ (ledger/)     │───►│ (directory.rs)│    │  (embedded)  │  │   │
//! │  │   │ retry+timeout │    └───────┬───────┘    │ 001_init.sql │  │   │
//! │  │   └───────┬───────┘            │            └──────────────┘  │   │
//! │  │           ▼                    ▼                               │   │
//! │  │   ┌─────────────────────────────────────┐                     │   │
//! │  │   │ Repositories (business, customer,   │                     │   │
//! │  │   │ visit, referral) over SqlitePool    │                     │   │
//! │  │   └─────────────────────────────────────┘                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ── CHECK / UNIQUE / FK constraints                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage and ledger error types
//! - [`repository`] - Table-level repositories
//! - [`directory`] - Business/customer lookup and creation
//! - [`ledger`] - Transactional accrual and referral operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tuzo_db::{Database, DbConfig, LoyaltyLedger, RetryPolicy};
//! use tuzo_core::LoyaltyRules;
//!
//! let db = Database::new(DbConfig::new("tuzo.db")).await?;
//! let ledger = LoyaltyLedger::new(db, LoyaltyRules::default(), RetryPolicy::default())?;
//!
//! let receipt = ledger.check_in(&business_id, "0712 345 678", None, 12.50).await?;
//! println!("Share your code: {}", receipt.referral_code);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod directory;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use directory::{Directory, NewBusiness};
pub use error::{DbError, DbResult, ErrorKind, LedgerError, LedgerResult};
pub use ledger::{LedgerEvent, LoyaltyLedger, RetryPolicy, DEFAULT_HISTORY_LIMIT};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::business::{BusinessRepository, BusinessTotals};
pub use repository::customer::CustomerRepository;
pub use repository::referral::ReferralRepository;
pub use repository::visit::VisitRepository;

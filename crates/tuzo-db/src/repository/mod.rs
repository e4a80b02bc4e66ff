//! # Repository Module
//!
//! Database repository implementations for Tuzo.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Standalone read/write               Inside a ledger transaction       │
//! │  ─────────────────────               ───────────────────────────       │
//! │  db.customers().get_by_id(id)        tx = db.begin_write().await?;     │
//! │       │                              CustomerRepository::find_in(      │
//! │       │  acquires from pool              &mut tx, id)                  │
//! │       ▼                                   │                             │
//! │  CustomerRepository::find_in(             │  same connection, same     │
//! │      &mut conn, id)  ◄────────────────────┘  transaction               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `*_in` function takes `&mut SqliteConnection`, so the ledger can
//! compose several of them into one atomic unit.
//!
//! ## Available Repositories
//!
//! - [`business::BusinessRepository`] - Business registration and stats
//! - [`customer::CustomerRepository`] - Customer rows and balances
//! - [`visit::VisitRepository`] - Append-only visit log
//! - [`referral::ReferralRepository`] - Codes and referral records

pub mod business;
pub mod customer;
pub mod referral;
pub mod visit;

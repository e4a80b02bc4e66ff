//! # tuzo-core: Pure Loyalty Logic for Tuzo
//!
//! This crate is the **heart** of Tuzo. It contains the points, referral and
//! currency rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tuzo Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tuzo-api (axum handlers)                     │   │
//! │  │    check_in, redeem_referral, referral_summary, stats           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tuzo-db (LoyaltyLedger)                      │   │
//! │  │    transactions, uniqueness constraints, retry, timeouts        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tuzo-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  money   │ │ currency │ │  points  │ │ referral / rules │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Business, Customer, Visit, Referral, ...)
//! - [`money`] - Money type holding integer base-currency cents
//! - [`currency`] - Base-to-display conversion and grouped formatting
//! - [`points`] - Visit amount to points accrual rule
//! - [`referral`] - Referral code generation and normalisation rules
//! - [`rules`] - Centralised loyalty constants (`LoyaltyRules`)
//! - [`principal`] - Who is calling (business, customer, nobody)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tuzo_core::rules::LoyaltyRules;
//!
//! let rules = LoyaltyRules::default();
//!
//! // 1000 base units at 1 point per 100 units
//! assert_eq!(rules.points_for_visit(1000.0).unwrap(), 10);
//!
//! // 100 base units shown in KES at 129.50
//! let shown = tuzo_core::currency::format_display(
//!     tuzo_core::currency::to_display_amount(100.0, rules.display_rate).unwrap(),
//! )
//! .unwrap();
//! assert_eq!(shown, "12,950");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod currency;
pub mod error;
pub mod money;
pub mod points;
pub mod principal;
pub mod referral;
pub mod rules;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use principal::Principal;
pub use rules::LoyaltyRules;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================
// Every business literal lives here once. Config files override them through
// `LoyaltyRules`; nothing else in the workspace hard-codes these values.

/// Display currency units per one base-currency unit (KES per USD).
pub const DEFAULT_DISPLAY_RATE: f64 = 129.50;

/// ISO code of the display currency.
pub const DEFAULT_DISPLAY_CURRENCY: &str = "KES";

/// ISO code of the base currency all accumulators are stored in.
pub const DEFAULT_BASE_CURRENCY: &str = "USD";

/// Whole base-currency units a customer must spend to earn one point.
pub const DEFAULT_BASE_UNITS_PER_POINT: i64 = 100;

/// Points credited to the customer who owns a redeemed referral code.
pub const DEFAULT_REFERRER_BONUS_POINTS: i64 = 30;

/// Points credited to the newly referred customer.
pub const DEFAULT_REFEREE_BONUS_POINTS: i64 = 15;

/// Display-currency value of a single point (1 point = KES 1).
pub const DEFAULT_POINT_DISPLAY_VALUE: f64 = 1.0;

/// Length of generated referral codes.
pub const REFERRAL_CODE_LEN: usize = 6;

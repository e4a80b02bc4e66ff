//! # Money Module
//!
//! Provides the `Money` type for base-currency values.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Summing visit amounts as floats:                                      │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ total_spent drifts              │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Request amounts are normalised ONCE at the edge                     │
//! │    (Money::try_from_major), then every accumulator is i64 cents.       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tuzo_core::money::Money;
//!
//! let spent = Money::try_from_major(12.5).unwrap();
//! assert_eq!(spent.cents(), 1250);
//! assert_eq!(spent.to_string(), "12.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Largest major-unit amount accepted from a request (ten trillion).
///
/// Keeps `amount * 100` exactly representable in both f64 and i64.
pub const MAX_MAJOR_AMOUNT: f64 = 10_000_000_000_000.0;

// =============================================================================
// Money Type
// =============================================================================

/// A base-currency amount in the smallest unit (cents).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  request amount (f64) ──► Money::try_from_major ──► Visit.amount_cents  │
/// │                                                   │                     │
/// │                                                   ├──► points accrual   │
/// │                                                   └──► total_spent      │
/// │                                                                         │
/// │  Money ──► currency::DisplayCurrency::render ──► "KES 12,950"           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tuzo_core::money::Money;
    ///
    /// let amount = Money::from_cents(1099);
    /// assert_eq!(amount.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Normalises a request amount in major units into Money.
    ///
    /// Rounds to the nearest cent. Rejects negative, non-finite and
    /// unrepresentably large input with `InvalidAmount`. Zero is allowed
    /// here; callers that need a strictly positive amount check that.
    ///
    /// ## Example
    /// ```rust
    /// use tuzo_core::money::Money;
    ///
    /// assert_eq!(Money::try_from_major(10.994).unwrap().cents(), 1099);
    /// assert!(Money::try_from_major(-1.0).is_err());
    /// assert!(Money::try_from_major(f64::NAN).is_err());
    /// ```
    pub fn try_from_major(amount: f64) -> CoreResult<Self> {
        if !amount.is_finite() {
            return Err(CoreError::invalid_amount("amount must be a finite number"));
        }

        if amount < 0.0 {
            return Err(CoreError::invalid_amount("amount must not be negative"));
        }

        if amount > MAX_MAJOR_AMOUNT {
            return Err(CoreError::invalid_amount(format!(
                "amount must not exceed {}",
                MAX_MAJOR_AMOUNT
            )));
        }

        // Bounded above, so the cast cannot saturate
        Ok(Money((amount * 100.0).round() as i64))
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns the amount in major units as a float, for display conversion.
    #[inline]
    pub fn to_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount as `major.minor` without a currency symbol.
///
/// Display-currency rendering goes through [`crate::currency`].
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

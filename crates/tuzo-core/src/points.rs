//! # Points Accrual Rule
//!
//! Turns a visit's purchase amount into earned points.
//!
//! ## Rule
//! ```text
//! points = floor(amount_in_base_units / base_units_per_point)
//!
//!   amount 1000.00, 100 units per point  →  10 points
//!   amount   99.99, 100 units per point  →   0 points (visit still counts)
//! ```
//!
//! The amount is normalised to integer cents first, so the same request
//! amount always yields the same point count on every machine.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::DEFAULT_BASE_UNITS_PER_POINT;

/// Largest accepted rate: the largest accepted visit amount.
///
/// A steeper rate could never award a point, and the bound keeps the
/// rate in cents far inside i64.
pub const MAX_BASE_UNITS_PER_POINT: i64 = 10_000_000_000_000;

/// How much must be spent to earn one point.
///
/// Deserializes through [`EarnRate::new`], so a config file cannot carry an
/// out-of-range rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct EarnRate {
    base_units_per_point: i64,
}

impl EarnRate {
    /// Creates an earn rate of one point per `base_units_per_point` units.
    pub fn new(base_units_per_point: i64) -> CoreResult<Self> {
        if base_units_per_point <= 0 {
            return Err(CoreError::InvalidRate {
                reason: format!(
                    "base units per point must be positive, got {base_units_per_point}"
                ),
            });
        }

        if base_units_per_point > MAX_BASE_UNITS_PER_POINT {
            return Err(CoreError::InvalidRate {
                reason: format!(
                    "base units per point must not exceed {MAX_BASE_UNITS_PER_POINT}, \
                     got {base_units_per_point}"
                ),
            });
        }

        Ok(EarnRate {
            base_units_per_point,
        })
    }

    /// Whole base units needed per point.
    #[inline]
    pub const fn base_units_per_point(&self) -> i64 {
        self.base_units_per_point
    }

    /// Points earned for an already-normalised amount.
    ///
    /// Negative amounts earn nothing; callers validate before this point.
    pub fn points_for(&self, amount: Money) -> i64 {
        if amount.cents() <= 0 {
            return 0;
        }
        match self.base_units_per_point.checked_mul(100) {
            Some(cents_per_point) if cents_per_point > 0 => amount.cents() / cents_per_point,
            _ => 0,
        }
    }
}

impl TryFrom<i64> for EarnRate {
    type Error = CoreError;

    fn try_from(base_units_per_point: i64) -> CoreResult<Self> {
        EarnRate::new(base_units_per_point)
    }
}

impl From<EarnRate> for i64 {
    fn from(rate: EarnRate) -> i64 {
        rate.base_units_per_point
    }
}

impl Default for EarnRate {
    fn default() -> Self {
        EarnRate {
            base_units_per_point: DEFAULT_BASE_UNITS_PER_POINT,
        }
    }
}

/// Computes the points a visit of `amount` base units earns.
///
/// ## Errors
/// `InvalidAmount` when the amount is negative, zero (after rounding to the
/// cent), non-finite, or too large.
///
/// ## Example
/// ```rust
/// use tuzo_core::points::{compute_points_for_visit, EarnRate};
///
/// let rate = EarnRate::default();
/// assert_eq!(compute_points_for_visit(1000.0, rate).unwrap(), 10);
/// assert!(compute_points_for_visit(0.0, rate).is_err());
/// ```
pub fn compute_points_for_visit(amount: f64, rate: EarnRate) -> CoreResult<i64> {
    let amount = normalize_visit_amount(amount)?;
    Ok(rate.points_for(amount))
}

/// Validates and normalises a visit amount into Money.
///
/// Shared by [`compute_points_for_visit`] and the ledger so that both apply
/// exactly the same acceptance rules.
pub fn normalize_visit_amount(amount: f64) -> CoreResult<Money> {
    let money = Money::try_from_major(amount)?;

    if !money.is_positive() {
        return Err(CoreError::invalid_amount("visit amount must be greater than zero"));
    }

    Ok(money)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_scenario() {
        assert_eq!(compute_points_for_visit(1000.0, EarnRate::default()).unwrap(), 10);
    }

    #[test]
    fn test_floor_behaviour() {
        let rate = EarnRate::default();
        assert_eq!(compute_points_for_visit(99.99, rate).unwrap(), 0);
        assert_eq!(compute_points_for_visit(100.0, rate).unwrap(), 1);
        assert_eq!(compute_points_for_visit(199.99, rate).unwrap(), 1);
        assert_eq!(compute_points_for_visit(250.0, rate).unwrap(), 2);
    }

    #[test]
    fn test_custom_rate() {
        let rate = EarnRate::new(1).unwrap();
        assert_eq!(compute_points_for_visit(42.7, rate).unwrap(), 42);
        assert!(EarnRate::new(0).is_err());
        assert!(EarnRate::new(-5).is_err());
    }

    #[test]
    fn test_oversized_rate_rejected() {
        assert!(EarnRate::new(MAX_BASE_UNITS_PER_POINT).is_ok());
        for too_big in [MAX_BASE_UNITS_PER_POINT + 1, i64::MAX / 100 + 1, i64::MAX] {
            assert!(
                matches!(EarnRate::new(too_big), Err(CoreError::InvalidRate { .. })),
                "rate {too_big}"
            );
        }
    }

    #[test]
    fn test_steepest_rate_earns_without_overflow() {
        let rate = EarnRate::new(MAX_BASE_UNITS_PER_POINT).unwrap();
        let largest = Money::try_from_major(crate::money::MAX_MAJOR_AMOUNT).unwrap();

        assert_eq!(rate.points_for(largest), 1);
        assert_eq!(compute_points_for_visit(1.0, rate).unwrap(), 0);
    }

    #[test]
    fn test_rejects_invalid_amounts() {
        let rate = EarnRate::default();
        for bad in [0.0, 0.001, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(
                matches!(
                    compute_points_for_visit(bad, rate),
                    Err(CoreError::InvalidAmount { .. })
                ),
                "expected InvalidAmount for {bad}"
            );
        }
    }

    #[test]
    fn test_deterministic_and_monotonic() {
        let rate = EarnRate::new(7).unwrap();
        let mut previous = 0;
        let mut amount = 0.01;

        while amount < 5000.0 {
            let points = compute_points_for_visit(amount, rate).unwrap();
            assert_eq!(points, compute_points_for_visit(amount, rate).unwrap());
            assert!(points >= previous, "points decreased at {amount}");
            previous = points;
            amount += 3.37;
        }
    }
}

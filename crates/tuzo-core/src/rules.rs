//! # Loyalty Rules
//!
//! One place for every business constant: earn rate, referral bonuses and
//! the display conversion. Loaded from the `[rules]` config section; the
//! defaults come from the crate-level constants.

use serde::{Deserialize, Serialize};

use crate::currency::DisplayCurrency;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::points::{compute_points_for_visit, EarnRate};
use crate::{
    DEFAULT_BASE_CURRENCY, DEFAULT_DISPLAY_CURRENCY, DEFAULT_DISPLAY_RATE,
    DEFAULT_POINT_DISPLAY_VALUE, DEFAULT_REFEREE_BONUS_POINTS, DEFAULT_REFERRER_BONUS_POINTS,
};

/// Loyalty programme configuration.
///
/// ## Example Config
/// ```toml
/// [rules]
/// base_currency = "USD"
/// display_currency = "KES"
/// display_rate = 129.5
/// earn_rate = 100
/// referrer_bonus_points = 30
/// referee_bonus_points = 15
/// point_display_value = 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltyRules {
    /// Currency all stored amounts are in.
    pub base_currency: String,

    /// Currency amounts are shown in.
    pub display_currency: String,

    /// Display units per base unit.
    pub display_rate: f64,

    /// Base units spent per point earned.
    pub earn_rate: EarnRate,

    /// Points for the owner of a redeemed code.
    pub referrer_bonus_points: i64,

    /// Points for the newly referred customer.
    pub referee_bonus_points: i64,

    /// Display-currency value of one point.
    pub point_display_value: f64,
}

impl Default for LoyaltyRules {
    fn default() -> Self {
        LoyaltyRules {
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            display_currency: DEFAULT_DISPLAY_CURRENCY.to_string(),
            display_rate: DEFAULT_DISPLAY_RATE,
            earn_rate: EarnRate::default(),
            referrer_bonus_points: DEFAULT_REFERRER_BONUS_POINTS,
            referee_bonus_points: DEFAULT_REFEREE_BONUS_POINTS,
            point_display_value: DEFAULT_POINT_DISPLAY_VALUE,
        }
    }
}

impl LoyaltyRules {
    /// Checks that every constant is usable.
    pub fn validate(&self) -> CoreResult<()> {
        DisplayCurrency::new(self.display_currency.clone(), self.display_rate)?;
        EarnRate::new(self.earn_rate.base_units_per_point())?;

        if self.referrer_bonus_points < 0 || self.referee_bonus_points < 0 {
            return Err(CoreError::InvalidRate {
                reason: "referral bonuses must not be negative".to_string(),
            });
        }

        if !self.point_display_value.is_finite() || self.point_display_value < 0.0 {
            return Err(CoreError::InvalidRate {
                reason: "point display value must be a non-negative finite number".to_string(),
            });
        }

        Ok(())
    }

    /// The configured display currency.
    pub fn display(&self) -> CoreResult<DisplayCurrency> {
        DisplayCurrency::new(self.display_currency.clone(), self.display_rate)
    }

    /// Points earned by a visit of `amount` base units.
    pub fn points_for_visit(&self, amount: f64) -> CoreResult<i64> {
        compute_points_for_visit(amount, self.earn_rate)
    }

    /// Renders a base-currency amount, e.g. `"KES 12,950"`.
    pub fn render_money(&self, amount: Money) -> CoreResult<String> {
        self.display()?.render(amount)
    }

    /// Renders what a point balance is worth, e.g. `"KES 45"`.
    pub fn render_points_value(&self, points: i64) -> CoreResult<String> {
        if points < 0 {
            return Err(CoreError::invalid_amount("point balance must not be negative"));
        }
        self.display()?
            .render_display(points as f64 * self.point_display_value)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let rules = LoyaltyRules::default();
        assert!(rules.validate().is_ok());
        assert_eq!(rules.referrer_bonus_points, 30);
        assert_eq!(rules.referee_bonus_points, 15);
        assert_eq!(rules.points_for_visit(1000.0).unwrap(), 10);
    }

    #[test]
    fn test_rendering() {
        let rules = LoyaltyRules::default();
        assert_eq!(
            rules.render_money(Money::from_cents(10_000)).unwrap(),
            "KES 12,950"
        );
        assert_eq!(rules.render_points_value(45).unwrap(), "KES 45");
        assert!(rules.render_points_value(-1).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_constants() {
        let mut rules = LoyaltyRules::default();
        rules.display_rate = 0.0;
        assert!(rules.validate().is_err());

        let mut rules = LoyaltyRules::default();
        rules.referee_bonus_points = -1;
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let rules: LoyaltyRules =
            serde_json::from_str(r#"{ "display_rate": 130.0, "earn_rate": 50 }"#).unwrap();
        assert_eq!(rules.display_rate, 130.0);
        assert_eq!(rules.earn_rate.base_units_per_point(), 50);
        assert_eq!(rules.display_currency, "KES");
        assert_eq!(rules.referrer_bonus_points, 30);
    }

    #[test]
    fn test_out_of_range_earn_rate_fails_to_parse() {
        let huge = format!(r#"{{ "earn_rate": {} }}"#, i64::MAX);
        assert!(serde_json::from_str::<LoyaltyRules>(&huge).is_err());
        assert!(serde_json::from_str::<LoyaltyRules>(r#"{ "earn_rate": 0 }"#).is_err());
    }
}

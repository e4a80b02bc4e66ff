//! # Currency Conversion
//!
//! Converts base-currency amounts into the display currency and renders them
//! the way the dashboard shows money: grouped thousands, no decimals.
//!
//! ## Conversion Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  base amount (USD)   rate (KES per USD)     display amount (KES)        │
//! │        100       ×        129.50        =        12950.0                │
//! │                                                     │                   │
//! │                                                     ▼                   │
//! │                                           format_display → "12,950"     │
//! │                                                     │                   │
//! │                                                     ▼                   │
//! │                                  DisplayCurrency::render → "KES 12,950" │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The rate is a configured constant (see [`crate::rules::LoyaltyRules`]);
//! there is no live feed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Largest whole display amount `format_display` will render.
const MAX_DISPLAY_AMOUNT: f64 = 9_000_000_000_000_000.0;

/// Converts a base-currency amount to the display currency.
///
/// ## Errors
/// - `InvalidAmount` if `base_amount` is negative or non-finite
/// - `InvalidRate` if `rate` is not a positive finite number
///
/// ## Example
/// ```rust
/// use tuzo_core::currency::to_display_amount;
///
/// assert_eq!(to_display_amount(100.0, 129.5).unwrap(), 12950.0);
/// assert!(to_display_amount(-1.0, 129.5).is_err());
/// ```
pub fn to_display_amount(base_amount: f64, rate: f64) -> CoreResult<f64> {
    check_amount(base_amount)?;
    check_rate(rate)?;

    Ok(base_amount * rate)
}

/// Renders a display amount with comma grouping and zero decimal places.
///
/// Rounds half away from zero (`1234.5` → `"1,235"`).
///
/// ## Example
/// ```rust
/// use tuzo_core::currency::format_display;
///
/// assert_eq!(format_display(12950.0).unwrap(), "12,950");
/// assert_eq!(format_display(999.4).unwrap(), "999");
/// ```
pub fn format_display(display_amount: f64) -> CoreResult<String> {
    check_amount(display_amount)?;

    let rounded = display_amount.round();
    if rounded > MAX_DISPLAY_AMOUNT {
        return Err(CoreError::invalid_amount("display amount is too large to format"));
    }

    Ok(group_thousands(rounded as u64))
}

/// Inserts a comma every three digits from the right.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}

fn check_amount(amount: f64) -> CoreResult<()> {
    if !amount.is_finite() {
        return Err(CoreError::invalid_amount("amount must be a finite number"));
    }
    if amount < 0.0 {
        return Err(CoreError::invalid_amount("amount must not be negative"));
    }
    Ok(())
}

fn check_rate(rate: f64) -> CoreResult<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(CoreError::InvalidRate {
            reason: format!("conversion rate must be a positive finite number, got {rate}"),
        });
    }
    Ok(())
}

// =============================================================================
// Display Currency
// =============================================================================

/// A display currency: ISO code plus its fixed rate against the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DisplayCurrency {
    /// ISO code shown as prefix, e.g. "KES".
    pub code: String,

    /// Display units per base unit.
    pub rate: f64,
}

impl DisplayCurrency {
    /// Creates a display currency after checking the rate.
    pub fn new(code: impl Into<String>, rate: f64) -> CoreResult<Self> {
        check_rate(rate)?;
        Ok(DisplayCurrency {
            code: code.into(),
            rate,
        })
    }

    /// Converts base Money into the display amount.
    pub fn convert(&self, amount: Money) -> CoreResult<f64> {
        to_display_amount(amount.to_major_f64(), self.rate)
    }

    /// Renders base Money as `"<CODE> <grouped amount>"`.
    ///
    /// ## Example
    /// ```rust
    /// use tuzo_core::currency::DisplayCurrency;
    /// use tuzo_core::Money;
    ///
    /// let kes = DisplayCurrency::new("KES", 129.5).unwrap();
    /// assert_eq!(kes.render(Money::from_cents(10_000)).unwrap(), "KES 12,950");
    /// ```
    pub fn render(&self, amount: Money) -> CoreResult<String> {
        let shown = format_display(self.convert(amount)?)?;
        Ok(format!("{} {}", self.code, shown))
    }

    /// Renders an amount that is already in display units.
    pub fn render_display(&self, display_amount: f64) -> CoreResult<String> {
        Ok(format!("{} {}", self.code, format_display(display_amount)?))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hundred_base_units_in_kes() {
        let shown = format_display(to_display_amount(100.0, 129.5).unwrap()).unwrap();
        assert_eq!(shown, "12,950");
    }

    #[test]
    fn test_to_display_amount_rejects_bad_input() {
        assert!(matches!(
            to_display_amount(-5.0, 129.5),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!(matches!(
            to_display_amount(f64::NAN, 129.5),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!(matches!(
            to_display_amount(5.0, 0.0),
            Err(CoreError::InvalidRate { .. })
        ));
        assert!(to_display_amount(0.0, 129.5).is_ok());
    }

    #[test]
    fn test_format_display() {
        assert_eq!(format_display(0.0).unwrap(), "0");
        assert_eq!(format_display(999.0).unwrap(), "999");
        assert_eq!(format_display(1000.0).unwrap(), "1,000");
        assert_eq!(format_display(1234.5).unwrap(), "1,235");
        assert_eq!(format_display(1_234_567.2).unwrap(), "1,234,567");

        assert!(format_display(-1.0).is_err());
        assert!(format_display(f64::INFINITY).is_err());
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(1), "1");
        assert_eq!(group_thousands(12), "12");
        assert_eq!(group_thousands(123_456), "123,456");
        assert_eq!(group_thousands(1_000_000), "1,000,000");
    }

    #[test]
    fn test_render() {
        let kes = DisplayCurrency::new("KES", 129.5).unwrap();
        assert_eq!(kes.render(Money::from_cents(100_000)).unwrap(), "KES 129,500");
        assert_eq!(kes.render_display(30.0).unwrap(), "KES 30");
        assert!(kes.render(Money::from_cents(-1)).is_err());
        assert!(DisplayCurrency::new("KES", f64::NAN).is_err());
    }
}

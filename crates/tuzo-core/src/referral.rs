//! # Referral Rules
//!
//! Code format, code normalisation, and the ordered redemption checks.
//!
//! ## Redemption Checks (in order)
//! ```text
//! redeem("abc123", D)
//!      │
//!      ├── 1. code resolves?          no → InvalidCode      (ledger lookup)
//!      ├── 2. owner != D?             no → SelfReferral     (this module)
//!      ├── 3. D never referred?       no → AlreadyReferred  (this module +
//!      │                                   UNIQUE index on referrals)
//!      ▼
//! award: owner +referrer_bonus, D +referee_bonus, used_count + 1
//! ```

use crate::error::{CoreError, CoreResult};
use crate::rules::LoyaltyRules;
use crate::REFERRAL_CODE_LEN;

/// Symbols used in generated codes. No 0/O or 1/I so codes read cleanly
/// over the phone. 32 symbols, so `byte % 32` is unbiased.
pub const CODE_ALPHABET: &[u8; 32] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Shortest code accepted on input.
const MIN_INPUT_LEN: usize = 4;

/// Longest code accepted on input.
const MAX_INPUT_LEN: usize = 16;

/// Builds a referral code from random bytes.
///
/// The caller supplies the entropy (tuzo-db uses UUID v4 bytes) so this
/// stays a pure function.
///
/// ## Example
/// ```rust
/// use tuzo_core::referral::code_from_entropy;
///
/// let code = code_from_entropy(&[0, 1, 2, 31, 32, 255]);
/// assert_eq!(code, "234Z2Z");
/// ```
pub fn code_from_entropy(entropy: &[u8]) -> String {
    entropy
        .iter()
        .take(REFERRAL_CODE_LEN)
        .map(|b| CODE_ALPHABET[(*b as usize) % CODE_ALPHABET.len()] as char)
        .collect()
}

/// Normalises user input into the stored code form.
///
/// Trims whitespace and upper-cases. Input that cannot be a code at all
/// fails with `InvalidCode`, same as a code that does not exist.
pub fn normalize_code(input: &str) -> CoreResult<String> {
    let code = input.trim().to_ascii_uppercase();

    let well_formed = (MIN_INPUT_LEN..=MAX_INPUT_LEN).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric());

    if !well_formed {
        return Err(CoreError::InvalidCode { code });
    }

    Ok(code)
}

/// Applies the self-referral and already-referred checks once the code owner
/// is known.
///
/// `already_referred` is the result of looking up a prior Referral row for
/// the referred customer. The storage layer enforces the same rule with a
/// unique index, this check only gives the common case a clean error.
pub fn check_redemption(
    referrer_customer_id: &str,
    referred_customer_id: &str,
    already_referred: bool,
) -> CoreResult<()> {
    if referrer_customer_id == referred_customer_id {
        return Err(CoreError::SelfReferral {
            customer_id: referred_customer_id.to_string(),
        });
    }

    if already_referred {
        return Err(CoreError::AlreadyReferred {
            customer_id: referred_customer_id.to_string(),
        });
    }

    Ok(())
}

/// Points each side of a redemption receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralAward {
    pub referrer_points: i64,
    pub referee_points: i64,
}

impl ReferralAward {
    /// The award the configured rules grant.
    pub fn from_rules(rules: &LoyaltyRules) -> Self {
        ReferralAward {
            referrer_points: rules.referrer_bonus_points,
            referee_points: rules.referee_bonus_points,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        let code = code_from_entropy(&[7u8; 16]);
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_code_never_contains_ambiguous_symbols() {
        let entropy: Vec<u8> = (0..=255).collect();
        for chunk in entropy.chunks(REFERRAL_CODE_LEN) {
            let code = code_from_entropy(chunk);
            assert!(!code.contains(['0', 'O', '1', 'I']), "{code}");
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  abc123 ").unwrap(), "ABC123");
        assert!(matches!(
            normalize_code(""),
            Err(CoreError::InvalidCode { .. })
        ));
        assert!(normalize_code("AB-123").is_err());
        assert!(normalize_code(&"A".repeat(40)).is_err());
    }

    #[test]
    fn test_check_redemption_order() {
        // Self referral wins over already-referred
        assert!(matches!(
            check_redemption("a", "a", true),
            Err(CoreError::SelfReferral { .. })
        ));
        assert!(matches!(
            check_redemption("a", "d", true),
            Err(CoreError::AlreadyReferred { .. })
        ));
        assert!(check_redemption("a", "d", false).is_ok());
    }

    #[test]
    fn test_award_from_rules() {
        let award = ReferralAward::from_rules(&LoyaltyRules::default());
        assert_eq!(award.referrer_points, 30);
        assert_eq!(award.referee_points, 15);
    }
}

//! # Validation Module
//!
//! Input validation for Tuzo requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (tuzo-api)                                      │
//! │  ├── Type validation (JSON deserialization)                            │
//! │  └── THIS MODULE: field rules, phone normalisation                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Ledger rules (points, referral)                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (points >= 0, ...)                              │
//! │  ├── UNIQUE constraints (phone per business, code, referred)           │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tuzo_core::validation::{normalize_phone, validate_name};
//!
//! assert_eq!(normalize_phone("+254 712-345 678").unwrap(), "+254712345678");
//! assert!(validate_name("name", "Mama Mboga Grocers").is_ok());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted display name.
pub const MAX_NAME_LEN: usize = 100;

/// Longest accepted street address.
pub const MAX_ADDRESS_LEN: usize = 200;

/// Name stored for customers who check in without giving one.
pub const DEFAULT_CUSTOMER_NAME: &str = "Guest";

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (business, owner, customer).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 100 characters
///
/// ## Returns
/// The trimmed name.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates an optional address. Blank input becomes None.
pub fn validate_address(address: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(None);
    };

    if address.chars().count() > MAX_ADDRESS_LEN {
        return Err(ValidationError::TooLong {
            field: "address".to_string(),
            max: MAX_ADDRESS_LEN,
        });
    }

    Ok(Some(address.to_string()))
}

/// Normalises a phone number into its stored form.
///
/// ## Rules
/// - Spaces, dashes, dots and parentheses are removed
/// - One optional leading `+`
/// - 7 to 15 digits (E.164 upper bound)
///
/// ## Example
/// ```rust
/// use tuzo_core::validation::normalize_phone;
///
/// assert_eq!(normalize_phone("(0712) 345-678").unwrap(), "0712345678");
/// assert!(normalize_phone("12ab").is_err());
/// ```
pub fn normalize_phone(phone: &str) -> ValidationResult<String> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    let (plus, rest) = match phone.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", phone),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => {
                return Err(ValidationError::InvalidFormat {
                    field: "phone".to_string(),
                    reason: "must contain only digits, spaces, dashes and a leading +"
                        .to_string(),
                })
            }
        }
    }

    if !(7..=15).contains(&digits.len()) {
        return Err(ValidationError::OutOfRange {
            field: "phone digits".to_string(),
            min: 7,
            max: 15,
        });
    }

    Ok(format!("{plus}{digits}"))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "  Kahawa House ").unwrap(), "Kahawa House");
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"A".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_address() {
        assert_eq!(validate_address(None).unwrap(), None);
        assert_eq!(validate_address(Some("  ")).unwrap(), None);
        assert_eq!(
            validate_address(Some(" Moi Avenue ")).unwrap(),
            Some("Moi Avenue".to_string())
        );
        assert!(validate_address(Some(&"x".repeat(201))).is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+254 712 345 678").unwrap(), "+254712345678");
        assert_eq!(normalize_phone("0712-345-678").unwrap(), "0712345678");

        assert!(normalize_phone("").is_err());
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("+").is_err());
        assert!(normalize_phone("07123x5678").is_err());
        assert!(normalize_phone("++254712345678").is_err());
        assert!(normalize_phone(&"1".repeat(16)).is_err());
    }
}

//! # Error Types
//!
//! Domain-specific error types for tuzo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tuzo-core errors (this file)                                          │
//! │  ├── CoreError        - Rule violations (amount, code, referral)       │
//! │  └── ValidationError  - Input field failures                           │
//! │                                                                         │
//! │  tuzo-db errors (separate crate)                                       │
//! │  ├── DbError          - Storage failures (conflict, timeout, ...)      │
//! │  └── LedgerError      - CoreError | DbError, classified by kind        │
//! │                                                                         │
//! │  tuzo-api errors                                                       │
//! │  └── ApiError         - What HTTP callers see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → ApiError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is terminal for a request: callers surface it as-is
//! and never retry it.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Loyalty rule violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Amount is negative, zero where zero is not allowed, non-finite, or
    /// too large to represent.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A configured conversion or earn rate is unusable.
    #[error("Invalid rate: {reason}")]
    InvalidRate { reason: String },

    /// Referral code does not resolve to an issued code.
    ///
    /// ## User Workflow
    /// ```text
    /// New customer types "ABC12X"
    ///      │
    ///      ▼
    /// redeem_referral("ABC12X", D)
    ///      │
    ///      ▼
    /// No referral_codes row → InvalidCode { code: "ABC12X" }
    ///      │
    ///      ▼
    /// UI shows: "Referral code ABC12X is not valid"
    /// ```
    #[error("Referral code {code} is not valid")]
    InvalidCode { code: String },

    /// Customer tried to redeem their own code.
    #[error("Customer {customer_id} cannot redeem their own referral code")]
    SelfReferral { customer_id: String },

    /// Customer has already been referred once.
    #[error("Customer {customer_id} has already been referred")]
    AlreadyReferred { customer_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidAmount error.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., bad phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidCode {
            code: "ABC123".to_string(),
        };
        assert_eq!(err.to_string(), "Referral code ABC123 is not valid");

        let err = CoreError::invalid_amount("must be finite");
        assert_eq!(err.to_string(), "Invalid amount: must be finite");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "phone".to_string(),
        };
        assert_eq!(err.to_string(), "phone is required");

        let err = ValidationError::TooLong {
            field: "name".to_string(),
            max: 100,
        };
        assert_eq!(err.to_string(), "name must be at most 100 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "phone".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}

//! # Domain Types
//!
//! Core domain types used throughout Tuzo.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Business     │ 1 │    Customer     │ 1 │      Visit      │       │
//! │  │  ─────────────  │──*│  ─────────────  │──*│  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name           │   │  phone (unique  │   │  amount_cents   │       │
//! │  │  contact phone  │   │   per business) │   │  points_earned  │       │
//! │  └─────────────────┘   │  points, visits │   │  (append-only)  │       │
//! │                        └────────┬────────┘   └─────────────────┘       │
//! │                                 │ 1                                     │
//! │                        ┌────────┴────────┐   ┌─────────────────┐       │
//! │                        │  ReferralCode   │ 1 │    Referral     │       │
//! │                        │  ─────────────  │──*│  ─────────────  │       │
//! │                        │  code (global   │   │  referrer → D   │       │
//! │                        │   unique)       │   │  D unique ever  │       │
//! │                        │  used_count     │   │  (append-only)  │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A person visiting two businesses has two independent Customer rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Business
// =============================================================================

/// A registered business running a loyalty programme.
///
/// Only `phone` and `address` change after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub owner_name: String,
    /// Contact phone (mutable).
    pub phone: String,
    /// Street address (mutable, optional).
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

/// A customer of one business, keyed by (business, phone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub business_id: String,
    /// Normalised phone number, unique within the business.
    pub phone_number: String,
    pub name: String,
    /// Point balance, never negative.
    pub points: i64,
    pub total_visits: i64,
    /// Lifetime spend in base-currency cents.
    pub total_spent_cents: i64,
    #[ts(as = "Option<String>")]
    pub last_visit: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Lifetime spend as Money.
    #[inline]
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }
}

// =============================================================================
// Visit
// =============================================================================

/// One recorded purchase visit. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Visit {
    pub id: String,
    pub business_id: String,
    pub customer_id: String,
    /// Purchase amount in base-currency cents.
    pub amount_cents: i64,
    /// Derived from the amount by the accrual rule.
    pub points_earned: i64,
    #[ts(as = "String")]
    pub visit_date: DateTime<Utc>,
}

// =============================================================================
// Referral Code
// =============================================================================

/// The single referral code issued to a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReferralCode {
    pub id: String,
    /// The referrer.
    pub customer_id: String,
    /// Unique across all businesses.
    pub code: String,
    /// Equals the number of Referral rows using this code.
    pub used_count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Referral
// =============================================================================

/// One successful redemption. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Referral {
    pub id: String,
    pub referrer_customer_id: String,
    /// Appears in at most one Referral row, ever.
    pub referred_customer_id: String,
    /// Code presented at redemption.
    pub referral_code: String,
    /// Points credited to the referrer.
    pub referrer_points: i64,
    /// Points credited to the referred customer.
    pub referee_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Read Models
// =============================================================================

/// A referral made by a customer, as listed in their summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReferralMade {
    pub referral_id: String,
    pub referred_customer_id: String,
    pub referred_name: String,
    pub points_awarded: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Everything a customer sees on their "refer a friend" screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReferralSummary {
    pub customer_id: String,
    /// None until a code has been issued.
    pub code: Option<String>,
    pub used_count: i64,
    pub referrals_made: Vec<ReferralMade>,
    /// Sum of referrer bonuses earned through this code.
    pub total_points_earned: i64,
}

/// Result of a check-in at the till.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VisitReceipt {
    pub visit: Visit,
    /// Customer state after the visit.
    pub customer: Customer,
    pub referral_code: String,
    /// True when this check-in created the customer.
    pub is_new_customer: bool,
}

/// Programme totals for a business dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BusinessStats {
    pub business_id: String,
    pub customer_count: i64,
    pub visit_count: i64,
    pub total_spent_cents: i64,
    /// Rendered in the display currency, e.g. "KES 12,950".
    pub total_spent_display: String,
    /// Points from visits plus both sides of every referral.
    pub points_issued: i64,
    pub points_issued_display: String,
    pub referral_count: i64,
}

//! # Ledger Events
//!
//! Emitted after a ledger transaction commits, for notification dispatch.
//! A rolled-back operation never emits.

use serde::Serialize;

/// Capacity of the event channel. Slow subscribers lag and skip ahead.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something a notifier might tell a customer about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Points were earned for a visit.
    VisitRecorded {
        business_id: String,
        customer_id: String,
        visit_id: String,
        points_earned: i64,
    },

    /// Both sides of a referral were credited.
    ReferralAwarded {
        referral_id: String,
        referrer_customer_id: String,
        referred_customer_id: String,
        referrer_points: i64,
        referee_points: i64,
    },
}

impl LedgerEvent {
    /// Customers whose balance changed.
    pub fn affected_customers(&self) -> Vec<&str> {
        match self {
            LedgerEvent::VisitRecorded { customer_id, .. } => vec![customer_id.as_str()],
            LedgerEvent::ReferralAwarded {
                referrer_customer_id,
                referred_customer_id,
                ..
            } => vec![referrer_customer_id.as_str(), referred_customer_id.as_str()],
        }
    }
}

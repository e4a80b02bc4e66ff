//! # Principal
//!
//! Who is making a request, resolved once when the request arrives.
//!
//! The identity provider authenticates the caller and forwards one of:
//! - `business:<business-id>`
//! - `customer:<customer-id>`
//! - nothing (anonymous → `Unassigned`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::Customer;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Principal {
    /// Owner of a registered business.
    Business(String),
    /// A customer of some business.
    Customer(String),
    /// Signed in but not yet linked to a business or customer.
    Unassigned,
}

impl Principal {
    /// The business this principal acts for, if any.
    pub fn business_id(&self) -> Option<&str> {
        match self {
            Principal::Business(id) => Some(id),
            _ => None,
        }
    }

    /// True if the principal owns `business_id`.
    pub fn acts_for_business(&self, business_id: &str) -> bool {
        self.business_id() == Some(business_id)
    }

    /// True if the principal may read or act on `customer`.
    ///
    /// Customers see themselves; businesses see their own customers.
    pub fn may_access_customer(&self, customer: &Customer) -> bool {
        match self {
            Principal::Customer(id) => *id == customer.id,
            Principal::Business(id) => *id == customer.business_id,
            Principal::Unassigned => false,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Business(id) => write!(f, "business:{id}"),
            Principal::Customer(id) => write!(f, "customer:{id}"),
            Principal::Unassigned => write!(f, "unassigned"),
        }
    }
}

impl FromStr for Principal {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("unassigned") {
            return Ok(Principal::Unassigned);
        }

        let invalid = || ValidationError::InvalidFormat {
            field: "principal".to_string(),
            reason: "expected business:<id>, customer:<id> or unassigned".to_string(),
        };

        let (role, id) = s.split_once(':').ok_or_else(invalid)?;
        let id = id.trim();
        if id.is_empty() {
            return Err(invalid());
        }

        match role.trim().to_ascii_lowercase().as_str() {
            "business" => Ok(Principal::Business(id.to_string())),
            "customer" => Ok(Principal::Customer(id.to_string())),
            _ => Err(invalid()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn customer(id: &str, business_id: &str) -> Customer {
        Customer {
            id: id.to_string(),
            business_id: business_id.to_string(),
            phone_number: "+254700000001".to_string(),
            name: "Wanjiku".to_string(),
            points: 0,
            total_visits: 0,
            total_spent_cents: 0,
            last_visit: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "business:b-1".parse::<Principal>().unwrap(),
            Principal::Business("b-1".to_string())
        );
        assert_eq!(
            "Customer: c-9".parse::<Principal>().unwrap(),
            Principal::Customer("c-9".to_string())
        );
        assert_eq!("".parse::<Principal>().unwrap(), Principal::Unassigned);
        assert!("admin:x".parse::<Principal>().is_err());
        assert!("business:".parse::<Principal>().is_err());
        assert!("business".parse::<Principal>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let p = Principal::Business("b-1".to_string());
        assert_eq!(p.to_string().parse::<Principal>().unwrap(), p);
    }

    #[test]
    fn test_customer_access() {
        let c = customer("c-1", "b-1");
        assert!(Principal::Customer("c-1".into()).may_access_customer(&c));
        assert!(Principal::Business("b-1".into()).may_access_customer(&c));
        assert!(!Principal::Business("b-2".into()).may_access_customer(&c));
        assert!(!Principal::Customer("c-2".into()).may_access_customer(&c));
        assert!(!Principal::Unassigned.may_access_customer(&c));
    }
}

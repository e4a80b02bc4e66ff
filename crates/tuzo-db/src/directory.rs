//! # Directory
//!
//! Business and customer lookup with creation on first contact.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  find_business(id)                 → Option<Business>                  │
//! │  find_customer(business, phone)    → Option<Customer>                  │
//! │  create_customer(business, phone, name)                                │
//! │       └── UNIQUE(business_id, phone_number) → Conflict on duplicate    │
//! │  find_or_create_customer(business, phone, name)                        │
//! │       └── lost the insert race? re-read the winner's row               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Absence is `Ok(None)`, never an error. Phone numbers are normalised
//! before every lookup so "0712 345 678" and "0712-345-678" are one customer.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, LedgerError, LedgerResult};
use crate::repository::business::BusinessRepository;
use crate::repository::customer::CustomerRepository;
use tuzo_core::validation::{
    normalize_phone, validate_address, validate_name, DEFAULT_CUSTOMER_NAME,
};
use tuzo_core::{Business, Customer};

/// Registration details for a new business.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBusiness {
    pub name: String,
    pub owner_name: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Entity lookup used by the ledger and the API.
#[derive(Debug, Clone)]
pub struct Directory {
    businesses: BusinessRepository,
    customers: CustomerRepository,
}

impl Directory {
    /// Creates a Directory over the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Directory {
            businesses: BusinessRepository::new(pool.clone()),
            customers: CustomerRepository::new(pool),
        }
    }

    // =========================================================================
    // Businesses
    // =========================================================================

    /// Finds a business by ID.
    pub async fn find_business(&self, id: &str) -> LedgerResult<Option<Business>> {
        Ok(self.businesses.get_by_id(id).await?)
    }

    /// Registers a new business.
    pub async fn register_business(&self, input: NewBusiness) -> LedgerResult<Business> {
        let now = Utc::now();
        let business = Business {
            id: Uuid::new_v4().to_string(),
            name: validate_name("name", &input.name)?,
            owner_name: validate_name("owner_name", &input.owner_name)?,
            phone: normalize_phone(&input.phone)?,
            address: validate_address(input.address.as_deref())?,
            created_at: now,
            updated_at: now,
        };

        self.businesses.insert(&business).await?;

        info!(business_id = %business.id, name = %business.name, "Business registered");
        Ok(business)
    }

    /// Replaces a business's contact phone and address.
    ///
    /// Name and owner are fixed at registration.
    pub async fn update_business_contact(
        &self,
        id: &str,
        phone: &str,
        address: Option<&str>,
    ) -> LedgerResult<Business> {
        let phone = normalize_phone(phone)?;
        let address = validate_address(address)?;

        let business = self
            .businesses
            .update_contact(id, &phone, address.as_deref())
            .await?;

        info!(business_id = %id, "Business contact updated");
        Ok(business)
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Gets a customer by ID.
    pub async fn get_customer(&self, id: &str) -> LedgerResult<Option<Customer>> {
        Ok(self.customers.get_by_id(id).await?)
    }

    /// Finds a business's customer by phone number.
    pub async fn find_customer(
        &self,
        business_id: &str,
        phone: &str,
    ) -> LedgerResult<Option<Customer>> {
        let phone = normalize_phone(phone)?;
        Ok(self.customers.find_by_phone(business_id, &phone).await?)
    }

    /// Creates a customer with zero balances.
    ///
    /// ## Errors
    /// - `NotFound` if the business does not exist
    /// - `UniqueViolation` if the phone is already registered here
    pub async fn create_customer(
        &self,
        business_id: &str,
        phone: &str,
        name: &str,
    ) -> LedgerResult<Customer> {
        let phone_number = normalize_phone(phone)?;
        let name = validate_name("name", name)?;

        if self.businesses.get_by_id(business_id).await?.is_none() {
            return Err(DbError::not_found("Business", business_id).into());
        }

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            phone_number,
            name,
            points: 0,
            total_visits: 0,
            total_spent_cents: 0,
            last_visit: None,
            created_at: Utc::now(),
        };

        self.customers.insert(&customer).await?;

        info!(
            customer_id = %customer.id,
            business_id = %business_id,
            "Customer created"
        );
        Ok(customer)
    }

    /// Returns the customer for this phone, creating them on first contact.
    ///
    /// The flag is true when this call created the row. Two concurrent
    /// first contacts for one phone both get the same customer back.
    pub async fn find_or_create_customer(
        &self,
        business_id: &str,
        phone: &str,
        name: Option<&str>,
    ) -> LedgerResult<(Customer, bool)> {
        if let Some(existing) = self.find_customer(business_id, phone).await? {
            return Ok((existing, false));
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_CUSTOMER_NAME);

        match self.create_customer(business_id, phone, name).await {
            Ok(created) => Ok((created, true)),
            Err(LedgerError::Db(err)) if err.is_unique_on("customers.") => {
                debug!(business_id = %business_id, "Lost customer creation race, re-reading");
                let existing = self.find_customer(business_id, phone).await?;
                existing
                    .map(|c| (c, false))
                    .ok_or_else(|| LedgerError::Db(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Lists a business's customers, most recently seen first.
    pub async fn list_customers(
        &self,
        business_id: &str,
        limit: u32,
        offset: u32,
    ) -> LedgerResult<Vec<Customer>> {
        Ok(self
            .customers
            .list_for_business(business_id, limit, offset)
            .await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

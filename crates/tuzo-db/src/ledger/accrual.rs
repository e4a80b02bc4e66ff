//! # Points Accrual
//!
//! Turning purchases into points.
//!
//! ## record_visit Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  amount ── normalize_visit_amount ── earn_rate.points_for ── points     │
//! │                                                                         │
//! │  BEGIN IMMEDIATE                                                        │
//! │    business exists?               no → NotFound                        │
//! │    customer exists at business?   no → NotFound                        │
//! │    INSERT visits (amount, points)                                      │
//! │    UPDATE customers SET points += p, total_visits += 1,                │
//! │                         total_spent += amount, last_visit = now        │
//! │    (check_in only) referral code exists?  no → INSERT referral_codes   │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Invalid amounts fail before the transaction opens, so they never touch
//! storage. A check-in commits its visit and the customer's referral code
//! together: a receipt is either complete or nothing was recorded, so a
//! client that retries a failed check-in never double-counts the purchase.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{LedgerEvent, LoyaltyLedger};
use crate::error::{DbError, LedgerResult};
use crate::repository::business::{BusinessRepository, BusinessTotals};
use crate::repository::customer::CustomerRepository;
use crate::repository::visit::VisitRepository;
use tuzo_core::points::normalize_visit_amount;
use tuzo_core::{BusinessStats, Customer, Money, ReferralCode, Visit, VisitReceipt};

/// Default page size for visit history.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

impl LoyaltyLedger {
    /// Records a purchase visit and credits the earned points.
    ///
    /// ## Errors
    /// - `InvalidAmount` for zero, negative, non-finite or oversized amounts
    /// - `NotFound` if the business or customer is unknown, or the customer
    ///   belongs to another business
    pub async fn record_visit(
        &self,
        customer_id: &str,
        business_id: &str,
        amount: f64,
    ) -> LedgerResult<Visit> {
        let amount = normalize_visit_amount(amount)?;
        let points = self.rules.earn_rate.points_for(amount);

        let (visit, customer) = self
            .run_append("record_visit", move || {
                self.record_visit_once(customer_id, business_id, amount, points)
            })
            .await?;

        self.visit_recorded(&visit, &customer);
        Ok(visit)
    }

    /// Checks a customer in at the till by phone number.
    ///
    /// Creates the customer on first contact, then records the visit and
    /// makes sure the customer has a referral code in one transaction.
    ///
    /// Customer creation commits on its own: it is idempotent, and a retried
    /// check-in finds the same customer again.
    pub async fn check_in(
        &self,
        business_id: &str,
        phone: &str,
        name: Option<&str>,
        amount: f64,
    ) -> LedgerResult<VisitReceipt> {
        // Reject bad amounts before creating anyone
        let amount = normalize_visit_amount(amount)?;
        let points = self.rules.earn_rate.points_for(amount);

        let directory = &self.db.directory();
        let (customer, is_new_customer) = self
            .run("find_or_create_customer", move || {
                directory.find_or_create_customer(business_id, phone, name)
            })
            .await?;

        let customer_id = customer.id.as_str();

        let (visit, customer, code) = self
            .run_append("check_in", move || {
                self.check_in_once(customer_id, business_id, amount, points)
            })
            .await?;

        self.visit_recorded(&visit, &customer);

        Ok(VisitReceipt {
            visit,
            customer,
            referral_code: code.code,
            is_new_customer,
        })
    }

    /// A customer's visits, newest first.
    pub async fn visit_history(&self, customer_id: &str, limit: u32) -> LedgerResult<Vec<Visit>> {
        self.run("visit_history", move || self.visit_history_once(customer_id, limit))
            .await
    }

    /// Programme totals for a business, with display-currency strings.
    pub async fn business_stats(&self, business_id: &str) -> LedgerResult<BusinessStats> {
        let totals = self
            .run("business_stats", move || self.business_totals_once(business_id))
            .await?;

        let points_issued = totals.visit_points + totals.referral_points;

        Ok(BusinessStats {
            business_id: business_id.to_string(),
            customer_count: totals.customer_count,
            visit_count: totals.visit_count,
            total_spent_cents: totals.total_spent_cents,
            total_spent_display: self
                .rules
                .render_money(Money::from_cents(totals.total_spent_cents))?,
            points_issued,
            points_issued_display: self.rules.render_points_value(points_issued)?,
            referral_count: totals.referral_count,
        })
    }

    /// Logs and broadcasts a committed visit.
    fn visit_recorded(&self, visit: &Visit, customer: &Customer) {
        info!(
            visit_id = %visit.id,
            customer_id = %visit.customer_id,
            amount_cents = visit.amount_cents,
            points = visit.points_earned,
            balance = customer.points,
            "Visit recorded"
        );

        self.emit(LedgerEvent::VisitRecorded {
            business_id: visit.business_id.clone(),
            customer_id: visit.customer_id.clone(),
            visit_id: visit.id.clone(),
            points_earned: visit.points_earned,
        });
    }

    async fn visit_history_once(&self, customer_id: &str, limit: u32) -> LedgerResult<Vec<Visit>> {
        if self.db.customers().get_by_id(customer_id).await?.is_none() {
            return Err(DbError::not_found("Customer", customer_id).into());
        }
        Ok(self.db.visits().list_for_customer(customer_id, limit).await?)
    }

    async fn business_totals_once(&self, business_id: &str) -> LedgerResult<BusinessTotals> {
        let businesses = self.db.businesses();
        if businesses.get_by_id(business_id).await?.is_none() {
            return Err(DbError::not_found("Business", business_id).into());
        }
        Ok(businesses.totals(business_id).await?)
    }

    async fn record_visit_once(
        &self,
        customer_id: &str,
        business_id: &str,
        amount: Money,
        points: i64,
    ) -> LedgerResult<(Visit, Customer)> {
        let mut tx = self.db.begin_write().await?;
        let recorded =
            Self::append_visit_in(&mut tx, customer_id, business_id, amount, points).await?;
        tx.commit().await?;

        Ok(recorded)
    }

    async fn check_in_once(
        &self,
        customer_id: &str,
        business_id: &str,
        amount: Money,
        points: i64,
    ) -> LedgerResult<(Visit, Customer, ReferralCode)> {
        let mut tx = self.db.begin_write().await?;
        let (visit, customer) =
            Self::append_visit_in(&mut tx, customer_id, business_id, amount, points).await?;
        let code = Self::issue_code_in(&mut tx, customer_id).await?;
        tx.commit().await?;

        Ok((visit, customer, code))
    }

    /// Checks ownership, appends the visit and moves the customer's totals.
    ///
    /// Returns the visit and the customer as they will be committed.
    async fn append_visit_in(
        conn: &mut SqliteConnection,
        customer_id: &str,
        business_id: &str,
        amount: Money,
        points: i64,
    ) -> LedgerResult<(Visit, Customer)> {
        if BusinessRepository::find_in(conn, business_id)
            .await?
            .is_none()
        {
            return Err(DbError::not_found("Business", business_id).into());
        }

        let belongs = CustomerRepository::find_in(conn, customer_id)
            .await?
            .is_some_and(|c| c.business_id == business_id);
        if !belongs {
            return Err(DbError::not_found("Customer", customer_id).into());
        }

        let now = Utc::now();
        let visit = Visit {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            customer_id: customer_id.to_string(),
            amount_cents: amount.cents(),
            points_earned: points,
            visit_date: now,
        };

        VisitRepository::insert_in(conn, &visit).await?;
        CustomerRepository::apply_visit_in(conn, customer_id, points, amount.cents(), now).await?;

        let customer = CustomerRepository::find_in(conn, customer_id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", customer_id))?;

        Ok((visit, customer))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Customer Repository
//!
//! Database operations for customers and their running balances.
//!
//! Balances only move through [`CustomerRepository::apply_visit_in`] and
//! [`CustomerRepository::add_points_in`], both of which run inside a ledger
//! transaction alongside the visit or referral row that justifies them.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tuzo_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Looks up a customer on an existing connection or transaction.
    pub async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, business_id, phone_number, name, points, total_visits,
                   total_spent_cents, last_visit, created_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(customer)
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in(&mut conn, id).await
    }

    /// Gets a customer by business and normalised phone number.
    pub async fn find_by_phone(
        &self,
        business_id: &str,
        phone_number: &str,
    ) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, business_id, phone_number, name, points, total_visits,
                   total_spent_cents, last_visit, created_at
            FROM customers
            WHERE business_id = ?1 AND phone_number = ?2
            "#,
        )
        .bind(business_id)
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Lists a business's customers, most recently seen first.
    ///
    /// Customers who never visited sort last.
    pub async fn list_for_business(
        &self,
        business_id: &str,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, business_id, phone_number, name, points, total_visits,
                   total_spent_cents, last_visit, created_at
            FROM customers
            WHERE business_id = ?1
            ORDER BY last_visit IS NULL, last_visit DESC, created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(business_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a new customer.
    ///
    /// Fails with `UniqueViolation` if the phone number is already
    /// registered with this business.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(
            id = %customer.id,
            business_id = %customer.business_id,
            "Inserting customer"
        );

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, business_id, phone_number, name, points, total_visits,
                total_spent_cents, last_visit, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.business_id)
        .bind(&customer.phone_number)
        .bind(&customer.name)
        .bind(customer.points)
        .bind(customer.total_visits)
        .bind(customer.total_spent_cents)
        .bind(customer.last_visit)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Credits a visit to the customer's running totals.
    pub async fn apply_visit_in(
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
        amount_cents: i64,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET points = points + ?2,
                total_visits = total_visits + 1,
                total_spent_cents = total_spent_cents + ?3,
                last_visit = ?4
            WHERE id = ?1
            "#,
        )
        .bind(customer_id)
        .bind(points)
        .bind(amount_cents)
        .bind(at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        Ok(())
    }

    /// Adds points to a balance (referral bonuses).
    pub async fn add_points_in(
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE customers SET points = points + ?2 WHERE id = ?1")
            .bind(customer_id)
            .bind(points)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        Ok(())
    }
}

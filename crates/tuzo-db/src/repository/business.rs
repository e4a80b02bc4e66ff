//! # Business Repository
//!
//! Database operations for registered businesses and their dashboard totals.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tuzo_core::Business;

/// Raw programme totals for one business.
///
/// Display strings are added by the ledger, which owns the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::FromRow)]
pub struct BusinessTotals {
    pub customer_count: i64,
    pub visit_count: i64,
    pub total_spent_cents: i64,
    pub visit_points: i64,
    pub referral_count: i64,
    pub referral_points: i64,
}

/// Repository for business database operations.
#[derive(Debug, Clone)]
pub struct BusinessRepository {
    pool: SqlitePool,
}

impl BusinessRepository {
    /// Creates a new BusinessRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BusinessRepository { pool }
    }

    /// Looks up a business on an existing connection or transaction.
    pub async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Business>> {
        let business = sqlx::query_as::<_, Business>(
            r#"
            SELECT id, name, owner_name, phone, address, created_at, updated_at
            FROM businesses
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(business)
    }

    /// Gets a business by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Business>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in(&mut conn, id).await
    }

    /// Counts registered businesses.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM businesses")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Inserts a new business.
    pub async fn insert(&self, business: &Business) -> DbResult<()> {
        debug!(id = %business.id, name = %business.name, "Inserting business");

        sqlx::query(
            r#"
            INSERT INTO businesses (
                id, name, owner_name, phone, address, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&business.id)
        .bind(&business.name)
        .bind(&business.owner_name)
        .bind(&business.phone)
        .bind(&business.address)
        .bind(business.created_at)
        .bind(business.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replaces the mutable contact fields and returns the updated row.
    pub async fn update_contact(
        &self,
        id: &str,
        phone: &str,
        address: Option<&str>,
    ) -> DbResult<Business> {
        debug!(id = %id, "Updating business contact details");

        let result = sqlx::query(
            r#"
            UPDATE businesses
            SET phone = ?2, address = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(phone)
        .bind(address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Business", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Business", id))
    }

    /// Aggregates customers, visits and referrals for one business.
    ///
    /// A referral counts toward the business of the referred customer.
    pub async fn totals(&self, business_id: &str) -> DbResult<BusinessTotals> {
        let totals = sqlx::query_as::<_, BusinessTotals>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM customers WHERE business_id = ?1)
                    AS customer_count,
                (SELECT COUNT(*) FROM visits WHERE business_id = ?1)
                    AS visit_count,
                (SELECT COALESCE(SUM(amount_cents), 0) FROM visits WHERE business_id = ?1)
                    AS total_spent_cents,
                (SELECT COALESCE(SUM(points_earned), 0) FROM visits WHERE business_id = ?1)
                    AS visit_points,
                (SELECT COUNT(*)
                   FROM referrals r
                   JOIN customers c ON c.id = r.referred_customer_id
                  WHERE c.business_id = ?1)
                    AS referral_count,
                (SELECT COALESCE(SUM(r.referrer_points + r.referee_points), 0)
                   FROM referrals r
                   JOIN customers c ON c.id = r.referred_customer_id
                  WHERE c.business_id = ?1)
                    AS referral_points
            "#,
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }
}

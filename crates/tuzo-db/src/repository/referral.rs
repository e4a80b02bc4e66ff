//! # Referral Repository
//!
//! Referral codes and the append-only referral log.
//!
//! ## Uniqueness Guarantees (schema-level)
//! ```text
//! referral_codes.code                  UNIQUE  → one owner per code
//! referral_codes.customer_id           UNIQUE  → one code per customer
//! referrals.referred_customer_id       UNIQUE  → referred at most once
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tuzo_core::{Referral, ReferralCode, ReferralMade};

/// Repository for referral database operations.
#[derive(Debug, Clone)]
pub struct ReferralRepository {
    pool: SqlitePool,
}

impl ReferralRepository {
    /// Creates a new ReferralRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReferralRepository { pool }
    }

    // =========================================================================
    // Codes
    // =========================================================================

    /// Gets the code issued to a customer, if any.
    pub async fn code_for_customer(&self, customer_id: &str) -> DbResult<Option<ReferralCode>> {
        let mut conn = self.pool.acquire().await?;
        Self::code_for_customer_in(&mut conn, customer_id).await
    }

    /// Gets the code issued to a customer on an existing connection or
    /// transaction.
    pub async fn code_for_customer_in(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Option<ReferralCode>> {
        let code = sqlx::query_as::<_, ReferralCode>(
            r#"
            SELECT id, customer_id, code, used_count, created_at
            FROM referral_codes
            WHERE customer_id = ?1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;

        Ok(code)
    }

    /// Resolves a normalised code inside a ledger transaction.
    pub async fn find_code_in(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> DbResult<Option<ReferralCode>> {
        let code = sqlx::query_as::<_, ReferralCode>(
            r#"
            SELECT id, customer_id, code, used_count, created_at
            FROM referral_codes
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(conn)
        .await?;

        Ok(code)
    }

    /// Inserts a freshly generated code inside a ledger transaction.
    ///
    /// ## Errors
    /// - `UniqueViolation` on `referral_codes.code`: the code collided
    /// - `UniqueViolation` on `referral_codes.customer_id`: the customer
    ///   already has a code
    pub async fn insert_code_in(conn: &mut SqliteConnection, code: &ReferralCode) -> DbResult<()> {
        debug!(customer_id = %code.customer_id, code = %code.code, "Inserting referral code");

        sqlx::query(
            r#"
            INSERT INTO referral_codes (id, customer_id, code, used_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&code.id)
        .bind(&code.customer_id)
        .bind(&code.code)
        .bind(code.used_count)
        .bind(code.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Bumps a code's use counter inside a ledger transaction.
    pub async fn increment_used_in(conn: &mut SqliteConnection, code_id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE referral_codes SET used_count = used_count + 1 WHERE id = ?1")
                .bind(code_id)
                .execute(conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ReferralCode", code_id));
        }

        Ok(())
    }

    // =========================================================================
    // Referrals
    // =========================================================================

    /// True if the customer has ever been referred.
    pub async fn is_referred_in(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM referrals WHERE referred_customer_id = ?1)",
        )
        .bind(customer_id)
        .fetch_one(conn)
        .await?;

        Ok(exists != 0)
    }

    /// Appends a referral inside a ledger transaction.
    ///
    /// Fails with `UniqueViolation` on `referrals.referred_customer_id` if
    /// the customer was referred by a concurrent transaction.
    pub async fn insert_referral_in(
        conn: &mut SqliteConnection,
        referral: &Referral,
    ) -> DbResult<()> {
        debug!(
            id = %referral.id,
            referrer = %referral.referrer_customer_id,
            referred = %referral.referred_customer_id,
            "Inserting referral"
        );

        sqlx::query(
            r#"
            INSERT INTO referrals (
                id, referrer_customer_id, referred_customer_id, referral_code,
                referrer_points, referee_points, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&referral.id)
        .bind(&referral.referrer_customer_id)
        .bind(&referral.referred_customer_id)
        .bind(&referral.referral_code)
        .bind(referral.referrer_points)
        .bind(referral.referee_points)
        .bind(referral.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Referrals a customer has made, newest first.
    pub async fn referrals_made(&self, referrer_customer_id: &str) -> DbResult<Vec<ReferralMade>> {
        let made = sqlx::query_as::<_, ReferralMade>(
            r#"
            SELECT r.id AS referral_id,
                   r.referred_customer_id,
                   c.name AS referred_name,
                   r.referrer_points AS points_awarded,
                   r.created_at
            FROM referrals r
            JOIN customers c ON c.id = r.referred_customer_id
            WHERE r.referrer_customer_id = ?1
            ORDER BY r.created_at DESC, r.rowid DESC
            "#,
        )
        .bind(referrer_customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(made)
    }

    /// Number of referral rows recorded against a code.
    pub async fn count_for_code(&self, code: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referrals WHERE referral_code = ?1")
            .bind(code)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

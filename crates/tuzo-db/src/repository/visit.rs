//! # Visit Repository
//!
//! The append-only visit log. Rows are never updated or deleted; the
//! schema rejects both with a trigger.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tuzo_core::Visit;

/// Repository for visit database operations.
#[derive(Debug, Clone)]
pub struct VisitRepository {
    pool: SqlitePool,
}

impl VisitRepository {
    /// Creates a new VisitRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VisitRepository { pool }
    }

    /// Appends a visit inside a ledger transaction.
    pub async fn insert_in(conn: &mut SqliteConnection, visit: &Visit) -> DbResult<()> {
        debug!(
            id = %visit.id,
            customer_id = %visit.customer_id,
            amount_cents = visit.amount_cents,
            points = visit.points_earned,
            "Inserting visit"
        );

        sqlx::query(
            r#"
            INSERT INTO visits (
                id, business_id, customer_id, amount_cents, points_earned, visit_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&visit.id)
        .bind(&visit.business_id)
        .bind(&visit.customer_id)
        .bind(visit.amount_cents)
        .bind(visit.points_earned)
        .bind(visit.visit_date)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Lists a customer's visits, most recent first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(
            r#"
            SELECT id, business_id, customer_id, amount_cents, points_earned, visit_date
            FROM visits
            WHERE customer_id = ?1
            ORDER BY visit_date DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(visits)
    }

    /// Sum of points earned from visits, for reconciliation.
    pub async fn points_for_customer(&self, customer_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points_earned), 0) FROM visits WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

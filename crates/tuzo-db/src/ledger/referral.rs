//! # Referral Ledger
//!
//! Issuing codes and awarding both sides of a referral exactly once.
//!
//! ## redeem_referral Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  normalize_code(input)                   malformed → InvalidCode       │
//! │                                                                         │
//! │  BEGIN IMMEDIATE                                                        │
//! │    1. SELECT referral_codes WHERE code   missing   → InvalidCode       │
//! │    2. owner == referred?                 yes       → SelfReferral      │
//! │    3. referred already in referrals?     yes       → AlreadyReferred   │
//! │       referred customer exists?          no        → NotFound          │
//! │       same business as owner?            no        → InvalidCode       │
//! │    UPDATE customers  points += referrer bonus   (owner)                │
//! │    UPDATE customers  points += referee bonus    (referred)             │
//! │    UPDATE referral_codes  used_count += 1                              │
//! │    INSERT referrals ── UNIQUE(referred_customer_id) ──► AlreadyReferred │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The write lock is taken at BEGIN, so concurrent redemptions for one
//! customer run one after another and the later ones fail check 3. The
//! unique index still backs that check at the storage level: an INSERT that
//! trips it rolls back and reports AlreadyReferred.
//!
//! Redemption is never replayed after a `Timeout`. A replay after a landed
//! COMMIT would report AlreadyReferred for an award that was in fact made.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use super::{LedgerEvent, LoyaltyLedger};
use crate::error::{DbError, LedgerResult};
use crate::repository::customer::CustomerRepository;
use crate::repository::referral::ReferralRepository;
use tuzo_core::referral::{check_redemption, code_from_entropy, normalize_code, ReferralAward};
use tuzo_core::{CoreError, Referral, ReferralCode, ReferralSummary};

/// Fresh codes tried per attempt before reporting a conflict.
const MAX_CODE_COLLISIONS: usize = 8;

impl LoyaltyLedger {
    /// Returns the customer's referral code, issuing one on first call.
    ///
    /// Repeat calls return the identical code and never add a second row.
    pub async fn get_or_create_referral_code(&self, customer_id: &str) -> LedgerResult<ReferralCode> {
        self.run("get_or_create_referral_code", move || {
            self.issue_code_once(customer_id)
        })
        .await
    }

    /// Redeems `code` for a newly referred customer.
    ///
    /// ## Errors
    /// - `InvalidCode` if the code does not resolve, or belongs to a
    ///   customer of a different business
    /// - `SelfReferral` if the code is the customer's own
    /// - `AlreadyReferred` if the customer was ever referred before
    /// - `NotFound` if the referred customer does not exist
    pub async fn redeem_referral(
        &self,
        code: &str,
        referred_customer_id: &str,
    ) -> LedgerResult<Referral> {
        let code = normalize_code(code)?;
        let code = code.as_str();
        let award = ReferralAward::from_rules(&self.rules);

        let referral = self
            .run_append("redeem_referral", move || {
                self.redeem_once(code, referred_customer_id, award)
            })
            .await?;

        info!(
            referral_id = %referral.id,
            referrer = %referral.referrer_customer_id,
            referred = %referral.referred_customer_id,
            referrer_points = referral.referrer_points,
            referee_points = referral.referee_points,
            "Referral awarded"
        );

        self.emit(LedgerEvent::ReferralAwarded {
            referral_id: referral.id.clone(),
            referrer_customer_id: referral.referrer_customer_id.clone(),
            referred_customer_id: referral.referred_customer_id.clone(),
            referrer_points: referral.referrer_points,
            referee_points: referral.referee_points,
        });

        Ok(referral)
    }

    /// Code, uses and earnings for a customer's "refer a friend" screen.
    pub async fn referral_summary(&self, customer_id: &str) -> LedgerResult<ReferralSummary> {
        self.run("referral_summary", move || self.summary_once(customer_id))
            .await
    }

    // =========================================================================
    // Single Attempts
    // =========================================================================

    async fn issue_code_once(&self, customer_id: &str) -> LedgerResult<ReferralCode> {
        if let Some(existing) = self.db.referrals().code_for_customer(customer_id).await? {
            return Ok(existing);
        }

        let mut tx = self.db.begin_write().await?;
        let code = Self::issue_code_in(&mut tx, customer_id).await?;
        tx.commit().await?;

        Ok(code)
    }

    /// Returns the customer's code, inserting a fresh one if they have none.
    ///
    /// Must run inside a write transaction: the existence check and the
    /// INSERT are only exclusive while the write lock is held.
    pub(super) async fn issue_code_in(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> LedgerResult<ReferralCode> {
        if let Some(existing) = ReferralRepository::code_for_customer_in(conn, customer_id).await? {
            return Ok(existing);
        }

        if CustomerRepository::find_in(conn, customer_id).await?.is_none() {
            return Err(DbError::not_found("Customer", customer_id).into());
        }

        for _ in 0..MAX_CODE_COLLISIONS {
            let candidate = ReferralCode {
                id: Uuid::new_v4().to_string(),
                customer_id: customer_id.to_string(),
                code: code_from_entropy(Uuid::new_v4().as_bytes()),
                used_count: 0,
                created_at: Utc::now(),
            };

            match ReferralRepository::insert_code_in(conn, &candidate).await {
                Ok(()) => {
                    info!(customer_id = %customer_id, code = %candidate.code, "Referral code issued");
                    return Ok(candidate);
                }
                Err(err) if err.is_unique_on("referral_codes.code") => {
                    debug!(code = %candidate.code, "Referral code collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(DbError::duplicate("referral_codes.code", "generated").into())
    }

    async fn redeem_once(
        &self,
        code: &str,
        referred_customer_id: &str,
        award: ReferralAward,
    ) -> LedgerResult<Referral> {
        let mut tx = self.db.begin_write().await?;

        let code_row = ReferralRepository::find_code_in(&mut tx, code)
            .await?
            .ok_or_else(|| CoreError::InvalidCode {
                code: code.to_string(),
            })?;

        let already_referred = ReferralRepository::is_referred_in(&mut tx, referred_customer_id).await?;
        check_redemption(&code_row.customer_id, referred_customer_id, already_referred)?;

        let referred = CustomerRepository::find_in(&mut tx, referred_customer_id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", referred_customer_id))?;
        let referrer = CustomerRepository::find_in(&mut tx, &code_row.customer_id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", &code_row.customer_id))?;

        if referrer.business_id != referred.business_id {
            return Err(CoreError::InvalidCode {
                code: code.to_string(),
            }
            .into());
        }

        CustomerRepository::add_points_in(&mut tx, &referrer.id, award.referrer_points).await?;
        CustomerRepository::add_points_in(&mut tx, &referred.id, award.referee_points).await?;
        ReferralRepository::increment_used_in(&mut tx, &code_row.id).await?;

        let referral = Referral {
            id: Uuid::new_v4().to_string(),
            referrer_customer_id: referrer.id,
            referred_customer_id: referred.id,
            referral_code: code_row.code,
            referrer_points: award.referrer_points,
            referee_points: award.referee_points,
            created_at: Utc::now(),
        };

        match ReferralRepository::insert_referral_in(&mut tx, &referral).await {
            Ok(()) => {}
            Err(err) if err.is_unique_on("referrals.referred_customer_id") => {
                // Lost the race to a concurrent redemption; tx rolls back on drop
                return Err(CoreError::AlreadyReferred {
                    customer_id: referred_customer_id.to_string(),
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;

        Ok(referral)
    }

    async fn summary_once(&self, customer_id: &str) -> LedgerResult<ReferralSummary> {
        if self.db.customers().get_by_id(customer_id).await?.is_none() {
            return Err(DbError::not_found("Customer", customer_id).into());
        }

        let referrals = self.db.referrals();
        let code = referrals.code_for_customer(customer_id).await?;
        let referrals_made = referrals.referrals_made(customer_id).await?;
        let total_points_earned = referrals_made.iter().map(|r| r.points_awarded).sum();

        Ok(ReferralSummary {
            customer_id: customer_id.to_string(),
            used_count: code.as_ref().map_or(0, |c| c.used_count),
            code: code.map(|c| c.code),
            referrals_made,
            total_points_earned,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ledger::test_support::{business, customer, file_ledger, ledger, reload};

    #[tokio::test]
    async fn test_code_is_stable() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;

        let first = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        let second = ledger.get_or_create_referral_code(&a.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.used_count, 0);
        assert_eq!(first.code.len(), tuzo_core::REFERRAL_CODE_LEN);
    }

    #[tokio::test]
    async fn test_code_for_unknown_customer() {
        let ledger = ledger().await;

        let err = ledger.get_or_create_referral_code("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_concurrent_code_issue_yields_one_code() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;

        let mut handles = Vec::new();
        for _ in 0..6 {
            let ledger = ledger.clone();
            let id = a.id.clone();
            handles.push(tokio::spawn(async move {
                ledger.get_or_create_referral_code(&id).await
            }));
        }

        let mut codes = Vec::new();
        for handle in handles {
            codes.push(handle.await.unwrap().unwrap().code);
        }
        codes.dedup();
        assert_eq!(codes.len(), 1);
    }

    #[tokio::test]
    async fn test_redeem_awards_both_sides_once() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;
        let d = customer(&ledger, &b.id, "0712000002").await;

        let code = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        let referral = ledger.redeem_referral(&code.code, &d.id).await.unwrap();

        assert_eq!(referral.referrer_customer_id, a.id);
        assert_eq!(referral.referred_customer_id, d.id);
        assert_eq!(referral.referral_code, code.code);
        assert_eq!(referral.referrer_points, 30);
        assert_eq!(referral.referee_points, 15);

        let a_after = reload(&ledger, &a.id).await;
        let d_after = reload(&ledger, &d.id).await;
        assert_eq!(a_after.points, a.points + 30);
        assert_eq!(d_after.points, d.points + 15);

        let code_after = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        assert_eq!(code_after.used_count, 1);

        let rows = ledger.database().referrals().count_for_code(&code.code).await.unwrap();
        assert_eq!(rows, 1);

        // Second redemption by the same customer changes nothing
        let err = ledger.redeem_referral(&code.code, &d.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyReferred);
        assert_eq!(reload(&ledger, &a.id).await, a_after);
        assert_eq!(reload(&ledger, &d.id).await, d_after);
        assert_eq!(
            ledger.get_or_create_referral_code(&a.id).await.unwrap().used_count,
            1
        );
    }

    #[tokio::test]
    async fn test_already_referred_with_any_code() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;
        let e = customer(&ledger, &b.id, "0712000003").await;
        let d = customer(&ledger, &b.id, "0712000002").await;

        let a_code = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        let e_code = ledger.get_or_create_referral_code(&e.id).await.unwrap();

        ledger.redeem_referral(&a_code.code, &d.id).await.unwrap();
        let err = ledger.redeem_referral(&e_code.code, &d.id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AlreadyReferred);
        assert_eq!(reload(&ledger, &e.id).await.points, e.points);
    }

    #[tokio::test]
    async fn test_self_referral_rejected() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;

        let code = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        let err = ledger.redeem_referral(&code.code, &a.id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SelfReferral);
        assert_eq!(reload(&ledger, &a.id).await, a);
        assert_eq!(
            ledger.get_or_create_referral_code(&a.id).await.unwrap().used_count,
            0
        );
    }

    #[tokio::test]
    async fn test_invalid_codes() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let d = customer(&ledger, &b.id, "0712000002").await;

        for code in ["", "ab", "ZZZZZZ", "AB-123"] {
            let err = ledger.redeem_referral(code, &d.id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidCode, "code {code:?}");
        }
        assert_eq!(reload(&ledger, &d.id).await, d);
    }

    #[tokio::test]
    async fn test_code_input_is_case_insensitive() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;
        let d = customer(&ledger, &b.id, "0712000002").await;

        let code = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        let typed = format!("  {} ", code.code.to_lowercase());

        ledger.redeem_referral(&typed, &d.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_cross_business_code_is_invalid() {
        let ledger = ledger().await;
        let b1 = business(&ledger, "Kahawa House").await;
        let b2 = business(&ledger, "Duka La Mama").await;
        let a = customer(&ledger, &b1.id, "0712000001").await;
        let d = customer(&ledger, &b2.id, "0712000002").await;

        let code = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        let err = ledger.redeem_referral(&code.code, &d.id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidCode);
        assert_eq!(reload(&ledger, &a.id).await, a);
        assert_eq!(reload(&ledger, &d.id).await, d);
    }

    #[tokio::test]
    async fn test_unknown_referred_customer() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;

        let code = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        let err = ledger.redeem_referral(&code.code, "missing").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(reload(&ledger, &a.id).await, a);
    }

    #[tokio::test]
    async fn test_concurrent_redemptions_award_once() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let d = customer(&ledger, &b.id, "0712999999").await;

        let mut codes = Vec::new();
        for i in 0..6 {
            let referrer = customer(&ledger, &b.id, &format!("071200000{i}")).await;
            codes.push(ledger.get_or_create_referral_code(&referrer.id).await.unwrap());
        }

        let mut handles = Vec::new();
        for code in &codes {
            let ledger = ledger.clone();
            let (code, referred) = (code.code.clone(), d.id.clone());
            handles.push(tokio::spawn(async move {
                ledger.redeem_referral(&code, &referred).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert_eq!(err.kind(), ErrorKind::AlreadyReferred),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(reload(&ledger, &d.id).await.points, 15);

        let mut total_used = 0;
        for code in &codes {
            let rows = ledger.database().referrals().count_for_code(&code.code).await.unwrap();
            let current = ledger
                .get_or_create_referral_code(&code.customer_id)
                .await
                .unwrap();
            assert_eq!(current.used_count, rows);
            total_used += current.used_count;
        }
        assert_eq!(total_used, 1);
    }

    #[tokio::test]
    async fn test_referral_summary() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;
        let d = customer(&ledger, &b.id, "0712000002").await;
        let e = customer(&ledger, &b.id, "0712000003").await;

        let empty = ledger.referral_summary(&a.id).await.unwrap();
        assert_eq!(empty.code, None);
        assert_eq!(empty.used_count, 0);
        assert!(empty.referrals_made.is_empty());

        let code = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        ledger.redeem_referral(&code.code, &d.id).await.unwrap();
        ledger.redeem_referral(&code.code, &e.id).await.unwrap();

        let summary = ledger.referral_summary(&a.id).await.unwrap();
        assert_eq!(summary.code, Some(code.code));
        assert_eq!(summary.used_count, 2);
        assert_eq!(summary.referrals_made.len(), 2);
        assert_eq!(summary.total_points_earned, 60);
        assert_eq!(reload(&ledger, &a.id).await.points, 60);

        let stats = ledger.business_stats(&b.id).await.unwrap();
        assert_eq!(stats.referral_count, 2);
        assert_eq!(stats.points_issued, 90);
    }

    #[tokio::test]
    async fn test_referral_event() {
        let ledger = ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;
        let d = customer(&ledger, &b.id, "0712000002").await;
        let code = ledger.get_or_create_referral_code(&a.id).await.unwrap();
        let mut events = ledger.subscribe();

        let _ = ledger.redeem_referral(&code.code, &a.id).await;
        assert!(events.try_recv().is_err());

        let referral = ledger.redeem_referral(&code.code, &d.id).await.unwrap();
        let event = events.try_recv().unwrap();
        assert_eq!(
            event,
            LedgerEvent::ReferralAwarded {
                referral_id: referral.id,
                referrer_customer_id: a.id.clone(),
                referred_customer_id: d.id.clone(),
                referrer_points: 30,
                referee_points: 15,
            }
        );
        assert_eq!(event.affected_customers(), vec![a.id.as_str(), d.id.as_str()]);
    }

    // =========================================================================
    // Shared-file concurrency (one writer at a time across a real pool)
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_on_shared_file_award_once() {
        let (ledger, _dir) = file_ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let d = customer(&ledger, &b.id, "0712999999").await;

        let mut codes = Vec::new();
        for i in 0..8 {
            let referrer = customer(&ledger, &b.id, &format!("071200000{i}")).await;
            codes.push(ledger.get_or_create_referral_code(&referrer.id).await.unwrap());
        }

        let mut handles = Vec::new();
        for code in &codes {
            let ledger = ledger.clone();
            let (code, referred) = (code.code.clone(), d.id.clone());
            handles.push(tokio::spawn(async move {
                ledger.redeem_referral(&code, &referred).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert_eq!(err.kind(), ErrorKind::AlreadyReferred, "{err}"),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(reload(&ledger, &d.id).await.points, 15);

        let mut referrer_points = 0;
        let mut total_used = 0;
        for code in &codes {
            referrer_points += reload(&ledger, &code.customer_id).await.points;
            total_used += ledger
                .get_or_create_referral_code(&code.customer_id)
                .await
                .unwrap()
                .used_count;
        }
        assert_eq!(referrer_points, 30);
        assert_eq!(total_used, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_code_issue_on_shared_file_yields_one_code() {
        let (ledger, _dir) = file_ledger().await;
        let b = business(&ledger, "Kahawa House").await;
        let a = customer(&ledger, &b.id, "0712000001").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let id = a.id.clone();
            handles.push(tokio::spawn(async move {
                ledger.get_or_create_referral_code(&id).await
            }));
        }

        let mut codes = Vec::new();
        for handle in handles {
            codes.push(handle.await.unwrap().unwrap().code);
        }
        codes.dedup();
        assert_eq!(codes.len(), 1);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referral_codes WHERE customer_id = ?1")
            .bind(&a.id)
            .fetch_one(ledger.database().pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}

//! Referral redemption.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tuzo_core::Referral;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, Caller};
use crate::SharedState;

/// Body of `POST /referrals/redeem`.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Code as typed by the customer; case and spacing are forgiven.
    pub code: String,
    /// The customer being referred.
    pub customer_id: String,
}

/// `POST /referrals/redeem`
///
/// The referred customer, or their business at the till, redeems a code.
pub async fn redeem(
    State(state): State<SharedState>,
    caller: Caller,
    ApiJson(input): ApiJson<RedeemRequest>,
) -> ApiResult<(StatusCode, Json<Referral>)> {
    let customer = state
        .db
        .directory()
        .get_customer(&input.customer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", &input.customer_id))?;

    caller.require_customer(&customer)?;

    let referral = state
        .ledger
        .redeem_referral(&input.code, &customer.id)
        .await?;

    Ok((StatusCode::CREATED, Json(referral)))
}

//! Customer routes.
//!
//! Open to the customer themself and to the business they belong to.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use tuzo_core::{Customer, ReferralCode, ReferralSummary, Visit};
use tuzo_db::DEFAULT_HISTORY_LIMIT;

use crate::error::{ApiError, ApiResult};
use crate::extract::Caller;
use crate::SharedState;

/// Largest visit history a caller may ask for.
const MAX_HISTORY_LIMIT: u32 = 500;

/// A customer with balances rendered in the display currency.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct CustomerView {
    #[serde(flatten)]
    pub customer: Customer,
    /// What the point balance is worth, e.g. "KES 45".
    pub points_value_display: String,
    pub total_spent_display: String,
}

/// Limit for visit history.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// Loads a customer and checks the caller may see them.
async fn authorized_customer(
    state: &SharedState,
    caller: &Caller,
    customer_id: &str,
) -> ApiResult<Customer> {
    let customer = state
        .db
        .directory()
        .get_customer(customer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", customer_id))?;

    caller.require_customer(&customer)?;
    Ok(customer)
}

/// `GET /customers/{id}`
pub async fn get(
    State(state): State<SharedState>,
    caller: Caller,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<CustomerView>> {
    let customer = authorized_customer(&state, &caller, &customer_id).await?;
    let rules = state.ledger.rules();

    let view = CustomerView {
        points_value_display: rules
            .render_points_value(customer.points)
            .map_err(tuzo_db::LedgerError::from)?,
        total_spent_display: rules
            .render_money(customer.total_spent())
            .map_err(tuzo_db::LedgerError::from)?,
        customer,
    };

    Ok(Json(view))
}

/// `GET /customers/{id}/visits`
pub async fn visits(
    State(state): State<SharedState>,
    caller: Caller,
    Path(customer_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Visit>>> {
    authorized_customer(&state, &caller, &customer_id).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    Ok(Json(state.ledger.visit_history(&customer_id, limit).await?))
}

/// `POST /customers/{id}/referral-code`
pub async fn referral_code(
    State(state): State<SharedState>,
    caller: Caller,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<ReferralCode>> {
    authorized_customer(&state, &caller, &customer_id).await?;
    Ok(Json(
        state.ledger.get_or_create_referral_code(&customer_id).await?,
    ))
}

/// `GET /customers/{id}/referrals`
pub async fn referrals(
    State(state): State<SharedState>,
    caller: Caller,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<ReferralSummary>> {
    authorized_customer(&state, &caller, &customer_id).await?;
    Ok(Json(state.ledger.referral_summary(&customer_id).await?))
}

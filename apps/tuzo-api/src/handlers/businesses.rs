//! Business-owner routes.
//!
//! Everything except registration requires `business:<id>` matching the
//! path.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::debug;
use tuzo_core::{Business, BusinessStats, Customer, VisitReceipt};
use tuzo_db::NewBusiness;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, Caller};
use crate::SharedState;

/// Default page size for customer listings.
const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page a caller may ask for.
const MAX_PAGE_SIZE: u32 = 200;

/// Body of `PATCH /businesses/{id}/contact`.
#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Body of `POST /businesses/{id}/visits`.
#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Purchase amount in the base currency.
    pub amount: f64,
}

/// Paging for customer listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// `POST /businesses`
pub async fn register(
    State(state): State<SharedState>,
    Caller(principal): Caller,
    ApiJson(input): ApiJson<NewBusiness>,
) -> ApiResult<(StatusCode, Json<Business>)> {
    debug!(%principal, "Registering business");
    let business = state.db.directory().register_business(input).await?;
    Ok((StatusCode::CREATED, Json(business)))
}

/// `GET /businesses/{id}`
pub async fn get(
    State(state): State<SharedState>,
    caller: Caller,
    Path(business_id): Path<String>,
) -> ApiResult<Json<Business>> {
    caller.require_business(&business_id)?;

    let business = state
        .db
        .directory()
        .find_business(&business_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Business", &business_id))?;

    Ok(Json(business))
}

/// `PATCH /businesses/{id}/contact`
pub async fn update_contact(
    State(state): State<SharedState>,
    caller: Caller,
    Path(business_id): Path<String>,
    ApiJson(input): ApiJson<UpdateContactRequest>,
) -> ApiResult<Json<Business>> {
    caller.require_business(&business_id)?;

    let business = state
        .db
        .directory()
        .update_business_contact(&business_id, &input.phone, input.address.as_deref())
        .await?;

    Ok(Json(business))
}

/// `POST /businesses/{id}/visits`
pub async fn check_in(
    State(state): State<SharedState>,
    caller: Caller,
    Path(business_id): Path<String>,
    ApiJson(input): ApiJson<CheckInRequest>,
) -> ApiResult<(StatusCode, Json<VisitReceipt>)> {
    caller.require_business(&business_id)?;

    let receipt = state
        .ledger
        .check_in(&business_id, &input.phone, input.name.as_deref(), input.amount)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `GET /businesses/{id}/customers`
pub async fn list_customers(
    State(state): State<SharedState>,
    caller: Caller,
    Path(business_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<Customer>>> {
    caller.require_business(&business_id)?;

    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = page.offset.unwrap_or(0);

    let customers = state
        .db
        .directory()
        .list_customers(&business_id, limit, offset)
        .await?;

    Ok(Json(customers))
}

/// `GET /businesses/{id}/stats`
pub async fn stats(
    State(state): State<SharedState>,
    caller: Caller,
    Path(business_id): Path<String>,
) -> ApiResult<Json<BusinessStats>> {
    caller.require_business(&business_id)?;

    if state.db.directory().find_business(&business_id).await?.is_none() {
        return Err(ApiError::not_found("Business", &business_id));
    }

    Ok(Json(state.ledger.business_stats(&business_id).await?))
}

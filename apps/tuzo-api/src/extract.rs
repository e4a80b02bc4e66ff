//! Request extractors.
//!
//! ## Principal Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Identity gateway ──► x-tuzo-principal: business:<id>                  │
//! │                                         customer:<id>                  │
//! │                                         (absent)  → Unassigned         │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                    Caller(Principal) in the handler                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The header is trusted; the gateway strips it from inbound traffic.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use tuzo_core::{Customer, Principal};

use crate::error::{ApiError, ApiResult};

/// Header carrying the authenticated principal.
pub const PRINCIPAL_HEADER: &str = "x-tuzo-principal";

/// The principal making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Principal);

impl Caller {
    /// Requires the caller to be the owner of `business_id`.
    pub fn require_business(&self, business_id: &str) -> ApiResult<()> {
        if self.0.acts_for_business(business_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "{} may not act for business {}",
                self.0, business_id
            )))
        }
    }

    /// Requires the caller to be `customer` or their business.
    pub fn require_customer(&self, customer: &Customer) -> ApiResult<()> {
        if self.0.may_access_customer(customer) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "{} may not access customer {}",
                self.0, customer.id
            )))
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(PRINCIPAL_HEADER) else {
            return Ok(Caller(Principal::Unassigned));
        };

        let value = value
            .to_str()
            .map_err(|_| ApiError::bad_request("x-tuzo-principal must be ASCII"))?;

        Ok(Caller(value.parse::<Principal>()?))
    }
}

/// `Json` whose rejections use the API error body.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

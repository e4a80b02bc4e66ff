//! HTTP handlers, one module per resource.

pub mod businesses;
pub mod customers;
pub mod referrals;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::SharedState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<Health>) {
    if state.db.health_check().await {
        (
            StatusCode::OK,
            Json(Health {
                status: "ok",
                database: true,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Health {
                status: "degraded",
                database: false,
            }),
        )
    }
}

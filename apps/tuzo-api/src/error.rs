//! Error responses for the Tuzo API.
//!
//! Every failure leaves the server as `{"code": "...", "message": "..."}`
//! with a status chosen from the ledger's [`ErrorKind`].

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use tuzo_core::ValidationError;
use tuzo_db::{ErrorKind, LedgerError};

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `ALREADY_REFERRED`.
    pub code: String,
    pub message: String,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// The principal may not act on this resource.
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::FORBIDDEN,
            code: "FORBIDDEN",
            message: message.into(),
        }
    }

    /// Unknown entity.
    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: format!("{entity} not found: {id}"),
        }
    }

    /// Malformed request body or header.
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }
}

fn status_and_code(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
        ErrorKind::Invalid => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::InvalidCode => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_CODE"),
        ErrorKind::SelfReferral => (StatusCode::UNPROCESSABLE_ENTITY, "SELF_REFERRAL"),
        ErrorKind::AlreadyReferred => (StatusCode::CONFLICT, "ALREADY_REFERRED"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
        ErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
        ErrorKind::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let (status, code) = status_and_code(err.kind());

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "internal error");
            "internal server error".to_string()
        } else {
            err.to_string()
        };

        ApiError {
            status,
            code,
            message,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        LedgerError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: rejection.status(),
            code: "BAD_REQUEST",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

//! # Tuzo API
//!
//! HTTP request handlers over the loyalty ledger.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET   /health                           storage health                 │
//! │                                                                         │
//! │  POST  /businesses                       register (any principal)       │
//! │  GET   /businesses/{id}                  ┐                              │
//! │  PATCH /businesses/{id}/contact          │                              │
//! │  POST  /businesses/{id}/visits           │ business:<id> only           │
//! │  GET   /businesses/{id}/customers        │                              │
//! │  GET   /businesses/{id}/stats            ┘                              │
//! │                                                                         │
//! │  GET   /customers/{id}                   ┐                              │
//! │  GET   /customers/{id}/visits            │ customer:<id> or the         │
//! │  POST  /customers/{id}/referral-code     │ customer's business          │
//! │  GET   /customers/{id}/referrals         ┘                              │
//! │                                                                         │
//! │  POST  /referrals/redeem                 referred customer or business  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tuzo_db::{Database, LoyaltyLedger};

pub use config::TuzoConfig;
pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub ledger: LoyaltyLedger,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: Database, ledger: LoyaltyLedger) -> SharedState {
        Arc::new(AppState { db, ledger })
    }
}

/// Builds the API router.
pub fn router(state: SharedState) -> Router {
    use handlers::{businesses, customers, referrals};

    Router::new()
        .route("/health", get(handlers::health))
        .route("/businesses", post(businesses::register))
        .route("/businesses/{id}", get(businesses::get))
        .route("/businesses/{id}/contact", patch(businesses::update_contact))
        .route("/businesses/{id}/visits", post(businesses::check_in))
        .route("/businesses/{id}/customers", get(businesses::list_customers))
        .route("/businesses/{id}/stats", get(businesses::stats))
        .route("/customers/{id}", get(customers::get))
        .route("/customers/{id}/visits", get(customers::visits))
        .route("/customers/{id}/referral-code", post(customers::referral_code))
        .route("/customers/{id}/referrals", get(customers::referrals))
        .route("/referrals/redeem", post(referrals::redeem))
        .with_state(state)
}

// =============================================================================
// Router Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tuzo_core::LoyaltyRules;
    use tuzo_db::{DbConfig, RetryPolicy};

    use crate::extract::PRINCIPAL_HEADER;

    async fn app() -> Router {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger =
            LoyaltyLedger::new(db.clone(), LoyaltyRules::default(), RetryPolicy::default())
                .unwrap();
        router(AppState::new(db, ledger))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        principal: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(p) = principal {
            builder = builder.header(PRINCIPAL_HEADER, p);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Registers a business and returns its id and principal header value.
    async fn register(app: &Router, name: &str) -> (String, String) {
        let (status, body) = send(
            app,
            Method::POST,
            "/businesses",
            None,
            Some(json!({
                "name": name,
                "owner_name": "Amina",
                "phone": "+254 700 000 001",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let id = body["id"].as_str().unwrap().to_string();
        let principal = format!("business:{id}");
        (id, principal)
    }

    /// Checks a customer in and returns the receipt body.
    async fn check_in(app: &Router, business: &(String, String), phone: &str, amount: f64) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            &format!("/businesses/{}/visits", business.0),
            Some(&business.1),
            Some(json!({ "phone": phone, "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_register_and_fetch_business() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/businesses/{}", business.0),
            Some(&business.1),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Kahawa House");
        assert_eq!(body["phone"], "+254700000001");
    }

    #[tokio::test]
    async fn test_register_rejects_blank_name() {
        let app = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/businesses",
            None,
            Some(json!({ "name": "  ", "owner_name": "Amina", "phone": "0712345678" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_body() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/businesses/{}/visits", business.0),
            Some(&business.1),
            Some(json!({ "phone": "0712345678" })),
        )
        .await;
        assert!(status.is_client_error());
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_update_contact() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/businesses/{}/contact", business.0),
            Some(&business.1),
            Some(json!({ "phone": "0799 000 111", "address": "Tom Mboya St" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], "0799000111");
        assert_eq!(body["address"], "Tom Mboya St");
        assert_eq!(body["name"], "Kahawa House");
    }

    #[tokio::test]
    async fn test_business_routes_require_owner() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;
        let other = register(&app, "Mama Mboga").await;
        let uri = format!("/businesses/{}/stats", business.0);

        let (status, body) = send(&app, Method::GET, &uri, Some(&other.1), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, _) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::GET, &uri, Some("customer:x"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bad_principal_header() {
        let app = app().await;
        let (status, body) =
            send(&app, Method::GET, "/businesses/b-1", Some("admin:root"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_check_in_accrues_points() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;

        let receipt = check_in(&app, &business, "0712 345 678", 1000.0).await;
        assert_eq!(receipt["is_new_customer"], true);
        assert_eq!(receipt["visit"]["points_earned"], 10);
        assert_eq!(receipt["customer"]["points"], 10);
        assert_eq!(receipt["customer"]["total_spent_cents"], 100_000);
        assert_eq!(receipt["referral_code"].as_str().unwrap().len(), 6);

        let again = check_in(&app, &business, "0712345678", 250.0).await;
        assert_eq!(again["is_new_customer"], false);
        assert_eq!(again["customer"]["points"], 12);
        assert_eq!(again["customer"]["total_visits"], 2);
        assert_eq!(again["referral_code"], receipt["referral_code"]);
    }

    #[tokio::test]
    async fn test_check_in_invalid_amount() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/businesses/{}/visits", business.0),
            Some(&business.1),
            Some(json!({ "phone": "0712345678", "amount": -5.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_AMOUNT");

        let (_, customers) = send(
            &app,
            Method::GET,
            &format!("/businesses/{}/customers", business.0),
            Some(&business.1),
            None,
        )
        .await;
        assert_eq!(customers.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_customer_view_and_history() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;

        check_in(&app, &business, "0712345678", 100.0).await;
        let receipt = check_in(&app, &business, "0712345678", 4500.0).await;
        let customer_id = receipt["customer"]["id"].as_str().unwrap();
        let me = format!("customer:{customer_id}");

        let (status, view) = send(
            &app,
            Method::GET,
            &format!("/customers/{customer_id}"),
            Some(&me),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["points"], 46);
        assert_eq!(view["points_value_display"], "KES 46");
        assert_eq!(view["total_spent_display"], "KES 595,700");

        let (status, visits) = send(
            &app,
            Method::GET,
            &format!("/customers/{customer_id}/visits?limit=1"),
            Some(&business.1),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let visits = visits.as_array().unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0]["points_earned"], 45);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/customers/{customer_id}"),
            Some("customer:someone-else"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let app = app().await;
        let (status, body) =
            send(&app, Method::GET, "/customers/nope", Some("customer:nope"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_referral_flow() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;

        let referrer = check_in(&app, &business, "0711000001", 10.0).await;
        let referred = check_in(&app, &business, "0711000002", 10.0).await;
        let referrer_id = referrer["customer"]["id"].as_str().unwrap().to_string();
        let referred_id = referred["customer"]["id"].as_str().unwrap().to_string();
        let code = referrer["referral_code"].as_str().unwrap().to_lowercase();

        let (status, referral) = send(
            &app,
            Method::POST,
            "/referrals/redeem",
            Some(&format!("customer:{referred_id}")),
            Some(json!({ "code": code, "customer_id": referred_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{referral}");
        assert_eq!(referral["referrer_points"], 30);
        assert_eq!(referral["referee_points"], 15);

        // Second attempt with any code is rejected
        let (status, body) = send(
            &app,
            Method::POST,
            "/referrals/redeem",
            Some(&business.1),
            Some(json!({ "code": code, "customer_id": referred_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_REFERRED");

        let (status, summary) = send(
            &app,
            Method::GET,
            &format!("/customers/{referrer_id}/referrals"),
            Some(&format!("customer:{referrer_id}")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["used_count"], 1);
        assert_eq!(summary["total_points_earned"], 30);
        assert_eq!(summary["referrals_made"].as_array().unwrap().len(), 1);

        let (_, stats) = send(
            &app,
            Method::GET,
            &format!("/businesses/{}/stats", business.0),
            Some(&business.1),
            None,
        )
        .await;
        assert_eq!(stats["referral_count"], 1);
        assert_eq!(stats["customer_count"], 2);
        assert_eq!(stats["points_issued"], 45);
    }

    #[tokio::test]
    async fn test_referral_rejections() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;

        let receipt = check_in(&app, &business, "0711000001", 10.0).await;
        let customer_id = receipt["customer"]["id"].as_str().unwrap();
        let own_code = receipt["referral_code"].as_str().unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            "/referrals/redeem",
            Some(&business.1),
            Some(json!({ "code": own_code, "customer_id": customer_id })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "SELF_REFERRAL");

        let (status, body) = send(
            &app,
            Method::POST,
            "/referrals/redeem",
            Some(&business.1),
            Some(json!({ "code": "ZZZZZZ", "customer_id": customer_id })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INVALID_CODE");
    }

    #[tokio::test]
    async fn test_referral_code_endpoint_is_stable() {
        let app = app().await;
        let business = register(&app, "Kahawa House").await;
        let receipt = check_in(&app, &business, "0711000001", 10.0).await;
        let customer_id = receipt["customer"]["id"].as_str().unwrap();

        let (status, code) = send(
            &app,
            Method::POST,
            &format!("/customers/{customer_id}/referral-code"),
            Some(&format!("customer:{customer_id}")),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(code["code"], receipt["referral_code"]);
        assert_eq!(code["used_count"], 0);
    }
}

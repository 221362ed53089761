//! Bazaar Storefront library.
//!
//! This crate provides the storefront JSON API as a library, allowing the
//! router to be built by the binary and exercised by tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{Router, middleware::from_fn, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the full storefront router: health checks, API routes, tracing,
/// request IDs and CORS.
///
/// Sentry layers are added by the binary so tests run without a hub.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().base_url);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(cors)
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Browsers may call the API with credentials from the storefront origin
/// only.
fn cors_layer(base_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(base_url.trim_end_matches('/')) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(base_url, "STOREFRONT_BASE_URL is not a valid origin; CORS disabled");
            cors
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use bazaar_core::pricing::PricingPolicy;
    use bazaar_core::token::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS};
    use bazaar_core::{CurrencyCode, UserId, UserRole};
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::{AuthConfig, StorefrontConfig};

    const WEBHOOK_SECRET: &str = "Wh7!kR2@pL9#sT4$vX6%yB1^nM3&qC8*";

    fn test_state(webhook_secret: Option<&str>) -> AppState {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/bazaar_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            auth: AuthConfig {
                jwt_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
                refresh_secret: SecretString::from("Zq8!vN1@hJ4#kP6$wR3%tY5^mX7&bC9*"),
                access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
                refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
                secure_cookies: false,
            },
            payment_webhook_secret: webhook_secret.map(SecretString::from),
            pricing: PricingPolicy::default(),
            currency: CurrencyCode::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };
        // Never connects: every request below is answered before a query runs
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/bazaar_test")
            .unwrap();
        AppState::new(config, pool)
    }

    fn customer_token(state: &AppState) -> String {
        state
            .access_tokens()
            .issue(UserId::new(1), "shopper@example.com", UserRole::Customer, Utc::now())
            .unwrap()
    }

    fn post(uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-real-ip", "203.0.113.10")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(test_state(None))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = app(test_state(None))
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-123");
    }

    #[tokio::test]
    async fn test_cart_requires_token() {
        let response = app(test_state(None))
            .oneshot(Request::get("/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Access token required");
    }

    #[tokio::test]
    async fn test_invalid_bearer_token_is_rejected() {
        let response = app(test_state(None))
            .oneshot(
                Request::get("/api/orders")
                    .header("authorization", "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let state = test_state(None);
        let refresh = state
            .refresh_tokens()
            .issue(UserId::new(1), "shopper@example.com", UserRole::Customer, Utc::now())
            .unwrap();
        let response = app(state)
            .oneshot(
                Request::get("/api/auth/me")
                    .header("authorization", format!("Bearer {refresh}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_short_search_query_is_rejected() {
        let response = app(test_state(None))
            .oneshot(
                Request::get("/api/products/search?q=a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Search query must be at least 2 characters"
        );
    }

    #[tokio::test]
    async fn test_refresh_without_cookie_is_unauthorized() {
        let response = app(test_state(None))
            .oneshot(post("/api/auth/refresh").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_with_bad_cookie_is_forbidden() {
        let response = app(test_state(None))
            .oneshot(
                post("/api/auth/refresh")
                    .header("cookie", "refreshToken=garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"], "Invalid refresh token");
    }

    #[tokio::test]
    async fn test_logout_clears_both_cookies() {
        let response = app(test_state(None))
            .oneshot(post("/api/auth/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c| c.starts_with("authToken=")));
        assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert_eq!(
            json_body(response).await["message"],
            "Logged out successfully"
        );
    }

    #[tokio::test]
    async fn test_register_validation_messages() {
        let body = r#"{"email":"nope","password":"123","full_name":"Al"}"#;
        let response = app(test_state(None))
            .oneshot(
                post("/api/auth/register")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(
            json["error"],
            "email: Invalid email address, password: Password must be at least 6 characters"
        );
    }

    #[tokio::test]
    async fn test_validate_coupon_requires_code() {
        let body = r#"{"cartTotal":100}"#;
        let response = app(test_state(None))
            .oneshot(
                post("/api/payments/validate-coupon")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Coupon code is required");
    }

    #[tokio::test]
    async fn test_checkout_requires_amount() {
        let state = test_state(None);
        let token = customer_token(&state);
        let response = app(state)
            .oneshot(
                post("/api/payments/checkout")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Amount is required");
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_unknown_events() {
        let body = r#"{"type":"charge.refunded","data":{}}"#;
        let response = app(test_state(None))
            .oneshot(
                post("/api/payments/webhook")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["received"], true);
    }

    #[tokio::test]
    async fn test_webhook_rejects_missing_signature() {
        let body = r#"{"type":"payment_intent.succeeded","data":{}}"#;
        let response = app(test_state(Some(WEBHOOK_SECRET)))
            .oneshot(
                post("/api/payments/webhook")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_accepts_valid_signature() {
        let body = r#"{"type":"payment_intent.created","data":{}}"#;
        let now = Utc::now().timestamp();
        let signature = bazaar_core::payment::sign(WEBHOOK_SECRET.as_bytes(), now, body.as_bytes());
        let response = app(test_state(Some(WEBHOOK_SECRET)))
            .oneshot(
                post("/api/payments/webhook")
                    .header("payment-signature", format!("t={now},v1={signature}"))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_event_without_order_is_bad_request() {
        let body = r#"{"type":"payment_intent.succeeded","data":{"payment_intent":{"id":"pi_1"}}}"#;
        let response = app(test_state(None))
            .oneshot(
                post("/api/payments/webhook")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cors_allows_storefront_origin() {
        let response = app(test_state(None))
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/products")
                    .header("origin", "http://localhost:3000")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }
}

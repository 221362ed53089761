//! Bazaar Admin library.
//!
//! This crate provides the back-office JSON API as a library, allowing the
//! router to be built by the binary and exercised by tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{Router, middleware::from_fn, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the full admin router: health checks, API routes, tracing,
/// request IDs, security headers and CORS.
///
/// Sentry layers are added by the binary so tests run without a hub.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().base_url);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(from_fn(middleware::security_headers_middleware))
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
            tracing::warn!(base_url, "ADMIN_BASE_URL is not a valid origin; CORS disabled");
            cors
        }
    }
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
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
    use bazaar_core::token::{DEFAULT_ACCESS_TTL_SECS, TokenKind, TokenSigner};
    use bazaar_core::{UserId, UserRole};
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::AdminConfig;

    const JWT_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    fn test_state() -> AppState {
        let config = AdminConfig {
            database_url: SecretString::from("postgres://localhost/bazaar_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            jwt_secret: SecretString::from(JWT_SECRET),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
            tls: None,
        };
        // Never connects: every request below is answered before a query runs
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/bazaar_test")
            .unwrap();
        AppState::new(config, pool)
    }

    fn token(state: &AppState, role: UserRole) -> String {
        state
            .access_tokens()
            .issue(UserId::new(3), "staff@example.com", role, Utc::now())
            .unwrap()
    }

    fn request(method: &str, uri: &str, bearer: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {bearer}"))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_has_security_headers() {
        let response = app(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_dashboard_requires_token() {
        let response = app(test_state())
            .oneshot(
                Request::get("/api/admin/dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Access token required");
    }

    #[tokio::test]
    async fn test_customer_token_is_forbidden() {
        let state = test_state();
        let customer = token(&state, UserRole::Customer);
        let response = app(state)
            .oneshot(
                request("GET", "/api/admin/dashboard", &customer)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Insufficient permissions");
    }

    #[tokio::test]
    async fn test_support_token_is_forbidden() {
        let state = test_state();
        let support = token(&state, UserRole::Support);
        let response = app(state)
            .oneshot(
                request("GET", "/api/admin/orders", &support)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_token_from_other_secret_is_rejected() {
        let forged = TokenSigner::new(
            b"Zq8!vN1@hJ4#kP6$wR3%tY5^mX7&bC9*",
            TokenKind::Access,
            DEFAULT_ACCESS_TTL_SECS,
        )
        .issue(UserId::new(1), "mallory@example.com", UserRole::Admin, Utc::now())
        .unwrap();
        let response = app(test_state())
            .oneshot(
                request("GET", "/api/admin/dashboard", &forged)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_product_body_is_validated() {
        let state = test_state();
        let manager = token(&state, UserRole::Manager);
        let response = app(state)
            .oneshot(
                request("POST", "/api/admin/products", &manager)
                    .body(Body::from(r#"{"name":"","price":"0"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("name: Product name is required"));
    }

    #[tokio::test]
    async fn test_coupon_percentage_over_100_is_rejected() {
        let state = test_state();
        let admin = token(&state, UserRole::Admin);
        let response = app(state)
            .oneshot(
                request("POST", "/api/admin/coupons", &admin)
                    .body(Body::from(
                        r#"{"code":"HALF","discount_type":"percentage","discount_value":"150"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            json_body(response).await["error"]
                .as_str()
                .unwrap()
                .contains("cannot exceed 100")
        );
    }

    #[tokio::test]
    async fn test_unknown_order_status_filter_is_rejected() {
        let state = test_state();
        let admin = token(&state, UserRole::Admin);
        let response = app(state)
            .oneshot(
                request("GET", "/api/admin/orders?status=lost", &admin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Unknown order status: lost"
        );
    }

    #[tokio::test]
    async fn test_order_patch_rejects_unknown_status() {
        let state = test_state();
        let admin = token(&state, UserRole::Admin);
        let response = app(state)
            .oneshot(
                request("PATCH", "/api/admin/orders/5", &admin)
                    .body(Body::from(r#"{"status":"teleported"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_customer_status_body_is_checked() {
        let state = test_state();
        let admin = token(&state, UserRole::Admin);
        let response = app(state)
            .oneshot(
                request("PATCH", "/api/admin/customers/9/status", &admin)
                    .body(Body::from(r#"{"status":"banned"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

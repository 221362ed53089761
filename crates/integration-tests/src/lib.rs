//! Shared helpers for the end-to-end tests in `tests/`.
//!
//! # Running Tests
//!
//! The tests talk to running servers over HTTP and are `#[ignore]`d by
//! default:
//!
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! cargo run -p bazaar-cli -- seed
//! cargo run -p bazaar-cli -- admin create -e ops@example.com -r manager -p 'integration-pass'
//! cargo run -p bazaar-storefront &
//! cargo run -p bazaar-admin &
//! cargo test -p bazaar-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_URL` - default `http://localhost:3000`
//! - `ADMIN_URL` - default `http://localhost:3001`
//! - `TEST_STAFF_EMAIL` / `TEST_STAFF_PASSWORD` - a manager or admin account
//! - `PAYMENT_WEBHOOK_SECRET` - must match the storefront's, if it has one

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use bazaar_core::payment;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

pub fn admin_url() -> String {
    std::env::var("ADMIN_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// A client without a cookie store; every call passes the bearer token.
pub fn client() -> Client {
    Client::builder().build().unwrap()
}

/// Read a response as the JSON envelope, asserting the status first.
pub async fn envelope(response: Response, expected: StatusCode) -> Value {
    let status = response.status();
    let body: Value = response.json().await.unwrap();
    assert_eq!(status, expected, "unexpected status, body: {body}");
    body
}

/// A freshly registered customer.
pub struct Customer {
    pub email: String,
    pub token: String,
}

/// Register a new customer with a unique email and return their token.
pub async fn register_customer(client: &Client) -> Customer {
    let email = format!("it-{}@example.com", Uuid::new_v4().simple());
    let response = client
        .post(format!("{}/api/auth/register", storefront_url()))
        .json(&json!({
            "email": email,
            "password": "integration-pass",
            "full_name": "Integration Shopper",
        }))
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::CREATED).await;
    Customer {
        email,
        token: body["data"]["access_token"].as_str().unwrap().to_string(),
    }
}

/// Log in the staff account named by `TEST_STAFF_EMAIL` / `TEST_STAFF_PASSWORD`.
pub async fn staff_token(client: &Client) -> String {
    let email = std::env::var("TEST_STAFF_EMAIL").unwrap_or_else(|_| "ops@example.com".into());
    let password =
        std::env::var("TEST_STAFF_PASSWORD").unwrap_or_else(|_| "integration-pass".into());
    let response = client
        .post(format!("{}/api/auth/login", storefront_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::OK).await;
    body["data"]["access_token"].as_str().unwrap().to_string()
}

/// ID and price of the first active product with stock.
pub async fn in_stock_product(client: &Client) -> (i64, Value) {
    let response = client
        .get(format!("{}/api/products?limit=50", storefront_url()))
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::OK).await;
    let product = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["stock_quantity"].as_i64().unwrap_or(0) > 2)
        .expect("no product with stock; run `bz-cli seed` first")
        .clone();
    (product["id"].as_i64().unwrap(), product["price"].clone())
}

/// Post a payment webhook, signed when `PAYMENT_WEBHOOK_SECRET` is set.
pub async fn send_webhook(client: &Client, payload: &Value) -> Response {
    let body = serde_json::to_vec(payload).unwrap();
    let mut request = client
        .post(format!("{}/api/payments/webhook", storefront_url()))
        .header("content-type", "application/json");

    if let Ok(secret) = std::env::var("PAYMENT_WEBHOOK_SECRET") {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = payment::sign(secret.as_bytes(), timestamp, &body);
        request = request.header(
            payment::SIGNATURE_HEADER,
            format!("t={timestamp},v1={signature}"),
        );
    }

    request.body(body).send().await.unwrap()
}

/// Webhook payload for a payment intent event.
pub fn payment_event(kind: &str, intent_id: &str, order_id: i64) -> Value {
    json!({
        "type": kind,
        "data": {
            "payment_intent": {
                "id": intent_id,
                "metadata": { "order_id": order_id.to_string() }
            }
        }
    })
}

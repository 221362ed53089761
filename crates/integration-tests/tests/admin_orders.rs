//! End-to-end back-office tests against running storefront and admin servers.
//!
//! Staff credentials come from `TEST_STAFF_EMAIL` / `TEST_STAFF_PASSWORD`
//! (create the account with `bz-cli admin create`).

#![allow(clippy::unwrap_used)]

use bazaar_integration_tests::{
    admin_url, client, envelope, in_stock_product, payment_event, register_customer,
    send_webhook, staff_token, storefront_url,
};
use reqwest::{Client, StatusCode};
use serde_json::json;

/// Place and pay for a one-item order as a new customer; returns its ID.
async fn paid_order(client: &Client) -> i64 {
    let customer = register_customer(client).await;
    let base = storefront_url();
    let (product_id, _) = in_stock_product(client).await;

    let response = client
        .post(format!("{base}/api/cart"))
        .bearer_auth(&customer.token)
        .json(&json!({ "product_id": product_id, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    envelope(response, StatusCode::CREATED).await;

    let response = client
        .get(format!("{base}/api/cart"))
        .bearer_auth(&customer.token)
        .send()
        .await
        .unwrap();
    let total = envelope(response, StatusCode::OK).await["data"]["total"].clone();

    let response = client
        .post(format!("{base}/api/payments/checkout"))
        .bearer_auth(&customer.token)
        .json(&json!({ "amount": total }))
        .send()
        .await
        .unwrap();
    let checkout = envelope(response, StatusCode::CREATED).await;
    let order_id = checkout["data"]["order"]["id"].as_i64().unwrap();
    let intent_id = checkout["data"]["paymentIntent"]["id"].as_str().unwrap();

    let event = payment_event("payment_intent.succeeded", intent_id, order_id);
    assert_eq!(send_webhook(client, &event).await.status(), StatusCode::OK);
    order_id
}

#[tokio::test]
#[ignore = "Requires running storefront, admin and a staff account"]
async fn test_staff_ships_and_delivers_order() {
    let client = client();
    let order_id = paid_order(&client).await;
    let token = staff_token(&client).await;
    let base = admin_url();

    let response = client
        .get(format!("{base}/api/admin/orders/{order_id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let detail = envelope(response, StatusCode::OK).await;
    assert_eq!(detail["data"]["status"], "processing");
    assert_eq!(
        detail["data"]["allowed_next"],
        json!(["shipped", "cancelled", "refunded"])
    );

    let response = client
        .patch(format!("{base}/api/admin/orders/{order_id}"))
        .bearer_auth(&token)
        .json(&json!({ "status": "shipped", "trackingNumber": "1Z999AA10123456784" }))
        .send()
        .await
        .unwrap();
    let shipped = envelope(response, StatusCode::OK).await;
    assert_eq!(shipped["data"]["status"], "shipped");
    assert_eq!(shipped["data"]["tracking_number"], "1Z999AA10123456784");
    assert!(shipped["data"]["shipped_at"].is_string());

    // Backwards moves are refused
    let response = client
        .patch(format!("{base}/api/admin/orders/{order_id}"))
        .bearer_auth(&token)
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(
        body["error"],
        "cannot change order status from shipped to pending"
    );

    let response = client
        .patch(format!("{base}/api/admin/orders/{order_id}"))
        .bearer_auth(&token)
        .json(&json!({ "status": "delivered" }))
        .send()
        .await
        .unwrap();
    let delivered = envelope(response, StatusCode::OK).await;
    assert!(delivered["data"]["delivered_at"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront and admin"]
async fn test_customer_token_cannot_enter_back_office() {
    let client = client();
    let customer = register_customer(&client).await;

    let response = client
        .get(format!("{}/api/admin/dashboard", admin_url()))
        .bearer_auth(&customer.token)
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::FORBIDDEN).await;
    assert_eq!(body["success"], false);
    assert!(!customer.email.is_empty());
}

#[tokio::test]
#[ignore = "Requires running storefront, admin and a staff account"]
async fn test_deactivated_customer_cannot_log_in() {
    let client = client();
    let customer = register_customer(&client).await;
    let token = staff_token(&client).await;
    let base = admin_url();

    let response = client
        .get(format!("{base}/api/admin/customers?search={}", customer.email))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let list = envelope(response, StatusCode::OK).await;
    let customer_id = list["data"][0]["id"].as_i64().unwrap();

    let response = client
        .patch(format!("{base}/api/admin/customers/{customer_id}/status"))
        .bearer_auth(&token)
        .json(&json!({ "status": "inactive" }))
        .send()
        .await
        .unwrap();
    let updated = envelope(response, StatusCode::OK).await;
    assert_eq!(updated["data"]["status"], "inactive");

    let response = client
        .post(format!("{}/api/auth/login", storefront_url()))
        .json(&json!({ "email": customer.email, "password": "integration-pass" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
#[ignore = "Requires running admin and a staff account"]
async fn test_dashboard_counts() {
    let client = client();
    let token = staff_token(&client).await;

    let response = client
        .get(format!("{}/api/admin/dashboard", admin_url()))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::OK).await;
    assert!(body["data"]["totalProducts"].as_i64().unwrap() > 0);
    assert!(body["data"]["lowStockProducts"].is_array());
}

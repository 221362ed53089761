//! End-to-end checkout against a running storefront.
//!
//! Requires a migrated and seeded database and the storefront on
//! `STOREFRONT_URL`. Run with `cargo test -p bazaar-integration-tests -- --ignored`.

#![allow(clippy::unwrap_used)]

use bazaar_integration_tests::{
    client, envelope, in_stock_product, payment_event, register_customer, send_webhook,
    storefront_url,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn amount(value: &Value) -> f64 {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_checkout_then_payment_webhook_marks_order_paid() {
    let client = client();
    let customer = register_customer(&client).await;
    let base = storefront_url();
    let (product_id, _) = in_stock_product(&client).await;

    let response = client
        .post(format!("{base}/api/cart"))
        .bearer_auth(&customer.token)
        .json(&json!({ "product_id": product_id, "quantity": 2 }))
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
    let cart = envelope(response, StatusCode::OK).await;
    assert_eq!(cart["data"]["quantity"], 2);
    let total = cart["data"]["total"].clone();

    let response = client
        .post(format!("{base}/api/payments/checkout"))
        .bearer_auth(&customer.token)
        .json(&json!({ "amount": total }))
        .send()
        .await
        .unwrap();
    let checkout = envelope(response, StatusCode::CREATED).await;
    let order = &checkout["data"]["order"];
    let intent = &checkout["data"]["paymentIntent"];
    assert_eq!(order["status"], "pending");
    assert!((amount(&order["total_amount"]) - amount(&total)).abs() < 0.001);

    let order_id = order["id"].as_i64().unwrap();
    let intent_id = intent["id"].as_str().unwrap();

    let event = payment_event("payment_intent.succeeded", intent_id, order_id);
    let response = send_webhook(&client, &event).await;
    let ack: Value = response.json().await.unwrap();
    assert_eq!(ack["received"], true);

    // Redelivery is harmless
    let response = send_webhook(&client, &event).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{base}/api/orders/{order_id}"))
        .bearer_auth(&customer.token)
        .send()
        .await
        .unwrap();
    let detail = envelope(response, StatusCode::OK).await;
    assert_eq!(detail["data"]["status"], "processing");
    assert_eq!(detail["data"]["payment_status"], "paid");
    assert_eq!(detail["data"]["items"].as_array().unwrap().len(), 1);

    // The cart was emptied by placing the order
    let response = client
        .get(format!("{base}/api/cart"))
        .bearer_auth(&customer.token)
        .send()
        .await
        .unwrap();
    let cart = envelope(response, StatusCode::OK).await;
    assert_eq!(cart["data"]["itemCount"].as_u64().unwrap_or_default(), 0);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_checkout_rejects_stale_amount() {
    let client = client();
    let customer = register_customer(&client).await;
    let base = storefront_url();
    let (product_id, _) = in_stock_product(&client).await;

    let response = client
        .post(format!("{base}/api/cart"))
        .bearer_auth(&customer.token)
        .json(&json!({ "product_id": product_id, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    envelope(response, StatusCode::CREATED).await;

    let response = client
        .post(format!("{base}/api/payments/checkout"))
        .bearer_auth(&customer.token)
        .json(&json!({ "amount": "0.01" }))
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded coupons"]
async fn test_seeded_coupons_quote() {
    let client = client();
    let base = storefront_url();

    let response = client
        .post(format!("{base}/api/payments/validate-coupon"))
        .json(&json!({ "couponCode": "summer25", "cartTotal": "100" }))
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::OK).await;
    assert_eq!(body["data"]["coupon"]["code"], "SUMMER25");
    assert!((amount(&body["data"]["discount"]) - 25.0).abs() < 0.001);
    assert!((amount(&body["data"]["total"]) - 75.0).abs() < 0.001);

    let response = client
        .post(format!("{base}/api/payments/validate-coupon"))
        .json(&json!({ "couponCode": "FREESHIP", "cartTotal": "40" }))
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::OK).await;
    assert!((amount(&body["data"]["total"]) - 30.01).abs() < 0.001);

    let response = client
        .post(format!("{base}/api/payments/validate-coupon"))
        .json(&json!({ "couponCode": "NOPE", "cartTotal": "40" }))
        .send()
        .await
        .unwrap();
    let body = envelope(response, StatusCode::NOT_FOUND).await;
    assert_eq!(body["error"], "Invalid coupon code");
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_webhook_for_unknown_order_is_not_found() {
    let client = client();
    let event = payment_event("payment_intent.succeeded", "pi_missing", 999_999_999);
    let response = send_webhook(&client, &event).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

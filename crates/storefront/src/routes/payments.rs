//! Coupon quotes, checkout and the payment provider webhook.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use bazaar_core::api::ApiResponse;
use bazaar_core::coupon;
use bazaar_core::db::orders::{OrderDetail, PlaceOrder, PlacementContext};
use bazaar_core::db::validate::non_negative_amount;
use bazaar_core::db::{CouponRepository, OrderRepository};
use bazaar_core::order::apply_payment_event;
use bazaar_core::payment::{PaymentIntent, SIGNATURE_HEADER, WebhookEvent, verify_signature};
use bazaar_core::{AddressId, DiscountType};
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::{OptionalUser, RequireUser};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub coupon_code: Option<String>,
    #[validate(custom(function = "non_negative_amount"))]
    pub cart_total: Decimal,
}

/// The public face of a coupon in a quote.
#[derive(Debug, Serialize)]
pub struct CouponInfo {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CouponValidation {
    pub coupon: CouponInfo,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub total: Decimal,
}

impl From<coupon::CouponQuote> for CouponValidation {
    fn from(quote: coupon::CouponQuote) -> Self {
        Self {
            coupon: CouponInfo {
                code: quote.code,
                discount_type: quote.discount_type,
                discount_value: quote.discount_value,
            },
            discount: quote.discount,
            subtotal: quote.subtotal,
            total: quote.total,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Total the client displayed. Checkout fails if the server disagrees.
    pub amount: Option<Decimal>,
    #[validate(length(max = 64))]
    pub coupon_code: Option<String>,
    pub shipping_address_id: Option<AddressId>,
    pub billing_address_id: Option<AddressId>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub payment_intent: PaymentIntent,
    pub order: OrderDetail,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

const ACK: WebhookAck = WebhookAck { received: true };

fn required_code(code: Option<&str>) -> Result<&str> {
    code.map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::validation("Coupon code is required"))
}

/// `POST /api/payments/validate-coupon`
#[instrument(skip(state, user, body), fields(user_id))]
pub async fn validate_coupon(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    ValidatedJson(body): ValidatedJson<ValidateCouponRequest>,
) -> Result<Json<ApiResponse<CouponValidation>>> {
    if let Some(user) = &user {
        tracing::Span::current().record("user_id", user.id.as_i32());
    }
    let code = required_code(body.coupon_code.as_deref())?;

    let found = CouponRepository::new(state.pool())
        .find_active_by_code(code)
        .await?;
    let quote = coupon::evaluate(found.as_ref(), body.cart_total, Utc::now())?;
    Ok(Json(ApiResponse::ok(quote.into())))
}

/// `POST /api/payments/checkout`
///
/// Places the order from the caller's cart and opens a payment intent for
/// it. The order stays `pending` until the webhook reports the outcome.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ValidatedJson(body): ValidatedJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>)> {
    let amount = body
        .amount
        .ok_or_else(|| AppError::validation("Amount is required"))?;
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("Amount must be positive"));
    }

    let config = state.config();
    let now = Utc::now();
    let orders = OrderRepository::new(state.pool());

    let request = PlaceOrder {
        shipping_address_id: body.shipping_address_id,
        billing_address_id: body.billing_address_id,
        coupon_code: body.coupon_code,
        notes: body.notes,
    };
    let mut detail = orders
        .place_from_cart(
            &request,
            PlacementContext {
                user_id: user.id,
                policy: &config.pricing,
                currency: config.currency,
                expected_total: Some(amount),
                now,
            },
        )
        .await?;

    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let intent = PaymentIntent::new(
        detail.order.id,
        user.id,
        detail.order.total_amount,
        config.currency,
        now,
        &nonce,
    )
    .ok_or_else(|| AppError::Internal("order total out of range".to_string()))?;

    detail.order = orders.set_payment_intent(detail.order.id, &intent.id).await?;
    info!(
        order_id = %detail.order.id,
        payment_intent_id = %intent.id,
        amount = intent.amount,
        "Payment intent created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CheckoutResponse {
            payment_intent: intent,
            order: detail,
        })),
    ))
}

/// `POST /api/payments/webhook`
///
/// Always acknowledges events it does not act on so the provider stops
/// redelivering them. Only malformed or unauthenticated deliveries and
/// concurrent updates are refused.
#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let now = Utc::now();
    if let Some(secret) = &state.config().payment_webhook_secret {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        verify_signature(secret.expose_secret().as_bytes(), header, &body, now).map_err(|e| {
            warn!(error = %e, "Rejected payment webhook");
            AppError::BadRequest(format!("Webhook Error: {e}"))
        })?;
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Webhook Error: {e}")))?;

    let Some(payment_event) = event.payment_event() else {
        info!(event_type = %event.event_type, "Unhandled payment event");
        return Ok(Json(ACK));
    };
    let order_id = event
        .order_id()
        .ok_or_else(|| AppError::BadRequest("Webhook Error: missing order_id".to_string()))?;

    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !intent_matches(order.payment_intent_id.as_deref(), event.intent_id()) {
        warn!(
            order_id = %order_id,
            expected = order.payment_intent_id.as_deref(),
            received = event.intent_id(),
            "Payment intent does not match order; event ignored"
        );
        return Ok(Json(ACK));
    }

    match apply_payment_event(order.status, order.payment_status, payment_event) {
        Ok(Some(update)) => {
            let updated = orders.apply(order_id, &update).await?;
            info!(
                order_id = %order_id,
                status = %updated.status,
                payment_status = %updated.payment_status,
                "Payment event applied"
            );
        }
        Ok(None) => info!(order_id = %order_id, "Payment event already applied"),
        Err(e) => warn!(order_id = %order_id, error = %e, "Payment event ignored"),
    }

    Ok(Json(ACK))
}

/// An event may only touch the order whose checkout opened its intent.
fn intent_matches(order_intent: Option<&str>, event_intent: Option<&str>) -> bool {
    matches!((order_intent, event_intent), (Some(expected), Some(received)) if expected == received)
}

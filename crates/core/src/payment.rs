//! Payment provider types.
//!
//! Payment intents are created locally at checkout; the provider reports
//! back through a webhook whose body is [`WebhookEvent`]. When a signing
//! secret is configured, the `Payment-Signature` header is checked with
//! [`verify_signature`].

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Sha256;

use crate::order::PaymentEvent;
use crate::types::{CurrencyCode, OrderId, UserId, to_minor_units};

/// Name of the webhook signature header.
pub const SIGNATURE_HEADER: &str = "payment-signature";

/// How far a signature timestamp may drift from the server clock.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Provider-side handle for an order's payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub object: String,
    /// Amount in minor units (cents).
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub client_secret: String,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMetadata {
    #[serde(deserialize_with = "order_id_from_any")]
    pub order_id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl PaymentIntent {
    /// Build an intent for `order_id` awaiting a payment method.
    ///
    /// `nonce` must be unpredictable; it forms the client secret.
    ///
    /// Returns `None` if `total` does not fit in minor units.
    #[must_use]
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        total: Decimal,
        currency: CurrencyCode,
        now: DateTime<Utc>,
        nonce: &str,
    ) -> Option<Self> {
        let id = format!("pi_{}", now.timestamp_millis());
        Some(Self {
            client_secret: format!("{id}_secret_{nonce}"),
            id,
            object: "payment_intent".to_owned(),
            amount: to_minor_units(total)?,
            currency: currency.as_lowercase(),
            status: "requires_payment_method".to_owned(),
            metadata: PaymentMetadata {
                order_id,
                user_id: Some(user_id),
            },
        })
    }
}

/// Webhook request body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    pub payment_intent: Option<WebhookIntent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookIntent {
    pub id: Option<String>,
    pub metadata: Option<PaymentMetadata>,
}

impl WebhookEvent {
    /// The lifecycle event this webhook represents, if it is one we handle.
    #[must_use]
    pub fn payment_event(&self) -> Option<PaymentEvent> {
        match self.event_type.as_str() {
            "payment_intent.succeeded" => Some(PaymentEvent::Succeeded),
            "payment_intent.payment_failed" => Some(PaymentEvent::Failed),
            _ => None,
        }
    }

    /// Order referenced by the intent metadata.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.data
            .payment_intent
            .as_ref()?
            .metadata
            .as_ref()
            .map(|m| m.order_id)
    }

    #[must_use]
    pub fn intent_id(&self) -> Option<&str> {
        self.data.payment_intent.as_ref()?.id.as_deref()
    }
}

/// Webhook signature failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute the `v1` signature for a payload: hex HMAC-SHA256 of
/// `"{timestamp}.{body}"`.
#[must_use]
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a `t=<unix>,v1=<hex>` signature header against `body`.
///
/// # Errors
///
/// Returns a [`SignatureError`] if the header is absent, unparsable, older
/// than [`SIGNATURE_TOLERANCE_SECS`], or does not match.
pub fn verify_signature(
    secret: &[u8],
    header: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?);
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let drift = now
        .timestamp()
        .checked_sub(timestamp)
        .map(i64::unsigned_abs)
        .ok_or(SignatureError::Stale)?;
    if drift > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let expected = sign(secret, timestamp, body);
    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Providers send metadata values as strings; accept numbers too.
fn order_id_from_any<'de, D>(deserializer: D) -> Result<OrderId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(id) => Ok(OrderId::new(id)),
        Raw::Str(s) => s
            .trim()
            .parse::<i32>()
            .map(OrderId::new)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    const SECRET: &[u8] = b"whsec_test_secret";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_intent_amount_in_cents() {
        let intent = PaymentIntent::new(
            OrderId::new(5),
            UserId::new(2),
            "66.00".parse().unwrap(),
            CurrencyCode::USD,
            now(),
            "abc123",
        )
        .unwrap();
        assert_eq!(intent.amount, 6600);
        assert_eq!(intent.currency, "usd");
        assert!(intent.id.starts_with("pi_"));
        assert!(intent.client_secret.starts_with(&intent.id));
        assert!(intent.client_secret.ends_with("_secret_abc123"));
        assert_eq!(intent.metadata.order_id, OrderId::new(5));
    }

    #[test]
    fn test_parse_succeeded_event() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "type": "payment_intent.succeeded",
            "data": {"payment_intent": {"id": "pi_1", "metadata": {"order_id": "42"}}}
        }))
        .unwrap();
        assert_eq!(event.payment_event(), Some(PaymentEvent::Succeeded));
        assert_eq!(event.order_id(), Some(OrderId::new(42)));
        assert_eq!(event.intent_id(), Some("pi_1"));
    }

    #[test]
    fn test_parse_failed_event_numeric_order_id() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "type": "payment_intent.payment_failed",
            "data": {"payment_intent": {"metadata": {"order_id": 7}}}
        }))
        .unwrap();
        assert_eq!(event.payment_event(), Some(PaymentEvent::Failed));
        assert_eq!(event.order_id(), Some(OrderId::new(7)));
    }

    #[test]
    fn test_unknown_event_type() {
        let event: WebhookEvent =
            serde_json::from_value(json!({"type": "charge.refunded"})).unwrap();
        assert_eq!(event.payment_event(), None);
        assert_eq!(event.order_id(), None);
    }

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let ts = now().timestamp();
        let header = format!("t={ts},v1={}", sign(SECRET, ts, body));
        assert_eq!(verify_signature(SECRET, Some(&header), body, now()), Ok(()));
    }

    #[test]
    fn test_signature_rejections() {
        let body = b"{}";
        let ts = now().timestamp();
        let good = sign(SECRET, ts, body);

        assert_eq!(
            verify_signature(SECRET, None, body, now()),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_signature(SECRET, Some("v1=abc"), body, now()),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, Some(&format!("t={ts}")), body, now()),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(
                SECRET,
                Some(&format!("t={ts},v1={good}")),
                body,
                now() + Duration::seconds(301)
            ),
            Err(SignatureError::Stale)
        );
        assert_eq!(
            verify_signature(SECRET, Some(&format!("t={ts},v1={good}")), b"{ }", now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        for ts in [i64::MIN, i64::MAX] {
            let header = format!("t={ts},v1=00");
            assert_eq!(
                verify_signature(SECRET, Some(&header), b"{}", now()),
                Err(SignatureError::Stale)
            );
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}

//! Order lifecycle.
//!
//! Orders move through an explicit transition table:
//!
//! ```text
//! pending ──► processing ──► shipped ──► delivered
//!    │            │  │          │            │
//!    └──► cancelled◄─┘  └──► refunded ◄──────┘
//! ```
//!
//! `cancelled` and `refunded` are terminal. Anything not in the table is a
//! [`TransitionError`]. Admin edits go through [`plan_status_change`];
//! payment webhooks go through [`apply_payment_event`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrderStatus, PaymentStatus};

/// A rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot change order status from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    /// States reachable in one step.
    #[must_use]
    pub const fn allowed_next(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled, Self::Refunded],
            Self::Shipped => &[Self::Delivered, Self::Refunded],
            Self::Delivered => &[Self::Refunded],
            Self::Cancelled | Self::Refunded => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Validate a single step.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when `next` is not reachable from `self`,
    /// including `next == self`.
    pub fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

/// Payment provider outcome for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEvent {
    Succeeded,
    Failed,
}

impl PaymentEvent {
    /// The (status, `payment_status`) pair this event leads to.
    #[must_use]
    pub const fn target(self) -> (OrderStatus, PaymentStatus) {
        match self {
            Self::Succeeded => (OrderStatus::Processing, PaymentStatus::Paid),
            Self::Failed => (OrderStatus::Cancelled, PaymentStatus::Failed),
        }
    }
}

/// Field changes to persist for an order.
///
/// `expected_status` is the status the change was planned against;
/// repositories use it as a compare-and-set guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub expected_status: OrderStatus,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Decide what a payment webhook does to an order.
///
/// Returns `Ok(None)` when the order already reflects the event, so
/// redelivered webhooks are harmless.
///
/// # Errors
///
/// Returns [`TransitionError`] if the order has moved somewhere the event
/// cannot take it (e.g. a success arriving for a cancelled order), or if a
/// failure arrives for an order that is already paid.
pub fn apply_payment_event(
    status: OrderStatus,
    payment_status: PaymentStatus,
    event: PaymentEvent,
) -> Result<Option<OrderUpdate>, TransitionError> {
    let (target_status, target_payment) = event.target();
    if status == target_status && payment_status == target_payment {
        return Ok(None);
    }

    // A failure can never undo a payment that was already captured.
    if event == PaymentEvent::Failed && payment_status == PaymentStatus::Paid {
        return Err(TransitionError {
            from: status,
            to: target_status,
        });
    }

    let next = status.transition(target_status)?;
    Ok(Some(OrderUpdate {
        expected_status: status,
        status: next,
        payment_status: target_payment,
        tracking_number: None,
        shipped_at: None,
        delivered_at: None,
    }))
}

/// Plan an admin-initiated status change and its side fields.
///
/// Entering `shipped` stamps `shipped_at` and records the tracking number.
/// Entering `delivered` stamps `delivered_at`. Refunding a paid order marks
/// the payment refunded.
///
/// # Errors
///
/// Returns [`TransitionError`] if `next` is not reachable from `current`.
pub fn plan_status_change(
    current: OrderStatus,
    payment_status: PaymentStatus,
    next: OrderStatus,
    tracking_number: Option<String>,
    now: DateTime<Utc>,
) -> Result<OrderUpdate, TransitionError> {
    let status = current.transition(next)?;

    let payment_status = match (status, payment_status) {
        (OrderStatus::Refunded, PaymentStatus::Paid) => PaymentStatus::Refunded,
        (_, unchanged) => unchanged,
    };

    Ok(OrderUpdate {
        expected_status: current,
        status,
        payment_status,
        tracking_number: tracking_number.filter(|_| status == OrderStatus::Shipped),
        shipped_at: (status == OrderStatus::Shipped).then_some(now),
        delivered_at: (status == OrderStatus::Delivered).then_some(now),
    })
}

/// Human-facing order reference, e.g. `ORD-LX2K9A-00042`.
///
/// Built from the creation time and the database sequence so it is unique
/// without a lookup.
#[must_use]
pub fn order_number(now: DateTime<Utc>, sequence: i64) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    format!("ORD-{}-{:05}", to_base36(millis), sequence.rem_euclid(100_000))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while n > 0 {
        let idx = usize::try_from(n % 36).unwrap_or(0);
        out.push(DIGITS.get(idx).copied().unwrap_or(b'0'));
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

//! Cart aggregation and order totals.
//!
//! A cart is a list of [`CartLine`]s priced against the live catalog. The
//! subtotal feeds the coupon evaluator, and the resulting discount feeds
//! [`OrderTotals::compute`], which applies the store's [`PricingPolicy`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, VariantId, round_to_cents};

/// One priced line of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    /// The price a line is charged at: the variant's override when it has
    /// one, otherwise the product's price.
    #[must_use]
    pub fn resolve_price(product_price: Decimal, variant_price: Option<Decimal>) -> Decimal {
        variant_price.unwrap_or(product_price)
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sum of all line totals, rounded to the cent.
#[must_use]
pub fn subtotal(lines: &[CartLine]) -> Decimal {
    round_to_cents(lines.iter().map(CartLine::line_total).sum())
}

/// Shipping and tax rules.
///
/// These are flat store-wide constants. A production store would ask a
/// rate service; swapping this struct is the extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPolicy {
    /// Subtotals strictly above this ship for free.
    pub free_shipping_threshold: Decimal,
    /// Shipping charged at or below the threshold.
    pub flat_shipping_fee: Decimal,
    /// Tax as a fraction of the subtotal (0.10 = 10 %).
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::new(50, 0),
            flat_shipping_fee: Decimal::new(999, 2),
            tax_rate: Decimal::new(10, 2),
        }
    }
}

impl PricingPolicy {
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_shipping_fee
        }
    }

    #[must_use]
    pub fn tax_for(&self, subtotal: Decimal) -> Decimal {
        round_to_cents(subtotal * self.tax_rate)
    }
}

/// Monetary breakdown stored on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals for `subtotal` after a coupon `discount`.
    ///
    /// Tax and shipping are based on the pre-discount subtotal. The total
    /// is clamped at zero and every field is rounded to the cent.
    #[must_use]
    pub fn compute(subtotal: Decimal, discount: Decimal, policy: &PricingPolicy) -> Self {
        let subtotal = round_to_cents(subtotal);
        let discount = round_to_cents(discount.max(Decimal::ZERO));
        let tax = policy.tax_for(subtotal);
        let shipping = round_to_cents(policy.shipping_for(subtotal));
        let total = round_to_cents((subtotal - discount + tax + shipping).max(Decimal::ZERO));

        Self {
            subtotal,
            discount,
            tax,
            shipping,
            total,
        }
    }

    /// Totals for a cart with no coupon applied.
    #[must_use]
    pub fn for_lines(lines: &[CartLine], policy: &PricingPolicy) -> Self {
        Self::compute(subtotal(lines), Decimal::ZERO, policy)
    }
}

//! Coupon evaluation.
//!
//! [`evaluate`] decides whether a coupon applies to a cart subtotal and, if
//! it does, how much it takes off. It does not touch the database: callers
//! look the coupon up by its [`normalize_code`]d code and pass the clock in.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. missing or inactive coupon
//! 2. outside the `valid_from..=valid_until` window
//! 3. subtotal below `min_purchase_amount`
//! 4. `usage_count` has reached `usage_limit`
//!
//! Redemption is a separate, atomic database step (see
//! `db::coupons::CouponRepository::redeem`); passing [`evaluate`] only means
//! the coupon *was* usable when it was read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CouponId, DiscountType, round_to_cents};

/// A discount code as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the usage counter has reached the limit.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
    }

    /// Raw discount for `subtotal` before rounding, with the cap applied.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => subtotal * self.discount_value / Decimal::ONE_HUNDRED,
            DiscountType::Fixed => self.discount_value,
        };

        match self.max_discount_amount {
            Some(cap) => raw.min(cap),
            None => raw,
        }
    }
}

/// Result of applying a coupon to a subtotal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CouponQuote {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub total: Decimal,
}

/// Why a coupon does not apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponRejection {
    /// No active coupon has this code.
    #[error("Invalid coupon code")]
    InvalidCode,
    /// `valid_from` is in the future.
    #[error("Coupon is not yet valid")]
    NotYetValid,
    /// `valid_until` is in the past.
    #[error("Coupon has expired")]
    Expired,
    /// Subtotal is below the coupon's minimum.
    #[error("Minimum purchase amount of ${minimum} required")]
    MinimumNotMet {
        /// Required minimum subtotal.
        minimum: Decimal,
    },
    /// Usage counter has reached its limit.
    #[error("Coupon usage limit exceeded")]
    UsageLimitReached,
}

/// Canonical form of a user-entered coupon code.
///
/// ```
/// assert_eq!(bazaar_core::coupon::normalize_code("  summer25 "), "SUMMER25");
/// ```
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Evaluate `coupon` against a cart `subtotal` at time `now`.
///
/// # Errors
///
/// Returns the first [`CouponRejection`] that applies, in the order listed
/// in the module docs.
pub fn evaluate(
    coupon: Option<&Coupon>,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<CouponQuote, CouponRejection> {
    let coupon = coupon
        .filter(|c| c.is_active)
        .ok_or(CouponRejection::InvalidCode)?;

    if coupon.valid_from.is_some_and(|from| now < from) {
        return Err(CouponRejection::NotYetValid);
    }
    if coupon.valid_until.is_some_and(|until| now > until) {
        return Err(CouponRejection::Expired);
    }

    if let Some(minimum) = coupon.min_purchase_amount
        && subtotal < minimum
    {
        return Err(CouponRejection::MinimumNotMet { minimum });
    }

    if coupon.is_exhausted() {
        return Err(CouponRejection::UsageLimitReached);
    }

    let discount = round_to_cents(coupon.discount_for(subtotal));
    let total = round_to_cents((subtotal - discount).max(Decimal::ZERO));

    Ok(CouponQuote {
        code: coupon.code.clone(),
        discount_type: coupon.discount_type,
        discount_value: coupon.discount_value,
        discount,
        subtotal,
        total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn coupon(code: &str, discount_type: DiscountType, value: &str) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: code.to_owned(),
            description: None,
            discount_type,
            discount_value: dec(value),
            min_purchase_amount: None,
            max_discount_amount: None,
            usage_limit: None,
            usage_count: 0,
            valid_from: None,
            valid_until: None,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_summer25_on_100() {
        let c = coupon("SUMMER25", DiscountType::Percentage, "25");
        let quote = evaluate(Some(&c), dec("100"), now()).unwrap();
        assert_eq!(quote.discount, dec("25"));
        assert_eq!(quote.total, dec("75"));
        assert_eq!(quote.code, "SUMMER25");
    }

    #[test]
    fn test_freeship_on_40() {
        let c = coupon("FREESHIP", DiscountType::Fixed, "9.99");
        let quote = evaluate(Some(&c), dec("40"), now()).unwrap();
        assert_eq!(quote.discount, dec("9.99"));
        assert_eq!(quote.total, dec("30.01"));
    }

    #[test]
    fn test_percentage_discount_is_min_of_rate_and_cap() {
        let mut c = coupon("CAPPED", DiscountType::Percentage, "15");
        c.max_discount_amount = Some(dec("20"));

        for cents in (0..40_000).step_by(137) {
            let subtotal = Decimal::new(cents, 2);
            let quote = evaluate(Some(&c), subtotal, now()).unwrap();
            let expected = round_to_cents((subtotal * dec("0.15")).min(dec("20")));
            assert_eq!(quote.discount, expected, "subtotal {subtotal}");
            assert!(quote.discount <= dec("20"));
        }
    }

    #[test]
    fn test_fixed_discount_respects_cap() {
        let mut c = coupon("BIG", DiscountType::Fixed, "50");
        c.max_discount_amount = Some(dec("30"));
        let quote = evaluate(Some(&c), dec("100"), now()).unwrap();
        assert_eq!(quote.discount, dec("30"));
    }

    #[test]
    fn test_total_never_negative() {
        let c = coupon("TENOFF", DiscountType::Fixed, "10");
        for cents in 0..1_500 {
            let quote = evaluate(Some(&c), Decimal::new(cents, 2), now()).unwrap();
            assert!(quote.total >= Decimal::ZERO);
        }
        let quote = evaluate(Some(&c), dec("4.50"), now()).unwrap();
        assert_eq!(quote.total, Decimal::ZERO);
    }

    #[test]
    fn test_rounds_half_up_at_the_cent() {
        let c = coupon("THIRD", DiscountType::Percentage, "33.3");
        // 10.05 * 0.333 = 3.34665
        let quote = evaluate(Some(&c), dec("10.05"), now()).unwrap();
        assert_eq!(quote.discount, dec("3.35"));
        assert_eq!(quote.total, dec("6.70"));

        let c = coupon("HALF", DiscountType::Percentage, "50");
        // 0.05 * 0.5 = 0.025
        let quote = evaluate(Some(&c), dec("0.05"), now()).unwrap();
        assert_eq!(quote.discount, dec("0.03"));
    }

    #[test]
    fn test_missing_coupon_is_invalid() {
        assert_eq!(
            evaluate(None, dec("100"), now()),
            Err(CouponRejection::InvalidCode)
        );
    }

    #[test]
    fn test_inactive_coupon_is_invalid() {
        let mut c = coupon("OFF", DiscountType::Fixed, "5");
        c.is_active = false;
        assert_eq!(
            evaluate(Some(&c), dec("100"), now()),
            Err(CouponRejection::InvalidCode)
        );
    }

    #[test]
    fn test_below_minimum_rejected() {
        let mut c = coupon("MIN50", DiscountType::Percentage, "10");
        c.min_purchase_amount = Some(dec("50"));

        for cents in (0..5_000).step_by(7) {
            let err = evaluate(Some(&c), Decimal::new(cents, 2), now()).unwrap_err();
            assert_eq!(err, CouponRejection::MinimumNotMet { minimum: dec("50") });
        }
        assert!(evaluate(Some(&c), dec("50"), now()).is_ok());
        assert_eq!(
            CouponRejection::MinimumNotMet { minimum: dec("50.00") }.to_string(),
            "Minimum purchase amount of $50.00 required"
        );
    }

    #[test]
    fn test_usage_limit_rejects_regardless_of_cart() {
        let mut c = coupon("ONCE", DiscountType::Fixed, "5");
        c.usage_limit = Some(3);
        c.usage_count = 3;

        for subtotal in ["0", "10", "1000", "99999.99"] {
            assert_eq!(
                evaluate(Some(&c), dec(subtotal), now()),
                Err(CouponRejection::UsageLimitReached)
            );
        }

        c.usage_count = 2;
        assert!(evaluate(Some(&c), dec("10"), now()).is_ok());
    }

    #[test]
    fn test_minimum_checked_before_usage_limit() {
        let mut c = coupon("BOTH", DiscountType::Fixed, "5");
        c.min_purchase_amount = Some(dec("20"));
        c.usage_limit = Some(1);
        c.usage_count = 1;
        assert!(matches!(
            evaluate(Some(&c), dec("10"), now()),
            Err(CouponRejection::MinimumNotMet { .. })
        ));
    }

    #[test]
    fn test_validity_window() {
        let mut c = coupon("WINDOW", DiscountType::Fixed, "5");
        c.valid_from = Some(now() + Duration::days(1));
        assert_eq!(
            evaluate(Some(&c), dec("100"), now()),
            Err(CouponRejection::NotYetValid)
        );

        c.valid_from = Some(now() - Duration::days(10));
        c.valid_until = Some(now() - Duration::seconds(1));
        assert_eq!(
            evaluate(Some(&c), dec("100"), now()),
            Err(CouponRejection::Expired)
        );

        c.valid_until = Some(now());
        assert!(evaluate(Some(&c), dec("100"), now()).is_ok());
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("summer25"), "SUMMER25");
        assert_eq!(normalize_code(" FreeShip\t"), "FREESHIP");
    }
}

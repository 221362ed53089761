//! Money helpers.
//!
//! Amounts are plain [`Decimal`]s in the store currency. Every amount that
//! leaves the pricing code is rounded to the cent, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to two decimal places, half away from zero.
///
/// ```
/// use bazaar_core::round_to_cents;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_to_cents(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
/// ```
#[must_use]
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an amount to integer minor units (cents), as payment providers
/// expect. Returns `None` if the value does not fit in an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;

    (round_to_cents(amount) * Decimal::ONE_HUNDRED).to_i64()
}

/// ISO 4217 currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
}

impl CurrencyCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
        }
    }

    /// Lowercase form used in payment intents.
    #[must_use]
    pub fn as_lowercase(self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to_cents(Decimal::new(12_345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_to_cents(Decimal::new(12_344, 3)), Decimal::new(1234, 2));
        assert_eq!(round_to_cents(Decimal::new(5, 3)), Decimal::new(1, 2));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(6600, 2)), Some(6600));
        assert_eq!(to_minor_units(Decimal::new(3001, 2)), Some(3001));
        assert_eq!(to_minor_units(Decimal::new(19_995, 3)), Some(2000));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!(CurrencyCode::EUR.as_lowercase(), "eur");
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}

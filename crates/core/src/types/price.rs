//! Decimal money amounts.
//!
//! Prices arrive from the API as JSON numbers and are held as
//! [`rust_decimal::Decimal`] so that line totals are exact. Totals shown to
//! the shopper are truncated toward negative infinity at the cent, never
//! rounded up.

use core::fmt;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept in displayed totals.
const CENT_SCALE: u32 = 2;

/// Floor an amount at the hundredths place.
///
/// `9.999` becomes `9.99`, not `10.00`.
///
/// ```
/// use freshcart_core::truncate_to_cents;
/// use rust_decimal::Decimal;
///
/// let amount: Decimal = "9.999".parse().unwrap();
/// assert_eq!(truncate_to_cents(amount).to_string(), "9.99");
/// ```
#[must_use]
pub fn truncate_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CENT_SCALE, RoundingStrategy::ToNegativeInfinity)
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amount = truncate_to_cents(self.amount);
        write!(f, "{}{amount:.2}", self.currency_code.symbol())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    INR,
}

impl CurrencyCode {
    /// Display symbol for this currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::INR => "₹",
        }
    }

    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::INR => "INR",
        }
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "INR" => Ok(Self::INR),
            other => Err(format!("unsupported currency code '{other}'")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_truncate_floors_instead_of_rounding() {
        assert_eq!(truncate_to_cents(dec("9.999")), dec("9.99"));
        assert_eq!(truncate_to_cents(dec("21.110")), dec("21.11"));
        assert_eq!(truncate_to_cents(dec("0.005")), dec("0.00"));
        assert_eq!(truncate_to_cents(dec("12")), dec("12"));
    }

    #[test]
    fn test_price_display_uses_symbol_and_two_places() {
        let price = Price::new(dec("10.5"), CurrencyCode::EUR);
        assert_eq!(price.to_string(), "€10.50");

        let price = Price::new(dec("9.999"), CurrencyCode::USD);
        assert_eq!(price.to_string(), "$9.99");
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("usd".parse::<CurrencyCode>(), Ok(CurrencyCode::USD));
        assert_eq!(" INR ".parse::<CurrencyCode>(), Ok(CurrencyCode::INR));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}

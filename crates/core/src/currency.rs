//! Currency - Type-safe ISO currency codes
//!
//! The platform settles player wallets in fiat. Common operating
//! currencies are pre-defined; anything else (e.g. a white-label play
//! currency) falls back to the `Other` variant.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing currencies
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Empty currency code")]
    EmptyCode,

    #[error("Currency code too long (max 10 chars): {0}")]
    TooLong(String),

    #[error("Invalid currency code format: {0}")]
    InvalidFormat(String),
}

/// ISO currency codes.
///
/// # Examples
/// ```
/// use betledger_core::Currency;
///
/// let usd: Currency = "usd".parse().unwrap();
/// assert_eq!(usd, Currency::Usd);
/// assert_eq!(usd.to_string(), "USD");
///
/// // White-label play currency
/// let custom: Currency = "FUNCOIN".parse().unwrap();
/// assert!(matches!(custom, Currency::Other(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// British Pound
    Gbp,
    /// Brazilian Real
    Brl,
    /// Nigerian Naira
    Ngn,
    /// Kenyan Shilling
    Kes,
    /// Ghanaian Cedi
    Ghs,
    /// South African Rand
    Zar,
    /// Indian Rupee
    Inr,
    /// Japanese Yen
    Jpy,
    /// Any other currency/token code
    Other(String),
}

impl Currency {
    /// Returns the currency code as a string slice
    pub fn code(&self) -> &str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Brl => "BRL",
            Currency::Ngn => "NGN",
            Currency::Kes => "KES",
            Currency::Ghs => "GHS",
            Currency::Zar => "ZAR",
            Currency::Inr => "INR",
            Currency::Jpy => "JPY",
            Currency::Other(s) => s.as_str(),
        }
    }

    /// Number of minor-unit decimal places (2 for most fiat, 0 for JPY).
    pub fn minor_units(&self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// The smallest representable unit, e.g. 0.01 for USD.
    ///
    /// Used as the reconciliation epsilon.
    pub fn smallest_unit(&self) -> Decimal {
        Decimal::new(1, self.minor_units())
    }

    /// Round a value to this currency's minor unit.
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp(self.minor_units())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if s.is_empty() {
            return Err(CurrencyError::EmptyCode);
        }

        if s.len() > 10 {
            return Err(CurrencyError::TooLong(s));
        }

        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CurrencyError::InvalidFormat(s));
        }

        Ok(match s.as_str() {
            "USD" => Currency::Usd,
            "EUR" => Currency::Eur,
            "GBP" => Currency::Gbp,
            "BRL" => Currency::Brl,
            "NGN" => Currency::Ngn,
            "KES" => Currency::Kes,
            "GHS" => Currency::Ghs,
            "ZAR" => Currency::Zar,
            "INR" => Currency::Inr,
            "JPY" => Currency::Jpy,
            _ => Currency::Other(s),
        })
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.code().to_string()
    }
}

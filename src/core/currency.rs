use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{AppError, Result};

/// Supported loan currencies.
///
/// Amounts are always carried as `i64` minor units; the scale only matters when
/// rendering an amount for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Singapore Dollar (2 decimal places)
    SGD,
    /// Thai Baht (2 decimal places)
    THB,
    /// Vietnamese Dong (no decimal places)
    VND,
    /// US Dollar (2 decimal places)
    USD,
}

impl Currency {
    /// Number of minor-unit digits for this currency
    pub fn scale(&self) -> u32 {
        match self {
            Currency::VND => 0,
            Currency::SGD | Currency::THB | Currency::USD => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::SGD => "SGD",
            Currency::THB => "THB",
            Currency::VND => "VND",
            Currency::USD => "USD",
        }
    }

    /// Converts minor units to a major-unit decimal (`12345` SGD -> `123.45`)
    pub fn to_major(&self, minor_units: i64) -> Decimal {
        Decimal::new(minor_units, self.scale())
    }

    /// Formats an amount given in minor units for display
    pub fn format_amount(&self, minor_units: i64) -> String {
        format!("{} {}", self, self.to_major(minor_units))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SGD" => Ok(Currency::SGD),
            "THB" => Ok(Currency::THB),
            "VND" => Ok(Currency::VND),
            "USD" => Ok(Currency::USD),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<&str> for Currency {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Converts an amount between currencies.
///
/// Implementations must be synchronous and free of side effects; the repayment
/// allocator calls them inside an open unit of work.
pub trait CurrencyConverter: Send + Sync {
    fn convert(&self, amount: i64, from: Currency, to: Currency) -> Result<i64>;
}

/// Pass-through converter. Returns the amount unchanged for any currency pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl CurrencyConverter for IdentityConverter {
    fn convert(&self, amount: i64, _from: Currency, _to: Currency) -> Result<i64> {
        Ok(amount)
    }
}

/// Only accepts payments already denominated in the loan currency.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameCurrencyConverter;

impl CurrencyConverter for SameCurrencyConverter {
    fn convert(&self, amount: i64, from: Currency, to: Currency) -> Result<i64> {
        if from != to {
            return Err(AppError::validation(format!(
                "Payment currency '{}' does not match loan currency '{}'",
                from, to
            )));
        }
        Ok(amount)
    }
}

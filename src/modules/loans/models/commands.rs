use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::Currency;

/// Input for originating a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLoan {
    pub owner_id: String,
    /// Principal in minor units
    pub amount: i64,
    pub currency_code: Currency,
    pub terms: i32,
    pub processed_at: NaiveDate,
}

/// Input for applying a payment to a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingRepayment {
    /// Amount in minor units of `currency_code`
    pub amount: i64,
    pub currency_code: Currency,
    pub received_at: NaiveDate,
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// Ledger entry for money actually received against a loan. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedRepayment {
    pub id: String,
    pub loan_id: String,
    /// Amount as presented by the payer, in `currency_code`
    pub amount: i64,
    pub currency_code: Currency,
    /// Amount in the loan currency that was allocated to installments
    pub converted_amount: i64,
    pub received_at: NaiveDate,
    pub created_at: NaiveDateTime,
}

impl ReceivedRepayment {
    pub fn new(
        loan_id: String,
        amount: i64,
        currency_code: Currency,
        converted_amount: i64,
        received_at: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Self> {
        if amount <= 0 {
            return Err(AppError::validation(format!(
                "Repayment amount must be positive, got {}",
                amount
            )));
        }

        if converted_amount <= 0 {
            return Err(AppError::validation(format!(
                "Converted repayment amount must be positive, got {}",
                converted_amount
            )));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            loan_id,
            amount,
            currency_code,
            converted_amount,
            received_at,
            created_at: now,
        })
    }
}

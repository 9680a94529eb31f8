use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// A principal owed by a user, repaid through scheduled installments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub owner_id: String,
    /// Principal in minor units
    pub amount: i64,
    /// Number of monthly installments
    pub terms: i32,
    /// Sum of the outstanding balances of every scheduled repayment
    pub outstanding_amount: i64,
    pub currency_code: Currency,
    pub processed_at: NaiveDate,
    pub status: LoanStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Loan status, derived from the aggregate outstanding amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Due,
    Repaid,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Repaid => "repaid",
        }
    }

    /// `Repaid` exactly when nothing is outstanding
    pub fn for_outstanding(outstanding_amount: i64) -> Self {
        if outstanding_amount == 0 {
            Self::Repaid
        } else {
            Self::Due
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for LoanStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "due" => Ok(Self::Due),
            "repaid" => Ok(Self::Repaid),
            _ => Err(format!("Invalid loan status: {}", value)),
        }
    }
}

impl Loan {
    /// Create a new loan with its full principal outstanding
    ///
    /// # Arguments
    /// * `owner_id` - Borrower
    /// * `amount` - Principal in minor units, must be positive
    /// * `currency_code` - Loan currency
    /// * `terms` - Number of monthly installments, must be positive
    /// * `processed_at` - Date the loan was processed; first due date is one month later
    /// * `now` - Creation timestamp
    pub fn new(
        owner_id: String,
        amount: i64,
        currency_code: Currency,
        terms: i32,
        processed_at: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Self> {
        if amount <= 0 {
            return Err(AppError::validation(format!(
                "Loan amount must be positive, got {}",
                amount
            )));
        }

        if terms <= 0 {
            return Err(AppError::validation(format!(
                "Loan terms must be positive, got {}",
                terms
            )));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            amount,
            terms,
            outstanding_amount: amount,
            currency_code,
            processed_at,
            status: LoanStatus::Due,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_repaid(&self) -> bool {
        self.status == LoanStatus::Repaid
    }

    /// Replace the aggregate outstanding amount and derive the status from it
    pub fn set_outstanding(&mut self, outstanding_amount: i64, now: NaiveDateTime) -> Result<()> {
        if outstanding_amount < 0 {
            return Err(AppError::internal(format!(
                "Loan {} outstanding amount cannot be negative, got {}",
                self.id, outstanding_amount
            )));
        }

        self.outstanding_amount = outstanding_amount;
        self.status = LoanStatus::for_outstanding(outstanding_amount);
        self.updated_at = now;

        Ok(())
    }
}

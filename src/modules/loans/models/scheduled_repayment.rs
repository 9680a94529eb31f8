use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// One installment obligation of a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRepayment {
    pub id: String,
    pub loan_id: String,
    /// Sequential number (1, 2, 3...), breaks due-date ties
    pub installment_number: i32,
    /// Fixed amount due for this installment
    pub amount: i64,
    /// Remaining balance, always within `0..=amount`
    pub outstanding_amount: i64,
    pub currency_code: Currency,
    pub due_date: NaiveDate,
    pub status: RepaymentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Installment status
///
/// `Due -> Partial -> Repaid` or `Due -> Repaid`. `Repaid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentStatus {
    /// Nothing paid yet
    Due,
    /// Some, but not all, of the amount paid
    Partial,
    /// Fully paid
    Repaid,
}

impl RepaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Due => "due",
            Self::Partial => "partial",
            Self::Repaid => "repaid",
        }
    }
}

impl std::fmt::Display for RepaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for RepaymentStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "due" => Ok(Self::Due),
            "partial" => Ok(Self::Partial),
            "repaid" => Ok(Self::Repaid),
            _ => Err(format!("Invalid repayment status: {}", value)),
        }
    }
}

impl ScheduledRepayment {
    /// Create a new scheduled repayment with its full amount outstanding
    ///
    /// # Arguments
    /// * `loan_id` - Parent loan ID
    /// * `installment_number` - Sequential number (1-based)
    /// * `amount` - Amount due, zero when the principal is smaller than the terms
    /// * `currency_code` - Loan currency
    /// * `due_date` - Payment due date
    /// * `now` - Creation timestamp
    pub fn new(
        loan_id: String,
        installment_number: i32,
        amount: i64,
        currency_code: Currency,
        due_date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Self> {
        if installment_number < 1 {
            return Err(AppError::validation(format!(
                "Installment number must be at least 1, got {}",
                installment_number
            )));
        }

        if amount < 0 {
            return Err(AppError::validation("Installment amount must not be negative"));
        }

        // Nothing is owed on a zero installment, so it starts out repaid
        let status = if amount == 0 {
            RepaymentStatus::Repaid
        } else {
            RepaymentStatus::Due
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            loan_id,
            installment_number,
            amount,
            outstanding_amount: amount,
            currency_code,
            due_date,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_repaid(&self) -> bool {
        self.status == RepaymentStatus::Repaid
    }

    /// Apply up to `available` minor units to this installment
    ///
    /// Returns the amount actually applied. Repaid installments and a zero
    /// `available` leave the installment untouched and return 0.
    pub fn apply(&mut self, available: i64, now: NaiveDateTime) -> i64 {
        if self.is_repaid() || available <= 0 {
            return 0;
        }

        let applied = available.min(self.outstanding_amount);
        if applied == 0 {
            return 0;
        }

        self.outstanding_amount -= applied;
        self.status = if self.outstanding_amount == 0 {
            RepaymentStatus::Repaid
        } else {
            RepaymentStatus::Partial
        };
        self.updated_at = now;

        applied
    }
}

use chrono::{Months, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::core::{AppError, Result};
use crate::modules::loans::models::{Loan, ScheduledRepayment};

/// Calculator for loan installment schedules
///
/// Splits the principal into `terms` equal installments with the floor of the
/// division, and lets the last installment absorb the remainder so the schedule
/// always sums to the principal exactly.
pub struct ScheduleCalculator;

impl ScheduleCalculator {
    /// Calculate the scheduled repayments for a freshly created loan
    ///
    /// # Arguments
    /// * `loan` - Loan to schedule (amount, terms, currency and processed_at are read)
    /// * `now` - Creation timestamp for the schedule rows
    ///
    /// # Returns
    /// `loan.terms` scheduled repayments ordered by due date
    pub fn calculate_schedules(loan: &Loan, now: NaiveDateTime) -> Result<Vec<ScheduledRepayment>> {
        let amounts = Self::calculate_installment_amounts(loan.amount, loan.terms)?;

        debug!(
            loan_id = loan.id.as_str(),
            terms = loan.terms,
            amount = loan.amount,
            "Calculating scheduled repayments"
        );

        let mut schedules = Vec::with_capacity(amounts.len());
        for (index, amount) in amounts.into_iter().enumerate() {
            let installment_number = (index + 1) as i32;
            let due_date = Self::due_date(loan.processed_at, installment_number)?;

            schedules.push(ScheduledRepayment::new(
                loan.id.clone(),
                installment_number,
                amount,
                loan.currency_code,
                due_date,
                now,
            )?);
        }

        let scheduled_total: i64 = schedules.iter().map(|s| s.amount).sum();
        if scheduled_total != loan.amount {
            warn!(
                loan_id = loan.id.as_str(),
                scheduled_total, loan_amount = loan.amount, "Schedule total mismatch"
            );
            return Err(AppError::internal(format!(
                "Scheduled repayments ({}) do not sum to loan amount ({})",
                scheduled_total, loan.amount
            )));
        }

        Ok(schedules)
    }

    /// Split `amount` into `terms` installments, last one absorbing the remainder
    ///
    /// `amount = 5000, terms = 3` gives `[1666, 1666, 1668]`; `amount = 2, terms = 3`
    /// gives `[0, 0, 2]`.
    pub fn calculate_installment_amounts(amount: i64, terms: i32) -> Result<Vec<i64>> {
        if terms <= 0 {
            return Err(AppError::validation(format!(
                "Loan terms must be positive, got {}",
                terms
            )));
        }

        if amount <= 0 {
            return Err(AppError::validation(format!(
                "Loan amount must be positive, got {}",
                amount
            )));
        }

        let count = terms as usize;
        let base_amount = amount / i64::from(terms);
        let last_amount = amount - base_amount * i64::from(terms - 1);

        let mut amounts = vec![base_amount; count];
        amounts[count - 1] = last_amount;

        Ok(amounts)
    }

    /// Due date of the n-th installment (1-based)
    ///
    /// Always offset from `processed_at`, never from the previous due date.
    /// Days past the end of the target month clamp to its last day.
    pub fn due_date(processed_at: NaiveDate, installment_number: i32) -> Result<NaiveDate> {
        let months = u32::try_from(installment_number).map_err(|_| {
            AppError::validation(format!(
                "Installment number must be positive, got {}",
                installment_number
            ))
        })?;

        processed_at
            .checked_add_months(Months::new(months))
            .ok_or_else(|| AppError::validation("Failed to calculate due date"))
    }
}

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::core::{AppError, Result};
use crate::modules::loans::models::{RepaymentStatus, ScheduledRepayment};

/// Portion of a payment applied to one scheduled repayment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedAmount {
    pub scheduled_repayment_id: String,
    pub applied: i64,
    pub outstanding_amount: i64,
    pub status: RepaymentStatus,
}

/// Outcome of allocating one payment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Allocation {
    /// Installments that received money, in allocation order
    pub applied: Vec<AppliedAmount>,
    /// Sum of `applied`
    pub applied_total: i64,
    /// Excess that found no outstanding installment
    pub unapplied: i64,
}

impl Allocation {
    pub fn is_overpaid(&self) -> bool {
        self.unapplied > 0
    }
}

/// Distributes a payment across scheduled repayments in due-date order
pub struct RepaymentAllocator;

impl RepaymentAllocator {
    /// Stable sort by `(due_date, installment_number)`
    pub fn sort_by_due_date(schedules: &mut [ScheduledRepayment]) {
        schedules.sort_by_key(|s| (s.due_date, s.installment_number));
    }

    /// Allocate `amount` across `schedules`, mutating them in place
    ///
    /// # Business Rules
    /// - Installments are visited in due-date order
    /// - Repaid installments are skipped and never mutated
    /// - Each installment takes `min(outstanding, remaining)`
    /// - Allocation stops once the payment is used up; later installments keep their state
    /// - Excess is reported as `unapplied`, never stored as a negative balance
    pub fn allocate(
        schedules: &mut [ScheduledRepayment],
        amount: i64,
        now: NaiveDateTime,
    ) -> Result<Allocation> {
        if amount <= 0 {
            return Err(AppError::validation(format!(
                "Repayment amount must be positive, got {}",
                amount
            )));
        }

        Self::sort_by_due_date(schedules);

        let mut allocation = Allocation::default();
        let mut remaining = amount;

        for schedule in schedules.iter_mut() {
            if remaining == 0 {
                break;
            }

            let applied = schedule.apply(remaining, now);
            if applied == 0 {
                continue;
            }

            remaining -= applied;
            allocation.applied_total += applied;
            allocation.applied.push(AppliedAmount {
                scheduled_repayment_id: schedule.id.clone(),
                applied,
                outstanding_amount: schedule.outstanding_amount,
                status: schedule.status,
            });
        }

        allocation.unapplied = remaining;

        Ok(allocation)
    }

    /// Aggregate outstanding balance over all installments
    pub fn outstanding_total(schedules: &[ScheduledRepayment]) -> i64 {
        schedules.iter().map(|s| s.outstanding_amount).sum()
    }
}

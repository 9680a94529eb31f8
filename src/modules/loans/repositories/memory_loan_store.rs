use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::{AppError, Result};
use crate::modules::loans::models::{Loan, ReceivedRepayment, ScheduledRepayment};
use crate::modules::loans::repositories::{LoanStore, LoanUnitOfWork};

/// Write operation that can be made to fail, for exercising rollback paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertLoan,
    InsertScheduledRepayments,
    InsertReceivedRepayment,
    UpdateLoan,
    UpdateScheduledRepayment,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct LoanBook {
    loans: HashMap<String, Loan>,
    scheduled_repayments: Vec<ScheduledRepayment>,
    received_repayments: Vec<ReceivedRepayment>,
}

#[derive(Debug, Default)]
struct Shared {
    book: LoanBook,
    fail_point: Option<FailPoint>,
}

/// Process-local loan store
///
/// A unit of work holds the store lock from `begin` until it is committed or
/// dropped, so units of work run strictly one after another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoanStore {
    shared: Arc<Mutex<Shared>>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later unit of work fail at `fail_point` until cleared
    pub async fn inject_failure(&self, fail_point: FailPoint) {
        self.shared.lock().await.fail_point = Some(fail_point);
    }

    pub async fn clear_failure(&self) {
        self.shared.lock().await.fail_point = None;
    }
}

#[async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn begin(&self) -> Result<Box<dyn LoanUnitOfWork>> {
        let guard = self.shared.clone().lock_owned().await;
        let staged = guard.book.clone();
        let fail_point = guard.fail_point;

        Ok(Box::new(InMemoryUnitOfWork {
            guard,
            staged,
            fail_point,
        }))
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Shared>,
    staged: LoanBook,
    fail_point: Option<FailPoint>,
}

impl InMemoryUnitOfWork {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_point == Some(point) {
            return Err(AppError::transaction(format!("Injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl LoanUnitOfWork for InMemoryUnitOfWork {
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        self.check(FailPoint::InsertLoan)?;

        if self.staged.loans.contains_key(&loan.id) {
            return Err(AppError::transaction(format!("Loan '{}' already exists", loan.id)));
        }

        self.staged.loans.insert(loan.id.clone(), loan.clone());
        Ok(())
    }

    async fn insert_scheduled_repayments(&mut self, schedules: &[ScheduledRepayment]) -> Result<()> {
        self.check(FailPoint::InsertScheduledRepayments)?;

        for schedule in schedules {
            if !self.staged.loans.contains_key(&schedule.loan_id) {
                return Err(AppError::not_found(format!(
                    "Loan '{}' not found",
                    schedule.loan_id
                )));
            }
        }

        self.staged.scheduled_repayments.extend_from_slice(schedules);
        Ok(())
    }

    async fn insert_received_repayment(&mut self, repayment: &ReceivedRepayment) -> Result<()> {
        self.check(FailPoint::InsertReceivedRepayment)?;

        if !self.staged.loans.contains_key(&repayment.loan_id) {
            return Err(AppError::not_found(format!(
                "Loan '{}' not found",
                repayment.loan_id
            )));
        }

        self.staged.received_repayments.push(repayment.clone());
        Ok(())
    }

    async fn find_loan(&mut self, id: &str) -> Result<Option<Loan>> {
        Ok(self.staged.loans.get(id).cloned())
    }

    async fn find_loan_for_update(&mut self, id: &str) -> Result<Option<Loan>> {
        // The whole store is already held by this unit of work
        self.find_loan(id).await
    }

    async fn find_scheduled_repayments(&mut self, loan_id: &str) -> Result<Vec<ScheduledRepayment>> {
        let mut schedules: Vec<_> = self
            .staged
            .scheduled_repayments
            .iter()
            .filter(|s| s.loan_id == loan_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| (s.due_date, s.installment_number));
        Ok(schedules)
    }

    async fn find_received_repayments(&mut self, loan_id: &str) -> Result<Vec<ReceivedRepayment>> {
        let mut repayments: Vec<_> = self
            .staged
            .received_repayments
            .iter()
            .filter(|r| r.loan_id == loan_id)
            .cloned()
            .collect();
        repayments.sort_by_key(|r| (r.received_at, r.created_at));
        Ok(repayments)
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        self.check(FailPoint::UpdateLoan)?;

        let stored = self
            .staged
            .loans
            .get_mut(&loan.id)
            .ok_or_else(|| AppError::not_found(format!("Loan '{}' not found", loan.id)))?;

        stored.outstanding_amount = loan.outstanding_amount;
        stored.status = loan.status;
        stored.updated_at = loan.updated_at;
        Ok(())
    }

    async fn update_scheduled_repayment(&mut self, schedule: &ScheduledRepayment) -> Result<()> {
        self.check(FailPoint::UpdateScheduledRepayment)?;

        let stored = self
            .staged
            .scheduled_repayments
            .iter_mut()
            .find(|s| s.id == schedule.id)
            .ok_or_else(|| {
                AppError::not_found(format!("Scheduled repayment '{}' not found", schedule.id))
            })?;

        stored.outstanding_amount = schedule.outstanding_amount;
        stored.status = schedule.status;
        stored.updated_at = schedule.updated_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.check(FailPoint::Commit)?;

        let InMemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        guard.book = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

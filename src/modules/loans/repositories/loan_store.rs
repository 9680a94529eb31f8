use async_trait::async_trait;

use crate::core::Result;
use crate::modules::loans::models::{Loan, ReceivedRepayment, ScheduledRepayment};

/// Entry point to loan persistence
///
/// Every read or write goes through a unit of work obtained from [`LoanStore::begin`].
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Open a new unit of work
    async fn begin(&self) -> Result<Box<dyn LoanUnitOfWork>>;
}

/// Transaction-scoped access to loans and their repayments
///
/// Writes become visible only after [`LoanUnitOfWork::commit`]. Dropping a unit
/// of work without committing discards every write made through it.
#[async_trait]
pub trait LoanUnitOfWork: Send {
    /// Insert a new loan
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()>;

    /// Insert a batch of scheduled repayments
    async fn insert_scheduled_repayments(&mut self, schedules: &[ScheduledRepayment]) -> Result<()>;

    /// Append a received repayment
    async fn insert_received_repayment(&mut self, repayment: &ReceivedRepayment) -> Result<()>;

    /// Find a loan by ID without locking it
    async fn find_loan(&mut self, id: &str) -> Result<Option<Loan>>;

    /// Find a loan by ID and hold it exclusively until the unit of work ends
    async fn find_loan_for_update(&mut self, id: &str) -> Result<Option<Loan>>;

    /// Scheduled repayments of a loan ordered by `(due_date, installment_number)`
    async fn find_scheduled_repayments(&mut self, loan_id: &str) -> Result<Vec<ScheduledRepayment>>;

    /// Received repayments of a loan ordered by `(received_at, created_at)`
    async fn find_received_repayments(&mut self, loan_id: &str) -> Result<Vec<ReceivedRepayment>>;

    /// Persist outstanding amount and status of a loan
    async fn update_loan(&mut self, loan: &Loan) -> Result<()>;

    /// Persist outstanding amount and status of a scheduled repayment
    async fn update_scheduled_repayment(&mut self, schedule: &ScheduledRepayment) -> Result<()>;

    /// Make every write of this unit of work durable
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every write of this unit of work
    async fn rollback(self: Box<Self>) -> Result<()>;
}

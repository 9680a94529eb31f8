// Loan origination and repayment allocation
//
// Implements:
// - Loan creation with its full installment schedule (all-or-nothing)
// - Repayment recording and due-date-ordered allocation (all-or-nothing)
// - Row locking of the loan while a repayment is allocated
// - Read access to loans, schedules and received repayments

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::{AppError, Clock, CurrencyConverter, IdentityConverter, Result, SystemClock};
use crate::modules::loans::{
    models::{IncomingRepayment, Loan, NewLoan, ReceivedRepayment, ScheduledRepayment},
    repositories::{LoanStore, LoanUnitOfWork},
    services::{Allocation, RepaymentAllocator, ScheduleCalculator},
};

/// Everything a repayment changed
#[derive(Debug, Clone, Serialize)]
pub struct RepaymentReceipt {
    pub received_repayment: ReceivedRepayment,
    /// Loan after allocation
    pub loan: Loan,
    /// Every installment of the loan after allocation, in due-date order
    pub schedules: Vec<ScheduledRepayment>,
    pub allocation: Allocation,
}

/// Service for loan business logic
pub struct LoanService {
    store: Arc<dyn LoanStore>,
    converter: Arc<dyn CurrencyConverter>,
    clock: Arc<dyn Clock>,
}

impl LoanService {
    /// Create a new loan service
    ///
    /// # Arguments
    /// * `store` - Persistence for loans and repayments
    /// * `converter` - Converts payments into the loan currency
    /// * `clock` - Source of record timestamps
    pub fn new(
        store: Arc<dyn LoanStore>,
        converter: Arc<dyn CurrencyConverter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            converter,
            clock,
        }
    }

    /// Service with pass-through currency conversion and the system clock
    pub fn with_defaults(store: Arc<dyn LoanStore>) -> Self {
        Self::new(store, Arc::new(IdentityConverter), Arc::new(SystemClock))
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Create a loan and its scheduled repayments
    ///
    /// # Business Rules
    /// - Amount and terms must be positive
    /// - `terms` installments, floor split, last installment absorbs the remainder
    /// - Installment n is due `processed_at + n months`
    /// - Loan and schedule are persisted together or not at all
    pub async fn create_loan(&self, new_loan: NewLoan) -> Result<Loan> {
        self.create_loan_with_schedules(new_loan)
            .await
            .map(|(loan, _)| loan)
    }

    /// Create a loan, returning it together with the schedule that was written
    pub async fn create_loan_with_schedules(
        &self,
        new_loan: NewLoan,
    ) -> Result<(Loan, Vec<ScheduledRepayment>)> {
        let now = self.clock.now();

        let loan = Loan::new(
            new_loan.owner_id,
            new_loan.amount,
            new_loan.currency_code,
            new_loan.terms,
            new_loan.processed_at,
            now,
        )?;
        let schedules = ScheduleCalculator::calculate_schedules(&loan, now)?;

        let mut uow = self.store.begin().await?;
        let written = Self::write_new_loan(uow.as_mut(), &loan, &schedules).await;
        Self::finish(uow, written).await?;

        info!(
            loan_id = loan.id.as_str(),
            owner_id = loan.owner_id.as_str(),
            amount = %loan.currency_code.format_amount(loan.amount),
            terms = loan.terms,
            processed_at = %loan.processed_at,
            "Loan created"
        );

        Ok((loan, schedules))
    }

    /// Record a repayment and allocate it to the loan's scheduled repayments
    ///
    /// Returns the received repayment ledger entry.
    pub async fn repay_loan(
        &self,
        loan_id: &str,
        repayment: IncomingRepayment,
    ) -> Result<ReceivedRepayment> {
        self.record_repayment(loan_id, repayment)
            .await
            .map(|receipt| receipt.received_repayment)
    }

    /// Record a repayment and allocate it, returning every change made
    ///
    /// # Business Rules
    /// - Amount must be positive
    /// - The loan is locked for the whole operation
    /// - A loan that is already repaid accepts no further repayments
    /// - The payment is converted into the loan currency before allocation
    /// - Allocation follows due-date order and never touches repaid installments
    /// - Loan outstanding becomes the sum of installment balances; repaid when 0
    /// - Ledger entry, installments and loan are persisted together or not at all
    pub async fn record_repayment(
        &self,
        loan_id: &str,
        repayment: IncomingRepayment,
    ) -> Result<RepaymentReceipt> {
        if repayment.amount <= 0 {
            return Err(AppError::validation(format!(
                "Repayment amount must be positive, got {}",
                repayment.amount
            )));
        }

        let mut uow = self.store.begin().await?;
        let applied = self.apply_repayment(uow.as_mut(), loan_id, &repayment).await;
        let receipt = Self::finish(uow, applied).await?;

        if receipt.allocation.is_overpaid() {
            warn!(
                loan_id,
                unapplied = receipt.allocation.unapplied,
                "Repayment exceeded the outstanding balance"
            );
        }

        info!(
            loan_id,
            received_repayment_id = receipt.received_repayment.id.as_str(),
            amount = %repayment.currency_code.format_amount(repayment.amount),
            applied = receipt.allocation.applied_total,
            installments_touched = receipt.allocation.applied.len(),
            outstanding_amount = receipt.loan.outstanding_amount,
            status = %receipt.loan.status,
            "Repayment allocated"
        );

        Ok(receipt)
    }

    /// Get a loan by ID
    pub async fn get_loan(&self, loan_id: &str) -> Result<Loan> {
        let mut uow = self.store.begin().await?;
        let loan = uow.find_loan(loan_id).await;
        Self::finish(uow, loan)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Loan '{}' not found", loan_id)))
    }

    /// Get a loan with its scheduled repayments ordered by due date
    pub async fn get_loan_with_schedules(
        &self,
        loan_id: &str,
    ) -> Result<(Loan, Vec<ScheduledRepayment>)> {
        let mut uow = self.store.begin().await?;
        let read = Self::read_loan_with_schedules(uow.as_mut(), loan_id).await;
        Self::finish(uow, read).await
    }

    /// List the received repayments of a loan
    pub async fn list_received_repayments(&self, loan_id: &str) -> Result<Vec<ReceivedRepayment>> {
        let mut uow = self.store.begin().await?;
        let read = Self::read_received_repayments(uow.as_mut(), loan_id).await;
        Self::finish(uow, read).await
    }

    async fn write_new_loan(
        uow: &mut dyn LoanUnitOfWork,
        loan: &Loan,
        schedules: &[ScheduledRepayment],
    ) -> Result<()> {
        uow.insert_loan(loan).await?;
        uow.insert_scheduled_repayments(schedules).await
    }

    async fn apply_repayment(
        &self,
        uow: &mut dyn LoanUnitOfWork,
        loan_id: &str,
        repayment: &IncomingRepayment,
    ) -> Result<RepaymentReceipt> {
        let now = self.clock.now();

        let mut loan = uow
            .find_loan_for_update(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Loan '{}' not found", loan_id)))?;

        if loan.is_repaid() {
            warn!(loan_id, "Repayment rejected for a repaid loan");
            return Err(AppError::validation(format!(
                "Loan '{}' is already repaid",
                loan_id
            )));
        }

        let converted_amount =
            self.converter
                .convert(repayment.amount, repayment.currency_code, loan.currency_code)?;

        let received_repayment = ReceivedRepayment::new(
            loan.id.clone(),
            repayment.amount,
            repayment.currency_code,
            converted_amount,
            repayment.received_at,
            now,
        )?;
        uow.insert_received_repayment(&received_repayment).await?;

        let mut schedules = uow.find_scheduled_repayments(&loan.id).await?;
        let allocation = RepaymentAllocator::allocate(&mut schedules, converted_amount, now)?;

        for schedule in &schedules {
            let touched = allocation
                .applied
                .iter()
                .any(|applied| applied.scheduled_repayment_id == schedule.id);
            if touched {
                uow.update_scheduled_repayment(schedule).await?;
            }
        }

        let outstanding_amount = RepaymentAllocator::outstanding_total(&schedules);
        let expected = (loan.outstanding_amount - converted_amount).max(0);
        if outstanding_amount != expected {
            warn!(
                loan_id,
                outstanding_amount,
                expected,
                "Loan outstanding amount disagreed with its scheduled repayments"
            );
        }

        loan.set_outstanding(outstanding_amount, now)?;
        uow.update_loan(&loan).await?;

        Ok(RepaymentReceipt {
            received_repayment,
            loan,
            schedules,
            allocation,
        })
    }

    async fn read_loan_with_schedules(
        uow: &mut dyn LoanUnitOfWork,
        loan_id: &str,
    ) -> Result<(Loan, Vec<ScheduledRepayment>)> {
        let loan = uow
            .find_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Loan '{}' not found", loan_id)))?;
        let schedules = uow.find_scheduled_repayments(loan_id).await?;
        Ok((loan, schedules))
    }

    async fn read_received_repayments(
        uow: &mut dyn LoanUnitOfWork,
        loan_id: &str,
    ) -> Result<Vec<ReceivedRepayment>> {
        if uow.find_loan(loan_id).await?.is_none() {
            return Err(AppError::not_found(format!("Loan '{}' not found", loan_id)));
        }
        uow.find_received_repayments(loan_id).await
    }

    /// Commit on success, roll back on failure and hand back the original error
    async fn finish<T>(uow: Box<dyn LoanUnitOfWork>, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

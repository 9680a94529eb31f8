// MySQL adapter for the loan store
//
// Implements:
// - Loan + scheduled repayment batch insert inside one transaction
// - Received repayment append
// - Row lock on the loan (SELECT ... FOR UPDATE) to serialize repayments
// - Ordered reads of scheduled and received repayments
// - Outstanding amount / status updates

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::{AppError, Currency, Result};
use crate::modules::loans::models::{
    Loan, LoanStatus, ReceivedRepayment, RepaymentStatus, ScheduledRepayment,
};
use crate::modules::loans::repositories::{LoanStore, LoanUnitOfWork};

const LOAN_COLUMNS: &str = r#"
    id, owner_id, amount, terms, outstanding_amount, currency_code,
    processed_at, status, created_at, updated_at
"#;

const SCHEDULED_REPAYMENT_COLUMNS: &str = r#"
    id, loan_id, installment_number, amount, outstanding_amount,
    currency_code, due_date, status, created_at, updated_at
"#;

const RECEIVED_REPAYMENT_COLUMNS: &str = r#"
    id, loan_id, amount, currency_code, converted_amount, received_at, created_at
"#;

/// Loan store backed by MySQL
#[derive(Debug, Clone)]
pub struct MySqlLoanStore {
    pool: MySqlPool,
}

impl MySqlLoanStore {
    /// Create a new MySQL loan store
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Get the database connection pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl LoanStore for MySqlLoanStore {
    async fn begin(&self) -> Result<Box<dyn LoanUnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::transaction(format!("Failed to start transaction: {}", e)))?;

        Ok(Box::new(MySqlUnitOfWork { tx }))
    }
}

/// A single MySQL transaction. sqlx rolls it back when dropped uncommitted.
struct MySqlUnitOfWork {
    tx: Transaction<'static, MySql>,
}

impl MySqlUnitOfWork {
    async fn fetch_loan(&mut self, id: &str, for_update: bool) -> Result<Option<Loan>> {
        let lock = if for_update { "FOR UPDATE" } else { "" };
        let sql = format!("SELECT {} FROM loans WHERE id = ? {}", LOAN_COLUMNS, lock);

        let row = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| AppError::transaction(format!("Failed to fetch loan: {}", e)))?;

        row.map(Loan::try_from).transpose()
    }
}

#[async_trait]
impl LoanUnitOfWork for MySqlUnitOfWork {
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (
                id, owner_id, amount, terms, outstanding_amount, currency_code,
                processed_at, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&loan.id)
        .bind(&loan.owner_id)
        .bind(loan.amount)
        .bind(loan.terms)
        .bind(loan.outstanding_amount)
        .bind(loan.currency_code.as_str())
        .bind(loan.processed_at)
        .bind(loan.status.as_str())
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::transaction(format!("Failed to insert loan: {}", e)))?;

        Ok(())
    }

    async fn insert_scheduled_repayments(&mut self, schedules: &[ScheduledRepayment]) -> Result<()> {
        for schedule in schedules {
            sqlx::query(
                r#"
                INSERT INTO scheduled_repayments (
                    id, loan_id, installment_number, amount, outstanding_amount,
                    currency_code, due_date, status, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&schedule.id)
            .bind(&schedule.loan_id)
            .bind(schedule.installment_number)
            .bind(schedule.amount)
            .bind(schedule.outstanding_amount)
            .bind(schedule.currency_code.as_str())
            .bind(schedule.due_date)
            .bind(schedule.status.as_str())
            .bind(schedule.created_at)
            .bind(schedule.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::transaction(format!("Failed to insert scheduled repayment: {}", e))
            })?;
        }

        Ok(())
    }

    async fn insert_received_repayment(&mut self, repayment: &ReceivedRepayment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO received_repayments (
                id, loan_id, amount, currency_code, converted_amount, received_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&repayment.id)
        .bind(&repayment.loan_id)
        .bind(repayment.amount)
        .bind(repayment.currency_code.as_str())
        .bind(repayment.converted_amount)
        .bind(repayment.received_at)
        .bind(repayment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::transaction(format!("Failed to insert received repayment: {}", e)))?;

        Ok(())
    }

    async fn find_loan(&mut self, id: &str) -> Result<Option<Loan>> {
        self.fetch_loan(id, false).await
    }

    async fn find_loan_for_update(&mut self, id: &str) -> Result<Option<Loan>> {
        self.fetch_loan(id, true).await
    }

    async fn find_scheduled_repayments(&mut self, loan_id: &str) -> Result<Vec<ScheduledRepayment>> {
        let sql = format!(
            "SELECT {} FROM scheduled_repayments WHERE loan_id = ? ORDER BY due_date ASC, installment_number ASC",
            SCHEDULED_REPAYMENT_COLUMNS
        );

        let rows = sqlx::query_as::<_, ScheduledRepaymentRow>(&sql)
            .bind(loan_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::transaction(format!("Failed to fetch scheduled repayments: {}", e))
            })?;

        rows.into_iter().map(ScheduledRepayment::try_from).collect()
    }

    async fn find_received_repayments(&mut self, loan_id: &str) -> Result<Vec<ReceivedRepayment>> {
        let sql = format!(
            "SELECT {} FROM received_repayments WHERE loan_id = ? ORDER BY received_at ASC, created_at ASC",
            RECEIVED_REPAYMENT_COLUMNS
        );

        let rows = sqlx::query_as::<_, ReceivedRepaymentRow>(&sql)
            .bind(loan_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::transaction(format!("Failed to fetch received repayments: {}", e))
            })?;

        rows.into_iter().map(ReceivedRepayment::try_from).collect()
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE loans
            SET outstanding_amount = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(loan.outstanding_amount)
        .bind(loan.status.as_str())
        .bind(loan.updated_at)
        .bind(&loan.id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::transaction(format!("Failed to update loan: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found(format!("Loan '{}' not found", loan.id)));
        }

        Ok(())
    }

    async fn update_scheduled_repayment(&mut self, schedule: &ScheduledRepayment) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE scheduled_repayments
            SET outstanding_amount = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(schedule.outstanding_amount)
        .bind(schedule.status.as_str())
        .bind(schedule.updated_at)
        .bind(&schedule.id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::transaction(format!("Failed to update scheduled repayment: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found(format!(
                "Scheduled repayment '{}' not found",
                schedule.id
            )));
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::transaction(format!("Failed to commit transaction: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| AppError::transaction(format!("Failed to roll back transaction: {}", e)))
    }
}

/// Database row representation for the loans table
#[derive(sqlx::FromRow)]
struct LoanRow {
    id: String,
    owner_id: String,
    amount: i64,
    terms: i32,
    outstanding_amount: i64,
    currency_code: String,
    processed_at: NaiveDate,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self> {
        Ok(Loan {
            id: row.id,
            owner_id: row.owner_id,
            amount: row.amount,
            terms: row.terms,
            outstanding_amount: row.outstanding_amount,
            currency_code: Currency::try_from(row.currency_code).map_err(AppError::Internal)?,
            processed_at: row.processed_at,
            status: LoanStatus::try_from(row.status).map_err(AppError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database row representation for the scheduled_repayments table
#[derive(sqlx::FromRow)]
struct ScheduledRepaymentRow {
    id: String,
    loan_id: String,
    installment_number: i32,
    amount: i64,
    outstanding_amount: i64,
    currency_code: String,
    due_date: NaiveDate,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<ScheduledRepaymentRow> for ScheduledRepayment {
    type Error = AppError;

    fn try_from(row: ScheduledRepaymentRow) -> Result<Self> {
        Ok(ScheduledRepayment {
            id: row.id,
            loan_id: row.loan_id,
            installment_number: row.installment_number,
            amount: row.amount,
            outstanding_amount: row.outstanding_amount,
            currency_code: Currency::try_from(row.currency_code).map_err(AppError::Internal)?,
            due_date: row.due_date,
            status: RepaymentStatus::try_from(row.status).map_err(AppError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database row representation for the received_repayments table
#[derive(sqlx::FromRow)]
struct ReceivedRepaymentRow {
    id: String,
    loan_id: String,
    amount: i64,
    currency_code: String,
    converted_amount: i64,
    received_at: NaiveDate,
    created_at: NaiveDateTime,
}

impl TryFrom<ReceivedRepaymentRow> for ReceivedRepayment {
    type Error = AppError;

    fn try_from(row: ReceivedRepaymentRow) -> Result<Self> {
        Ok(ReceivedRepayment {
            id: row.id,
            loan_id: row.loan_id,
            amount: row.amount,
            currency_code: Currency::try_from(row.currency_code).map_err(AppError::Internal)?,
            converted_amount: row.converted_amount,
            received_at: row.received_at,
            created_at: row.created_at,
        })
    }
}

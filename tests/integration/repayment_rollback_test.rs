// A failure at any write leaves loans, schedules and the ledger untouched

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use loanbook::core::{AppError, Currency, FixedClock, IdentityConverter, Result};
use loanbook::loans::repositories::FailPoint;
use loanbook::loans::{
    IncomingRepayment, InMemoryLoanStore, Loan, LoanService, LoanStatus, LoanStore,
    LoanUnitOfWork, NewLoan, ReceivedRepayment, RepaymentStatus, ScheduledRepayment,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setup() -> (InMemoryLoanStore, LoanService) {
    let store = InMemoryLoanStore::new();
    let service = LoanService::new(
        Arc::new(store.clone()),
        Arc::new(IdentityConverter),
        Arc::new(FixedClock::at_date(date(2020, 1, 20))),
    );
    (store, service)
}

fn new_loan() -> NewLoan {
    NewLoan {
        owner_id: "user-1".to_string(),
        amount: 5000,
        currency_code: Currency::VND,
        terms: 3,
        processed_at: date(2020, 1, 20),
    }
}

fn payment(amount: i64) -> IncomingRepayment {
    IncomingRepayment {
        amount,
        currency_code: Currency::VND,
        received_at: date(2020, 2, 20),
    }
}

/// Store wrapper that remembers every loan id handed to `insert_loan`,
/// including ones whose unit of work is later rolled back
#[derive(Clone)]
struct RecordingLoanStore {
    inner: InMemoryLoanStore,
    inserted: Arc<Mutex<Vec<String>>>,
}

impl RecordingLoanStore {
    fn new(inner: InMemoryLoanStore) -> Self {
        Self {
            inner,
            inserted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn inserted_loan_ids(&self) -> Vec<String> {
        self.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl LoanStore for RecordingLoanStore {
    async fn begin(&self) -> Result<Box<dyn LoanUnitOfWork>> {
        Ok(Box::new(RecordingUnitOfWork {
            inner: self.inner.begin().await?,
            inserted: Arc::clone(&self.inserted),
        }))
    }
}

struct RecordingUnitOfWork {
    inner: Box<dyn LoanUnitOfWork>,
    inserted: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LoanUnitOfWork for RecordingUnitOfWork {
    async fn insert_loan(&mut self, loan: &Loan) -> Result<()> {
        self.inserted.lock().unwrap().push(loan.id.clone());
        self.inner.insert_loan(loan).await
    }

    async fn insert_scheduled_repayments(&mut self, schedules: &[ScheduledRepayment]) -> Result<()> {
        self.inner.insert_scheduled_repayments(schedules).await
    }

    async fn insert_received_repayment(&mut self, repayment: &ReceivedRepayment) -> Result<()> {
        self.inner.insert_received_repayment(repayment).await
    }

    async fn find_loan(&mut self, id: &str) -> Result<Option<Loan>> {
        self.inner.find_loan(id).await
    }

    async fn find_loan_for_update(&mut self, id: &str) -> Result<Option<Loan>> {
        self.inner.find_loan_for_update(id).await
    }

    async fn find_scheduled_repayments(&mut self, loan_id: &str) -> Result<Vec<ScheduledRepayment>> {
        self.inner.find_scheduled_repayments(loan_id).await
    }

    async fn find_received_repayments(&mut self, loan_id: &str) -> Result<Vec<ReceivedRepayment>> {
        self.inner.find_received_repayments(loan_id).await
    }

    async fn update_loan(&mut self, loan: &Loan) -> Result<()> {
        self.inner.update_loan(loan).await
    }

    async fn update_scheduled_repayment(&mut self, schedule: &ScheduledRepayment) -> Result<()> {
        self.inner.update_scheduled_repayment(schedule).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn test_repayment_rolls_back_at_every_write() {
    for fail_point in [
        FailPoint::InsertReceivedRepayment,
        FailPoint::UpdateScheduledRepayment,
        FailPoint::UpdateLoan,
        FailPoint::Commit,
    ] {
        let (store, service) = setup();
        let loan = service.create_loan(new_loan()).await.unwrap();

        store.inject_failure(fail_point).await;
        let result = service.repay_loan(&loan.id, payment(2000)).await;
        store.clear_failure().await;

        assert!(
            matches!(result, Err(AppError::Transaction(_))),
            "expected transaction failure at {:?}",
            fail_point
        );

        let (stored, schedules) = service.get_loan_with_schedules(&loan.id).await.unwrap();
        assert_eq!(stored.outstanding_amount, 5000, "at {:?}", fail_point);
        assert_eq!(stored.status, LoanStatus::Due);
        assert!(schedules
            .iter()
            .all(|s| s.status == RepaymentStatus::Due && s.outstanding_amount == s.amount));
        assert!(service
            .list_received_repayments(&loan.id)
            .await
            .unwrap()
            .is_empty());
    }
}

#[tokio::test]
async fn test_loan_creation_rolls_back_with_schedule() {
    for fail_point in [
        FailPoint::InsertLoan,
        FailPoint::InsertScheduledRepayments,
        FailPoint::Commit,
    ] {
        let store = InMemoryLoanStore::new();
        let recording = RecordingLoanStore::new(store.clone());
        let service = LoanService::new(
            Arc::new(recording.clone()),
            Arc::new(IdentityConverter),
            Arc::new(FixedClock::at_date(date(2020, 1, 20))),
        );

        store.inject_failure(fail_point).await;
        let result = service.create_loan(new_loan()).await;
        store.clear_failure().await;

        assert!(
            matches!(result, Err(AppError::Transaction(_))),
            "expected transaction failure at {:?}",
            fail_point
        );

        let attempted = recording.inserted_loan_ids();
        assert_eq!(attempted.len(), 1, "at {:?}", fail_point);
        assert!(
            matches!(
                service.get_loan(&attempted[0]).await,
                Err(AppError::NotFound(_))
            ),
            "loan from failed create survived at {:?}",
            fail_point
        );

        let mut uow = store.begin().await.unwrap();
        assert!(uow
            .find_scheduled_repayments(&attempted[0])
            .await
            .unwrap()
            .is_empty());
        uow.rollback().await.unwrap();
    }
}

#[tokio::test]
async fn test_retry_after_failure_applies_once() {
    let (store, service) = setup();
    let loan = service.create_loan(new_loan()).await.unwrap();

    store.inject_failure(FailPoint::UpdateLoan).await;
    assert!(service.repay_loan(&loan.id, payment(1666)).await.is_err());
    store.clear_failure().await;

    service.repay_loan(&loan.id, payment(1666)).await.unwrap();

    let (stored, schedules) = service.get_loan_with_schedules(&loan.id).await.unwrap();
    assert_eq!(stored.outstanding_amount, 3334);
    assert_eq!(schedules[0].status, RepaymentStatus::Repaid);
    assert_eq!(schedules[1].status, RepaymentStatus::Due);
    assert_eq!(
        service.list_received_repayments(&loan.id).await.unwrap().len(),
        1
    );
}

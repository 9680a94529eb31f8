// HTTP handlers for loan endpoints
//
// Endpoints:
// - POST /loans                      - Originate a loan with its repayment schedule
// - GET  /loans/{loan_id}            - Get a loan with its scheduled repayments
// - POST /loans/{loan_id}/repayments - Record and allocate a repayment
// - GET  /loans/{loan_id}/repayments - List received repayments

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Currency, Result};
use crate::modules::loans::{
    models::{IncomingRepayment, Loan, NewLoan, ReceivedRepayment, ScheduledRepayment},
    services::LoanService,
};

/// Request for POST /loans
#[derive(Debug, Deserialize)]
pub struct CreateLoanRequest {
    pub owner_id: String,
    pub amount: i64,
    pub terms: i32,
    pub currency_code: String,
    /// Defaults to today
    pub processed_at: Option<NaiveDate>,
}

/// Request for POST /loans/{loan_id}/repayments
#[derive(Debug, Deserialize)]
pub struct RepayLoanRequest {
    pub amount: i64,
    pub currency_code: String,
    /// Defaults to today
    pub received_at: Option<NaiveDate>,
}

/// Response for a single scheduled repayment
#[derive(Debug, Serialize)]
pub struct ScheduledRepaymentResponse {
    pub id: String,
    pub installment_number: i32,
    pub amount: i64,
    pub outstanding_amount: i64,
    pub currency_code: String,
    pub due_date: String,
    pub status: String,
}

impl From<ScheduledRepayment> for ScheduledRepaymentResponse {
    fn from(schedule: ScheduledRepayment) -> Self {
        Self {
            id: schedule.id,
            installment_number: schedule.installment_number,
            amount: schedule.amount,
            outstanding_amount: schedule.outstanding_amount,
            currency_code: schedule.currency_code.to_string(),
            due_date: schedule.due_date.to_string(),
            status: schedule.status.to_string(),
        }
    }
}

/// Response for a loan
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub id: String,
    pub owner_id: String,
    pub amount: i64,
    pub terms: i32,
    pub outstanding_amount: i64,
    /// Outstanding amount in major units, e.g. "SGD 16.66"
    pub outstanding_display: String,
    pub currency_code: String,
    pub processed_at: String,
    pub status: String,
    pub scheduled_repayments: Vec<ScheduledRepaymentResponse>,
}

impl LoanResponse {
    fn new(loan: Loan, schedules: Vec<ScheduledRepayment>) -> Self {
        Self {
            outstanding_display: loan.currency_code.format_amount(loan.outstanding_amount),
            id: loan.id,
            owner_id: loan.owner_id,
            amount: loan.amount,
            terms: loan.terms,
            outstanding_amount: loan.outstanding_amount,
            currency_code: loan.currency_code.to_string(),
            processed_at: loan.processed_at.to_string(),
            status: loan.status.to_string(),
            scheduled_repayments: schedules
                .into_iter()
                .map(ScheduledRepaymentResponse::from)
                .collect(),
        }
    }
}

/// Response for a received repayment
#[derive(Debug, Serialize)]
pub struct ReceivedRepaymentResponse {
    pub id: String,
    pub loan_id: String,
    pub amount: i64,
    pub currency_code: String,
    pub converted_amount: i64,
    pub received_at: String,
}

impl From<ReceivedRepayment> for ReceivedRepaymentResponse {
    fn from(repayment: ReceivedRepayment) -> Self {
        Self {
            id: repayment.id,
            loan_id: repayment.loan_id,
            amount: repayment.amount,
            currency_code: repayment.currency_code.to_string(),
            converted_amount: repayment.converted_amount,
            received_at: repayment.received_at.to_string(),
        }
    }
}

/// Response for POST /loans/{loan_id}/repayments
#[derive(Debug, Serialize)]
pub struct RepayLoanResponse {
    pub received_repayment: ReceivedRepaymentResponse,
    /// Part of the payment no installment could absorb
    pub unapplied_amount: i64,
    pub loan: LoanResponse,
}

/// Response for GET /loans/{loan_id}/repayments
#[derive(Debug, Serialize)]
pub struct ListRepaymentsResponse {
    pub loan_id: String,
    pub received_repayments: Vec<ReceivedRepaymentResponse>,
}

fn parse_currency(code: &str) -> Result<Currency> {
    code.parse::<Currency>().map_err(AppError::Validation)
}

/// POST /loans
///
/// # Returns
/// - 201: Loan with its scheduled repayments
/// - 400: Non-positive amount or terms, unknown currency
pub async fn create_loan(
    request: web::Json<CreateLoanRequest>,
    service: web::Data<LoanService>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    let new_loan = NewLoan {
        owner_id: request.owner_id,
        amount: request.amount,
        currency_code: parse_currency(&request.currency_code)?,
        terms: request.terms,
        processed_at: request
            .processed_at
            .unwrap_or_else(|| service.clock().today()),
    };

    let (loan, schedules) = service.create_loan_with_schedules(new_loan).await?;

    Ok(HttpResponse::Created().json(LoanResponse::new(loan, schedules)))
}

/// GET /loans/{loan_id}
///
/// # Returns
/// - 200: Loan with its scheduled repayments
/// - 404: Loan not found
pub async fn get_loan(
    loan_id: web::Path<String>,
    service: web::Data<LoanService>,
) -> Result<HttpResponse> {
    let (loan, schedules) = service.get_loan_with_schedules(&loan_id).await?;

    Ok(HttpResponse::Ok().json(LoanResponse::new(loan, schedules)))
}

/// POST /loans/{loan_id}/repayments
///
/// # Returns
/// - 201: Received repayment and the loan after allocation
/// - 400: Non-positive amount, unknown currency, loan already repaid
/// - 404: Loan not found
pub async fn repay_loan(
    loan_id: web::Path<String>,
    request: web::Json<RepayLoanRequest>,
    service: web::Data<LoanService>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    let repayment = IncomingRepayment {
        amount: request.amount,
        currency_code: parse_currency(&request.currency_code)?,
        received_at: request
            .received_at
            .unwrap_or_else(|| service.clock().today()),
    };

    let receipt = service.record_repayment(&loan_id, repayment).await?;

    // Loan state as committed by this repayment, not a later read
    let response = RepayLoanResponse {
        received_repayment: receipt.received_repayment.into(),
        unapplied_amount: receipt.allocation.unapplied,
        loan: LoanResponse::new(receipt.loan, receipt.schedules),
    };

    Ok(HttpResponse::Created().json(response))
}

/// GET /loans/{loan_id}/repayments
///
/// # Returns
/// - 200: Received repayments ordered by received date
/// - 404: Loan not found
pub async fn list_repayments(
    loan_id: web::Path<String>,
    service: web::Data<LoanService>,
) -> Result<HttpResponse> {
    let repayments = service.list_received_repayments(&loan_id).await?;

    let response = ListRepaymentsResponse {
        loan_id: loan_id.into_inner(),
        received_repayments: repayments
            .into_iter()
            .map(ReceivedRepaymentResponse::from)
            .collect(),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Configure loan routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/loans")
            .route("", web::post().to(create_loan))
            .route("/{loan_id}", web::get().to(get_loan))
            .route("/{loan_id}/repayments", web::post().to(repay_loan))
            .route("/{loan_id}/repayments", web::get().to(list_repayments)),
    );
}

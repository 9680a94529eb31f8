pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{
    IncomingRepayment, Loan, LoanStatus, NewLoan, ReceivedRepayment, RepaymentStatus,
    ScheduledRepayment,
};
pub use repositories::{InMemoryLoanStore, LoanStore, LoanUnitOfWork, MySqlLoanStore};
pub use services::{LoanService, RepaymentAllocator, ScheduleCalculator};

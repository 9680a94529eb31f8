pub mod commands;
pub mod loan;
pub mod received_repayment;
pub mod scheduled_repayment;

pub use commands::{IncomingRepayment, NewLoan};
pub use loan::{Loan, LoanStatus};
pub use received_repayment::ReceivedRepayment;
pub use scheduled_repayment::{RepaymentStatus, ScheduledRepayment};

pub mod loan_service;
pub mod repayment_allocator;
pub mod schedule_calculator;

pub use loan_service::{LoanService, RepaymentReceipt};
pub use repayment_allocator::{AppliedAmount, Allocation, RepaymentAllocator};
pub use schedule_calculator::ScheduleCalculator;

//! Loanbook Library
//!
//! Loan origination and repayment allocation: installment schedules that sum
//! exactly to the principal, and payments allocated across them in due-date order.

pub mod config;
pub mod core;
pub mod modules;

// Re-export commonly used types
pub use modules::loans;

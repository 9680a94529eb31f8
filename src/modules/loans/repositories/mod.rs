pub mod loan_store;
pub mod memory_loan_store;
pub mod mysql_loan_store;

pub use loan_store::{LoanStore, LoanUnitOfWork};
pub use memory_loan_store::{FailPoint, InMemoryLoanStore};
pub use mysql_loan_store::MySqlLoanStore;

pub mod config;
pub mod error;
pub mod time_value;
pub mod types;
pub mod waterfall;

pub use error::LoanFundError;
pub use types::*;

/// Standard result type for all loanfund operations
pub type LoanFundResult<T> = Result<T, LoanFundError>;

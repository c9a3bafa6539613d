pub mod calendar;
pub mod cashflow;
pub mod engine;
pub mod error;
pub mod plan;
pub mod time_value;
pub mod types;

pub use error::FlowcastError;
pub use types::*;

/// Standard result type for all flowcast operations
pub type FlowcastResult<T> = Result<T, FlowcastError>;

pub mod aggregate;
pub mod repayment;

pub use aggregate::{aggregate, negative_balance_weeks, AggregateInput, CashFlowStatement};
pub use repayment::{normalize, Frequency, NormalizedRepayment, RepaymentEntry};

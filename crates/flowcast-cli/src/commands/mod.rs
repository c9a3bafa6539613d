pub mod calendar;
pub mod cashflow;
pub mod engine;
pub mod plan;
pub mod valuation;

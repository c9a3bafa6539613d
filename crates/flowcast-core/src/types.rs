use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// One canonical, ordered unit of time in the engine, derived from a
/// spreadsheet column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSlot {
    /// Zero-based, chronologically ordered position. Every other
    /// component addresses weeks through this index.
    pub index: usize,
    /// Original header text, preserved verbatim for display.
    pub label: String,
    /// Resolved date. Headers with no parseable date get a fallback of
    /// base-year Jan 1 + 7×index days so ordering and discounting stay
    /// total.
    pub date: NaiveDate,
    /// True when `date` is the synthetic fallback rather than parsed.
    pub synthetic: bool,
    /// Column index in the source grid this slot came from.
    pub source_column: usize,
}

/// One week of the aggregated cash-flow model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowRow {
    pub week_index: usize,
    pub income: Money,
    pub expenditure: Money,
    pub repayment: Money,
    pub opening_balance: Money,
    /// opening + income - expenditure - repayment. The next row opens
    /// at this value.
    pub closing_balance: Money,
}

/// A single cash flow at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

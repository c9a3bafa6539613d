use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Instant;

use crate::cashflow::repayment::{normalize, NormalizedRepayment, RepaymentEntry};
use crate::error::FlowcastError;
use crate::types::{with_metadata, CashFlowRow, ComputationOutput, Money, WeekSlot};
use crate::FlowcastResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for per-week cash-flow aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateInput {
    /// Raw cell grid, rows of strings/numbers as parsed from the
    /// spreadsheet. Cells may be missing; short rows are fine.
    pub grid: Vec<Vec<Value>>,
    /// Grid column holding the first week (slot 0). Slot `i` reads
    /// column `column_offset + i`.
    pub column_offset: usize,
    /// First data row (inclusive).
    pub first_data_row: usize,
    /// Last data row (inclusive).
    pub last_data_row: usize,
    /// Resolved week table from the calendar resolver.
    pub week_slots: Vec<WeekSlot>,
    /// Raw repayment entries; normalized here.
    pub repayments: Vec<RepaymentEntry>,
    /// User-supplied bank balance before the first week.
    pub opening_balance: Money,
    /// Base year for parsing repayment dates.
    pub base_year: i32,
}

/// Aggregated per-week cash-flow model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub rows: Vec<CashFlowRow>,
    /// Canonical repayments after variant normalization.
    pub normalized_repayments: Vec<NormalizedRepayment>,
    /// Weeks whose projected closing balance is below zero.
    pub negative_balance_weeks: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Aggregate the raw grid into per-week income, expenditure, repayment
/// and running-balance rows.
pub fn aggregate(input: &AggregateInput) -> FlowcastResult<ComputationOutput<CashFlowStatement>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.first_data_row > input.last_data_row {
        return Err(FlowcastError::InvalidInput {
            field: "first_data_row".into(),
            reason: "Data row range is empty (first > last)".into(),
        });
    }

    let (repayments, repayment_warnings) =
        normalize(&input.repayments, &input.week_slots, input.base_year);
    warnings.extend(repayment_warnings);

    let rows = build_rows(
        &input.grid,
        input.column_offset,
        input.first_data_row,
        input.last_data_row,
        &input.week_slots,
        &repayments,
        input.opening_balance,
    )?;

    let negative = negative_balance_weeks(&rows);
    if !negative.is_empty() {
        warnings.push(format!(
            "Projected bank balance goes negative in {} week(s), first at week {}",
            negative.len(),
            negative[0]
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Per-column sign-split cell aggregation with left-to-right running balance",
        &Assumptions {
            column_offset: input.column_offset,
            first_data_row: input.first_data_row,
            last_data_row: input.last_data_row,
            opening_balance: input.opening_balance,
            week_count: input.week_slots.len(),
        },
        warnings,
        elapsed,
        CashFlowStatement {
            rows,
            normalized_repayments: repayments,
            negative_balance_weeks: negative,
        },
    ))
}

/// Weeks whose closing balance is negative. Shared by UI warning
/// banners and plan validation so the two can never disagree.
pub fn negative_balance_weeks(rows: &[CashFlowRow]) -> Vec<usize> {
    rows.iter()
        .filter(|row| row.closing_balance < Decimal::ZERO)
        .map(|row| row.week_index)
        .collect()
}

/// Build the row series. One left-to-right scan; each row opens at the
/// previous row's close.
pub fn build_rows(
    grid: &[Vec<Value>],
    column_offset: usize,
    first_data_row: usize,
    last_data_row: usize,
    week_slots: &[WeekSlot],
    repayments: &[NormalizedRepayment],
    opening_balance: Money,
) -> FlowcastResult<Vec<CashFlowRow>> {
    let mut repayment_per_week = vec![Decimal::ZERO; week_slots.len()];
    for repayment in repayments {
        let slot = repayment_per_week.get_mut(repayment.week_index).ok_or_else(|| {
            FlowcastError::InvariantViolation(format!(
                "normalized repayment week index {} out of range ({} weeks)",
                repayment.week_index,
                week_slots.len()
            ))
        })?;
        *slot += repayment.amount;
    }

    let mut rows = Vec::with_capacity(week_slots.len());
    let mut balance = opening_balance;

    for slot in week_slots {
        let column = column_offset + slot.index;
        let mut income = Decimal::ZERO;
        let mut expenditure = Decimal::ZERO;

        for row_idx in first_data_row..=last_data_row {
            let cell = grid.get(row_idx).and_then(|row| row.get(column));
            let Some(value) = cell.and_then(parse_cell) else {
                continue;
            };
            if value > Decimal::ZERO {
                income += value;
            } else if value < Decimal::ZERO {
                expenditure += value.abs();
            }
        }

        let repayment = repayment_per_week[slot.index];
        let opening = balance;
        let closing = opening + income - expenditure - repayment;

        rows.push(CashFlowRow {
            week_index: slot.index,
            income,
            expenditure,
            repayment,
            opening_balance: opening,
            closing_balance: closing,
        });

        balance = closing;
    }

    Ok(rows)
}

/// Parse a raw cell into a signed amount. Strings are stripped of
/// currency symbols, thousands separators and whitespace; `(1,234)` is
/// negative. Blanks and anything unparseable read as "no value" — a
/// spreadsheet full of gaps is normal, not an error.
pub fn parse_cell(cell: &Value) -> Option<Money> {
    match cell {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse_amount_text(s),
        _ => None,
    }
}

fn parse_amount_text(text: &str) -> Option<Money> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let negative_parens = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let mut value = Decimal::from_str(&cleaned).ok()?;
    if negative_parens && value > Decimal::ZERO {
        value = -value;
    }
    Some(value)
}

#[derive(Serialize)]
struct Assumptions {
    column_offset: usize,
    first_data_row: usize,
    last_data_row: usize,
    opening_balance: Money,
    week_count: usize,
}

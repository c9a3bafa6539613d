use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::calendar;
use crate::cashflow::aggregate::{build_rows, negative_balance_weeks};
use crate::cashflow::repayment::{normalize, NormalizedRepayment, RepaymentEntry};
use crate::error::FlowcastError;
use crate::plan::{synthesize, PlanContext, PlanRequest, SuggestedPlan};
use crate::time_value::{value_series, ValuationInput, ValuationSummary};
use crate::types::{with_metadata, CashFlow, CashFlowRow, ComputationOutput, Money, Rate, WeekSlot};
use crate::FlowcastResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The investment the valuation series is anchored on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentSpec {
    pub amount: Money,
    pub week_index: usize,
}

/// Everything the engine reads, committed as one immutable bundle per
/// user edit. There is no incremental mutation: every edit rebuilds the
/// whole snapshot, so there is never partially-updated state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub headers: Vec<String>,
    pub base_year: i32,
    pub grid: Vec<Vec<Value>>,
    pub column_offset: usize,
    pub first_data_row: usize,
    pub last_data_row: usize,
    pub opening_balance: Money,
    /// Annual discount rate for NPV and discounted payback.
    pub discount_rate: Rate,
    pub repayments: Vec<RepaymentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investment: Option<InvestmentSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanRequest>,
}

/// One full recomputation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub week_table: Vec<WeekSlot>,
    pub rows: Vec<CashFlowRow>,
    pub normalized_repayments: Vec<NormalizedRepayment>,
    pub negative_balance_weeks: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation: Option<ValuationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_plan: Option<SuggestedPlan>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Rebuild the full snapshot from scratch: week table, cash-flow rows,
/// valuation scalars and (when requested) a suggested repayment plan.
pub fn recompute(state: &EngineState) -> FlowcastResult<ComputationOutput<EngineSnapshot>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if state.base_year < 1900 || state.base_year > 2200 {
        return Err(FlowcastError::InvalidInput {
            field: "base_year".into(),
            reason: "Base year must be between 1900 and 2200".into(),
        });
    }
    if state.first_data_row > state.last_data_row {
        return Err(FlowcastError::InvalidInput {
            field: "first_data_row".into(),
            reason: "Data row range is empty (first > last)".into(),
        });
    }

    let (week_table, calendar_warnings) = calendar::resolve(&state.headers, state.base_year);
    warnings.extend(calendar_warnings);

    let (repayments, repayment_warnings) =
        normalize(&state.repayments, &week_table, state.base_year);
    warnings.extend(repayment_warnings);

    let rows = build_rows(
        &state.grid,
        state.column_offset,
        state.first_data_row,
        state.last_data_row,
        &week_table,
        &repayments,
        state.opening_balance,
    )?;

    let negative = negative_balance_weeks(&rows);
    if !negative.is_empty() {
        warnings.push(format!(
            "Projected bank balance goes negative in {} week(s), first at week {}",
            negative.len(),
            negative[0]
        ));
    }

    let valuation = match &state.investment {
        Some(spec) => compute_valuation(spec, state.discount_rate, &week_table, &repayments, &mut warnings)?,
        None => None,
    };

    let suggested_plan = match &state.plan {
        Some(request) => {
            let context = PlanContext {
                week_slots: week_table.clone(),
                rows: rows.clone(),
                base_year: state.base_year,
            };
            let out = synthesize(request, &context)?;
            warnings.extend(out.warnings);
            Some(out.result)
        }
        None => None,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Full recompute: calendar resolution, repayment normalization, balance scan, dated valuation, plan synthesis",
        &StateSummary::from(state),
        warnings,
        elapsed,
        EngineSnapshot {
            week_table,
            rows,
            normalized_repayments: repayments,
            negative_balance_weeks: negative,
            valuation,
            suggested_plan,
        },
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Valuation series: the negative investment outflow first, then every
/// normalized repayment as an inflow at its week's date.
fn compute_valuation(
    spec: &InvestmentSpec,
    discount_rate: Rate,
    week_table: &[WeekSlot],
    repayments: &[NormalizedRepayment],
    warnings: &mut Vec<String>,
) -> FlowcastResult<Option<ValuationSummary>> {
    if spec.amount <= Decimal::ZERO {
        return Ok(None);
    }
    let Some(investment_slot) = week_table.get(spec.week_index) else {
        warnings.push(format!(
            "Investment week {} is outside the {}-week range; valuation skipped",
            spec.week_index,
            week_table.len()
        ));
        return Ok(None);
    };

    let mut flows = vec![CashFlow {
        date: investment_slot.date,
        amount: -spec.amount,
        label: Some("investment".into()),
    }];
    for repayment in repayments {
        flows.push(CashFlow {
            date: week_table[repayment.week_index].date,
            amount: repayment.amount,
            label: None,
        });
    }

    if flows.len() < 2 {
        warnings.push("No repayments to value; valuation skipped".into());
        return Ok(None);
    }

    let out = value_series(&ValuationInput {
        flows,
        discount_rate,
    })?;
    warnings.extend(out.warnings);
    Ok(Some(out.result))
}

/// Serialized into the envelope's assumptions; the raw grid is omitted
/// deliberately (it can be large and is the caller's own input).
#[derive(Serialize)]
struct StateSummary {
    base_year: i32,
    week_count: usize,
    data_rows: (usize, usize),
    opening_balance: Money,
    discount_rate: Rate,
    repayment_entries: usize,
    has_plan_request: bool,
}

impl From<&EngineState> for StateSummary {
    fn from(state: &EngineState) -> Self {
        StateSummary {
            base_year: state.base_year,
            week_count: state.headers.len(),
            data_rows: (state.first_data_row, state.last_data_row),
            opening_balance: state.opening_balance,
            discount_rate: state.discount_rate,
            repayment_entries: state.repayments.len(),
            has_plan_request: state.plan.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::BufferPolicy;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn sample_state() -> EngineState {
        EngineState {
            headers: (1..=16).map(|i| format!("Week {i}")).collect(),
            base_year: 2025,
            grid: vec![
                (0..16).map(|_| json!(30_000)).collect(),
                (0..16).map(|_| json!(-12_000)).collect(),
            ],
            column_offset: 0,
            first_data_row: 0,
            last_data_row: 1,
            opening_balance: dec!(10_000),
            discount_rate: dec!(0.05),
            repayments: vec![RepaymentEntry::Week {
                week: "Week 10".into(),
                amount: dec!(15_000),
            }],
            investment: Some(InvestmentSpec {
                amount: dec!(120_000),
                week_index: 0,
            }),
            plan: Some(PlanRequest {
                investment: dec!(120_000),
                target_irr: dec!(0.20),
                installment_count: 12,
                buffer: BufferPolicy::None,
                investment_week_index: 0,
                first_repayment_week: None,
            }),
        }
    }

    #[test]
    fn test_recompute_builds_full_snapshot() {
        let out = recompute(&sample_state()).unwrap();
        let snapshot = &out.result;

        assert_eq!(snapshot.week_table.len(), 16);
        assert_eq!(snapshot.rows.len(), 16);
        assert_eq!(snapshot.normalized_repayments.len(), 1);
        assert!(snapshot.valuation.is_some());
        assert!(snapshot.suggested_plan.is_some());

        for pair in snapshot.rows.windows(2) {
            assert_eq!(pair[1].opening_balance, pair[0].closing_balance);
        }
    }

    #[test]
    fn test_recompute_is_pure() {
        let state = sample_state();
        let a = recompute(&state).unwrap();
        let b = recompute(&state).unwrap();
        assert_eq!(
            serde_json::to_value(&a.result).unwrap(),
            serde_json::to_value(&b.result).unwrap()
        );
    }

    #[test]
    fn test_valuation_skipped_without_investment() {
        let mut state = sample_state();
        state.investment = None;
        let out = recompute(&state).unwrap();
        assert!(out.result.valuation.is_none());
    }
}

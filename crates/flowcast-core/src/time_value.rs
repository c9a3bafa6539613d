use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FlowcastError;
use crate::types::{with_metadata, CashFlow, ComputationOutput, Money, Rate};
use crate::FlowcastResult;

/// Newton-Raphson stops once the rate update is below this.
const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
/// Step used for the finite-difference derivative.
const DERIVATIVE_EPSILON: Decimal = dec!(0.000001);
/// A derivative smaller than this means the series has no usable slope
/// at the current rate; the IRR is reported as undefined.
const DERIVATIVE_FLOOR: Decimal = dec!(0.0000000001);
/// Hard cap on root-finding iterations, the sole guard against
/// pathological cash-flow shapes.
const MAX_IRR_ITERATIONS: u32 = 100;
/// Standard starting guess of 10%.
const DEFAULT_IRR_GUESS: Decimal = dec!(0.1);
/// Actual/365.25 day-count basis for annualization.
const DAYS_PER_YEAR: Decimal = dec!(365.25);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for the valuation summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationInput {
    /// Dated cash flows; first entry is the negative investment outflow.
    pub flows: Vec<CashFlow>,
    /// Annual discount rate for NPV and discounted payback.
    pub discount_rate: Rate,
}

/// NPV / IRR / discounted payback summary scalars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationSummary {
    pub npv: Money,
    /// None when the series has no real IRR (all-positive or
    /// all-negative flows, or the root finder fails to converge).
    /// Display layers render this as "n/a", never as 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irr: Option<Rate>,
    /// Position in the dated series at which cumulative discounted
    /// inflows first cover the investment; None means not achieved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_payback_index: Option<usize>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Net Present Value over actual elapsed days.
///
/// `Σ amount_i / (1+rate)^(days_i / 365.25)` where `days_i` is measured
/// from the first flow's date. Repayments are not evenly spaced, so a
/// period-count NPV would misprice early and late payments.
pub fn npv(rate: Rate, flows: &[CashFlow]) -> FlowcastResult<Money> {
    if flows.is_empty() {
        return Err(FlowcastError::InsufficientData(
            "NPV requires at least 1 cash flow".into(),
        ));
    }
    if rate <= dec!(-1) {
        return Err(FlowcastError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let base_date = flows[0].date;
    let one_plus_r = Decimal::ONE + rate;
    let mut result = Decimal::ZERO;

    for flow in flows {
        let days = (flow.date - base_date).num_days();
        let years = Decimal::from(days) / DAYS_PER_YEAR;
        let discount = one_plus_r.powd(years);
        if discount.is_zero() {
            return Err(FlowcastError::DivisionByZero {
                context: format!("NPV discount factor at {}", flow.date),
            });
        }
        result += flow.amount / discount;
    }

    Ok(result)
}

/// Date-accurate IRR via Newton-Raphson with a finite-difference
/// derivative.
pub fn xirr(flows: &[CashFlow]) -> FlowcastResult<Rate> {
    xirr_from(flows, DEFAULT_IRR_GUESS)
}

/// As [`xirr`] but with an explicit starting guess.
pub fn xirr_from(flows: &[CashFlow], guess: Rate) -> FlowcastResult<Rate> {
    if flows.len() < 2 {
        return Err(FlowcastError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let mut rate = guess;

    for i in 0..MAX_IRR_ITERATIONS {
        let value = npv(rate, flows)?;
        let bumped = npv(rate + DERIVATIVE_EPSILON, flows)?;
        let derivative = (bumped - value) / DERIVATIVE_EPSILON;

        if derivative.abs() < DERIVATIVE_FLOOR {
            return Err(FlowcastError::ConvergenceFailure {
                function: "XIRR".into(),
                iterations: i,
                last_delta: value,
            });
        }

        let step = value / derivative;
        rate -= step;

        // Guard against divergence
        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }

        if step.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }
    }

    Err(FlowcastError::ConvergenceFailure {
        function: "XIRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta: npv(rate, flows).unwrap_or(Decimal::MAX),
    })
}

/// First series position at which cumulative discounted inflows reach
/// the investment magnitude. None means payback is never achieved — a
/// sentinel number would read as a real period.
pub fn discounted_payback(rate: Rate, flows: &[CashFlow]) -> FlowcastResult<Option<usize>> {
    if flows.len() < 2 {
        return Ok(None);
    }

    let investment = flows[0].amount.abs();
    let base_date = flows[0].date;
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return Err(FlowcastError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut cumulative = Decimal::ZERO;
    for (i, flow) in flows.iter().enumerate().skip(1) {
        let days = (flow.date - base_date).num_days();
        let years = Decimal::from(days) / DAYS_PER_YEAR;
        cumulative += flow.amount / one_plus_r.powd(years);
        if cumulative >= investment {
            return Ok(Some(i));
        }
    }

    Ok(None)
}

/// Full valuation summary over a dated series.
pub fn value_series(input: &ValuationInput) -> FlowcastResult<ComputationOutput<ValuationSummary>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.flows.is_empty() {
        return Err(FlowcastError::InsufficientData(
            "Valuation requires at least one cash flow".into(),
        ));
    }

    let mut flows = input.flows.clone();
    flows.sort_by_key(|f| f.date);

    let npv_value = npv(input.discount_rate, &flows)?;

    let irr = match xirr(&flows) {
        Ok(rate) => Some(rate),
        Err(FlowcastError::ConvergenceFailure { .. })
        | Err(FlowcastError::InsufficientData(_)) => {
            warnings.push(
                "IRR is undefined for this cash-flow shape; reported as n/a".into(),
            );
            None
        }
        Err(e) => return Err(e),
    };

    let discounted_payback_index = discounted_payback(input.discount_rate, &flows)?;
    if discounted_payback_index.is_none() && flows.len() > 1 {
        warnings.push("Discounted payback not achieved within the series".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Actual/365.25 dated NPV; XIRR via Newton-Raphson with finite-difference derivative",
        input,
        warnings,
        elapsed,
        ValuationSummary {
            npv: npv_value,
            irr,
            discounted_payback_index,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flow(date: NaiveDate, amount: Decimal) -> CashFlow {
        CashFlow {
            date,
            amount,
            label: None,
        }
    }

    #[test]
    fn test_npv_at_zero_rate_is_plain_sum() {
        let flows = vec![
            flow(d(2025, 1, 1), dec!(-1000)),
            flow(d(2025, 7, 1), dec!(600)),
            flow(d(2026, 1, 1), dec!(600)),
        ];
        assert_eq!(npv(dec!(0), &flows).unwrap(), dec!(200));
    }

    #[test]
    fn test_npv_discounts_later_flows_more() {
        let early = vec![
            flow(d(2025, 1, 1), dec!(-1000)),
            flow(d(2025, 4, 1), dec!(1100)),
        ];
        let late = vec![
            flow(d(2025, 1, 1), dec!(-1000)),
            flow(d(2026, 4, 1), dec!(1100)),
        ];
        let npv_early = npv(dec!(0.1), &early).unwrap();
        let npv_late = npv(dec!(0.1), &late).unwrap();
        assert!(npv_early > npv_late);
    }

    #[test]
    fn test_xirr_one_year_double() {
        // 1000 out, 2000 back exactly one year later: IRR ~100%
        let flows = vec![
            flow(d(2025, 1, 1), dec!(-1000)),
            flow(d(2026, 1, 1), dec!(2000)),
        ];
        let rate = xirr(&flows).unwrap();
        assert!((rate - dec!(1.0)).abs() < dec!(0.01));
    }

    #[test]
    fn test_xirr_roundtrip_npv_near_zero() {
        let flows = vec![
            flow(d(2025, 1, 1), dec!(-120000)),
            flow(d(2025, 3, 12), dec!(15000)),
            flow(d(2025, 5, 21), dec!(45000)),
            flow(d(2025, 9, 3), dec!(40000)),
            flow(d(2025, 12, 17), dec!(35000)),
        ];
        let rate = xirr(&flows).unwrap();
        let residual = npv(rate, &flows).unwrap();
        assert!(residual.abs() < dec!(0.001));
    }

    #[test]
    fn test_xirr_all_positive_is_undefined() {
        let flows = vec![
            flow(d(2025, 1, 1), dec!(100)),
            flow(d(2025, 6, 1), dec!(100)),
        ];
        assert!(xirr(&flows).is_err());
    }

    #[test]
    fn test_discounted_payback_basic() {
        let flows = vec![
            flow(d(2025, 1, 1), dec!(-1000)),
            flow(d(2025, 2, 1), dec!(600)),
            flow(d(2025, 3, 1), dec!(600)),
            flow(d(2025, 4, 1), dec!(600)),
        ];
        let idx = discounted_payback(dec!(0.05), &flows).unwrap();
        assert_eq!(idx, Some(2));
    }

    #[test]
    fn test_discounted_payback_not_achieved() {
        let flows = vec![
            flow(d(2025, 1, 1), dec!(-1000)),
            flow(d(2025, 2, 1), dec!(100)),
        ];
        assert_eq!(discounted_payback(dec!(0.05), &flows).unwrap(), None);
    }

    #[test]
    fn test_value_series_reports_na_irr_without_failing() {
        let input = ValuationInput {
            flows: vec![
                flow(d(2025, 1, 1), dec!(100)),
                flow(d(2025, 6, 1), dec!(100)),
            ],
            discount_rate: dec!(0.05),
        };
        let out = value_series(&input).unwrap();
        assert_eq!(out.result.irr, None);
        assert!(out.warnings.iter().any(|w| w.contains("n/a")));
    }
}

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::calendar::synthetic_date;
use crate::time_value::xirr;
use crate::types::{with_metadata, CashFlow, CashFlowRow, ComputationOutput, Money, Rate, WeekSlot};
use crate::FlowcastResult;

/// Hard cap on candidate weeks examined. Adversarial buffer and
/// installment combinations could otherwise walk forever; hitting the
/// cap surfaces as a structured shortfall warning, never silence.
const MAX_PLAN_ITERATIONS: u32 = 500;
/// Payment probing granularity when the full installment would break
/// the balance floor: fractions of the installment in 10% steps.
const PAYMENT_PROBE_STEPS: u32 = 10;
/// Outstanding principal below this counts as settled.
const SETTLE_TOLERANCE: Decimal = dec!(0.01);
/// Achieved-vs-target return mismatch (1 percentage point) that
/// triggers an advisory.
const IRR_MISS_TOLERANCE: Decimal = dec!(0.01);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Minimum spacing between two scheduled repayments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BufferPolicy {
    None,
    TwoWeeks,
    OneMonth,
    TwoMonths,
    Quarter,
    Custom(u32),
}

impl BufferPolicy {
    /// Spacing in whole weeks.
    pub fn weeks(&self) -> u32 {
        match self {
            BufferPolicy::None => 0,
            BufferPolicy::TwoWeeks => 2,
            BufferPolicy::OneMonth => 4,
            BufferPolicy::TwoMonths => 8,
            BufferPolicy::Quarter => 13,
            BufferPolicy::Custom(n) => *n,
        }
    }
}

impl fmt::Display for BufferPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferPolicy::None => write!(f, "none"),
            BufferPolicy::TwoWeeks => write!(f, "2weeks"),
            BufferPolicy::OneMonth => write!(f, "1month"),
            BufferPolicy::TwoMonths => write!(f, "2months"),
            BufferPolicy::Quarter => write!(f, "quarter"),
            BufferPolicy::Custom(n) => write!(f, "custom:{n}"),
        }
    }
}

impl std::str::FromStr for BufferPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(BufferPolicy::None),
            "2weeks" => Ok(BufferPolicy::TwoWeeks),
            "1month" => Ok(BufferPolicy::OneMonth),
            "2months" => Ok(BufferPolicy::TwoMonths),
            "quarter" => Ok(BufferPolicy::Quarter),
            other => {
                let n = other
                    .strip_prefix("custom:")
                    .and_then(|rest| rest.trim().trim_end_matches("weeks").trim().parse().ok())
                    .ok_or_else(|| format!("Unknown buffer policy '{s}'"))?;
                Ok(BufferPolicy::Custom(n))
            }
        }
    }
}

impl TryFrom<String> for BufferPolicy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BufferPolicy> for String {
    fn from(p: BufferPolicy) -> Self {
        p.to_string()
    }
}

/// What the caller wants the plan to achieve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub investment: Money,
    /// Target return as a decimal (0.20 = repay 120% of the
    /// investment in total).
    pub target_irr: Rate,
    pub installment_count: u32,
    #[serde(default = "default_buffer")]
    pub buffer: BufferPolicy,
    /// Week the investment lands; repayments start after it.
    pub investment_week_index: usize,
    /// Optional user-chosen earliest repayment week.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_repayment_week: Option<usize>,
}

fn default_buffer() -> BufferPolicy {
    BufferPolicy::None
}

/// Projected cash-flow context the plan must respect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanContext {
    pub week_slots: Vec<WeekSlot>,
    /// Aggregated rows before any suggested repayment is applied.
    pub rows: Vec<CashFlowRow>,
    /// Seeds synthetic-week dates when the calendar is empty; never
    /// the wall clock, so identical inputs give identical plans.
    pub base_year: i32,
}

/// One scheduled repayment, shaped for overlay rendering and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLine {
    pub week_index: usize,
    pub label: String,
    pub date: chrono::NaiveDate,
    pub amount: Money,
    pub cumulative: Money,
    pub discounted_cumulative: Money,
}

/// The synthesized repayment plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedPlan {
    /// Repayment per week, indexed by week; extended weeks appended.
    pub schedule: Vec<Money>,
    /// Realized flat return (total scheduled / investment − 1),
    /// directly comparable to the requested target. None for an empty
    /// plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achieved_irr: Option<Rate>,
    /// Date-annualized IRR of the realized schedule. None when the
    /// series has no real solution; displayed as "n/a".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annualized_irr: Option<Rate>,
    pub total_scheduled: Money,
    pub target_return: Money,
    /// Synthetic weeks appended past the calendar to place the tail.
    pub extended_weeks: usize,
    pub lines: Vec<PlanLine>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Synthesize a week-indexed repayment schedule for the requested
/// return, respecting the buffer spacing and the non-negative
/// bank-balance floor.
///
/// Greedy and deterministic: it walks forward one week at a time,
/// paying the full installment where the projected balance allows it,
/// probing smaller fractions where it does not, and pushing any
/// shortfall into later (possibly synthetic) weeks. It does not search
/// for a globally optimal placement.
pub fn synthesize(
    request: &PlanRequest,
    context: &PlanContext,
) -> FlowcastResult<ComputationOutput<SuggestedPlan>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    // Mid-edit configurations short-circuit to an empty plan rather
    // than erroring; the engine runs continuously while the user types.
    if request.investment <= Decimal::ZERO
        || request.target_irr <= Decimal::ZERO
        || request.installment_count == 0
    {
        return Ok(empty_plan(request, warnings, start));
    }
    if context.week_slots.is_empty() {
        warnings.push("No resolved weeks; nothing to schedule against".into());
        return Ok(empty_plan(request, warnings, start));
    }
    if request.investment_week_index >= context.week_slots.len() {
        warnings.push(format!(
            "Investment week {} is outside the {}-week range; nothing scheduled",
            request.investment_week_index,
            context.week_slots.len()
        ));
        return Ok(empty_plan(request, warnings, start));
    }

    let target_return = request.investment * (Decimal::ONE + request.target_irr);
    let installment = target_return / Decimal::from(request.installment_count);
    let buffer = request.buffer.weeks() as usize;

    let mut slots: Vec<WeekSlot> = context.week_slots.clone();
    let mut available = balance_headroom(context, slots.len());
    let mut schedule = vec![Decimal::ZERO; slots.len()];

    let first_eligible = (request.investment_week_index + 1)
        .max(request.first_repayment_week.unwrap_or(0));
    if first_eligible > slots.len() + MAX_PLAN_ITERATIONS as usize {
        warnings.push(format!(
            "First repayment week {first_eligible} is too far past the {}-week range; nothing scheduled",
            slots.len()
        ));
        return Ok(empty_plan(request, warnings, start));
    }

    let mut outstanding = target_return;
    let mut last_paid: Option<usize> = None;
    let mut extended_weeks = 0usize;
    let mut week = first_eligible;

    for _ in 0..MAX_PLAN_ITERATIONS {
        if outstanding <= SETTLE_TOLERANCE {
            break;
        }

        while week >= slots.len() {
            append_synthetic_week(&mut slots, &mut available, &mut schedule, context.base_year);
            extended_weeks += 1;
        }

        if let Some(last) = last_paid {
            if week - last < buffer {
                week += 1;
                continue;
            }
        }

        let desired = installment.min(outstanding);
        if let Some(payment) = affordable_payment(desired, &available[week..]) {
            schedule[week] = payment;
            outstanding -= payment;
            for headroom in available[week..].iter_mut() {
                *headroom -= payment;
            }
            last_paid = Some(week);
        }

        week += 1;
    }

    if outstanding > SETTLE_TOLERANCE {
        warnings.push(format!(
            "Iteration limit reached with {outstanding:.2} of the target return unscheduled; relax the buffer, reduce installments, or extend the time horizon"
        ));
    }

    let total_scheduled = target_return - outstanding.max(Decimal::ZERO);
    let achieved = if request.investment.is_zero() {
        None
    } else {
        Some(total_scheduled / request.investment - Decimal::ONE)
    };

    if let Some(rate) = achieved {
        if (rate - request.target_irr).abs() > IRR_MISS_TOLERANCE {
            warnings.push(format!(
                "Achieved return {:.4} misses the {:.4} target by more than 1 percentage point; balance or buffer constraints forced deferrals",
                rate, request.target_irr
            ));
        }
    }

    let annualized = annualized_irr(request, &slots, &schedule);
    let lines = build_lines(request.target_irr, &slots, &schedule);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Greedy forward walk with buffer spacing, balance-floor probing and synthetic-week extension",
        request,
        warnings,
        elapsed,
        SuggestedPlan {
            schedule,
            achieved_irr: achieved,
            annualized_irr: annualized,
            total_scheduled,
            target_return,
            extended_weeks,
            lines,
        },
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Headroom per week: how much can be paid at week `w` without driving
/// that week — or any later week — below zero. Seeded from projected
/// closing balances; weeks with no row are unconstrained.
fn balance_headroom(context: &PlanContext, week_count: usize) -> Vec<Money> {
    let mut headroom = Vec::with_capacity(week_count);
    let mut last = Decimal::MAX;
    for index in 0..week_count {
        match context.rows.get(index) {
            Some(row) => {
                last = row.closing_balance;
                headroom.push(row.closing_balance);
            }
            None => headroom.push(last),
        }
    }
    headroom
}

/// Largest payment up to `desired` that keeps every week from the
/// candidate onward non-negative. Probes 10% fractions when the full
/// amount does not fit; a slightly larger in-between payment might fit
/// too, but the coarse probe is intentional greedy behavior.
fn affordable_payment(desired: Money, headroom_tail: &[Money]) -> Option<Money> {
    if desired <= Decimal::ZERO {
        return None;
    }
    let limit = headroom_tail.iter().copied().min()?;
    if limit >= desired {
        return Some(desired);
    }
    if limit <= Decimal::ZERO {
        return None;
    }

    let step = desired / Decimal::from(PAYMENT_PROBE_STEPS);
    for fraction in (1..PAYMENT_PROBE_STEPS).rev() {
        let probe = step * Decimal::from(fraction);
        if probe <= limit {
            return Some(probe);
        }
    }
    None
}

fn append_synthetic_week(
    slots: &mut Vec<WeekSlot>,
    available: &mut Vec<Money>,
    schedule: &mut Vec<Money>,
    base_year: i32,
) {
    let index = slots.len();
    let date = match slots.last() {
        Some(last) => last.date + Duration::days(7),
        None => synthetic_date(base_year, index),
    };
    slots.push(WeekSlot {
        index,
        label: format!("Week {} (extended)", index + 1),
        date,
        synthetic: true,
        source_column: index,
    });
    available.push(available.last().copied().unwrap_or(Decimal::MAX));
    schedule.push(Decimal::ZERO);
}

/// Date-annualized IRR of the realized schedule, None when undefined.
fn annualized_irr(request: &PlanRequest, slots: &[WeekSlot], schedule: &[Money]) -> Option<Rate> {
    let investment_date = slots.get(request.investment_week_index)?.date;
    let mut flows = vec![CashFlow {
        date: investment_date,
        amount: -request.investment,
        label: None,
    }];
    for (index, amount) in schedule.iter().enumerate() {
        if *amount > Decimal::ZERO {
            flows.push(CashFlow {
                date: slots[index].date,
                amount: *amount,
                label: None,
            });
        }
    }
    if flows.len() < 2 {
        return None;
    }
    xirr(&flows).ok()
}

fn build_lines(discount_rate: Rate, slots: &[WeekSlot], schedule: &[Money]) -> Vec<PlanLine> {
    let Some(first_date) = slots.first().map(|s| s.date) else {
        return Vec::new();
    };

    let mut cumulative = Decimal::ZERO;
    let mut discounted_cumulative = Decimal::ZERO;
    let mut lines = Vec::new();

    for (index, amount) in schedule.iter().enumerate() {
        if *amount <= Decimal::ZERO {
            continue;
        }
        let slot = &slots[index];
        cumulative += amount;
        let days = (slot.date - first_date).num_days();
        let years = Decimal::from(days) / dec!(365.25);
        let discount = rust_decimal::MathematicalOps::powd(&(Decimal::ONE + discount_rate), years);
        if !discount.is_zero() {
            discounted_cumulative += amount / discount;
        }
        lines.push(PlanLine {
            week_index: index,
            label: slot.label.clone(),
            date: slot.date,
            amount: *amount,
            cumulative,
            discounted_cumulative,
        });
    }

    lines
}

fn empty_plan(
    request: &PlanRequest,
    warnings: Vec<String>,
    start: Instant,
) -> ComputationOutput<SuggestedPlan> {
    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Greedy forward walk with buffer spacing, balance-floor probing and synthetic-week extension",
        request,
        warnings,
        elapsed,
        SuggestedPlan {
            schedule: Vec::new(),
            achieved_irr: None,
            annualized_irr: None,
            total_scheduled: Decimal::ZERO,
            target_return: Decimal::ZERO,
            extended_weeks: 0,
            lines: Vec::new(),
        },
    )
}

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::parse_header_date;
use crate::types::{Money, WeekSlot};

/// Recurrence rule for frequency-based repayment entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Quarterly,
    OneOff,
}

/// The repayment input shapes accepted from callers. All of them
/// normalize to `{ week_index, amount }` before any aggregation, so
/// variant handling lives in exactly one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepaymentEntry {
    /// Explicit calendar date, in any format the calendar resolver
    /// accepts for headers.
    Date { date: String, amount: Money },
    /// Legacy week-label reference ("Week 3", "W3", a 1-based number,
    /// or an exact header label).
    Week { week: String, amount: Money },
    /// Pre-resolved week index with an optional date fallback.
    Unified {
        #[serde(skip_serializing_if = "Option::is_none")]
        date: Option<String>,
        week_index: usize,
        amount: Money,
    },
    /// Recurring rule expanded along the resolved calendar.
    Frequency {
        frequency: Frequency,
        amount: Money,
        #[serde(default)]
        start_week_index: usize,
    },
}

/// Canonical repayment shape used by the aggregator and synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRepayment {
    pub week_index: usize,
    pub amount: Money,
}

/// Normalize every entry to week indices against the resolved slots.
///
/// Out-of-range or unparseable entries are dropped with a warning and
/// are never counted twice; every surviving repayment maps to exactly
/// one slot index.
pub fn normalize(
    entries: &[RepaymentEntry],
    slots: &[WeekSlot],
    base_year: i32,
) -> (Vec<NormalizedRepayment>, Vec<String>) {
    let mut normalized = Vec::with_capacity(entries.len());
    let mut warnings = Vec::new();

    for (pos, entry) in entries.iter().enumerate() {
        match entry {
            RepaymentEntry::Date { date, amount } => {
                match parse_header_date(date, base_year) {
                    Some(parsed) => match slot_for_date(slots, parsed) {
                        Some(index) => normalized.push(NormalizedRepayment {
                            week_index: index,
                            amount: *amount,
                        }),
                        None => warnings.push(format!(
                            "Repayment {pos}: date {parsed} is outside the week range; entry dropped"
                        )),
                    },
                    None => warnings.push(format!(
                        "Repayment {pos}: unparseable date '{date}'; entry dropped"
                    )),
                }
            }
            RepaymentEntry::Week { week, amount } => match slot_for_label(slots, week) {
                Some(index) => normalized.push(NormalizedRepayment {
                    week_index: index,
                    amount: *amount,
                }),
                None => warnings.push(format!(
                    "Repayment {pos}: week label '{week}' does not match any column; entry dropped"
                )),
            },
            RepaymentEntry::Unified {
                date,
                week_index,
                amount,
            } => {
                if *week_index < slots.len() {
                    normalized.push(NormalizedRepayment {
                        week_index: *week_index,
                        amount: *amount,
                    });
                } else if let Some(index) = date
                    .as_deref()
                    .and_then(|d| parse_header_date(d, base_year))
                    .and_then(|d| slot_for_date(slots, d))
                {
                    normalized.push(NormalizedRepayment {
                        week_index: index,
                        amount: *amount,
                    });
                } else {
                    warnings.push(format!(
                        "Repayment {pos}: week index {week_index} out of range and no usable date; entry dropped"
                    ));
                }
            }
            RepaymentEntry::Frequency {
                frequency,
                amount,
                start_week_index,
            } => {
                let occurrences =
                    expand_frequency(slots, *frequency, *start_week_index);
                if occurrences.is_empty() {
                    warnings.push(format!(
                        "Repayment {pos}: {frequency:?} rule produced no occurrences within the week range"
                    ));
                }
                for index in occurrences {
                    normalized.push(NormalizedRepayment {
                        week_index: index,
                        amount: *amount,
                    });
                }
            }
        }
    }

    (normalized, warnings)
}

/// Latest slot whose date is on or before `date`. A date before the
/// first slot or more than a week past the last is out of range.
pub fn slot_for_date(slots: &[WeekSlot], date: NaiveDate) -> Option<usize> {
    let first = slots.first()?;
    let last = slots.last()?;
    if date < first.date || date >= last.date + chrono::Duration::days(7) {
        return None;
    }

    slots
        .iter()
        .rev()
        .find(|slot| slot.date <= date)
        .map(|slot| slot.index)
}

fn slot_for_label(slots: &[WeekSlot], label: &str) -> Option<usize> {
    let trimmed = label.trim();

    if let Some(slot) = slots
        .iter()
        .find(|s| s.label.eq_ignore_ascii_case(trimmed))
    {
        return Some(slot.index);
    }

    // "Week 3" / "W3" / bare "3" as a 1-based week number
    let lower = trimmed.to_ascii_lowercase();
    let digits = lower
        .strip_prefix("week")
        .or_else(|| lower.strip_prefix("wk"))
        .or_else(|| lower.strip_prefix('w'))
        .unwrap_or(&lower)
        .trim();
    let number: usize = digits.parse().ok()?;
    if number >= 1 && number <= slots.len() {
        Some(number - 1)
    } else {
        None
    }
}

/// Expand a recurrence rule into slot indices. Monthly and quarterly
/// rules land on the first slot on or after each calendar anniversary
/// of the starting slot's date; one-off lands on the starting slot.
fn expand_frequency(slots: &[WeekSlot], frequency: Frequency, start: usize) -> Vec<usize> {
    if start >= slots.len() {
        return Vec::new();
    }

    let step_months = match frequency {
        Frequency::OneOff => return vec![start],
        Frequency::Monthly => 1u32,
        Frequency::Quarterly => 3u32,
    };

    let anchor = slots[start].date;
    let horizon = slots.last().map(|s| s.date).unwrap_or(anchor);
    let mut occurrences = vec![start];
    let mut step = step_months;

    loop {
        let target = anchor + Months::new(step);
        if target > horizon {
            break;
        }
        if let Some(slot) = slots.iter().skip(start).find(|s| s.date >= target) {
            // A sparse calendar can map two anniversaries onto one slot;
            // only count it once.
            if occurrences.last() != Some(&slot.index) {
                occurrences.push(slot.index);
            }
        }
        step += step_months;
    }

    occurrences
}

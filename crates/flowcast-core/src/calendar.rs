use chrono::{Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FlowcastError;
use crate::types::{with_metadata, ComputationOutput, WeekSlot};
use crate::FlowcastResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for week-table resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarInput {
    /// Raw column headers, in original spreadsheet order.
    pub headers: Vec<String>,
    /// Year used for headers that carry no year of their own and for
    /// synthetic fallback dates.
    pub base_year: i32,
}

/// Resolved week table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekTable {
    pub slots: Vec<WeekSlot>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve raw column headers into the canonical week table.
pub fn resolve_weeks(input: &CalendarInput) -> FlowcastResult<ComputationOutput<WeekTable>> {
    let start = Instant::now();

    if input.base_year < 1900 || input.base_year > 2200 {
        return Err(FlowcastError::InvalidInput {
            field: "base_year".into(),
            reason: "Base year must be between 1900 and 2200".into(),
        });
    }

    let (slots, warnings) = resolve(&input.headers, input.base_year);
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Prioritized header parsing (numeric date, day-month-year, bare day-month, ISO week token) with synthetic fallback",
        input,
        warnings,
        elapsed,
        WeekTable { slots },
    ))
}

/// Turn headers into week slots, preserving original column order.
///
/// Columns are never re-sorted chronologically: user-entered weekly data
/// is assumed already sequential, and re-sorting would corrupt week-index
/// references entered against the original layout. Unparseable headers
/// keep their column and get a synthetic date so the sequence stays
/// total.
pub fn resolve(headers: &[String], base_year: i32) -> (Vec<WeekSlot>, Vec<String>) {
    let mut slots = Vec::with_capacity(headers.len());
    let mut warnings = Vec::new();

    for (column, header) in headers.iter().enumerate() {
        let index = slots.len();
        let (date, synthetic) = match parse_header_date(header, base_year) {
            Some(d) => (d, false),
            None => (synthetic_date(base_year, index), true),
        };

        slots.push(WeekSlot {
            index,
            label: header.trim().to_string(),
            date,
            synthetic,
            source_column: column,
        });
    }

    collect_advisories(&slots, &mut warnings);
    (slots, warnings)
}

/// Synthetic fallback date: base-year Jan 1 plus 7 days per week index.
pub fn synthetic_date(base_year: i32, index: usize) -> NaiveDate {
    // Jan 1 always exists; fall back to the epoch only if the year is
    // out of chrono's range, which validation prevents upstream.
    let base = NaiveDate::from_ymd_opt(base_year, 1, 1)
        .unwrap_or(NaiveDate::MIN);
    base + Duration::days(7 * index as i64)
}

/// Try the prioritized header patterns; None means "no parseable date".
pub fn parse_header_date(header: &str, base_year: i32) -> Option<NaiveDate> {
    let text = header.trim();
    if text.is_empty() {
        return None;
    }

    parse_numeric_date(text)
        .or_else(|| parse_day_month_year(text, base_year))
        .or_else(|| parse_week_token(text, base_year))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `DD/MM/YYYY`, `DD-MM-YYYY`, two-digit years expanded to `20YY`.
fn parse_numeric_date(text: &str) -> Option<NaiveDate> {
    let sep = if text.contains('/') { '/' } else { '-' };
    let parts: Vec<&str> = text.split(sep).map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }

    let day: u32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let year_raw: i32 = parts[2].parse().ok()?;
    let year = expand_two_digit_year(year_raw);

    NaiveDate::from_ymd_opt(year, month, day)
}

/// `DD Month YYYY`, `1 Jan`, `Jan 1`, `1-7 Jan` (range keeps the start
/// day). Year defaults to `base_year` when absent.
fn parse_day_month_year(text: &str, base_year: i32) -> Option<NaiveDate> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() > 3 {
        return None;
    }

    let mut day: Option<u32> = None;
    let mut month: Option<u32> = None;
    let mut year: Option<i32> = None;

    for token in &tokens {
        if let Some(m) = month_from_name(token) {
            if month.is_some() {
                return None;
            }
            month = Some(m);
        } else if let Some(d) = parse_day_token(token) {
            // A 4-digit number is a year, not a day.
            if token.len() >= 4 {
                year = Some(d as i32);
            } else if day.is_none() {
                day = Some(d);
            } else if year.is_none() {
                year = Some(expand_two_digit_year(d as i32));
            } else {
                return None;
            }
        } else {
            return None;
        }
    }

    NaiveDate::from_ymd_opt(year.unwrap_or(base_year), month?, day?)
}

/// Day token, allowing a `1-7` style range (start day wins).
fn parse_day_token(token: &str) -> Option<u32> {
    let cleaned = token.trim_end_matches(|c| c == ',' || c == '.');
    if let Some((start, end)) = cleaned.split_once('-') {
        let s: u32 = start.parse().ok()?;
        let _: u32 = end.parse().ok()?;
        return Some(s);
    }
    cleaned.parse().ok()
}

/// `Week 26`, `W26`, `wk 26` — converted via the ISO-8601 week
/// definition (Thursday-anchored); the emitted date is that week's
/// Monday.
fn parse_week_token(text: &str, base_year: i32) -> Option<NaiveDate> {
    let lower = text.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("week")
        .or_else(|| lower.strip_prefix("wk"))
        .or_else(|| lower.strip_prefix('w'))?;
    let number: u32 = rest.trim().parse().ok()?;
    if number == 0 || number > 53 {
        return None;
    }
    NaiveDate::from_isoywd_opt(base_year, number, Weekday::Mon)
}

fn expand_two_digit_year(year: i32) -> i32 {
    if (0..100).contains(&year) {
        2000 + year
    } else {
        year
    }
}

fn month_from_name(token: &str) -> Option<u32> {
    let cleaned: String = token
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();
    if cleaned.len() < 3 {
        return None;
    }

    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];

    MONTHS
        .iter()
        .position(|m| m.starts_with(&cleaned))
        .map(|i| i as u32 + 1)
}

/// Duplicate labels and non-ascending adjacent dates are advisory only;
/// they never block computation or change column order.
fn collect_advisories(slots: &[WeekSlot], warnings: &mut Vec<String>) {
    let mut seen: Vec<&str> = Vec::with_capacity(slots.len());
    let mut reported: Vec<&str> = Vec::new();
    for slot in slots {
        let label = slot.label.as_str();
        if !label.is_empty()
            && seen.iter().any(|s| s.eq_ignore_ascii_case(label))
            && !reported.iter().any(|s| s.eq_ignore_ascii_case(label))
        {
            warnings.push(format!("Duplicate week label '{label}'"));
            reported.push(label);
        }
        seen.push(label);
    }

    for pair in slots.windows(2) {
        if pair[1].date <= pair[0].date {
            warnings.push(format!(
                "Week {} ('{}', {}) does not advance past week {} ('{}', {}); columns kept in spreadsheet order",
                pair[1].index, pair[1].label, pair[1].date,
                pair[0].index, pair[0].label, pair[0].date,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numeric_date_formats() {
        assert_eq!(
            parse_header_date("15/03/2025", 2025),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
        assert_eq!(
            parse_header_date("15-03-2025", 2025),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
        // Two-digit year expands to 20YY
        assert_eq!(
            parse_header_date("01/02/25", 2019),
            NaiveDate::from_ymd_opt(2025, 2, 1)
        );
    }

    #[test]
    fn test_day_month_formats() {
        assert_eq!(
            parse_header_date("1 Jan", 2025),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(
            parse_header_date("Jan 1", 2025),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(
            parse_header_date("12 March 2024", 2025),
            NaiveDate::from_ymd_opt(2024, 3, 12)
        );
        // Range label keeps the start day
        assert_eq!(
            parse_header_date("1-7 Jan", 2025),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
    }

    #[test]
    fn test_week_token() {
        let expected = NaiveDate::from_isoywd_opt(2025, 26, Weekday::Mon);
        assert_eq!(parse_header_date("Week 26", 2025), expected);
        assert_eq!(parse_header_date("W26", 2025), expected);
        assert_eq!(parse_header_date("Week 0", 2025), None);
        assert_eq!(parse_header_date("W99", 2025), None);
    }

    #[test]
    fn test_unparseable_header_gets_synthetic_date() {
        let (slots, _) = resolve(&labels(&["garbage", "8 Jan"]), 2025);
        assert_eq!(slots.len(), 2);
        assert!(slots[0].synthetic);
        assert_eq!(slots[0].date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(!slots[1].synthetic);
        // Label is preserved for display
        assert_eq!(slots[0].label, "garbage");
    }

    #[test]
    fn test_original_order_is_kept() {
        // Deliberately out of chronological order
        let (slots, warnings) = resolve(&labels(&["15 Jan", "1 Jan", "8 Jan"]), 2025);
        assert_eq!(slots[0].date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(slots[1].date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(slots[0].index, 0);
        assert_eq!(slots[1].index, 1);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_duplicate_labels_warn_once() {
        let (_, warnings) = resolve(&labels(&["1 Jan", "1 Jan", "1 Jan"]), 2025);
        let dup: Vec<_> = warnings.iter().filter(|w| w.contains("Duplicate")).collect();
        assert_eq!(dup.len(), 1);
    }

    #[test]
    fn test_resolve_weeks_envelope() {
        let input = CalendarInput {
            headers: labels(&["1 Jan", "8 Jan", "15 Jan"]),
            base_year: 2025,
        };
        let out = resolve_weeks(&input).unwrap();
        assert_eq!(out.result.slots.len(), 3);
        assert!(out.warnings.is_empty());
        for pair in out.result.slots.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn test_base_year_validation() {
        let input = CalendarInput {
            headers: labels(&["1 Jan"]),
            base_year: 1400,
        };
        assert!(resolve_weeks(&input).is_err());
    }
}

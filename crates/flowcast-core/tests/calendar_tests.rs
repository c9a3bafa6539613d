use chrono::NaiveDate;
use flowcast_core::calendar::{resolve, resolve_weeks, CalendarInput};
use pretty_assertions::assert_eq;

// ===========================================================================
// Calendar resolver tests
// ===========================================================================

fn headers(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_bare_day_month_headers_resolve_ascending() {
    // Plain day-month headers, base year 2025
    let (slots, warnings) = resolve(&headers(&["1 Jan", "8 Jan", "15 Jan"]), 2025);

    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0].date, date(2025, 1, 1));
    assert_eq!(slots[1].date, date(2025, 1, 8));
    assert_eq!(slots[2].date, date(2025, 1, 15));
    assert!(warnings.is_empty());

    // Strictly ascending, contiguous indices
    for (i, pair) in slots.windows(2).enumerate() {
        assert!(pair[0].date < pair[1].date);
        assert_eq!(pair[0].index, i);
        assert_eq!(pair[1].index, i + 1);
    }
}

#[test]
fn test_mixed_format_headers() {
    let (slots, _) = resolve(
        &headers(&["06/01/2025", "13-01-25", "20 January 2025", "W5"]),
        2025,
    );

    assert_eq!(slots[0].date, date(2025, 1, 6));
    assert_eq!(slots[1].date, date(2025, 1, 13));
    assert_eq!(slots[2].date, date(2025, 1, 20));
    // ISO week 5 of 2025 starts Monday 27 January
    assert_eq!(slots[3].date, date(2025, 1, 27));
    assert!(slots.iter().all(|s| !s.synthetic));
}

#[test]
fn test_unparseable_headers_keep_columns_and_order() {
    let (slots, _) = resolve(&headers(&["Totals", "8 Jan", "???"]), 2025);

    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0].label, "Totals");
    assert!(slots[0].synthetic);
    assert_eq!(slots[0].date, date(2025, 1, 1));
    assert!(!slots[1].synthetic);
    assert!(slots[2].synthetic);
    // Synthetic fallback: base-year start + 7 x index days
    assert_eq!(slots[2].date, date(2025, 1, 15));
    // Column mapping preserved
    assert_eq!(slots[2].source_column, 2);
}

#[test]
fn test_duplicate_and_overlap_advisories_never_block() {
    let (slots, warnings) = resolve(&headers(&["8 Jan", "8 Jan", "1 Jan"]), 2025);

    // Still three usable slots, in spreadsheet order
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[2].date, date(2025, 1, 1));
    assert!(warnings.iter().any(|w| w.contains("Duplicate")));
    assert!(warnings.iter().any(|w| w.contains("does not advance")));
}

#[test]
fn test_envelope_carries_methodology_and_metadata() {
    let input = CalendarInput {
        headers: headers(&["1 Jan", "8 Jan"]),
        base_year: 2025,
    };
    let out = resolve_weeks(&input).unwrap();

    assert_eq!(out.result.slots.len(), 2);
    assert!(!out.methodology.is_empty());
    assert_eq!(out.metadata.precision, "rust_decimal_128bit");
}

#[test]
fn test_two_digit_years_expand_to_2000s() {
    let (slots, _) = resolve(&headers(&["05/06/24"]), 2025);
    assert_eq!(slots[0].date, date(2024, 6, 5));
}

//! Format-agnostic date parsing for spreadsheet cells.
//!
//! Accepted shapes, tried in this order:
//!
//! | shape | reading |
//! |---|---|
//! | `YYYY-MM-DD` | ISO |
//! | `M-D-YYYY` | month first |
//! | `N/N/YYYY` | see below |
//! | `D.M.YYYY` | day first |
//! | `N/N/YY` | month first unless the first part is above 12 |
//!
//! For `N/N/YYYY`: a first component above 12 forces day-first, otherwise a
//! second component above 12 forces month-first, otherwise day-first wins.
//! Two-digit years below 50 land in the 2000s, the rest in the 1900s.
//!
//! Anything else, or a date that does not exist on the calendar, yields `None`.

use chrono::NaiveDate;

/// Parse a date cell into a calendar date.
#[must_use]
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Some([y, m, d]) = numeric_parts(s, '-', [4..=4, 2..=2, 2..=2]) {
        return ymd(y, m, d);
    }
    if let Some([m, d, y]) = numeric_parts(s, '-', [1..=2, 1..=2, 4..=4]) {
        return ymd(y, m, d);
    }
    if let Some([a, b, y]) = numeric_parts(s, '/', [1..=2, 1..=2, 4..=4]) {
        return if a > 12 {
            ymd(y, b, a)
        } else if b > 12 {
            ymd(y, a, b)
        } else {
            ymd(y, b, a)
        };
    }
    if let Some([d, m, y]) = numeric_parts(s, '.', [1..=2, 1..=2, 4..=4]) {
        return ymd(y, m, d);
    }
    if let Some([a, b, yy]) = numeric_parts(s, '/', [1..=2, 1..=2, 2..=2]) {
        let y = if yy < 50 { 2000 + yy } else { 1900 + yy };
        return if a > 12 { ymd(y, b, a) } else { ymd(y, a, b) };
    }

    None
}

/// Canonical `YYYY-MM-DD` rendering.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Split `s` on `sep` into exactly three all-digit parts whose lengths fall in
/// the given ranges.
fn numeric_parts(
    s: &str,
    sep: char,
    widths: [std::ops::RangeInclusive<usize>; 3],
) -> Option<[u32; 3]> {
    let mut parts = s.split(sep);
    let mut out = [0u32; 3];
    for (slot, width) in out.iter_mut().zip(widths.iter()) {
        let part = parts.next()?;
        if !width.contains(&part.len()) || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

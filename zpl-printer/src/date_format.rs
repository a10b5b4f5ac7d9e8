//! Date tokens for label templates
//!
//! Pack dates arrive as `MM/DD/YY`, `MM/DD/YYYY` or `YYYY-MM-DD` strings.
//! Formatting never fails: unparsable input or an unknown token yields the
//! original string.

use chrono::{Datelike, Duration, NaiveDate};

pub const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Leading integer of a string segment (`"15abc"` → 15).
fn leading_int(s: &str) -> Option<i32> {
    let s = s.trim();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse::<i32>().ok().map(|n| n * sign)
}

/// Parse a pack date string.
///
/// Two-digit years are taken as 20YY.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.contains('/') {
        let mut parts = input.split('/');
        let month = leading_int(parts.next()?)?;
        let day = leading_int(parts.next()?)?;
        let mut year = leading_int(parts.next()?)?;
        if year < 100 {
            year += 2000;
        }
        return NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?);
    }

    // ISO dates, optionally followed by a time part
    let head = input.get(..10).unwrap_or(input);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Render a date with one of the supported tokens.
///
/// Returns `None` for unknown tokens. `raw` is handled by [`format_date`].
pub fn format_token(date: NaiveDate, token: &str) -> Option<String> {
    let mm = format!("{:02}", date.month());
    let dd = format!("{:02}", date.day());
    let yyyy = format!("{:04}", date.year());
    let yy = yyyy[yyyy.len() - 2..].to_string();
    let mmm = MONTHS[date.month0() as usize];
    let julian = format!("{:03}", date.ordinal());

    let formatted = match token {
        "MMMDD" => format!("{mmm}{dd}"),
        "DDMMM" => format!("{dd}{mmm}"),
        "MMMDDYY" => format!("{mmm}{dd}{yy}"),
        "DDMMMYY" => format!("{dd}{mmm}{yy}"),
        "MMDDYY" => format!("{mm}{dd}{yy}"),
        "DDMMYY" => format!("{dd}{mm}{yy}"),
        "YYMMDD" => format!("{yy}{mm}{dd}"),
        "MM/DD/YY" => format!("{mm}/{dd}/{yy}"),
        "DD/MM/YY" => format!("{dd}/{mm}/{yy}"),
        "MM-DD-YY" => format!("{mm}-{dd}-{yy}"),
        "YYYY-MM-DD" => format!("{yyyy}-{mm}-{dd}"),
        "julian" => julian,
        "YYDDD" => format!("{yy}{julian}"),
        "YYYYDDD" => format!("{yyyy}{julian}"),
        "month" => mm,
        "day" => dd,
        "year" => yyyy,
        "year2" => yy,
        "MMM" => mmm.to_string(),
        _ => return None,
    };
    Some(formatted)
}

fn shift(date: NaiveDate, offset_days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(offset_days))
        .unwrap_or(date)
}

/// Format a pack date string with a token and a day offset.
///
/// - empty base → empty string
/// - unparsable base, unknown token, or `raw` → the base string unchanged
pub fn format_date(base: &str, token: &str, offset_days: i64) -> String {
    if base.is_empty() {
        return String::new();
    }
    let Some(date) = parse_date(base) else {
        return base.to_string();
    };
    if token == "raw" {
        return base.to_string();
    }
    format_token(shift(date, offset_days), token).unwrap_or_else(|| base.to_string())
}

/// Date token used in the voice-pick checksum.
///
/// Formatted from `today` (not the pack date). Unknown tokens fall back to
/// `YYMMDD`.
pub fn voice_pick_date(today: NaiveDate, token: &str, offset_days: i64) -> String {
    let date = shift(today, offset_days);
    format_token(date, token)
        .or_else(|| format_token(date, "YYMMDD"))
        .unwrap_or_default()
}

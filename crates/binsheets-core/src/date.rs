//! Excel serial date conversion
//!
//! Dates are stored as a count of days since an epoch, with the time of day
//! as the fractional part. The 1900 system keeps Lotus 1-2-3's phantom
//! 1900-02-29 (serial 60); the 1904 system counts from 1904-01-01.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Days between the 1900 and 1904 epochs
pub const DAYS_1900_TO_1904: f64 = 1462.0;

fn epoch_1900() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 31).unwrap_or(NaiveDate::MIN)
}

fn epoch_1904() -> NaiveDate {
    NaiveDate::from_ymd_opt(1904, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Whether a number can be interpreted as an Excel date
pub fn is_valid_excel_date(value: f64) -> bool {
    value.is_finite() && value > -f64::EPSILON
}

/// Convert an Excel serial number to a date-time.
///
/// Serial 0 in the 1900 system is reported as 1899-12-31. Serials 60 and 61
/// both map to 1900-03-01, since 1900-02-29 does not exist.
/// Returns `None` for negative or non-finite serials.
pub fn excel_to_datetime(serial: f64, date_1904: bool) -> Option<NaiveDateTime> {
    if !is_valid_excel_date(serial) {
        return None;
    }
    let serial = serial.max(0.0);
    let mut whole_days = serial.floor() as i64;
    let mut millis = ((serial - serial.floor()) * MILLIS_PER_DAY).round() as i64;
    if millis >= MILLIS_PER_DAY as i64 {
        whole_days += 1;
        millis = 0;
    }

    let date = if date_1904 {
        epoch_1904().checked_add_signed(Duration::days(whole_days))?
    } else {
        // Serials after the phantom leap day are one day ahead of the calendar.
        // Serial 60 lands on 1900-03-01 as well.
        let days = if whole_days >= 61 { whole_days - 1 } else { whole_days };
        epoch_1900().checked_add_signed(Duration::days(days))?
    };

    let time = NaiveTime::MIN + Duration::milliseconds(millis);
    Some(date.and_time(time))
}

/// Convert a date-time to an Excel serial number.
///
/// Returns `None` for dates before the epoch of the chosen date system.
pub fn datetime_to_excel(dt: NaiveDateTime, date_1904: bool) -> Option<f64> {
    let days = date_serial(dt.date(), date_1904)?;
    let since_midnight = dt.time() - NaiveTime::MIN;
    let fraction = since_midnight.num_milliseconds() as f64 / MILLIS_PER_DAY;
    Some(days + fraction)
}

/// Convert a calendar date to an Excel serial number
pub fn date_to_excel(date: NaiveDate, date_1904: bool) -> Option<f64> {
    date_serial(date, date_1904)
}

fn date_serial(date: NaiveDate, date_1904: bool) -> Option<f64> {
    if date_1904 {
        let days = (date - epoch_1904()).num_days();
        return (days >= 0).then_some(days as f64);
    }
    let days = (date - epoch_1900()).num_days();
    if days < 1 {
        return None;
    }
    // Account for the phantom 1900-02-29
    Some(if days >= 60 { days + 1 } else { days } as f64)
}

/// Whether a built-in format id is a date or time format
pub fn is_builtin_date_format(id: u16) -> bool {
    matches!(id, 14..=22 | 45..=47)
}

/// Whether a number format code renders numbers as dates or times.
///
/// Quoted literals, escaped characters, padding (`_x`), fill (`*x`),
/// colors and conditions are ignored. Elapsed-time brackets (`[h]`, `[mm]`,
/// `[ss]`) count as time formats.
pub fn is_date_format_code(code: &str) -> bool {
    if code.is_empty() || code.eq_ignore_ascii_case("general") {
        return false;
    }
    // Only the first section decides
    let section = first_section(code);

    let mut stripped = String::with_capacity(section.len());
    let mut chars = section.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for inner in chars.by_ref() {
                    if inner == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let mut bracket = String::new();
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    bracket.push(inner);
                }
                let lower = bracket.to_ascii_lowercase();
                if !lower.is_empty() && lower.chars().all(|ch| matches!(ch, 'h' | 'm' | 's')) {
                    return true;
                }
            }
            _ => stripped.push(c),
        }
    }

    let lower = stripped
        .to_ascii_lowercase()
        .replace("am/pm", "")
        .replace("a/p", "");
    let has_date_letter = lower.chars().any(|c| matches!(c, 'y' | 'm' | 'd' | 'h' | 's'));
    has_date_letter
        && lower
            .chars()
            .all(|c| matches!(c, 'y' | 'm' | 'd' | 'h' | 's' | 'e' | '-' | '/' | ',' | '.' | ':' | ' ' | '0'))
}

fn first_section(code: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in code.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return &code[..i],
            _ => {}
        }
    }
    code
}

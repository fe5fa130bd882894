//! Date and time sections

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use crate::date;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Hour,
    Minute,
    Second,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Year(usize),
    /// `m` run not yet resolved to month or minute
    MonthOrMinute(usize),
    Month(usize),
    Minute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    /// `AM/PM` (`true`) or `A/P` with the case of the `a`
    AmPm { full: bool, lower: bool },
    SubSecond(usize),
    Elapsed(Unit, usize),
    Literal(String),
}

fn run_length(first: char, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> usize {
    let mut n = 1;
    while chars.peek().is_some_and(|c| c.eq_ignore_ascii_case(&first)) {
        chars.next();
        n += 1;
    }
    n
}

fn tokenize(section: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = section.chars().peekable();
    while let Some(c) = chars.next() {
        let lower = c.to_ascii_lowercase();
        match lower {
            '"' => {
                let mut lit = String::new();
                for inner in chars.by_ref() {
                    if inner == '"' {
                        break;
                    }
                    lit.push(inner);
                }
                tokens.push(Token::Literal(lit));
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    tokens.push(Token::Literal(next.to_string()));
                }
            }
            '_' => {
                chars.next();
                tokens.push(Token::Literal(" ".to_string()));
            }
            '*' => {
                chars.next();
            }
            '[' => {
                let mut content = String::new();
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    content.push(inner);
                }
                let lc = content.to_ascii_lowercase();
                let unit = match lc.chars().next() {
                    Some('h') => Some(Unit::Hour),
                    Some('m') => Some(Unit::Minute),
                    Some('s') => Some(Unit::Second),
                    _ => None,
                };
                match unit {
                    Some(u) if lc.chars().all(|ch| ch == lc.as_bytes()[0] as char) => {
                        tokens.push(Token::Elapsed(u, lc.len()));
                    }
                    _ => {
                        let mut lit = String::new();
                        super::render_literals(&format!("[{content}]"), &mut lit, None);
                        if !lit.is_empty() {
                            tokens.push(Token::Literal(lit));
                        }
                    }
                }
            }
            'y' | 'e' => {
                let n = run_length(c, &mut chars);
                tokens.push(Token::Year(if lower == 'e' { 4 } else { n }));
            }
            'm' => tokens.push(Token::MonthOrMinute(run_length(c, &mut chars))),
            'd' => tokens.push(Token::Day(run_length(c, &mut chars))),
            'h' => tokens.push(Token::Hour(run_length(c, &mut chars))),
            's' => tokens.push(Token::Second(run_length(c, &mut chars))),
            'a' => {
                let rest: String = chars.clone().take(4).collect();
                let next_two: String = chars.clone().take(2).collect();
                if rest.eq_ignore_ascii_case("m/pm") {
                    for _ in 0..4 {
                        chars.next();
                    }
                    tokens.push(Token::AmPm { full: true, lower: false });
                } else if next_two.eq_ignore_ascii_case("/p") {
                    chars.next();
                    chars.next();
                    tokens.push(Token::AmPm {
                        full: false,
                        lower: c == 'a',
                    });
                } else {
                    tokens.push(Token::Literal(c.to_string()));
                }
            }
            '.' if chars.peek() == Some(&'0') && follows_seconds(&tokens) => {
                let mut n = 0;
                while chars.peek() == Some(&'0') {
                    chars.next();
                    n += 1;
                }
                tokens.push(Token::SubSecond(n));
            }
            _ => tokens.push(Token::Literal(c.to_string())),
        }
    }
    resolve_minutes(tokens)
}

fn follows_seconds(tokens: &[Token]) -> bool {
    matches!(
        tokens.last(),
        Some(Token::Second(_)) | Some(Token::Elapsed(Unit::Second, _))
    )
}

fn is_hour(t: &Token) -> bool {
    matches!(t, Token::Hour(_) | Token::Elapsed(Unit::Hour, _))
}

fn is_second(t: &Token) -> bool {
    matches!(t, Token::Second(_) | Token::Elapsed(Unit::Second, _))
}

/// `m`/`mm` directly after an hour or before a second is a minute
fn resolve_minutes(tokens: Vec<Token>) -> Vec<Token> {
    let significant = |t: &&Token| !matches!(t, Token::Literal(_));
    let resolved: Vec<Token> = tokens
        .iter()
        .enumerate()
        .map(|(i, t)| match t {
            Token::MonthOrMinute(n) if *n <= 2 => {
                let prev = tokens[..i].iter().rev().find(significant);
                let next = tokens[i + 1..].iter().find(significant);
                if prev.is_some_and(is_hour) || next.is_some_and(is_second) {
                    Token::Minute(*n)
                } else {
                    Token::Month(*n)
                }
            }
            Token::MonthOrMinute(n) => Token::Month(*n),
            other => other.clone(),
        })
        .collect();
    resolved
}

/// Format a serial date with a date/time section.
///
/// Returns `None` if the serial cannot be converted to a date.
pub(crate) fn format_date(serial: f64, section: &str, date_1904: bool) -> Option<String> {
    let tokens = tokenize(section);
    let sub_digits = tokens
        .iter()
        .find_map(|t| match t {
            Token::SubSecond(n) => Some((*n).min(3)),
            _ => None,
        })
        .unwrap_or(0);

    let dt = round_datetime(date::excel_to_datetime(serial, date_1904)?, sub_digits);
    let twelve_hour = tokens.iter().any(|t| matches!(t, Token::AmPm { .. }));

    // Elapsed units count from the serial itself
    let total_millis = (serial * 86_400_000.0).round() as i64;
    let total_seconds = round_elapsed(total_millis, sub_digits) / 1000;
    let has_elapsed_hours = tokens.iter().any(|t| matches!(t, Token::Elapsed(Unit::Hour, _)));
    let has_elapsed_minutes = tokens.iter().any(|t| matches!(t, Token::Elapsed(Unit::Minute, _)));

    let mut out = String::new();
    for token in &tokens {
        match token {
            Token::Year(n) => {
                if *n <= 2 {
                    out.push_str(&format!("{:02}", dt.year().rem_euclid(100)));
                } else {
                    out.push_str(&format!("{:04}", dt.year()));
                }
            }
            Token::Month(n) => {
                let name = MONTHS[dt.month0() as usize];
                match n {
                    1 => out.push_str(&dt.month().to_string()),
                    2 => out.push_str(&format!("{:02}", dt.month())),
                    3 => out.push_str(&name[..3]),
                    4 => out.push_str(name),
                    _ => out.push_str(&name[..1]),
                }
            }
            Token::Day(n) => {
                let name = WEEKDAYS[dt.weekday().num_days_from_monday() as usize];
                match n {
                    1 => out.push_str(&dt.day().to_string()),
                    2 => out.push_str(&format!("{:02}", dt.day())),
                    3 => out.push_str(&name[..3]),
                    _ => out.push_str(name),
                }
            }
            Token::Hour(n) => {
                let mut hour = dt.hour();
                if twelve_hour {
                    hour %= 12;
                    if hour == 0 {
                        hour = 12;
                    }
                }
                push_number(&mut out, hour as i64, *n);
            }
            Token::Minute(n) => {
                let minute = if has_elapsed_hours {
                    (total_seconds / 60) % 60
                } else {
                    dt.minute() as i64
                };
                push_number(&mut out, minute, *n);
            }
            Token::Second(n) => {
                let second = if has_elapsed_hours || has_elapsed_minutes {
                    total_seconds % 60
                } else {
                    dt.second() as i64
                };
                push_number(&mut out, second, *n);
            }
            Token::SubSecond(n) => {
                let millis = dt.nanosecond() / 1_000_000;
                let text = format!("{:03}", millis);
                out.push('.');
                out.push_str(&text[..(*n).min(3)]);
                for _ in 3..*n {
                    out.push('0');
                }
            }
            Token::AmPm { full, lower } => {
                let pm = dt.hour() >= 12;
                let text = match (full, pm) {
                    (true, false) => "AM",
                    (true, true) => "PM",
                    (false, false) => "A",
                    (false, true) => "P",
                };
                if *lower {
                    out.push_str(&text.to_ascii_lowercase());
                } else {
                    out.push_str(text);
                }
            }
            Token::Elapsed(unit, n) => {
                let value = match unit {
                    Unit::Hour => total_seconds / 3600,
                    Unit::Minute if has_elapsed_hours => (total_seconds / 60) % 60,
                    Unit::Minute => total_seconds / 60,
                    Unit::Second if has_elapsed_hours || has_elapsed_minutes => total_seconds % 60,
                    Unit::Second => total_seconds,
                };
                push_number(&mut out, value, *n);
            }
            Token::Literal(s) => out.push_str(s),
            Token::MonthOrMinute(_) => {}
        }
    }
    Some(out)
}

fn push_number(out: &mut String, value: i64, width: usize) {
    if width >= 2 {
        out.push_str(&format!("{:02}", value));
    } else {
        out.push_str(&value.to_string());
    }
}

/// Round to the displayed sub-second precision
fn round_datetime(dt: NaiveDateTime, sub_digits: usize) -> NaiveDateTime {
    let unit = 10i64.pow(3 - sub_digits as u32);
    let millis = (dt.nanosecond() / 1_000_000) as i64;
    let rounded = ((millis + unit / 2) / unit) * unit;
    let truncated = dt - Duration::nanoseconds(dt.nanosecond() as i64);
    truncated + Duration::milliseconds(rounded)
}

fn round_elapsed(total_millis: i64, sub_digits: usize) -> i64 {
    let unit = 10i64.pow(3 - sub_digits as u32);
    ((total_millis + unit / 2) / unit) * unit
}

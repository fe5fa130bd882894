//! Cell value formatting
//!
//! [`DataFormatter`] renders cell values the way Excel displays them, given
//! the number format attached to the cell. Format codes have up to four
//! `;`-separated sections (`positive;negative;zero;text`), optional
//! conditions such as `[>100]`, and date, number, or text placeholders.

mod builtin;
mod datetime;
mod number;

pub use builtin::{BuiltinFormats, FIRST_USER_DEFINED_FORMAT_INDEX};

use std::borrow::Cow;

use crate::cell::CellValue;
use crate::date;
use crate::style::NumberFormat;
use crate::workbook::Workbook;

/// Formats cell values as display text
#[derive(Debug, Clone, Default)]
pub struct DataFormatter {
    /// Render formulas without a cached result as their text instead of
    /// an empty string
    pub show_uncached_formulas: bool,
}

impl DataFormatter {
    /// Create a formatter with default settings
    pub fn new() -> Self {
        Self {
            show_uncached_formulas: true,
        }
    }

    /// Format the cell at `(row, col)` of a workbook sheet
    ///
    /// Missing sheets and empty cells render as an empty string.
    pub fn format_cell(&self, workbook: &Workbook, sheet: usize, row: u32, col: u16) -> String {
        let Some(ws) = workbook.worksheet(sheet) else {
            return String::new();
        };
        let value = ws.get_value_at(row, col);
        let general = NumberFormat::General;
        let format = ws
            .cell_style_at(row, col)
            .map(|s| &s.number_format)
            .unwrap_or(&general);
        self.format_cell_value(&value, format, workbook.settings().date_1904)
    }

    /// Format a value with the given number format
    pub fn format_cell_value(&self, value: &CellValue, format: &NumberFormat, date_1904: bool) -> String {
        match value {
            CellValue::Empty => String::new(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.as_str().to_string(),
            CellValue::Number(n) => self.format_raw_number(*n, format.code(), date_1904),
            CellValue::String(s) => self.format_text(s.as_str(), format.code()),
            CellValue::Formula { text, cached_value } => match cached_value {
                Some(cached) => self.format_cell_value(cached, format, date_1904),
                None if self.show_uncached_formulas => text.clone(),
                None => String::new(),
            },
        }
    }

    /// Format a number with an explicit format code
    pub fn format_raw_number(&self, value: f64, code: &str, date_1904: bool) -> String {
        let sections = split_sections(code);
        let Some((section, auto_sign)) = pick_number_section(&sections, value) else {
            return number::format_general(value);
        };
        let body = strip_condition(section);
        let body = body.as_ref();

        if is_general(body) {
            let text = number::format_general(value.abs());
            let text = if value < 0.0 && auto_sign { format!("-{text}") } else { text };
            return number::render_general_section(body, &text);
        }

        if date::is_date_format_code(body) {
            let rendered = if date::is_valid_excel_date(value) {
                datetime::format_date(value, body, date_1904)
            } else {
                None
            };
            return rendered.unwrap_or_else(|| number::format_general(value));
        }

        number::format_number(value, body, auto_sign)
    }

    /// Format a string value through the text section of a format code
    pub fn format_text(&self, text: &str, code: &str) -> String {
        let sections = split_sections(code);
        let section = match sections.len() {
            4.. => Some(sections[3]),
            1 if contains_text_placeholder(sections[0]) => Some(sections[0]),
            _ => None,
        };
        match section {
            Some(section) => render_text_section(section, text),
            None => text.to_string(),
        }
    }
}

/// Split a format code on unquoted, unescaped `;`
pub(crate) fn split_sections(code: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_bracket = false;
    let mut escaped = false;
    for (i, c) in code.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => in_bracket = true,
            ']' if !in_quotes => in_bracket = false,
            ';' if !in_quotes && !in_bracket => {
                sections.push(&code[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(&code[start..]);
    sections
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Condition {
    op: Comparison,
    value: f64,
}

impl Condition {
    fn matches(&self, v: f64) -> bool {
        match self.op {
            Comparison::Lt => v < self.value,
            Comparison::Le => v <= self.value,
            Comparison::Gt => v > self.value,
            Comparison::Ge => v >= self.value,
            Comparison::Eq => v == self.value,
            Comparison::Ne => v != self.value,
        }
    }
}

/// Find a `[<op><number>]` condition in a section
fn parse_condition(section: &str) -> Option<Condition> {
    let mut rest = section;
    while let Some(open) = rest.find('[') {
        let close = rest[open..].find(']')? + open;
        let content = rest[open + 1..close].trim();
        let (op, tail) = if let Some(t) = content.strip_prefix("<=") {
            (Comparison::Le, t)
        } else if let Some(t) = content.strip_prefix(">=") {
            (Comparison::Ge, t)
        } else if let Some(t) = content.strip_prefix("<>") {
            (Comparison::Ne, t)
        } else if let Some(t) = content.strip_prefix('<') {
            (Comparison::Lt, t)
        } else if let Some(t) = content.strip_prefix('>') {
            (Comparison::Gt, t)
        } else if let Some(t) = content.strip_prefix('=') {
            (Comparison::Eq, t)
        } else {
            rest = &rest[close + 1..];
            continue;
        };
        if let Ok(value) = tail.trim().parse::<f64>() {
            return Some(Condition { op, value });
        }
        rest = &rest[close + 1..];
    }
    None
}

/// Remove condition brackets, keeping colors and other brackets in place
fn strip_condition(section: &str) -> Cow<'_, str> {
    if parse_condition(section).is_none() {
        return Cow::Borrowed(section);
    }
    let mut out = String::with_capacity(section.len());
    let mut rest = section;
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']').map(|c| c + open) else {
            break;
        };
        out.push_str(&rest[..open]);
        let content = rest[open + 1..close].trim_start();
        if !content.starts_with(['<', '>', '=']) {
            out.push_str(&rest[open..=close]);
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Choose the section used for a number and whether it needs an explicit `-`
fn pick_number_section<'a>(sections: &[&'a str], value: f64) -> Option<(&'a str, bool)> {
    let first = *sections.first()?;
    let conditions: Vec<Option<Condition>> =
        sections.iter().take(3).map(|s| parse_condition(s)).collect();

    if conditions.iter().any(Option::is_some) {
        for (i, cond) in conditions.iter().enumerate() {
            match cond {
                Some(c) if c.matches(value) => {
                    // A "less than" condition owns the sign
                    let owns_sign = matches!(c.op, Comparison::Lt | Comparison::Le) && c.value <= 0.0;
                    return Some((sections[i], !owns_sign));
                }
                Some(_) => continue,
                None => return Some((sections[i], true)),
            }
        }
        return None;
    }

    let numeric = sections.len().min(3);
    if value < 0.0 && numeric >= 2 {
        Some((sections[1], false))
    } else if value == 0.0 && numeric >= 3 {
        Some((sections[2], false))
    } else {
        Some((first, true))
    }
}

fn is_general(section: &str) -> bool {
    let mut stripped = String::new();
    let mut in_bracket = false;
    let mut in_quotes = false;
    for c in section.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => in_bracket = true,
            ']' if !in_quotes => in_bracket = false,
            _ if in_bracket || in_quotes => {}
            _ => stripped.push(c),
        }
    }
    stripped.to_ascii_lowercase().contains("general")
}

fn contains_text_placeholder(section: &str) -> bool {
    let mut in_quotes = false;
    let mut escaped = false;
    for c in section.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            '@' if !in_quotes => return true,
            _ => {}
        }
    }
    false
}

/// Render a section's literals with `@` replaced by the text
fn render_text_section(section: &str, text: &str) -> String {
    let mut out = String::new();
    render_literals(section, &mut out, Some(text));
    out
}

/// Render literal parts of a format segment into `out`
///
/// Quoted strings and escaped characters are copied, `_x` becomes a space,
/// `*x` is dropped, currency brackets (`[$€-407]`) emit their symbol and
/// other brackets are ignored. Placeholders are expected to be removed by
/// the caller; a remaining `@` is replaced with `text` when given.
pub(crate) fn render_literals(segment: &str, out: &mut String, text: Option<&str>) {
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for inner in chars.by_ref() {
                    if inner == '"' {
                        break;
                    }
                    out.push(inner);
                }
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '_' => {
                chars.next();
                out.push(' ');
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
                if let Some(symbol) = content.strip_prefix('$') {
                    let symbol = symbol.split('-').next().unwrap_or("");
                    out.push_str(symbol);
                }
            }
            '@' => {
                if let Some(text) = text {
                    out.push_str(text);
                }
            }
            _ => out.push(c),
        }
    }
}

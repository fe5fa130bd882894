//! Criteria matching for SUMIF, COUNTIF, AVERAGEIF and related functions
//!
//! Excel criteria can be:
//! - A number: exact match (e.g., 5)
//! - A text string: case-insensitive match (e.g., "apple")
//! - A comparison expression: ">5", ">=10", "<100", "<=50", "<>0", "=5", ">b"
//! - Wildcards: "*" matches any characters, "?" matches single character,
//!   "~" escapes the next character
//! - "=" matches blank cells, "<>" matches non-blank cells

use crate::evaluator::FormulaValue;
use std::cmp::Ordering;

/// Criteria matcher for SUMIF/COUNTIF/AVERAGEIF and related functions
#[derive(Debug)]
pub struct CriteriaMatcher {
    op: ComparisonOp,
    operand: Operand,
}

#[derive(Debug)]
enum Operand {
    Number(f64),
    Boolean(bool),
    /// Lowercased text
    Text(String),
    Blank,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl ComparisonOp {
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ord == Ordering::Equal,
            ComparisonOp::NotEqual => ord != Ordering::Equal,
            ComparisonOp::LessThan => ord == Ordering::Less,
            ComparisonOp::LessEqual => ord != Ordering::Greater,
            ComparisonOp::GreaterThan => ord == Ordering::Greater,
            ComparisonOp::GreaterEqual => ord != Ordering::Less,
        }
    }
}

impl CriteriaMatcher {
    /// Create a new criteria matcher from a FormulaValue
    pub fn new(criteria: &FormulaValue) -> Self {
        let (op, operand) = match criteria {
            FormulaValue::Number(n) => (ComparisonOp::Equal, Operand::Number(*n)),
            FormulaValue::Boolean(b) => (ComparisonOp::Equal, Operand::Boolean(*b)),
            FormulaValue::String(s) => Self::parse_string_criteria(s),
            // a blank criteria cell matches zero, not blanks
            FormulaValue::Empty => (ComparisonOp::Equal, Operand::Number(0.0)),
            FormulaValue::Error(_) => (ComparisonOp::Equal, Operand::Never),
            FormulaValue::Array(_) => match criteria.scalar() {
                FormulaValue::Array(_) => (ComparisonOp::Equal, Operand::Never),
                single => return Self::new(&single),
            },
        };

        Self { op, operand }
    }

    fn parse_string_criteria(s: &str) -> (ComparisonOp, Operand) {
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            (ComparisonOp::Equal, s)
        };

        let operand = if rest.is_empty() {
            Operand::Blank
        } else if let Ok(n) = rest.trim().parse::<f64>() {
            Operand::Number(n)
        } else if rest.eq_ignore_ascii_case("TRUE") {
            Operand::Boolean(true)
        } else if rest.eq_ignore_ascii_case("FALSE") {
            Operand::Boolean(false)
        } else {
            Operand::Text(rest.to_lowercase())
        };
        (op, operand)
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &FormulaValue) -> bool {
        let is_blank = matches!(value, FormulaValue::Empty);
        match &self.operand {
            Operand::Never => false,
            Operand::Blank => match self.op {
                ComparisonOp::Equal => {
                    is_blank || matches!(value, FormulaValue::String(s) if s.is_empty())
                }
                ComparisonOp::NotEqual => !is_blank,
                _ => false,
            },
            // text reading as the number matches for equality only
            Operand::Number(criteria) => match value {
                FormulaValue::Number(n) => self.op.accepts(
                    if (n - criteria).abs() < 1e-10 {
                        Ordering::Equal
                    } else {
                        n.partial_cmp(criteria).unwrap_or(Ordering::Equal)
                    },
                ),
                FormulaValue::String(s) if self.op == ComparisonOp::Equal => {
                    s.trim().parse::<f64>().map_or(false, |n| n == *criteria)
                }
                _ => self.op == ComparisonOp::NotEqual,
            },
            Operand::Boolean(criteria) => match value {
                FormulaValue::Boolean(b) => self.op.accepts(b.cmp(criteria)),
                _ => self.op == ComparisonOp::NotEqual,
            },
            Operand::Text(pattern) => {
                let text = match value {
                    FormulaValue::String(s) => s.to_lowercase(),
                    FormulaValue::Empty => String::new(),
                    _ => return self.op == ComparisonOp::NotEqual,
                };
                match self.op {
                    ComparisonOp::Equal => wildcard_match(pattern, &text),
                    ComparisonOp::NotEqual => !wildcard_match(pattern, &text),
                    op => !is_blank && op.accepts(text.as_str().cmp(pattern.as_str())),
                }
            }
        }
    }
}

/// Match with wildcards: * = any characters, ? = single character, ~ escapes
pub(crate) fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = compile_pattern(pattern);
    if pattern.iter().all(|p| matches!(p, Pat::Char(_))) {
        return pattern.len() == text.chars().count()
            && pattern
                .iter()
                .zip(text.chars())
                .all(|(p, c)| *p == Pat::Char(c));
    }
    let text: Vec<char> = text.chars().collect();
    wildcard_match_impl(&pattern, &text)
}

/// Whether `text` starts with something matching the wildcard `pattern`
pub(crate) fn wildcard_prefix_match(pattern: &str, text: &str) -> bool {
    let mut pattern = compile_pattern(pattern);
    pattern.push(Pat::Any);
    let text: Vec<char> = text.chars().collect();
    wildcard_match_impl(&pattern, &text)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pat {
    Char(char),
    One,
    Any,
}

fn compile_pattern(pattern: &str) -> Vec<Pat> {
    let mut out = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        out.push(match c {
            '~' => match chars.next() {
                Some(escaped) => Pat::Char(escaped),
                None => Pat::Char('~'),
            },
            '*' => Pat::Any,
            '?' => Pat::One,
            c => Pat::Char(c),
        });
    }
    out
}

fn wildcard_match_impl(pattern: &[Pat], text: &[char]) -> bool {
    let mut pi = 0;
    let mut ti = 0;
    // last star in the pattern and the text position it was tried at
    let mut star: Option<(usize, usize)> = None;

    while ti < text.len() {
        match pattern.get(pi) {
            Some(Pat::One) => {
                pi += 1;
                ti += 1;
            }
            Some(Pat::Char(c)) if *c == text[ti] => {
                pi += 1;
                ti += 1;
            }
            Some(Pat::Any) => {
                star = Some((pi, ti));
                pi += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    pi = sp + 1;
                    ti = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[pi..].iter().all(|p| *p == Pat::Any)
}

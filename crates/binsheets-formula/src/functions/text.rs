//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::criteria::wildcard_prefix_match;
use super::{arg, number_or};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use binsheets_core::{CellError, DataFormatter};
use encoding_rs::WINDOWS_1252;

type Ret = FormulaResult<FormulaValue>;

/// Longest string a cell can hold
const MAX_TEXT_LEN: usize = 32_767;

fn text_result(s: String) -> Ret {
    if s.chars().count() > MAX_TEXT_LEN {
        Ok(FormulaValue::Error(CellError::Value))
    } else {
        Ok(FormulaValue::String(s))
    }
}

/// A count argument: blank is `default`, negative is `#VALUE!`
fn count_arg(args: &[FormulaValue], i: usize, default: f64) -> Result<usize, CellError> {
    let n = number_or(args, i, default)?.trunc();
    if n < 0.0 {
        Err(CellError::Value)
    } else {
        Ok(n as usize)
    }
}

/// A 1-based position argument
fn position_arg(args: &[FormulaValue], i: usize) -> Result<usize, CellError> {
    let n = number_or(args, i, 1.0)?.trunc();
    if n < 1.0 {
        Err(CellError::Value)
    } else {
        Ok(n as usize)
    }
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    Ok(FormulaValue::Number(s.chars().count() as f64))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let n = try_value!(count_arg(args, 1, 1.0));
    Ok(FormulaValue::String(s.chars().take(n).collect()))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let n = try_value!(count_arg(args, 1, 1.0));
    let len = s.chars().count();
    Ok(FormulaValue::String(s.chars().skip(len.saturating_sub(n)).collect()))
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let start = try_value!(position_arg(args, 1));
    let n = try_value!(count_arg(args, 2, 0.0));
    Ok(FormulaValue::String(s.chars().skip(start - 1).take(n).collect()))
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::String(try_value!(args[0].to_text()).to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::String(try_value!(args[0].to_text()).to_lowercase()))
}

/// PROPER(text) - capitalize each letter that follows a non-letter
pub fn fn_proper(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let mut out = String::with_capacity(s.len());
    let mut after_letter = false;
    for c in s.chars() {
        if after_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    Ok(FormulaValue::String(out))
}

/// TRIM(text) - strip outer spaces and collapse inner runs to one space
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
    Ok(FormulaValue::String(words.join(" ")))
}

/// CONCATENATE(text1, [text2], ...)
pub fn fn_concatenate(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let mut out = String::new();
    for value in args {
        out.push_str(&try_value!(value.to_text()));
    }
    text_result(out)
}

/// TEXT(value, format_text)
pub fn fn_text(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    let format = try_value!(args[1].to_text());
    let formatter = DataFormatter::new();
    let rendered = match args[0].scalar() {
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(e)),
        FormulaValue::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => formatter.format_raw_number(n, &format, ctx.date_1904()),
            Err(_) => formatter.format_text(&s, &format),
        },
        value => {
            let n = try_value!(value.to_number());
            formatter.format_raw_number(n, &format, ctx.date_1904())
        }
    };
    Ok(FormulaValue::String(rendered))
}

/// VALUE(text) - numbers, percentages and thousands separators
pub fn fn_value(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = match args[0].scalar() {
        FormulaValue::Number(n) => return Ok(FormulaValue::Number(n)),
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(e)),
        FormulaValue::Empty => return Ok(FormulaValue::Number(0.0)),
        FormulaValue::String(s) => s,
        _ => return Ok(FormulaValue::Error(CellError::Value)),
    };
    let trimmed = s.trim();
    let (body, scale) = match trimmed.strip_suffix('%') {
        Some(body) => (body, 0.01),
        None => (trimmed, 1.0),
    };
    let cleaned: String = body.chars().filter(|c| *c != ',').collect();
    match cleaned.trim().parse::<f64>() {
        Ok(n) => Ok(FormulaValue::Number(n * scale)),
        Err(_) => Ok(FormulaValue::Error(CellError::Value)),
    }
}

/// Shared body of FIND and SEARCH: 1-based character position of a match
fn locate(args: &[FormulaValue], matches_at: fn(&str, &str) -> bool) -> Ret {
    let needle = try_value!(args[0].to_text());
    let haystack = try_value!(args[1].to_text());
    let start = try_value!(position_arg(args, 2));
    let len = haystack.chars().count();
    if start > len + 1 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    let offsets: Vec<usize> = haystack
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(haystack.len()))
        .collect();
    for (pos, &offset) in offsets.iter().enumerate().skip(start - 1) {
        if matches_at(&needle, &haystack[offset..]) {
            return Ok(FormulaValue::Number(pos as f64 + 1.0));
        }
    }
    Ok(FormulaValue::Error(CellError::Value))
}

/// FIND(find_text, within_text, [start_num]) - case-sensitive
pub fn fn_find(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    locate(args, |needle, rest| rest.starts_with(needle))
}

/// SEARCH(find_text, within_text, [start_num]) - case-insensitive, wildcards
pub fn fn_search(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    locate(args, |needle, rest| {
        wildcard_prefix_match(&needle.to_lowercase(), &rest.to_lowercase())
    })
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let old = try_value!(args[1].to_text());
    let new = try_value!(args[2].to_text());
    if old.is_empty() {
        return Ok(FormulaValue::String(s));
    }
    match arg(args, 3) {
        FormulaValue::Empty => text_result(s.replace(&old, &new)),
        instance => {
            let n = try_value!(instance.to_number()).trunc();
            if n < 1.0 {
                return Ok(FormulaValue::Error(CellError::Value));
            }
            match s.match_indices(&old).nth(n as usize - 1) {
                Some((at, _)) => {
                    text_result(format!("{}{}{}", &s[..at], new, &s[at + old.len()..]))
                }
                None => Ok(FormulaValue::String(s)),
            }
        }
    }
}

/// REPLACE(old_text, start_num, num_chars, new_text)
pub fn fn_replace(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let start = try_value!(position_arg(args, 1));
    let n = try_value!(count_arg(args, 2, 0.0));
    let new = try_value!(args[3].to_text());
    let chars: Vec<char> = s.chars().collect();
    let from = (start - 1).min(chars.len());
    let to = (from + n).min(chars.len());
    let mut out: String = chars[..from].iter().collect();
    out.push_str(&new);
    out.extend(&chars[to..]);
    text_result(out)
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let n = try_value!(count_arg(args, 1, 0.0));
    if s.chars().count().saturating_mul(n) > MAX_TEXT_LEN {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    Ok(FormulaValue::String(s.repeat(n)))
}

/// EXACT(text1, text2) - case-sensitive comparison
pub fn fn_exact(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let a = try_value!(args[0].to_text());
    let b = try_value!(args[1].to_text());
    Ok(FormulaValue::Boolean(a == b))
}

/// CHAR(number) - character for a Windows-1252 code
pub fn fn_char(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let n = try_value!(args[0].to_number()).trunc();
    if !(1.0..=255.0).contains(&n) {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    let byte = [n as u8];
    let (decoded, _) = WINDOWS_1252.decode_without_bom_handling(&byte);
    Ok(FormulaValue::String(decoded.into_owned()))
}

/// CODE(text) - Windows-1252 code of the first character
pub fn fn_code(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    let Some(first) = s.chars().next() else {
        return Ok(FormulaValue::Error(CellError::Value));
    };
    let mut buf = [0u8; 4];
    let (encoded, _, unmappable) = WINDOWS_1252.encode(first.encode_utf8(&mut buf));
    let code = if unmappable { b'?' } else { encoded[0] };
    Ok(FormulaValue::Number(code as f64))
}

/// CLEAN(text) - remove non-printable characters (codes 0 to 31)
pub fn fn_clean(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let s = try_value!(args[0].to_text());
    Ok(FormulaValue::String(
        s.chars().filter(|c| (*c as u32) >= 32).collect(),
    ))
}

/// T(value) - text passes through, anything else is empty text
pub fn fn_t(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(match args[0].scalar() {
        FormulaValue::String(s) => FormulaValue::String(s),
        FormulaValue::Error(e) => FormulaValue::Error(e),
        _ => FormulaValue::String(String::new()),
    })
}

/// N(value) - numbers pass through, TRUE is 1, anything else is 0
pub fn fn_n(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(match args[0].scalar() {
        FormulaValue::Number(n) => FormulaValue::Number(n),
        FormulaValue::Boolean(b) => FormulaValue::Number(if b { 1.0 } else { 0.0 }),
        FormulaValue::Error(e) => FormulaValue::Error(e),
        _ => FormulaValue::Number(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, num, text};
    use crate::evaluator::FormulaValue;
    use binsheets_core::CellError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slicing() {
        assert_eq!(eval("=LEN(\"héllo\")"), num(5.0));
        assert_eq!(eval("=LEFT(\"héllo\",2)"), text("hé"));
        assert_eq!(eval("=LEFT(\"abc\")"), text("a"));
        assert_eq!(eval("=RIGHT(\"abc\",5)"), text("abc"));
        assert_eq!(eval("=MID(\"abcdef\",3,2)"), text("cd"));
        assert_eq!(eval("=MID(\"abc\",0,1)"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=LEFT(\"abc\",-1)"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(eval("=UPPER(\"abc\")"), text("ABC"));
        assert_eq!(eval("=PROPER(\"hello wORLD o'neil\")"), text("Hello World O'Neil"));
        assert_eq!(eval("=TRIM(\"  a   b  \")"), text("a b"));
        assert_eq!(eval("=CLEAN(CHAR(9)&\"x\")"), text("x"));
    }

    #[test]
    fn test_concatenate_and_numbers_as_text() {
        assert_eq!(eval("=CONCATENATE(\"a\",1,TRUE)"), text("a1TRUE"));
        assert_eq!(eval("=LEN(12.5)"), num(4.0));
    }

    #[test]
    fn test_text_uses_number_formats() {
        assert_eq!(eval("=TEXT(1234.567,\"#,##0.00\")"), text("1,234.57"));
        assert_eq!(eval("=TEXT(0.25,\"0%\")"), text("25%"));
        assert_eq!(eval("=TEXT(\"12\",\"0.0\")"), text("12.0"));
    }

    #[test]
    fn test_value() {
        assert_eq!(eval("=VALUE(\"1,234.5\")"), num(1234.5));
        assert_eq!(eval("=VALUE(\"50%\")"), num(0.5));
        assert_eq!(eval("=VALUE(\"abc\")"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_find_and_search() {
        assert_eq!(eval("=FIND(\"b\",\"abcb\")"), num(2.0));
        assert_eq!(eval("=FIND(\"b\",\"abcb\",3)"), num(4.0));
        assert_eq!(eval("=FIND(\"B\",\"abc\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=FIND(\"\",\"abc\")"), num(1.0));
        assert_eq!(eval("=SEARCH(\"B\",\"abc\")"), num(2.0));
        assert_eq!(eval("=SEARCH(\"c?e\",\"abcdef\")"), num(3.0));
    }

    #[test]
    fn test_substitute_and_replace() {
        assert_eq!(eval("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\")"), text("a+b+c"));
        assert_eq!(eval("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\",2)"), text("a-b+c"));
        assert_eq!(eval("=REPLACE(\"abcdef\",2,3,\"X\")"), text("aXef"));
        assert_eq!(eval("=REPT(\"ab\",3)"), text("ababab"));
        assert_eq!(eval("=REPT(\"ab\",20000)"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_codes() {
        assert_eq!(eval("=CHAR(65)"), text("A"));
        assert_eq!(eval("=CHAR(128)"), text("€"));
        assert_eq!(eval("=CODE(\"€uro\")"), num(128.0));
        assert_eq!(eval("=CODE(\"\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=EXACT(\"a\",\"A\")"), FormulaValue::Boolean(false));
        assert_eq!(eval("=T(1)"), text(""));
        assert_eq!(eval("=N(TRUE)"), num(1.0));
    }
}

//! Number sections: general, fixed, scientific, and fraction formats

use once_cell::sync::Lazy;
use regex::Regex;

use super::render_literals;

static FRACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<pre>[^#0?/]*?)(?:(?P<whole>[#0?,]+) +)?(?P<num>[#0?]+) */ *(?P<den>[#0?]+|[1-9][0-9]*)(?P<post>[^#0?]*)$",
    )
    .unwrap_or_else(|e| panic!("invalid fraction pattern: {e}"))
});

/// Excel's "General" rendering
///
/// Integers print without decimals, other numbers with up to 11 significant
/// digits. Exponents of 11 and above or -10 and below switch to scientific
/// notation with 6 significant digits.
pub(crate) fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    let exp = abs.log10().floor() as i32;

    if exp >= 11 || exp <= -10 {
        let (mantissa, exp) = normalize_scientific(abs, 1, 5);
        let mantissa = trim_fraction(&mantissa);
        let exp_sign = if exp < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}E{exp_sign}{:02}", exp.abs());
    }

    if abs.fract() == 0.0 {
        return format!("{sign}{}", abs as i64);
    }
    let decimals = (10 - exp).max(0) as usize;
    format!("{sign}{}", trim_fraction(&fixed_digits(abs, decimals)))
}

/// Render a section that contains the `General` keyword with literals around it
pub(crate) fn render_general_section(section: &str, general: &str) -> String {
    let lower = section.to_ascii_lowercase();
    let Some(pos) = lower.find("general") else {
        return general.to_string();
    };
    let mut out = String::new();
    render_literals(&section[..pos], &mut out, None);
    out.push_str(general);
    render_literals(&section[pos + "general".len()..], &mut out, None);
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Digit(char),
    Point,
    Comma,
    Percent,
    Exponent { upper: bool, plus: bool },
    Literal(String),
}

fn tokenize(section: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = section.chars().peekable();
    let mut seen_point = false;
    while let Some(c) = chars.next() {
        match c {
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
                let mut lit = String::new();
                render_literals(&format!("[{content}]"), &mut lit, None);
                if !lit.is_empty() {
                    tokens.push(Token::Literal(lit));
                }
            }
            '0' | '#' | '?' => tokens.push(Token::Digit(c)),
            '.' if !seen_point => {
                seen_point = true;
                tokens.push(Token::Point);
            }
            ',' => tokens.push(Token::Comma),
            '%' => tokens.push(Token::Percent),
            'E' | 'e' if matches!(chars.peek(), Some('+') | Some('-')) => {
                let plus = chars.next() == Some('+');
                tokens.push(Token::Exponent {
                    upper: c == 'E',
                    plus,
                });
            }
            '@' => {}
            _ => tokens.push(Token::Literal(c.to_string())),
        }
    }
    tokens
}

/// Role of each comma: grouping, scaling, or a literal
#[derive(Debug, Clone, Copy, PartialEq)]
enum CommaRole {
    Grouping,
    Scaling,
    Literal,
}

fn comma_roles(tokens: &[Token]) -> Vec<CommaRole> {
    let mut roles = Vec::new();
    for (i, t) in tokens.iter().enumerate() {
        if *t != Token::Comma {
            continue;
        }
        let prev_digit = tokens[..i]
            .iter()
            .rev()
            .find(|t| **t != Token::Comma)
            .is_some_and(|t| matches!(t, Token::Digit(_)));
        let next = tokens[i + 1..].iter().find(|t| **t != Token::Comma);
        let role = match (prev_digit, next) {
            (true, Some(Token::Digit(_))) => CommaRole::Grouping,
            (true, _) => CommaRole::Scaling,
            _ => CommaRole::Literal,
        };
        roles.push(role);
    }
    roles
}

/// Format a number with a fixed, scientific, or fraction section
pub(crate) fn format_number(value: f64, section: &str, auto_sign: bool) -> String {
    if !value.is_finite() {
        return format_general(value);
    }
    let negative = value < 0.0 && auto_sign;
    let body = if let Some(caps) = FRACTION.captures(section) {
        format_fraction(value.abs(), &caps)
    } else {
        format_digits(value.abs(), &tokenize(section))
    };
    if negative {
        format!("-{body}")
    } else {
        body
    }
}

fn format_digits(mut v: f64, tokens: &[Token]) -> String {
    let roles = comma_roles(tokens);
    let grouping = roles.contains(&CommaRole::Grouping);
    for _ in roles.iter().filter(|r| **r == CommaRole::Scaling) {
        v /= 1000.0;
    }
    for _ in tokens.iter().filter(|t| **t == Token::Percent) {
        v *= 100.0;
    }

    let exponent = tokens.iter().enumerate().find_map(|(i, t)| match t {
        Token::Exponent { upper, plus } => Some((i, *upper, *plus)),
        _ => None,
    });
    let exp_at = exponent.map(|(i, _, _)| i);
    let mantissa_end = exp_at.unwrap_or(tokens.len());
    let point_at = tokens[..mantissa_end].iter().position(|t| *t == Token::Point);
    let int_end = point_at.unwrap_or(mantissa_end);

    let int_slots: Vec<char> = digit_slots(&tokens[..int_end]);
    let frac_slots: Vec<char> = point_at
        .map(|p| digit_slots(&tokens[p + 1..mantissa_end]))
        .unwrap_or_default();

    if int_slots.is_empty() && frac_slots.is_empty() {
        let mut out = String::new();
        for t in tokens {
            render_plain(t, &mut out);
        }
        return out;
    }

    // Scientific: pick the exponent and reduce the value to its mantissa
    let mut exponent_text = String::new();
    if let Some((at, upper, plus)) = exponent {
        let exp_width = digit_slots(&tokens[at + 1..])
            .iter()
            .filter(|c| **c == '0')
            .count()
            .max(1);
        let step = if int_slots.len() > 1 && int_slots.contains(&'#') {
            int_slots.len() as i32
        } else {
            1
        };
        let int_digits = if step > 1 { 1 } else { int_slots.len().max(1) as i32 };
        let (mantissa, exp) = if v == 0.0 {
            (fixed_digits(0.0, frac_slots.len()), 0)
        } else if step > 1 {
            normalize_engineering(v, step, frac_slots.len())
        } else {
            normalize_scientific(v, int_digits, frac_slots.len())
        };
        v = mantissa.parse().unwrap_or(0.0);
        let sign = if exp < 0 {
            "-"
        } else if plus {
            "+"
        } else {
            ""
        };
        exponent_text = format!(
            "{}{sign}{:0width$}",
            if upper { 'E' } else { 'e' },
            exp.abs(),
            width = exp_width
        );
    }

    let fixed = fixed_digits(v, frac_slots.len());
    let (int_str, frac_str) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let int_str = if int_str == "0" { "" } else { int_str };

    let int_parts = distribute_int(int_str, &int_slots, grouping);
    let frac_parts = distribute_frac(frac_str, &frac_slots);

    let mut out = String::new();
    let mut int_i = 0;
    let mut frac_i = 0;
    let mut comma_i = 0;
    for (i, t) in tokens.iter().enumerate() {
        if exp_at.is_some_and(|at| i > at) && matches!(t, Token::Digit(_)) {
            continue;
        }
        match t {
            Token::Digit(_) if i < int_end => {
                out.push_str(&int_parts[int_i]);
                int_i += 1;
            }
            Token::Digit(_) => {
                out.push_str(&frac_parts[frac_i]);
                frac_i += 1;
            }
            Token::Comma => {
                if roles[comma_i] == CommaRole::Literal {
                    out.push(',');
                }
                comma_i += 1;
            }
            Token::Exponent { .. } => out.push_str(&exponent_text),
            other => render_plain(other, &mut out),
        }
    }
    out
}

fn render_plain(token: &Token, out: &mut String) {
    match token {
        Token::Digit(c) => out.push(*c),
        Token::Point => out.push('.'),
        Token::Comma => out.push(','),
        Token::Percent => out.push('%'),
        Token::Exponent { upper, plus } => {
            out.push(if *upper { 'E' } else { 'e' });
            out.push(if *plus { '+' } else { '-' });
        }
        Token::Literal(s) => out.push_str(s),
    }
}

fn digit_slots(tokens: &[Token]) -> Vec<char> {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Digit(c) => Some(*c),
            _ => None,
        })
        .collect()
}

fn empty_slot(slot: char) -> &'static str {
    match slot {
        '0' => "0",
        '?' => " ",
        _ => "",
    }
}

/// Assign integer digits to placeholders, right-aligned
fn distribute_int(digits: &str, slots: &[char], grouping: bool) -> Vec<String> {
    let mut parts = vec![String::new(); slots.len()];
    if slots.is_empty() {
        return parts;
    }
    if grouping {
        let zeros = slots.iter().filter(|c| **c == '0').count();
        let mut padded = digits.to_string();
        while padded.len() < zeros {
            padded.insert(0, '0');
        }
        parts[0] = group_thousands(&padded);
        return parts;
    }

    let digits: Vec<char> = digits.chars().collect();
    let n = digits.len();
    let k = slots.len();
    for (j, slot) in slots.iter().enumerate() {
        let from_right = k - 1 - j;
        if from_right < n {
            let mut part = String::new();
            if j == 0 && n > k {
                part.extend(&digits[..n - k]);
            }
            part.push(digits[n - 1 - from_right]);
            parts[j] = part;
        } else {
            parts[j] = empty_slot(*slot).to_string();
        }
    }
    parts
}

/// Assign fraction digits to placeholders, trimming optional trailing zeros
fn distribute_frac(digits: &str, slots: &[char]) -> Vec<String> {
    let digits: Vec<char> = digits.chars().collect();
    let mut parts: Vec<String> = digits.iter().map(|c| c.to_string()).collect();
    parts.resize(slots.len(), String::new());
    for i in (0..slots.len()).rev() {
        if digits.get(i) == Some(&'0') && slots[i] != '0' {
            parts[i] = empty_slot(slots[i]).to_string();
        } else {
            break;
        }
    }
    parts
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        out.push(c);
        let remaining = len - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            out.push(',');
        }
    }
    out
}

fn trim_fraction(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Mantissa text and exponent with `int_digits` digits before the point
fn normalize_scientific(v: f64, int_digits: i32, decimals: usize) -> (String, i32) {
    let mut exp = v.log10().floor() as i32 - (int_digits - 1);
    let mut mantissa = fixed_digits(v / 10f64.powi(exp), decimals);
    let limit = 10f64.powi(int_digits);
    if mantissa.parse::<f64>().unwrap_or(0.0) >= limit {
        exp += 1;
        mantissa = fixed_digits(v / 10f64.powi(exp), decimals);
    }
    (mantissa, exp)
}

/// Mantissa text and exponent where the exponent is a multiple of `step`
fn normalize_engineering(v: f64, step: i32, decimals: usize) -> (String, i32) {
    let mut exp = (v.log10().floor() as i32).div_euclid(step) * step;
    let mut mantissa = fixed_digits(v / 10f64.powi(exp), decimals);
    if mantissa.parse::<f64>().unwrap_or(0.0) >= 10f64.powi(step) {
        exp += step;
        mantissa = fixed_digits(v / 10f64.powi(exp), decimals);
    }
    (mantissa, exp)
}

/// Render a non-negative number with exactly `decimals` fraction digits
///
/// Rounding is half away from zero on the 15 significant digits Excel keeps,
/// so `1.005` rounds to `1.01`.
pub(crate) fn fixed_digits(v: f64, decimals: usize) -> String {
    let zeros = "0".repeat(decimals);
    if v == 0.0 || !v.is_finite() {
        return if decimals == 0 { "0".to_string() } else { format!("0.{zeros}") };
    }

    let sci = format!("{:.14e}", v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let point = exp + 1;

    let (int_part, frac_part) = if point >= digits.len() as i32 {
        (format!("{digits}{}", "0".repeat(point as usize - digits.len())), String::new())
    } else if point > 0 {
        (digits[..point as usize].to_string(), digits[point as usize..].to_string())
    } else {
        ("0".to_string(), format!("{}{digits}", "0".repeat((-point) as usize)))
    };

    let mut all: Vec<u8> = int_part.bytes().collect();
    let int_len = all.len();
    let frac_bytes = frac_part.as_bytes();
    for i in 0..decimals {
        all.push(*frac_bytes.get(i).unwrap_or(&b'0'));
    }
    let round_up = frac_bytes.get(decimals).is_some_and(|d| *d >= b'5');

    let mut int_len = int_len;
    if round_up {
        let mut i = all.len();
        loop {
            if i == 0 {
                all.insert(0, b'1');
                int_len += 1;
                break;
            }
            i -= 1;
            if all[i] == b'9' {
                all[i] = b'0';
            } else {
                all[i] += 1;
                break;
            }
        }
    }

    let int_text = String::from_utf8_lossy(&all[..int_len]);
    let int_text = int_text.trim_start_matches('0');
    let int_text = if int_text.is_empty() { "0" } else { int_text };
    if decimals == 0 {
        int_text.to_string()
    } else {
        format!("{int_text}.{}", String::from_utf8_lossy(&all[int_len..]))
    }
}

fn format_fraction(v: f64, caps: &regex::Captures<'_>) -> String {
    let pre = caps.name("pre").map_or("", |m| m.as_str());
    let post = caps.name("post").map_or("", |m| m.as_str());
    let has_whole = caps.name("whole").is_some();
    let den_spec = caps.name("den").map_or("?", |m| m.as_str());

    let (mut whole, frac) = if has_whole {
        (v.trunc(), v.fract())
    } else {
        (0.0, v)
    };

    let (mut num, den) = match den_spec.parse::<u32>() {
        Ok(fixed) => ((frac * fixed as f64).round() as u64, fixed as u64),
        Err(_) => {
            let max_den = 10u64.pow(den_spec.len() as u32) - 1;
            best_fraction(frac, max_den)
        }
    };
    if has_whole && num == den && den != 0 {
        whole += 1.0;
        num = 0;
    }

    let mut out = String::new();
    render_literals(pre, &mut out, None);
    if has_whole {
        if num == 0 {
            out.push_str(&format!("{}", whole as i64));
        } else if whole == 0.0 {
            out.push_str(&format!("{num}/{den}"));
        } else {
            out.push_str(&format!("{} {num}/{den}", whole as i64));
        }
    } else {
        out.push_str(&format!("{num}/{den}"));
    }
    render_literals(post, &mut out, None);
    out
}

/// Closest `n/d` with `d <= max_den`, smallest denominator on ties
fn best_fraction(v: f64, max_den: u64) -> (u64, u64) {
    let mut best = ((v).round() as u64, 1u64);
    let mut best_err = (v - best.0 as f64).abs();
    for d in 2..=max_den.max(1) {
        let n = (v * d as f64).round();
        let err = (v - n / d as f64).abs();
        if err + 1e-12 < best_err {
            best = (n as u64, d);
            best_err = err;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_digits_rounding() {
        assert_eq!(fixed_digits(1.005, 2), "1.01");
        assert_eq!(fixed_digits(2.5, 0), "3");
        assert_eq!(fixed_digits(9.999, 2), "10.00");
        assert_eq!(fixed_digits(0.000123, 5), "0.00012");
        assert_eq!(fixed_digits(1.5e20, 0), "150000000000000000000");
        assert_eq!(fixed_digits(0.0, 3), "0.000");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1234567"), "1,234,567");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1000"), "1,000");
    }

    #[test]
    fn test_literal_digits_between_placeholders() {
        assert_eq!(format_number(5551234.0, "000-0000", true), "555-1234");
        assert_eq!(format_number(42.0, "00000", true), "00042");
        assert_eq!(format_number(7.0, "???", true), "  7");
    }

    #[test]
    fn test_best_fraction() {
        assert_eq!(best_fraction(0.5, 9), (1, 2));
        assert_eq!(best_fraction(0.333, 9), (1, 3));
        assert_eq!(best_fraction(0.14159, 99), (14, 99));
    }
}

//! Formula parser
//!
//! A recursive descent parser for Excel formulas with Excel's operator
//! precedence. The leading `=` is optional.

use crate::ast::{
    BinaryOperator, CellReference, FormulaExpr, NameReference, RangeReference, UnaryOperator,
};
use crate::error::{FormulaError, FormulaResult};
use binsheets_core::{CellAddress, CellError, CellRange, MAX_COLS, MAX_ROWS};
use once_cell::sync::Lazy;
use regex::Regex;

static COLUMN_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\$?)([A-Za-z]{1,3}):(\$?)([A-Za-z]{1,3})")
        .unwrap_or_else(|e| panic!("column range pattern: {e}"))
});

static ROW_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\$?)(\d{1,5}):(\$?)(\d{1,5})")
        .unwrap_or_else(|e| panic!("row range pattern: {e}"))
});

/// Prefix Excel 2007+ writes in front of functions unknown to older versions
pub const FUTURE_FUNCTION_PREFIX: &str = "_xlfn.";

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use binsheets_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);
    if formula.trim().is_empty() {
        return Err(FormulaError::Parse("Empty formula".into()));
    }

    let mut parser = FormulaParser::new(formula);
    let expr = parser.parse_expression()?;

    match parser.current_token() {
        Token::Eof => Ok(expr),
        Token::Invalid(msg) => Err(FormulaError::Parse(msg.clone())),
        other => Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression at position {}",
            other, parser.token_start
        ))),
    }
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // Identifiers and references
    Identifier(String), // Function name or defined name
    CellRef(String),    // Cell reference like A1, $A$1
    AreaRef(CellRange), // Whole columns or rows, A:C or 1:3
    SheetRef(String),   // Sheet qualifier like Sheet1! or 'My Sheet'!

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    /// Scanner failure, reported when the parser reaches it
    Invalid(String),

    // End of input
    Eof,
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    token_start: usize,
    current_token: Option<Token>,
    /// Whitespace preceded the current token (intersection operator)
    space_before: bool,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            token_start: 0,
            current_token: None,
            space_before: false,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        let before = self.pos;
        self.skip_whitespace();
        self.space_before = self.pos > before;
        self.token_start = self.pos;
        self.current_token = Some(self.scan_token());
    }

    fn scan_token(&mut self) -> Token {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Token::Eof,
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::LessEqual;
            } else if self.peek_char() == Some('>') {
                self.advance();
                return Token::NotEqual;
            }
            return Token::LessThan;
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Token::GreaterEqual;
            }
            return Token::GreaterThan;
        }

        if c == '"' {
            return self.scan_string();
        }

        if c == '\'' {
            return self.scan_quoted_sheet();
        }

        if let Some(token) = self.scan_whole_rows_or_columns() {
            return token;
        }

        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c == '#' {
            return self.scan_error();
        }

        if c.is_alphabetic() || c == '_' || c == '$' || c == '\\' {
            return self.scan_identifier_or_ref();
        }

        self.advance();
        Token::Invalid(format!("Unexpected character '{}'", c))
    }

    fn scan_string(&mut self) -> Token {
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Token::String(s);
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Token::Invalid("Unterminated string literal".into()),
            }
        }
    }

    fn scan_quoted_sheet(&mut self) -> Token {
        self.advance();

        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Token::Invalid("Unterminated quoted sheet name".into()),
            }
        }

        if self.peek_char() != Some('!') {
            return Token::Invalid(format!("Expected '!' after sheet name '{}'", name));
        }
        self.advance();
        Token::SheetRef(name)
    }

    fn scan_whole_rows_or_columns(&mut self) -> Option<Token> {
        let rest = &self.input[self.pos..];

        if let Some(caps) = COLUMN_RANGE.captures(rest) {
            let len = caps[0].len();
            if !continues_identifier(&rest[len..]) {
                let first = CellAddress::letters_to_column(&caps[2]).ok()?;
                let last = CellAddress::letters_to_column(&caps[4]).ok()?;
                let range = CellRange::new(
                    CellAddress::with_absolute(0, first, true, !caps[1].is_empty()),
                    CellAddress::with_absolute(MAX_ROWS - 1, last, true, !caps[3].is_empty()),
                );
                self.pos += len;
                return Some(Token::AreaRef(range));
            }
        }

        if let Some(caps) = ROW_RANGE.captures(rest) {
            let len = caps[0].len();
            let next = rest[len..].chars().next();
            if !continues_identifier(&rest[len..]) && next != Some('.') {
                let first: u32 = caps[2].parse().ok()?;
                let last: u32 = caps[4].parse().ok()?;
                if first == 0 || last == 0 || first > MAX_ROWS || last > MAX_ROWS {
                    return None;
                }
                let range = CellRange::new(
                    CellAddress::with_absolute(first - 1, 0, !caps[1].is_empty(), true),
                    CellAddress::with_absolute(last - 1, MAX_COLS - 1, !caps[3].is_empty(), true),
                );
                self.pos += len;
                return Some(Token::AreaRef(range));
            }
        }

        None
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Invalid(format!("Invalid number '{}'", num_str)),
        }
    }

    fn scan_error(&mut self) -> Token {
        let start = self.pos;
        self.advance();
        while self.peek_char().map_or(false, |c| {
            c.is_ascii_alphanumeric() || c == '!' || c == '/' || c == '?'
        }) {
            self.advance();
        }
        let error_str = &self.input[start..self.pos];
        match CellError::from_str(error_str) {
            Some(err) => Token::Error(err),
            None => Token::Invalid(format!("Unknown error literal '{}'", error_str)),
        }
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        let start = self.pos;

        while self.peek_char().map_or(false, |c| {
            c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '?' | '\\')
        }) {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // Check for sheet reference (ends with !)
        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(text.to_string());
        }

        let is_call = self.peek_char() == Some('(');

        // Check for boolean literals (but not if followed by '(' - then it's a function call)
        if !is_call {
            if text.eq_ignore_ascii_case("TRUE") {
                return Token::Boolean(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Token::Boolean(false);
            }
        }

        // Letters then digits is a cell reference unless it is a call (LOG10(100))
        // or lies outside the sheet, in which case it can only be a name.
        if !is_call && is_cell_reference(text) {
            if text.contains('$') || CellAddress::parse(text).is_ok() {
                return Token::CellRef(text.to_string());
            }
        }

        Token::Identifier(text.to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        match self.current_token() {
            t if t == expected => {
                self.consume();
                Ok(())
            }
            Token::Invalid(msg) => Err(FormulaError::Parse(msg.clone())),
            other => Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected, other
            ))),
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^ (left associative)
    // 6. Prefix: -, +
    // 7. Postfix: %
    // 8. Intersection: space
    // 9. Range: :
    // 10. Primary: literals, references, function calls, parentheses (union inside)

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_concatenation()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume();
            let right = self.parse_additive()?;
            left = FormulaExpr::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_exponent()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;

        while matches!(self.current_token(), Token::Caret) {
            self.consume();
            let right = self.parse_unary()?;
            left = FormulaExpr::binary(BinaryOperator::Power, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Minus => {
                self.consume();
                let operand = self.parse_unary()?;
                Ok(FormulaExpr::unary(UnaryOperator::Negate, operand))
            }
            Token::Plus => {
                self.consume();
                let operand = self.parse_unary()?;
                Ok(FormulaExpr::unary(UnaryOperator::Plus, operand))
            }
            _ => self.parse_percent(),
        }
    }

    fn parse_percent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut expr = self.parse_intersection()?;

        while matches!(self.current_token(), Token::Percent) {
            self.consume();
            expr = FormulaExpr::unary(UnaryOperator::Percent, expr);
        }

        Ok(expr)
    }

    fn parse_intersection(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_range()?;

        while self.space_before && left.is_reference() && self.starts_reference_operand() {
            let right = self.parse_range()?;
            left = FormulaExpr::binary(BinaryOperator::Intersect, left, right);
        }

        Ok(left)
    }

    fn starts_reference_operand(&self) -> bool {
        matches!(
            self.current_token(),
            Token::CellRef(_)
                | Token::AreaRef(_)
                | Token::SheetRef(_)
                | Token::Identifier(_)
                | Token::LeftParen
        )
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_primary()?;

        while matches!(self.current_token(), Token::Colon) {
            self.consume();
            let right = self.parse_primary()?;

            left = match (left, right) {
                (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end))
                    if end.sheet.is_none() || end.sheet == start.sheet =>
                {
                    FormulaExpr::RangeRef(RangeReference {
                        sheet: start.sheet,
                        range: CellRange::new(start.address, end.address),
                    })
                }
                (left, right) => FormulaExpr::binary(BinaryOperator::Range, left, right),
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume();
                Ok(FormulaExpr::Number(n))
            }

            Token::String(s) => {
                self.consume();
                Ok(FormulaExpr::String(s))
            }

            Token::Boolean(b) => {
                self.consume();
                Ok(FormulaExpr::Boolean(b))
            }

            Token::Error(e) => {
                self.consume();
                Ok(FormulaExpr::Error(e))
            }

            Token::LeftParen => {
                self.consume();
                let mut expr = self.parse_expression()?;
                while matches!(self.current_token(), Token::Comma) {
                    self.consume();
                    let right = self.parse_expression()?;
                    expr = FormulaExpr::binary(BinaryOperator::Union, expr, right);
                }
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBrace => self.parse_array(),

            Token::SheetRef(sheet) => {
                self.consume();
                self.parse_sheet_reference(sheet)
            }

            Token::CellRef(ref_str) => {
                self.consume();
                parse_cell_reference(None, &ref_str)
            }

            Token::AreaRef(range) => {
                self.consume();
                Ok(FormulaExpr::RangeRef(RangeReference { sheet: None, range }))
            }

            Token::Identifier(name) => {
                self.consume();
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Ok(FormulaExpr::NameRef(NameReference::new(name)))
                }
            }

            Token::Invalid(msg) => Err(FormulaError::Parse(msg)),

            other => Err(FormulaError::Parse(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftBrace)?;

        let mut rows = Vec::new();
        let mut current_row = vec![self.parse_array_constant()?];

        loop {
            match self.current_token() {
                Token::Comma => {
                    self.consume();
                    current_row.push(self.parse_array_constant()?);
                }
                Token::Semicolon => {
                    self.consume();
                    rows.push(std::mem::take(&mut current_row));
                    current_row.push(self.parse_array_constant()?);
                }
                Token::RightBrace => break,
                _ => {
                    return Err(FormulaError::Parse(
                        "Expected ',' ';' or '}' in array".into(),
                    ))
                }
            }
        }
        rows.push(current_row);

        if rows.iter().any(|r| r.len() != rows[0].len()) {
            return Err(FormulaError::Parse("Array rows differ in length".into()));
        }

        self.expect(&Token::RightBrace)?;
        Ok(FormulaExpr::Array(rows))
    }

    fn parse_array_constant(&mut self) -> FormulaResult<FormulaExpr> {
        let negate = match self.current_token() {
            Token::Minus => {
                self.consume();
                true
            }
            Token::Plus => {
                self.consume();
                false
            }
            _ => false,
        };

        match (self.consume(), negate) {
            (Token::Number(n), true) => Ok(FormulaExpr::Number(-n)),
            (Token::Number(n), false) => Ok(FormulaExpr::Number(n)),
            (Token::String(s), false) => Ok(FormulaExpr::String(s)),
            (Token::Boolean(b), false) => Ok(FormulaExpr::Boolean(b)),
            (Token::Error(e), false) => Ok(FormulaExpr::Error(e)),
            (Token::Invalid(msg), _) => Err(FormulaError::Parse(msg)),
            (other, _) => Err(FormulaError::Parse(format!(
                "Array constants must be literals, got {:?}",
                other
            ))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if !matches!(self.current_token(), Token::RightParen) {
            loop {
                if matches!(self.current_token(), Token::Comma | Token::RightParen) {
                    args.push(FormulaExpr::Missing);
                } else {
                    args.push(self.parse_expression()?);
                }

                if matches!(self.current_token(), Token::Comma) {
                    self.consume();
                } else {
                    break;
                }
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: normalize_function_name(&name),
            args,
        })
    }

    fn parse_sheet_reference(&mut self, sheet: String) -> FormulaResult<FormulaExpr> {
        match self.consume() {
            Token::CellRef(ref_str) => parse_cell_reference(Some(sheet), &ref_str),
            Token::AreaRef(range) => Ok(FormulaExpr::RangeRef(RangeReference {
                sheet: Some(sheet),
                range,
            })),
            Token::Identifier(name) => Ok(FormulaExpr::NameRef(NameReference {
                sheet: Some(sheet),
                name,
            })),
            Token::Error(CellError::Ref) => Ok(FormulaExpr::Error(CellError::Ref)),
            Token::Invalid(msg) => Err(FormulaError::Parse(msg)),
            other => Err(FormulaError::Parse(format!(
                "Expected reference after sheet '{}', got {:?}",
                sheet, other
            ))),
        }
    }
}

/// Upper-cased function name without the `_xlfn.` marker
pub fn normalize_function_name(name: &str) -> String {
    let upper = name.to_uppercase();
    match upper.strip_prefix(&FUTURE_FUNCTION_PREFIX.to_uppercase()) {
        Some(stripped) => stripped.to_string(),
        None => upper,
    }
}

fn continues_identifier(rest: &str) -> bool {
    rest.chars()
        .next()
        .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '$' | '(' | '!'))
}

/// Letters then digits, each optionally preceded by `$`
fn is_cell_reference(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }

    let letter_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == letter_start {
        return false;
    }

    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }

    let digit_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digit_start {
        return false;
    }

    i == bytes.len()
}

fn parse_cell_reference(sheet: Option<String>, ref_str: &str) -> FormulaResult<FormulaExpr> {
    let address = CellAddress::parse(ref_str).map_err(|e| {
        FormulaError::Parse(format!("Invalid cell reference '{}': {}", ref_str, e))
    })?;

    Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(row: u32, col: u16) -> FormulaExpr {
        FormulaExpr::CellRef(CellReference {
            sheet: None,
            address: CellAddress::new(row, col),
        })
    }

    fn roundtrip(text: &str) -> String {
        let ast = parse_formula(text).unwrap();
        let rendered = ast.to_string();
        assert_eq!(parse_formula(&rendered).unwrap(), ast, "reparse of {rendered}");
        rendered
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=3.14").unwrap(), FormulaExpr::Number(3.14));
        assert_eq!(parse_formula("=1e10").unwrap(), FormulaExpr::Number(1e10));
        assert_eq!(parse_formula(".5").unwrap(), FormulaExpr::Number(0.5));
    }

    #[test]
    fn test_leading_equals_is_optional() {
        assert_eq!(parse_formula("1+2").unwrap(), parse_formula("=1+2").unwrap());
        assert!(parse_formula("=").is_err());
        assert!(parse_formula("").is_err());
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(
            parse_formula("=\"Hello \"\"World\"\"\"").unwrap(),
            FormulaExpr::String("Hello \"World\"".into())
        );
        assert!(parse_formula("=\"open").is_err());
    }

    #[test]
    fn test_parse_boolean_and_error() {
        assert_eq!(parse_formula("=true").unwrap(), FormulaExpr::Boolean(true));
        assert_eq!(parse_formula("=FALSE").unwrap(), FormulaExpr::Boolean(false));
        assert_eq!(
            parse_formula("=#DIV/0!").unwrap(),
            FormulaExpr::Error(CellError::Div0)
        );
        assert!(parse_formula("=#BOGUS!").is_err());
    }

    #[test]
    fn test_precedence() {
        let ast = parse_formula("=1+2*3").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::binary(
                BinaryOperator::Add,
                FormulaExpr::Number(1.0),
                FormulaExpr::binary(
                    BinaryOperator::Multiply,
                    FormulaExpr::Number(2.0),
                    FormulaExpr::Number(3.0)
                )
            )
        );

        // negation binds tighter than ^
        let ast = parse_formula("=-2^2").unwrap();
        assert!(matches!(ast, FormulaExpr::BinaryOp { op: BinaryOperator::Power, .. }));

        // ^ is left associative
        let ast = parse_formula("=2^3^2").unwrap();
        if let FormulaExpr::BinaryOp { left, .. } = ast {
            assert!(matches!(*left, FormulaExpr::BinaryOp { op: BinaryOperator::Power, .. }));
        } else {
            panic!("expected power");
        }
    }

    #[test]
    fn test_unary_plus_and_percent() {
        assert_eq!(
            parse_formula("=+A1").unwrap(),
            FormulaExpr::unary(UnaryOperator::Plus, cell(0, 0))
        );
        assert_eq!(
            parse_formula("=50%").unwrap(),
            FormulaExpr::unary(UnaryOperator::Percent, FormulaExpr::Number(50.0))
        );
    }

    #[test]
    fn test_cell_reference_flags() {
        match parse_formula("=$B3").unwrap() {
            FormulaExpr::CellRef(r) => {
                assert_eq!((r.address.row, r.address.col), (2, 1));
                assert!(r.address.col_absolute);
                assert!(!r.address.row_absolute);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_out_of_grid_reference_is_a_name() {
        assert_eq!(
            parse_formula("=XFD1").unwrap(),
            FormulaExpr::NameRef(NameReference::new("XFD1"))
        );
    }

    #[test]
    fn test_range_and_whole_columns() {
        match parse_formula("=SUM(A:A)").unwrap() {
            FormulaExpr::Function { args, .. } => match &args[0] {
                FormulaExpr::RangeRef(r) => {
                    assert!(r.is_whole_columns());
                    assert_eq!(r.range.end.row, MAX_ROWS - 1);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }

        match parse_formula("=2:$5").unwrap() {
            FormulaExpr::RangeRef(r) => {
                assert!(r.is_whole_rows());
                assert_eq!((r.range.start.row, r.range.end.row), (1, 4));
                assert!(r.range.end.row_absolute);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_quoted_sheet_names() {
        match parse_formula("='O''Brien Data'!A1:B2").unwrap() {
            FormulaExpr::RangeRef(r) => {
                assert_eq!(r.sheet.as_deref(), Some("O'Brien Data"));
                assert_eq!(r.range.to_a1_string(), "A1:B2");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_formula("='Sheet1'A1").is_err());
    }

    #[test]
    fn test_sheet_qualified_name() {
        assert_eq!(
            parse_formula("=Sheet2!Rates").unwrap(),
            FormulaExpr::NameRef(NameReference {
                sheet: Some("Sheet2".into()),
                name: "Rates".into()
            })
        );
    }

    #[test]
    fn test_missing_arguments() {
        assert_eq!(
            parse_formula("=IF(A1,,1)").unwrap(),
            FormulaExpr::Function {
                name: "IF".into(),
                args: vec![cell(0, 0), FormulaExpr::Missing, FormulaExpr::Number(1.0)],
            }
        );
        match parse_formula("=NOW()").unwrap() {
            FormulaExpr::Function { args, .. } => assert!(args.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_future_function_prefix_is_stripped() {
        match parse_formula("=_xlfn.IFERROR(A1,0)").unwrap() {
            FormulaExpr::Function { name, .. } => assert_eq!(name, "IFERROR"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_intersection_and_union() {
        assert_eq!(
            parse_formula("=A1:B2 B1:C3").unwrap(),
            FormulaExpr::binary(
                BinaryOperator::Intersect,
                parse_formula("A1:B2").unwrap(),
                parse_formula("B1:C3").unwrap()
            )
        );
        match parse_formula("=SUM((A1,B2),C3)").unwrap() {
            FormulaExpr::Function { args, .. } => {
                assert_eq!(args.len(), 2);
                assert!(matches!(args[0], FormulaExpr::BinaryOp { op: BinaryOperator::Union, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        // spaces around arithmetic are not intersections
        assert!(matches!(
            parse_formula("= A1 + B1 ").unwrap(),
            FormulaExpr::BinaryOp { op: BinaryOperator::Add, .. }
        ));
    }

    #[test]
    fn test_array_constant() {
        assert_eq!(
            parse_formula("={1,-2;\"a\",TRUE}").unwrap(),
            FormulaExpr::Array(vec![
                vec![FormulaExpr::Number(1.0), FormulaExpr::Number(-2.0)],
                vec![FormulaExpr::String("a".into()), FormulaExpr::Boolean(true)],
            ])
        );
        assert!(parse_formula("={1,2;3}").is_err());
        assert!(parse_formula("={A1}").is_err());
    }

    #[test]
    fn test_render_roundtrip() {
        assert_eq!(roundtrip("=1+2*3"), "1+2*3");
        assert_eq!(roundtrip("=(1+2)*3"), "(1+2)*3");
        assert_eq!(roundtrip("=1-(2-3)"), "1-(2-3)");
        assert_eq!(roundtrip("=-(1+2)"), "-(1+2)");
        assert_eq!(roundtrip("=(-5)%"), "(-5)%");
        assert_eq!(roundtrip("= sum( a1 : b2 )"), "SUM(A1:B2)");
        assert_eq!(roundtrip("='My Sheet'!$A$1"), "'My Sheet'!$A$1");
        assert_eq!(roundtrip("=Sheet1!A:A"), "Sheet1!A:A");
        assert_eq!(roundtrip("=$A$1:$A$65536"), "$A:$A");
        assert_eq!(roundtrip("=A1 B1"), "A1 B1");
        assert_eq!(roundtrip("=SUM((A1,B1,C1))"), "SUM(((A1,B1),C1))");
        assert_eq!(roundtrip("=IF(A1,,\"x\")"), "IF(A1,,\"x\")");
        assert_eq!(roundtrip("={1,-2;3,4}"), "{1,-2;3,4}");
        assert_eq!(roundtrip("=2^-1"), "2^-1");
    }
}

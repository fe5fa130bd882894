//! Formula Abstract Syntax Tree types
//!
//! `Display` renders canonical formula text (without the leading `=`).
//! Parentheses are emitted from operator precedence, so rendering and
//! re-parsing a tree yields the same tree.

use binsheets_core::{quote_sheet_name, CellAddress, CellError, CellRange, MAX_COLS, MAX_ROWS};
use std::fmt;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(CellError),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference (also whole rows and whole columns)
    RangeRef(RangeReference),
    /// Defined name
    NameRef(NameReference),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    Array(Vec<Vec<FormulaExpr>>),

    /// Omitted function argument, as in `IF(A1,,1)`
    Missing,
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

impl RangeReference {
    /// Spans every row, written `A:C`
    pub fn is_whole_columns(&self) -> bool {
        let r = &self.range;
        r.start.row == 0
            && r.end.row == MAX_ROWS - 1
            && r.start.row_absolute
            && r.end.row_absolute
    }

    /// Spans every column, written `1:3`
    pub fn is_whole_rows(&self) -> bool {
        let r = &self.range;
        r.start.col == 0
            && r.end.col == MAX_COLS - 1
            && r.start.col_absolute
            && r.end.col_absolute
    }
}

/// Defined name, optionally qualified by the sheet it is scoped to
#[derive(Debug, Clone, PartialEq)]
pub struct NameReference {
    pub sheet: Option<String>,
    pub name: String,
}

impl NameReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            sheet: None,
            name: name.into(),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    // Reference
    Range,
    Union,
    Intersect,
}

impl BinaryOperator {
    /// Operator text as written in a formula
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
            BinaryOperator::Range => ":",
            BinaryOperator::Union => ",",
            BinaryOperator::Intersect => " ",
        }
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 1,
            BinaryOperator::Concat => 2,
            BinaryOperator::Add | BinaryOperator::Subtract => 3,
            BinaryOperator::Multiply | BinaryOperator::Divide => 4,
            BinaryOperator::Power => 5,
            BinaryOperator::Intersect => 9,
            BinaryOperator::Range => 10,
            // always written inside its own parentheses
            BinaryOperator::Union => ATOM,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
    Percent,
}

impl UnaryOperator {
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            UnaryOperator::Plus | UnaryOperator::Negate => 6,
            UnaryOperator::Percent => 7,
        }
    }
}

const ATOM: u8 = 11;

impl FormulaExpr {
    /// Build a binary node
    pub fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> Self {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build a unary node
    pub fn unary(op: UnaryOperator, operand: FormulaExpr) -> Self {
        FormulaExpr::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Binding strength of the node when it appears as an operand
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            FormulaExpr::BinaryOp { op, .. } => op.precedence(),
            FormulaExpr::UnaryOp { op, .. } => op.precedence(),
            _ => ATOM,
        }
    }

    /// Whether this node can produce a reference (used for intersection and union)
    pub fn is_reference(&self) -> bool {
        match self {
            FormulaExpr::CellRef(_) | FormulaExpr::RangeRef(_) | FormulaExpr::NameRef(_) => true,
            FormulaExpr::BinaryOp { op, .. } => matches!(
                op,
                BinaryOperator::Range | BinaryOperator::Union | BinaryOperator::Intersect
            ),
            FormulaExpr::Function { .. } => true,
            _ => false,
        }
    }

    /// Visit every node, parents before children
    pub fn walk(&self, f: &mut dyn FnMut(&FormulaExpr)) {
        f(self);
        match self {
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.walk(f),
            FormulaExpr::Function { args, .. } => args.iter().for_each(|a| a.walk(f)),
            FormulaExpr::Array(rows) => rows.iter().flatten().for_each(|a| a.walk(f)),
            _ => {}
        }
    }

    /// Rewrite the tree bottom-up
    pub fn map(self, f: &mut dyn FnMut(FormulaExpr) -> FormulaExpr) -> FormulaExpr {
        let mapped = match self {
            FormulaExpr::BinaryOp { op, left, right } => {
                let left = left.map(f);
                let right = right.map(f);
                FormulaExpr::binary(op, left, right)
            }
            FormulaExpr::UnaryOp { op, operand } => FormulaExpr::unary(op, operand.map(f)),
            FormulaExpr::Function { name, args } => FormulaExpr::Function {
                name,
                args: args.into_iter().map(|a| a.map(f)).collect(),
            },
            other => other,
        };
        f(mapped)
    }
}

/// Whether `child` must be parenthesised as an operand of a node with
/// precedence `parent`. Binary operators are left-associative, so a right
/// operand of equal precedence needs parentheses.
pub(crate) fn needs_parens(child: &FormulaExpr, parent: u8, right_operand: bool) -> bool {
    let p = child.precedence();
    if right_operand {
        p <= parent
    } else {
        p < parent
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    child: &FormulaExpr,
    parent: u8,
    right_operand: bool,
) -> fmt::Result {
    if needs_parens(child, parent, right_operand) {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

fn write_sheet(f: &mut fmt::Formatter<'_>, sheet: &Option<String>) -> fmt::Result {
    match sheet {
        Some(name) => write!(f, "{}!", quote_sheet_name(name)),
        None => Ok(()),
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet(f, &self.sheet)?;
        write!(f, "{}", self.address.to_a1_string())
    }
}

impl fmt::Display for RangeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet(f, &self.sheet)?;
        let (start, end) = (&self.range.start, &self.range.end);
        if self.is_whole_columns() {
            let col = |a: &CellAddress| {
                format!(
                    "{}{}",
                    if a.col_absolute { "$" } else { "" },
                    CellAddress::column_to_letters(a.col)
                )
            };
            write!(f, "{}:{}", col(start), col(end))
        } else if self.is_whole_rows() {
            let row = |a: &CellAddress| {
                format!("{}{}", if a.row_absolute { "$" } else { "" }, a.row + 1)
            };
            write!(f, "{}:{}", row(start), row(end))
        } else {
            write!(f, "{}:{}", start.to_a1_string(), end.to_a1_string())
        }
    }
}

impl fmt::Display for NameReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet(f, &self.sheet)?;
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Number(n) => write!(f, "{}", format_number(*n)),
            FormulaExpr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            FormulaExpr::Error(e) => write!(f, "{}", e.as_str()),
            FormulaExpr::CellRef(r) => write!(f, "{}", r),
            FormulaExpr::RangeRef(r) => write!(f, "{}", r),
            FormulaExpr::NameRef(n) => write!(f, "{}", n),
            FormulaExpr::BinaryOp { op, left, right } => {
                if *op == BinaryOperator::Union {
                    return write!(f, "({},{})", left, right);
                }
                let p = op.precedence();
                write_operand(f, left, p, false)?;
                write!(f, "{}", op.symbol())?;
                write_operand(f, right, p, true)
            }
            FormulaExpr::UnaryOp { op, operand } => {
                let p = op.precedence();
                match op {
                    UnaryOperator::Plus => {
                        write!(f, "+")?;
                        write_operand(f, operand, p, false)
                    }
                    UnaryOperator::Negate => {
                        write!(f, "-")?;
                        write_operand(f, operand, p, false)
                    }
                    UnaryOperator::Percent => {
                        write_operand(f, operand, p, false)?;
                        write!(f, "%")
                    }
                }
            }
            FormulaExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            FormulaExpr::Array(rows) => {
                write!(f, "{{")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    for (j, item) in row.iter().enumerate() {
                        if j > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", item)?;
                    }
                }
                write!(f, "}}")
            }
            FormulaExpr::Missing => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> FormulaExpr {
        FormulaExpr::Number(n)
    }

    #[test]
    fn test_display_inserts_parens_by_precedence() {
        let sum = FormulaExpr::binary(BinaryOperator::Add, num(1.0), num(2.0));
        let product = FormulaExpr::binary(BinaryOperator::Multiply, sum.clone(), num(3.0));
        assert_eq!(product.to_string(), "(1+2)*3");

        let sub = FormulaExpr::binary(
            BinaryOperator::Subtract,
            num(1.0),
            FormulaExpr::binary(BinaryOperator::Subtract, num(2.0), num(3.0)),
        );
        assert_eq!(sub.to_string(), "1-(2-3)");

        let neg_pow = FormulaExpr::binary(
            BinaryOperator::Power,
            FormulaExpr::unary(UnaryOperator::Negate, num(2.0)),
            num(2.0),
        );
        assert_eq!(neg_pow.to_string(), "-2^2");
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(FormulaExpr::String("say \"hi\"".into()).to_string(), "\"say \"\"hi\"\"\"");
        assert_eq!(num(0.5).to_string(), "0.5");
        assert_eq!(num(42.0).to_string(), "42");
        assert_eq!(FormulaExpr::Error(CellError::Na).to_string(), "#N/A");
    }

    #[test]
    fn test_display_whole_columns_and_rows() {
        let cols = RangeReference {
            sheet: None,
            range: CellRange::new(
                CellAddress::with_absolute(0, 0, true, false),
                CellAddress::with_absolute(MAX_ROWS - 1, 2, true, true),
            ),
        };
        assert_eq!(cols.to_string(), "A:$C");

        let rows = RangeReference {
            sheet: Some("My Sheet".into()),
            range: CellRange::new(
                CellAddress::with_absolute(0, 0, false, true),
                CellAddress::with_absolute(2, MAX_COLS - 1, false, true),
            ),
        };
        assert_eq!(rows.to_string(), "'My Sheet'!1:3");
    }

    #[test]
    fn test_display_function_with_missing_arg() {
        let expr = FormulaExpr::Function {
            name: "IF".into(),
            args: vec![FormulaExpr::Boolean(true), FormulaExpr::Missing, num(1.0)],
        };
        assert_eq!(expr.to_string(), "IF(TRUE,,1)");
    }
}

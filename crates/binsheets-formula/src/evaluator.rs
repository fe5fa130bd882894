//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. Cells, ranges, sheet references
//! and defined names resolve through the [`Workbook`] held by the context.
//! Formula cells contribute their cached values, so a workbook is
//! recalculated in dependency order (see [`crate::dependency`]).

use crate::ast::{BinaryOperator, FormulaExpr, NameReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use crate::parser::parse_formula;
use binsheets_core::{CellError, CellRange, CellValue, NameScope, Workbook};
use std::cell::Cell;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The registry of built-in functions
pub fn function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Defined names may refer to other names; deeper chains are treated as cycles
const MAX_NAME_DEPTH: u8 = 32;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Operator coercion to a number: errors pass through, text that is not
    /// numeric is `#VALUE!`
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            FormulaValue::Error(e) => Err(*e),
            FormulaValue::Array(_) => self.scalar().to_number(),
            other => other.as_number().ok_or(CellError::Value),
        }
    }

    /// Operator coercion to text
    pub fn to_text(&self) -> Result<String, CellError> {
        match self {
            FormulaValue::Error(e) => Err(*e),
            FormulaValue::Array(_) => self.scalar().to_text(),
            other => Ok(other.as_string()),
        }
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Some(true),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Some(false),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => number_to_text(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => self.scalar().as_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// A single value: arrays collapse to their only element, larger arrays
    /// are `#VALUE!`
    pub fn scalar(&self) -> FormulaValue {
        match self {
            FormulaValue::Array(rows) => match rows.as_slice() {
                [row] if row.len() == 1 => row[0].clone(),
                [] => FormulaValue::Empty,
                _ => FormulaValue::Error(CellError::Value),
            },
            other => other.clone(),
        }
    }

    /// All values of an array (row-major), or the value itself
    pub fn flatten(&self) -> Vec<&FormulaValue> {
        match self {
            FormulaValue::Array(rows) => rows.iter().flatten().collect(),
            other => vec![other],
        }
    }
}

/// Text form of a number as Excel concatenates it: 15 significant digits
pub(crate) fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let rounded: f64 = format!("{:.14e}", n).parse().unwrap_or(n);
    format!("{}", rounded)
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::String(s) => FormulaValue::String(s.as_str().to_string()),
            CellValue::Boolean(b) => FormulaValue::Boolean(b),
            CellValue::Error(e) => FormulaValue::Error(e),
            CellValue::Formula { cached_value, .. } => cached_value
                .map(|v| (*v).into())
                .unwrap_or(FormulaValue::Empty),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) if !n.is_finite() => CellValue::Error(CellError::Num),
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::string(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            array @ FormulaValue::Array(_) => {
                // a cell shows the top-left element of an array result
                match array {
                    FormulaValue::Array(rows) => rows
                        .into_iter()
                        .next()
                        .and_then(|row| row.into_iter().next())
                        .map(CellValue::from)
                        .unwrap_or(CellValue::Error(CellError::Value)),
                    _ => CellValue::Error(CellError::Value),
                }
            }
        }
    }
}

/// Rectangular areas a reference expression denotes, all on one sheet
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAreas {
    pub sheet: usize,
    pub ranges: Vec<CellRange>,
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Reference to the workbook for cell lookups
    pub workbook: Option<&'a Workbook>,
    /// Current worksheet index
    pub current_sheet: usize,
    /// Current cell row (for ROW() and COLUMN())
    pub current_row: u32,
    /// Current cell column
    pub current_col: u16,
    name_depth: Cell<u8>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(workbook: Option<&'a Workbook>, sheet: usize, row: u32, col: u16) -> Self {
        Self {
            workbook,
            current_sheet: sheet,
            current_row: row,
            current_col: col,
            name_depth: Cell::new(0),
        }
    }

    /// Create a simple context without workbook (for testing)
    pub fn simple() -> Self {
        Self::new(None, 0, 0, 0)
    }

    /// Whether the workbook uses the 1904 date system
    pub fn date_1904(&self) -> bool {
        self.workbook.map_or(false, |wb| wb.settings().date_1904)
    }

    fn sheet_index(&self, sheet: Option<&str>) -> Option<usize> {
        match sheet {
            Some(name) => self.workbook?.sheet_index(name),
            None => Some(self.current_sheet),
        }
    }

    /// Get a cell value from the workbook
    pub fn get_cell_value(&self, sheet: Option<&str>, row: u32, col: u16) -> FormulaValue {
        let Some(workbook) = self.workbook else {
            return FormulaValue::Empty;
        };
        match self.sheet_index(sheet).and_then(|idx| workbook.worksheet(idx)) {
            Some(ws) => ws.get_value_at(row, col).into(),
            None => FormulaValue::Error(CellError::Ref),
        }
    }

    /// Get a range of cell values as an array
    ///
    /// Ranges reaching past the sheet's used range (whole rows and columns)
    /// are clipped to it.
    pub fn get_range_values(&self, sheet: Option<&str>, range: &CellRange) -> FormulaValue {
        match self.sheet_index(sheet) {
            Some(idx) => self.range_values_on(idx, range),
            None => FormulaValue::Error(CellError::Ref),
        }
    }

    fn range_values_on(&self, sheet: usize, range: &CellRange) -> FormulaValue {
        let Some(workbook) = self.workbook else {
            return FormulaValue::Array(vec![]);
        };
        let Some(worksheet) = workbook.worksheet(sheet) else {
            return FormulaValue::Error(CellError::Ref);
        };
        let Some(used) = worksheet.used_range() else {
            return FormulaValue::Array(vec![]);
        };

        let end_row = range.end.row.min(used.end.row);
        let end_col = range.end.col.min(used.end.col);
        let mut rows = Vec::new();
        for row in range.start.row..=end_row {
            let mut cols = Vec::new();
            for col in range.start.col..=end_col {
                cols.push(worksheet.get_value_at(row, col).into());
            }
            rows.push(cols);
        }

        FormulaValue::Array(rows)
    }

    /// Resolve a defined name to its value
    ///
    /// `refers_to` may be a reference, a constant, or a formula; it is parsed
    /// and evaluated in this context. Unknown names are `#NAME?`.
    pub fn resolve_named_range(&self, name: &NameReference) -> FormulaResult<FormulaValue> {
        match self.name_expression(name) {
            Some(expr) => self.with_name_depth(|| evaluate(&expr, self)),
            None => Ok(FormulaValue::Error(CellError::Name)),
        }
    }

    pub(crate) fn name_expression(&self, name: &NameReference) -> Option<FormulaExpr> {
        let workbook = self.workbook?;
        let names = workbook.named_ranges();
        let named = match &name.sheet {
            Some(sheet) => {
                let idx = workbook.sheet_index(sheet)?;
                names.get_exact(&name.name, &NameScope::Sheet(idx))?
            }
            None => names.get(&name.name, self.current_sheet)?,
        };
        match parse_formula(&named.refers_to) {
            Ok(expr) => Some(expr),
            Err(e) => {
                log::debug!("name '{}' does not parse: {}", named.name, e);
                None
            }
        }
    }

    fn with_name_depth(
        &self,
        f: impl FnOnce() -> FormulaResult<FormulaValue>,
    ) -> FormulaResult<FormulaValue> {
        let depth = self.name_depth.get();
        if depth >= MAX_NAME_DEPTH {
            return Ok(FormulaValue::Error(CellError::Name));
        }
        self.name_depth.set(depth + 1);
        let result = f();
        self.name_depth.set(depth);
        result
    }

    /// Areas denoted by a reference expression, or `None` if the expression
    /// is not a reference
    pub fn reference_areas(&self, expr: &FormulaExpr) -> Option<ReferenceAreas> {
        match expr {
            FormulaExpr::CellRef(r) => Some(ReferenceAreas {
                sheet: self.sheet_index(r.sheet.as_deref())?,
                ranges: vec![CellRange::single(r.address)],
            }),
            FormulaExpr::RangeRef(r) => Some(ReferenceAreas {
                sheet: self.sheet_index(r.sheet.as_deref())?,
                ranges: vec![r.range],
            }),
            FormulaExpr::NameRef(name) => {
                let depth = self.name_depth.get();
                if depth >= MAX_NAME_DEPTH {
                    return None;
                }
                let target = self.name_expression(name)?;
                self.name_depth.set(depth + 1);
                let areas = self.reference_areas(&target);
                self.name_depth.set(depth);
                areas
            }
            FormulaExpr::BinaryOp { op, left, right } => {
                let left = self.reference_areas(left)?;
                let right = self.reference_areas(right)?;
                if left.sheet != right.sheet {
                    return None;
                }
                match op {
                    BinaryOperator::Union => {
                        let mut ranges = left.ranges;
                        ranges.extend(right.ranges);
                        Some(ReferenceAreas {
                            sheet: left.sheet,
                            ranges,
                        })
                    }
                    BinaryOperator::Range => {
                        let all: Vec<&CellRange> =
                            left.ranges.iter().chain(right.ranges.iter()).collect();
                        let start_row = all.iter().map(|r| r.start.row).min()?;
                        let start_col = all.iter().map(|r| r.start.col).min()?;
                        let end_row = all.iter().map(|r| r.end.row).max()?;
                        let end_col = all.iter().map(|r| r.end.col).max()?;
                        Some(ReferenceAreas {
                            sheet: left.sheet,
                            ranges: vec![CellRange::from_indices(
                                start_row, start_col, end_row, end_col,
                            )],
                        })
                    }
                    BinaryOperator::Intersect => {
                        let ranges = left
                            .ranges
                            .iter()
                            .flat_map(|a| right.ranges.iter().filter_map(move |b| a.intersect(b)))
                            .collect();
                        Some(ReferenceAreas {
                            sheet: left.sheet,
                            ranges,
                        })
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn areas_value(&self, areas: &ReferenceAreas) -> FormulaValue {
        match areas.ranges.as_slice() {
            [] => FormulaValue::Error(CellError::Null),
            [single] if single.is_single_cell() => {
                let Some(ws) = self.workbook.and_then(|wb| wb.worksheet(areas.sheet)) else {
                    return FormulaValue::Error(CellError::Ref);
                };
                ws.get_value_at(single.start.row, single.start.col).into()
            }
            [single] => self.range_values_on(areas.sheet, single),
            many => {
                let mut values = Vec::new();
                for range in many {
                    match self.range_values_on(areas.sheet, range) {
                        FormulaValue::Array(rows) => values.extend(rows.into_iter().flatten()),
                        other => values.push(other),
                    }
                }
                FormulaValue::Array(vec![values])
            }
        }
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),
        FormulaExpr::Missing => Ok(FormulaValue::Empty),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => Ok(ctx.get_cell_value(
            cell_ref.sheet.as_deref(),
            cell_ref.address.row,
            cell_ref.address.col,
        )),

        FormulaExpr::RangeRef(range_ref) => {
            Ok(ctx.get_range_values(range_ref.sheet.as_deref(), &range_ref.range))
        }

        FormulaExpr::NameRef(name) => ctx.resolve_named_range(name),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate(expr, ctx)?);
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(result_rows))
        }
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    if matches!(
        op,
        BinaryOperator::Range | BinaryOperator::Union | BinaryOperator::Intersect
    ) {
        let node = FormulaExpr::binary(op, left.clone(), right.clone());
        return Ok(match ctx.reference_areas(&node) {
            Some(areas) => ctx.areas_value(&areas),
            None if op == BinaryOperator::Intersect => FormulaValue::Error(CellError::Null),
            None => FormulaValue::Error(CellError::Value),
        });
    }

    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    Ok(apply_binary(op, &left_val, &right_val))
}

fn apply_binary(op: BinaryOperator, left: &FormulaValue, right: &FormulaValue) -> FormulaValue {
    let arithmetic = |f: fn(f64, f64) -> FormulaValue| match (left.to_number(), right.to_number())
    {
        (Err(e), _) | (_, Err(e)) => FormulaValue::Error(e),
        (Ok(l), Ok(r)) => f(l, r),
    };

    match op {
        BinaryOperator::Add => arithmetic(|l, r| FormulaValue::Number(l + r)),
        BinaryOperator::Subtract => arithmetic(|l, r| FormulaValue::Number(l - r)),
        BinaryOperator::Multiply => arithmetic(|l, r| FormulaValue::Number(l * r)),
        BinaryOperator::Divide => arithmetic(|l, r| {
            if r == 0.0 {
                FormulaValue::Error(CellError::Div0)
            } else {
                FormulaValue::Number(l / r)
            }
        }),
        BinaryOperator::Power => arithmetic(|l, r| {
            if l == 0.0 && r == 0.0 {
                return FormulaValue::Error(CellError::Num);
            }
            if l == 0.0 && r < 0.0 {
                return FormulaValue::Error(CellError::Div0);
            }
            let result = l.powf(r);
            if result.is_finite() {
                FormulaValue::Number(result)
            } else {
                FormulaValue::Error(CellError::Num)
            }
        }),

        BinaryOperator::Concat => match (left.to_text(), right.to_text()) {
            (Err(e), _) | (_, Err(e)) => FormulaValue::Error(e),
            (Ok(l), Ok(r)) => FormulaValue::String(l + &r),
        },

        comparison => {
            let (l, r) = (left.scalar(), right.scalar());
            if let Some(e) = l.get_error().or_else(|| r.get_error()) {
                return FormulaValue::Error(e);
            }
            let ord = compare_values(&l, &r);
            FormulaValue::Boolean(match comparison {
                BinaryOperator::Equal => ord == Ordering::Equal,
                BinaryOperator::NotEqual => ord != Ordering::Equal,
                BinaryOperator::LessThan => ord == Ordering::Less,
                BinaryOperator::LessEqual => ord != Ordering::Greater,
                BinaryOperator::GreaterThan => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
    }
}

/// Blank cells and empty text, as COUNTBLANK sees them
pub(crate) fn is_blank(value: &FormulaValue) -> bool {
    match value {
        FormulaValue::Empty => true,
        FormulaValue::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Compare two values the way Excel's comparison operators do
///
/// Blank takes the type of the other side. Numbers sort before text, text
/// before booleans; text compares case-insensitively.
pub(crate) fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    fn blank_like(other: &FormulaValue) -> FormulaValue {
        match other {
            FormulaValue::String(_) => FormulaValue::String(String::new()),
            FormulaValue::Boolean(_) => FormulaValue::Boolean(false),
            _ => FormulaValue::Number(0.0),
        }
    }
    let left = match left {
        FormulaValue::Empty => blank_like(right),
        v => v.clone(),
    };
    let right = match right {
        FormulaValue::Empty => blank_like(&left),
        v => v.clone(),
    };

    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) => 0,
            FormulaValue::String(_) => 1,
            FormulaValue::Boolean(_) => 2,
            _ => 3,
        }
    }

    match (&left, &right) {
        (FormulaValue::Number(l), FormulaValue::Number(r)) => {
            l.partial_cmp(r).unwrap_or(Ordering::Equal)
        }
        (FormulaValue::String(l), FormulaValue::String(r)) => {
            l.to_lowercase().cmp(&r.to_lowercase())
        }
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => l.cmp(r),
        (FormulaValue::Error(l), FormulaValue::Error(r)) => l.code().cmp(&r.code()),
        (l, r) => rank(l).cmp(&rank(r)),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?;

    if op == UnaryOperator::Plus {
        return Ok(val);
    }

    Ok(match val.to_number() {
        Err(e) => FormulaValue::Error(e),
        Ok(n) if op == UnaryOperator::Negate => FormulaValue::Number(-n),
        Ok(n) => FormulaValue::Number(n / 100.0),
    })
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let registry = function_registry();

    let Some(func) = registry.get(name) else {
        return Ok(FormulaValue::Error(CellError::Name));
    };

    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }

    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    if let Some(value) = evaluate_reference_function(func.name, args, ctx) {
        return Ok(value);
    }

    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, ctx)?);
    }

    (func.implementation)(&evaluated_args, ctx)
}

/// Functions that look at a reference itself rather than at its values
fn evaluate_reference_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> Option<FormulaValue> {
    let first_area = || {
        ctx.reference_areas(args.first()?)
            .and_then(|areas| areas.ranges.first().copied())
    };

    match name {
        "ROW" if args.is_empty() => Some(FormulaValue::Number(ctx.current_row as f64 + 1.0)),
        "COLUMN" if args.is_empty() => Some(FormulaValue::Number(ctx.current_col as f64 + 1.0)),
        "ROW" => first_area().map(|r| FormulaValue::Number(r.start.row as f64 + 1.0)),
        "COLUMN" => first_area().map(|r| FormulaValue::Number(r.start.col as f64 + 1.0)),
        "ROWS" => first_area().map(|r| FormulaValue::Number(r.row_count() as f64)),
        "COLUMNS" => first_area().map(|r| FormulaValue::Number(r.col_count() as f64)),
        "COUNTBLANK" => {
            let areas = ctx.reference_areas(args.first()?)?;
            let total: u64 = areas.ranges.iter().map(CellRange::cell_count).sum();
            let present = ctx
                .areas_value(&areas)
                .flatten()
                .into_iter()
                .filter(|v| !is_blank(v))
                .count() as u64;
            Some(FormulaValue::Number(total.saturating_sub(present) as f64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        let ast = parse_formula(formula)?;
        let ctx = EvaluationContext::simple();
        evaluate(&ast, &ctx)
    }

    fn eval_in(wb: &Workbook, formula: &str) -> FormulaValue {
        let ast = parse_formula(formula).unwrap();
        let ctx = EvaluationContext::new(Some(wb), 0, 4, 2);
        evaluate(&ast, &ctx).unwrap()
    }

    fn sample_workbook() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, n) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            ws.set_cell_value_at(row as u32, 0, *n).unwrap();
            ws.set_cell_value_at(row as u32, 1, *n * 10.0).unwrap();
        }
        ws.set_cell_value_at(0, 3, "text").unwrap();
        wb.add_worksheet_with_name("Data Sheet").unwrap();
        wb.worksheet_mut(1)
            .unwrap()
            .set_cell_value_at(0, 0, 100.0)
            .unwrap();
        wb.define_name("Rate", "0.5").unwrap();
        wb.define_name("Values", "Sheet1!$A$1:$A$4").unwrap();
        wb.define_name("Loop", "Loop+1").unwrap();
        wb
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("=42").unwrap(), FormulaValue::Number(42.0));
        assert_eq!(eval("=\"Hello\"").unwrap(), FormulaValue::String("Hello".into()));
        assert_eq!(eval("=TRUE").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=#VALUE!").unwrap(), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_evaluate_arithmetic_and_precedence() {
        assert_eq!(eval("=1+2*3").unwrap(), FormulaValue::Number(7.0));
        assert_eq!(eval("=(1+2)*3").unwrap(), FormulaValue::Number(9.0));
        assert_eq!(eval("=2^10").unwrap(), FormulaValue::Number(1024.0));
        assert_eq!(eval("=-2^2").unwrap(), FormulaValue::Number(4.0));
        assert_eq!(eval("=2^3^2").unwrap(), FormulaValue::Number(64.0));
        assert_eq!(eval("=50%").unwrap(), FormulaValue::Number(0.5));
        assert_eq!(eval("=--5").unwrap(), FormulaValue::Number(5.0));
        assert_eq!(eval("=+\"7\"").unwrap(), FormulaValue::String("7".into()));
    }

    #[test]
    fn test_operator_coercion() {
        assert_eq!(eval("=\"3\"+4").unwrap(), FormulaValue::Number(7.0));
        assert_eq!(eval("=TRUE+1").unwrap(), FormulaValue::Number(2.0));
        assert_eq!(eval("=\"abc\"+1").unwrap(), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=1/0").unwrap(), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=#N/A+1").unwrap(), FormulaValue::Error(CellError::Na));
        assert_eq!(
            eval("=\"Value: \"&42").unwrap(),
            FormulaValue::String("Value: 42".into())
        );
        assert_eq!(eval("=0.1+0.2&\"\"").unwrap(), FormulaValue::String("0.3".into()));
    }

    #[test]
    fn test_comparison_rules() {
        assert_eq!(eval("=1<2").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=\"a\"=\"A\"").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=1<\"a\"").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=\"z\"<TRUE").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=5<>5").unwrap(), FormulaValue::Boolean(false));
    }

    #[test]
    fn test_unknown_function_is_name_error() {
        assert_eq!(eval("=NOSUCHFN(1)").unwrap(), FormulaValue::Error(CellError::Name));
    }

    #[test]
    fn test_argument_count_is_checked() {
        assert!(matches!(
            eval("=ABS(1,2)"),
            Err(FormulaError::ArgumentCount { .. })
        ));
    }

    #[test]
    fn test_cell_range_and_sheet_references() {
        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=A2*2"), FormulaValue::Number(4.0));
        assert_eq!(eval_in(&wb, "=SUM(A1:B4)"), FormulaValue::Number(110.0));
        assert_eq!(eval_in(&wb, "=SUM(A:A)"), FormulaValue::Number(10.0));
        assert_eq!(eval_in(&wb, "='Data Sheet'!A1+1"), FormulaValue::Number(101.0));
        assert_eq!(eval_in(&wb, "=Missing!A1"), FormulaValue::Error(CellError::Ref));
        assert_eq!(eval_in(&wb, "=Z100"), FormulaValue::Empty);
    }

    #[test]
    fn test_names_resolve_through_workbook() {
        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=Rate*10"), FormulaValue::Number(5.0));
        assert_eq!(eval_in(&wb, "=SUM(Values)"), FormulaValue::Number(10.0));
        assert_eq!(eval_in(&wb, "=Unknown"), FormulaValue::Error(CellError::Name));
        assert_eq!(eval_in(&wb, "=Loop"), FormulaValue::Error(CellError::Name));
    }

    #[test]
    fn test_intersection_and_union() {
        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=A1:B4 B2:C3"), FormulaValue::Array(vec![
            vec![FormulaValue::Number(20.0)],
            vec![FormulaValue::Number(30.0)],
        ]));
        assert_eq!(eval_in(&wb, "=A1:A2 B3:B4"), FormulaValue::Error(CellError::Null));
        assert_eq!(eval_in(&wb, "=A2:B2 B1:B4"), FormulaValue::Number(20.0));
        assert_eq!(eval_in(&wb, "=SUM((A1,B4,A2:A3))"), FormulaValue::Number(46.0));
    }

    #[test]
    fn test_reference_functions() {
        let wb = sample_workbook();
        assert_eq!(eval_in(&wb, "=ROW()"), FormulaValue::Number(5.0));
        assert_eq!(eval_in(&wb, "=COLUMN()"), FormulaValue::Number(3.0));
        assert_eq!(eval_in(&wb, "=ROW(B7)"), FormulaValue::Number(7.0));
        assert_eq!(eval_in(&wb, "=ROWS(A:A)"), FormulaValue::Number(65536.0));
        assert_eq!(eval_in(&wb, "=COLUMNS(A1:D1)"), FormulaValue::Number(4.0));
        assert_eq!(eval("=ROWS({1,2;3,4;5,6})").unwrap(), FormulaValue::Number(3.0));
    }

    #[test]
    fn test_array_results_collapse_for_cells() {
        let v: CellValue = FormulaValue::Array(vec![vec![FormulaValue::Number(1.0)]]).into();
        assert_eq!(v, CellValue::Number(1.0));
        let v: CellValue = FormulaValue::Number(f64::INFINITY).into();
        assert_eq!(v, CellValue::Error(CellError::Num));
    }
}

//! BIFF8 tokens → formula text

use super::function_table::{function_by_index, FUNCTION_ADDIN};
use super::{AreaAddress, ArrayConstant, AttrPtg, Ptg, RefAddress};
use crate::ast::{
    BinaryOperator, CellReference, FormulaExpr, NameReference, RangeReference, UnaryOperator,
};
use crate::error::{FormulaError, FormulaResult};
use binsheets_core::{CellAddress, CellError, CellRange, MAX_COLS, MAX_ROWS};

/// Workbook lookups needed to turn tokens back into text
pub trait FormulaRenderingWorkbook {
    /// Sheet name of an EXTERNSHEET entry
    fn sheet_name(&self, extern_sheet: u16) -> Option<String>;

    /// Defined name for a 1-based NAME record index
    fn defined_name(&self, index: u16) -> Option<NameReference>;

    /// Name of an EXTERNNAME (add-in function or external name)
    fn external_name(&self, extern_sheet: u16, index: u16) -> Option<String>;
}

/// Render tokens as formula text without the leading `=`
///
/// `base_row` and `base_col` are the cell the formula is used in; `RefN` and
/// `AreaN` offsets resolve against it.
pub fn render(
    ptgs: &[Ptg],
    workbook: &dyn FormulaRenderingWorkbook,
    base_row: u32,
    base_col: u16,
) -> FormulaResult<String> {
    to_expr(ptgs, workbook, base_row, base_col).map(|expr| expr.to_string())
}

/// Rebuild the formula tree from tokens
pub fn to_expr(
    ptgs: &[Ptg],
    workbook: &dyn FormulaRenderingWorkbook,
    base_row: u32,
    base_col: u16,
) -> FormulaResult<FormulaExpr> {
    let mut stack: Vec<FormulaExpr> = Vec::new();

    for ptg in ptgs {
        let expr = match ptg {
            Ptg::Exp { row, col } | Ptg::Tbl { row, col } => {
                return Err(FormulaError::Token(format!(
                    "formula refers to a shared formula or table at R{}C{}",
                    row + 1,
                    col + 1
                )))
            }
            op if op.is_binary_operator() => {
                let right = pop(&mut stack)?;
                let left = pop(&mut stack)?;
                FormulaExpr::binary(binary_operator(op), left, right)
            }
            Ptg::Uplus | Ptg::Uminus | Ptg::Percent => {
                let operand = pop(&mut stack)?;
                let op = match ptg {
                    Ptg::Uplus => UnaryOperator::Plus,
                    Ptg::Uminus => UnaryOperator::Negate,
                    _ => UnaryOperator::Percent,
                };
                FormulaExpr::unary(op, operand)
            }
            // grouping is implied by the tree
            Ptg::Paren => continue,
            Ptg::MissArg => FormulaExpr::Missing,
            Ptg::Str(s) => FormulaExpr::String(s.clone()),
            Ptg::Err(e) => FormulaExpr::Error(*e),
            Ptg::Bool(b) => FormulaExpr::Boolean(*b),
            Ptg::Int(n) => FormulaExpr::Number(*n as f64),
            Ptg::Num(n) => FormulaExpr::Number(*n),
            Ptg::Array { values, .. } => FormulaExpr::Array(
                values
                    .iter()
                    .map(|row| row.iter().map(array_expr).collect())
                    .collect(),
            ),

            Ptg::Attr(AttrPtg::Sum) => {
                let arg = pop(&mut stack)?;
                FormulaExpr::Function {
                    name: "SUM".into(),
                    args: vec![arg],
                }
            }
            Ptg::Attr(_) => continue,
            Ptg::Func { index, .. } => {
                let meta = function_by_index(*index).ok_or_else(|| unknown_function(*index))?;
                let args = pop_n(&mut stack, meta.min_args as usize)?;
                FormulaExpr::Function {
                    name: meta.name.into(),
                    args,
                }
            }
            Ptg::FuncVar {
                arg_count, index, ..
            } => {
                let mut args = pop_n(&mut stack, *arg_count as usize)?;
                let name = if *index == FUNCTION_ADDIN {
                    if args.is_empty() {
                        return Err(FormulaError::Token(
                            "add-in function call without a name".into(),
                        ));
                    }
                    match args.remove(0) {
                        FormulaExpr::NameRef(name) => name.name,
                        _ => CellError::Name.as_str().to_string(),
                    }
                } else {
                    function_by_index(*index)
                        .ok_or_else(|| unknown_function(*index))?
                        .name
                        .to_string()
                };
                FormulaExpr::Function { name, args }
            }

            Ptg::Name { index, .. } => match workbook.defined_name(*index) {
                Some(name) => FormulaExpr::NameRef(name),
                None => FormulaExpr::Error(CellError::Name),
            },
            Ptg::NameX {
                extern_sheet,
                index,
                ..
            } => match workbook.external_name(*extern_sheet, *index) {
                Some(name) => FormulaExpr::NameRef(NameReference::new(name)),
                None => FormulaExpr::Error(CellError::Name),
            },

            Ptg::Ref { address, .. } => cell_ref(None, absolute_position(address), address),
            Ptg::RefN { address, .. } => {
                cell_ref(None, address.resolve_offset(base_row, base_col), address)
            }
            Ptg::Area { area, .. } => range_ref(
                None,
                absolute_position(&area.first),
                absolute_position(&area.last),
                area,
            ),
            Ptg::AreaN { area, .. } => range_ref(
                None,
                area.first.resolve_offset(base_row, base_col),
                area.last.resolve_offset(base_row, base_col),
                area,
            ),
            Ptg::Ref3d {
                extern_sheet,
                address,
                ..
            } => match workbook.sheet_name(*extern_sheet) {
                Some(sheet) => cell_ref(Some(sheet), absolute_position(address), address),
                None => FormulaExpr::Error(CellError::Ref),
            },
            Ptg::Area3d {
                extern_sheet, area, ..
            } => match workbook.sheet_name(*extern_sheet) {
                Some(sheet) => range_ref(
                    Some(sheet),
                    absolute_position(&area.first),
                    absolute_position(&area.last),
                    area,
                ),
                None => FormulaExpr::Error(CellError::Ref),
            },
            Ptg::RefErr { .. }
            | Ptg::AreaErr { .. }
            | Ptg::RefErr3d { .. }
            | Ptg::AreaErr3d { .. } => FormulaExpr::Error(CellError::Ref),

            // the tokens of the subexpression follow in the stream
            Ptg::MemArea { .. } | Ptg::MemErr { .. } | Ptg::MemNoMem { .. } | Ptg::MemFunc { .. } => {
                continue
            }
            other => {
                return Err(FormulaError::Token(format!(
                    "unexpected token {:?}",
                    other
                )))
            }
        };
        stack.push(expr);
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(expr), true) => Ok(expr),
        (None, _) => Err(FormulaError::Token("empty formula".into())),
        (Some(_), false) => Err(FormulaError::Token(format!(
            "{} operands left over",
            stack.len()
        ))),
    }
}

fn pop(stack: &mut Vec<FormulaExpr>) -> FormulaResult<FormulaExpr> {
    stack
        .pop()
        .ok_or_else(|| FormulaError::Token("operator is missing an operand".into()))
}

fn pop_n(stack: &mut Vec<FormulaExpr>, n: usize) -> FormulaResult<Vec<FormulaExpr>> {
    if stack.len() < n {
        return Err(FormulaError::Token(format!(
            "function needs {} arguments, {} available",
            n,
            stack.len()
        )));
    }
    Ok(stack.split_off(stack.len() - n))
}

fn unknown_function(index: u16) -> FormulaError {
    FormulaError::Token(format!("unknown built-in function index {}", index))
}

fn binary_operator(ptg: &Ptg) -> BinaryOperator {
    match ptg {
        Ptg::Add => BinaryOperator::Add,
        Ptg::Sub => BinaryOperator::Subtract,
        Ptg::Mul => BinaryOperator::Multiply,
        Ptg::Div => BinaryOperator::Divide,
        Ptg::Power => BinaryOperator::Power,
        Ptg::Concat => BinaryOperator::Concat,
        Ptg::Lt => BinaryOperator::LessThan,
        Ptg::Le => BinaryOperator::LessEqual,
        Ptg::Eq => BinaryOperator::Equal,
        Ptg::Ge => BinaryOperator::GreaterEqual,
        Ptg::Gt => BinaryOperator::GreaterThan,
        Ptg::Ne => BinaryOperator::NotEqual,
        Ptg::Isect => BinaryOperator::Intersect,
        Ptg::Union => BinaryOperator::Union,
        _ => BinaryOperator::Range,
    }
}

fn array_expr(value: &ArrayConstant) -> FormulaExpr {
    match value {
        ArrayConstant::Empty => FormulaExpr::String(String::new()),
        ArrayConstant::Number(n) => FormulaExpr::Number(*n),
        ArrayConstant::String(s) => FormulaExpr::String(s.clone()),
        ArrayConstant::Boolean(b) => FormulaExpr::Boolean(*b),
        ArrayConstant::Error(e) => FormulaExpr::Error(*e),
    }
}

fn absolute_position(address: &RefAddress) -> (u32, u16) {
    (address.row as u32, address.col & 0xFF)
}

fn cell_address((row, col): (u32, u16), flags: &RefAddress) -> CellAddress {
    CellAddress::with_absolute(row, col, !flags.row_relative, !flags.col_relative)
}

fn cell_ref(sheet: Option<String>, position: (u32, u16), flags: &RefAddress) -> FormulaExpr {
    FormulaExpr::CellRef(CellReference {
        sheet,
        address: cell_address(position, flags),
    })
}

/// Areas spanning every row or column come back as `A:A` or `1:1`
fn range_ref(
    sheet: Option<String>,
    first: (u32, u16),
    last: (u32, u16),
    area: &AreaAddress,
) -> FormulaExpr {
    let mut start = cell_address(first, &area.first);
    let mut end = cell_address(last, &area.last);
    if start.row == 0 && end.row == MAX_ROWS - 1 {
        start.row_absolute = true;
        end.row_absolute = true;
    } else if start.col == 0 && end.col == MAX_COLS - 1 {
        start.col_absolute = true;
        end.col_absolute = true;
    }
    FormulaExpr::RangeRef(RangeReference {
        sheet,
        range: CellRange::new(start, end),
    })
}

//! Information functions

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use binsheets_core::CellError;

type Ret = FormulaResult<FormulaValue>;

/// Test the single value of the argument
fn is(args: &[FormulaValue], test: fn(&FormulaValue) -> bool) -> Ret {
    Ok(FormulaValue::Boolean(test(&args[0].scalar())))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    is(args, |v| matches!(v, FormulaValue::Empty))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    is(args, |v| matches!(v, FormulaValue::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    is(args, |v| matches!(v, FormulaValue::String(_)))
}

/// ISNONTEXT(value)
pub fn fn_isnontext(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    is(args, |v| !matches!(v, FormulaValue::String(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    is(args, |v| matches!(v, FormulaValue::Boolean(_)))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    is(args, FormulaValue::is_error)
}

/// ISERR(value) - any error except #N/A
pub fn fn_iserr(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    is(args, |v| v.is_error() && v.get_error() != Some(CellError::Na))
}

/// ISNA(value)
pub fn fn_isna(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    is(args, |v| v.get_error() == Some(CellError::Na))
}

/// NA()
pub fn fn_na(_args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::Error(CellError::Na))
}

/// ERROR.TYPE(error_val) - 1 for #NULL! through 7 for #N/A
pub fn fn_error_type(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(match args[0].scalar() {
        FormulaValue::Error(e) => FormulaValue::Number(e.type_number() as f64),
        _ => FormulaValue::Error(CellError::Na),
    })
}

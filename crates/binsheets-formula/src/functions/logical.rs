//! Logical functions

use super::arg;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use binsheets_core::CellError;

type Ret = FormulaResult<FormulaValue>;

/// Truth value of a condition; text other than TRUE/FALSE is `#VALUE!`
fn condition(value: &FormulaValue) -> Result<bool, CellError> {
    match value.scalar() {
        FormulaValue::Error(e) => Err(e),
        v => v.as_bool().ok_or(CellError::Value),
    }
}

/// IF(condition, value_if_true, [value_if_false])
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    if try_value!(condition(&args[0])) {
        Ok(args[1].clone())
    } else {
        Ok(args
            .get(2)
            .cloned()
            .unwrap_or(FormulaValue::Boolean(false)))
    }
}

/// Fold the logical values of the arguments
///
/// Text and blanks inside ranges are ignored; text given directly is
/// `#VALUE!`. With nothing to fold the result is `#VALUE!`.
fn fold_logical(args: &[FormulaValue], init: bool, op: fn(bool, bool) -> bool) -> Ret {
    let mut acc = init;
    let mut seen = false;
    for value in args {
        match value {
            FormulaValue::Array(rows) => {
                for v in rows.iter().flatten() {
                    match v {
                        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
                        FormulaValue::Boolean(b) => acc = op(acc, *b),
                        FormulaValue::Number(n) => acc = op(acc, *n != 0.0),
                        _ => continue,
                    }
                    seen = true;
                }
            }
            FormulaValue::Empty => {}
            scalar => {
                acc = op(acc, try_value!(condition(scalar)));
                seen = true;
            }
        }
    }
    if seen {
        Ok(FormulaValue::Boolean(acc))
    } else {
        Ok(FormulaValue::Error(CellError::Value))
    }
}

/// AND(logical1, [logical2], ...)
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    fold_logical(args, true, |a, b| a && b)
}

/// OR(logical1, [logical2], ...)
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    fold_logical(args, false, |a, b| a || b)
}

/// NOT(logical)
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::Boolean(!try_value!(condition(&args[0]))))
}

/// TRUE()
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE()
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::Boolean(false))
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    if args[0].is_error() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

/// IFNA(value, value_if_na)
pub fn fn_ifna(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    if args[0].get_error() == Some(CellError::Na) {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

/// CHOOSE(index_num, value1, [value2], ...)
pub fn fn_choose(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let index = try_value!(args[0].to_number()).trunc();
    if index < 1.0 || index >= args.len() as f64 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    Ok(arg(args, index as usize).clone())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, num, text};
    use crate::evaluator::FormulaValue;
    use binsheets_core::CellError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_if() {
        assert_eq!(eval("=IF(TRUE,\"yes\",\"no\")"), text("yes"));
        assert_eq!(eval("=IF(0,\"yes\",\"no\")"), text("no"));
        assert_eq!(eval("=IF(1>2,\"yes\")"), FormulaValue::Boolean(false));
        assert_eq!(eval("=IF(\"maybe\",1,2)"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=IF(#N/A,1,2)"), FormulaValue::Error(CellError::Na));
        assert_eq!(eval("=IF(TRUE,1,1/0)"), num(1.0));
    }

    #[test]
    fn test_and_or_not() {
        assert_eq!(eval("=AND(TRUE,1,2>1)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=AND(TRUE,0)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE,{0,1})"), FormulaValue::Boolean(true));
        assert_eq!(eval("=OR({\"a\"})"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=AND(\"x\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=NOT(FALSE)"), FormulaValue::Boolean(true));
    }

    #[test]
    fn test_error_handlers() {
        assert_eq!(eval("=IFERROR(1/0,\"div\")"), text("div"));
        assert_eq!(eval("=IFERROR(5,\"div\")"), num(5.0));
        assert_eq!(eval("=IFNA(NA(),0)"), num(0.0));
        assert_eq!(eval("=IFNA(1/0,0)"), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_choose() {
        assert_eq!(eval("=CHOOSE(2,\"a\",\"b\",\"c\")"), text("b"));
        assert_eq!(eval("=CHOOSE(4,\"a\",\"b\",\"c\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=CHOOSE(1.9,\"a\",\"b\")"), text("a"));
    }
}

//! Statistical functions

use super::math::{criteria_pairs, matching_indices, numbers_at};
use super::{arg, collect_numbers};
use crate::error::FormulaResult;
use crate::evaluator::{is_blank, EvaluationContext, FormulaValue};
use binsheets_core::CellError;

type Ret = FormulaResult<FormulaValue>;

fn mean(numbers: &[f64]) -> FormulaValue {
    if numbers.is_empty() {
        FormulaValue::Error(CellError::Div0)
    } else {
        FormulaValue::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
    }
}

/// AVERAGE(number1, [number2], ...)
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let numbers = try_value!(collect_numbers(args));
    Ok(mean(&numbers))
}

/// MIN(number1, [number2], ...) - 0 when there are no numbers
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let numbers = try_value!(collect_numbers(args));
    let min = numbers.into_iter().reduce(f64::min).unwrap_or(0.0);
    Ok(FormulaValue::Number(min))
}

/// MAX(number1, [number2], ...) - 0 when there are no numbers
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let numbers = try_value!(collect_numbers(args));
    let max = numbers.into_iter().reduce(f64::max).unwrap_or(0.0);
    Ok(FormulaValue::Number(max))
}

/// COUNT(value1, [value2], ...)
///
/// Counts numbers; direct arguments also count when they convert to one.
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let count = args
        .iter()
        .map(|value| match value {
            FormulaValue::Array(_) => value
                .flatten()
                .into_iter()
                .filter(|v| matches!(v, FormulaValue::Number(_)))
                .count(),
            FormulaValue::Number(_) | FormulaValue::Boolean(_) => 1,
            FormulaValue::String(s) if s.trim().parse::<f64>().is_ok() => 1,
            _ => 0,
        })
        .sum::<usize>();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA(value1, [value2], ...) - counts non-blank values, errors included
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let count = args
        .iter()
        .flat_map(FormulaValue::flatten)
        .filter(|v| !matches!(v, FormulaValue::Empty))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTBLANK(range) - blank cells and empty text
///
/// References are counted by the evaluator against their full size; this
/// handles array arguments.
pub fn fn_countblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let blanks = args[0].flatten().into_iter().filter(|v| is_blank(v)).count();
    Ok(FormulaValue::Number(blanks as f64))
}

/// COUNTIF(range, criteria)
pub fn fn_countif(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let indices = try_value!(matching_indices(&[(&args[0], &args[1])]));
    Ok(FormulaValue::Number(indices.len() as f64))
}

/// COUNTIFS(criteria_range1, criteria1, ...)
pub fn fn_countifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let pairs = try_value!(criteria_pairs(args, 0));
    let indices = try_value!(matching_indices(&pairs));
    Ok(FormulaValue::Number(indices.len() as f64))
}

/// AVERAGEIF(range, criteria, [average_range])
pub fn fn_averageif(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let range = &args[0];
    let average_range = match arg(args, 2) {
        FormulaValue::Empty => range,
        other => other,
    };
    let indices = try_value!(matching_indices(&[(range, &args[1])]));
    Ok(mean(&numbers_at(average_range, &indices)))
}

/// AVERAGEIFS(average_range, criteria_range1, criteria1, ...)
pub fn fn_averageifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let pairs = try_value!(criteria_pairs(args, 1));
    let indices = try_value!(matching_indices(&pairs));
    Ok(mean(&numbers_at(&args[0], &indices)))
}

fn sorted_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = collect_numbers(args)?;
    numbers.sort_by(|a, b| a.total_cmp(b));
    Ok(numbers)
}

/// MEDIAN(number1, [number2], ...)
pub fn fn_median(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let numbers = try_value!(sorted_numbers(args));
    let n = numbers.len();
    if n == 0 {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    let median = if n % 2 == 1 {
        numbers[n / 2]
    } else {
        (numbers[n / 2 - 1] + numbers[n / 2]) / 2.0
    };
    Ok(FormulaValue::Number(median))
}

/// k-th element of an ascending list, 1-based
fn kth(numbers: &[f64], k: f64) -> FormulaValue {
    let k = k.ceil();
    if k < 1.0 || k > numbers.len() as f64 {
        return FormulaValue::Error(CellError::Num);
    }
    FormulaValue::Number(numbers[k as usize - 1])
}

/// LARGE(array, k)
pub fn fn_large(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let mut numbers = try_value!(sorted_numbers(&args[..1]));
    numbers.reverse();
    let k = try_value!(args[1].to_number());
    Ok(kth(&numbers, k))
}

/// SMALL(array, k)
pub fn fn_small(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let numbers = try_value!(sorted_numbers(&args[..1]));
    let k = try_value!(args[1].to_number());
    Ok(kth(&numbers, k))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, eval_with, num};
    use crate::evaluator::FormulaValue;
    use binsheets_core::{CellError, Workbook};
    use pretty_assertions::assert_eq;

    fn scores() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 10.0).unwrap();
        ws.set_cell_value("A2", "n/a").unwrap();
        ws.set_cell_value("A3", 30.0).unwrap();
        ws.set_cell_value("A5", true).unwrap();
        ws.set_cell_value("B5", 1.0).unwrap();
        wb
    }

    #[test]
    fn test_average_min_max() {
        assert_eq!(eval("=AVERAGE(1,2,3,4)"), num(2.5));
        assert_eq!(eval("=MIN(5,-2,7)"), num(-2.0));
        assert_eq!(eval("=MAX({1,9;4,2})"), num(9.0));
        assert_eq!(eval("=AVERAGE({\"a\"})"), FormulaValue::Error(CellError::Div0));

        let wb = scores();
        assert_eq!(eval_with(&wb, "=AVERAGE(A1:A5)"), num(20.0));
        assert_eq!(eval_with(&wb, "=MAX(C1:C5)"), num(0.0));
    }

    #[test]
    fn test_counting() {
        let wb = scores();
        assert_eq!(eval_with(&wb, "=COUNT(A1:A5)"), num(2.0));
        assert_eq!(eval_with(&wb, "=COUNTA(A1:A5)"), num(4.0));
        assert_eq!(eval_with(&wb, "=COUNTBLANK(A1:A5)"), num(1.0));
        assert_eq!(eval_with(&wb, "=COUNTBLANK(A1:A10)"), num(6.0));
        assert_eq!(eval("=COUNT(1,\"2\",\"x\",TRUE)"), num(3.0));
        assert_eq!(eval("=COUNTBLANK({1,\"\",2})"), num(1.0));
    }

    #[test]
    fn test_conditional_aggregates() {
        let wb = scores();
        assert_eq!(eval_with(&wb, "=COUNTIF(A1:A5,\">15\")"), num(1.0));
        assert_eq!(eval_with(&wb, "=COUNTIFS(A1:A5,\">5\",A1:A5,\"<20\")"), num(1.0));
        assert_eq!(eval_with(&wb, "=AVERAGEIF(A1:A5,\">0\")"), num(20.0));
        assert_eq!(
            eval_with(&wb, "=AVERAGEIF(A1:A5,\">100\")"),
            FormulaValue::Error(CellError::Div0)
        );
        assert_eq!(
            eval_with(&wb, "=AVERAGEIFS(A1:A5,A1:A5,\"<>n/a\",A1:A5,\"<25\")"),
            num(10.0)
        );
    }

    #[test]
    fn test_order_statistics() {
        assert_eq!(eval("=MEDIAN(3,1,2)"), num(2.0));
        assert_eq!(eval("=MEDIAN(4,1,3,2)"), num(2.5));
        assert_eq!(eval("=LARGE({5,1,9,3},2)"), num(5.0));
        assert_eq!(eval("=SMALL({5,1,9,3},1)"), num(1.0));
        assert_eq!(eval("=SMALL({5,1},3)"), FormulaValue::Error(CellError::Num));
    }
}

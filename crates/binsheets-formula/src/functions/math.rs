//! Math and trigonometry functions

use super::criteria::CriteriaMatcher;
use super::{arg, collect_numbers, grid, number_or};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use binsheets_core::CellError;
use rand::Rng;

type Ret = FormulaResult<FormulaValue>;

fn number_result(n: f64) -> Ret {
    if n.is_finite() {
        Ok(FormulaValue::Number(n))
    } else {
        Ok(FormulaValue::Error(CellError::Num))
    }
}

/// Apply a one-argument numeric function
fn unary(args: &[FormulaValue], f: impl Fn(f64) -> Result<f64, CellError>) -> Ret {
    let x = try_value!(arg(args, 0).to_number());
    number_result(try_value!(f(x)))
}

/// SUM(number1, [number2], ...)
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let numbers = try_value!(collect_numbers(args));
    number_result(numbers.iter().sum())
}

/// PRODUCT(number1, [number2], ...)
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let numbers = try_value!(collect_numbers(args));
    if numbers.is_empty() {
        return Ok(FormulaValue::Number(0.0));
    }
    number_result(numbers.iter().product())
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.abs()))
}

/// INT(number) rounds down to the nearest integer
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.floor()))
}

/// Round half away from zero at `digits` decimal places
pub(crate) fn round_to(x: f64, digits: f64, mode: fn(f64) -> f64) -> f64 {
    let digits = digits.trunc() as i32;
    let factor = 10f64.powi(digits.abs());
    if digits >= 0 {
        // 2.675 * 100 is 267.49999999999997; Excel sees 15 digits
        mode(significant_15(x * factor)) / factor
    } else {
        mode(significant_15(x / factor)) * factor
    }
}

fn significant_15(x: f64) -> f64 {
    format!("{:.14e}", x).parse().unwrap_or(x)
}

fn round_half_away(x: f64) -> f64 {
    x.round()
}

fn round_away(x: f64) -> f64 {
    if x >= 0.0 {
        x.ceil()
    } else {
        x.floor()
    }
}

/// ROUND(number, num_digits)
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let x = try_value!(arg(args, 0).to_number());
    let digits = try_value!(arg(args, 1).to_number());
    number_result(round_to(x, digits, round_half_away))
}

/// ROUNDUP(number, num_digits) rounds away from zero
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let x = try_value!(arg(args, 0).to_number());
    let digits = try_value!(arg(args, 1).to_number());
    number_result(round_to(x, digits, round_away))
}

/// ROUNDDOWN(number, num_digits) rounds toward zero
pub fn fn_rounddown(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let x = try_value!(arg(args, 0).to_number());
    let digits = try_value!(arg(args, 1).to_number());
    number_result(round_to(x, digits, f64::trunc))
}

/// TRUNC(number, [num_digits])
pub fn fn_trunc(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let x = try_value!(arg(args, 0).to_number());
    let digits = try_value!(number_or(args, 1, 0.0));
    number_result(round_to(x, digits, f64::trunc))
}

/// MOD(number, divisor); the result has the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let n = try_value!(arg(args, 0).to_number());
    let d = try_value!(arg(args, 1).to_number());
    if d == 0.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    number_result(n - d * (n / d).floor())
}

/// SQRT(number)
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| {
        if x < 0.0 {
            Err(CellError::Num)
        } else {
            Ok(x.sqrt())
        }
    })
}

/// POWER(number, power)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let base = try_value!(arg(args, 0).to_number());
    let exp = try_value!(arg(args, 1).to_number());
    if base == 0.0 && exp == 0.0 {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    if base == 0.0 && exp < 0.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    number_result(base.powf(exp))
}

/// PI()
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

/// EXP(number)
pub fn fn_exp(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.exp()))
}

fn positive(x: f64) -> Result<f64, CellError> {
    if x <= 0.0 {
        Err(CellError::Num)
    } else {
        Ok(x)
    }
}

/// LN(number)
pub fn fn_ln(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| positive(x).map(f64::ln))
}

/// LOG(number, [base])
pub fn fn_log(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let x = try_value!(arg(args, 0).to_number().and_then(positive));
    let base = try_value!(number_or(args, 1, 10.0).and_then(positive));
    if base == 1.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    number_result(x.ln() / base.ln())
}

/// LOG10(number)
pub fn fn_log10(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| positive(x).map(f64::log10))
}

/// SIGN(number)
pub fn fn_sign(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| {
        Ok(if x > 0.0 {
            1.0
        } else if x < 0.0 {
            -1.0
        } else {
            0.0
        })
    })
}

/// RAND() - uniform in [0, 1)
pub fn fn_rand(_args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::Number(rand::thread_rng().gen::<f64>()))
}

/// SIN(number)
pub fn fn_sin(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.sin()))
}

/// COS(number)
pub fn fn_cos(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.cos()))
}

/// TAN(number)
pub fn fn_tan(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.tan()))
}

fn unit_interval(x: f64) -> Result<f64, CellError> {
    if (-1.0..=1.0).contains(&x) {
        Ok(x)
    } else {
        Err(CellError::Num)
    }
}

/// ASIN(number)
pub fn fn_asin(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| unit_interval(x).map(f64::asin))
}

/// ACOS(number)
pub fn fn_acos(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| unit_interval(x).map(f64::acos))
}

/// ATAN(number)
pub fn fn_atan(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.atan()))
}

/// ATAN2(x_num, y_num) - note Excel's argument order
pub fn fn_atan2(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let x = try_value!(arg(args, 0).to_number());
    let y = try_value!(arg(args, 1).to_number());
    if x == 0.0 && y == 0.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    number_result(y.atan2(x))
}

/// DEGREES(angle)
pub fn fn_degrees(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.to_degrees()))
}

/// RADIANS(angle)
pub fn fn_radians(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| Ok(x.to_radians()))
}

/// ODD(number) rounds away from zero to an odd integer
pub fn fn_odd(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| {
        let mut n = x.abs().ceil();
        if n % 2.0 == 0.0 {
            n += 1.0;
        }
        Ok(if x < 0.0 { -n } else { n })
    })
}

/// EVEN(number) rounds away from zero to an even integer
pub fn fn_even(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    unary(args, |x| {
        let mut n = x.abs().ceil();
        if n % 2.0 != 0.0 {
            n += 1.0;
        }
        Ok(if x < 0.0 { -n } else { n })
    })
}

/// SUMPRODUCT(array1, [array2], ...)
///
/// Arrays must share a shape; non-numeric entries count as zero.
pub fn fn_sumproduct(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let grids: Vec<_> = args.iter().map(grid).collect();
    let (first, rows, cols) = &grids[0];
    if grids.iter().any(|(_, r, c)| (r, c) != (rows, cols)) {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let mut total = 0.0;
    for i in 0..first.len() {
        let mut product = 1.0;
        for (values, _, _) in &grids {
            product *= match values[i] {
                FormulaValue::Number(n) => *n,
                FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
                _ => 0.0,
            };
        }
        total += product;
    }
    number_result(total)
}

/// Indices of cells in `range` matching every (range, criteria) pair
///
/// All ranges must have the same number of cells as the first one.
pub(crate) fn matching_indices(
    pairs: &[(&FormulaValue, &FormulaValue)],
) -> Result<Vec<usize>, CellError> {
    let mut selected: Option<Vec<usize>> = None;
    let mut size = None;
    for (range, criteria) in pairs {
        let (values, _, _) = grid(range);
        if *size.get_or_insert(values.len()) != values.len() {
            return Err(CellError::Value);
        }
        let matcher = CriteriaMatcher::new(criteria);
        let candidates = selected.unwrap_or_else(|| (0..values.len()).collect());
        selected = Some(
            candidates
                .into_iter()
                .filter(|&i| matcher.matches(values[i]))
                .collect(),
        );
    }
    Ok(selected.unwrap_or_default())
}

/// Criteria pairs of the *IFS functions, starting at `first`
pub(crate) fn criteria_pairs(
    args: &[FormulaValue],
    first: usize,
) -> Result<Vec<(&FormulaValue, &FormulaValue)>, CellError> {
    let rest = &args[first..];
    if rest.len() % 2 != 0 {
        return Err(CellError::Value);
    }
    Ok(rest.chunks(2).map(|pair| (&pair[0], &pair[1])).collect())
}

/// Numbers of `values` at `indices`, skipping non-numbers
pub(crate) fn numbers_at(values: &FormulaValue, indices: &[usize]) -> Vec<f64> {
    let (cells, _, _) = grid(values);
    indices
        .iter()
        .filter_map(|&i| match cells.get(i) {
            Some(FormulaValue::Number(n)) => Some(*n),
            _ => None,
        })
        .collect()
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let range = &args[0];
    let sum_range = match arg(args, 2) {
        FormulaValue::Empty => range,
        other => other,
    };
    let indices = try_value!(matching_indices(&[(range, &args[1])]));
    number_result(numbers_at(sum_range, &indices).iter().sum())
}

/// SUMIFS(sum_range, criteria_range1, criteria1, ...)
pub fn fn_sumifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let pairs = try_value!(criteria_pairs(args, 1));
    let indices = try_value!(matching_indices(&pairs));
    if grid(&args[0]).0.len() != grid(pairs[0].0).0.len() {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    number_result(numbers_at(&args[0], &indices).iter().sum())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, eval_with, num};
    use crate::evaluator::FormulaValue;
    use binsheets_core::{CellError, Workbook};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sum_and_product() {
        assert_eq!(eval("=SUM(1,2,3)"), num(6.0));
        assert_eq!(eval("=SUM({1,2;3,4})"), num(10.0));
        assert_eq!(eval("=SUM(\"2\",TRUE)"), num(3.0));
        assert_eq!(eval("=SUM({1,\"x\",TRUE})"), num(1.0));
        assert_eq!(eval("=SUM(\"x\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=PRODUCT(2,3,4)"), num(24.0));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(eval("=ROUND(2.675,2)"), num(2.68));
        assert_eq!(eval("=ROUND(-2.5,0)"), num(-3.0));
        assert_eq!(eval("=ROUND(1234.5,-2)"), num(1200.0));
        assert_eq!(eval("=ROUNDUP(3.14159,2)"), num(3.15));
        assert_eq!(eval("=ROUNDDOWN(-3.99,0)"), num(-3.0));
        assert_eq!(eval("=TRUNC(8.9)"), num(8.0));
        assert_eq!(eval("=INT(-8.9)"), num(-9.0));
    }

    #[test]
    fn test_mod_sign_follows_divisor() {
        assert_eq!(eval("=MOD(10,3)"), num(1.0));
        assert_eq!(eval("=MOD(-3,2)"), num(1.0));
        assert_eq!(eval("=MOD(3,-2)"), num(-1.0));
        assert_eq!(eval("=MOD(1,0)"), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_domain_errors() {
        assert_eq!(eval("=SQRT(-1)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=LN(0)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=LOG(8,2)"), num(3.0));
        assert_eq!(eval("=LOG(100)"), num(2.0));
        assert_eq!(eval("=ASIN(2)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=POWER(0,0)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=ATAN2(0,0)"), FormulaValue::Error(CellError::Div0));
    }

    #[test]
    fn test_odd_even_sign() {
        assert_eq!(eval("=ODD(1.5)"), num(3.0));
        assert_eq!(eval("=ODD(-2)"), num(-3.0));
        assert_eq!(eval("=EVEN(3)"), num(4.0));
        assert_eq!(eval("=EVEN(-1)"), num(-2.0));
        assert_eq!(eval("=SIGN(-4)"), num(-1.0));
        assert_eq!(eval("=DEGREES(PI())"), num(180.0));
    }

    #[test]
    fn test_rand_in_unit_interval() {
        match eval("=RAND()") {
            FormulaValue::Number(n) => assert!((0.0..1.0).contains(&n)),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_sumproduct() {
        assert_eq!(eval("=SUMPRODUCT({1,2,3},{4,5,6})"), num(32.0));
        assert_eq!(
            eval("=SUMPRODUCT({1,2},{1,2,3})"),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_sumif_and_sumifs() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, (fruit, qty, price)) in [("apple", 3.0, 1.0), ("pear", 5.0, 2.0), ("apple", 7.0, 3.0)]
            .iter()
            .enumerate()
        {
            ws.set_cell_value_at(row as u32, 0, *fruit).unwrap();
            ws.set_cell_value_at(row as u32, 1, *qty).unwrap();
            ws.set_cell_value_at(row as u32, 2, *price).unwrap();
        }
        assert_eq!(eval_with(&wb, "=SUMIF(A1:A3,\"apple\",B1:B3)"), num(10.0));
        assert_eq!(eval_with(&wb, "=SUMIF(B1:B3,\">4\")"), num(12.0));
        assert_eq!(
            eval_with(&wb, "=SUMIFS(B1:B3,A1:A3,\"a*\",C1:C3,\">1\")"),
            num(7.0)
        );
        assert_eq!(
            eval_with(&wb, "=SUMIFS(B1:B3,A1:A2,\"apple\")"),
            FormulaValue::Error(CellError::Value)
        );
    }
}

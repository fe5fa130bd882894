//! Lookup and reference functions
//!
//! ROW, COLUMN, ROWS and COLUMNS given a reference are answered by the
//! evaluator from the reference itself; the functions here handle arrays.

use super::criteria::wildcard_match;
use super::{arg, number_or};
use crate::error::FormulaResult;
use crate::evaluator::{compare_values, EvaluationContext, FormulaValue};
use binsheets_core::CellError;
use std::cmp::Ordering;

type Ret = FormulaResult<FormulaValue>;

/// Rows of an array argument; a scalar is a 1x1 table
fn table(value: &FormulaValue) -> Vec<Vec<FormulaValue>> {
    match value {
        FormulaValue::Array(rows) => rows.clone(),
        scalar => vec![vec![scalar.clone()]],
    }
}

fn same_kind(a: &FormulaValue, b: &FormulaValue) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Exact lookup equality: same type, text case-insensitive with wildcards
fn lookup_equals(needle: &FormulaValue, candidate: &FormulaValue) -> bool {
    match (needle, candidate) {
        (FormulaValue::String(n), FormulaValue::String(c)) => {
            wildcard_match(&n.to_lowercase(), &c.to_lowercase())
        }
        _ => same_kind(needle, candidate) && compare_values(needle, candidate) == Ordering::Equal,
    }
}

/// Position of the last value `<= needle` (or `>= needle` when descending)
/// in a sorted list; scanning stops at the first value past the needle
fn approximate_position(needle: &FormulaValue, values: &[&FormulaValue], descending: bool) -> Option<usize> {
    let mut found = None;
    for (i, value) in values.iter().enumerate() {
        if !same_kind(needle, value) {
            continue;
        }
        let ord = compare_values(value, needle);
        let past = if descending {
            ord == Ordering::Less
        } else {
            ord == Ordering::Greater
        };
        if past {
            break;
        }
        found = Some(i);
    }
    found
}

fn lookup_position(needle: &FormulaValue, values: &[&FormulaValue], approximate: bool) -> Option<usize> {
    if approximate {
        approximate_position(needle, values, false)
    } else {
        values.iter().position(|v| lookup_equals(needle, v))
    }
}

/// Range lookup flag: omitted means TRUE, present but blank means FALSE
fn approximate_flag(args: &[FormulaValue], i: usize) -> Result<bool, CellError> {
    match args.get(i).map(FormulaValue::scalar) {
        None => Ok(true),
        Some(FormulaValue::Error(e)) => Err(e),
        Some(FormulaValue::Empty) => Ok(false),
        Some(other) => other.as_bool().ok_or(CellError::Value),
    }
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
pub fn fn_vlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let needle = args[0].scalar();
    if let Some(e) = needle.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    let rows = table(&args[1]);
    let col = try_value!(args[2].to_number()).trunc();
    let approximate = try_value!(approximate_flag(args, 3));
    if col < 1.0 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    let width = rows.first().map_or(0, Vec::len);
    if col as usize > width {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    let keys: Vec<&FormulaValue> = rows.iter().map(|row| &row[0]).collect();
    Ok(match lookup_position(&needle, &keys, approximate) {
        Some(i) => rows[i][col as usize - 1].clone(),
        None => FormulaValue::Error(CellError::Na),
    })
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let needle = args[0].scalar();
    if let Some(e) = needle.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    let rows = table(&args[1]);
    let row = try_value!(args[2].to_number()).trunc();
    let approximate = try_value!(approximate_flag(args, 3));
    if row < 1.0 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    if row as usize > rows.len() {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    let keys: Vec<&FormulaValue> = rows.first().map_or_else(Vec::new, |r| r.iter().collect());
    Ok(match lookup_position(&needle, &keys, approximate) {
        Some(i) => rows[row as usize - 1]
            .get(i)
            .cloned()
            .unwrap_or(FormulaValue::Empty),
        None => FormulaValue::Error(CellError::Na),
    })
}

/// MATCH(lookup_value, lookup_array, [match_type])
///
/// The lookup array must be a single row or column.
pub fn fn_match(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let needle = args[0].scalar();
    if let Some(e) = needle.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    let rows = table(&args[1]);
    let values: Vec<&FormulaValue> = match rows.as_slice() {
        [row] => row.iter().collect(),
        many if many.iter().all(|r| r.len() == 1) => many.iter().map(|r| &r[0]).collect(),
        _ => return Ok(FormulaValue::Error(CellError::Na)),
    };
    let match_type = try_value!(number_or(args, 2, 1.0));

    let position = if match_type > 0.0 {
        approximate_position(&needle, &values, false)
    } else if match_type < 0.0 {
        approximate_position(&needle, &values, true)
    } else {
        values.iter().position(|v| lookup_equals(&needle, v))
    };
    Ok(match position {
        Some(i) => FormulaValue::Number(i as f64 + 1.0),
        None => FormulaValue::Error(CellError::Na),
    })
}

/// INDEX(array, row_num, [column_num])
///
/// A zero row or column selects the whole column or row. For a single row,
/// a lone index counts along the row.
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let rows = table(&args[0]);
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);

    let first = try_value!(number_or(args, 1, 0.0)).trunc();
    let second = try_value!(number_or(args, 2, 0.0)).trunc();
    if first < 0.0 || second < 0.0 {
        return Ok(FormulaValue::Error(CellError::Value));
    }
    let (mut row, mut col) = if height == 1 && matches!(arg(args, 2), FormulaValue::Empty) {
        (1, first as usize)
    } else {
        (first as usize, second as usize)
    };
    if width == 1 && col == 0 {
        col = 1;
    }
    if height == 1 && row == 0 {
        row = 1;
    }
    if row > height || col > width {
        return Ok(FormulaValue::Error(CellError::Ref));
    }

    Ok(match (row, col) {
        (0, 0) => FormulaValue::Array(rows),
        (0, c) => FormulaValue::Array(rows.iter().map(|r| vec![r[c - 1].clone()]).collect()),
        (r, 0) => FormulaValue::Array(vec![rows[r - 1].clone()]),
        (r, c) => rows[r - 1][c - 1].clone(),
    })
}

/// ROW(reference) for non-references
pub fn fn_row(_args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::Error(CellError::Value))
}

/// COLUMN(reference) for non-references
pub fn fn_column(_args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(FormulaValue::Error(CellError::Value))
}

/// ROWS(array)
pub fn fn_rows(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(match &args[0] {
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        value => FormulaValue::Number(table(value).len() as f64),
    })
}

/// COLUMNS(array)
pub fn fn_columns(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    Ok(match &args[0] {
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        value => FormulaValue::Number(table(value).first().map_or(0, Vec::len) as f64),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, eval_with, num, text};
    use crate::evaluator::FormulaValue;
    use binsheets_core::{CellError, Workbook};
    use pretty_assertions::assert_eq;

    fn price_list() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, (name, threshold, price)) in [
            ("Apple", 0.0, 1.5),
            ("Banana", 10.0, 0.5),
            ("Cherry", 100.0, 4.0),
        ]
        .iter()
        .enumerate()
        {
            ws.set_cell_value_at(row as u32, 0, *name).unwrap();
            ws.set_cell_value_at(row as u32, 1, *threshold).unwrap();
            ws.set_cell_value_at(row as u32, 2, *price).unwrap();
        }
        wb
    }

    #[test]
    fn test_vlookup_exact_and_approximate() {
        let wb = price_list();
        assert_eq!(eval_with(&wb, "=VLOOKUP(\"banana\",A1:C3,3,FALSE)"), num(0.5));
        assert_eq!(eval_with(&wb, "=VLOOKUP(\"ch*\",A1:C3,2,FALSE)"), num(100.0));
        assert_eq!(
            eval_with(&wb, "=VLOOKUP(\"kiwi\",A1:C3,2,FALSE)"),
            FormulaValue::Error(CellError::Na)
        );
        assert_eq!(eval_with(&wb, "=VLOOKUP(50,B1:C3,2)"), num(0.5));
        assert_eq!(eval_with(&wb, "=VLOOKUP(500,B1:C3,2,TRUE)"), num(4.0));
        assert_eq!(
            eval_with(&wb, "=VLOOKUP(\"Apple\",A1:C3,4,FALSE)"),
            FormulaValue::Error(CellError::Ref)
        );
        assert_eq!(
            eval_with(&wb, "=VLOOKUP(\"Apple\",A1:C3,0,FALSE)"),
            FormulaValue::Error(CellError::Value)
        );
    }

    #[test]
    fn test_hlookup() {
        assert_eq!(eval("=HLOOKUP(\"b\",{\"a\",\"b\";1,2},2,FALSE)"), num(2.0));
        assert_eq!(eval("=HLOOKUP(5,{1,4,8;\"x\",\"y\",\"z\"},2)"), text("y"));
    }

    #[test]
    fn test_match() {
        assert_eq!(eval("=MATCH(25,{10,20,30})"), num(2.0));
        assert_eq!(eval("=MATCH(20,{10,20,30},0)"), num(2.0));
        assert_eq!(eval("=MATCH(25,{30,20,10},-1)"), num(1.0));
        assert_eq!(eval("=MATCH(5,{10,20,30})"), FormulaValue::Error(CellError::Na));
        assert_eq!(eval("=MATCH(\"b?\",{\"a1\";\"b2\"},0)"), num(2.0));
        assert_eq!(eval("=MATCH(1,{1,2;3,4},0)"), FormulaValue::Error(CellError::Na));
    }

    #[test]
    fn test_index() {
        assert_eq!(eval("=INDEX({1,2;3,4},2,1)"), num(3.0));
        assert_eq!(eval("=INDEX({1,2,3},3)"), num(3.0));
        assert_eq!(eval("=SUM(INDEX({1,2;3,4},0,2))"), num(6.0));
        assert_eq!(eval("=INDEX({1,2;3,4},3,1)"), FormulaValue::Error(CellError::Ref));

        let wb = price_list();
        assert_eq!(
            eval_with(&wb, "=INDEX(C1:C3,MATCH(\"Cherry\",A1:A3,0))"),
            num(4.0)
        );
    }

    #[test]
    fn test_array_dimensions() {
        assert_eq!(eval("=COLUMNS({1,2,3})"), num(3.0));
        assert_eq!(eval("=ROWS(5)"), num(1.0));
        assert_eq!(eval("=ROW({1,2})"), FormulaValue::Error(CellError::Value));
    }
}

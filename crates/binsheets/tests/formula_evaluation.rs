//! Tests for formula evaluation with cell references, names and the
//! workbook formatter

use binsheets::prelude::*;
use binsheets::{evaluate, parse_formula, EvaluationContext, FormulaValue};

/// Test basic formula evaluation without cell references
#[test]
fn test_evaluate_simple_formulas() {
    // Arithmetic
    let ast = parse_formula("=1+2*3").unwrap();
    let ctx = EvaluationContext::simple();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(7.0));

    // String concatenation
    let ast = parse_formula("=\"Hello \"&\"World\"").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::String("Hello World".into()));

    // Comparison
    let ast = parse_formula("=5>3").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Boolean(true));
}

/// Test formula evaluation with cell references
#[test]
fn test_evaluate_with_cell_references() {
    // Create a workbook with some data
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_value("A2", 20.0).unwrap();
    sheet.set_cell_value("A3", 30.0).unwrap();
    sheet.set_cell_value("B1", 5.0).unwrap();

    // Create evaluation context with workbook reference
    let ctx = EvaluationContext::new(Some(&wb), 0, 0, 0);

    // Test simple cell reference
    let ast = parse_formula("=A1").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(10.0));

    // Test cell reference in arithmetic
    let ast = parse_formula("=A1+B1").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(15.0));

    // Test cell reference in comparison
    let ast = parse_formula("=A1>B1").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Boolean(true));
}

/// Test formula evaluation with range references
#[test]
fn test_evaluate_with_range_references() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_value("A2", 20.0).unwrap();
    sheet.set_cell_value("A3", 30.0).unwrap();

    let ctx = EvaluationContext::new(Some(&wb), 0, 0, 0);

    // Test SUM with range
    let ast = parse_formula("=SUM(A1:A3)").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(60.0));

    // Test AVERAGE with range
    let ast = parse_formula("=AVERAGE(A1:A3)").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(20.0));

    // Test MIN/MAX with range
    let ast = parse_formula("=MIN(A1:A3)").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(10.0));

    let ast = parse_formula("=MAX(A1:A3)").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(30.0));
}

/// Test complex nested formulas
#[test]
fn test_evaluate_complex_formulas() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 100.0).unwrap();
    sheet.set_cell_value("A2", 50.0).unwrap();
    sheet.set_cell_value("B1", 0.1).unwrap(); // 10%

    let ctx = EvaluationContext::new(Some(&wb), 0, 0, 0);

    // Calculate: IF A1 > A2, calculate 10% of A1, else calculate 10% of A2
    let ast = parse_formula("=IF(A1>A2,A1*B1,A2*B1)").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(10.0));

    // Nested SUM and multiplication
    let ast = parse_formula("=SUM(A1,A2)*B1").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(15.0));
}

/// Test error propagation in formulas
#[test]
fn test_error_propagation() {
    let ctx = EvaluationContext::simple();

    // Division by zero
    let ast = parse_formula("=1/0").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert!(matches!(result, FormulaValue::Error(_)));

    // Error in arithmetic propagates
    let ast = parse_formula("=1/0+5").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert!(matches!(result, FormulaValue::Error(_)));
}

/// Test empty cell handling
#[test]
fn test_empty_cell_handling() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 10.0).unwrap();
    // A2 is empty
    sheet.set_cell_value("A3", 30.0).unwrap();

    let ctx = EvaluationContext::new(Some(&wb), 0, 0, 0);

    // Empty cells are treated as 0 in arithmetic
    let ast = parse_formula("=A1+A2").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(10.0)); // 10 + 0

    // SUM ignores empty cells
    let ast = parse_formula("=SUM(A1:A3)").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::Number(40.0)); // 10 + 0 + 30
}

/// Test string operations
#[test]
fn test_string_operations() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", "Hello").unwrap();
    sheet.set_cell_value("B1", "World").unwrap();

    let ctx = EvaluationContext::new(Some(&wb), 0, 0, 0);

    // String concatenation with cell references
    let ast = parse_formula("=A1&\" \"&B1").unwrap();
    let result = evaluate(&ast, &ctx).unwrap();
    assert_eq!(result, FormulaValue::String("Hello World".into()));
}

/// Defined names resolve through the workbook, sheet scope first
#[test]
fn test_names_in_formulas() {
    let mut wb = Workbook::new();
    wb.add_worksheet_with_name("Rates").unwrap();
    wb.worksheet_mut(1)
        .unwrap()
        .set_cell_value("A1", 0.5)
        .unwrap();
    wb.worksheet_mut(1)
        .unwrap()
        .set_cell_value("A2", 0.25)
        .unwrap();
    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_value("A1", 8.0)
        .unwrap();
    wb.define_name("Rate", "Rates!$A$1").unwrap();
    wb.define_name_for_sheet("Rate", "Rates!$A$2", 1).unwrap();

    let on_first = EvaluationContext::new(Some(&wb), 0, 0, 1);
    let ast = parse_formula("=A1*Rate").unwrap();
    assert_eq!(evaluate(&ast, &on_first).unwrap(), FormulaValue::Number(4.0));

    let on_rates = EvaluationContext::new(Some(&wb), 1, 5, 0);
    let ast = parse_formula("=Rate*4").unwrap();
    assert_eq!(evaluate(&ast, &on_rates).unwrap(), FormulaValue::Number(1.0));

    let ast = parse_formula("=NoSuchName+1").unwrap();
    assert_eq!(
        evaluate(&ast, &on_first).unwrap(),
        FormulaValue::Error(CellError::Name)
    );
}

/// Serial dates and TEXT go through the workbook date system and formatter
#[test]
fn test_dates_and_text() {
    let wb = Workbook::new();
    let ctx = EvaluationContext::new(Some(&wb), 0, 0, 0);

    let ast = parse_formula("=DATE(2008,1,1)").unwrap();
    assert_eq!(evaluate(&ast, &ctx).unwrap(), FormulaValue::Number(39448.0));

    let ast = parse_formula("=YEAR(39448)*100+MONTH(39448)").unwrap();
    assert_eq!(evaluate(&ast, &ctx).unwrap(), FormulaValue::Number(200801.0));

    let ast = parse_formula("=TEXT(0.25,\"0%\")").unwrap();
    assert_eq!(
        evaluate(&ast, &ctx).unwrap(),
        FormulaValue::String("25%".into())
    );
}

/// Whole-workbook recalculation agrees with evaluating each cell alone
#[test]
fn test_calculate_matches_single_cell_evaluation() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    for row in 0..5u32 {
        sheet.set_cell_value_at(row, 0, (row + 1) as f64).unwrap();
    }
    sheet.set_cell_formula("B1", "SUM(A1:A5)").unwrap();
    sheet.set_cell_formula("B2", "AVERAGE(A1:A5)").unwrap();
    sheet.set_cell_formula("B3", "B1/B2").unwrap();
    sheet.set_cell_formula("B4", "IF(B3=5,\"five\",\"other\")").unwrap();

    assert_eq!(wb.evaluate_cell(0, 0, 1).unwrap(), CellValue::Number(15.0));
    // B3 reads cached results that do not exist yet
    assert_eq!(wb.evaluate_cell(0, 2, 1).unwrap(), CellValue::Error(CellError::Div0));

    wb.calculate().unwrap();
    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_calculated_value_at(0, 1), Some(&CellValue::Number(15.0)));
    assert_eq!(sheet.get_calculated_value_at(1, 1), Some(&CellValue::Number(3.0)));
    assert_eq!(sheet.get_calculated_value_at(2, 1), Some(&CellValue::Number(5.0)));
    assert_eq!(
        sheet.get_calculated_value_at(3, 1).and_then(CellValue::as_string),
        Some("five")
    );
}

//! Formula text, cached results and shared formulas.

use crate::{roundtrip, single_sheet_stream};
use binsheets_core::{CellError, CellValue, Workbook};
use binsheets_formula::{evaluate, parse_formula, EvaluationContext, FormulaValue};
use binsheets_xls::biff::records;
use binsheets_xls::{XlsError, XlsReadOptions, XlsReader, XlsWriter};
use pretty_assertions::assert_eq;

fn canonical(formula: &str) -> String {
    parse_formula(formula).unwrap().to_string()
}

#[test]
fn test_formula_text_round_trips() {
    let formulas = [
        "A1+B1*2",
        "SUM(A1:A3)",
        "SUM($A$1,B:B,3)",
        "IF(A1>0,\"yes\",\"no\")",
        "Data!$B$2*Rate",
        "SUM(Data!A1:B4)",
        "IFERROR(1/0,-1)",
        "-A1%",
        "CHOOSE(2,10,20,30)",
        "NOW()",
    ];
    let mut wb = Workbook::new();
    wb.add_worksheet_with_name("Data").unwrap();
    wb.define_name("Rate", "Data!$C$1").unwrap();
    let sheet = wb.worksheet_mut(0).unwrap();
    for (row, formula) in formulas.iter().enumerate() {
        sheet.set_cell_formula_at(row as u32, 0, formula).unwrap();
    }

    let back = roundtrip(&wb);
    let sheet = back.worksheet(0).unwrap();
    for (row, formula) in formulas.iter().enumerate() {
        assert_eq!(
            sheet.get_formula_at(row as u32, 0),
            Some(canonical(formula).as_str()),
            "{formula}"
        );
    }
}

#[test]
fn test_cached_results_round_trip() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    let cases = [
        CellValue::Number(12.5),
        CellValue::string("text result"),
        CellValue::string(""),
        CellValue::Boolean(true),
        CellValue::Error(CellError::Div0),
    ];
    for (row, result) in cases.iter().enumerate() {
        sheet
            .set_cell_value_at(row as u32, 0, CellValue::formula_with_result("1+1", result.clone()))
            .unwrap();
    }
    sheet.set_cell_formula("B1", "2*3").unwrap();

    let back = roundtrip(&wb);
    let sheet = back.worksheet(0).unwrap();
    for (row, result) in cases.iter().enumerate() {
        match sheet.get_value_at(row as u32, 0) {
            CellValue::Formula { text, cached_value } => {
                assert_eq!(text, "1+1");
                assert_eq!(cached_value.as_deref(), Some(result), "row {row}");
            }
            other => panic!("row {row}: expected a formula, got {other:?}"),
        }
    }
    match sheet.get_value("B1").unwrap() {
        CellValue::Formula { cached_value, .. } => assert_eq!(cached_value, None),
        other => panic!("expected a formula, got {other:?}"),
    }
}

#[test]
fn test_unknown_function_is_written_as_addin() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_formula("A1", "NOSUCHFUNCTION(1)")
        .unwrap();

    let back = roundtrip(&wb);
    let text = back.worksheet(0).unwrap().get_formula_at(0, 0).unwrap();
    assert_eq!(text, "NOSUCHFUNCTION(1)");

    let ctx = EvaluationContext::new(Some(&back), 0, 0, 0);
    let value = evaluate(&parse_formula(text).unwrap(), &ctx).unwrap();
    assert_eq!(value, FormulaValue::Error(CellError::Name));
}

#[test]
fn test_reference_to_missing_sheet_fails_to_write() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_formula("B2", "Nowhere!A1+1")
        .unwrap();
    match XlsWriter::to_bytes(&wb) {
        Err(XlsError::RecordFormat(msg)) => assert!(msg.contains("B2"), "{msg}"),
        other => panic!("expected a record format error, got {other:?}"),
    }
}

fn formula_record(row: u16, col: u16, result: f64, rgce: &[u8]) -> (u16, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(&row.to_le_bytes());
    body.extend_from_slice(&col.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&result.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&(rgce.len() as u16).to_le_bytes());
    body.extend_from_slice(rgce);
    (records::FORMULA, body)
}

#[test]
fn test_shared_formula_is_resolved_per_cell() {
    // C1:C3 share "=A1" relative to each cell
    let exp = [0x01, 0x00, 0x00, 0x02, 0x00];
    let mut shrfmla = vec![0x00, 0x00, 0x02, 0x00, 0x02, 0x02, 0x00, 0x03];
    let rgce = [0x4C, 0x00, 0x00, 0xFE, 0xC0];
    shrfmla.extend_from_slice(&(rgce.len() as u16).to_le_bytes());
    shrfmla.extend_from_slice(&rgce);

    let stream = single_sheet_stream(
        &[],
        &[],
        &[
            formula_record(0, 2, 1.0, &exp),
            (records::SHRFMLA, shrfmla),
            formula_record(1, 2, 2.0, &exp),
            formula_record(2, 2, 3.0, &exp),
        ],
    );
    let wb = XlsReader::read_bytes(&stream, &XlsReadOptions::default()).unwrap();
    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_formula_at(0, 2), Some("A1"));
    assert_eq!(sheet.get_formula_at(1, 2), Some("A2"));
    assert_eq!(sheet.get_formula_at(2, 2), Some("A3"));
    assert_eq!(sheet.get_value_at(2, 2).as_number(), Some(3.0));
}

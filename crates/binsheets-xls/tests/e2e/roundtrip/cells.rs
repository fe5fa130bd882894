//! Cell values written by XlsWriter and read back.

use crate::{roundtrip, roundtrip_via_file};
use binsheets_core::{CellError, CellValue, Workbook};
use binsheets_xls::{XlsReadOptions, XlsReader, XlsWriteOptions, XlsWriter};
use pretty_assertions::assert_eq;
use std::io::Cursor;

fn sample() -> Workbook {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 42).unwrap();
    sheet.set_cell_value("A2", -7.25).unwrap();
    sheet.set_cell_value("A3", 1e300).unwrap();
    sheet.set_cell_value("A4", 0.1).unwrap();
    sheet.set_cell_value("B1", "plain").unwrap();
    sheet.set_cell_value("B2", "Grüße, 世界").unwrap();
    sheet.set_cell_value("B3", "plain").unwrap();
    sheet.set_cell_value("B4", "").unwrap();
    sheet.set_cell_value("C1", true).unwrap();
    sheet.set_cell_value("C2", false).unwrap();
    sheet
        .set_cell_value_at(2, 2, CellValue::Error(CellError::Ref))
        .unwrap();
    sheet.set_cell_value_at(65535, 255, "corner").unwrap();
    wb
}

fn assert_sample(wb: &Workbook) {
    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Number(42.0));
    assert_eq!(sheet.get_value("A2").unwrap(), CellValue::Number(-7.25));
    assert_eq!(sheet.get_value("A3").unwrap(), CellValue::Number(1e300));
    assert_eq!(sheet.get_value("A4").unwrap(), CellValue::Number(0.1));
    assert_eq!(sheet.get_value("B1").unwrap().as_string(), Some("plain"));
    assert_eq!(sheet.get_value("B2").unwrap().as_string(), Some("Grüße, 世界"));
    assert_eq!(sheet.get_value("B3").unwrap().as_string(), Some("plain"));
    assert_eq!(sheet.get_value("C1").unwrap(), CellValue::Boolean(true));
    assert_eq!(sheet.get_value("C2").unwrap(), CellValue::Boolean(false));
    assert_eq!(sheet.get_value("C3").unwrap(), CellValue::Error(CellError::Ref));
    assert_eq!(sheet.get_value_at(65535, 255).as_string(), Some("corner"));
}

#[test]
fn test_values_round_trip_in_memory() {
    assert_sample(&roundtrip(&sample()));
}

#[test]
fn test_values_round_trip_through_a_file() {
    assert_sample(&roundtrip_via_file(&sample()));
}

#[test]
fn test_values_without_rk_records() {
    let options = XlsWriteOptions {
        use_rk: false,
        write_extsst: false,
        run_sanity_check: true,
    };
    let mut out = Cursor::new(Vec::new());
    XlsWriter::write_with_options(&sample(), &mut out, &options).unwrap();
    let wb = XlsReader::read_bytes(out.get_ref(), &XlsReadOptions::strict()).unwrap();
    assert_sample(&wb);
}

#[test]
fn test_many_strings_cross_record_boundaries() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    for row in 0..3000u32 {
        sheet
            .set_cell_value_at(row, 0, format!("string number {row} {}", "x".repeat(row as usize % 40)))
            .unwrap();
    }
    sheet.set_cell_value_at(0, 1, "é".repeat(9000)).unwrap();

    let back = roundtrip(&wb);
    let sheet = back.worksheet(0).unwrap();
    for row in [0u32, 1, 817, 2999] {
        let expected = format!("string number {row} {}", "x".repeat(row as usize % 40));
        assert_eq!(sheet.get_value_at(row, 0).as_string(), Some(expected.as_str()));
    }
    assert_eq!(sheet.get_value_at(0, 1).as_string().map(|s| s.chars().count()), Some(9000));
}

#[test]
fn test_cell_count_survives() {
    let wb = sample();
    let back = roundtrip(&wb);
    assert_eq!(
        back.worksheet(0).unwrap().cell_count(),
        wb.worksheet(0).unwrap().cell_count()
    );
}

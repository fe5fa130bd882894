//! Tests for reading cell data types from hand-built record streams.

use crate::{boolerr, compound_file, labelsst, number, single_sheet_stream};
use binsheets_core::date::excel_to_datetime;
use binsheets_core::{CellError, CellValue};
use binsheets_xls::biff::records;
use binsheets_xls::{XlsReadOptions, XlsReader};
use pretty_assertions::assert_eq;

/// The hand-built streams carry no XF table, which only strict mode rejects
fn read(stream: &[u8]) -> binsheets_core::Workbook {
    XlsReader::read_bytes(&compound_file("/Workbook", stream), &XlsReadOptions::default()).unwrap()
}

#[test]
fn test_xls_number_values() {
    let stream = single_sheet_stream(
        &[],
        &[],
        &[
            number(0, 0, 42.0),
            number(0, 1, 3.14),
            number(0, 2, -100.0),
            number(0, 3, 0.0),
        ],
    );
    let workbook = read(&stream);
    let sheet = workbook.worksheet(0).unwrap();

    assert_eq!(sheet.get_value_at(0, 0), CellValue::Number(42.0));
    assert_eq!(sheet.get_value_at(0, 1), CellValue::Number(3.14));
    assert_eq!(sheet.get_value_at(0, 2), CellValue::Number(-100.0));
    assert_eq!(sheet.get_value_at(0, 3), CellValue::Number(0.0));
}

#[test]
fn test_xls_shared_strings() {
    let stream = single_sheet_stream(
        &[],
        &["Hello", "World", ""],
        &[labelsst(0, 0, 0), labelsst(0, 1, 1), labelsst(1, 0, 0), labelsst(2, 0, 2)],
    );
    let workbook = read(&stream);
    let sheet = workbook.worksheet(0).unwrap();

    assert_eq!(sheet.get_value("A1").unwrap().as_string(), Some("Hello"));
    assert_eq!(sheet.get_value("B1").unwrap().as_string(), Some("World"));
    assert_eq!(sheet.get_value("A2").unwrap().as_string(), Some("Hello"));
    assert_eq!(sheet.get_value("A3").unwrap().as_string(), Some(""));
}

#[test]
fn test_xls_booleans_and_errors() {
    let stream = single_sheet_stream(
        &[],
        &[],
        &[
            boolerr(0, 0, 1, false),
            boolerr(0, 1, 0, false),
            boolerr(0, 2, 0x07, true),
            boolerr(0, 3, 0x2A, true),
        ],
    );
    let workbook = read(&stream);
    let sheet = workbook.worksheet(0).unwrap();

    assert_eq!(sheet.get_value_at(0, 0), CellValue::Boolean(true));
    assert_eq!(sheet.get_value_at(0, 1), CellValue::Boolean(false));
    assert_eq!(sheet.get_value_at(0, 2), CellValue::Error(CellError::Div0));
    assert_eq!(sheet.get_value_at(0, 3), CellValue::Error(CellError::Na));
}

#[test]
fn test_xls_rk_and_mulrk() {
    // RK 42 as an integer; MULRK 1.0 (float form) and 1.23 (integer /100)
    let mut rk = vec![1, 0, 0, 0, 0, 0];
    rk.extend_from_slice(&((42u32 << 2) | 0x02).to_le_bytes());

    let mut mulrk = vec![2, 0, 1, 0];
    mulrk.extend_from_slice(&[0, 0]);
    mulrk.extend_from_slice(&0x3FF0_0000u32.to_le_bytes());
    mulrk.extend_from_slice(&[0, 0]);
    mulrk.extend_from_slice(&((123u32 << 2) | 0x03).to_le_bytes());
    mulrk.extend_from_slice(&2u16.to_le_bytes());

    let stream = single_sheet_stream(&[], &[], &[(records::RK, rk), (records::MULRK, mulrk)]);
    let workbook = read(&stream);
    let sheet = workbook.worksheet(0).unwrap();

    assert_eq!(sheet.get_value_at(1, 0), CellValue::Number(42.0));
    assert_eq!(sheet.get_value_at(2, 1), CellValue::Number(1.0));
    assert_eq!(sheet.get_value_at(2, 2), CellValue::Number(1.23));
}

#[test]
fn test_xls_blank_cells_are_empty() {
    let stream = single_sheet_stream(
        &[],
        &[],
        &[(records::BLANK, vec![0, 0, 0, 0, 0, 0]), number(0, 1, 1.0)],
    );
    let workbook = read(&stream);
    let sheet = workbook.worksheet(0).unwrap();
    assert!(sheet.get_value_at(0, 0).is_empty());
    assert_eq!(sheet.get_value_at(0, 1), CellValue::Number(1.0));
}

#[test]
fn test_xls_date_systems() {
    let serial = 39448.0;
    let stream_1900 = single_sheet_stream(&[], &[], &[number(0, 0, serial)]);
    let stream_1904 = single_sheet_stream(
        &[(records::DATEMODE, 1u16.to_le_bytes().to_vec())],
        &[],
        &[number(0, 0, serial)],
    );

    let wb_1900 = read(&stream_1900);
    let wb_1904 = read(&stream_1904);
    assert!(!wb_1900.settings().date_1904);
    assert!(wb_1904.settings().date_1904);

    let date = |wb: &binsheets_core::Workbook| {
        let value = wb.worksheet(0).unwrap().get_value_at(0, 0).as_number().unwrap();
        excel_to_datetime(value, wb.settings().date_1904)
            .unwrap()
            .to_string()
    };
    assert_eq!(date(&wb_1900), "2008-01-01 00:00:00");
    assert_eq!(date(&wb_1904), "2012-01-02 00:00:00");
}

#[test]
fn test_xls_raw_stream_without_container() {
    let stream = single_sheet_stream(&[], &["raw"], &[labelsst(3, 2, 0)]);
    let workbook = XlsReader::read_bytes(&stream, &XlsReadOptions::default()).unwrap();
    let sheet = workbook.worksheet(0).unwrap();
    assert_eq!(sheet.name(), "Sheet1");
    assert_eq!(sheet.get_value("C4").unwrap().as_string(), Some("raw"));
}

#[test]
fn test_extract_stream_from_container_or_bare_bytes() {
    let stream = single_sheet_stream(&[], &[], &[number(0, 0, 1.0)]);
    let from_container = XlsReader::extract_stream(&compound_file("/Workbook", &stream)).unwrap();
    assert_eq!(from_container, stream);
    assert_eq!(XlsReader::extract_stream(&stream).unwrap(), stream);
}

//! The error taxonomy: malformed records, encryption, old formats and
//! non-workbook input.

use crate::{bof, compound_file, labelsst, number, single_sheet_stream, BiffBuilder};
use binsheets_core::CellValue;
use binsheets_xls::biff::records;
use binsheets_xls::{XlsError, XlsReadOptions, XlsReader, XlsWriter};

fn lenient() -> XlsReadOptions {
    XlsReadOptions::default()
}

#[test]
fn test_filepass_is_encrypted() {
    let stream = single_sheet_stream(
        &[(records::FILEPASS, vec![0x01, 0x00, 0x01, 0x00])],
        &[],
        &[number(0, 0, 1.0)],
    );
    let err = XlsReader::read_bytes(&compound_file("/Workbook", &stream), &lenient()).unwrap_err();
    assert!(matches!(err, XlsError::Encrypted), "got {err:?}");
}

#[test]
fn test_biff5_stream_is_old_format() {
    let mut b = BiffBuilder::new();
    b.record(records::BOF, &bof(0x0500, records::BOF_WORKBOOK_GLOBALS));
    b.record(records::EOF, &[]);
    let stream = b.into_stream();

    let err = XlsReader::read_bytes(&stream, &lenient()).unwrap_err();
    assert!(matches!(err, XlsError::OldExcelFormat(_)), "got {err:?}");

    // the same stream inside a compound file is checked by its BOF
    let err = XlsReader::read_bytes(&compound_file("/Workbook", &stream), &lenient()).unwrap_err();
    assert!(matches!(err, XlsError::OldExcelFormat(_)), "got {err:?}");
}

#[test]
fn test_biff2_to_biff4_are_old_format() {
    for bof_type in [records::BOF_BIFF2, records::BOF_BIFF3, records::BOF_BIFF4] {
        let mut b = BiffBuilder::new();
        b.record(bof_type, &[0x00, 0x00, 0x10, 0x00]);
        let err = XlsReader::read_bytes(&b.into_stream(), &lenient()).unwrap_err();
        assert!(matches!(err, XlsError::OldExcelFormat(_)), "got {err:?}");
    }
}

#[test]
fn test_book_stream_is_old_format() {
    let stream = single_sheet_stream(&[], &[], &[]);
    let err = XlsReader::read_bytes(&compound_file("/Book", &stream), &lenient()).unwrap_err();
    assert!(matches!(err, XlsError::OldExcelFormat(_)), "got {err:?}");
}

#[test]
fn test_other_input_is_not_ole2() {
    for bytes in [&b"PK\x03\x04 not a workbook"[..], &b"id,name\n1,a\n"[..], &[0x12][..]] {
        let err = XlsReader::read_bytes(bytes, &lenient()).unwrap_err();
        assert!(matches!(err, XlsError::NotOle2), "got {err:?}");
    }
}

#[test]
fn test_sst_index_out_of_range_fails_in_both_modes() {
    let stream = single_sheet_stream(&[], &["only"], &[labelsst(0, 0, 5)]);
    for options in [XlsReadOptions::default(), XlsReadOptions::strict()] {
        let err = XlsReader::read_bytes(&stream, &options).unwrap_err();
        assert!(matches!(err, XlsError::RecordFormat(_)), "got {err:?}");
    }
}

#[test]
fn test_short_cell_record_strict_and_lenient() {
    let stream = single_sheet_stream(
        &[],
        &[],
        &[(records::NUMBER, vec![0, 0, 0, 0]), number(1, 0, 7.0)],
    );

    let err = XlsReader::read_bytes(&stream, &XlsReadOptions::strict()).unwrap_err();
    assert!(matches!(err, XlsError::RecordFormat(_)), "got {err:?}");

    let workbook = XlsReader::read_bytes(&stream, &lenient()).unwrap();
    let sheet = workbook.worksheet(0).unwrap();
    assert!(sheet.get_value_at(0, 0).is_empty());
    assert_eq!(sheet.get_value_at(1, 0), CellValue::Number(7.0));
}

#[test]
fn test_missing_xf_table_strict_and_lenient() {
    let stream = single_sheet_stream(&[], &[], &[number(0, 0, 2.5)]);

    let err = XlsReader::read_bytes(&stream, &XlsReadOptions::strict()).unwrap_err();
    assert!(matches!(err, XlsError::RecordFormat(_)), "got {err:?}");

    let workbook = XlsReader::read_bytes(&stream, &lenient()).unwrap();
    assert_eq!(workbook.worksheet(0).unwrap().get_value_at(0, 0), CellValue::Number(2.5));
}

fn xf(type_prot: u16) -> (u16, Vec<u8>) {
    let mut body = vec![0u8; 20];
    body[4..6].copy_from_slice(&type_prot.to_le_bytes());
    (records::XF, body)
}

#[test]
fn test_cell_with_style_xf_strict_and_lenient() {
    // XF 0 is a style XF, XF 1 a cell XF
    let globals = [xf(0xFFF5), xf(0x0001)];
    let mut on_cell_xf = number(1, 0, 4.0);
    on_cell_xf.1[4..6].copy_from_slice(&1u16.to_le_bytes());

    let stream = single_sheet_stream(&globals, &[], &[on_cell_xf.clone()]);
    let workbook = XlsReader::read_bytes(&stream, &XlsReadOptions::strict()).unwrap();
    assert_eq!(workbook.worksheet(0).unwrap().get_value_at(1, 0), CellValue::Number(4.0));

    let stream = single_sheet_stream(&globals, &[], &[number(0, 0, 2.5), on_cell_xf]);
    let err = XlsReader::read_bytes(&stream, &XlsReadOptions::strict()).unwrap_err();
    match err {
        XlsError::RecordFormat(msg) => assert!(msg.contains("style XF"), "{msg}"),
        other => panic!("expected a record format error, got {other:?}"),
    }

    let workbook = XlsReader::read_bytes(&stream, &lenient()).unwrap();
    let sheet = workbook.worksheet(0).unwrap();
    assert_eq!(sheet.get_value_at(0, 0), CellValue::Number(2.5));
    assert_eq!(sheet.get_value_at(1, 0), CellValue::Number(4.0));
}

#[test]
fn test_truncated_record_is_record_format() {
    let mut stream = single_sheet_stream(&[], &[], &[number(0, 0, 1.0)]);
    stream.truncate(stream.len() - 3);
    let err = XlsReader::read_bytes(&stream, &XlsReadOptions::strict()).unwrap_err();
    assert!(matches!(err, XlsError::RecordFormat(_)), "got {err:?}");
}

#[test]
fn test_empty_workbook_is_invalid_argument() {
    let err = XlsWriter::to_bytes(&binsheets_core::Workbook::empty()).unwrap_err();
    match err {
        XlsError::Core(e) => assert!(e.is_invalid_argument(), "got {e:?}"),
        other => panic!("expected a core error, got {other:?}"),
    }
}

//! File and byte I/O through the facade, combined with recalculation and
//! row shifting

use binsheets::prelude::*;
use binsheets::NameScope;
use pretty_assertions::assert_eq;

fn budget() -> Workbook {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", "Item").unwrap();
    sheet.set_cell_value("B1", "Cost").unwrap();
    for (row, (item, cost)) in [("rent", 900.0), ("food", 350.5), ("travel", 120.0)]
        .into_iter()
        .enumerate()
    {
        let row = row as u32 + 1;
        sheet.set_cell_value_at(row, 0, item).unwrap();
        sheet.set_cell_value_at(row, 1, cost).unwrap();
    }
    sheet.set_cell_formula("B5", "SUM(B2:B4)").unwrap();
    wb.define_name("Costs", "Sheet1!$B$2:$B$4").unwrap();
    wb
}

#[test]
fn test_save_and_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("budget.xls");
    let mut wb = budget();
    wb.calculate().unwrap();
    wb.save(&path).unwrap();

    let back = Workbook::open(&path).unwrap();
    let sheet = back.worksheet(0).unwrap();
    assert_eq!(sheet.get_formula_at(4, 1), Some("SUM(B2:B4)"));
    assert_eq!(
        sheet.get_calculated_value_at(4, 1),
        Some(&CellValue::Number(1370.5))
    );
    assert_eq!(
        back.named_ranges()
            .get_exact("Costs", &NameScope::Workbook)
            .map(|n| n.refers_to.as_str()),
        Some("Sheet1!$B$2:$B$4")
    );
}

#[test]
fn test_only_xls_paths_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let wb = budget();
    for name in ["budget.xlsx", "budget.csv", "budget"] {
        let err = wb.save(dir.path().join(name)).unwrap_err();
        assert!(
            matches!(&err, XlsError::Core(e) if e.is_invalid_argument()),
            "{name}: {err}"
        );
    }
    let err = Workbook::open(dir.path().join("missing.xlsx")).unwrap_err();
    assert!(matches!(err, XlsError::Core(_)));

    // upper-case extensions are fine
    let path = dir.path().join("BUDGET.XLS");
    wb.save(&path).unwrap();
    assert!(Workbook::open(&path).is_ok());
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Workbook::open(dir.path().join("nowhere.xls")).unwrap_err();
    assert!(matches!(err, XlsError::Io(_)));
}

#[test]
fn test_bytes_round_trip() {
    let wb = budget();
    let bytes = wb.to_bytes().unwrap();
    let back = Workbook::from_bytes(&bytes).unwrap();
    assert_eq!(back.worksheet(0).unwrap().cell_count(), 9);
    assert_eq!(
        back.worksheet(0).unwrap().get_value_at(2, 0).as_string(),
        Some("food")
    );
    assert!(matches!(
        Workbook::from_bytes(b"not a spreadsheet"),
        Err(XlsError::NotOle2)
    ));
}

#[test]
fn test_evaluate_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("uncalculated.xls");
    budget().save(&path).unwrap();

    let plain = Workbook::open(&path).unwrap();
    assert_eq!(
        plain.worksheet(0).unwrap().get_calculated_value_at(4, 1),
        Some(&CellValue::formula("SUM(B2:B4)"))
    );

    let options = XlsReadOptions {
        evaluate_on_load: true,
        ..XlsReadOptions::default()
    };
    let calculated = Workbook::open_with_options(&path, &options).unwrap();
    assert_eq!(
        calculated.worksheet(0).unwrap().get_calculated_value_at(4, 1),
        Some(&CellValue::Number(1370.5))
    );
}

#[test]
fn test_shift_then_save() {
    let mut wb = budget();
    // make room for a header block above the table
    wb.shift_rows(0, 0, 4, 2).unwrap();
    wb.calculate().unwrap();

    let back = Workbook::from_bytes(&wb.to_bytes().unwrap()).unwrap();
    let sheet = back.worksheet(0).unwrap();
    assert!(sheet.get_value_at(0, 0).is_empty());
    assert_eq!(sheet.get_value_at(2, 0).as_string(), Some("Item"));
    assert_eq!(sheet.get_formula_at(6, 1), Some("SUM(B4:B6)"));
    assert_eq!(
        sheet.get_calculated_value_at(6, 1),
        Some(&CellValue::Number(1370.5))
    );
    assert_eq!(
        back.named_ranges()
            .get_exact("Costs", &NameScope::Workbook)
            .map(|n| n.refers_to.as_str()),
        Some("Sheet1!$B$4:$B$6")
    );
}

//! Defined names: scopes, flags, built-in names and references from formulas.

use crate::roundtrip;
use binsheets_core::{BuiltinName, NameScope, NamedRange, Workbook};
use pretty_assertions::assert_eq;

fn workbook_with_names() -> Workbook {
    let mut wb = Workbook::new();
    wb.add_worksheet_with_name("Data").unwrap();
    wb.add_worksheet_with_name("Summary").unwrap();
    wb.define_name("Total", "Data!$A$1:$A$9").unwrap();
    wb.define_name_for_sheet("Local", "Summary!$B$2", 2).unwrap();
    wb.define_name_for_sheet("Local", "Data!$C$3", 1).unwrap();
    wb.named_ranges_mut()
        .define(
            NamedRange::workbook_scope("Secret", "Data!$Z$1")
                .with_comment("not for display")
                .hidden(),
        )
        .unwrap();
    wb.set_print_area(0, "A1:C5").unwrap();
    wb
}

#[test]
fn test_names_round_trip() {
    let wb = workbook_with_names();
    let back = roundtrip(&wb);
    let names = back.named_ranges();
    assert_eq!(names.len(), wb.named_ranges().len());

    let total = names.get_exact("Total", &NameScope::Workbook).unwrap();
    assert_eq!(total.refers_to, "Data!$A$1:$A$9");

    let on_summary = names.get_exact("Local", &NameScope::Sheet(2)).unwrap();
    assert_eq!(on_summary.refers_to, "Summary!$B$2");
    let on_data = names.get_exact("Local", &NameScope::Sheet(1)).unwrap();
    assert_eq!(on_data.refers_to, "Data!$C$3");

    let secret = names.get_exact("Secret", &NameScope::Workbook).unwrap();
    assert!(secret.hidden);
    assert_eq!(secret.comment.as_deref(), Some("not for display"));
}

#[test]
fn test_print_area_is_a_builtin_name() {
    let back = roundtrip(&workbook_with_names());
    let print_area = back
        .named_ranges()
        .builtin(BuiltinName::PrintArea, 0)
        .unwrap();
    assert_eq!(print_area.refers_to, "Sheet1!$A$1:$C$5");
    assert_eq!(back.print_area(0), Some("Sheet1!$A$1:$C$5"));
}

#[test]
fn test_formulas_resolve_names_by_scope() {
    let mut wb = workbook_with_names();
    let summary = wb.worksheet_mut(2).unwrap();
    summary.set_cell_formula("A1", "SUM(Total)").unwrap();
    summary.set_cell_formula("A2", "Local*2").unwrap();
    wb.worksheet_mut(1)
        .unwrap()
        .set_cell_formula("A1", "Local+1")
        .unwrap();

    let back = roundtrip(&wb);
    assert_eq!(back.worksheet(2).unwrap().get_formula_at(0, 0), Some("SUM(Total)"));
    assert_eq!(back.worksheet(2).unwrap().get_formula_at(1, 0), Some("Local*2"));
    assert_eq!(back.worksheet(1).unwrap().get_formula_at(0, 0), Some("Local+1"));
}

#[test]
fn test_lookup_prefers_sheet_scope() {
    let back = roundtrip(&workbook_with_names());
    assert_eq!(
        back.get_named_range("Local", 1).map(|n| n.refers_to.as_str()),
        Some("Data!$C$3")
    );
    assert_eq!(
        back.get_named_range("Local", 2).map(|n| n.refers_to.as_str()),
        Some("Summary!$B$2")
    );
    assert!(back.get_named_range("Local", 0).is_none());
    assert!(back.get_named_range("total", 0).is_some());
}

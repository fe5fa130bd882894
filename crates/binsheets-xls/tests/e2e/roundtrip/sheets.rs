//! Sheet-level state: order, visibility, selection, panes, merges, row and
//! column layout, and hyperlinks.

use crate::roundtrip;
use binsheets_core::{CellRange, Hyperlink, HyperlinkKind, SheetVisibility, Workbook};
use pretty_assertions::assert_eq;

#[test]
fn test_sheet_order_visibility_and_active_tab() {
    let mut wb = Workbook::new();
    wb.add_worksheet_with_name("Hidden").unwrap();
    wb.add_worksheet_with_name("Very Hidden").unwrap();
    wb.add_worksheet_with_name("Last").unwrap();
    wb.worksheet_mut(1)
        .unwrap()
        .set_visibility(SheetVisibility::Hidden);
    wb.worksheet_mut(2)
        .unwrap()
        .set_visibility(SheetVisibility::VeryHidden);
    wb.set_active_sheet(3).unwrap();

    let back = roundtrip(&wb);
    let names: Vec<&str> = back.worksheets().map(|s| s.name()).collect();
    assert_eq!(names, ["Sheet1", "Hidden", "Very Hidden", "Last"]);
    let visibility: Vec<SheetVisibility> = back.worksheets().map(|s| s.visibility()).collect();
    assert_eq!(
        visibility,
        [
            SheetVisibility::Visible,
            SheetVisibility::Hidden,
            SheetVisibility::VeryHidden,
            SheetVisibility::Visible
        ]
    );
    assert_eq!(back.active_sheet(), 3);
    assert!(back.worksheet(0).unwrap().is_selected());
    assert!(!back.worksheet(3).unwrap().is_selected());
}

#[test]
fn test_freeze_panes_and_merged_regions() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_freeze_panes(2, 1);
    sheet.merge_cells(&CellRange::from_indices(0, 0, 0, 3)).unwrap();
    sheet.merge_cells(&CellRange::from_indices(4, 1, 8, 2)).unwrap();
    for i in 0..1100u32 {
        sheet
            .merge_cells(&CellRange::from_indices(100 + i, 0, 100 + i, 1))
            .unwrap();
    }

    let back = roundtrip(&wb);
    let sheet = back.worksheet(0).unwrap();
    let panes = sheet.freeze_panes().unwrap();
    assert_eq!((panes.row, panes.col), (2, 1));
    assert_eq!(sheet.merged_regions().len(), 1102);
    assert_eq!(sheet.merged_regions()[0], CellRange::from_indices(0, 0, 0, 3));
    assert_eq!(sheet.merged_regions()[1], CellRange::from_indices(4, 1, 8, 2));
    assert_eq!(
        sheet.merged_regions()[1101],
        CellRange::from_indices(1199, 0, 1199, 1)
    );
}

#[test]
fn test_row_and_column_layout() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 1).unwrap();
    sheet.set_row_height(0, 30.0).unwrap();
    sheet.set_row_hidden(3, true).unwrap();
    sheet.set_row_outline_level(5, 2).unwrap();
    sheet.set_column_width(1, 20.5).unwrap();
    sheet.set_column_hidden(4, true).unwrap();
    sheet.set_column_outline_level(6, 1).unwrap();
    sheet.set_default_row_height(18.0);
    sheet.set_default_column_width(10.0);

    let back = roundtrip(&wb);
    let sheet = back.worksheet(0).unwrap();
    assert_eq!(sheet.row_height(0), 30.0);
    assert!(sheet.is_row_hidden(3));
    assert!(!sheet.is_row_hidden(2));
    assert_eq!(sheet.row_info(5).outline_level, 2);
    assert_eq!(sheet.column_width(1), 20.5);
    assert!(sheet.is_column_hidden(4));
    assert_eq!(sheet.column_info(6).outline_level, 1);
    assert_eq!(sheet.default_row_height(), 18.0);
    assert_eq!(sheet.default_column_width(), 10.0);
    assert_eq!(sheet.get_value_at(0, 0).as_number(), Some(1.0));
}

#[test]
fn test_hyperlinks_round_trip() {
    let mut wb = Workbook::new();
    wb.add_worksheet_with_name("Target").unwrap();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", "web").unwrap();
    sheet
        .add_hyperlink(
            Hyperlink::url(0, 0, "https://example.com/page?q=1")
                .with_label("web")
                .with_tooltip("open the site"),
        )
        .unwrap();
    sheet
        .add_hyperlink(Hyperlink::email(1, 0, "someone@example.com"))
        .unwrap();
    sheet
        .add_hyperlink(
            Hyperlink::document(2, 0, "Target!B2")
                .with_range(CellRange::from_indices(2, 0, 3, 1)),
        )
        .unwrap();
    sheet
        .add_hyperlink(Hyperlink::file(5, 0, "..\\reports\\q1.xls"))
        .unwrap();

    let back = roundtrip(&wb);
    let links = back.worksheet(0).unwrap().hyperlinks();
    assert_eq!(links.len(), 4);

    let url = back.worksheet(0).unwrap().hyperlink_at(0, 0).unwrap();
    assert_eq!(url.kind, HyperlinkKind::Url);
    assert_eq!(url.address(), "https://example.com/page?q=1");
    assert_eq!(url.label.as_deref(), Some("web"));
    assert_eq!(url.tooltip.as_deref(), Some("open the site"));

    let email = back.worksheet(0).unwrap().hyperlink_at(1, 0).unwrap();
    assert_eq!(email.kind, HyperlinkKind::Email);
    assert_eq!(email.address(), "mailto:someone@example.com");

    let document = back.worksheet(0).unwrap().hyperlink_at(3, 1).unwrap();
    assert_eq!(document.kind, HyperlinkKind::Document);
    assert_eq!(document.address(), "Target!B2");
    assert_eq!(document.range, CellRange::from_indices(2, 0, 3, 1));

    let file = back.worksheet(0).unwrap().hyperlink_at(5, 0).unwrap();
    assert_eq!(file.kind, HyperlinkKind::File);
    assert_eq!(file.address(), "..\\reports\\q1.xls");
}

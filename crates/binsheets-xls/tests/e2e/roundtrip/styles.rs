//! Cell, row and column styles and the workbook palette.

use crate::roundtrip;
use binsheets_core::style::Underline;
use binsheets_core::{
    BorderLineStyle, Color, Error, HorizontalAlignment, NumberFormat, Style, VerticalAlignment,
    Workbook,
};
use pretty_assertions::assert_eq;

fn styles() -> Vec<Style> {
    let mut underlined = Style::new().font_name("Courier New").font_size(9.0);
    underlined.font.underline = Underline::Single;
    underlined.font.strikethrough = true;
    vec![
        Style::new().bold(true).italic(true),
        Style::new().font_color(Color::rgb(255, 0, 0)).font_size(14.0),
        Style::new().fill_color(Color::rgb(0x12, 0x34, 0x56)),
        Style::new().border_all(BorderLineStyle::Medium, Color::rgb(0, 0, 255)),
        Style::new()
            .horizontal_alignment(HorizontalAlignment::Right)
            .vertical_alignment(VerticalAlignment::Center)
            .wrap_text(true),
        Style::new().number_format("0.000"),
        Style::new().number_format("yyyy-mm-dd"),
        underlined,
    ]
}

#[test]
fn test_cell_styles_round_trip() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    for (row, style) in styles().iter().enumerate() {
        sheet.set_cell_value_at(row as u32, 0, 1.5).unwrap();
        sheet.set_cell_style_at(row as u32, 0, style).unwrap();
    }
    // a styled cell without a value
    sheet.set_cell_style_at(20, 3, &styles()[0]).unwrap();

    let back = roundtrip(&wb);
    let sheet = back.worksheet(0).unwrap();
    for (row, style) in styles().iter().enumerate() {
        assert_eq!(sheet.cell_style_at(row as u32, 0), Some(style), "row {row}");
    }
    assert_eq!(sheet.cell_style_at(20, 3), Some(&styles()[0]));
    assert!(sheet.get_value_at(20, 3).is_empty());
}

#[test]
fn test_number_formats_survive() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 39448.0).unwrap();
    sheet
        .set_cell_style("A1", &Style::new().number_format("yyyy-mm-dd"))
        .unwrap();
    sheet.set_cell_value("A2", 0.25).unwrap();
    sheet
        .set_cell_style("A2", &Style {
            number_format: NumberFormat::percent(),
            ..Style::default()
        })
        .unwrap();

    let back = roundtrip(&wb);
    let sheet = back.worksheet(0).unwrap();
    let date = sheet.cell_style("A1").unwrap().unwrap();
    assert_eq!(date.number_format.code(), "yyyy-mm-dd");
    assert!(date.number_format.is_date_format());
    let percent = sheet.cell_style("A2").unwrap().unwrap();
    assert_eq!(percent.number_format.code(), NumberFormat::percent().code());
}

#[test]
fn test_row_and_column_styles() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_row_style(2, &Style::new().bold(true)).unwrap();
    let italic = sheet.style_pool_mut().get_or_insert(Style::new().italic(true));
    sheet.set_column_style_index(3, Some(italic)).unwrap();

    let back = roundtrip(&wb);
    let sheet = back.worksheet(0).unwrap();
    let row_style = sheet.row_info(2).style_index.unwrap();
    assert_eq!(sheet.style_by_index(row_style), Some(&Style::new().bold(true)));
    let col_style = sheet.column_info(3).style_index.unwrap();
    assert_eq!(sheet.style_by_index(col_style), Some(&Style::new().italic(true)));
}

#[test]
fn test_modified_palette_round_trips() {
    let mut wb = Workbook::new();
    wb.palette_mut().set_color_at_index(8, 1, 2, 3).unwrap();
    wb.palette_mut().set_color_at_index(63, 250, 240, 230).unwrap();

    let back = roundtrip(&wb);
    assert!(back.palette().is_modified());
    assert_eq!(back.palette().color(8), Some((1, 2, 3)));
    assert_eq!(back.palette().color(63), Some((250, 240, 230)));
    assert_eq!(back.palette().color(9), wb.palette().color(9));
}

#[test]
fn test_default_palette_is_not_written() {
    let back = roundtrip(&Workbook::new());
    assert!(!back.palette().is_modified());
}

#[test]
fn test_palette_full_and_bad_index() {
    let mut wb = Workbook::new();
    let palette = wb.palette_mut();
    for i in 0..56u8 {
        palette.add_color(i, 100, 101).unwrap();
    }
    assert!(matches!(palette.add_color(99, 99, 99), Err(Error::PaletteFull(99, 99, 99))));
    assert!(palette.set_color_at_index(7, 0, 0, 0).is_err());
    assert!(palette.set_color_at_index(64, 0, 0, 0).is_err());
}

//! Drawings through whole workbooks: shapes, pictures and comments on
//! several sheets.

use crate::roundtrip;
use binsheets_core::drawing::{ChildAnchor, ClientAnchor, PictureFormat, ShapeAnchor, ShapeKind};
use binsheets_core::{CellComment, Workbook};
use binsheets_xls::{XlsReadOptions, XlsReader, XlsWriter};
use pretty_assertions::assert_eq;

fn drawn_workbook() -> Workbook {
    let mut wb = Workbook::new();
    wb.add_worksheet_with_name("Plain").unwrap();
    wb.add_worksheet_with_name("Pictures").unwrap();
    let jpeg = wb.add_picture(vec![0xFF, 0xD8, 0xFF, 0xE0, 9, 9, 9], PictureFormat::Jpeg);
    let png = wb.add_picture(vec![0x89, b'P', b'N', b'G', 1, 2, 3], PictureFormat::Png);

    let first = wb.worksheet_mut(0).unwrap();
    first.set_cell_value("A1", "shapes here").unwrap();
    let p = first.create_drawing_patriarch();
    p.create_simple_shape(ClientAnchor::from_cells(1, 1, 4, 3).unwrap(), ShapeKind::Rectangle);
    p.create_textbox(ClientAnchor::from_cells(5, 1, 8, 4).unwrap(), "inside a box");
    first
        .set_comment("B2", CellComment::new("Reviewer", "check this"))
        .unwrap();

    let pictures = wb.worksheet_mut(2).unwrap();
    let p = pictures.create_drawing_patriarch();
    p.create_picture(ClientAnchor::from_cells(0, 0, 10, 5).unwrap(), png);
    let group = p.create_group(ClientAnchor::from_cells(12, 0, 20, 6).unwrap());
    p.create_shape_in_group(
        group,
        ChildAnchor::new(0, 0, 512, 128),
        ShapeKind::Picture { picture_index: jpeg },
    )
    .unwrap();
    p.create_shape_in_group(group, ChildAnchor::new(512, 128, 1023, 255), ShapeKind::Oval)
        .unwrap();
    wb
}

#[test]
fn test_shapes_and_comments_across_sheets() {
    let wb = drawn_workbook();
    let back = roundtrip(&wb);

    let first = back.worksheet(0).unwrap();
    let shapes = first.drawing_patriarch().unwrap().shapes();
    assert_eq!(shapes.len(), 2);
    assert_eq!(shapes[0].kind, ShapeKind::Rectangle);
    assert_eq!(
        shapes[1].kind,
        ShapeKind::TextBox {
            text: "inside a box".into()
        }
    );
    let comment = first.comment("B2").unwrap().unwrap();
    assert_eq!(comment.author, "Reviewer");
    assert_eq!(comment.text, "check this");

    assert!(back.worksheet(1).unwrap().drawing_patriarch().is_none());

    let pictures = back.worksheet(2).unwrap().drawing_patriarch().unwrap();
    assert_eq!(pictures.total_shape_count(), 4);
    assert_eq!(pictures.shapes()[0].kind, ShapeKind::Picture { picture_index: 2 });
    let ShapeKind::Group { children, .. } = &pictures.shapes()[1].kind else {
        panic!("expected a group");
    };
    assert_eq!(children[0].kind, ShapeKind::Picture { picture_index: 1 });
    assert_eq!(
        children[1].anchor,
        ShapeAnchor::Child(ChildAnchor::new(512, 128, 1023, 255))
    );
}

#[test]
fn test_pictures_are_carried_opaquely() {
    let wb = drawn_workbook();
    let back = roundtrip(&wb);
    assert_eq!(back.pictures(), wb.pictures());
}

#[test]
fn test_drawings_can_be_skipped() {
    let bytes = XlsWriter::to_bytes(&drawn_workbook()).unwrap();
    let options = XlsReadOptions {
        read_drawings: false,
        ..XlsReadOptions::default()
    };
    let back = XlsReader::read_bytes(&bytes, &options).unwrap();
    assert!(back.worksheet(0).unwrap().drawing_patriarch().is_none());
    assert_eq!(back.worksheet(0).unwrap().comment_count(), 0);
    assert_eq!(
        back.worksheet(0).unwrap().get_value_at(0, 0).as_string(),
        Some("shapes here")
    );
}

#[test]
fn test_shape_ids_are_assigned_per_sheet() {
    let back = roundtrip(&drawn_workbook());
    let first = back.worksheet(0).unwrap().drawing_patriarch().unwrap();
    let third = back.worksheet(2).unwrap().drawing_patriarch().unwrap();
    assert_eq!(first.shapes()[0].shape_id, Some(1025));
    let third_id = third.shapes()[0].shape_id.unwrap();
    assert!(third_id > 2048, "got {third_id}");
}

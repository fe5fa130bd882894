//! # binsheets-core
//!
//! Core data structures for the binsheets spreadsheet library.
//!
//! This crate provides the object model shared by the formula engine and the
//! BIFF8 (`.xls`) reader and writer:
//! - [`CellValue`] - Represents cell values (numbers, strings, booleans, errors, formulas)
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and ranges
//! - [`Style`] - Cell formatting (fonts, fills, borders, etc.)
//! - [`Workbook`], [`Worksheet`] - The main document structures
//! - [`Patriarch`], [`CellComment`], [`Hyperlink`] - Drawings and annotations
//! - [`DataFormatter`] - Render cell values the way Excel displays them
//!
//! ## Example
//!
//! ```rust
//! use binsheets_core::{Workbook, CellValue};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! // Using string addresses
//! sheet.set_cell_value("A1", "Hello").unwrap();
//! sheet.set_cell_value("B1", 42.0).unwrap();
//!
//! // Or using row/column indices (0-based)
//! sheet.set_cell_value_at(1, 0, CellValue::String("World".into())).unwrap();
//! sheet.set_cell_value_at(1, 1, CellValue::Number(3.14)).unwrap();
//! ```

pub mod cell;
pub mod column;
pub mod comment;
pub mod date;
pub mod drawing;
pub mod error;
pub mod format;
pub mod hyperlink;
pub mod named_range;
pub mod palette;
pub mod row;
pub mod style;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{
    quote_sheet_name, CellAddress, CellData, CellError, CellRange, CellType, CellValue,
    SharedString,
};
pub use column::{ColumnData, ColumnInfo};
pub use comment::CellComment;
pub use drawing::{
    AnchorType, ChildAnchor, ClientAnchor, LineStyle, Patriarch, PictureData, PictureFormat,
    Shape, ShapeAnchor, ShapeKind,
};
pub use error::{Error, Result};
pub use format::{BuiltinFormats, DataFormatter};
pub use hyperlink::{Hyperlink, HyperlinkKind};
pub use named_range::{BuiltinName, NameScope, NamedRange, NamedRangeCollection};
pub use palette::Palette;
pub use row::{RowInfo, RowView};
pub use workbook::{Workbook, WorkbookSettings};
pub use worksheet::{FreezePanes, RowShift, SheetVisibility, Worksheet};

// Re-export all style types for convenience
pub use style::{
    Alignment, BorderEdge, BorderLineStyle, BorderStyle, Color, FillStyle, FontStyle,
    HorizontalAlignment, NumberFormat, Protection, Style, StylePool, VerticalAlignment,
};

/// Maximum number of rows in a BIFF8 worksheet
pub const MAX_ROWS: u32 = 65_536;

/// Maximum number of columns in a BIFF8 worksheet
pub const MAX_COLS: u16 = 256;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;

//! # binsheets
//!
//! A Rust library for reading, writing, and calculating Excel 97-2003
//! (`.xls`, BIFF8) workbooks.
//!
//! ## Features
//!
//! - Read and write `.xls` files: cells, styles, palettes, defined names,
//!   hyperlinks, comments, shapes and pictures
//! - Formula parsing, BIFF8 token encoding and workbook recalculation
//! - Row shifting that keeps formulas and names pointing at the right cells
//! - A data formatter that renders values the way Excel displays them
//!
//! ## Example
//!
//! ```rust
//! use binsheets::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", "Hello").unwrap();
//! sheet.set_cell_value("B1", 42.0).unwrap();
//! sheet.set_cell_formula("C1", "=B1*2").unwrap();
//!
//! workbook.calculate().unwrap();
//! let bytes = workbook.to_bytes().unwrap();
//! let back = Workbook::from_bytes(&bytes).unwrap();
//! assert_eq!(back.worksheet(0).unwrap().get_formula_at(0, 2), Some("B1*2"));
//! ```

pub mod calculation;
pub mod prelude;
pub mod shift;

pub use calculation::{CalculationOptions, CalculationStats, WorkbookCalculationExt};
pub use shift::WorkbookShiftExt;

// Re-export core types
pub use binsheets_core::{
    quote_sheet_name, Alignment, BorderEdge, BorderLineStyle, BorderStyle, BuiltinName,
    CellAddress, CellComment, CellData, CellError, CellRange, CellType, CellValue, ChildAnchor,
    ClientAnchor, Color, DataFormatter, Error, FillStyle, FontStyle, FreezePanes,
    HorizontalAlignment, Hyperlink, HyperlinkKind, NameScope, NamedRange, NamedRangeCollection,
    NumberFormat, Palette, Patriarch, PictureData, PictureFormat, Result, RowShift, Shape,
    ShapeAnchor, ShapeKind, SheetVisibility, Style, StylePool, VerticalAlignment, Workbook,
    WorkbookSettings, Worksheet, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use binsheets_formula::{
    evaluate, function_registry, parse_formula, shift_formula, CellKey, DependencyGraph,
    EvaluationContext, FormulaError, FormulaExpr, FormulaResult, FormulaShifter, FormulaValue,
};

// Re-export I/O types
pub use binsheets_xls::biff;
pub use binsheets_xls::{
    SanityChecker, SanityViolation, XlsError, XlsReadOptions, XlsReader, XlsResult,
    XlsWriteOptions, XlsWriter,
};

use std::path::Path;

/// Extension trait for Workbook to add file I/O
pub trait WorkbookExt: Sized {
    /// Open a workbook from an `.xls` file
    fn open<P: AsRef<Path>>(path: P) -> XlsResult<Self>;

    /// Open a workbook with explicit reader options
    ///
    /// With `evaluate_on_load` set, every formula is recalculated before the
    /// workbook is returned.
    fn open_with_options<P: AsRef<Path>>(path: P, options: &XlsReadOptions) -> XlsResult<Self>;

    /// Save the workbook to an `.xls` file
    fn save<P: AsRef<Path>>(&self, path: P) -> XlsResult<()>;

    /// Read a workbook from the bytes of a compound file or a raw BIFF8
    /// stream
    fn from_bytes(bytes: &[u8]) -> XlsResult<Self>;

    /// Serialize the workbook into the bytes of an `.xls` file
    fn to_bytes(&self) -> XlsResult<Vec<u8>>;
}

impl WorkbookExt for Workbook {
    fn open<P: AsRef<Path>>(path: P) -> XlsResult<Workbook> {
        Self::open_with_options(path, &XlsReadOptions::default())
    }

    fn open_with_options<P: AsRef<Path>>(
        path: P,
        options: &XlsReadOptions,
    ) -> XlsResult<Workbook> {
        let path = path.as_ref();
        check_extension(path)?;
        let file = std::fs::File::open(path)?;
        let mut workbook = XlsReader::read_with_options(file, options)?;
        if options.evaluate_on_load {
            workbook.calculate()?;
        }
        Ok(workbook)
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> XlsResult<()> {
        let path = path.as_ref();
        check_extension(path)?;
        XlsWriter::write_file(self, path)
    }

    fn from_bytes(bytes: &[u8]) -> XlsResult<Workbook> {
        XlsReader::read_bytes(bytes, &XlsReadOptions::default())
    }

    fn to_bytes(&self) -> XlsResult<Vec<u8>> {
        XlsWriter::to_bytes(self)
    }
}

fn check_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match extension.as_deref() {
        Some("xls") => Ok(()),
        _ => Err(Error::invalid_argument(format!(
            "Unsupported file format: {}",
            path.display()
        ))),
    }
}

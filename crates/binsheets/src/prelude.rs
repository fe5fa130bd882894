//! Prelude module - common imports for binsheets users
//!
//! ```rust
//! use binsheets::prelude::*;
//! ```

pub use crate::{
    // Style types
    Alignment,
    BorderEdge,
    BorderLineStyle,
    BorderStyle,
    // Calculation types
    CalculationOptions,
    CalculationStats,
    CellAddress,
    // Comments and links
    CellComment,
    CellError,
    CellRange,
    // Cell types
    CellType,
    CellValue,
    Color,
    DataFormatter,
    // Error types
    Error,
    FillStyle,
    FontStyle,
    HorizontalAlignment,
    Hyperlink,
    NumberFormat,
    Result,
    SheetVisibility,
    Style,
    VerticalAlignment,
    // Main types
    Workbook,
    // Extension traits
    WorkbookCalculationExt,
    WorkbookExt,
    WorkbookShiftExt,
    Worksheet,
    // I/O types
    XlsError,
    XlsReadOptions,
    XlsReader,
    XlsWriteOptions,
    XlsWriter,
};

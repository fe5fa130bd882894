//! XLS error types

use thiserror::Error;

/// Result type for XLS operations
pub type XlsResult<T> = std::result::Result<T, XlsError>;

/// Errors that can occur during XLS reading/writing
#[derive(Debug, Error)]
pub enum XlsError {
    /// IO error (also covers CFB errors which use std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A truncated or inconsistent BIFF record
    #[error("Invalid record: {0}")]
    RecordFormat(String),

    /// The workbook is password protected (FILEPASS present)
    #[error("Encrypted workbooks are not supported")]
    Encrypted,

    /// BIFF5 or older
    #[error("Old Excel format is not supported: {0}")]
    OldExcelFormat(String),

    /// Neither a compound file nor a BIFF stream
    #[error("Not an OLE2 compound file or BIFF8 stream")]
    NotOle2,

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] binsheets_core::Error),

    /// Formula token error
    #[error("Formula error: {0}")]
    Formula(#[from] binsheets_formula::FormulaError),
}

impl XlsError {
    pub(crate) fn record(msg: impl Into<String>) -> Self {
        XlsError::RecordFormat(msg.into())
    }
}

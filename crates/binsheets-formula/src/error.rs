//! Formula error types

use crate::dependency::CellKey;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing, evaluation or token coding
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Cells that depend on themselves, directly or through other formulas
    #[error("Circular reference detected: {}", format_cells(.0))]
    CircularReference(Vec<CellKey>),

    /// Reference to invalid cell, sheet or name
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Malformed or unsupported formula token stream
    #[error("Formula token error: {0}")]
    Token(String),
}

fn format_cells(cells: &[CellKey]) -> String {
    cells
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

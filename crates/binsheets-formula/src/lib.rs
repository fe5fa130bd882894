//! # binsheets-formula
//!
//! Formula support for binsheets.
//!
//! This crate provides:
//! - Formula parsing (text → AST) and canonical rendering (AST → text)
//! - Formula evaluation (AST → value) with the built-in function library
//! - Dependency tracking for recalculation order and cycle detection
//! - The BIFF8 parsed-token (`Ptg`) codec used by the XLS reader and writer
//! - Reference rewriting when rows move
//!
//! ## Example
//!
//! ```rust,ignore
//! use binsheets_formula::{parse_formula, evaluate, EvaluationContext};
//!
//! let ast = parse_formula("=SUM(A1:A10)")?;
//! let ctx = EvaluationContext::new(Some(&workbook), 0, 0, 1);
//! let result = evaluate(&ast, &ctx)?;
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod ptg;
pub mod shifter;

pub use ast::{
    BinaryOperator, CellReference, FormulaExpr, NameReference, RangeReference, UnaryOperator,
};
pub use dependency::{CellKey, DependencyGraph};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, function_registry, EvaluationContext, FormulaValue};
pub use parser::parse_formula;
pub use ptg::{
    compile, decode_rgce, encode_rgce, render, FormulaParsingWorkbook, FormulaRenderingWorkbook,
    Ptg,
};
pub use shifter::{shift_formula, FormulaShifter};

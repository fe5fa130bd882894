//! # binsheets-xls
//!
//! Reader and writer for the Excel 97-2003 binary workbook format (BIFF8
//! records inside an OLE2 compound file).
//!
//! ```rust,no_run
//! use binsheets_xls::{XlsReader, XlsWriter};
//!
//! let workbook = XlsReader::read_file("input.xls")?;
//! XlsWriter::write_file(&workbook, "copy.xls")?;
//! # Ok::<(), binsheets_xls::XlsError>(())
//! ```

pub mod biff;
mod drawing;
pub mod error;
pub mod escher;
mod hyperlinks;
mod link_table;
pub mod options;
pub mod reader;
pub mod sanity;
mod sst;
mod styles;
pub mod writer;

pub use error::{XlsError, XlsResult};
pub use options::{XlsReadOptions, XlsWriteOptions};
pub use reader::XlsReader;
pub use sanity::{CheckRecord, Occurrence, SanityChecker, SanityViolation, Substream};
pub use writer::XlsWriter;

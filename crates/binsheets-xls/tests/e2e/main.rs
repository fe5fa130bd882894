//! E2E tests for the XLS reader and writer: fixtures are written in-process,
//! read back with XlsReader, and asserted on.

mod common;
mod reading;
mod roundtrip;

// Re-export common utilities for use in submodules
pub use common::*;

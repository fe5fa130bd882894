//! Common utilities for XLS E2E tests.
//!
//! Fixtures are produced in-process: either by the writer, or record by
//! record with [`BiffBuilder`] when a test needs bytes the writer never
//! produces.

use std::io::{Cursor, Write};

use binsheets_core::Workbook;
use binsheets_xls::biff::records;
use binsheets_xls::{XlsReadOptions, XlsReader, XlsWriter};

/// Appends raw BIFF records to a stream
#[derive(Default)]
pub struct BiffBuilder {
    stream: Vec<u8>,
}

impl BiffBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next record will start at
    pub fn position(&self) -> u32 {
        self.stream.len() as u32
    }

    pub fn record(&mut self, record_type: u16, body: &[u8]) -> &mut Self {
        self.stream.extend_from_slice(&record_type.to_le_bytes());
        self.stream
            .extend_from_slice(&(body.len() as u16).to_le_bytes());
        self.stream.extend_from_slice(body);
        self
    }

    /// Overwrite four bytes at `at`, e.g. a BOUNDSHEET offset
    pub fn patch_u32(&mut self, at: usize, value: u32) {
        self.stream[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn into_stream(self) -> Vec<u8> {
        self.stream
    }
}

pub fn bof(version: u16, substream: u16) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&version.to_le_bytes());
    body.extend_from_slice(&substream.to_le_bytes());
    body.extend_from_slice(&0x0DBBu16.to_le_bytes());
    body.extend_from_slice(&0x07CCu16.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&0x0006u32.to_le_bytes());
    body
}

/// 8-bit length, compressed characters
pub fn short_string(s: &str) -> Vec<u8> {
    let mut out = vec![s.len() as u8, 0];
    out.extend_from_slice(s.as_bytes());
    out
}

/// 16-bit length, compressed characters
pub fn unicode_string(s: &str) -> Vec<u8> {
    let mut out = (s.len() as u16).to_le_bytes().to_vec();
    out.push(0);
    out.extend_from_slice(s.as_bytes());
    out
}

fn cell_header(row: u16, col: u16, xf: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&row.to_le_bytes());
    out.extend_from_slice(&col.to_le_bytes());
    out.extend_from_slice(&xf.to_le_bytes());
    out
}

pub fn number(row: u16, col: u16, value: f64) -> (u16, Vec<u8>) {
    let mut body = cell_header(row, col, 0);
    body.extend_from_slice(&value.to_le_bytes());
    (records::NUMBER, body)
}

pub fn labelsst(row: u16, col: u16, index: u32) -> (u16, Vec<u8>) {
    let mut body = cell_header(row, col, 0);
    body.extend_from_slice(&index.to_le_bytes());
    (records::LABELSST, body)
}

pub fn boolerr(row: u16, col: u16, value: u8, is_error: bool) -> (u16, Vec<u8>) {
    let mut body = cell_header(row, col, 0);
    body.push(value);
    body.push(is_error as u8);
    (records::BOOLERR, body)
}

pub fn sst(strings: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    body.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    for s in strings {
        body.extend_from_slice(&unicode_string(s));
    }
    body
}

/// A workbook stream with one worksheet holding `cells`
pub fn single_sheet_stream(
    globals: &[(u16, Vec<u8>)],
    strings: &[&str],
    cells: &[(u16, Vec<u8>)],
) -> Vec<u8> {
    let mut b = BiffBuilder::new();
    b.record(records::BOF, &bof(records::BIFF8_VERSION, records::BOF_WORKBOOK_GLOBALS));
    b.record(records::CODEPAGE, &1200u16.to_le_bytes());
    for (rt, body) in globals {
        b.record(*rt, body);
    }
    let boundsheet_at = b.position() as usize + 4;
    let mut boundsheet = vec![0u8; 4];
    boundsheet.extend_from_slice(&[0, 0]);
    boundsheet.extend_from_slice(&short_string("Sheet1"));
    b.record(records::BOUNDSHEET, &boundsheet);
    b.record(records::SST, &sst(strings));
    b.record(records::EOF, &[]);

    let sheet_at = b.position();
    b.patch_u32(boundsheet_at, sheet_at);
    b.record(records::BOF, &bof(records::BIFF8_VERSION, records::BOF_WORKSHEET));
    for (rt, body) in cells {
        b.record(*rt, body);
    }
    b.record(records::EOF, &[]);
    b.into_stream()
}

/// Wrap a stream in a compound file under `name`
pub fn compound_file(name: &str, stream: &[u8]) -> Vec<u8> {
    let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    cfb.create_stream(name).unwrap().write_all(stream).unwrap();
    cfb.flush().unwrap();
    cfb.into_inner().into_inner()
}

/// Write to bytes and read back in strict mode
pub fn roundtrip(workbook: &Workbook) -> Workbook {
    let bytes = XlsWriter::to_bytes(workbook).unwrap();
    XlsReader::read_bytes(&bytes, &XlsReadOptions::strict()).unwrap()
}

/// Write to a temporary file and read it back
pub fn roundtrip_via_file(workbook: &Workbook) -> Workbook {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.xls");
    XlsWriter::write_file(workbook, &path).unwrap();
    XlsReader::read_file(&path).unwrap()
}

//! BIFF8 (Binary Interchange File Format) handling.
//!
//! This module provides the record-level abstraction for BIFF8 streams.
//! A BIFF8 stream is a sequence of records, each with a 4-byte header
//! (2 bytes record type + 2 bytes body length) followed by the body.
//!
//! CONTINUE records (type 0x003C) extend the body of the preceding record
//! beyond the 8224-byte per-record limit.

pub mod parser;
pub mod records;
pub mod strings;

use std::io::Write;

use crate::error::{XlsError, XlsResult};

/// Largest record body; longer bodies continue in CONTINUE records
pub const MAX_RECORD_DATA: usize = 8224;

/// A single BIFF8 record (with CONTINUE bodies already merged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiffRecord {
    /// Record type ID (e.g. `records::SST`, `records::NUMBER`).
    pub record_type: u16,
    /// Record body bytes (CONTINUE records have been concatenated).
    pub data: Vec<u8>,
    /// Offsets into `data` where each merged CONTINUE body starts.
    pub continue_offsets: Vec<usize>,
    /// Byte offset of this record's header in the stream.
    pub stream_offset: u64,
}

impl BiffRecord {
    /// Display name of the record type
    pub fn name(&self) -> &'static str {
        records::record_name(self.record_type).unwrap_or("?")
    }
}

/// Reads all BIFF8 records from a stream, merging CONTINUE records
/// into their parent.
///
/// A truncated header or body is an error. Zero bytes after the last
/// record (sector padding) are ignored.
pub fn read_all_records(stream: &[u8], strict: bool) -> XlsResult<Vec<BiffRecord>> {
    let mut records: Vec<BiffRecord> = Vec::new();
    let mut pos = 0usize;

    while pos < stream.len() {
        let after_eof = records.last().map(|r| r.record_type) == Some(records::EOF);
        if after_eof && stream[pos..].iter().all(|&b| b == 0) {
            break;
        }
        if pos + 4 > stream.len() {
            return Err(XlsError::RecordFormat(format!(
                "truncated record header at offset {}",
                pos
            )));
        }
        let record_type = u16::from_le_bytes([stream[pos], stream[pos + 1]]);
        let body_len = u16::from_le_bytes([stream[pos + 2], stream[pos + 3]]) as usize;
        let body_start = pos + 4;
        if body_start + body_len > stream.len() {
            return Err(XlsError::RecordFormat(format!(
                "record 0x{:04X} at offset {} needs {} bytes, {} left",
                record_type,
                pos,
                body_len,
                stream.len() - body_start
            )));
        }
        let body = &stream[body_start..body_start + body_len];

        if record_type == records::CONTINUE {
            match records.last_mut() {
                Some(prev) => {
                    prev.continue_offsets.push(prev.data.len());
                    prev.data.extend_from_slice(body);
                }
                None if strict => {
                    return Err(XlsError::record("CONTINUE record without a preceding record"));
                }
                None => log::warn!("dropping orphan CONTINUE record at offset {}", pos),
            }
        } else {
            records.push(BiffRecord {
                record_type,
                data: body.to_vec(),
                continue_offsets: Vec::new(),
                stream_offset: pos as u64,
            });
        }
        pos = body_start + body_len;
    }

    log::debug!("read {} BIFF records ({} bytes)", records.len(), stream.len());
    Ok(records)
}

/// Extract the BOF record fields from a record body.
///
/// Returns `(version, substream_type)`.
/// - `version` should be `0x0600` for BIFF8
/// - `substream_type`: 0x0005 = workbook globals, 0x0010 = worksheet, etc.
pub fn parse_bof(data: &[u8]) -> XlsResult<(u16, u16)> {
    if data.len() < 4 {
        return Err(XlsError::record("BOF record too short"));
    }
    let version = u16::from_le_bytes([data[0], data[1]]);
    let dt = u16::from_le_bytes([data[2], data[3]]);
    Ok((version, dt))
}

/// Writes BIFF records, splitting long bodies into CONTINUE records
pub struct RecordWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.position
    }

    fn write_physical(&mut self, record_type: u16, body: &[u8]) -> XlsResult<()> {
        let mut header = [0u8; 4];
        header[..2].copy_from_slice(&record_type.to_le_bytes());
        header[2..].copy_from_slice(&(body.len() as u16).to_le_bytes());
        self.inner.write_all(&header)?;
        self.inner.write_all(body)?;
        self.position += 4 + body.len() as u64;
        Ok(())
    }

    /// Write one record; bodies over 8224 bytes continue in CONTINUE records
    pub fn write_record(&mut self, record_type: u16, data: &[u8]) -> XlsResult<()> {
        let mut chunks = data.chunks(MAX_RECORD_DATA);
        self.write_physical(record_type, chunks.next().unwrap_or(&[]))?;
        for chunk in chunks {
            self.write_physical(records::CONTINUE, chunk)?;
        }
        Ok(())
    }

    /// Write one record, starting a CONTINUE record at each offset in `breaks`
    pub fn write_record_with_breaks(
        &mut self,
        record_type: u16,
        data: &[u8],
        breaks: &[usize],
    ) -> XlsResult<()> {
        let mut start = 0usize;
        let ends = breaks.iter().copied().chain(std::iter::once(data.len()));
        for (i, end) in ends.enumerate() {
            if end < start || end > data.len() || end - start > MAX_RECORD_DATA {
                return Err(XlsError::RecordFormat(format!(
                    "invalid CONTINUE break {} in a {}-byte record",
                    end,
                    data.len()
                )));
            }
            let rt = if i == 0 { record_type } else { records::CONTINUE };
            self.write_physical(rt, &data[start..end])?;
            start = end;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(record_type: u16, body: &[u8]) -> Vec<u8> {
        let mut out = record_type.to_le_bytes().to_vec();
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_continue_is_merged_with_offsets() {
        let mut stream = raw(records::SST, &[1, 2, 3]);
        stream.extend(raw(records::CONTINUE, &[4, 5]));
        stream.extend(raw(records::EOF, &[]));
        let recs = read_all_records(&stream, true).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].data, vec![1, 2, 3, 4, 5]);
        assert_eq!(recs[0].continue_offsets, vec![3]);
        assert_eq!(recs[1].stream_offset, 13);
    }

    #[test]
    fn test_truncated_body_fails() {
        let mut stream = raw(records::NUMBER, &[0; 14]);
        stream.truncate(10);
        assert!(matches!(
            read_all_records(&stream, false),
            Err(XlsError::RecordFormat(_))
        ));
    }

    #[test]
    fn test_orphan_continue() {
        let mut stream = raw(records::CONTINUE, &[1]);
        stream.extend(raw(records::EOF, &[]));
        assert!(read_all_records(&stream, true).is_err());
        let recs = read_all_records(&stream, false).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].record_type, records::EOF);
    }

    #[test]
    fn test_padding_after_eof_is_ignored() {
        let mut stream = raw(records::EOF, &[]);
        stream.extend([0u8; 12]);
        assert_eq!(read_all_records(&stream, true).unwrap().len(), 1);
    }

    #[test]
    fn test_long_record_is_split() {
        let body: Vec<u8> = (0..20_000u32).map(|i| i as u8).collect();
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(records::MSODRAWINGGROUP, &body).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), body.len() + 3 * 4);

        let recs = read_all_records(&bytes, true).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].data, body);
        assert_eq!(recs[0].continue_offsets, vec![8224, 16448]);
    }

    #[test]
    fn test_explicit_breaks() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record_with_breaks(records::TXO, &[1, 2, 3, 4], &[1, 3]).unwrap();
        assert_eq!(writer.position(), 16);
        let recs = read_all_records(&writer.into_inner(), true).unwrap();
        assert_eq!(recs[0].continue_offsets, vec![1, 3]);

        let mut writer = RecordWriter::new(Vec::new());
        assert!(writer
            .write_record_with_breaks(records::TXO, &[1, 2], &[3])
            .is_err());
    }
}

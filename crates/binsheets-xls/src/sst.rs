//! Shared string table (SST) and its EXTSST index
//!
//! Cell strings live once in the SST; LABELSST records refer to them by
//! index. The table routinely outgrows one record, so it continues in
//! CONTINUE records. A string header never straddles a boundary, but its
//! characters may: each continuation of character data starts with a fresh
//! flags byte.

use std::io::Write;

use ahash::AHashMap;

use crate::biff::parser::WriteLe;
use crate::biff::records;
use crate::biff::strings::{char_count, is_compressible, ContinuedReader};
use crate::biff::{RecordWriter, MAX_RECORD_DATA};
use crate::error::{XlsError, XlsResult};

/// Strings per EXTSST bucket
pub const STRINGS_PER_BUCKET: usize = 8;

const STRING_HEADER_LEN: usize = 3;

/// Interns cell strings in first-use order
#[derive(Debug, Default)]
pub struct SstBuilder {
    strings: Vec<String>,
    index: AHashMap<String, u32>,
    total: u32,
}

/// One EXTSST bucket: where its first string starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtSstBucket {
    /// Absolute stream position of the string header
    pub stream_position: u32,
    /// Offset of the string header from the start of its record (header included)
    pub record_offset: u16,
}

impl SstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a reference to `s` and return its index
    pub fn add(&mut self, s: &str) -> u32 {
        self.total += 1;
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    /// Number of unique strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Number of references counted by [`add`](Self::add)
    pub fn total_count(&self) -> u32 {
        self.total
    }

    /// Lay out the SST body, returning it with its CONTINUE breaks and the
    /// body offset of every bucket's first string
    fn layout(&self) -> XlsResult<(Vec<u8>, Vec<usize>, Vec<usize>)> {
        let mut data = Vec::new();
        let mut breaks = Vec::new();
        let mut bucket_starts = Vec::new();
        let mut chunk_start = 0usize;

        data.put_u32(self.total);
        data.put_u32(self.strings.len() as u32);

        for (i, s) in self.strings.iter().enumerate() {
            let count = char_count(s);
            if count > u16::MAX as usize {
                return Err(XlsError::Core(binsheets_core::Error::InvalidArgument(format!(
                    "shared string of {} characters exceeds the BIFF8 limit",
                    count
                ))));
            }
            let wide = !is_compressible(s);
            let char_size = if wide { 2 } else { 1 };

            // keep the header and at least one character together
            let first_piece = STRING_HEADER_LEN + if count > 0 { char_size } else { 0 };
            if MAX_RECORD_DATA - (data.len() - chunk_start) < first_piece {
                breaks.push(data.len());
                chunk_start = data.len();
            }
            if i % STRINGS_PER_BUCKET == 0 {
                bucket_starts.push(data.len());
            }

            data.put_u16(count as u16);
            data.put_u8(u8::from(wide));

            let units: Vec<u16> = s.encode_utf16().collect();
            let mut done = 0usize;
            while done < units.len() {
                let room = (MAX_RECORD_DATA - (data.len() - chunk_start)) / char_size;
                if room == 0 {
                    breaks.push(data.len());
                    chunk_start = data.len();
                    data.put_u8(u8::from(wide));
                    continue;
                }
                let n = room.min(units.len() - done);
                for &unit in &units[done..done + n] {
                    if wide {
                        data.put_u16(unit);
                    } else {
                        data.put_u8(unit as u8);
                    }
                }
                done += n;
            }
        }
        Ok((data, breaks, bucket_starts))
    }

    /// Write SST and its CONTINUE records, returning the EXTSST buckets
    pub fn write<W: Write>(&self, out: &mut RecordWriter<W>) -> XlsResult<Vec<ExtSstBucket>> {
        let (data, breaks, bucket_starts) = self.layout()?;
        let base = out.position();
        out.write_record_with_breaks(records::SST, &data, &breaks)?;

        let buckets = bucket_starts
            .into_iter()
            .map(|offset| {
                // records before this offset each add a 4-byte header
                let record = breaks.iter().take_while(|&&b| b <= offset).count();
                let record_start = if record == 0 { 0 } else { breaks[record - 1] };
                ExtSstBucket {
                    stream_position: (base + 4 * (record as u64 + 1) + offset as u64) as u32,
                    record_offset: (4 + offset - record_start) as u16,
                }
            })
            .collect();
        log::debug!(
            "wrote SST: {} unique strings, {} references, {} continuations",
            self.strings.len(),
            self.total,
            breaks.len()
        );
        Ok(buckets)
    }
}

/// Write the EXTSST record for the buckets returned by [`SstBuilder::write`]
pub fn write_extsst<W: Write>(out: &mut RecordWriter<W>, buckets: &[ExtSstBucket]) -> XlsResult<()> {
    let mut data = Vec::with_capacity(2 + buckets.len() * 8);
    data.put_u16(STRINGS_PER_BUCKET as u16);
    for bucket in buckets {
        data.put_u32(bucket.stream_position);
        data.put_u16(bucket.record_offset);
        data.put_u16(0);
    }
    out.write_record(records::EXTSST, &data)
}

/// Parse the SST from its merged body and CONTINUE boundaries
///
/// A table that ends early is returned as far as it goes in lenient mode.
pub fn parse_sst(
    data: &[u8],
    continue_offsets: &[usize],
    codepage: u16,
    strict: bool,
) -> XlsResult<Vec<String>> {
    let mut reader = ContinuedReader::new(data, continue_offsets, codepage);
    let _total = reader.read_u32()?;
    let unique = reader.read_u32()? as usize;

    let mut strings = Vec::with_capacity(unique.min(data.len() / STRING_HEADER_LEN));
    for i in 0..unique {
        match reader.read_unicode_string() {
            Ok(s) => strings.push(s),
            Err(e) if !strict => {
                log::warn!("SST truncated at string {}/{}: {}", i, unique, e);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(strings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::read_all_records;
    use crate::biff::strings::CODEPAGE_UTF16;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn round_trip(strings: &[String]) -> (Vec<String>, Vec<u8>, Vec<ExtSstBucket>) {
        let mut sst = SstBuilder::new();
        for s in strings {
            sst.add(s);
        }
        let mut writer = RecordWriter::new(Vec::new());
        // something before the SST so that positions are not zero-based
        writer.write_record(records::CODEPAGE, &[0xB0, 0x04]).unwrap();
        let buckets = sst.write(&mut writer).unwrap();
        let bytes = writer.into_inner();
        let recs = read_all_records(&bytes, true).unwrap();
        let parsed = parse_sst(&recs[1].data, &recs[1].continue_offsets, CODEPAGE_UTF16, true).unwrap();
        (parsed, bytes, buckets)
    }

    #[test]
    fn test_interning_counts_references() {
        let mut sst = SstBuilder::new();
        assert_eq!(sst.add("a"), 0);
        assert_eq!(sst.add("b"), 1);
        assert_eq!(sst.add("a"), 0);
        assert_eq!(sst.len(), 2);
        assert_eq!(sst.total_count(), 3);
    }

    #[test]
    fn test_small_table() {
        let strings = vec!["Hello".to_string(), "Wörld".to_string(), "日本".to_string()];
        let (parsed, _, buckets) = round_trip(&strings);
        assert_eq!(parsed, strings);
        assert_eq!(buckets.len(), 1);
        // CODEPAGE record (6 bytes), SST header (4), counts (8)
        assert_eq!(buckets[0].stream_position, 6 + 4 + 8);
        assert_eq!(buckets[0].record_offset, 12);
    }

    #[test]
    fn test_long_string_continues_with_flag_byte() {
        let long = "x".repeat(10_000);
        let (parsed, bytes, _) = round_trip(&[long.clone()]);
        assert_eq!(parsed, vec![long]);
        let recs = read_all_records(&bytes, true).unwrap();
        let sst = &recs[1];
        assert_eq!(sst.continue_offsets.len(), 1);
        // the continuation starts with a compressed flags byte
        assert_eq!(sst.data[sst.continue_offsets[0]], 0);
    }

    #[test]
    fn test_bucket_positions_point_at_string_headers() {
        let strings: Vec<String> = (0..3000).map(|i| format!("string number {}", i)).collect();
        let (parsed, bytes, buckets) = round_trip(&strings);
        assert_eq!(parsed, strings);
        assert_eq!(buckets.len(), 375);
        for (b, bucket) in buckets.iter().enumerate() {
            let pos = bucket.stream_position as usize;
            let expected = &strings[b * STRINGS_PER_BUCKET];
            let cch = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
            assert_eq!(cch, expected.len());
            assert_eq!(bytes[pos + 3], expected.as_bytes()[0]);
        }
    }

    #[test]
    fn test_truncated_table() {
        let mut data = Vec::new();
        data.put_u32(2);
        data.put_u32(2);
        data.extend_from_slice(&[1, 0, 0, b'a']);
        assert_eq!(parse_sst(&data, &[], CODEPAGE_UTF16, false).unwrap(), vec!["a"]);
        assert!(parse_sst(&data, &[], CODEPAGE_UTF16, true).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn continue_splitting_preserves_strings(
            strings in prop::collection::vec("[a-z\u{e9}\u{3b1}-\u{3c9}\u{4e00}-\u{4e20}]{0,3000}", 1..12)
        ) {
            let mut unique = Vec::new();
            for s in strings {
                if !unique.contains(&s) {
                    unique.push(s);
                }
            }
            let (parsed, bytes, _) = round_trip(&unique);
            prop_assert_eq!(parsed, unique);
            let recs = read_all_records(&bytes, true).unwrap();
            for window in std::iter::once(0).chain(recs[1].continue_offsets.iter().copied()).collect::<Vec<_>>().windows(2) {
                prop_assert!(window[1] - window[0] <= MAX_RECORD_DATA);
            }
        }
    }
}

//! BIFF8 Unicode string decoding and encoding.
//!
//! BIFF8 strings have a complex encoding:
//! - Header: char_count (1 or 2 bytes) + flags (1 byte)
//! - Flags bit 0 (`fHighByte`): 0 = compressed 8-bit, 1 = uncompressed UTF-16LE
//! - Flags bit 2 (`fExtSt`): extended string data follows (Asian phonetic)
//! - Flags bit 3 (`fRichSt`): rich text run array follows
//! - If fRichSt: 2-byte run count follows the flags
//! - If fExtSt: 4-byte extended data size follows
//! - Then the character data
//! - Then the rich text runs (4 bytes each) if fRichSt
//! - Then the extended data if fExtSt
//!
//! In SST and TXO records, character data can span CONTINUE records. Each
//! continuation of character data starts with a new flags byte that may
//! switch between compressed and uncompressed.
//!
//! Compressed characters are decoded with the workbook code page. Code page
//! 1200 (written by every BIFF8 producer we know of) means the bytes are the
//! low halves of UTF-16 code units, i.e. Latin-1.

use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};

use encoding_rs::Encoding;

use super::parser::{read_u16, read_u32, read_u8, WriteLe};
use crate::error::{XlsError, XlsResult};

/// Code page of BIFF8 files: compressed strings are Latin-1
pub const CODEPAGE_UTF16: u16 = 1200;

/// Code page assumed when a stream has no CODEPAGE record
pub const DEFAULT_CODEPAGE: u16 = 1252;

const FLAG_WIDE: u8 = 0x01;
const FLAG_EXT: u8 = 0x04;
const FLAG_RICH: u8 = 0x08;

fn encoding_for_codepage(codepage: u16) -> Option<&'static Encoding> {
    use encoding_rs::*;
    Some(match codepage {
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1252 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        65001 => UTF_8,
        _ => return None,
    })
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Decode compressed (8-bit) character data
pub fn decode_compressed(bytes: &[u8], codepage: u16) -> String {
    if codepage == CODEPAGE_UTF16 || bytes.is_ascii() {
        return latin1(bytes);
    }
    match encoding_for_codepage(codepage) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => {
            warn_unsupported_codepage(codepage);
            latin1(bytes)
        }
    }
}

fn warn_unsupported_codepage(codepage: u16) {
    static WARNED: OnceLock<Mutex<BTreeSet<u16>>> = OnceLock::new();
    let warned = WARNED.get_or_init(|| Mutex::new(BTreeSet::new()));
    let mut warned = match warned.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if warned.insert(codepage) {
        log::warn!("unsupported code page {}, decoding 8-bit strings as Latin-1", codepage);
    }
}

fn decode_wide(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Read a BIFF8 "short" string (1-byte length prefix, used in BOUNDSHEET etc.).
pub fn read_short_string(data: &[u8], offset: &mut usize, codepage: u16) -> XlsResult<String> {
    let char_count = read_u8(data, offset)? as usize;
    let flags = read_u8(data, offset)?;
    read_chars(data, offset, char_count, flags & FLAG_WIDE != 0, codepage)
}

/// Read a BIFF8 Unicode string with a 2-byte length prefix (used in LABEL, FORMAT, etc.).
///
/// Rich text runs and phonetic data are skipped. This does not handle
/// CONTINUE boundaries; use [`ContinuedReader`] for SST and TXO.
pub fn read_unicode_string(data: &[u8], offset: &mut usize, codepage: u16) -> XlsResult<String> {
    let char_count = read_u16(data, offset)? as usize;
    let flags = read_u8(data, offset)?;

    let run_count = if flags & FLAG_RICH != 0 { read_u16(data, offset)? } else { 0 };
    let ext_size = if flags & FLAG_EXT != 0 { read_u32(data, offset)? } else { 0 };

    let text = read_chars(data, offset, char_count, flags & FLAG_WIDE != 0, codepage)?;

    *offset += run_count as usize * 4 + ext_size as usize;
    Ok(text)
}

/// Read character data (no header) given the character count and width.
pub fn read_chars(
    data: &[u8],
    offset: &mut usize,
    char_count: usize,
    wide: bool,
    codepage: u16,
) -> XlsResult<String> {
    let byte_len = if wide { char_count * 2 } else { char_count };
    if *offset + byte_len > data.len() {
        return Err(XlsError::RecordFormat(format!(
            "string data too short: need {} bytes at offset {}, have {}",
            byte_len,
            *offset,
            data.len().saturating_sub(*offset)
        )));
    }
    let bytes = &data[*offset..*offset + byte_len];
    *offset += byte_len;
    Ok(if wide {
        decode_wide(bytes)
    } else {
        decode_compressed(bytes, codepage)
    })
}

/// Sequential reader over a record body whose CONTINUE boundaries are known
///
/// Fixed-size fields are read straight across boundaries. Character data
/// that reaches a boundary picks up the flags byte the continuation starts
/// with.
pub struct ContinuedReader<'a> {
    data: &'a [u8],
    breaks: &'a [usize],
    pos: usize,
    codepage: u16,
}

impl<'a> ContinuedReader<'a> {
    pub fn new(data: &'a [u8], breaks: &'a [usize], codepage: u16) -> Self {
        Self {
            data,
            breaks,
            pos: 0,
            codepage,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> XlsResult<u8> {
        read_u8(self.data, &mut self.pos)
    }

    pub fn read_u16(&mut self) -> XlsResult<u16> {
        read_u16(self.data, &mut self.pos)
    }

    pub fn read_u32(&mut self) -> XlsResult<u32> {
        read_u32(self.data, &mut self.pos)
    }

    pub fn skip(&mut self, len: usize) -> XlsResult<()> {
        if self.pos + len > self.data.len() {
            return Err(XlsError::record("skip past the end of the record"));
        }
        self.pos += len;
        Ok(())
    }

    fn at_break(&self) -> bool {
        self.pos < self.data.len() && self.breaks.binary_search(&self.pos).is_ok()
    }

    fn fragment_end(&self) -> usize {
        self.breaks
            .iter()
            .copied()
            .find(|&b| b > self.pos)
            .unwrap_or(self.data.len())
            .min(self.data.len())
    }

    /// Read a string with a 2-byte length prefix
    pub fn read_unicode_string(&mut self) -> XlsResult<String> {
        let char_count = self.read_u16()? as usize;
        let flags = self.read_u8()?;
        let run_count = if flags & FLAG_RICH != 0 { self.read_u16()? } else { 0 };
        let ext_size = if flags & FLAG_EXT != 0 { self.read_u32()? } else { 0 };
        let text = self.read_chars(char_count, flags & FLAG_WIDE != 0)?;
        self.skip(run_count as usize * 4 + ext_size as usize)?;
        Ok(text)
    }

    /// Read `char_count` characters starting out compressed or wide
    pub fn read_chars(&mut self, char_count: usize, wide: bool) -> XlsResult<String> {
        let mut wide = wide;
        let mut left = char_count;
        // units are collected first so that a surrogate pair split by a
        // boundary is joined again
        let mut units: Vec<u16> = Vec::with_capacity(char_count);

        while left > 0 {
            if self.at_break() {
                wide = self.read_u8()? & FLAG_WIDE != 0;
            }
            let size = if wide { 2 } else { 1 };
            let available = (self.fragment_end() - self.pos) / size;
            let n = available.min(left);
            if n == 0 {
                if self.fragment_end() >= self.data.len() {
                    return Err(XlsError::RecordFormat(format!(
                        "string data truncated with {} of {} characters left",
                        left, char_count
                    )));
                }
                // an odd byte before the boundary cannot hold a wide character
                self.pos = self.fragment_end();
                continue;
            }
            let bytes = &self.data[self.pos..self.pos + n * size];
            if wide {
                units.extend(
                    bytes
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
                );
            } else {
                units.extend(decode_compressed(bytes, self.codepage).encode_utf16());
            }
            self.pos += n * size;
            left -= n;
        }
        Ok(String::from_utf16_lossy(&units))
    }
}

/// Whether every character fits the compressed (Latin-1) form
pub fn is_compressible(s: &str) -> bool {
    s.chars().all(|c| (c as u32) <= 0xFF)
}

/// Number of UTF-16 code units, the unit BIFF8 counts characters in
pub fn char_count(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Append the characters of `s`, compressed or as UTF-16LE
pub fn write_chars(out: &mut Vec<u8>, s: &str, wide: bool) {
    if wide {
        for unit in s.encode_utf16() {
            out.put_u16(unit);
        }
    } else {
        out.extend(s.chars().map(|c| c as u32 as u8));
    }
}

fn too_long(s: &str, max: usize) -> XlsError {
    XlsError::Core(binsheets_core::Error::InvalidArgument(format!(
        "string of {} characters exceeds the BIFF8 limit of {}",
        char_count(s),
        max
    )))
}

/// Append a string with a 1-byte length prefix
pub fn write_short_string(out: &mut Vec<u8>, s: &str) -> XlsResult<()> {
    let count = char_count(s);
    if count > u8::MAX as usize {
        return Err(too_long(s, u8::MAX as usize));
    }
    let wide = !is_compressible(s);
    out.put_u8(count as u8);
    out.put_u8(if wide { FLAG_WIDE } else { 0 });
    write_chars(out, s, wide);
    Ok(())
}

/// Append a string with a 2-byte length prefix
pub fn write_unicode_string(out: &mut Vec<u8>, s: &str) -> XlsResult<()> {
    let count = char_count(s);
    if count > u16::MAX as usize {
        return Err(too_long(s, u16::MAX as usize));
    }
    let wide = !is_compressible(s);
    out.put_u16(count as u16);
    out.put_u8(if wide { FLAG_WIDE } else { 0 });
    write_chars(out, s, wide);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_compressed_string() {
        let data = [0x03, 0x00, 0x00, b'A', b'B', b'C'];
        let mut offset = 0;
        let s = read_unicode_string(&data, &mut offset, CODEPAGE_UTF16).unwrap();
        assert_eq!(s, "ABC");
        assert_eq!(offset, 6);
    }

    #[test]
    fn test_read_wide_string() {
        let data = [0x02, 0x00, 0x01, b'H', 0x00, b'i', 0x00];
        let mut offset = 0;
        let s = read_unicode_string(&data, &mut offset, CODEPAGE_UTF16).unwrap();
        assert_eq!(s, "Hi");
        assert_eq!(offset, 7);
    }

    #[test]
    fn test_read_short_string() {
        let data = [0x02, 0x00, b'O', b'K'];
        let mut offset = 0;
        let s = read_short_string(&data, &mut offset, CODEPAGE_UTF16).unwrap();
        assert_eq!(s, "OK");
    }

    #[test]
    fn test_rich_and_phonetic_data_is_skipped() {
        let mut data = vec![0x02, 0x00, FLAG_RICH | FLAG_EXT];
        data.extend_from_slice(&1u16.to_le_bytes()); // one run
        data.extend_from_slice(&3u32.to_le_bytes()); // three bytes of phonetic data
        data.extend_from_slice(b"ab");
        data.extend_from_slice(&[0, 0, 1, 0]); // run
        data.extend_from_slice(&[9, 9, 9]); // phonetic
        data.push(0x7E);
        let mut offset = 0;
        assert_eq!(read_unicode_string(&data, &mut offset, CODEPAGE_UTF16).unwrap(), "ab");
        assert_eq!(data[offset], 0x7E);
    }

    #[test]
    fn test_code_pages() {
        // 0x80 is the euro sign in windows-1252 and a control character in Latin-1
        assert_eq!(decode_compressed(&[0x80], 1252), "\u{20AC}");
        assert_eq!(decode_compressed(&[0x80], CODEPAGE_UTF16), "\u{80}");
        assert_eq!(decode_compressed(&[0xC0], 1251), "\u{0410}");
        // unknown code pages fall back to Latin-1
        assert_eq!(decode_compressed(&[0xE9], 37), "\u{E9}");
    }

    #[test]
    fn test_truncated_string_is_a_record_error() {
        let data = [0x05, 0x00, 0x00, b'A'];
        let mut offset = 0;
        assert!(matches!(
            read_unicode_string(&data, &mut offset, CODEPAGE_UTF16),
            Err(XlsError::RecordFormat(_))
        ));
    }

    #[test]
    fn test_continued_chars_switch_width_at_boundary() {
        // "abcd": two compressed chars, then a continuation flagged wide
        let mut data = vec![0x04, 0x00, 0x00, b'a', b'b'];
        let boundary = data.len();
        data.push(FLAG_WIDE);
        data.extend_from_slice(&[b'c', 0, b'd', 0]);
        let breaks = [boundary];
        let mut reader = ContinuedReader::new(&data, &breaks, CODEPAGE_UTF16);
        assert_eq!(reader.read_unicode_string().unwrap(), "abcd");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_continued_chars_starting_at_boundary() {
        // header fills the first fragment, characters start in the continuation
        let data = [0x02, 0x00, 0x01, 0x00, b'x', b'y'];
        let breaks = [3];
        let mut reader = ContinuedReader::new(&data, &breaks, CODEPAGE_UTF16);
        assert_eq!(reader.read_unicode_string().unwrap(), "xy");
    }

    #[test]
    fn test_write_strings() {
        let mut out = Vec::new();
        write_unicode_string(&mut out, "Hé").unwrap();
        assert_eq!(out, vec![0x02, 0x00, 0x00, b'H', 0xE9]);

        out.clear();
        write_short_string(&mut out, "Ω").unwrap();
        assert_eq!(out, vec![0x01, 0x01, 0xA9, 0x03]);

        let mut offset = 0;
        assert_eq!(read_short_string(&out, &mut offset, CODEPAGE_UTF16).unwrap(), "Ω");
    }

    #[test]
    fn test_short_string_limit() {
        let mut out = Vec::new();
        assert!(write_short_string(&mut out, &"x".repeat(256)).is_err());
    }
}

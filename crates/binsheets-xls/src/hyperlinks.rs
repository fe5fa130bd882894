//! HLINK and HLINKTOOLTIP records
//!
//! An HLINK body is a cell range followed by a serialized hyperlink object:
//! a fixed CLSID, a flag word, and optional parts in a fixed order (display
//! name, frame, moniker, location). Web and e-mail targets use a URL
//! moniker, files a file moniker, and links into the workbook carry only a
//! location string.

use binsheets_core::{CellRange, Hyperlink, HyperlinkKind};

use crate::biff::parser::{read_bytes, read_u16, read_u32, WriteLe};
use crate::error::{XlsError, XlsResult};

const STD_LINK: [u8; 16] = [
    0xD0, 0xC9, 0xEA, 0x79, 0xF9, 0xBA, 0xCE, 0x11, 0x8C, 0x82, 0x00, 0xAA, 0x00, 0x4B, 0xA9, 0x0B,
];
const URL_MONIKER: [u8; 16] = [
    0xE0, 0xC9, 0xEA, 0x79, 0xF9, 0xBA, 0xCE, 0x11, 0x8C, 0x82, 0x00, 0xAA, 0x00, 0x4B, 0xA9, 0x0B,
];
const FILE_MONIKER: [u8; 16] = [
    0x03, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

const HAS_MONIKER: u32 = 0x0001;
const IS_ABSOLUTE: u32 = 0x0002;
const SITE_GAVE_DISPLAY_NAME: u32 = 0x0004;
const HAS_LOCATION: u32 = 0x0008;
const HAS_DISPLAY_NAME: u32 = 0x0010;
const HAS_FRAME_NAME: u32 = 0x0080;
const MONIKER_AS_STRING: u32 = 0x0100;

const PARENT_DIR: &str = "..\\";

/// Record id repeated at the start of an HLINKTOOLTIP body
const TOOLTIP_FRT: u16 = 0x0800;

fn read_range(data: &[u8], off: &mut usize) -> XlsResult<CellRange> {
    let first_row = read_u16(data, off)? as u32;
    let last_row = read_u16(data, off)? as u32;
    let first_col = read_u16(data, off)?;
    let last_col = read_u16(data, off)?;
    Ok(CellRange::from_indices(first_row, first_col, last_row, last_col))
}

fn write_range(out: &mut Vec<u8>, range: &CellRange) {
    out.put_u16(range.start.row as u16);
    out.put_u16(range.end.row as u16);
    out.put_u16(range.start.col);
    out.put_u16(range.end.col);
}

fn utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

fn put_utf16(out: &mut Vec<u8>, s: &str, terminate: bool) {
    for unit in s.encode_utf16() {
        out.put_u16(unit);
    }
    if terminate {
        out.put_u16(0);
    }
}

/// Character count (NUL included), then UTF-16 characters
fn read_counted_string(data: &[u8], off: &mut usize) -> XlsResult<String> {
    let chars = read_u32(data, off)? as usize;
    let bytes = read_bytes(data, off, chars.saturating_mul(2))?;
    Ok(utf16(bytes))
}

fn write_counted_string(out: &mut Vec<u8>, s: &str) {
    out.put_u32(s.encode_utf16().count() as u32 + 1);
    put_utf16(out, s, true);
}

fn read_url_moniker(data: &[u8], off: &mut usize) -> XlsResult<String> {
    let len = read_u32(data, off)? as usize;
    // the string may be followed by a serialization GUID inside `len`
    Ok(utf16(read_bytes(data, off, len)?))
}

fn read_file_moniker(data: &[u8], off: &mut usize) -> XlsResult<String> {
    let anti = read_u16(data, off)? as usize;
    let ansi_len = read_u32(data, off)? as usize;
    let ansi = read_bytes(data, off, ansi_len)?;
    let _end_server = read_u16(data, off)?;
    let _version = read_u16(data, off)?;
    read_bytes(data, off, 20)?;
    let unicode_size = read_u32(data, off)? as usize;

    let path = if unicode_size > 0 {
        let bytes_len = read_u32(data, off)? as usize;
        let _key = read_u16(data, off)?;
        utf16(read_bytes(data, off, bytes_len)?)
    } else {
        ansi.iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    };
    Ok(format!("{}{}", PARENT_DIR.repeat(anti), path))
}

fn write_file_moniker(out: &mut Vec<u8>, path: &str) {
    let mut rest = path;
    let mut anti = 0u16;
    while let Some(stripped) = rest.strip_prefix(PARENT_DIR) {
        rest = stripped;
        anti += 1;
    }
    out.extend_from_slice(&FILE_MONIKER);
    out.put_u16(anti);

    let ansi: Vec<u8> = rest
        .chars()
        .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
        .collect();
    out.put_u32(ansi.len() as u32 + 1);
    out.extend_from_slice(&ansi);
    out.put_u8(0);
    out.put_u16(0xFFFF);
    out.put_u16(0xDEAD);
    out.extend_from_slice(&[0u8; 20]);

    if rest.is_ascii() {
        out.put_u32(0);
    } else {
        let units = rest.encode_utf16().count() as u32;
        out.put_u32(6 + units * 2);
        out.put_u32(units * 2);
        out.put_u16(3);
        put_utf16(out, rest, false);
    }
}

/// Decode an HLINK record body
pub fn parse_hlink(data: &[u8]) -> XlsResult<Hyperlink> {
    let mut off = 0;
    let range = read_range(data, &mut off)?;
    let clsid = read_bytes(data, &mut off, 16)?;
    if clsid != STD_LINK {
        return Err(XlsError::record("HLINK without the standard link CLSID"));
    }
    let _version = read_u32(data, &mut off)?;
    let flags = read_u32(data, &mut off)?;

    let label = if flags & HAS_DISPLAY_NAME != 0 {
        Some(read_counted_string(data, &mut off)?)
    } else {
        None
    };
    if flags & HAS_FRAME_NAME != 0 {
        read_counted_string(data, &mut off)?;
    }

    let mut target: Option<(HyperlinkKind, String)> = None;
    if flags & HAS_MONIKER != 0 {
        if flags & MONIKER_AS_STRING != 0 {
            target = Some((HyperlinkKind::Url, read_counted_string(data, &mut off)?));
        } else {
            let moniker = read_bytes(data, &mut off, 16)?;
            if moniker == URL_MONIKER {
                target = Some((HyperlinkKind::Url, read_url_moniker(data, &mut off)?));
            } else if moniker == FILE_MONIKER {
                target = Some((HyperlinkKind::File, read_file_moniker(data, &mut off)?));
            } else {
                return Err(XlsError::record("HLINK with an unsupported moniker"));
            }
        }
    }

    let location = if flags & HAS_LOCATION != 0 {
        Some(read_counted_string(data, &mut off)?)
    } else {
        None
    };
    // a trailing GUID and creation time are not kept

    let (kind, address) = match (target, location) {
        (Some((HyperlinkKind::Url, url)), _) if url.to_ascii_lowercase().starts_with("mailto:") => {
            (HyperlinkKind::Email, url)
        }
        (Some((kind, address)), Some(location)) if kind == HyperlinkKind::Url => {
            (kind, format!("{}#{}", address, location))
        }
        (Some(target), _) => target,
        (None, Some(location)) => (HyperlinkKind::Document, location),
        (None, None) => return Err(XlsError::record("HLINK without a target")),
    };

    let mut link = match kind {
        HyperlinkKind::Url => Hyperlink::url(0, 0, address),
        HyperlinkKind::Email => Hyperlink::email(0, 0, address),
        HyperlinkKind::File => Hyperlink::file(0, 0, address),
        HyperlinkKind::Document => Hyperlink::document(0, 0, address),
    }
    .with_range(range);
    link.label = label;
    Ok(link)
}

/// Encode a hyperlink as an HLINK record body
pub fn write_hlink(link: &Hyperlink) -> Vec<u8> {
    let mut flags = match link.kind {
        HyperlinkKind::Url | HyperlinkKind::Email => HAS_MONIKER | IS_ABSOLUTE,
        HyperlinkKind::File => HAS_MONIKER,
        HyperlinkKind::Document => HAS_LOCATION,
    };
    if link.label.is_some() {
        flags |= HAS_DISPLAY_NAME | SITE_GAVE_DISPLAY_NAME;
    }

    let mut out = Vec::new();
    write_range(&mut out, &link.range);
    out.extend_from_slice(&STD_LINK);
    out.put_u32(2);
    out.put_u32(flags);
    if let Some(label) = &link.label {
        write_counted_string(&mut out, label);
    }
    match link.kind {
        HyperlinkKind::Url | HyperlinkKind::Email => {
            out.extend_from_slice(&URL_MONIKER);
            let units = link.address().encode_utf16().count() as u32;
            out.put_u32((units + 1) * 2);
            put_utf16(&mut out, link.address(), true);
        }
        HyperlinkKind::File => write_file_moniker(&mut out, link.address()),
        HyperlinkKind::Document => write_counted_string(&mut out, link.address()),
    }
    out
}

/// Decode an HLINKTOOLTIP body into the range it covers and its text
pub fn parse_tooltip(data: &[u8]) -> XlsResult<(CellRange, String)> {
    let mut off = 0;
    let _frt = read_u16(data, &mut off)?;
    let range = read_range(data, &mut off)?;
    Ok((range, utf16(&data[off..])))
}

pub fn write_tooltip(link: &Hyperlink, tooltip: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_u16(TOOLTIP_FRT);
    write_range(&mut out, &link.range);
    put_utf16(&mut out, tooltip, true);
    out
}

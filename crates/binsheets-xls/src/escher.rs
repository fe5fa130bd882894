//! Escher (Office drawing) records
//!
//! Drawings in a BIFF8 file are trees of escher records carried inside
//! MSODRAWINGGROUP (workbook) and MSODRAWING (sheet) BIFF records. Every
//! escher record has an 8-byte header:
//! - Bytes 0-1: version (low 4 bits) and instance (high 12 bits)
//! - Bytes 2-3: record type
//! - Bytes 4-7: body length
//!
//! A version of 0xF marks a container whose body is a sequence of child
//! records.

use bitflags::bitflags;

use binsheets_core::{ChildAnchor, ClientAnchor, AnchorType};

use crate::biff::parser::{read_i32, read_u16, read_u32, WriteLe};
use crate::error::{XlsError, XlsResult};

pub mod record_type {
    pub const DGG_CONTAINER: u16 = 0xF000;
    pub const BSTORE_CONTAINER: u16 = 0xF001;
    pub const DG_CONTAINER: u16 = 0xF002;
    pub const SPGR_CONTAINER: u16 = 0xF003;
    pub const SP_CONTAINER: u16 = 0xF004;
    pub const DGG: u16 = 0xF006;
    pub const BSE: u16 = 0xF007;
    pub const DG: u16 = 0xF008;
    pub const SPGR: u16 = 0xF009;
    pub const SP: u16 = 0xF00A;
    pub const OPT: u16 = 0xF00B;
    pub const CLIENT_TEXTBOX: u16 = 0xF00D;
    pub const CHILD_ANCHOR: u16 = 0xF00F;
    pub const CLIENT_ANCHOR: u16 = 0xF010;
    pub const CLIENT_DATA: u16 = 0xF011;
    pub const BLIP_EMF: u16 = 0xF01A;
    pub const BLIP_WMF: u16 = 0xF01B;
    pub const BLIP_PICT: u16 = 0xF01C;
    pub const BLIP_JPEG: u16 = 0xF01D;
    pub const BLIP_PNG: u16 = 0xF01E;
    pub const BLIP_DIB: u16 = 0xF01F;
    pub const SPLIT_MENU_COLORS: u16 = 0xF11E;
}

/// Shape types (the instance of an Sp record)
pub mod shape_type {
    pub const NOT_PRIMITIVE: u16 = 0;
    pub const RECTANGLE: u16 = 1;
    pub const ELLIPSE: u16 = 3;
    pub const ARC: u16 = 19;
    pub const LINE: u16 = 20;
    pub const PICTURE_FRAME: u16 = 75;
    pub const TEXT_BOX: u16 = 202;
}

/// Shape property ids used by the sheet drawing
pub mod prop {
    pub const TEXT_ID: u16 = 0x0080;
    pub const WRAP_TEXT: u16 = 0x0085;
    pub const TEXT_BOOLEANS: u16 = 0x00BF;
    pub const BLIP: u16 = 0x4104;
    pub const GEO_RIGHT: u16 = 0x0142;
    pub const GEO_BOTTOM: u16 = 0x0143;
    pub const SHAPE_PATH: u16 = 0x0144;
    pub const VERTICES: u16 = 0x0145;
    pub const SEGMENT_INFO: u16 = 0x0146;
    pub const GEOMETRY_BOOLEANS: u16 = 0x017F;
    pub const FILL_COLOR: u16 = 0x0181;
    pub const FILL_BACK_COLOR: u16 = 0x0183;
    pub const FILL_BOOLEANS: u16 = 0x01BF;
    pub const LINE_COLOR: u16 = 0x01C0;
    pub const LINE_WIDTH: u16 = 0x01CB;
    pub const LINE_DASHING: u16 = 0x01CE;
    pub const LINE_BOOLEANS: u16 = 0x01FF;
    pub const SHADOW_COLOR: u16 = 0x0201;
    pub const SHADOW_BOOLEANS: u16 = 0x023F;
    pub const GROUP_BOOLEANS: u16 = 0x03BF;

    /// Flag on a property id whose value is the length of trailing data
    pub const COMPLEX: u16 = 0x8000;
    /// Mask for the property number
    pub const ID_MASK: u16 = 0x3FFF;
}

/// Values of the boolean property sets
pub mod bools {
    pub const FILLED: u32 = 0x0001_0000;
    pub const NOT_FILLED: u32 = 0x0011_0000;
    pub const LINE: u32 = 0x0008_0008;
    pub const NO_LINE: u32 = 0x0008_0000;
    pub const VISIBLE: u32 = 0x000A_0000;
    pub const HIDDEN: u32 = 0x000A_0002;
}

/// A property color value that points at a palette entry
pub const COLOR_PALETTE_INDEX: u32 = 0x0800_0000;

const HEADER_LEN: usize = 8;
const CONTAINER_VERSION: u16 = 0x0F;

bitflags! {
    /// Flags of an Sp record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpFlags: u32 {
        const GROUP = 0x0001;
        const CHILD = 0x0002;
        const PATRIARCH = 0x0004;
        const DELETED = 0x0008;
        const OLE_SHAPE = 0x0010;
        const HAVE_MASTER = 0x0020;
        const FLIP_H = 0x0040;
        const FLIP_V = 0x0080;
        const CONNECTOR = 0x0100;
        const HAVE_ANCHOR = 0x0200;
        const BACKGROUND = 0x0400;
        const HAVE_SHAPE_TYPE = 0x0800;
    }
}

/// Body of an escher record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscherBody {
    Atom(Vec<u8>),
    Container(Vec<EscherRecord>),
}

/// One escher record, containers owning their children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscherRecord {
    /// Version in the low 4 bits, instance in the high 12
    pub options: u16,
    pub record_type: u16,
    pub body: EscherBody,
}

impl EscherRecord {
    /// Build a container
    pub fn container(record_type: u16, instance: u16, children: Vec<EscherRecord>) -> Self {
        Self {
            options: CONTAINER_VERSION | (instance << 4),
            record_type,
            body: EscherBody::Container(children),
        }
    }

    /// Build an atom
    pub fn atom(record_type: u16, version: u16, instance: u16, data: Vec<u8>) -> Self {
        Self {
            options: (version & 0x0F) | (instance << 4),
            record_type,
            body: EscherBody::Atom(data),
        }
    }

    pub fn version(&self) -> u16 {
        self.options & 0x0F
    }

    pub fn instance(&self) -> u16 {
        self.options >> 4
    }

    pub fn is_container(&self) -> bool {
        matches!(self.body, EscherBody::Container(_))
    }

    /// Children of a container; empty for atoms
    pub fn children(&self) -> &[EscherRecord] {
        match &self.body {
            EscherBody::Container(children) => children,
            EscherBody::Atom(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<EscherRecord>> {
        match &mut self.body {
            EscherBody::Container(children) => Some(children),
            EscherBody::Atom(_) => None,
        }
    }

    /// Body bytes of an atom; empty for containers
    pub fn data(&self) -> &[u8] {
        match &self.body {
            EscherBody::Atom(data) => data,
            EscherBody::Container(_) => &[],
        }
    }

    /// First direct child of the given type
    pub fn find_child(&self, record_type: u16) -> Option<&EscherRecord> {
        self.children().iter().find(|r| r.record_type == record_type)
    }

    /// Direct children of the given type
    pub fn children_of_type(&self, record_type: u16) -> impl Iterator<Item = &EscherRecord> {
        self.children()
            .iter()
            .filter(move |r| r.record_type == record_type)
    }

    /// Serialized size, header included
    pub fn serialized_len(&self) -> usize {
        HEADER_LEN + self.body_len()
    }

    fn body_len(&self) -> usize {
        match &self.body {
            EscherBody::Atom(data) => data.len(),
            EscherBody::Container(children) => {
                children.iter().map(EscherRecord::serialized_len).sum()
            }
        }
    }

    /// Append the record to `out`
    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.serialize_tracking(out, &mut |_, _| {});
    }

    fn serialize_tracking(&self, out: &mut Vec<u8>, on_end: &mut dyn FnMut(u16, usize)) {
        out.put_u16(self.options);
        out.put_u16(self.record_type);
        out.put_u32(self.body_len() as u32);
        match &self.body {
            EscherBody::Atom(data) => out.extend_from_slice(data),
            EscherBody::Container(children) => {
                for child in children {
                    child.serialize_tracking(out, on_end);
                }
            }
        }
        on_end(self.record_type, out.len());
    }

    fn parse_at(data: &[u8], offset: &mut usize, depth: usize) -> XlsResult<Self> {
        if depth > 64 {
            return Err(XlsError::record("escher records nested too deeply"));
        }
        let start = *offset;
        let options = read_u16(data, offset)?;
        let record_type = read_u16(data, offset)?;
        let len = read_u32(data, offset)? as usize;
        let body_start = *offset;
        let end = body_start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                XlsError::RecordFormat(format!(
                    "escher record 0x{:04X} at {} claims {} bytes, {} left",
                    record_type,
                    start,
                    len,
                    data.len() - body_start
                ))
            })?;

        let body = if options & 0x0F == CONTAINER_VERSION {
            let mut children = Vec::new();
            let mut pos = body_start;
            while pos < end {
                children.push(Self::parse_at(&data[..end], &mut pos, depth + 1)?);
            }
            EscherBody::Container(children)
        } else {
            EscherBody::Atom(data[body_start..end].to_vec())
        };
        *offset = end;
        Ok(Self {
            options,
            record_type,
            body,
        })
    }
}

/// Parse a sequence of escher records filling `data`
pub fn parse_all(data: &[u8]) -> XlsResult<Vec<EscherRecord>> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        records.push(EscherRecord::parse_at(data, &mut offset, 0)?);
    }
    Ok(records)
}

/// Serialize records into one buffer
pub fn serialize(records: &[EscherRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        record.serialize(&mut out);
    }
    out
}

/// Serialize records, also returning the offset just past every
/// ClientData and ClientTextbox record
///
/// A sheet drawing is cut at those offsets: each ClientData is followed in
/// the BIFF stream by the OBJ of its shape, each ClientTextbox by a TXO.
pub fn serialize_with_splits(records: &[EscherRecord]) -> (Vec<u8>, Vec<usize>) {
    let mut out = Vec::new();
    let mut splits = Vec::new();
    for record in records {
        record.serialize_tracking(&mut out, &mut |rt, end| {
            if rt == record_type::CLIENT_DATA || rt == record_type::CLIENT_TEXTBOX {
                splits.push(end);
            }
        });
    }
    (out, splits)
}

/// Walk the tree depth-first in stream order
pub fn walk<'a>(records: &'a [EscherRecord], visit: &mut dyn FnMut(&'a EscherRecord)) {
    for record in records {
        visit(record);
        walk(record.children(), visit);
    }
}

// ── typed atoms ─────────────────────────────────────────────────────────

/// Sp atom: shape type in the instance, then spid and flags
pub fn sp(shape_type: u16, spid: u32, flags: SpFlags) -> EscherRecord {
    let mut data = Vec::with_capacity(8);
    data.put_u32(spid);
    data.put_u32(flags.bits());
    EscherRecord::atom(record_type::SP, 2, shape_type, data)
}

/// Decode an Sp atom into `(shape_type, spid, flags)`
pub fn parse_sp(record: &EscherRecord) -> XlsResult<(u16, u32, SpFlags)> {
    let data = record.data();
    let mut off = 0;
    let spid = read_u32(data, &mut off)?;
    let flags = read_u32(data, &mut off)?;
    Ok((record.instance(), spid, SpFlags::from_bits_retain(flags)))
}

/// Dg atom: drawing id in the instance, then shape count and last spid
pub fn dg(drawing_id: u16, shape_count: u32, last_spid: u32) -> EscherRecord {
    let mut data = Vec::with_capacity(8);
    data.put_u32(shape_count);
    data.put_u32(last_spid);
    EscherRecord::atom(record_type::DG, 0, drawing_id, data)
}

fn rect_atom(record_type: u16, version: u16, r: &ChildAnchor) -> EscherRecord {
    let mut data = Vec::with_capacity(16);
    data.put_i32(r.x1);
    data.put_i32(r.y1);
    data.put_i32(r.x2);
    data.put_i32(r.y2);
    EscherRecord::atom(record_type, version, 0, data)
}

fn parse_rect(record: &EscherRecord) -> XlsResult<ChildAnchor> {
    let data = record.data();
    let mut off = 0;
    Ok(ChildAnchor::new(
        read_i32(data, &mut off)?,
        read_i32(data, &mut off)?,
        read_i32(data, &mut off)?,
        read_i32(data, &mut off)?,
    ))
}

/// Spgr atom: a group's coordinate space
pub fn spgr(coords: &ChildAnchor) -> EscherRecord {
    rect_atom(record_type::SPGR, 1, coords)
}

pub fn parse_spgr(record: &EscherRecord) -> XlsResult<ChildAnchor> {
    parse_rect(record)
}

pub fn child_anchor(anchor: &ChildAnchor) -> EscherRecord {
    rect_atom(record_type::CHILD_ANCHOR, 0, anchor)
}

pub fn parse_child_anchor(record: &EscherRecord) -> XlsResult<ChildAnchor> {
    parse_rect(record)
}

/// ClientAnchor atom: flag, then col/dx/row/dy of both corners
pub fn client_anchor(anchor: &ClientAnchor) -> EscherRecord {
    let mut data = Vec::with_capacity(18);
    data.put_u16(anchor.anchor_type.flag());
    data.put_u16(anchor.col1);
    data.put_u16(anchor.dx1);
    data.put_u16(anchor.row1 as u16);
    data.put_u16(anchor.dy1);
    data.put_u16(anchor.col2);
    data.put_u16(anchor.dx2);
    data.put_u16(anchor.row2 as u16);
    data.put_u16(anchor.dy2);
    EscherRecord::atom(record_type::CLIENT_ANCHOR, 0, 0, data)
}

pub fn parse_client_anchor(record: &EscherRecord) -> XlsResult<ClientAnchor> {
    let data = record.data();
    let mut off = 0;
    let flag = read_u16(data, &mut off)?;
    let col1 = read_u16(data, &mut off)?;
    let dx1 = read_u16(data, &mut off)?;
    let row1 = read_u16(data, &mut off)? as u32;
    let dy1 = read_u16(data, &mut off)?;
    let col2 = read_u16(data, &mut off)?;
    let dx2 = read_u16(data, &mut off)?;
    let row2 = read_u16(data, &mut off)? as u32;
    let dy2 = read_u16(data, &mut off)?;
    // offsets beyond the cell are clamped rather than rejected
    let anchor = ClientAnchor::new(
        dx1.min(ClientAnchor::MAX_DX),
        dy1.min(ClientAnchor::MAX_DY),
        dx2.min(ClientAnchor::MAX_DX),
        dy2.min(ClientAnchor::MAX_DY),
        col1.min(binsheets_core::MAX_COLS - 1),
        row1,
        col2.min(binsheets_core::MAX_COLS - 1),
        row2,
    )?;
    Ok(anchor.with_anchor_type(AnchorType::from_flag(flag)))
}

/// Empty atom marking where the client's own record follows
pub fn client_data() -> EscherRecord {
    EscherRecord::atom(record_type::CLIENT_DATA, 0, 0, Vec::new())
}

pub fn client_textbox() -> EscherRecord {
    EscherRecord::atom(record_type::CLIENT_TEXTBOX, 0, 0, Vec::new())
}

/// One shape property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptProperty {
    /// Property id including the blip flag, without the complex flag
    pub id: u16,
    pub value: u32,
    /// Trailing data of a complex property
    pub complex: Option<Vec<u8>>,
}

/// Builds an Opt atom; properties are kept sorted by id
#[derive(Debug, Default)]
pub struct OptBuilder {
    properties: Vec<OptProperty>,
}

impl OptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn simple(mut self, id: u16, value: u32) -> Self {
        self.properties.push(OptProperty {
            id,
            value,
            complex: None,
        });
        self
    }

    pub fn complex(mut self, id: u16, data: Vec<u8>) -> Self {
        self.properties.push(OptProperty {
            id,
            value: data.len() as u32,
            complex: Some(data),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn build(mut self) -> EscherRecord {
        self.properties.sort_by_key(|p| p.id & prop::ID_MASK);
        let mut data = Vec::new();
        for p in &self.properties {
            let id = if p.complex.is_some() {
                p.id | prop::COMPLEX
            } else {
                p.id
            };
            data.put_u16(id);
            data.put_u32(p.value);
        }
        for p in &self.properties {
            if let Some(complex) = &p.complex {
                data.extend_from_slice(complex);
            }
        }
        EscherRecord::atom(record_type::OPT, 3, self.properties.len() as u16, data)
    }
}

/// Decode the properties of an Opt atom
pub fn parse_opt(record: &EscherRecord) -> XlsResult<Vec<OptProperty>> {
    let data = record.data();
    let count = record.instance() as usize;
    let mut off = 0;
    let mut properties = Vec::with_capacity(count);
    for _ in 0..count {
        let raw_id = read_u16(data, &mut off)?;
        let value = read_u32(data, &mut off)?;
        properties.push((raw_id, value));
    }

    let mut complex_off = off;
    properties
        .into_iter()
        .map(|(raw_id, value)| {
            let complex = if raw_id & prop::COMPLEX != 0 {
                let end = complex_off + value as usize;
                let bytes = data.get(complex_off..end).ok_or_else(|| {
                    XlsError::RecordFormat(format!(
                        "complex property 0x{:04X} runs past its Opt record",
                        raw_id & !prop::COMPLEX
                    ))
                })?;
                complex_off = end;
                Some(bytes.to_vec())
            } else {
                None
            };
            Ok(OptProperty {
                id: raw_id & !prop::COMPLEX,
                value,
                complex,
            })
        })
        .collect()
}

/// Look up a simple property value
pub fn opt_value(properties: &[OptProperty], id: u16) -> Option<u32> {
    properties.iter().find(|p| p.id == id).map(|p| p.value)
}

pub fn opt_complex(properties: &[OptProperty], id: u16) -> Option<&[u8]> {
    properties
        .iter()
        .find(|p| p.id == id)
        .and_then(|p| p.complex.as_deref())
}

/// Encode a complex array of points (8-byte elements)
pub fn encode_point_array(points: &[(i32, i32)]) -> Vec<u8> {
    let mut data = Vec::with_capacity(6 + points.len() * 8);
    data.put_u16(points.len() as u16);
    data.put_u16(points.len() as u16);
    data.put_u16(8);
    for &(x, y) in points {
        data.put_i32(x);
        data.put_i32(y);
    }
    data
}

/// Decode a complex array of points with 4- or 8-byte elements
pub fn decode_point_array(data: &[u8]) -> XlsResult<Vec<(i32, i32)>> {
    let mut off = 0;
    let count = read_u16(data, &mut off)? as usize;
    let _alloc = read_u16(data, &mut off)?;
    let elem = read_u16(data, &mut off)?;
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let point = match elem {
            8 => (read_i32(data, &mut off)?, read_i32(data, &mut off)?),
            // 0xFFF0 is the packed form of 4-byte elements
            4 | 0xFFF0 => (
                read_u16(data, &mut off)? as i16 as i32,
                read_u16(data, &mut off)? as i16 as i32,
            ),
            other => {
                return Err(XlsError::RecordFormat(format!(
                    "unsupported vertex size {}",
                    other
                )))
            }
        };
        points.push(point);
    }
    Ok(points)
}

/// Segment info of an open polyline through `count` points
pub fn encode_polyline_segments(count: usize) -> Vec<u8> {
    const MOVE_TO: u16 = 0x4000;
    const LINE_TO: u16 = 0x0001;
    const CLOSE: u16 = 0x6001;
    const END: u16 = 0x8000;

    let mut segments = vec![MOVE_TO];
    segments.extend(std::iter::repeat(LINE_TO).take(count.saturating_sub(1)));
    segments.push(CLOSE);
    segments.push(END);

    let mut data = Vec::with_capacity(6 + segments.len() * 2);
    data.put_u16(segments.len() as u16);
    data.put_u16(segments.len() as u16);
    data.put_u16(2);
    for s in segments {
        data.put_u16(s);
    }
    data
}

/// File-level drawing group atom (Dgg)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dgg {
    pub max_spid: u32,
    pub shapes_saved: u32,
    pub drawings_saved: u32,
    /// `(drawing id, shapes used)` per 1024-spid cluster
    pub clusters: Vec<(u32, u32)>,
}

impl Dgg {
    pub fn to_record(&self) -> EscherRecord {
        let mut data = Vec::with_capacity(16 + self.clusters.len() * 8);
        data.put_u32(self.max_spid);
        data.put_u32(self.clusters.len() as u32 + 1);
        data.put_u32(self.shapes_saved);
        data.put_u32(self.drawings_saved);
        for &(dg, used) in &self.clusters {
            data.put_u32(dg);
            data.put_u32(used);
        }
        EscherRecord::atom(record_type::DGG, 0, 0, data)
    }

    pub fn parse(record: &EscherRecord) -> XlsResult<Self> {
        let data = record.data();
        let mut off = 0;
        let max_spid = read_u32(data, &mut off)?;
        let id_clusters = read_u32(data, &mut off)?;
        let shapes_saved = read_u32(data, &mut off)?;
        let drawings_saved = read_u32(data, &mut off)?;
        let mut clusters = Vec::new();
        for _ in 1..id_clusters {
            clusters.push((read_u32(data, &mut off)?, read_u32(data, &mut off)?));
        }
        Ok(Self {
            max_spid,
            shapes_saved,
            drawings_saved,
            clusters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_tree() -> Vec<EscherRecord> {
        let shape = EscherRecord::container(
            record_type::SP_CONTAINER,
            0,
            vec![
                sp(shape_type::TEXT_BOX, 1025, SpFlags::HAVE_ANCHOR | SpFlags::HAVE_SHAPE_TYPE),
                client_anchor(&ClientAnchor::from_cells(1, 1, 3, 4).unwrap()),
                client_data(),
                client_textbox(),
            ],
        );
        vec![EscherRecord::container(
            record_type::DG_CONTAINER,
            0,
            vec![
                dg(1, 2, 1025),
                EscherRecord::container(record_type::SPGR_CONTAINER, 0, vec![shape]),
            ],
        )]
    }

    #[test]
    fn test_header_layout() {
        let mut out = Vec::new();
        sp(shape_type::ELLIPSE, 1024, SpFlags::PATRIARCH).serialize(&mut out);
        // version 2, instance 3 -> 0x0032
        assert_eq!(&out[..8], &[0x32, 0x00, 0x0A, 0xF0, 8, 0, 0, 0]);
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn test_parse_serialized_tree() {
        let tree = sample_tree();
        let bytes = serialize(&tree);
        assert_eq!(bytes.len(), tree[0].serialized_len());
        let parsed = parse_all(&bytes).unwrap();
        assert_eq!(parsed, tree);

        let group = parsed[0].find_child(record_type::SPGR_CONTAINER).unwrap();
        let shape = &group.children()[0];
        let (kind, spid, flags) = parse_sp(shape.find_child(record_type::SP).unwrap()).unwrap();
        assert_eq!((kind, spid), (shape_type::TEXT_BOX, 1025));
        assert!(flags.contains(SpFlags::HAVE_ANCHOR));
        let anchor = parse_client_anchor(shape.find_child(record_type::CLIENT_ANCHOR).unwrap()).unwrap();
        assert_eq!((anchor.row1, anchor.col1, anchor.row2, anchor.col2), (1, 1, 3, 4));
    }

    #[test]
    fn test_splits_follow_client_records() {
        let tree = sample_tree();
        let (bytes, splits) = serialize_with_splits(&tree);
        assert_eq!(splits.len(), 2);
        assert_eq!(*splits.last().unwrap(), bytes.len());
        // the ClientData ends 8 bytes before the ClientTextbox
        assert_eq!(splits[1] - splits[0], 8);
    }

    #[test]
    fn test_truncated_record() {
        let mut bytes = serialize(&sample_tree());
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(parse_all(&bytes), Err(XlsError::RecordFormat(_))));
    }

    #[test]
    fn test_opt_complex_properties() {
        let record = OptBuilder::new()
            .complex(prop::VERTICES, encode_point_array(&[(0, 0), (100, 50)]))
            .simple(prop::LINE_COLOR, COLOR_PALETTE_INDEX | 12)
            .simple(prop::GEO_RIGHT, 100)
            .build();
        assert_eq!(record.instance(), 3);
        let props = parse_opt(&record).unwrap();
        // sorted by id
        assert_eq!(props[0].id, prop::GEO_RIGHT);
        assert_eq!(opt_value(&props, prop::LINE_COLOR), Some(0x0800_000C));
        let vertices = opt_complex(&props, prop::VERTICES).unwrap();
        assert_eq!(decode_point_array(vertices).unwrap(), vec![(0, 0), (100, 50)]);
    }

    #[test]
    fn test_packed_vertices() {
        let data = [2, 0, 2, 0, 0xF0, 0xFF, 1, 0, 2, 0, 0xFF, 0xFF, 4, 0];
        assert_eq!(decode_point_array(&data).unwrap(), vec![(1, 2), (-1, 4)]);
    }

    #[test]
    fn test_dgg_clusters() {
        let dgg = Dgg {
            max_spid: 3074,
            shapes_saved: 4,
            drawings_saved: 2,
            clusters: vec![(1, 3), (2, 2)],
        };
        let record = dgg.to_record();
        assert_eq!(&record.data()[4..8], &3u32.to_le_bytes());
        assert_eq!(Dgg::parse(&record).unwrap(), dgg);
    }
}

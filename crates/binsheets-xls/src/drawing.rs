//! Sheet drawings: shapes, comment boxes and the picture store
//!
//! A sheet drawing is one escher tree (DgContainer) spread over several
//! MSODRAWING records. Every shape ends with a ClientData atom that the OBJ
//! record after it belongs to; text boxes and comment boxes add a
//! ClientTextbox atom whose text is the following TXO record. Comments are
//! tied to their cell by a NOTE record naming the OBJ id of their box.
//!
//! Pictures are stored once per workbook in the MSODRAWINGGROUP record: each
//! BSE entry wraps one blip, and picture shapes refer to the entry by its
//! 1-based position.

use std::collections::VecDeque;
use std::io::Write;

use ahash::AHashMap;
use md5::{Digest, Md5};

use binsheets_core::{
    CellComment, ChildAnchor, ClientAnchor, Color, Error, LineStyle, Patriarch, PictureData,
    PictureFormat, Shape, ShapeAnchor, ShapeKind, Workbook, Worksheet,
};

use crate::biff::parser::{read_u16, WriteLe};
use crate::biff::records;
use crate::biff::strings::{
    char_count, is_compressible, read_unicode_string, write_chars, write_unicode_string,
    ContinuedReader,
};
use crate::biff::{BiffRecord, RecordWriter, MAX_RECORD_DATA};
use crate::error::{XlsError, XlsResult};
use crate::escher::{
    self, bools, prop, record_type as rt, shape_type, Dgg, EscherRecord, OptBuilder, OptProperty,
    SpFlags, COLOR_PALETTE_INDEX,
};

/// Shape ids per drawing cluster
pub const SPIDS_PER_DRAWING: u32 = 1024;

/// OBJ object types
pub mod obj_type {
    pub const GROUP: u16 = 0x00;
    pub const LINE: u16 = 0x01;
    pub const RECTANGLE: u16 = 0x02;
    pub const OVAL: u16 = 0x03;
    pub const ARC: u16 = 0x04;
    pub const TEXT: u16 = 0x06;
    pub const PICTURE: u16 = 0x08;
    pub const COMMENT: u16 = 0x19;
    pub const OFFICE_ART: u16 = 0x1E;
}

// OBJ sub-records
const FT_END: u16 = 0x00;
const FT_CF: u16 = 0x07;
const FT_PIO_GRBIT: u16 = 0x08;
const FT_NTS: u16 = 0x0D;
const FT_CMO: u16 = 0x15;

/// locked, printable, autofill, autoline
const CMO_SHAPE_FLAGS: u16 = 0x6011;
/// locked, printable, autofill
const CMO_COMMENT_FLAGS: u16 = 0x4011;

/// Left aligned, top aligned, text locked
const TXO_FLAGS: u16 = 0x0212;
const TXO_HEADER_LEN: usize = 18;

const NOTE_SHOWN: u16 = 0x0002;

/// System colors used when a shape color is automatic
const LINE_AUTO: u32 = COLOR_PALETTE_INDEX | 0x40;
const FILL_AUTO: u32 = COLOR_PALETTE_INDEX | 0x09;
/// Tooltip background of comment boxes
const COMMENT_FILL: u32 = COLOR_PALETTE_INDEX | 0x50;
const COMMENT_FILL_BOOLEANS: u32 = 0x0011_0010;
const COMMENT_SHADOW_BOOLEANS: u32 = 0x0003_0003;
/// A closed path through the vertices
const SHAPE_PATH_COMPLEX: u32 = 4;

const BSE_HEADER_LEN: usize = 36;
const BLIP_UID_LEN: usize = 16;
const BLIP_TAG: u8 = 0xFF;

fn blip_instance(format: PictureFormat) -> u16 {
    match format {
        PictureFormat::Emf => 0x3D4,
        PictureFormat::Wmf => 0x216,
        PictureFormat::Pict => 0x542,
        PictureFormat::Jpeg => 0x46A,
        PictureFormat::Png => 0x6E0,
        PictureFormat::Dib => 0x7A8,
    }
}

fn color_value(color: &Color, auto: u32) -> u32 {
    match color {
        Color::Auto => auto,
        Color::Rgb { r, g, b } => u32::from_le_bytes([*r, *g, *b, 0]),
        Color::Indexed(i) => COLOR_PALETTE_INDEX | *i as u32,
    }
}

fn color_from_value(value: u32, auto: u32) -> Color {
    if value == auto {
        Color::Auto
    } else if value & COLOR_PALETTE_INDEX != 0 {
        Color::Indexed((value & 0xFF) as u8)
    } else {
        let [r, g, b, _] = value.to_le_bytes();
        Color::Rgb { r, g, b }
    }
}

fn invalid(msg: String) -> XlsError {
    XlsError::Core(Error::invalid_argument(msg))
}

// ── planning ────────────────────────────────────────────────────────────

/// Shapes a sheet drawing holds: the patriarch, every shape and group
/// member, and one box per comment
pub fn sheet_shape_count(sheet: &Worksheet) -> usize {
    let shapes = sheet
        .drawing_patriarch()
        .map_or(0, Patriarch::total_shape_count);
    let comments = sheet.comment_count();
    if shapes + comments == 0 {
        0
    } else {
        1 + shapes + comments
    }
}

/// Drawing ids for the sheets of a workbook and the file-level Dgg
#[derive(Debug, Clone, Default)]
pub struct DrawingPlan {
    /// Drawing id per sheet, `None` for sheets without a drawing
    pub drawing_ids: Vec<Option<u16>>,
    pub dgg: Dgg,
}

impl DrawingPlan {
    pub fn for_workbook(workbook: &Workbook) -> XlsResult<Self> {
        let mut plan = DrawingPlan::default();
        let mut next_id = 1u16;
        for sheet in workbook.worksheets() {
            let count = sheet_shape_count(sheet);
            if count == 0 {
                plan.drawing_ids.push(None);
                continue;
            }
            if count > SPIDS_PER_DRAWING as usize {
                return Err(invalid(format!(
                    "sheet '{}' has {} shapes, at most {} fit one drawing",
                    sheet.name(),
                    count,
                    SPIDS_PER_DRAWING
                )));
            }
            let id = next_id;
            next_id += 1;
            plan.drawing_ids.push(Some(id));
            plan.dgg.clusters.push((id as u32, count as u32));
            plan.dgg.shapes_saved += count as u32;
            plan.dgg.drawings_saved += 1;
            plan.dgg.max_spid = id as u32 * SPIDS_PER_DRAWING + count as u32;
        }
        Ok(plan)
    }

    /// Whether the workbook needs an MSODRAWINGGROUP record
    pub fn needs_group(&self, workbook: &Workbook) -> bool {
        self.dgg.drawings_saved > 0 || !workbook.pictures().is_empty()
    }
}

// ── drawing group ───────────────────────────────────────────────────────

fn count_picture_refs(shapes: &[Shape], refs: &mut [u32]) {
    for shape in shapes {
        match &shape.kind {
            ShapeKind::Picture { picture_index } => {
                if let Some(count) = refs.get_mut((*picture_index as usize).wrapping_sub(1)) {
                    *count += 1;
                }
            }
            ShapeKind::Group { children, .. } => count_picture_refs(children, refs),
            _ => {}
        }
    }
}

fn bse(picture: &PictureData, refs: u32) -> EscherRecord {
    let uid: [u8; BLIP_UID_LEN] = Md5::digest(&picture.data).into();
    let blip_type = picture.format.blip_type();

    let mut blip_data = Vec::with_capacity(BLIP_UID_LEN + 1 + picture.data.len());
    blip_data.extend_from_slice(&uid);
    if !picture.format.is_metafile() {
        blip_data.put_u8(BLIP_TAG);
    }
    blip_data.extend_from_slice(&picture.data);
    let blip = EscherRecord::atom(
        0xF018 + blip_type as u16,
        0,
        blip_instance(picture.format),
        blip_data,
    );

    let mut data = Vec::with_capacity(BSE_HEADER_LEN);
    data.put_u8(blip_type);
    data.put_u8(blip_type);
    data.extend_from_slice(&uid);
    data.put_u16(BLIP_TAG as u16);
    data.put_u32(blip.serialized_len() as u32);
    data.put_u32(refs);
    data.put_u32(0);
    data.extend_from_slice(&[0, 0, 0, 0]);
    blip.serialize(&mut data);
    EscherRecord::atom(rt::BSE, 2, blip_type as u16, data)
}

/// The DggContainer written to MSODRAWINGGROUP
pub fn drawing_group(workbook: &Workbook, plan: &DrawingPlan) -> EscherRecord {
    let pictures = workbook.pictures();
    let mut refs = vec![0u32; pictures.len()];
    for sheet in workbook.worksheets() {
        if let Some(patriarch) = sheet.drawing_patriarch() {
            count_picture_refs(patriarch.shapes(), &mut refs);
        }
    }

    let mut children = vec![plan.dgg.to_record()];
    if !pictures.is_empty() {
        let entries = pictures.iter().zip(&refs).map(|(p, &n)| bse(p, n)).collect();
        children.push(EscherRecord::container(
            rt::BSTORE_CONTAINER,
            pictures.len() as u16,
            entries,
        ));
    }
    children.push(
        OptBuilder::new()
            .simple(prop::TEXT_BOOLEANS, bools::LINE)
            .simple(prop::FILL_COLOR, COLOR_PALETTE_INDEX | 0x41)
            .simple(prop::LINE_COLOR, LINE_AUTO)
            .build(),
    );
    let mut split = Vec::with_capacity(16);
    for color in [0x0800_000D, 0x0800_000C, 0x0800_0017, 0x1000_00F7u32] {
        split.put_u32(color);
    }
    children.push(EscherRecord::atom(rt::SPLIT_MENU_COLORS, 0, 4, split));
    EscherRecord::container(rt::DGG_CONTAINER, 0, children)
}

/// Pictures of the blip store, in BSE order
pub fn parse_drawing_group(data: &[u8], strict: bool) -> XlsResult<Vec<PictureData>> {
    let records = escher::parse_all(data)?;
    let mut pictures = Vec::new();
    let Some(store) = records
        .iter()
        .find(|r| r.record_type == rt::DGG_CONTAINER)
        .and_then(|dgg| dgg.find_child(rt::BSTORE_CONTAINER))
    else {
        return Ok(pictures);
    };

    for entry in store.children_of_type(rt::BSE) {
        match parse_bse(entry) {
            Ok(picture) => pictures.push(picture),
            Err(e) if !strict => {
                log::warn!("unreadable picture {}: {}", pictures.len() + 1, e);
                // keep the numbering of later pictures
                pictures.push(PictureData::new(PictureFormat::Png, Vec::new()));
            }
            Err(e) => return Err(e),
        }
    }
    log::debug!("read {} pictures from the drawing group", pictures.len());
    Ok(pictures)
}

fn parse_bse(entry: &EscherRecord) -> XlsResult<PictureData> {
    let data = entry.data();
    let blip_type = *data.first().ok_or_else(|| XlsError::record("empty BSE"))?;
    let format = PictureFormat::from_blip_type(blip_type)
        .ok_or_else(|| XlsError::record(format!("unknown blip type {}", blip_type)))?;
    if data.len() <= BSE_HEADER_LEN {
        // the blip lives in a delay stream this reader does not open
        log::warn!("picture without embedded data");
        return Ok(PictureData::new(format, Vec::new()));
    }
    let blips = escher::parse_all(&data[BSE_HEADER_LEN..])?;
    let blip = blips
        .first()
        .ok_or_else(|| XlsError::record("BSE without a blip"))?;
    let skip = if format.is_metafile() {
        BLIP_UID_LEN
    } else {
        BLIP_UID_LEN + 1
    };
    let body = blip
        .data()
        .get(skip..)
        .ok_or_else(|| XlsError::record("blip shorter than its uid"))?;
    Ok(PictureData::new(format, body.to_vec()))
}

// ── sheet drawing: writing ──────────────────────────────────────────────

/// BIFF record that follows a ClientData or ClientTextbox atom
#[derive(Debug, Clone)]
enum ClientRecord {
    Obj(Vec<u8>),
    Txo { data: Vec<u8>, breaks: Vec<usize> },
}

/// A sheet drawing laid out for writing
#[derive(Debug, Clone)]
pub struct SheetDrawing {
    escher: Vec<u8>,
    splits: Vec<usize>,
    client: Vec<ClientRecord>,
    notes: Vec<Vec<u8>>,
}

struct DrawingBuilder {
    base: u32,
    next: u32,
    picture_count: usize,
    client: Vec<ClientRecord>,
}

impl DrawingBuilder {
    fn next_spid(&mut self) -> u32 {
        let spid = self.base + self.next;
        self.next += 1;
        spid
    }

    fn obj(&mut self, object_type: u16, spid: u32) {
        self.client.push(ClientRecord::Obj(obj_body(object_type, obj_id(spid))));
    }

    fn anchor_record(anchor: &ShapeAnchor) -> EscherRecord {
        match anchor {
            ShapeAnchor::Client(a) => escher::client_anchor(a),
            ShapeAnchor::Child(c) => escher::child_anchor(c),
        }
    }

    fn shape(&mut self, shape: &Shape, child: bool) -> XlsResult<EscherRecord> {
        let mut flags = SpFlags::HAVE_ANCHOR;
        if child {
            flags |= SpFlags::CHILD;
        }

        if let ShapeKind::Group { coords, children } = &shape.kind {
            let spid = self.next_spid();
            let own = EscherRecord::container(
                rt::SP_CONTAINER,
                0,
                vec![
                    escher::spgr(coords),
                    escher::sp(shape_type::NOT_PRIMITIVE, spid, flags | SpFlags::GROUP),
                    Self::anchor_record(&shape.anchor),
                    escher::client_data(),
                ],
            );
            self.obj(obj_type::GROUP, spid);
            let mut records = vec![own];
            for member in children {
                records.push(self.shape(member, true)?);
            }
            return Ok(EscherRecord::container(rt::SPGR_CONTAINER, 0, records));
        }

        let spid = self.next_spid();
        let (kind, object_type) = match &shape.kind {
            ShapeKind::Rectangle => (shape_type::RECTANGLE, obj_type::RECTANGLE),
            ShapeKind::Oval => (shape_type::ELLIPSE, obj_type::OVAL),
            ShapeKind::Line => (shape_type::LINE, obj_type::LINE),
            ShapeKind::Arc => (shape_type::ARC, obj_type::ARC),
            ShapeKind::TextBox { .. } => (shape_type::TEXT_BOX, obj_type::TEXT),
            ShapeKind::Picture { picture_index } => {
                if *picture_index == 0 || *picture_index as usize > self.picture_count {
                    return Err(invalid(format!(
                        "picture index {} is not one of the {} workbook pictures",
                        picture_index, self.picture_count
                    )));
                }
                (shape_type::PICTURE_FRAME, obj_type::PICTURE)
            }
            ShapeKind::Polygon { .. } => (shape_type::NOT_PRIMITIVE, obj_type::OFFICE_ART),
            ShapeKind::Group { .. } => unreachable!("groups are handled above"),
        };
        flags |= SpFlags::HAVE_SHAPE_TYPE;

        let mut records = vec![
            escher::sp(kind, spid, flags),
            shape_properties(shape),
            Self::anchor_record(&shape.anchor),
            escher::client_data(),
        ];
        self.obj(object_type, spid);
        if let ShapeKind::TextBox { text } = &shape.kind {
            records.push(escher::client_textbox());
            self.client.push(txo(text)?);
        }
        Ok(EscherRecord::container(rt::SP_CONTAINER, 0, records))
    }

    fn comment(&mut self, row: u32, col: u16, comment: &CellComment) -> XlsResult<(EscherRecord, Vec<u8>)> {
        let spid = self.next_spid();
        let opt = OptBuilder::new()
            .simple(prop::TEXT_ID, 0)
            .simple(prop::FILL_COLOR, COMMENT_FILL)
            .simple(prop::FILL_BACK_COLOR, COMMENT_FILL)
            .simple(prop::FILL_BOOLEANS, COMMENT_FILL_BOOLEANS)
            .simple(prop::SHADOW_COLOR, 0)
            .simple(prop::SHADOW_BOOLEANS, COMMENT_SHADOW_BOOLEANS)
            .simple(
                prop::GROUP_BOOLEANS,
                if comment.visible { bools::VISIBLE } else { bools::HIDDEN },
            )
            .build();
        let record = EscherRecord::container(
            rt::SP_CONTAINER,
            0,
            vec![
                escher::sp(
                    shape_type::TEXT_BOX,
                    spid,
                    SpFlags::HAVE_ANCHOR | SpFlags::HAVE_SHAPE_TYPE,
                ),
                opt,
                escher::client_anchor(&comment.anchor_for(row, col)),
                escher::client_data(),
                escher::client_textbox(),
            ],
        );
        self.obj(obj_type::COMMENT, spid);
        self.client.push(txo(&comment.text)?);
        Ok((record, note_body(row, col, comment, obj_id(spid))?))
    }
}

fn obj_id(spid: u32) -> u16 {
    (spid % SPIDS_PER_DRAWING) as u16
}

fn shape_properties(shape: &Shape) -> EscherRecord {
    let mut opt = OptBuilder::new();
    match &shape.kind {
        ShapeKind::TextBox { .. } => {
            opt = opt.simple(prop::TEXT_ID, 0).simple(prop::WRAP_TEXT, 0);
        }
        ShapeKind::Picture { picture_index } => {
            opt = opt.simple(prop::BLIP, *picture_index);
        }
        ShapeKind::Polygon { points } => {
            let right = points.iter().map(|p| p.0).max().unwrap_or(0);
            let bottom = points.iter().map(|p| p.1).max().unwrap_or(0);
            opt = opt
                .simple(prop::GEO_RIGHT, right as u32)
                .simple(prop::GEO_BOTTOM, bottom as u32)
                .simple(prop::SHAPE_PATH, SHAPE_PATH_COMPLEX)
                .complex(prop::VERTICES, escher::encode_point_array(points))
                .complex(prop::SEGMENT_INFO, escher::encode_polyline_segments(points.len()))
                .simple(prop::GEOMETRY_BOOLEANS, 0x0001_0001);
        }
        _ => {}
    }
    opt = opt
        .simple(prop::FILL_COLOR, color_value(&shape.fill_color, FILL_AUTO))
        .simple(
            prop::FILL_BOOLEANS,
            if shape.no_fill { bools::NOT_FILLED } else { bools::FILLED },
        )
        .simple(prop::LINE_COLOR, color_value(&shape.line_color, LINE_AUTO))
        .simple(prop::LINE_WIDTH, shape.line_width);
    opt = match shape.line_style.dashing() {
        Some(dashing) => opt
            .simple(prop::LINE_DASHING, dashing)
            .simple(prop::LINE_BOOLEANS, bools::LINE),
        None => opt.simple(prop::LINE_BOOLEANS, bools::NO_LINE),
    };
    opt.build()
}

fn obj_body(object_type: u16, id: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.put_u16(FT_CMO);
    out.put_u16(0x12);
    out.put_u16(object_type);
    out.put_u16(id);
    out.put_u16(if object_type == obj_type::COMMENT {
        CMO_COMMENT_FLAGS
    } else {
        CMO_SHAPE_FLAGS
    });
    out.extend_from_slice(&[0u8; 12]);
    match object_type {
        obj_type::PICTURE => {
            out.put_u16(FT_CF);
            out.put_u16(2);
            out.put_u16(0xFFFF);
            out.put_u16(FT_PIO_GRBIT);
            out.put_u16(2);
            out.put_u16(0x0001);
        }
        obj_type::COMMENT => {
            out.put_u16(FT_NTS);
            out.put_u16(0x16);
            out.extend_from_slice(&[0u8; 22]);
        }
        _ => {}
    }
    out.put_u16(FT_END);
    out.put_u16(0);
    out
}

/// TXO body with its text and formatting-run continuations
fn txo(text: &str) -> XlsResult<ClientRecord> {
    let count = char_count(text);
    if count > u16::MAX as usize {
        return Err(invalid(format!("text of {} characters is too long for a text box", count)));
    }
    let mut data = Vec::with_capacity(TXO_HEADER_LEN + count * 2 + 20);
    data.put_u16(TXO_FLAGS);
    data.put_u16(0);
    data.extend_from_slice(&[0u8; 6]);
    data.put_u16(count as u16);
    data.put_u16(if count > 0 { 16 } else { 0 });
    data.put_u32(0);
    let mut breaks = Vec::new();
    if count == 0 {
        return Ok(ClientRecord::Txo { data, breaks });
    }

    // each text continuation restarts with a flags byte
    let wide = !is_compressible(text);
    let per_record = if wide {
        (MAX_RECORD_DATA - 1) / 2
    } else {
        MAX_RECORD_DATA - 1
    };
    let units: Vec<u16> = text.encode_utf16().collect();
    for piece in units.chunks(per_record) {
        breaks.push(data.len());
        data.put_u8(u8::from(wide));
        let piece = String::from_utf16_lossy(piece);
        write_chars(&mut data, &piece, wide);
    }

    breaks.push(data.len());
    data.put_u16(0);
    data.put_u16(0);
    data.put_u32(0);
    data.put_u16(count as u16);
    data.put_u16(0);
    data.put_u32(0);
    Ok(ClientRecord::Txo { data, breaks })
}

fn note_body(row: u32, col: u16, comment: &CellComment, id: u16) -> XlsResult<Vec<u8>> {
    let mut out = Vec::with_capacity(12 + comment.author.len());
    out.put_u16(row as u16);
    out.put_u16(col);
    out.put_u16(if comment.visible { NOTE_SHOWN } else { 0 });
    out.put_u16(id);
    write_unicode_string(&mut out, &comment.author)?;
    out.put_u8(0);
    Ok(out)
}

impl SheetDrawing {
    /// Lay out the drawing of `sheet` under `drawing_id`
    pub fn build(sheet: &Worksheet, drawing_id: u16, picture_count: usize) -> XlsResult<Self> {
        let mut builder = DrawingBuilder {
            base: drawing_id as u32 * SPIDS_PER_DRAWING,
            next: 0,
            picture_count,
            client: Vec::new(),
        };

        let patriarch = sheet.drawing_patriarch();
        let coords = patriarch.map_or(ChildAnchor::new(0, 0, 1023, 255), Patriarch::coordinates);
        let patriarch_spid = builder.next_spid();
        let mut group = vec![EscherRecord::container(
            rt::SP_CONTAINER,
            0,
            vec![
                escher::spgr(&coords),
                escher::sp(
                    shape_type::NOT_PRIMITIVE,
                    patriarch_spid,
                    SpFlags::GROUP | SpFlags::PATRIARCH,
                ),
            ],
        )];

        if let Some(patriarch) = patriarch {
            for shape in patriarch.shapes() {
                group.push(builder.shape(shape, false)?);
            }
        }
        let mut notes = Vec::new();
        for ((row, col), comment) in sheet.comments() {
            let (record, note) = builder.comment(row, col, comment)?;
            group.push(record);
            notes.push(note);
        }

        let count = builder.next;
        let last_spid = builder.base + count - 1;
        let tree = EscherRecord::container(
            rt::DG_CONTAINER,
            0,
            vec![
                escher::dg(drawing_id, count, last_spid),
                EscherRecord::container(rt::SPGR_CONTAINER, 0, group),
            ],
        );
        let (escher, splits) = escher::serialize_with_splits(&[tree]);
        debug_assert_eq!(splits.len(), builder.client.len());
        Ok(Self {
            escher,
            splits,
            client: builder.client,
            notes,
        })
    }

    /// MSODRAWING pieces interleaved with OBJ and TXO, then NOTE records
    pub fn write<W: Write>(&self, out: &mut RecordWriter<W>) -> XlsResult<()> {
        let mut start = 0usize;
        for (&end, client) in self.splits.iter().zip(&self.client) {
            out.write_record(records::MSODRAWING, &self.escher[start..end])?;
            match client {
                ClientRecord::Obj(body) => out.write_record(records::OBJ, body)?,
                ClientRecord::Txo { data, breaks } => {
                    out.write_record_with_breaks(records::TXO, data, breaks)?
                }
            }
            start = end;
        }
        if start < self.escher.len() {
            out.write_record(records::MSODRAWING, &self.escher[start..])?;
        }
        for note in &self.notes {
            out.write_record(records::NOTE, note)?;
        }
        Ok(())
    }
}

// ── sheet drawing: reading ──────────────────────────────────────────────

/// Object type and id from the ftCmo sub-record of an OBJ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjInfo {
    pub object_type: u16,
    pub id: u16,
}

pub fn parse_obj(data: &[u8]) -> XlsResult<ObjInfo> {
    let mut off = 0;
    let ft = read_u16(data, &mut off)?;
    if ft != FT_CMO {
        return Err(XlsError::record(format!("OBJ starts with sub-record 0x{:04X}", ft)));
    }
    let _cb = read_u16(data, &mut off)?;
    Ok(ObjInfo {
        object_type: read_u16(data, &mut off)?,
        id: read_u16(data, &mut off)?,
    })
}

/// Text of a TXO record and its continuations
pub fn parse_txo(record: &BiffRecord, codepage: u16) -> XlsResult<String> {
    let mut off = 10;
    let count = read_u16(&record.data, &mut off)? as usize;
    let Some(&text_start) = record.continue_offsets.first() else {
        return Ok(String::new());
    };
    if count == 0 {
        return Ok(String::new());
    }
    let mut reader = ContinuedReader::new(&record.data, &record.continue_offsets, codepage);
    reader.seek(text_start);
    reader.read_chars(count, false)
}

/// Fields of a NOTE record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteInfo {
    pub row: u32,
    pub col: u16,
    pub visible: bool,
    pub obj_id: u16,
    pub author: String,
}

pub fn parse_note(data: &[u8], codepage: u16) -> XlsResult<NoteInfo> {
    let mut off = 0;
    let row = read_u16(data, &mut off)? as u32;
    let col = read_u16(data, &mut off)?;
    let flags = read_u16(data, &mut off)?;
    let obj_id = read_u16(data, &mut off)?;
    let author = if off < data.len() {
        read_unicode_string(data, &mut off, codepage)?
    } else {
        String::new()
    };
    Ok(NoteInfo {
        row,
        col,
        visible: flags & NOTE_SHOWN != 0,
        obj_id,
        author,
    })
}

/// Drawing records collected while reading a sheet
#[derive(Debug, Default)]
pub struct DrawingParts {
    pub escher: Vec<u8>,
    pub objs: Vec<ObjInfo>,
    pub texts: Vec<String>,
    pub notes: Vec<NoteInfo>,
}

impl DrawingParts {
    pub fn is_empty(&self) -> bool {
        self.escher.is_empty() && self.notes.is_empty()
    }
}

struct CommentBox {
    anchor: ClientAnchor,
    text: String,
    spid: u32,
}

struct DrawingReader {
    objs: VecDeque<ObjInfo>,
    texts: VecDeque<String>,
    comments: AHashMap<u16, CommentBox>,
}

impl DrawingReader {
    fn client_parts(&mut self, container: &EscherRecord) -> (Option<ObjInfo>, Option<String>) {
        let obj = container
            .find_child(rt::CLIENT_DATA)
            .and_then(|_| self.objs.pop_front());
        let text = container
            .find_child(rt::CLIENT_TEXTBOX)
            .and_then(|_| self.texts.pop_front());
        (obj, text)
    }

    fn anchor(container: &EscherRecord) -> XlsResult<Option<ShapeAnchor>> {
        if let Some(a) = container.find_child(rt::CLIENT_ANCHOR) {
            return Ok(Some(ShapeAnchor::Client(escher::parse_client_anchor(a)?)));
        }
        if let Some(c) = container.find_child(rt::CHILD_ANCHOR) {
            return Ok(Some(ShapeAnchor::Child(escher::parse_child_anchor(c)?)));
        }
        Ok(None)
    }

    /// Shape of one SpContainer or SpgrContainer; comment boxes are set
    /// aside and yield `None`
    fn read(&mut self, record: &EscherRecord) -> XlsResult<Option<Shape>> {
        if record.record_type == rt::SPGR_CONTAINER {
            return self.read_group(record);
        }
        let sp = record
            .find_child(rt::SP)
            .ok_or_else(|| XlsError::record("shape container without an Sp atom"))?;
        let (kind_code, spid, _) = escher::parse_sp(sp)?;
        let properties = match record.find_child(rt::OPT) {
            Some(opt) => escher::parse_opt(opt)?,
            None => Vec::new(),
        };
        let anchor = Self::anchor(record)?;
        let (obj, text) = self.client_parts(record);

        if obj.map(|o| o.object_type) == Some(obj_type::COMMENT) {
            if let (Some(obj), Some(ShapeAnchor::Client(anchor))) = (obj, anchor) {
                self.comments.insert(
                    obj.id,
                    CommentBox {
                        anchor,
                        text: text.unwrap_or_default(),
                        spid,
                    },
                );
            }
            return Ok(None);
        }

        let kind = match kind_code {
            shape_type::RECTANGLE => ShapeKind::Rectangle,
            shape_type::ELLIPSE => ShapeKind::Oval,
            shape_type::LINE => ShapeKind::Line,
            shape_type::ARC => ShapeKind::Arc,
            shape_type::TEXT_BOX => ShapeKind::TextBox {
                text: text.unwrap_or_default(),
            },
            shape_type::PICTURE_FRAME => ShapeKind::Picture {
                picture_index: escher::opt_value(&properties, prop::BLIP).unwrap_or(0),
            },
            shape_type::NOT_PRIMITIVE => match escher::opt_complex(&properties, prop::VERTICES) {
                Some(vertices) => ShapeKind::Polygon {
                    points: escher::decode_point_array(vertices)?,
                },
                None => return Ok(None),
            },
            other => {
                log::debug!("skipping shape {} of unsupported type {}", spid, other);
                return Ok(None);
            }
        };
        let Some(anchor) = anchor else {
            log::warn!("shape {} has no anchor", spid);
            return Ok(None);
        };
        let mut shape = Shape::new(kind, anchor);
        apply_properties(&mut shape, &properties);
        shape.shape_id = Some(spid);
        Ok(Some(shape))
    }

    fn read_group(&mut self, record: &EscherRecord) -> XlsResult<Option<Shape>> {
        let mut members = record.children().iter();
        let own = members
            .next()
            .ok_or_else(|| XlsError::record("empty group container"))?;
        let coords = own
            .find_child(rt::SPGR)
            .map(escher::parse_spgr)
            .transpose()?
            .unwrap_or_default();
        let spid = match own.find_child(rt::SP) {
            Some(sp) => escher::parse_sp(sp)?.1,
            None => 0,
        };
        let anchor = Self::anchor(own)?;
        self.client_parts(own);

        let mut children = Vec::new();
        for member in members {
            if let Some(shape) = self.read(member)? {
                children.push(shape);
            }
        }
        let Some(anchor) = anchor else {
            log::warn!("group {} has no anchor", spid);
            return Ok(None);
        };
        let mut shape = Shape::new(ShapeKind::Group { coords, children }, anchor);
        shape.shape_id = Some(spid);
        Ok(Some(shape))
    }
}

fn apply_properties(shape: &mut Shape, properties: &[OptProperty]) {
    if let Some(v) = escher::opt_value(properties, prop::FILL_COLOR) {
        shape.fill_color = color_from_value(v, FILL_AUTO);
    }
    if let Some(v) = escher::opt_value(properties, prop::LINE_COLOR) {
        shape.line_color = color_from_value(v, LINE_AUTO);
    }
    if let Some(v) = escher::opt_value(properties, prop::FILL_BOOLEANS) {
        shape.no_fill = v == bools::NOT_FILLED;
    }
    if let Some(v) = escher::opt_value(properties, prop::LINE_WIDTH) {
        shape.line_width = v;
    }
    shape.line_style = match escher::opt_value(properties, prop::LINE_BOOLEANS) {
        Some(bools::NO_LINE) => LineStyle::None,
        _ => escher::opt_value(properties, prop::LINE_DASHING)
            .map_or(LineStyle::Solid, LineStyle::from_dashing),
    };
}

/// Rebuild shapes and comments of a sheet from its drawing records
pub fn apply_drawing(sheet: &mut Worksheet, parts: DrawingParts, strict: bool) -> XlsResult<()> {
    let mut reader = DrawingReader {
        objs: parts.objs.into(),
        texts: parts.texts.into(),
        comments: AHashMap::new(),
    };

    if !parts.escher.is_empty() {
        let records = escher::parse_all(&parts.escher)?;
        let group = records
            .iter()
            .find(|r| r.record_type == rt::DG_CONTAINER)
            .and_then(|dg| dg.find_child(rt::SPGR_CONTAINER));
        if let Some(group) = group {
            let mut members = group.children().iter();
            let mut coords = None;
            let mut shapes = Vec::new();
            if let Some(first) = members.next() {
                coords = first.find_child(rt::SPGR).map(escher::parse_spgr).transpose()?;
            }
            for member in members {
                if let Some(shape) = reader.read(member)? {
                    shapes.push(shape);
                }
            }
            if !shapes.is_empty() {
                let patriarch = sheet.create_drawing_patriarch();
                if let Some(c) = coords {
                    patriarch.set_coordinates(c.x1, c.y1, c.x2, c.y2);
                }
                for shape in shapes {
                    patriarch.push_shape(shape);
                }
            }
        }
        if !reader.objs.is_empty() {
            log::debug!("{} OBJ records without a shape", reader.objs.len());
        }
    }

    for note in parts.notes {
        let Some(comment_box) = reader.comments.remove(&note.obj_id) else {
            if strict {
                return Err(XlsError::record(format!(
                    "NOTE for {} refers to missing object {}",
                    binsheets_core::CellAddress::new(note.row, note.col),
                    note.obj_id
                )));
            }
            log::warn!("dangling NOTE for object {}", note.obj_id);
            continue;
        };
        let comment = CellComment {
            author: note.author,
            text: comment_box.text,
            visible: note.visible,
            anchor: Some(comment_box.anchor),
            shape_id: Some(comment_box.spid),
        };
        sheet.set_comment_at(note.row, note.col, comment)?;
    }
    Ok(())
}

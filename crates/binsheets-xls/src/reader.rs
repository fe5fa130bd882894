//! XLS (BIFF8) reader.
//!
//! Opens a Compound File Binary (CFB/OLE2) container, reads the `Workbook`
//! stream, parses BIFF8 records, and populates a `binsheets_core::Workbook`.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use ahash::AHashMap;

use binsheets_core::cell::SharedString;
use binsheets_core::{
    CellAddress, CellError, CellRange, CellValue, Hyperlink, NameScope, SheetVisibility, Style,
    Workbook, Worksheet, MAX_COLS,
};
use binsheets_formula::{decode_rgce, render, Ptg};

use crate::biff::parser::{read_bytes, read_f64, read_rk, read_u16, read_u32, read_u8};
use crate::biff::records;
use crate::biff::strings::{read_short_string, read_unicode_string};
use crate::biff::{self, BiffRecord};
use crate::drawing::{self, DrawingParts};
use crate::error::{XlsError, XlsResult};
use crate::hyperlinks;
use crate::link_table::{LinkTable, RawName};
use crate::options::XlsReadOptions;
use crate::sst::parse_sst;
use crate::styles::{self, StyleContext};

const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const DEFAULT_CODEPAGE: u16 = 1252;

// FORMULA option flags
const FORMULA_ALWAYS_CALC: u16 = 0x0001;

// ROW option flags
const ROW_OUTLINE_MASK: u32 = 0x0007;
const ROW_HIDDEN: u32 = 0x0020;
const ROW_CUSTOM_HEIGHT: u32 = 0x0040;
const ROW_HAS_STYLE: u32 = 0x0080;

// WINDOW2 option flags
const WINDOW2_FROZEN: u16 = 0x0008;
const WINDOW2_SELECTED: u16 = 0x0200;

/// XLS file reader.
pub struct XlsReader;

/// Metadata for a sheet parsed from the BOUNDSHEET record.
#[derive(Debug)]
struct SheetInfo {
    /// Absolute byte offset of the sheet's BOF in the Workbook stream.
    offset: u32,
    visibility: u8,
    /// Sheet type: 0 = worksheet, 2 = chart, 6 = macro/VBA.
    sheet_type: u8,
    name: String,
}

/// Records of one BOF..EOF substream
struct SheetGroup<'a> {
    bof_offset: u64,
    records: Vec<&'a BiffRecord>,
}

/// Everything from the globals substream that sheets refer to
struct Globals {
    sst: Vec<String>,
    styles: Vec<Option<Style>>,
    links: LinkTable,
    codepage: u16,
    strict: bool,
    read_drawings: bool,
}

/// Whether a record holds its fixed fields
///
/// A short record is an error in strict mode; lenient mode logs and skips it.
fn has_fixed_fields(rec: &BiffRecord, strict: bool) -> XlsResult<bool> {
    let needed = min_record_len(rec.record_type);
    if rec.data.len() >= needed {
        return Ok(true);
    }
    let msg = format!(
        "{} record at offset {} has {} bytes, needs {}",
        rec.name(),
        rec.stream_offset,
        rec.data.len(),
        needed
    );
    if strict {
        return Err(XlsError::RecordFormat(msg));
    }
    log::warn!("skipping {}", msg);
    Ok(false)
}

/// Smallest body that holds a record's fixed fields
fn min_record_len(record_type: u16) -> usize {
    match record_type {
        records::LABELSST => 10,
        records::LABEL => 9,
        records::NUMBER => 14,
        records::RK => 10,
        records::MULRK => 12,
        records::BLANK => 6,
        records::MULBLANK => 8,
        records::BOOLERR => 8,
        records::FORMULA => 22,
        records::STRING => 3,
        records::SHRFMLA => 10,
        records::ARRAY => 14,
        records::ROW => 16,
        records::COLINFO => 10,
        records::MERGECELLS => 2,
        records::WINDOW2 => 2,
        records::PANE => 4,
        records::DEFCOLWIDTH => 2,
        records::DEFAULTROWHEIGHT => 4,
        records::HLINK => 32,
        records::HLINKTOOLTIP => 10,
        records::OBJ => 8,
        records::TXO => 12,
        records::NOTE => 8,
        records::BOUNDSHEET => 8,
        records::FONT => 16,
        records::FORMAT => 5,
        records::XF => 20,
        records::NAME => 15,
        records::SUPBOOK => 4,
        records::EXTERNSHEET => 2,
        records::EXTERNNAME => 8,
        records::PALETTE => 2,
        records::CODEPAGE | records::DATEMODE | records::PROTECT | records::PASSWORD => 2,
        records::WINDOW1 => 12,
        records::SST => 8,
        _ => 0,
    }
}

impl XlsReader {
    /// Read an XLS file from a filesystem path.
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsResult<Workbook> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read(file)
    }

    /// Read an XLS file from any `Read + Seek` source.
    pub fn read<R: Read + Seek>(reader: R) -> XlsResult<Workbook> {
        Self::read_with_options(reader, &XlsReadOptions::default())
    }

    pub fn read_with_options<R: Read + Seek>(
        mut reader: R,
        options: &XlsReadOptions,
    ) -> XlsResult<Workbook> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::read_bytes(&bytes, options)
    }

    /// Read a compound file, or a bare BIFF8 workbook stream
    pub fn read_bytes(bytes: &[u8], options: &XlsReadOptions) -> XlsResult<Workbook> {
        let stream = workbook_stream(bytes)?;
        Self::read_stream(&stream, options)
    }

    /// The BIFF8 workbook stream inside a compound file, or the bytes
    /// themselves when they already are a bare stream
    pub fn extract_stream(bytes: &[u8]) -> XlsResult<Vec<u8>> {
        workbook_stream(bytes)
    }

    /// Read the records of a BIFF8 workbook stream
    pub fn read_stream(stream: &[u8], options: &XlsReadOptions) -> XlsResult<Workbook> {
        let all_records = biff::read_all_records(stream, options.strict)?;

        let first = all_records
            .first()
            .ok_or_else(|| XlsError::record("empty workbook stream"))?;
        if first.record_type != records::BOF {
            return Err(XlsError::record(format!(
                "stream starts with {} instead of BOF",
                first.name()
            )));
        }
        let (version, dt) = biff::parse_bof(&first.data)?;
        if version != records::BIFF8_VERSION {
            return Err(XlsError::OldExcelFormat(format!(
                "BIFF version 0x{version:04X}"
            )));
        }
        if dt != records::BOF_WORKBOOK_GLOBALS {
            return Err(XlsError::record(format!(
                "first substream has type 0x{dt:04X}, expected workbook globals"
            )));
        }

        // Phase 1: Parse workbook globals
        let mut workbook = Workbook::empty();
        let mut sheets: Vec<SheetInfo> = Vec::new();
        let mut sst_record: Option<&BiffRecord> = None;
        let mut link_records: Vec<&BiffRecord> = Vec::new();
        let mut drawing_group: Vec<u8> = Vec::new();
        let mut codepage = DEFAULT_CODEPAGE;
        let mut active_tab = 0usize;
        let mut style_ctx = StyleContext::new(codepage);
        let mut globals_end_idx = None;

        for (idx, rec) in all_records.iter().enumerate().skip(1) {
            if !has_fixed_fields(rec, options.strict)? {
                continue;
            }
            let mut off = 0;
            match rec.record_type {
                records::EOF => {
                    globals_end_idx = Some(idx);
                    break;
                }
                records::FILEPASS => return Err(XlsError::Encrypted),
                records::CODEPAGE => {
                    codepage = read_u16(&rec.data, &mut off)?;
                    style_ctx.codepage = codepage;
                    workbook.settings_mut().codepage = codepage;
                }
                records::DATEMODE => {
                    workbook.settings_mut().date_1904 = read_u16(&rec.data, &mut off)? == 1;
                }
                records::PROTECT => {
                    workbook.settings_mut().protected = read_u16(&rec.data, &mut off)? != 0;
                }
                records::PASSWORD => {
                    let hash = read_u16(&rec.data, &mut off)?;
                    workbook.settings_mut().password_hash = (hash != 0).then_some(hash);
                }
                records::WINDOW1 => {
                    off = 10;
                    active_tab = read_u16(&rec.data, &mut off)? as usize;
                }
                records::SST => sst_record = Some(rec),
                records::BOUNDSHEET => {
                    sheets.push(Self::parse_boundsheet(&rec.data, codepage)?);
                }
                // ── Style records ────────────────────────────────────
                records::FONT => style_ctx.fonts.push(styles::parse_font(&rec.data, codepage)?),
                records::FORMAT => {
                    let (id, code) = styles::parse_format(&rec.data, codepage)?;
                    style_ctx.formats.insert(id, code);
                }
                records::XF => style_ctx.xfs.push(styles::parse_xf(&rec.data)?),
                records::PALETTE => {
                    let colors = styles::parse_palette(&rec.data)?;
                    style_ctx.palette.load(&colors);
                    workbook.palette_mut().load(&colors);
                }
                records::SUPBOOK | records::EXTERNNAME | records::EXTERNSHEET | records::NAME => {
                    link_records.push(rec)
                }
                records::MSODRAWINGGROUP => drawing_group.extend_from_slice(&rec.data),
                _ => {}
            }
        }

        let globals_end_idx = globals_end_idx
            .ok_or_else(|| XlsError::record("workbook globals have no EOF"))?;

        let sst = match sst_record {
            Some(rec) => parse_sst(&rec.data, &rec.continue_offsets, codepage, options.strict)?,
            None => Vec::new(),
        };

        // BOUNDSHEET positions include chart and macro sheets; the workbook
        // only keeps worksheets
        let mut sheet_map: Vec<Option<usize>> = Vec::with_capacity(sheets.len());
        for info in &sheets {
            if info.sheet_type == 0 {
                let index = workbook.add_worksheet_with_name(&info.name)?;
                if let Some(ws) = workbook.worksheet_mut(index) {
                    ws.set_visibility(SheetVisibility::from_code(info.visibility));
                }
                sheet_map.push(Some(index));
            } else {
                log::debug!("skipping sheet '{}' of type {}", info.name, info.sheet_type);
                sheet_map.push(None);
            }
        }

        let links = Self::read_link_tables(
            &mut workbook,
            &sheets,
            &sheet_map,
            &link_records,
            codepage,
            options.strict,
        )?;

        if options.read_drawings && !drawing_group.is_empty() {
            for picture in drawing::parse_drawing_group(&drawing_group, options.strict)? {
                workbook.add_picture(picture.data, picture.format);
            }
        }

        let globals = Globals {
            sst,
            styles: style_ctx.build_style_table(),
            links,
            codepage,
            strict: options.strict,
            read_drawings: options.read_drawings,
        };

        // Phase 2: Parse each worksheet substream
        let groups = Self::split_sheet_records(&all_records[globals_end_idx + 1..]);
        for (biff_idx, info) in sheets.iter().enumerate() {
            let Some(wb_idx) = sheet_map[biff_idx] else {
                continue;
            };
            let group = match groups
                .iter()
                .find(|g| g.bof_offset == info.offset as u64)
            {
                Some(group) => Some(group),
                None if options.strict => {
                    return Err(XlsError::record(format!(
                        "sheet '{}' points at offset {}, which holds no BOF",
                        info.name, info.offset
                    )))
                }
                None => {
                    log::warn!(
                        "sheet '{}' has a bad BOF offset {}; using substream {}",
                        info.name,
                        info.offset,
                        biff_idx
                    );
                    groups.get(biff_idx)
                }
            };
            let (Some(group), Some(ws)) = (group, workbook.worksheet_mut(wb_idx)) else {
                continue;
            };
            SheetReader::new(ws, &globals).read(&group.records)?;
            log::debug!("parsed sheet '{}' ({} records)", info.name, group.records.len());
        }

        if let Some(Some(active)) = sheet_map.get(active_tab) {
            workbook.set_active_sheet(*active)?;
        }
        Ok(workbook)
    }

    /// Parse a BOUNDSHEET record body.
    fn parse_boundsheet(data: &[u8], codepage: u16) -> XlsResult<SheetInfo> {
        let mut offset = 0;
        let abs_offset = read_u32(data, &mut offset)?;
        let visibility = read_u8(data, &mut offset)? & 0x03;
        let sheet_type = read_u8(data, &mut offset)?;
        let name = read_short_string(data, &mut offset, codepage)?;

        Ok(SheetInfo {
            offset: abs_offset,
            visibility,
            sheet_type,
            name,
        })
    }

    /// Build the reference tables and the defined names
    fn read_link_tables(
        workbook: &mut Workbook,
        sheets: &[SheetInfo],
        sheet_map: &[Option<usize>],
        link_records: &[&BiffRecord],
        codepage: u16,
        strict: bool,
    ) -> XlsResult<LinkTable> {
        let mut links = LinkTable::new(sheets.iter().map(|s| s.name.clone()).collect());
        let mut raw_names: Vec<RawName> = Vec::new();
        for rec in link_records {
            match rec.record_type {
                records::SUPBOOK => links.parse_supbook(&rec.data, codepage)?,
                records::EXTERNNAME => links.parse_externname(&rec.data, codepage)?,
                records::EXTERNSHEET => links.parse_externsheet(&rec.data)?,
                _ => raw_names.push(links.parse_name(&rec.data, codepage)?),
            }
        }

        // names may refer to names defined after them, so formulas are
        // rendered once every NAME is known
        for raw in raw_names {
            let name = raw.name.clone();
            let mut named = match links.resolve_name(raw) {
                Ok(named) => named,
                Err(e) if !strict => {
                    log::warn!("dropping defined name '{}': {}", name, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let NameScope::Sheet(biff_idx) = named.scope {
                match sheet_map.get(biff_idx).copied().flatten() {
                    Some(idx) => named.scope = NameScope::Sheet(idx),
                    None => {
                        log::warn!("dropping name '{}' local to a sheet that is not kept", name);
                        continue;
                    }
                }
            }
            workbook.named_ranges_mut().push_unchecked(named);
        }
        log::debug!("read {} defined names", workbook.named_ranges().len());
        Ok(links)
    }

    /// Split remaining records into per-sheet groups (each BOF..EOF pair is one sheet).
    fn split_sheet_records(records: &[BiffRecord]) -> Vec<SheetGroup<'_>> {
        let mut groups: Vec<SheetGroup<'_>> = Vec::new();
        let mut current: Option<SheetGroup<'_>> = None;
        let mut depth = 0usize;

        for rec in records {
            match rec.record_type {
                records::BOF => {
                    if depth == 0 {
                        current = Some(SheetGroup {
                            bof_offset: rec.stream_offset,
                            records: Vec::new(),
                        });
                    }
                    depth += 1;
                }
                records::EOF => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                    }
                }
                _ => {
                    // records of embedded substreams (charts) are not ours
                    if depth == 1 {
                        if let Some(ref mut group) = current {
                            group.records.push(rec);
                        }
                    }
                }
            }
        }

        groups
    }
}

/// The BIFF8 workbook stream inside `bytes`
fn workbook_stream(bytes: &[u8]) -> XlsResult<Vec<u8>> {
    if bytes.starts_with(&CFB_MAGIC) {
        let mut cfb = cfb::CompoundFile::open(Cursor::new(bytes))?;
        if cfb.exists("/Workbook") {
            let mut stream_data = Vec::new();
            cfb.open_stream("/Workbook")?.read_to_end(&mut stream_data)?;
            return Ok(stream_data);
        }
        if cfb.exists("/Book") {
            return Err(XlsError::OldExcelFormat(
                "BIFF5 'Book' stream without a BIFF8 'Workbook' stream".into(),
            ));
        }
        return Err(XlsError::record("compound file has no Workbook stream"));
    }

    let mut off = 0;
    let record_type = read_u16(bytes, &mut off).map_err(|_| XlsError::NotOle2)?;
    match record_type {
        records::BOF_BIFF2 | records::BOF_BIFF3 | records::BOF_BIFF4 => Err(
            XlsError::OldExcelFormat(format!("BIFF record 0x{record_type:04X}")),
        ),
        records::BOF => {
            off = 4;
            let version = read_u16(bytes, &mut off).map_err(|_| XlsError::NotOle2)?;
            if version < records::BIFF8_VERSION {
                Err(XlsError::OldExcelFormat(format!("BIFF version 0x{version:04X}")))
            } else {
                Ok(bytes.to_vec())
            }
        }
        _ => Err(XlsError::NotOle2),
    }
}

/// A FORMULA record whose text is rendered when the sheet is complete
struct PendingFormula {
    row: u32,
    col: u16,
    tokens: Vec<Ptg>,
    cached: Option<CellValue>,
}

/// Tokens of a SHRFMLA or ARRAY record and the cells they cover
struct FormulaBlock {
    range: CellRange,
    tokens: Vec<Ptg>,
    /// SHRFMLA tokens are relative to each cell; ARRAY tokens are not
    shared: bool,
}

/// State of one worksheet substream
struct SheetReader<'a> {
    ws: &'a mut Worksheet,
    globals: &'a Globals,
    /// XF index to style pool index
    xf_styles: AHashMap<u16, u32>,
    formulas: Vec<PendingFormula>,
    /// Shared and array formulas by their top-left cell
    blocks: AHashMap<(u32, u16), FormulaBlock>,
    /// Position in `formulas` of a FORMULA waiting for its STRING
    pending_string: Option<usize>,
    hyperlinks: Vec<Hyperlink>,
    drawing: DrawingParts,
    frozen: bool,
}

impl<'a> SheetReader<'a> {
    fn new(ws: &'a mut Worksheet, globals: &'a Globals) -> Self {
        Self {
            ws,
            globals,
            xf_styles: AHashMap::new(),
            formulas: Vec::new(),
            blocks: AHashMap::new(),
            pending_string: None,
            hyperlinks: Vec::new(),
            drawing: DrawingParts::default(),
            frozen: false,
        }
    }

    fn read(mut self, records: &[&BiffRecord]) -> XlsResult<()> {
        for rec in records {
            if !has_fixed_fields(rec, self.globals.strict)? {
                continue;
            }
            if !matches!(
                rec.record_type,
                records::STRING | records::SHRFMLA | records::ARRAY
            ) {
                self.pending_string = None;
            }
            let data = &rec.data;
            match rec.record_type {
                records::LABELSST => self.parse_labelsst(data)?,
                records::LABEL => self.parse_label(data)?,
                records::NUMBER => self.parse_number(data)?,
                records::RK => self.parse_rk(data)?,
                records::MULRK => self.parse_mulrk(data)?,
                records::BLANK => self.parse_blank(data)?,
                records::MULBLANK => self.parse_mulblank(data)?,
                records::BOOLERR => self.parse_boolerr(data)?,
                records::FORMULA => self.parse_formula(data)?,
                records::STRING => self.parse_formula_string(data)?,
                records::SHRFMLA => self.parse_shared_formula(data)?,
                records::ARRAY => self.parse_array_formula(data)?,
                records::MERGECELLS => self.parse_mergecells(data)?,
                records::ROW => self.parse_row(data)?,
                records::COLINFO => self.parse_colinfo(data)?,
                records::DEFCOLWIDTH => {
                    let mut off = 0;
                    let width = read_u16(data, &mut off)?;
                    self.ws.set_default_column_width(width as f64);
                }
                records::DEFAULTROWHEIGHT => {
                    let mut off = 2;
                    let height = read_u16(data, &mut off)?;
                    self.ws.set_default_row_height(height as f64 / 20.0);
                }
                records::WINDOW2 => {
                    let mut off = 0;
                    let options = read_u16(data, &mut off)?;
                    self.frozen = options & WINDOW2_FROZEN != 0;
                    self.ws.set_selected(options & WINDOW2_SELECTED != 0);
                }
                records::PANE => {
                    let mut off = 0;
                    let cols = read_u16(data, &mut off)?;
                    let rows = read_u16(data, &mut off)?;
                    if self.frozen {
                        self.ws.set_freeze_panes(rows as u32, cols);
                    }
                }
                records::HLINK => self.hyperlinks.push(hyperlinks::parse_hlink(data)?),
                records::HLINKTOOLTIP => {
                    let (range, tooltip) = hyperlinks::parse_tooltip(data)?;
                    match self.hyperlinks.iter_mut().rev().find(|l| l.range == range) {
                        Some(link) => link.tooltip = Some(tooltip),
                        None => log::warn!("tooltip for {} has no hyperlink", range),
                    }
                }
                records::MSODRAWING => self.drawing.escher.extend_from_slice(data),
                records::OBJ => self.drawing.objs.push(drawing::parse_obj(data)?),
                records::TXO => self
                    .drawing
                    .texts
                    .push(drawing::parse_txo(rec, self.globals.codepage)?),
                records::NOTE => self
                    .drawing
                    .notes
                    .push(drawing::parse_note(data, self.globals.codepage)?),
                _ => {
                    // Skip unknown/unhandled records
                }
            }
        }

        self.finish()
    }

    /// Render formulas, then attach hyperlinks and drawings
    fn finish(mut self) -> XlsResult<()> {
        let strict = self.globals.strict;
        for formula in std::mem::take(&mut self.formulas) {
            let value = match self.formula_text(&formula) {
                Ok(text) => CellValue::Formula {
                    text,
                    cached_value: formula.cached.map(Box::new),
                },
                Err(e) if !strict => {
                    log::warn!(
                        "formula in {} is unreadable, keeping its cached value: {}",
                        CellAddress::new(formula.row, formula.col),
                        e
                    );
                    match formula.cached {
                        Some(value) => value,
                        None => continue,
                    }
                }
                Err(e) => return Err(e),
            };
            self.ws.set_cell_value_at(formula.row, formula.col, value)?;
        }

        for link in std::mem::take(&mut self.hyperlinks) {
            self.ws.add_hyperlink(link)?;
        }

        if self.globals.read_drawings && !self.drawing.is_empty() {
            let parts = std::mem::take(&mut self.drawing);
            match drawing::apply_drawing(self.ws, parts, strict) {
                Err(e) if !strict => log::warn!("ignoring unreadable drawing: {}", e),
                result => result?,
            }
        }
        Ok(())
    }

    fn formula_text(&self, formula: &PendingFormula) -> XlsResult<String> {
        let links = &self.globals.links;
        if let [Ptg::Exp { row, col }] = formula.tokens.as_slice() {
            let block = self
                .blocks
                .get(&(*row as u32, *col))
                .filter(|b| b.range.contains_cell(formula.row, formula.col))
                .ok_or_else(|| {
                    XlsError::record(format!(
                        "no shared formula at {} covers {}",
                        CellAddress::new(*row as u32, *col),
                        CellAddress::new(formula.row, formula.col)
                    ))
                })?;
            let (base_row, base_col) = if block.shared {
                (formula.row, formula.col)
            } else {
                (block.range.start.row, block.range.start.col)
            };
            return Ok(render(&block.tokens, links, base_row, base_col)?);
        }
        Ok(render(&formula.tokens, links, formula.row, formula.col)?)
    }

    // ── Style application helper ─────────────────────────────────────────

    /// Apply a style from the XF table to a cell.
    fn apply_style(&mut self, row: u32, col: u16, xf_idx: u16) -> XlsResult<()> {
        if let Some(style_index) = self.style_index(xf_idx)? {
            self.ws.set_cell_style_index_at(row, col, style_index)?;
        }
        Ok(())
    }

    /// Pool index of an XF, `None` for the default style
    fn style_index(&mut self, xf_idx: u16) -> XlsResult<Option<u32>> {
        if let Some(&index) = self.xf_styles.get(&xf_idx) {
            return Ok((index != 0).then_some(index));
        }
        let style = match self.globals.styles.get(xf_idx as usize) {
            Some(Some(style)) => style,
            found => {
                let problem = if found.is_some() {
                    "is a style XF"
                } else {
                    "is out of range"
                };
                if self.globals.strict {
                    return Err(XlsError::record(format!("XF index {} {}", xf_idx, problem)));
                }
                log::warn!("XF index {} {}, using the default style", xf_idx, problem);
                self.xf_styles.insert(xf_idx, 0);
                return Ok(None);
            }
        };
        let index = if *style == Style::default() {
            0
        } else {
            self.ws.style_pool_mut().get_or_insert(style.clone())
        };
        self.xf_styles.insert(xf_idx, index);
        Ok((index != 0).then_some(index))
    }

    fn set_value(&mut self, row: u32, col: u16, xf_idx: u16, value: CellValue) -> XlsResult<()> {
        self.ws.set_cell_value_at(row, col, value)?;
        self.apply_style(row, col, xf_idx)
    }

    // ── Cell record parsers ──────────────────────────────────────────────

    /// LABELSST: row(2) + col(2) + xf(2) + sst_index(4)
    fn parse_labelsst(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let col = read_u16(data, &mut off)?;
        let xf_idx = read_u16(data, &mut off)?;
        let sst_idx = read_u32(data, &mut off)? as usize;

        let s = self.globals.sst.get(sst_idx).ok_or_else(|| {
            XlsError::record(format!(
                "cell {} refers to string {} of {}",
                CellAddress::new(row, col),
                sst_idx,
                self.globals.sst.len()
            ))
        })?;
        let value = CellValue::String(SharedString::new(s));
        self.set_value(row, col, xf_idx, value)
    }

    /// LABEL: row(2) + col(2) + xf(2) + unicode_string
    fn parse_label(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let col = read_u16(data, &mut off)?;
        let xf_idx = read_u16(data, &mut off)?;
        let text = read_unicode_string(data, &mut off, self.globals.codepage)?;
        self.set_value(row, col, xf_idx, CellValue::String(SharedString::new(&text)))
    }

    /// NUMBER: row(2) + col(2) + xf(2) + f64(8)
    fn parse_number(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let col = read_u16(data, &mut off)?;
        let xf_idx = read_u16(data, &mut off)?;
        let value = read_f64(data, &mut off)?;
        self.set_value(row, col, xf_idx, CellValue::Number(value))
    }

    /// RK: row(2) + col(2) + xf(2) + rk(4)
    fn parse_rk(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let col = read_u16(data, &mut off)?;
        let xf_idx = read_u16(data, &mut off)?;
        let value = read_rk(data, &mut off)?;
        self.set_value(row, col, xf_idx, CellValue::Number(value))
    }

    /// MULRK: row(2) + first_col(2) + [xf(2) + rk(4)]* + last_col(2)
    fn parse_mulrk(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let first_col = read_u16(data, &mut off)?;
        let mut tail = data.len() - 2;
        let last_col = read_u16(data, &mut tail)?;
        let rk_data_end = data.len() - 2;

        let mut col = first_col;
        while off + 6 <= rk_data_end && col <= last_col {
            let xf_idx = read_u16(data, &mut off)?;
            let value = read_rk(data, &mut off)?;
            self.set_value(row, col, xf_idx, CellValue::Number(value))?;
            col += 1;
        }
        Ok(())
    }

    /// BLANK: row(2) + col(2) + xf(2)
    fn parse_blank(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let col = read_u16(data, &mut off)?;
        let xf_idx = read_u16(data, &mut off)?;
        self.apply_style(row, col, xf_idx)
    }

    /// MULBLANK: row(2) + first_col(2) + [xf(2)]* + last_col(2)
    fn parse_mulblank(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let first_col = read_u16(data, &mut off)?;
        let mut tail = data.len() - 2;
        let last_col = read_u16(data, &mut tail)?;
        let xf_data_end = data.len() - 2;

        let mut col = first_col;
        while off + 2 <= xf_data_end && col <= last_col {
            let xf_idx = read_u16(data, &mut off)?;
            self.apply_style(row, col, xf_idx)?;
            col += 1;
        }
        Ok(())
    }

    /// BOOLERR: row(2) + col(2) + xf(2) + value(1) + is_error(1)
    fn parse_boolerr(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let col = read_u16(data, &mut off)?;
        let xf_idx = read_u16(data, &mut off)?;
        let val = read_u8(data, &mut off)?;
        let is_error = read_u8(data, &mut off)?;

        let value = if is_error != 0 {
            CellValue::Error(CellError::from_code(val).unwrap_or(CellError::Value))
        } else {
            CellValue::Boolean(val != 0)
        };
        self.set_value(row, col, xf_idx, value)
    }

    /// FORMULA: row(2) + col(2) + xf(2) + result(8) + options(2) + reserved(4)
    /// + cce(2) + rgce + rgcb
    fn parse_formula(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32;
        let col = read_u16(data, &mut off)?;
        let xf_idx = read_u16(data, &mut off)?;
        let result = read_bytes(data, &mut off, 8)?;
        let options = read_u16(data, &mut off)?;
        let _reserved = read_u32(data, &mut off)?;
        let cce = read_u16(data, &mut off)? as usize;
        let rgce = read_bytes(data, &mut off, cce)?;
        let rgcb = &data[off..];

        let tokens = match decode_rgce(rgce, rgcb) {
            Ok(tokens) => tokens,
            Err(e) if !self.globals.strict => {
                log::warn!("unreadable formula in {}: {}", CellAddress::new(row, col), e);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        // Special results have 0xFFFF in their top two bytes
        let mut string_follows = false;
        let cached = if result[6] == 0xFF && result[7] == 0xFF {
            match result[0] {
                0x00 => {
                    string_follows = true;
                    None
                }
                0x01 => Some(CellValue::Boolean(result[2] != 0)),
                0x02 => Some(CellValue::Error(
                    CellError::from_code(result[2]).unwrap_or(CellError::Value),
                )),
                0x03 => Some(CellValue::String(SharedString::new(""))),
                _ => None,
            }
        } else {
            let mut r = 0;
            let value = read_f64(result, &mut r)?;
            // writers store "not calculated yet" as 0 with always-calc set
            if value == 0.0 && options & FORMULA_ALWAYS_CALC != 0 {
                None
            } else {
                Some(CellValue::Number(value))
            }
        };

        self.apply_style(row, col, xf_idx)?;
        if tokens.is_empty() {
            // lenient: keep what the file calculated
            if let Some(value) = cached {
                self.ws.set_cell_value_at(row, col, value)?;
            }
            return Ok(());
        }
        self.formulas.push(PendingFormula {
            row,
            col,
            tokens,
            cached,
        });
        if string_follows {
            self.pending_string = Some(self.formulas.len() - 1);
        }
        Ok(())
    }

    /// STRING record: cached string value for a preceding FORMULA.
    fn parse_formula_string(&mut self, data: &[u8]) -> XlsResult<()> {
        let Some(index) = self.pending_string.take() else {
            log::warn!("STRING record without a FORMULA");
            return Ok(());
        };
        let mut off = 0;
        let text = read_unicode_string(data, &mut off, self.globals.codepage)?;
        if let Some(formula) = self.formulas.get_mut(index) {
            formula.cached = Some(CellValue::String(SharedString::new(&text)));
        }
        Ok(())
    }

    /// Cells covered by a SHRFMLA or ARRAY record: rwFirst(2) rwLast(2)
    /// colFirst(1) colLast(1)
    fn read_block_range(data: &[u8], off: &mut usize) -> XlsResult<CellRange> {
        let first_row = read_u16(data, off)? as u32;
        let last_row = read_u16(data, off)? as u32;
        let first_col = read_u8(data, off)? as u16;
        let last_col = read_u8(data, off)? as u16;
        Ok(CellRange::from_indices(first_row, first_col, last_row, last_col))
    }

    fn read_block_tokens(data: &[u8], off: &mut usize) -> XlsResult<Vec<Ptg>> {
        let cce = read_u16(data, off)? as usize;
        let rgce = read_bytes(data, off, cce)?;
        Ok(decode_rgce(rgce, &data[*off..])?)
    }

    /// SHRFMLA: range(6) + reserved(1) + cUse(1) + cce(2) + rgce + rgcb
    fn parse_shared_formula(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let range = Self::read_block_range(data, &mut off)?;
        off += 2;
        let tokens = Self::read_block_tokens(data, &mut off)?;
        self.blocks.insert(
            (range.start.row, range.start.col),
            FormulaBlock {
                range,
                tokens,
                shared: true,
            },
        );
        Ok(())
    }

    /// ARRAY: range(6) + options(2) + reserved(4) + cce(2) + rgce + rgcb
    fn parse_array_formula(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let range = Self::read_block_range(data, &mut off)?;
        off += 6;
        let tokens = Self::read_block_tokens(data, &mut off)?;
        self.blocks.insert(
            (range.start.row, range.start.col),
            FormulaBlock {
                range,
                tokens,
                shared: false,
            },
        );
        Ok(())
    }

    // ── Structural record parsers ────────────────────────────────────────

    /// MERGECELLS: count(2) + [first_row(2) + last_row(2) + first_col(2) + last_col(2)]*
    fn parse_mergecells(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let count = read_u16(data, &mut off)? as usize;

        for _ in 0..count {
            let first_row = read_u16(data, &mut off)? as u32;
            let last_row = read_u16(data, &mut off)? as u32;
            let first_col = read_u16(data, &mut off)?;
            let last_col = read_u16(data, &mut off)?;

            let range = CellRange::from_indices(first_row, first_col, last_row, last_col);
            if let Err(e) = self.ws.merge_cells(&range) {
                log::warn!("ignoring merged region {}: {}", range, e);
            }
        }

        Ok(())
    }

    /// ROW: row_index(2) + first_col(2) + last_col_plus1(2) + height(2)
    /// + reserved(4) + options(4)
    fn parse_row(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let row_index = read_u16(data, &mut off)? as u32;
        let _first_col = read_u16(data, &mut off)?;
        let _last_col_plus1 = read_u16(data, &mut off)?;
        let raw_height = read_u16(data, &mut off)?;
        off = 12;
        let options = read_u32(data, &mut off)?;

        let height_pt = (raw_height & 0x7FFF) as f64 / 20.0;
        if options & ROW_HIDDEN != 0 {
            self.ws.set_row_hidden(row_index, true)?;
        }
        if options & ROW_CUSTOM_HEIGHT != 0 && height_pt > 0.0 {
            self.ws.set_row_height(row_index, height_pt)?;
        }
        let level = (options & ROW_OUTLINE_MASK) as u8;
        if level > 0 {
            self.ws.set_row_outline_level(row_index, level)?;
        }
        if options & ROW_HAS_STYLE != 0 {
            let xf_idx = ((options >> 16) & 0x0FFF) as u16;
            if let Some(style_index) = self.style_index(xf_idx)? {
                self.ws.set_row_style_index(row_index, Some(style_index))?;
            }
        }

        Ok(())
    }

    /// COLINFO: first_col(2) + last_col(2) + width(2) + xf(2) + options(2) + reserved(2)
    fn parse_colinfo(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let first_col = read_u16(data, &mut off)?;
        let last_col = read_u16(data, &mut off)?.min(MAX_COLS - 1);
        let raw_width = read_u16(data, &mut off)?;
        let xf_idx = read_u16(data, &mut off)?;
        let options = read_u16(data, &mut off)?;

        let hidden = (options & 0x0001) != 0;
        let level = ((options >> 8) & 0x07) as u8;
        let width_chars = raw_width as f64 / 256.0;
        let style_index = self.style_index(xf_idx)?;

        for col in first_col..=last_col {
            if hidden {
                self.ws.set_column_hidden(col, true)?;
            }
            if width_chars > 0.0 {
                self.ws.set_column_width(col, width_chars)?;
            }
            if level > 0 {
                self.ws.set_column_outline_level(col, level)?;
            }
            if style_index.is_some() {
                self.ws.set_column_style_index(col, style_index)?;
            }
        }

        Ok(())
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
    fn test_container_detection() {
        assert!(matches!(
            workbook_stream(b"just some text"),
            Err(XlsError::NotOle2)
        ));
        assert!(matches!(workbook_stream(&[0x09]), Err(XlsError::NotOle2)));

        let biff2 = raw(records::BOF_BIFF2, &[0x00, 0x00, 0x10, 0x00]);
        assert!(matches!(
            workbook_stream(&biff2),
            Err(XlsError::OldExcelFormat(_))
        ));

        let biff5 = raw(records::BOF, &[0x00, 0x05, 0x05, 0x00]);
        assert!(matches!(
            workbook_stream(&biff5),
            Err(XlsError::OldExcelFormat(_))
        ));

        let biff8 = raw(records::BOF, &[0x00, 0x06, 0x05, 0x00]);
        assert_eq!(workbook_stream(&biff8).unwrap(), biff8);
    }

    #[test]
    fn test_book_stream_is_old_format() {
        let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        cfb.create_stream("/Book").unwrap();
        cfb.flush().unwrap();
        let bytes = cfb.into_inner().into_inner();
        assert!(matches!(
            XlsReader::read_bytes(&bytes, &XlsReadOptions::default()),
            Err(XlsError::OldExcelFormat(_))
        ));
    }

    #[test]
    fn test_filepass_is_encrypted() {
        let mut stream = raw(records::BOF, &[0x00, 0x06, 0x05, 0x00]);
        stream.extend(raw(records::FILEPASS, &[0x01, 0x00]));
        stream.extend(raw(records::EOF, &[]));
        assert!(matches!(
            XlsReader::read_stream(&stream, &XlsReadOptions::default()),
            Err(XlsError::Encrypted)
        ));
    }

    #[test]
    fn test_split_sheet_records_skips_embedded_substreams() {
        let rec = |record_type, offset| BiffRecord {
            record_type,
            data: Vec::new(),
            continue_offsets: Vec::new(),
            stream_offset: offset,
        };
        let records = vec![
            rec(records::BOF, 100),
            rec(records::NUMBER, 120),
            rec(records::BOF, 140),
            rec(records::NUMBER, 160),
            rec(records::EOF, 180),
            rec(records::EOF, 184),
            rec(records::BOF, 188),
            rec(records::EOF, 200),
        ];
        let groups = XlsReader::split_sheet_records(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].bof_offset, 100);
        assert_eq!(groups[0].records.len(), 1);
        assert_eq!(groups[0].records[0].stream_offset, 120);
        assert_eq!(groups[1].bof_offset, 188);
    }
}

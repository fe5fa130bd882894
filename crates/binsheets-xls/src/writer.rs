//! XLS (BIFF8) writer.
//!
//! Sheet substreams are laid out first, since they feed the shared string
//! table and the style table. The globals substream follows with the
//! BOUNDSHEET offsets patched once its length is known, and the whole
//! stream is stored as `Workbook` in a compound file.

use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use binsheets_core::{CellRange, CellValue, Style, Workbook, Worksheet};

use crate::biff::parser::{encode_rk, WriteLe};
use crate::biff::records;
use crate::biff::strings::{write_short_string, write_unicode_string};
use crate::biff::RecordWriter;
use crate::drawing::{drawing_group, DrawingPlan, SheetDrawing};
use crate::error::{XlsError, XlsResult};
use crate::hyperlinks::{write_hlink, write_tooltip};
use crate::link_table::LinkTable;
use crate::options::XlsWriteOptions;
use crate::sanity::SanityChecker;
use crate::sst::{write_extsst, SstBuilder};
use crate::styles::{StyleTable, DEFAULT_CELL_XF};

/// Excel refuses `Workbook` streams shorter than this
const MIN_STREAM_LEN: usize = 4096;
/// ROW records are written in blocks of this many rows, each block
/// followed by its cells
const ROWS_PER_BLOCK: usize = 32;
/// MERGECELLS holds at most this many ranges
const MERGES_PER_RECORD: usize = 1026;
const WRITE_ACCESS_LEN: usize = 112;
const UTF16_CODEPAGE: u16 = 1200;

// FORMULA option flags
const FORMULA_ALWAYS_CALC: u16 = 0x0001;
const FORMULA_CALC_ON_LOAD: u16 = 0x0002;

// ROW option flags
const ROW_HIDDEN: u32 = 0x0020;
const ROW_CUSTOM_HEIGHT: u32 = 0x0040;
const ROW_HAS_STYLE: u32 = 0x0080;
const ROW_RESERVED: u32 = 0x0100;

// WINDOW2 option flags
const WINDOW2_DEFAULT: u16 = 0x00B6;
const WINDOW2_FROZEN: u16 = 0x0108;
const WINDOW2_SELECTED: u16 = 0x0600;

/// XLS file writer
pub struct XlsWriter;

/// Tables shared by every sheet substream
struct WriteContext<'a> {
    options: &'a XlsWriteOptions,
    styles: StyleTable,
    sst: SstBuilder,
    links: LinkTable,
    plan: DrawingPlan,
}

impl XlsWriter {
    /// Write a workbook to a file path
    pub fn write_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> XlsResult<()> {
        let file = File::create(path)?;
        Self::write(workbook, file)
    }

    /// Write a workbook to a writer
    pub fn write<W: Write + Seek>(workbook: &Workbook, writer: W) -> XlsResult<()> {
        Self::write_with_options(workbook, writer, &XlsWriteOptions::default())
    }

    pub fn write_with_options<W: Write + Seek>(
        workbook: &Workbook,
        mut writer: W,
        options: &XlsWriteOptions,
    ) -> XlsResult<()> {
        let mut stream = Self::workbook_stream(workbook, options)?;
        if options.run_sanity_check {
            let violations = SanityChecker::check_stream(&stream)?;
            if !violations.is_empty() {
                let list: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                return Err(XlsError::RecordFormat(format!(
                    "written stream fails the sanity check: {}",
                    list.join("; ")
                )));
            }
        }
        if stream.len() < MIN_STREAM_LEN {
            stream.resize(MIN_STREAM_LEN, 0);
        }

        let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new()))?;
        cfb.create_stream("/Workbook")?.write_all(&stream)?;
        cfb.flush()?;
        writer.write_all(cfb.into_inner().get_ref())?;
        writer.flush()?;
        Ok(())
    }

    /// The compound file bytes of a workbook
    pub fn to_bytes(workbook: &Workbook) -> XlsResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        Self::write(workbook, &mut out)?;
        Ok(out.into_inner())
    }

    /// The BIFF8 `Workbook` stream of a workbook
    pub fn workbook_stream(workbook: &Workbook, options: &XlsWriteOptions) -> XlsResult<Vec<u8>> {
        if workbook.sheet_count() == 0 {
            return Err(binsheets_core::Error::invalid_argument(
                "a workbook needs at least one sheet",
            )
            .into());
        }

        let mut styles = StyleTable::new(workbook.palette());
        styles.add_style(&Style::default())?;
        let mut ctx = WriteContext {
            options,
            styles,
            sst: SstBuilder::new(),
            links: LinkTable::for_workbook(workbook)?,
            plan: DrawingPlan::for_workbook(workbook)?,
        };

        let mut sheets = Vec::with_capacity(workbook.sheet_count());
        for (index, sheet) in workbook.worksheets().enumerate() {
            sheets.push(Self::sheet_stream(workbook, sheet, index, &mut ctx)?);
        }

        let (mut globals, boundsheet_positions) = Self::globals_stream(workbook, &ctx)?;
        let mut offset = globals.len();
        for (position, sheet) in boundsheet_positions.iter().zip(&sheets) {
            globals[*position..*position + 4].copy_from_slice(&(offset as u32).to_le_bytes());
            offset += sheet.len();
        }
        for sheet in sheets {
            globals.extend_from_slice(&sheet);
        }
        log::debug!(
            "wrote workbook stream: {} sheets, {} bytes",
            workbook.sheet_count(),
            globals.len()
        );
        Ok(globals)
    }

    // ── workbook globals ────────────────────────────────────────────────

    /// The globals substream and the stream position of every BOUNDSHEET
    /// offset field
    fn globals_stream(workbook: &Workbook, ctx: &WriteContext<'_>) -> XlsResult<(Vec<u8>, Vec<usize>)> {
        let settings = workbook.settings();
        let mut out = RecordWriter::new(Vec::new());

        out.write_record(records::BOF, &bof_body(records::BOF_WORKBOOK_GLOBALS))?;
        out.write_record(records::INTERFACEHDR, &UTF16_CODEPAGE.to_le_bytes())?;
        out.write_record(records::MMS, &[0, 0])?;
        out.write_record(records::INTERFACEEND, &[])?;
        out.write_record(records::WRITEACCESS, &write_access_body()?)?;
        out.write_record(records::CODEPAGE, &UTF16_CODEPAGE.to_le_bytes())?;
        out.write_record(records::DSF, &[0, 0])?;

        let mut tabs = Vec::with_capacity(workbook.sheet_count() * 2);
        for i in 0..workbook.sheet_count() {
            tabs.put_u16(i as u16 + 1);
        }
        out.write_record(records::TABID, &tabs)?;
        out.write_record(records::FNGROUPCOUNT, &0x000Eu16.to_le_bytes())?;
        out.write_record(records::WINDOWPROTECT, &[0, 0])?;
        out.write_record(records::PROTECT, &u16::from(settings.protected).to_le_bytes())?;
        out.write_record(records::PASSWORD, &settings.password_hash.unwrap_or(0).to_le_bytes())?;
        out.write_record(records::PROT4REV, &[0, 0])?;
        out.write_record(records::PROT4REVPASS, &[0, 0])?;
        out.write_record(records::BACKUP, &[0, 0])?;
        out.write_record(records::HIDEOBJ, &[0, 0])?;
        out.write_record(records::WINDOW1, &window1_body(workbook.active_sheet()))?;
        out.write_record(records::DATEMODE, &u16::from(settings.date_1904).to_le_bytes())?;
        out.write_record(records::PRECISION, &[1, 0])?;
        out.write_record(records::REFRESHALL, &[0, 0])?;
        out.write_record(records::BOOKBOOL, &[0, 0])?;

        ctx.styles.write(&mut out)?;
        out.write_record(records::USESELFS, &[1, 0])?;

        let mut boundsheet_positions = Vec::with_capacity(workbook.sheet_count());
        for sheet in workbook.worksheets() {
            let mut body = Vec::new();
            body.put_u32(0);
            body.put_u8(sheet.visibility().code());
            body.put_u8(0);
            write_short_string(&mut body, sheet.name())?;
            // the offset field follows the 4-byte record header
            boundsheet_positions.push(out.position() as usize + 4);
            out.write_record(records::BOUNDSHEET, &body)?;
        }
        out.write_record(records::COUNTRY, &[1, 0, 1, 0])?;

        if ctx.links.has_extern_sheets() {
            for (supbook, names) in ctx.links.supbook_records()? {
                out.write_record(records::SUPBOOK, &supbook)?;
                for name in names {
                    out.write_record(records::EXTERNNAME, &name)?;
                }
            }
            out.write_record(records::EXTERNSHEET, &ctx.links.externsheet_body())?;
        }
        for name in workbook.named_ranges().iter() {
            out.write_record(records::NAME, &ctx.links.name_body(name)?)?;
        }

        if ctx.plan.needs_group(workbook) {
            let mut body = Vec::new();
            drawing_group(workbook, &ctx.plan).serialize(&mut body);
            out.write_record(records::MSODRAWINGGROUP, &body)?;
        }

        log::debug!(
            "shared string table: {} unique of {} cell strings",
            ctx.sst.len(),
            ctx.sst.total_count()
        );
        let buckets = ctx.sst.write(&mut out)?;
        if ctx.options.write_extsst {
            write_extsst(&mut out, &buckets)?;
        }
        out.write_record(records::EOF, &[])?;
        Ok((out.into_inner(), boundsheet_positions))
    }

    // ── worksheet substream ─────────────────────────────────────────────

    fn sheet_stream(
        workbook: &Workbook,
        sheet: &Worksheet,
        index: usize,
        ctx: &mut WriteContext<'_>,
    ) -> XlsResult<Vec<u8>> {
        // pool index to XF index
        let mut xfs = vec![DEFAULT_CELL_XF; sheet.style_pool().len().max(1)];
        for (pool_index, style) in sheet.style_pool().iter() {
            if pool_index != 0 {
                xfs[pool_index as usize] = ctx.styles.add_style(style)?;
            }
        }
        let xf = |style_index: u32| xfs.get(style_index as usize).copied().unwrap_or(DEFAULT_CELL_XF);

        let rows: Vec<_> = sheet.rows().collect();
        let first_row = rows.first().map_or(0, |r| r.index);
        let last_row = rows.last().map_or(0, |r| r.index + 1);
        let first_col = rows.iter().filter_map(|r| r.first_cell_num()).min().unwrap_or(0);
        let last_col = rows.iter().filter_map(|r| r.last_cell_num()).max().unwrap_or(0);

        let mut out = RecordWriter::new(Vec::new());
        out.write_record(records::BOF, &bof_body(records::BOF_WORKSHEET))?;

        let mut index_body = Vec::with_capacity(16);
        index_body.put_u32(0);
        index_body.put_u32(first_row);
        index_body.put_u32(last_row);
        index_body.put_u32(0);
        out.write_record(records::INDEX, &index_body)?;

        out.write_record(records::CALCMODE, &[1, 0])?;
        out.write_record(records::CALCCOUNT, &100u16.to_le_bytes())?;
        out.write_record(records::REFMODE, &[1, 0])?;
        out.write_record(records::ITERATION, &[0, 0])?;
        out.write_record(records::DELTA, &0.001f64.to_le_bytes())?;
        out.write_record(records::SAVERECALC, &[1, 0])?;
        out.write_record(records::PRINTHEADERS, &[0, 0])?;
        out.write_record(records::PRINTGRIDLINES, &[0, 0])?;
        out.write_record(records::GRIDSET, &[1, 0])?;

        let columns = sheet.column_runs();
        let row_levels = rows.iter().map(|r| r.info().outline_level).max().unwrap_or(0);
        let col_levels = columns.iter().map(|c| c.info.outline_level).max().unwrap_or(0);
        let mut guts = Vec::with_capacity(8);
        guts.put_u16(0);
        guts.put_u16(0);
        guts.put_u16(if row_levels > 0 { row_levels as u16 + 1 } else { 0 });
        guts.put_u16(if col_levels > 0 { col_levels as u16 + 1 } else { 0 });
        out.write_record(records::GUTS, &guts)?;

        let default_height = (sheet.default_row_height() * 20.0).round() as u16;
        let mut drh = Vec::with_capacity(4);
        drh.put_u16(0);
        drh.put_u16(default_height);
        out.write_record(records::DEFAULTROWHEIGHT, &drh)?;
        out.write_record(records::WSBOOL, &0x04C1u16.to_le_bytes())?;
        out.write_record(records::HEADER, &[])?;
        out.write_record(records::FOOTER, &[])?;
        out.write_record(records::HCENTER, &[0, 0])?;
        out.write_record(records::VCENTER, &[0, 0])?;
        out.write_record(records::SETUP, &setup_body())?;
        out.write_record(
            records::DEFCOLWIDTH,
            &(sheet.default_column_width().round() as u16).to_le_bytes(),
        )?;

        for run in &columns {
            let mut body = Vec::with_capacity(12);
            body.put_u16(run.min);
            body.put_u16(run.max);
            body.put_u16(run.info.width_units());
            body.put_u16(run.info.style_index.map_or(DEFAULT_CELL_XF, xf));
            body.put_u16(u16::from(run.info.hidden) | ((run.info.outline_level as u16 & 0x07) << 8));
            body.put_u16(0);
            out.write_record(records::COLINFO, &body)?;
        }

        let mut dims = Vec::with_capacity(14);
        dims.put_u32(first_row);
        dims.put_u32(last_row);
        dims.put_u16(first_col);
        dims.put_u16(last_col);
        dims.put_u16(0);
        out.write_record(records::DIMENSIONS, &dims)?;

        for block in rows.chunks(ROWS_PER_BLOCK) {
            for row in block {
                let info = row.info();
                let mut options = ROW_RESERVED | (info.outline_level as u32 & 0x07);
                if info.hidden {
                    options |= ROW_HIDDEN;
                }
                if info.custom_height {
                    options |= ROW_CUSTOM_HEIGHT;
                }
                if let Some(style_index) = info.style_index {
                    options |= ROW_HAS_STYLE | ((xf(style_index) as u32 & 0x0FFF) << 16);
                }
                let mut body = Vec::with_capacity(16);
                body.put_u16(row.index as u16);
                body.put_u16(row.first_cell_num().unwrap_or(0));
                body.put_u16(row.last_cell_num().unwrap_or(0));
                body.put_u16(if info.custom_height {
                    info.height_twips()
                } else {
                    default_height
                });
                body.put_u16(0);
                body.put_u16(0);
                body.put_u32(options);
                out.write_record(records::ROW, &body)?;
            }
            for row in block {
                for (col, cell) in row.cells() {
                    let cell_xf = xf(cell.style_index);
                    Self::write_cell(&mut out, ctx, index, row.index, col, cell_xf, &cell.value)?;
                }
            }
        }

        if let Some(Some(drawing_id)) = ctx.plan.drawing_ids.get(index) {
            SheetDrawing::build(sheet, *drawing_id, workbook.pictures().len())?.write(&mut out)?;
        }

        out.write_record(records::WINDOW2, &window2_body(sheet))?;
        if let Some(panes) = sheet.freeze_panes() {
            let active_pane: u8 = match (panes.row > 0, panes.col > 0) {
                (true, true) => 0,
                (false, true) => 1,
                _ => 2,
            };
            let mut pane = Vec::with_capacity(10);
            pane.put_u16(panes.col);
            pane.put_u16(panes.row as u16);
            pane.put_u16(panes.row as u16);
            pane.put_u16(panes.col);
            pane.put_u16(active_pane as u16);
            out.write_record(records::PANE, &pane)?;
            out.write_record(records::SELECTION, &selection_body(sheet, active_pane))?;
        } else {
            out.write_record(records::SELECTION, &selection_body(sheet, 3))?;
        }

        for chunk in sheet.merged_regions().chunks(MERGES_PER_RECORD) {
            let mut body = Vec::with_capacity(2 + chunk.len() * 8);
            body.put_u16(chunk.len() as u16);
            for range in chunk {
                body.put_u16(range.start.row as u16);
                body.put_u16(range.end.row as u16);
                body.put_u16(range.start.col);
                body.put_u16(range.end.col);
            }
            out.write_record(records::MERGECELLS, &body)?;
        }

        for link in sheet.hyperlinks() {
            out.write_record(records::HLINK, &write_hlink(link))?;
            if let Some(tooltip) = &link.tooltip {
                out.write_record(records::HLINKTOOLTIP, &write_tooltip(link, tooltip))?;
            }
        }

        out.write_record(records::EOF, &[])?;
        Ok(out.into_inner())
    }

    fn write_cell(
        out: &mut RecordWriter<Vec<u8>>,
        ctx: &mut WriteContext<'_>,
        sheet_index: usize,
        row: u32,
        col: u16,
        xf: u16,
        value: &CellValue,
    ) -> XlsResult<()> {
        let mut body = Vec::with_capacity(16);
        body.put_u16(row as u16);
        body.put_u16(col);
        body.put_u16(xf);

        match value {
            CellValue::Empty => out.write_record(records::BLANK, &body),
            CellValue::Number(n) => match encode_rk(*n).filter(|_| ctx.options.use_rk) {
                Some(rk) => {
                    body.put_u32(rk);
                    out.write_record(records::RK, &body)
                }
                None => {
                    body.put_f64(*n);
                    out.write_record(records::NUMBER, &body)
                }
            },
            CellValue::String(s) => {
                body.put_u32(ctx.sst.add(s.as_str()));
                out.write_record(records::LABELSST, &body)
            }
            CellValue::Boolean(b) => {
                body.put_u8(u8::from(*b));
                body.put_u8(0);
                out.write_record(records::BOOLERR, &body)
            }
            CellValue::Error(e) => {
                body.put_u8(e.code());
                body.put_u8(1);
                out.write_record(records::BOOLERR, &body)
            }
            CellValue::Formula { text, cached_value } => {
                let encoded = ctx.links.compile(text, sheet_index).map_err(|e| {
                    XlsError::RecordFormat(format!(
                        "formula '{}' in {} cannot be written: {}",
                        text,
                        binsheets_core::CellAddress::new(row, col),
                        e
                    ))
                })?;
                let mut flags = FORMULA_CALC_ON_LOAD;
                let mut string_result = None;
                match cached_value.as_deref() {
                    Some(CellValue::Number(n)) => body.put_f64(*n),
                    Some(CellValue::String(s)) if s.is_empty() => {
                        body.extend_from_slice(&[3, 0, 0, 0, 0, 0, 0xFF, 0xFF])
                    }
                    Some(CellValue::String(s)) => {
                        body.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
                        string_result = Some(s.as_str());
                    }
                    Some(CellValue::Boolean(b)) => {
                        body.extend_from_slice(&[1, 0, u8::from(*b), 0, 0, 0, 0xFF, 0xFF])
                    }
                    Some(CellValue::Error(e)) => {
                        body.extend_from_slice(&[2, 0, e.code(), 0, 0, 0, 0xFF, 0xFF])
                    }
                    _ => {
                        flags |= FORMULA_ALWAYS_CALC;
                        body.put_f64(0.0);
                    }
                }
                body.put_u16(flags);
                body.put_u32(0);
                body.put_u16(encoded.tokens.len() as u16);
                body.extend_from_slice(&encoded.tokens);
                body.extend_from_slice(&encoded.extra);
                out.write_record(records::FORMULA, &body)?;
                if let Some(s) = string_result {
                    let mut string = Vec::new();
                    write_unicode_string(&mut string, s)?;
                    out.write_record(records::STRING, &string)?;
                }
                Ok(())
            }
        }
    }
}

fn bof_body(substream: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(16);
    body.put_u16(records::BIFF8_VERSION);
    body.put_u16(substream);
    body.put_u16(0x0DBB);
    body.put_u16(0x07CC);
    body.put_u32(0x0000_80C9);
    body.put_u32(0x0000_0206);
    body
}

fn write_access_body() -> XlsResult<Vec<u8>> {
    let mut body = Vec::with_capacity(WRITE_ACCESS_LEN);
    write_unicode_string(&mut body, "binsheets")?;
    body.resize(WRITE_ACCESS_LEN, b' ');
    Ok(body)
}

fn window1_body(active_sheet: usize) -> Vec<u8> {
    let mut body = Vec::with_capacity(18);
    body.put_u16(0x0168);
    body.put_u16(0x010E);
    body.put_u16(0x3A5C);
    body.put_u16(0x23BE);
    body.put_u16(0x0038);
    body.put_u16(active_sheet as u16);
    body.put_u16(0);
    body.put_u16(1);
    body.put_u16(0x0258);
    body
}

fn setup_body() -> Vec<u8> {
    let mut body = Vec::with_capacity(34);
    body.put_u16(1); // paper size
    body.put_u16(100); // scale
    body.put_u16(1); // first page number
    body.put_u16(1); // fit width
    body.put_u16(1); // fit height
    body.put_u16(0x0004); // no printer settings
    body.put_u16(0x0258);
    body.put_u16(0x0258);
    body.put_f64(0.5);
    body.put_f64(0.5);
    body.put_u16(1);
    body
}

fn window2_body(sheet: &Worksheet) -> Vec<u8> {
    let mut options = WINDOW2_DEFAULT;
    if sheet.freeze_panes().is_some() {
        options |= WINDOW2_FROZEN;
    }
    if sheet.is_selected() {
        options |= WINDOW2_SELECTED;
    }
    let mut body = Vec::with_capacity(18);
    body.put_u16(options);
    body.put_u16(0);
    body.put_u16(0);
    body.put_u32(0x40);
    body.put_u16(0);
    body.put_u16(0);
    body.put_u32(0);
    body
}

fn selection_body(sheet: &Worksheet, pane: u8) -> Vec<u8> {
    let active = sheet.active_cell();
    let range = CellRange::from_indices(active.row, active.col, active.row, active.col);
    let mut body = Vec::with_capacity(15);
    body.put_u8(pane);
    body.put_u16(active.row as u16);
    body.put_u16(active.col);
    body.put_u16(0);
    body.put_u16(1);
    body.put_u16(range.start.row as u16);
    body.put_u16(range.end.row as u16);
    body.put_u8(range.start.col as u8);
    body.put_u8(range.end.col as u8);
    body
}

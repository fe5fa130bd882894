//! BIFF8 style records.
//!
//! Reading collects FONT, FORMAT, XF and PALETTE records from the workbook
//! globals stream and resolves every XF into a core [`Style`]. Writing goes
//! the other way: [`StyleTable`] merges the styles of all sheets into one
//! XF table with its FONT and FORMAT records, claiming palette slots for
//! RGB colors.

use ahash::AHashMap;

use binsheets_core::palette::{AUTOMATIC_FONT, SYSTEM_BACKGROUND, SYSTEM_FOREGROUND};
use binsheets_core::style::{
    DiagonalDirection, FontVerticalAlign, PatternType, Protection, ReadingOrder, Underline,
};
use binsheets_core::{
    Alignment, BorderEdge, BorderLineStyle, BorderStyle, BuiltinFormats, Color, FillStyle,
    FontStyle, HorizontalAlignment, NumberFormat, Palette, Style, VerticalAlignment,
};

use crate::biff::parser::{read_u16, read_u32, read_u8, require_len, WriteLe};
use crate::biff::records;
use crate::biff::strings::{read_short_string, read_unicode_string, write_short_string, write_unicode_string};
use crate::biff::RecordWriter;
use crate::error::{XlsError, XlsResult};

/// Number of style XFs ahead of the first cell XF
pub const STYLE_XF_COUNT: u16 = 15;

/// XF of a cell with the default style
pub const DEFAULT_CELL_XF: u16 = STYLE_XF_COUNT;

/// First id available to custom number formats
pub const FIRST_CUSTOM_FORMAT: u16 = 164;

/// Most XF records a BIFF8 workbook may hold
pub const MAX_XF_COUNT: usize = 4050;

const DEFAULT_FONT_COUNT: u16 = 4;

// ============================================================================
// Intermediate BIFF types
// ============================================================================

/// Parsed FONT record data.
#[derive(Debug, Clone)]
pub(crate) struct BiffFont {
    /// Font height in twips (1/20 of a point).
    pub height_twips: u16,
    pub bold: bool,
    pub italic: bool,
    pub underline: u8,
    pub strikethrough: bool,
    /// Palette color index for the font.
    pub color_index: u16,
    /// 0 = baseline, 1 = superscript, 2 = subscript.
    pub escapement: u16,
    pub name: String,
}

/// Parsed XF record data (20 bytes in BIFF8).
#[derive(Debug, Clone, Default)]
pub(crate) struct BiffXf {
    pub font_index: u16,
    pub format_index: u16,
    pub locked: bool,
    pub hidden: bool,
    pub is_style_xf: bool,
    // Alignment
    pub hor_align: u8,
    pub vert_align: u8,
    pub wrap_text: bool,
    pub shrink_to_fit: bool,
    pub indent: u8,
    pub rotation: u8,
    pub reading_order: u8,
    // Borders — line style codes (0–13)
    pub border_left: u8,
    pub border_right: u8,
    pub border_top: u8,
    pub border_bottom: u8,
    pub border_diag: u8,
    // Border color indices
    pub icv_left: u16,
    pub icv_right: u16,
    pub icv_top: u16,
    pub icv_bottom: u16,
    pub icv_diag: u16,
    pub diagonal_dir: u8,
    // Fill
    pub fill_pattern: u8,
    pub icv_fore: u16,
    pub icv_back: u16,
}

/// All style data collected from the workbook globals stream.
pub(crate) struct StyleContext {
    pub fonts: Vec<BiffFont>,
    pub formats: AHashMap<u16, String>,
    pub xfs: Vec<BiffXf>,
    pub palette: Palette,
    pub codepage: u16,
}

impl StyleContext {
    pub fn new(codepage: u16) -> Self {
        Self {
            fonts: Vec::new(),
            formats: AHashMap::new(),
            xfs: Vec::new(),
            palette: Palette::new(),
            codepage,
        }
    }

    /// Build the resolved style table, one entry per XF record; style XFs
    /// cannot be applied to cells and resolve to `None`
    pub fn build_style_table(&self) -> Vec<Option<Style>> {
        self.xfs
            .iter()
            .map(|xf| (!xf.is_style_xf).then(|| self.resolve_xf(xf)))
            .collect()
    }

    /// Resolve a single XF record into a core `Style`.
    fn resolve_xf(&self, xf: &BiffXf) -> Style {
        Style {
            font: self.resolve_font(xf.font_index),
            fill: self.resolve_fill(xf),
            border: self.resolve_border(xf),
            alignment: self.resolve_alignment(xf),
            number_format: self.resolve_number_format(xf.format_index),
            protection: Protection {
                locked: xf.locked,
                hidden: xf.hidden,
            },
        }
    }

    // ── Font resolution ─────────────────────────────────────────────────

    fn resolve_font(&self, font_index: u16) -> FontStyle {
        // BIFF8 quirk: font index 4 is skipped in the file.
        // Indices 0–3 map directly; index 5 → fonts[4], index 6 → fonts[5], etc.
        let actual = if font_index >= 5 {
            (font_index - 1) as usize
        } else {
            font_index as usize
        };

        let bf = match self.fonts.get(actual) {
            Some(f) => f,
            None => return FontStyle::default(),
        };

        FontStyle {
            name: bf.name.clone(),
            size: bf.height_twips as f64 / 20.0,
            bold: bf.bold,
            italic: bf.italic,
            underline: underline_from_biff(bf.underline),
            strikethrough: bf.strikethrough,
            color: self.resolve_color(bf.color_index),
            vertical_align: match bf.escapement {
                1 => FontVerticalAlign::Superscript,
                2 => FontVerticalAlign::Subscript,
                _ => FontVerticalAlign::Baseline,
            },
        }
    }

    // ── Fill resolution ─────────────────────────────────────────────────

    fn resolve_fill(&self, xf: &BiffXf) -> FillStyle {
        match PatternType::from_biff_code(xf.fill_pattern) {
            PatternType::None => FillStyle::None,
            PatternType::Solid => {
                // Solid fill: foreground color is the fill color.
                let color = self.resolve_color(xf.icv_fore);
                if color.is_auto() {
                    FillStyle::None
                } else {
                    FillStyle::Solid { color }
                }
            }
            pattern => FillStyle::Pattern {
                pattern,
                foreground: self.resolve_color(xf.icv_fore),
                background: self.resolve_color(xf.icv_back),
            },
        }
    }

    // ── Border resolution ───────────────────────────────────────────────

    fn resolve_border(&self, xf: &BiffXf) -> BorderStyle {
        let make_edge = |line_code: u8, icv: u16| -> Option<BorderEdge> {
            match BorderLineStyle::from_biff_code(line_code) {
                BorderLineStyle::None => None,
                ls => Some(BorderEdge::new(ls, self.resolve_color(icv))),
            }
        };

        let diag_dir = match xf.diagonal_dir {
            1 => DiagonalDirection::Down,
            2 => DiagonalDirection::Up,
            3 => DiagonalDirection::Both,
            _ => DiagonalDirection::None,
        };

        BorderStyle {
            left: make_edge(xf.border_left, xf.icv_left),
            right: make_edge(xf.border_right, xf.icv_right),
            top: make_edge(xf.border_top, xf.icv_top),
            bottom: make_edge(xf.border_bottom, xf.icv_bottom),
            diagonal: make_edge(xf.border_diag, xf.icv_diag),
            diagonal_direction: diag_dir,
        }
    }

    // ── Alignment resolution ────────────────────────────────────────────

    fn resolve_alignment(&self, xf: &BiffXf) -> Alignment {
        Alignment {
            horizontal: HorizontalAlignment::from_biff_code(xf.hor_align),
            vertical: VerticalAlignment::from_biff_code(xf.vert_align),
            wrap_text: xf.wrap_text,
            shrink_to_fit: xf.shrink_to_fit,
            indent: xf.indent,
            rotation: Alignment::rotation_from_biff(xf.rotation),
            reading_order: ReadingOrder::from_biff_code(xf.reading_order),
        }
    }

    // ── Number format resolution ────────────────────────────────────────

    fn resolve_number_format(&self, fmt_id: u16) -> NumberFormat {
        if fmt_id == 0 {
            return NumberFormat::General;
        }
        // Files often restate built-in formats in FORMAT records; the id wins.
        if fmt_id < FIRST_CUSTOM_FORMAT && BuiltinFormats::code(fmt_id as u32).is_some() {
            return NumberFormat::BuiltIn(fmt_id as u32);
        }
        match self.formats.get(&fmt_id) {
            Some(code) => NumberFormat::Custom(code.clone()),
            None => NumberFormat::BuiltIn(fmt_id as u32),
        }
    }

    // ── Color resolution ────────────────────────────────────────────────

    /// Palette indices resolve to RGB through the workbook palette; the
    /// system and automatic indices stay automatic.
    pub(crate) fn resolve_color(&self, icv: u16) -> Color {
        if icv == AUTOMATIC_FONT
            || icv == SYSTEM_FOREGROUND as u16
            || icv == SYSTEM_BACKGROUND as u16
        {
            return Color::Auto;
        }
        match u8::try_from(icv).ok().and_then(|i| self.palette.color(i)) {
            Some((r, g, b)) => Color::Rgb { r, g, b },
            None => Color::Auto,
        }
    }
}

// ============================================================================
// Record parsers
// ============================================================================

/// Parse a FONT record (0x0031).
///
/// Layout:
///   0  u16  dyHeight   — font height in twips (1/20 pt)
///   2  u16  grbit      — flags (bit 1 = italic, bit 3 = strikethrough)
///   4  u16  icv        — color index
///   6  u16  bls        — bold weight (400 = normal, 700 = bold)
///   8  u16  sss        — super/subscript (0/1/2)
///  10  u8   uls        — underline type
///  11  u8   bFamily    — font family (ignored)
///  12  u8   bCharSet   — character set (ignored)
///  13  u8   reserved
///  14  ...  font name  — short string (1-byte length prefix)
pub(crate) fn parse_font(data: &[u8], codepage: u16) -> XlsResult<BiffFont> {
    require_len(data, 14, "FONT")?;

    let mut off = 0;
    let height = read_u16(data, &mut off)?;
    let grbit = read_u16(data, &mut off)?;
    let icv = read_u16(data, &mut off)?;
    let bls = read_u16(data, &mut off)?;
    let sss = read_u16(data, &mut off)?;
    let uls = read_u8(data, &mut off)?;
    off += 3;

    let name = if off < data.len() {
        read_short_string(data, &mut off, codepage)?
    } else {
        String::new()
    };

    Ok(BiffFont {
        height_twips: height,
        italic: (grbit & 0x0002) != 0,
        strikethrough: (grbit & 0x0008) != 0,
        bold: bls >= 700,
        underline: uls,
        color_index: icv,
        escapement: sss,
        name,
    })
}

/// Parse a FORMAT record (0x041E).
///
/// Layout:
///   0  u16  ifmt   — format index
///   2  ...  format string (unicode string, 2-byte length prefix)
pub(crate) fn parse_format(data: &[u8], codepage: u16) -> XlsResult<(u16, String)> {
    let mut off = 0;
    let ifmt = read_u16(data, &mut off)?;
    let s = read_unicode_string(data, &mut off, codepage)?;
    Ok((ifmt, s))
}

/// Parse an XF record (0x00E0, always 20 bytes in BIFF8).
///
/// Layout (see [MS-XLS] §2.4.353):
///   0   u16  ifnt          — font index
///   2   u16  ifmt          — format index
///   4   u16  type/protect  — bits 0-1 lock/hidden, bit 2 style-xf
///   6   u8   alignment1    — bits 0-2 halign, bit 3 wrap, bits 4-6 valign
///   7   u8   trot          — text rotation
///   8   u8   alignment2    — bits 0-3 indent, bit 4 shrink, bits 6-7 reading order
///   9   u8   used_attribs  — (ignored)
///  10   u32  border lines/colors 1
///  14   u32  border lines/colors 2 + fill pattern
///  18   u16  fill colors
pub(crate) fn parse_xf(data: &[u8]) -> XlsResult<BiffXf> {
    require_len(data, 20, "XF")?;

    let mut off = 0;
    let ifnt = read_u16(data, &mut off)?;
    let ifmt = read_u16(data, &mut off)?;
    let type_prot = read_u16(data, &mut off)?;

    let align1 = read_u8(data, &mut off)?;
    let rotation = read_u8(data, &mut off)?;
    let align2 = read_u8(data, &mut off)?;
    let _used = read_u8(data, &mut off)?;

    let border1 = read_u32(data, &mut off)?;
    let border2 = read_u32(data, &mut off)?;
    let fill_colors = read_u16(data, &mut off)?;

    Ok(BiffXf {
        font_index: ifnt,
        format_index: ifmt,
        locked: (type_prot & 0x0001) != 0,
        hidden: (type_prot & 0x0002) != 0,
        is_style_xf: (type_prot & 0x0004) != 0,
        hor_align: align1 & 0x07,
        wrap_text: (align1 & 0x08) != 0,
        vert_align: (align1 >> 4) & 0x07,
        rotation,
        indent: align2 & 0x0F,
        shrink_to_fit: (align2 & 0x10) != 0,
        reading_order: (align2 >> 6) & 0x03,
        border_left: (border1 & 0x0F) as u8,
        border_right: ((border1 >> 4) & 0x0F) as u8,
        border_top: ((border1 >> 8) & 0x0F) as u8,
        border_bottom: ((border1 >> 12) & 0x0F) as u8,
        icv_left: ((border1 >> 16) & 0x7F) as u16,
        icv_right: ((border1 >> 23) & 0x7F) as u16,
        diagonal_dir: ((border1 >> 30) & 0x03) as u8,
        icv_top: (border2 & 0x7F) as u16,
        icv_bottom: ((border2 >> 7) & 0x7F) as u16,
        icv_diag: ((border2 >> 14) & 0x7F) as u16,
        border_diag: ((border2 >> 21) & 0x0F) as u8,
        fill_pattern: ((border2 >> 26) & 0x3F) as u8,
        icv_fore: fill_colors & 0x7F,
        icv_back: (fill_colors >> 7) & 0x7F,
    })
}

/// Parse a PALETTE record into the colors of indices 8 onwards.
///
/// Layout:
///   0  u16  ccv    — number of colors (typically 56)
///   2  ...  colors — array of ccv × 4-byte entries (R, G, B, 0x00)
pub(crate) fn parse_palette(data: &[u8]) -> XlsResult<Vec<(u8, u8, u8)>> {
    let mut off = 0;
    let count = read_u16(data, &mut off)? as usize;
    let mut colors = Vec::with_capacity(count.min(56));
    for _ in 0..count.min(56) {
        let r = read_u8(data, &mut off)?;
        let g = read_u8(data, &mut off)?;
        let b = read_u8(data, &mut off)?;
        off += 1;
        colors.push((r, g, b));
    }
    Ok(colors)
}

// ============================================================================
// Mapping helpers
// ============================================================================

fn underline_from_biff(code: u8) -> Underline {
    match code {
        0x01 => Underline::Single,
        0x02 => Underline::Double,
        0x21 => Underline::SingleAccounting,
        0x22 => Underline::DoubleAccounting,
        _ => Underline::None,
    }
}

fn underline_to_biff(underline: Underline) -> u8 {
    match underline {
        Underline::None => 0x00,
        Underline::Single => 0x01,
        Underline::Double => 0x02,
        Underline::SingleAccounting => 0x21,
        Underline::DoubleAccounting => 0x22,
    }
}

fn diagonal_code(d: DiagonalDirection) -> u32 {
    match d {
        DiagonalDirection::None => 0,
        DiagonalDirection::Down => 1,
        DiagonalDirection::Up => 2,
        DiagonalDirection::Both => 3,
    }
}

// ============================================================================
// Writing
// ============================================================================

/// Font, format and XF tables of a workbook being written
///
/// Cell styles are added in first-use order and deduplicated; each gets an
/// XF index from [`DEFAULT_CELL_XF`] on. RGB colors are mapped onto a copy
/// of the workbook palette: an exact match is reused, otherwise a free slot
/// is claimed, and once the palette is full the nearest color is used.
pub struct StyleTable {
    palette: Palette,
    fonts: Vec<FontStyle>,
    font_index: AHashMap<FontStyle, u16>,
    formats: Vec<(u16, String)>,
    format_index: AHashMap<String, u16>,
    cell_xfs: Vec<Vec<u8>>,
    xf_index: AHashMap<Style, u16>,
}

impl StyleTable {
    pub fn new(palette: &Palette) -> Self {
        let mut table = Self {
            palette: palette.clone(),
            fonts: Vec::new(),
            font_index: AHashMap::new(),
            formats: Vec::new(),
            format_index: AHashMap::new(),
            cell_xfs: Vec::new(),
            xf_index: AHashMap::new(),
        };
        let default = FontStyle::default();
        table.fonts = vec![default.clone(); DEFAULT_FONT_COUNT as usize];
        table.font_index.insert(default, 0);
        table
    }

    /// XF index of a cell style, adding it on first use
    pub fn add_style(&mut self, style: &Style) -> XlsResult<u16> {
        if let Some(&idx) = self.xf_index.get(style) {
            return Ok(idx);
        }
        if STYLE_XF_COUNT as usize + self.cell_xfs.len() >= MAX_XF_COUNT {
            return Err(XlsError::Core(binsheets_core::Error::InvalidArgument(format!(
                "more than {} distinct cell styles",
                MAX_XF_COUNT - STYLE_XF_COUNT as usize
            ))));
        }
        let font = self.font(&style.font);
        let format = self.format(&style.number_format);
        let body = self.xf_body(style, font, format);
        let idx = STYLE_XF_COUNT + self.cell_xfs.len() as u16;
        self.cell_xfs.push(body);
        self.xf_index.insert(style.clone(), idx);
        Ok(idx)
    }

    /// Number of XF records, style XFs included
    pub fn xf_count(&self) -> usize {
        STYLE_XF_COUNT as usize + self.cell_xfs.len()
    }

    fn font(&mut self, font: &FontStyle) -> u16 {
        if let Some(&idx) = self.font_index.get(font) {
            return idx;
        }
        self.color_index(font.color, AUTOMATIC_FONT);
        // index 4 does not exist
        let idx = self.fonts.len() as u16 + 1;
        self.fonts.push(font.clone());
        self.font_index.insert(font.clone(), idx);
        idx
    }

    fn format(&mut self, format: &NumberFormat) -> u16 {
        if let Some(id) = format.builtin_id() {
            return id;
        }
        let code = format.code();
        if let Some(&id) = self.format_index.get(code) {
            return id;
        }
        let id = FIRST_CUSTOM_FORMAT + self.formats.len() as u16;
        self.formats.push((id, code.to_string()));
        self.format_index.insert(code.to_string(), id);
        id
    }

    /// Palette index for a color; `auto` is the index used for `Color::Auto`
    pub fn color_index(&mut self, color: Color, auto: u16) -> u16 {
        match color {
            Color::Auto => auto,
            Color::Indexed(i) => i as u16,
            Color::Rgb { r, g, b } => match self.palette.add_color(r, g, b) {
                Ok(idx) => idx as u16,
                Err(_) => {
                    let idx = self.palette.find_similar_color(r, g, b);
                    log::debug!(
                        "palette full, #{:02X}{:02X}{:02X} mapped to index {}",
                        r,
                        g,
                        b,
                        idx
                    );
                    idx as u16
                }
            },
        }
    }

    fn xf_body(&mut self, style: &Style, font: u16, format: u16) -> Vec<u8> {
        let fg = SYSTEM_FOREGROUND as u16;
        let bg = SYSTEM_BACKGROUND as u16;

        let mut edge = |edge: &Option<BorderEdge>| -> (u32, u32) {
            match edge {
                Some(e) if e.style != BorderLineStyle::None => (
                    e.style.biff_code() as u32,
                    self.color_index(e.color, fg) as u32 & 0x7F,
                ),
                _ => (0, 0),
            }
        };
        let (left, icv_left) = edge(&style.border.left);
        let (right, icv_right) = edge(&style.border.right);
        let (top, icv_top) = edge(&style.border.top);
        let (bottom, icv_bottom) = edge(&style.border.bottom);
        let (diag, icv_diag) = edge(&style.border.diagonal);
        let diag_dir = if diag == 0 {
            0
        } else {
            diagonal_code(style.border.diagonal_direction)
        };

        let (pattern, fore, back) = match &style.fill {
            FillStyle::None => (0u32, fg, bg),
            FillStyle::Solid { color } => (1, self.color_index(*color, fg), bg),
            FillStyle::Pattern {
                pattern,
                foreground,
                background,
            } => (
                pattern.biff_code() as u32,
                self.color_index(*foreground, fg),
                self.color_index(*background, bg),
            ),
        };

        let a = &style.alignment;
        let mut type_prot = 0u16;
        if style.protection.locked {
            type_prot |= 0x0001;
        }
        if style.protection.hidden {
            type_prot |= 0x0002;
        }

        let mut data = Vec::with_capacity(20);
        data.put_u16(font);
        data.put_u16(format);
        data.put_u16(type_prot);
        data.put_u8(a.horizontal.biff_code() | (u8::from(a.wrap_text) << 3) | (a.vertical.biff_code() << 4));
        data.put_u8(a.biff_rotation());
        data.put_u8((a.indent & 0x0F) | (u8::from(a.shrink_to_fit) << 4) | (a.reading_order.biff_code() << 6));
        data.put_u8(0xFC);
        data.put_u32(
            left | (right << 4) | (top << 8) | (bottom << 12) | (icv_left << 16) | (icv_right << 23) | (diag_dir << 30),
        );
        data.put_u32(icv_top | (icv_bottom << 7) | (icv_diag << 14) | (diag << 21) | (pattern << 26));
        data.put_u16((fore & 0x7F) | ((back & 0x7F) << 7));
        data
    }

    /// Write FONT, FORMAT, XF and STYLE records, then PALETTE when any
    /// color differs from the defaults
    pub fn write<W: std::io::Write>(&self, out: &mut RecordWriter<W>) -> XlsResult<()> {
        for font in &self.fonts {
            out.write_record(records::FONT, &font_body(font, &self.palette)?)?;
        }
        for (id, code) in &self.formats {
            let mut data = Vec::new();
            data.put_u16(*id);
            write_unicode_string(&mut data, code)?;
            out.write_record(records::FORMAT, &data)?;
        }
        for i in 0..STYLE_XF_COUNT {
            out.write_record(records::XF, &style_xf_body(i))?;
        }
        for body in &self.cell_xfs {
            out.write_record(records::XF, body)?;
        }
        // built-in "Normal" style on XF 0
        out.write_record(records::STYLE, &[0x00, 0x80, 0x00, 0xFF])?;
        if self.palette.is_modified() {
            out.write_record(records::PALETTE, &palette_body(&self.palette))?;
        }
        log::debug!(
            "wrote {} fonts, {} formats, {} XFs",
            self.fonts.len(),
            self.formats.len(),
            self.xf_count()
        );
        Ok(())
    }
}

fn font_body(font: &FontStyle, palette: &Palette) -> XlsResult<Vec<u8>> {
    let color = match font.color {
        Color::Auto => AUTOMATIC_FONT,
        Color::Indexed(i) => i as u16,
        Color::Rgb { r, g, b } => palette
            .find_color(r, g, b)
            .unwrap_or_else(|| palette.find_similar_color(r, g, b)) as u16,
    };
    let mut grbit = 0u16;
    if font.italic {
        grbit |= 0x0002;
    }
    if font.strikethrough {
        grbit |= 0x0008;
    }
    let escapement = match font.vertical_align {
        FontVerticalAlign::Baseline => 0,
        FontVerticalAlign::Superscript => 1,
        FontVerticalAlign::Subscript => 2,
    };

    let mut data = Vec::with_capacity(16 + font.name.len() * 2);
    data.put_u16(font.height_twips());
    data.put_u16(grbit);
    data.put_u16(color);
    data.put_u16(font.weight());
    data.put_u16(escapement);
    data.put_u8(underline_to_biff(font.underline));
    data.put_u8(0); // family
    data.put_u8(0); // charset
    data.put_u8(0);
    write_short_string(&mut data, &font.name)?;
    Ok(data)
}

/// The 15 style XFs every workbook starts with: Normal, then the outline
/// level styles
fn style_xf_body(index: u16) -> Vec<u8> {
    let font = match index {
        1 | 2 => 1,
        3 | 4 => 2,
        _ => 0,
    };
    let mut data = Vec::with_capacity(20);
    data.put_u16(font);
    data.put_u16(0);
    data.put_u16(0xFFF5);
    data.put_u8(0x20);
    data.put_u8(0);
    data.put_u8(0);
    data.put_u8(if index == 0 { 0x00 } else { 0xF4 });
    data.put_u32(0);
    data.put_u32(0);
    data.put_u16(0x20C0);
    data
}

fn palette_body(palette: &Palette) -> Vec<u8> {
    let colors = palette.colors();
    let mut data = Vec::with_capacity(2 + colors.len() * 4);
    data.put_u16(colors.len() as u16);
    for &(r, g, b) in colors.iter() {
        data.extend_from_slice(&[r, g, b, 0]);
    }
    data
}

// ============================================================================
// Unit tests
// ============================================================================

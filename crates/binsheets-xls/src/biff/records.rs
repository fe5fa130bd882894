//! BIFF8 record type constants.
//!
//! Reference: [MS-XLS] §2.3 — Record Enumeration

// ── Stream structure ────────────────────────────────────────────────────
pub const BOF: u16 = 0x0809;
pub const EOF: u16 = 0x000A;
pub const CONTINUE: u16 = 0x003C;

/// BOF record types of BIFF2, BIFF3 and BIFF4 streams
pub const BOF_BIFF2: u16 = 0x0009;
pub const BOF_BIFF3: u16 = 0x0209;
pub const BOF_BIFF4: u16 = 0x0409;

// ── Workbook globals ────────────────────────────────────────────────────
pub const FILEPASS: u16 = 0x002F; // Encryption header
pub const INTERFACEHDR: u16 = 0x00E1;
pub const MMS: u16 = 0x00C1;
pub const INTERFACEEND: u16 = 0x00E2;
pub const WRITEACCESS: u16 = 0x005C;
pub const CODEPAGE: u16 = 0x0042; // Code page of 8-bit strings (1200 = UTF-16)
pub const DSF: u16 = 0x0161;
pub const TABID: u16 = 0x013D;
pub const FNGROUPCOUNT: u16 = 0x009C;
pub const WINDOWPROTECT: u16 = 0x0019;
pub const PROTECT: u16 = 0x0012;
pub const PASSWORD: u16 = 0x0013;
pub const PROT4REV: u16 = 0x01AF;
pub const PROT4REVPASS: u16 = 0x01BC;
pub const BACKUP: u16 = 0x0040;
pub const HIDEOBJ: u16 = 0x008D;
pub const WINDOW1: u16 = 0x003D; // Workbook window, active sheet
pub const DATEMODE: u16 = 0x0022; // 1900 vs 1904 date system (a.k.a. DATE1904)
pub const PRECISION: u16 = 0x000E;
pub const REFRESHALL: u16 = 0x01B7;
pub const BOOKBOOL: u16 = 0x00DA;
pub const FONT: u16 = 0x0031; // Font definition
pub const FORMAT: u16 = 0x041E; // Number format string
pub const XF: u16 = 0x00E0; // Extended Format (cell format record)
pub const STYLE: u16 = 0x0293; // Named cell style
pub const PALETTE: u16 = 0x0092; // Custom color palette (overrides default 56)
pub const USESELFS: u16 = 0x0160;
pub const BOUNDSHEET: u16 = 0x0085; // Sheet name, type, visibility, stream offset
pub const COUNTRY: u16 = 0x008C;
pub const SUPBOOK: u16 = 0x01AE; // Supporting workbook (internal, add-in, external)
pub const EXTERNNAME: u16 = 0x0023; // Name in a supporting workbook
pub const EXTERNSHEET: u16 = 0x0017; // REF structures used by 3-D references
pub const NAME: u16 = 0x0018; // Defined name
pub const MSODRAWINGGROUP: u16 = 0x00EB; // Escher drawing group (blip store)
pub const SST: u16 = 0x00FC; // Shared String Table
pub const EXTSST: u16 = 0x00FF; // Extended SST (hash buckets into the SST)

// ── Sheet structure ─────────────────────────────────────────────────────
pub const INDEX: u16 = 0x020B;
pub const CALCMODE: u16 = 0x000D;
pub const CALCCOUNT: u16 = 0x000C;
pub const REFMODE: u16 = 0x000F;
pub const ITERATION: u16 = 0x0011;
pub const DELTA: u16 = 0x0010;
pub const SAVERECALC: u16 = 0x005F;
pub const PRINTHEADERS: u16 = 0x002A;
pub const PRINTGRIDLINES: u16 = 0x002B;
pub const GRIDSET: u16 = 0x0082;
pub const GUTS: u16 = 0x0080; // Outline gutter sizes
pub const DEFAULTROWHEIGHT: u16 = 0x0225; // Default row height
pub const WSBOOL: u16 = 0x0081;
pub const HEADER: u16 = 0x0014;
pub const FOOTER: u16 = 0x0015;
pub const HCENTER: u16 = 0x0083;
pub const VCENTER: u16 = 0x0084;
pub const SETUP: u16 = 0x00A1; // Page setup
pub const DEFCOLWIDTH: u16 = 0x0055; // Default column width
pub const COLINFO: u16 = 0x007D; // Column width, visibility, default format
pub const DIMENSIONS: u16 = 0x0200; // Used range (first/last row/col)
pub const ROW: u16 = 0x0208; // Row height, visibility, default format
pub const DBCELL: u16 = 0x00D7;
pub const WINDOW2: u16 = 0x023E; // Sheet view settings (freeze panes, etc.)
pub const PANE: u16 = 0x0041; // Pane split position
pub const SELECTION: u16 = 0x001D; // Selected cell range
pub const MERGECELLS: u16 = 0x00E5; // Merged cell ranges
pub const HLINK: u16 = 0x01B8; // Hyperlink
pub const HLINKTOOLTIP: u16 = 0x0800; // Hyperlink screen tip

// ── Cell records ────────────────────────────────────────────────────────
pub const LABELSST: u16 = 0x00FD; // Cell containing SST string index
pub const LABEL: u16 = 0x0204; // Cell with inline string (rare in BIFF8)
pub const NUMBER: u16 = 0x0203; // Cell with IEEE 754 double
pub const RK: u16 = 0x027E; // Cell with compressed number (RK encoding)
pub const MULRK: u16 = 0x00BD; // Multiple RK values in one row
pub const BLANK: u16 = 0x0201; // Empty cell with formatting
pub const MULBLANK: u16 = 0x00BE; // Multiple blanks with formatting
pub const BOOLERR: u16 = 0x0205; // Boolean or error cell
pub const FORMULA: u16 = 0x0006; // Formula cell with cached result
pub const STRING: u16 = 0x0207; // Cached string result for preceding FORMULA
pub const RSTRING: u16 = 0x00D6; // Rich-text inline string (rare)
pub const SHRFMLA: u16 = 0x04BC; // Shared formula
pub const ARRAY: u16 = 0x0221; // Array formula
pub const TABLE: u16 = 0x0236; // Data table

// ── Drawing ─────────────────────────────────────────────────────────────
pub const MSODRAWING: u16 = 0x00EC; // Escher records of a sheet
pub const OBJ: u16 = 0x005D; // Object attached to a shape
pub const TXO: u16 = 0x01B6; // Text of a text box or comment
pub const NOTE: u16 = 0x001C; // Cell comment

// ── BOF subtypes (the `dt` field) ───────────────────────────────────────
pub const BOF_WORKBOOK_GLOBALS: u16 = 0x0005;
pub const BOF_WORKSHEET: u16 = 0x0010;
pub const BOF_CHART: u16 = 0x0020;
pub const BOF_MACRO: u16 = 0x0040;

/// BIFF version we support.
pub const BIFF8_VERSION: u16 = 0x0600;

/// Display name of a record type
pub fn record_name(record_type: u16) -> Option<&'static str> {
    let name = match record_type {
        BOF => "BOF",
        EOF => "EOF",
        CONTINUE => "CONTINUE",
        BOF_BIFF2 | BOF_BIFF3 | BOF_BIFF4 => "BOF (old)",
        FILEPASS => "FILEPASS",
        INTERFACEHDR => "INTERFACEHDR",
        MMS => "MMS",
        INTERFACEEND => "INTERFACEEND",
        WRITEACCESS => "WRITEACCESS",
        CODEPAGE => "CODEPAGE",
        DSF => "DSF",
        TABID => "TABID",
        FNGROUPCOUNT => "FNGROUPCOUNT",
        WINDOWPROTECT => "WINDOWPROTECT",
        PROTECT => "PROTECT",
        PASSWORD => "PASSWORD",
        PROT4REV => "PROT4REV",
        PROT4REVPASS => "PROT4REVPASS",
        BACKUP => "BACKUP",
        HIDEOBJ => "HIDEOBJ",
        WINDOW1 => "WINDOW1",
        DATEMODE => "DATEMODE",
        PRECISION => "PRECISION",
        REFRESHALL => "REFRESHALL",
        BOOKBOOL => "BOOKBOOL",
        FONT => "FONT",
        FORMAT => "FORMAT",
        XF => "XF",
        STYLE => "STYLE",
        PALETTE => "PALETTE",
        USESELFS => "USESELFS",
        BOUNDSHEET => "BOUNDSHEET",
        COUNTRY => "COUNTRY",
        SUPBOOK => "SUPBOOK",
        EXTERNNAME => "EXTERNNAME",
        EXTERNSHEET => "EXTERNSHEET",
        NAME => "NAME",
        MSODRAWINGGROUP => "MSODRAWINGGROUP",
        SST => "SST",
        EXTSST => "EXTSST",
        INDEX => "INDEX",
        CALCMODE => "CALCMODE",
        CALCCOUNT => "CALCCOUNT",
        REFMODE => "REFMODE",
        ITERATION => "ITERATION",
        DELTA => "DELTA",
        SAVERECALC => "SAVERECALC",
        PRINTHEADERS => "PRINTHEADERS",
        PRINTGRIDLINES => "PRINTGRIDLINES",
        GRIDSET => "GRIDSET",
        GUTS => "GUTS",
        DEFAULTROWHEIGHT => "DEFAULTROWHEIGHT",
        WSBOOL => "WSBOOL",
        HEADER => "HEADER",
        FOOTER => "FOOTER",
        HCENTER => "HCENTER",
        VCENTER => "VCENTER",
        SETUP => "SETUP",
        DEFCOLWIDTH => "DEFCOLWIDTH",
        COLINFO => "COLINFO",
        DIMENSIONS => "DIMENSIONS",
        ROW => "ROW",
        DBCELL => "DBCELL",
        WINDOW2 => "WINDOW2",
        PANE => "PANE",
        SELECTION => "SELECTION",
        MERGECELLS => "MERGECELLS",
        HLINK => "HLINK",
        HLINKTOOLTIP => "HLINKTOOLTIP",
        LABELSST => "LABELSST",
        LABEL => "LABEL",
        NUMBER => "NUMBER",
        RK => "RK",
        MULRK => "MULRK",
        BLANK => "BLANK",
        MULBLANK => "MULBLANK",
        BOOLERR => "BOOLERR",
        FORMULA => "FORMULA",
        STRING => "STRING",
        RSTRING => "RSTRING",
        SHRFMLA => "SHRFMLA",
        ARRAY => "ARRAY",
        TABLE => "TABLE",
        MSODRAWING => "MSODRAWING",
        OBJ => "OBJ",
        TXO => "TXO",
        NOTE => "NOTE",
        _ => return None,
    };
    Some(name)
}

//! Built-in BIFF8 number formats
//!
//! Ids 0-49 are implied by every BIFF8 workbook; FORMAT records only carry
//! custom codes (id 164 and up) plus the locale-dependent currency formats.

/// First id available for custom FORMAT records
pub const FIRST_USER_DEFINED_FORMAT_INDEX: u16 = 164;

const BUILTIN_FORMATS: [&str; 50] = [
    "General",
    "0",
    "0.00",
    "#,##0",
    "#,##0.00",
    "\"$\"#,##0_);(\"$\"#,##0)",
    "\"$\"#,##0_);[Red](\"$\"#,##0)",
    "\"$\"#,##0.00_);(\"$\"#,##0.00)",
    "\"$\"#,##0.00_);[Red](\"$\"#,##0.00)",
    "0%",
    "0.00%",
    "0.00E+00",
    "# ?/?",
    "# ??/??",
    "m/d/yy",
    "d-mmm-yy",
    "d-mmm",
    "mmm-yy",
    "h:mm AM/PM",
    "h:mm:ss AM/PM",
    "h:mm",
    "h:mm:ss",
    "m/d/yy h:mm",
    // 0x17-0x24 are reserved for international formats
    "reserved-0x17",
    "reserved-0x18",
    "reserved-0x19",
    "reserved-0x1A",
    "reserved-0x1B",
    "reserved-0x1C",
    "reserved-0x1D",
    "reserved-0x1E",
    "reserved-0x1F",
    "reserved-0x20",
    "reserved-0x21",
    "reserved-0x22",
    "reserved-0x23",
    "reserved-0x24",
    "#,##0_);(#,##0)",
    "#,##0_);[Red](#,##0)",
    "#,##0.00_);(#,##0.00)",
    "#,##0.00_);[Red](#,##0.00)",
    "_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)",
    "_(\"$\"* #,##0_);_(\"$\"* (#,##0);_(\"$\"* \"-\"_);_(@_)",
    "_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)",
    "_(\"$\"* #,##0.00_);_(\"$\"* (#,##0.00);_(\"$\"* \"-\"??_);_(@_)",
    "mm:ss",
    "[h]:mm:ss",
    "mm:ss.0",
    "##0.0E+0",
    "@",
];

/// Lookup between built-in format ids and their codes
pub struct BuiltinFormats;

impl BuiltinFormats {
    /// Number of built-in formats
    pub const COUNT: usize = BUILTIN_FORMATS.len();

    /// Format code for a built-in id. Reserved ids have no usable code.
    pub fn code(id: u32) -> Option<&'static str> {
        let code = *BUILTIN_FORMATS.get(id as usize)?;
        (!code.starts_with("reserved-")).then_some(code)
    }

    /// Built-in id for a format code
    ///
    /// `"TEXT"` is accepted as an alias of `@`, and `General` matches
    /// case-insensitively.
    pub fn id(code: &str) -> Option<u16> {
        if code.eq_ignore_ascii_case("general") {
            return Some(0);
        }
        let code = if code.eq_ignore_ascii_case("text") { "@" } else { code };
        BUILTIN_FORMATS
            .iter()
            .position(|&c| c == code && !c.starts_with("reserved-"))
            .map(|i| i as u16)
    }

    /// All usable built-in formats as `(id, code)` pairs
    pub fn all() -> impl Iterator<Item = (u16, &'static str)> {
        BUILTIN_FORMATS
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.starts_with("reserved-"))
            .map(|(i, c)| (i as u16, *c))
    }
}

//! SUPBOOK, EXTERNNAME, EXTERNSHEET and NAME records
//!
//! Formula tokens never spell out sheet or name text. A 3-D reference holds
//! an index into the EXTERNSHEET table, whose entries point at a supporting
//! workbook (SUPBOOK) and a sheet range inside it. The first SUPBOOK is the
//! workbook itself; an add-in SUPBOOK lists the functions Excel does not
//! know by number (IFERROR and friends) as EXTERNNAMEs. Defined names are
//! referenced by their 1-based NAME record position.

use ahash::AHashSet;

use binsheets_core::{BuiltinName, NameScope, NamedRange, Workbook};
use binsheets_formula::ast::NameReference;
use binsheets_formula::ptg::{function_by_name, EncodedFormula};
use binsheets_formula::{
    compile, decode_rgce, encode_rgce, parse_formula, render, FormulaExpr,
    FormulaParsingWorkbook, FormulaRenderingWorkbook,
};

use crate::biff::parser::{read_bytes, read_u16, read_u8, WriteLe};
use crate::biff::strings::{
    char_count, is_compressible, read_chars, read_unicode_string, write_chars,
};
use crate::error::{XlsError, XlsResult};

const SUPBOOK_INTERNAL: u16 = 0x0401;
const SUPBOOK_ADDIN: u16 = 0x3A01;
/// Sheet index of an EXTERNSHEET entry that refers to no sheet
const NO_SHEET: u16 = 0xFFFE;

// NAME option flags
const NAME_HIDDEN: u16 = 0x0001;
const NAME_FUNCTION: u16 = 0x0002;
const NAME_BUILTIN: u16 = 0x0020;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SupBookKind {
    Internal,
    AddIn,
    External { sheets: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SupBook {
    kind: SupBookKind,
    /// EXTERNNAMEs in record order
    names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExternSheet {
    supbook: u16,
    first: u16,
    last: u16,
}

/// A NAME record before its formula is rendered
#[derive(Debug, Clone)]
pub struct RawName {
    pub name: String,
    pub builtin: Option<BuiltinName>,
    pub scope: NameScope,
    pub hidden: bool,
    pub function: bool,
    pub comment: Option<String>,
    tokens: Vec<u8>,
    extra: Vec<u8>,
}

/// The reference tables of a workbook, as read or as about to be written
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    sheets: Vec<String>,
    supbooks: Vec<SupBook>,
    extern_sheets: Vec<ExternSheet>,
    names: Vec<NameReference>,
    /// Scope of each entry of `names`, for lookups by the writer
    name_scopes: Vec<NameScope>,
}

impl LinkTable {
    /// Empty table for a reader that knows the sheet names
    pub fn new(sheets: Vec<String>) -> Self {
        Self {
            sheets,
            ..Self::default()
        }
    }

    // ── reading ─────────────────────────────────────────────────────────

    pub fn parse_supbook(&mut self, data: &[u8], codepage: u16) -> XlsResult<()> {
        let mut off = 0;
        let count = read_u16(data, &mut off)?;
        let marker = read_u16(data, &mut off)?;
        let kind = match marker {
            SUPBOOK_INTERNAL => SupBookKind::Internal,
            SUPBOOK_ADDIN => SupBookKind::AddIn,
            cch => {
                // `cch` was the length of the document path
                let flags = read_u8(data, &mut off)?;
                read_chars(data, &mut off, cch as usize, flags & 1 != 0, codepage)?;
                let mut sheets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    sheets.push(read_unicode_string(data, &mut off, codepage)?);
                }
                SupBookKind::External { sheets }
            }
        };
        self.supbooks.push(SupBook {
            kind,
            names: Vec::new(),
        });
        Ok(())
    }

    /// EXTERNNAME belongs to the SUPBOOK before it
    pub fn parse_externname(&mut self, data: &[u8], codepage: u16) -> XlsResult<()> {
        let mut off = 6;
        let len = read_u8(data, &mut off)? as usize;
        let flags = read_u8(data, &mut off)?;
        let name = read_chars(data, &mut off, len, flags & 1 != 0, codepage)?;
        match self.supbooks.last_mut() {
            Some(book) => book.names.push(name),
            None => return Err(XlsError::record("EXTERNNAME before any SUPBOOK")),
        }
        Ok(())
    }

    pub fn parse_externsheet(&mut self, data: &[u8]) -> XlsResult<()> {
        let mut off = 0;
        let count = read_u16(data, &mut off)?;
        for _ in 0..count {
            self.extern_sheets.push(ExternSheet {
                supbook: read_u16(data, &mut off)?,
                first: read_u16(data, &mut off)?,
                last: read_u16(data, &mut off)?,
            });
        }
        Ok(())
    }

    /// Decode a NAME record; its formula is rendered once all names are known
    pub fn parse_name(&mut self, data: &[u8], codepage: u16) -> XlsResult<RawName> {
        let mut off = 0;
        let flags = read_u16(data, &mut off)?;
        let _key = read_u8(data, &mut off)?;
        let name_len = read_u8(data, &mut off)? as usize;
        let formula_len = read_u16(data, &mut off)? as usize;
        let _reserved = read_u16(data, &mut off)?;
        let sheet = read_u16(data, &mut off)?;
        let menu_len = read_u8(data, &mut off)? as usize;
        let description_len = read_u8(data, &mut off)? as usize;
        let help_len = read_u8(data, &mut off)? as usize;
        let status_len = read_u8(data, &mut off)? as usize;

        let name_flags = read_u8(data, &mut off)?;
        let text = read_chars(data, &mut off, name_len, name_flags & 1 != 0, codepage)?;
        let builtin = if flags & NAME_BUILTIN != 0 {
            text.chars()
                .next()
                .and_then(|c| BuiltinName::from_code(c as u32 as u8))
        } else {
            None
        };
        let name = builtin.map_or(text, |b| b.name().to_string());

        let tokens = read_bytes(data, &mut off, formula_len)?.to_vec();

        let read_optional = |len: usize, off: &mut usize| -> XlsResult<Option<String>> {
            if len == 0 {
                return Ok(None);
            }
            let flags = read_u8(data, off)?;
            read_chars(data, off, len, flags & 1 != 0, codepage).map(Some)
        };
        read_optional(menu_len, &mut off)?;
        let comment = read_optional(description_len, &mut off)?;
        read_optional(help_len, &mut off)?;
        read_optional(status_len, &mut off)?;

        // array constants may trail the descriptive strings
        let extra = data.get(off..).unwrap_or_default().to_vec();

        let scope = if sheet == 0 {
            NameScope::Workbook
        } else {
            NameScope::Sheet(sheet as usize - 1)
        };
        self.names.push(NameReference::new(name.clone()));
        self.name_scopes.push(scope);
        Ok(RawName {
            name,
            builtin,
            scope,
            hidden: flags & NAME_HIDDEN != 0,
            function: flags & NAME_FUNCTION != 0,
            comment,
            tokens,
            extra,
        })
    }

    /// Turn a NAME record into a defined name
    pub fn resolve_name(&self, raw: RawName) -> XlsResult<NamedRange> {
        let ptgs = decode_rgce(&raw.tokens, &raw.extra)?;
        let refers_to = render(&ptgs, self, 0, 0)?;
        Ok(NamedRange {
            name: raw.name,
            scope: raw.scope,
            refers_to,
            comment: raw.comment,
            hidden: raw.hidden,
            function: raw.function,
            builtin: raw.builtin,
        })
    }

    // ── writing ─────────────────────────────────────────────────────────

    /// Tables for writing `workbook`: one EXTERNSHEET entry per sheet, then
    /// one for the add-in functions its formulas call
    pub fn for_workbook(workbook: &Workbook) -> XlsResult<Self> {
        let sheets: Vec<String> = workbook.worksheets().map(|s| s.name().to_string()).collect();
        let mut table = Self::new(sheets.clone());

        let mut addins: Vec<String> = Vec::new();
        let mut seen = AHashSet::new();
        let mut three_d = false;
        let mut scan = |expr: &FormulaExpr| {
            expr.walk(&mut |node| match node {
                FormulaExpr::Function { name, .. } if function_by_name(name).is_none() => {
                    if seen.insert(name.to_ascii_uppercase()) {
                        addins.push(name.to_ascii_uppercase());
                    }
                }
                FormulaExpr::CellRef(r) if r.sheet.is_some() => three_d = true,
                FormulaExpr::RangeRef(r) if r.sheet.is_some() => three_d = true,
                _ => {}
            })
        };
        for sheet in workbook.worksheets() {
            for (_, _, text) in sheet.formula_cells() {
                // formulas that do not parse fail later with their cell named
                if let Ok(expr) = parse_formula(text) {
                    scan(&expr);
                }
            }
        }
        for name in workbook.named_ranges().iter() {
            if let Ok(expr) = parse_formula(&name.refers_to) {
                scan(&expr);
            }
        }

        for name in workbook.named_ranges().iter() {
            table.names.push(NameReference::new(name.name.clone()));
            table.name_scopes.push(name.scope);
        }
        if !three_d && addins.is_empty() && table.names.is_empty() {
            return Ok(table);
        }

        table.supbooks.push(SupBook {
            kind: SupBookKind::Internal,
            names: Vec::new(),
        });
        for i in 0..sheets.len() {
            table.extern_sheets.push(ExternSheet {
                supbook: 0,
                first: i as u16,
                last: i as u16,
            });
        }
        if !addins.is_empty() {
            table.supbooks.push(SupBook {
                kind: SupBookKind::AddIn,
                names: addins,
            });
            table.extern_sheets.push(ExternSheet {
                supbook: 1,
                first: NO_SHEET,
                last: NO_SHEET,
            });
        }
        Ok(table)
    }

    /// Whether SUPBOOK and EXTERNSHEET records are needed
    pub fn has_extern_sheets(&self) -> bool {
        !self.extern_sheets.is_empty()
    }

    /// Lookups for compiling formulas on `sheet`
    pub fn scope(&self, sheet: usize) -> SheetScope<'_> {
        SheetScope { table: self, sheet }
    }

    /// SUPBOOK bodies, each followed by its EXTERNNAME bodies
    pub fn supbook_records(&self) -> XlsResult<Vec<(Vec<u8>, Vec<Vec<u8>>)>> {
        self.supbooks
            .iter()
            .map(|book| {
                let mut body = Vec::new();
                match &book.kind {
                    SupBookKind::Internal => {
                        body.put_u16(self.sheets.len() as u16);
                        body.put_u16(SUPBOOK_INTERNAL);
                    }
                    SupBookKind::AddIn => {
                        body.put_u16(1);
                        body.put_u16(SUPBOOK_ADDIN);
                    }
                    SupBookKind::External { .. } => {
                        return Err(XlsError::record("external workbooks are not written"))
                    }
                }
                let names = book
                    .names
                    .iter()
                    .map(|name| externname_body(name))
                    .collect::<XlsResult<Vec<_>>>()?;
                Ok((body, names))
            })
            .collect()
    }

    pub fn externsheet_body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(2 + self.extern_sheets.len() * 6);
        body.put_u16(self.extern_sheets.len() as u16);
        for entry in &self.extern_sheets {
            body.put_u16(entry.supbook);
            body.put_u16(entry.first);
            body.put_u16(entry.last);
        }
        body
    }

    /// NAME record body for a defined name
    pub fn name_body(&self, name: &NamedRange) -> XlsResult<Vec<u8>> {
        let sheet = name.scope.sheet().unwrap_or(0);
        let encoded = self.compile(&name.refers_to, sheet)?;

        let mut flags = 0u16;
        if name.hidden {
            flags |= NAME_HIDDEN;
        }
        if name.function {
            flags |= NAME_FUNCTION;
        }
        let text = match name.builtin {
            Some(b) => {
                flags |= NAME_BUILTIN;
                char::from(b.code()).to_string()
            }
            None => name.name.clone(),
        };
        let text_len = char_count(&text);
        if text_len > u8::MAX as usize {
            return Err(XlsError::Core(binsheets_core::Error::InvalidName(name.name.clone())));
        }
        let comment = name.comment.as_deref().unwrap_or("");
        let comment_len = char_count(comment).min(u8::MAX as usize);

        let mut body = Vec::new();
        body.put_u16(flags);
        body.put_u8(0);
        body.put_u8(text_len as u8);
        body.put_u16(encoded.tokens.len() as u16);
        body.put_u16(0);
        body.put_u16(match name.scope {
            NameScope::Workbook => 0,
            NameScope::Sheet(i) => i as u16 + 1,
        });
        body.put_u8(0);
        body.put_u8(comment_len as u8);
        body.put_u8(0);
        body.put_u8(0);
        let wide = !is_compressible(&text);
        body.put_u8(u8::from(wide));
        write_chars(&mut body, &text, wide);
        body.extend_from_slice(&encoded.tokens);
        if comment_len > 0 {
            let comment: String = String::from_utf16_lossy(
                &comment.encode_utf16().take(comment_len).collect::<Vec<_>>(),
            );
            let wide = !is_compressible(&comment);
            body.put_u8(u8::from(wide));
            write_chars(&mut body, &comment, wide);
        }
        body.extend_from_slice(&encoded.extra);
        Ok(body)
    }

    /// Tokenize formula text as used on `sheet`
    pub fn compile(&self, text: &str, sheet: usize) -> XlsResult<EncodedFormula> {
        let expr = parse_formula(text)?;
        let ptgs = compile(&expr, &self.scope(sheet))?;
        Ok(encode_rgce(&ptgs))
    }

    fn sheet_index(&self, sheet: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.eq_ignore_ascii_case(sheet))
    }
}

fn externname_body(name: &str) -> XlsResult<Vec<u8>> {
    let len = char_count(name);
    if len > u8::MAX as usize {
        return Err(XlsError::Core(binsheets_core::Error::InvalidName(name.to_string())));
    }
    let mut body = Vec::new();
    body.put_u16(0);
    body.put_u32(0);
    body.put_u8(len as u8);
    let wide = !is_compressible(name);
    body.put_u8(u8::from(wide));
    write_chars(&mut body, name, wide);
    // a #REF! formula, as Excel writes for add-in functions
    body.put_u16(2);
    body.put_u8(0x1C);
    body.put_u8(0x17);
    Ok(body)
}

impl FormulaRenderingWorkbook for LinkTable {
    fn sheet_name(&self, extern_sheet: u16) -> Option<String> {
        let entry = self.extern_sheets.get(extern_sheet as usize)?;
        if entry.first == NO_SHEET || entry.first == 0xFFFF {
            return None;
        }
        match &self.supbooks.get(entry.supbook as usize)?.kind {
            SupBookKind::Internal => self.sheets.get(entry.first as usize).cloned(),
            SupBookKind::External { sheets } => sheets.get(entry.first as usize).cloned(),
            SupBookKind::AddIn => None,
        }
    }

    fn defined_name(&self, index: u16) -> Option<NameReference> {
        self.names.get((index as usize).checked_sub(1)?).cloned()
    }

    fn external_name(&self, extern_sheet: u16, index: u16) -> Option<String> {
        let entry = self.extern_sheets.get(extern_sheet as usize)?;
        let book = self.supbooks.get(entry.supbook as usize)?;
        book.names.get((index as usize).checked_sub(1)?).cloned()
    }
}

/// Formula lookups from the point of view of one sheet
pub struct SheetScope<'a> {
    table: &'a LinkTable,
    sheet: usize,
}

impl FormulaParsingWorkbook for SheetScope<'_> {
    fn extern_sheet_index(&self, sheet: &str) -> Option<u16> {
        let index = self.table.sheet_index(sheet)?;
        // entries for the workbook's own sheets come first, in sheet order
        self.table
            .extern_sheets
            .iter()
            .position(|e| e.supbook == 0 && e.first as usize == index && e.last as usize == index)
            .map(|p| p as u16)
    }

    fn name_index(&self, name: &NameReference) -> Option<u16> {
        let wanted = match &name.sheet {
            Some(sheet) => vec![NameScope::Sheet(self.table.sheet_index(sheet)?)],
            None => vec![NameScope::Sheet(self.sheet), NameScope::Workbook],
        };
        wanted.iter().find_map(|scope| {
            self.table
                .names
                .iter()
                .zip(&self.table.name_scopes)
                .position(|(n, s)| s == scope && n.name.eq_ignore_ascii_case(&name.name))
                .map(|p| p as u16 + 1)
        })
    }

    fn addin_function(&self, name: &str) -> Option<(u16, u16)> {
        let (book_index, book) = self
            .table
            .supbooks
            .iter()
            .enumerate()
            .find(|(_, b)| b.kind == SupBookKind::AddIn)?;
        let extern_sheet = self
            .table
            .extern_sheets
            .iter()
            .position(|e| e.supbook as usize == book_index)?;
        let index = book.names.iter().position(|n| n.eq_ignore_ascii_case(name))?;
        Some((extern_sheet as u16, index as u16 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binsheets_core::Workbook;
    use pretty_assertions::assert_eq;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_formula("A1", "IFERROR(Data!B2/Rate,0)")
            .unwrap();
        wb.define_name("Rate", "Data!$A$1").unwrap();
        wb.define_name_for_sheet("Local", "Data!$B$1:$B$4", 1).unwrap();
        wb.set_print_area(0, "A1:C5").unwrap();
        wb
    }

    /// Read the tables back the way the reader does
    fn reread(wb: &Workbook, table: &LinkTable) -> (LinkTable, Vec<NamedRange>) {
        let mut back = LinkTable::new(vec!["Sheet1".into(), "Data".into()]);
        for (book, names) in table.supbook_records().unwrap() {
            back.parse_supbook(&book, 1200).unwrap();
            for name in names {
                back.parse_externname(&name, 1200).unwrap();
            }
        }
        back.parse_externsheet(&table.externsheet_body()).unwrap();
        let raw: Vec<RawName> = wb
            .named_ranges()
            .iter()
            .map(|n| back.parse_name(&table.name_body(n).unwrap(), 1200).unwrap())
            .collect();
        let names = raw.into_iter().map(|r| back.resolve_name(r).unwrap()).collect();
        (back, names)
    }

    #[test]
    fn test_tables_for_workbook() {
        let wb = workbook();
        let table = LinkTable::for_workbook(&wb).unwrap();
        assert!(table.has_extern_sheets());
        // two sheets, then the add-in entry
        assert_eq!(&table.externsheet_body()[..2], &[3, 0]);
        let scope = table.scope(0);
        assert_eq!(scope.extern_sheet_index("data"), Some(1));
        assert_eq!(scope.addin_function("IFERROR"), Some((2, 1)));
        assert_eq!(scope.name_index(&NameReference::new("rate")), Some(1));
        assert_eq!(scope.name_index(&NameReference::new("Local")), None);
        assert_eq!(table.scope(1).name_index(&NameReference::new("Local")), Some(2));
    }

    #[test]
    fn test_formula_round_trip_through_tables() {
        let wb = workbook();
        let table = LinkTable::for_workbook(&wb).unwrap();
        let encoded = table.compile("IFERROR(Data!B2/Rate,0)", 0).unwrap();
        let (back, names) = reread(&wb, &table);
        let ptgs = decode_rgce(&encoded.tokens, &encoded.extra).unwrap();
        assert_eq!(render(&ptgs, &back, 0, 0).unwrap(), "IFERROR(Data!B2/Rate,0)");

        assert_eq!(names.len(), 3);
        assert_eq!(names[0].refers_to, "Data!$A$1");
        assert_eq!(names[1].scope, NameScope::Sheet(1));
        assert_eq!(names[2].builtin, Some(BuiltinName::PrintArea));
        assert_eq!(names[2].name, "Print_Area");
        assert_eq!(names[2].refers_to, "Sheet1!$A$1:$C$5");
    }

    #[test]
    fn test_name_comment_and_flags() {
        let mut wb = Workbook::new();
        let name = NamedRange::workbook_scope("Total", "Sheet1!$A$1")
            .with_comment("sum of everything")
            .hidden();
        wb.named_ranges_mut().define(name.clone()).unwrap();
        let table = LinkTable::for_workbook(&wb).unwrap();
        let (_, names) = reread(&wb, &table);
        assert_eq!(names[0], name);
    }

    #[test]
    fn test_plain_workbook_needs_no_tables() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_formula("A1", "SUM(B1:B3)")
            .unwrap();
        assert!(!LinkTable::for_workbook(&wb).unwrap().has_extern_sheets());
    }

    #[test]
    fn test_missing_entries_render_as_unknown() {
        let table = LinkTable::new(vec!["Sheet1".into()]);
        assert_eq!(table.sheet_name(0), None);
        assert_eq!(table.defined_name(0), None);
        assert_eq!(table.external_name(0, 1), None);
    }
}

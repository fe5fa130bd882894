//! Workbook type - the main document structure

use crate::cell::{quote_sheet_name, CellAddress, CellRange};
use crate::drawing::{PictureData, PictureFormat};
use crate::error::{Error, Result};
use crate::named_range::{BuiltinName, NameScope, NamedRange, NamedRangeCollection};
use crate::palette::Palette;
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// Characters Excel refuses in a sheet name
const INVALID_SHEET_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];

/// A workbook (spreadsheet document)
///
/// A workbook contains worksheets, defined names, the color palette, the
/// pictures referenced by drawings, and global settings.
#[derive(Debug, Clone)]
pub struct Workbook {
    /// Worksheets in the workbook
    worksheets: Vec<Worksheet>,
    /// Workbook settings
    settings: WorkbookSettings,
    /// Active sheet index
    active_sheet: usize,
    /// Named ranges (defined names)
    named_ranges: NamedRangeCollection,
    palette: Palette,
    /// Picture blips, addressed 1-based by picture shapes
    pictures: Vec<PictureData>,
}

impl Workbook {
    /// Create a new workbook with one worksheet named `Sheet1`
    pub fn new() -> Self {
        let mut wb = Self::empty();
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_selected(true);
        wb.worksheets.push(sheet);
        wb
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            settings: WorkbookSettings::default(),
            active_sheet: 0,
            named_ranges: NamedRangeCollection::new(),
            palette: Palette::new(),
            pictures: Vec::new(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the workbook has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name (case-insensitive)
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).map(|i| &self.worksheets[i])
    }

    /// Get a mutable worksheet by name (case-insensitive)
    pub fn worksheet_by_name_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheet_index(name).map(move |i| &mut self.worksheets[i])
    }

    /// Get the index of a worksheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| sheet_names_equal(ws.name(), name))
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Iterate over all worksheets mutably
    pub fn worksheets_mut(&mut self) -> impl Iterator<Item = &mut Worksheet> {
        self.worksheets.iter_mut()
    }

    /// Add a new worksheet with default name
    pub fn add_worksheet(&mut self) -> Result<usize> {
        let name = self.generate_sheet_name();
        self.add_worksheet_with_name(&name)
    }

    /// Add a new worksheet with specified name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.add_existing_worksheet(Worksheet::new(name))
    }

    /// Insert a worksheet at a specific index
    pub fn insert_worksheet(&mut self, index: usize, name: &str) -> Result<()> {
        if index > self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.validate_sheet_name(name)?;

        let last = self.worksheets.len();
        self.worksheets.push(Worksheet::new(name));
        if index != last {
            self.move_worksheet(last, index)?;
        }
        Ok(())
    }

    /// Add an existing worksheet to the end of the workbook
    pub fn add_existing_worksheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name())?;
        let index = self.worksheets.len();
        self.worksheets.push(worksheet);
        if index == 0 {
            self.worksheets[0].set_selected(true);
        }
        Ok(index)
    }

    /// Remove a worksheet by index.
    ///
    /// Names scoped to the sheet are removed and later sheet scopes move
    /// down by one.
    pub fn remove_worksheet(&mut self, index: usize) -> Result<Worksheet> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }

        let worksheet = self.worksheets.remove(index);
        self.named_ranges.remove_sheet(index);

        // Adjust active sheet index
        if self.worksheets.is_empty() {
            self.active_sheet = 0;
        } else {
            if self.active_sheet > index || self.active_sheet >= self.worksheets.len() {
                self.active_sheet = self.active_sheet.saturating_sub(1);
            }
            if worksheet.is_selected() {
                self.worksheets[self.active_sheet].set_selected(true);
            }
        }

        log::debug!("removed sheet '{}' at {}", worksheet.name(), index);
        Ok(worksheet)
    }

    /// Move a worksheet to a new position
    pub fn move_worksheet(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(from, self.worksheets.len()));
        }
        if to >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(to, self.worksheets.len()));
        }

        let worksheet = self.worksheets.remove(from);
        self.worksheets.insert(to, worksheet);
        self.named_ranges.move_sheet(from, to);
        self.active_sheet = crate::named_range::moved_index(self.active_sheet, from, to);

        Ok(())
    }

    /// Rename a worksheet
    pub fn rename_worksheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }

        // The sheet may keep its own name with different case
        self.validate_sheet_name_excluding(new_name, Some(index))?;

        self.worksheets[index].set_name(new_name);
        Ok(())
    }

    /// Append a copy of a sheet and return the index of the copy.
    ///
    /// The copy is named `"Name (2)"`, `"Name (3)"` and so on. Names scoped
    /// to the source sheet are copied to the new sheet.
    pub fn clone_worksheet(&mut self, index: usize) -> Result<usize> {
        let source = self
            .worksheets
            .get(index)
            .ok_or(Error::SheetOutOfBounds(index, self.worksheets.len()))?;

        let name = self.unique_clone_name(source.name());
        let mut copy = source.clone();
        copy.set_name(name);
        copy.set_selected(false);

        let new_index = self.worksheets.len();
        self.worksheets.push(copy);

        let local: Vec<NamedRange> = self.named_ranges.sheet_names(index).cloned().collect();
        for mut name in local {
            name.scope = NameScope::Sheet(new_index);
            self.named_ranges.push_unchecked(name);
        }

        Ok(new_index)
    }

    fn unique_clone_name(&self, source: &str) -> String {
        let (base, mut n) = split_clone_suffix(source);
        loop {
            n += 1;
            let suffix = format!(" ({})", n);
            let room = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
            let stem: String = base.chars().take(room).collect();
            let candidate = format!("{}{}", stem, suffix);
            if self.sheet_index(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Get the active sheet index
    pub fn active_sheet(&self) -> usize {
        self.active_sheet
    }

    /// Set the active sheet index
    pub fn set_active_sheet(&mut self, index: usize) -> Result<()> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.active_sheet = index;
        Ok(())
    }

    /// Get workbook settings
    pub fn settings(&self) -> &WorkbookSettings {
        &self.settings
    }

    /// Get mutable workbook settings
    pub fn settings_mut(&mut self) -> &mut WorkbookSettings {
        &mut self.settings
    }

    /// Color palette used by indexed colors
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    // ==================== Pictures ====================

    /// Store picture bytes and return their 1-based index.
    ///
    /// The bytes are kept as given; nothing is decoded.
    pub fn add_picture(&mut self, data: impl Into<Vec<u8>>, format: PictureFormat) -> u32 {
        self.pictures.push(PictureData::new(format, data.into()));
        self.pictures.len() as u32
    }

    /// Picture by 1-based index
    pub fn picture(&self, index: u32) -> Option<&PictureData> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.pictures.get(i))
    }

    pub fn pictures(&self) -> &[PictureData] {
        &self.pictures
    }

    // ==================== Named Ranges ====================

    /// Define a new workbook-scoped named range
    ///
    /// # Example
    /// ```
    /// use binsheets_core::Workbook;
    ///
    /// let mut wb = Workbook::new();
    /// wb.define_name("TaxRate", "Sheet1!$B$1").unwrap();
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.define_name_with_scope(name, refers_to, NameScope::Workbook)
    }

    /// Define a named range with a specific scope
    pub fn define_name_with_scope(
        &mut self,
        name: &str,
        refers_to: &str,
        scope: NameScope,
    ) -> Result<()> {
        if let NameScope::Sheet(idx) = scope {
            if idx >= self.worksheets.len() {
                return Err(Error::SheetOutOfBounds(idx, self.worksheets.len()));
            }
        }
        self.named_ranges
            .define(NamedRange::new(name, refers_to, scope))
            .map(|_| ())
    }

    /// Define a sheet-scoped named range
    pub fn define_name_for_sheet(
        &mut self,
        name: &str,
        refers_to: &str,
        sheet_index: usize,
    ) -> Result<()> {
        self.define_name_with_scope(name, refers_to, NameScope::Sheet(sheet_index))
    }

    /// Get a named range by name, following Excel's scoping rules
    ///
    /// Looks for sheet-scoped name first (for the given sheet), then workbook-scoped.
    pub fn get_named_range(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.named_ranges.get(name, current_sheet)
    }

    /// Remove a workbook-scoped named range
    pub fn remove_name(&mut self, name: &str) -> Option<NamedRange> {
        self.named_ranges.remove(name, &NameScope::Workbook)
    }

    /// Remove a sheet-scoped named range
    pub fn remove_name_from_sheet(&mut self, name: &str, sheet_index: usize) -> Option<NamedRange> {
        self.named_ranges
            .remove(name, &NameScope::Sheet(sheet_index))
    }

    /// Rename a defined name within its scope
    pub fn rename_name(&mut self, old: &str, scope: NameScope, new: &str) -> Result<()> {
        self.named_ranges.rename(old, &scope, new)
    }

    /// Get the named range collection (read-only)
    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    /// Get the named range collection (mutable)
    pub fn named_ranges_mut(&mut self) -> &mut NamedRangeCollection {
        &mut self.named_ranges
    }

    /// Set the print area of a sheet from an A1 range such as `"A1:C5"`.
    ///
    /// The built-in `Print_Area` name is stored with an absolute,
    /// sheet-qualified reference, for example `'My Sheet'!$A$1:$C$5`.
    pub fn set_print_area(&mut self, sheet_index: usize, range: &str) -> Result<()> {
        let sheet = self
            .worksheets
            .get(sheet_index)
            .ok_or(Error::SheetOutOfBounds(sheet_index, self.worksheets.len()))?;
        let range = CellRange::parse(range)?;
        let start = CellAddress::absolute(range.start.row, range.start.col);
        let end = CellAddress::absolute(range.end.row, range.end.col);
        let refers_to = format!(
            "{}!{}:{}",
            quote_sheet_name(sheet.name()),
            start.to_a1_string(),
            end.to_a1_string()
        );

        self.named_ranges.define_or_update(NamedRange::builtin(
            BuiltinName::PrintArea,
            refers_to,
            sheet_index,
        ))?;
        Ok(())
    }

    /// Print area reference of a sheet, if one is set
    pub fn print_area(&self, sheet_index: usize) -> Option<&str> {
        self.named_ranges
            .builtin(BuiltinName::PrintArea, sheet_index)
            .map(|n| n.refers_to.as_str())
    }

    /// Drop the print area of a sheet
    pub fn remove_print_area(&mut self, sheet_index: usize) -> bool {
        self.named_ranges
            .remove(BuiltinName::PrintArea.name(), &NameScope::Sheet(sheet_index))
            .is_some()
    }

    /// Validate a sheet name
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        self.validate_sheet_name_excluding(name, None)
    }

    /// Validate a sheet name, optionally excluding a sheet from duplicate check
    fn validate_sheet_name_excluding(
        &self,
        name: &str,
        exclude_index: Option<usize>,
    ) -> Result<()> {
        validate_sheet_name(name)?;

        for (i, ws) in self.worksheets.iter().enumerate() {
            if Some(i) != exclude_index && sheet_names_equal(ws.name(), name) {
                return Err(Error::DuplicateSheetName(name.into()));
            }
        }

        Ok(())
    }

    /// Generate a unique sheet name
    fn generate_sheet_name(&self) -> String {
        let mut n = self.worksheets.len() + 1;
        loop {
            let name = format!("Sheet{}", n);
            if self.sheet_index(&name).is_none() {
                return name;
            }
            n += 1;
        }
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the syntax of a sheet name, without looking at other sheets
pub fn validate_sheet_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(Error::InvalidSheetName(format!(
            "Sheet name too long (max {} characters)",
            MAX_SHEET_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| INVALID_SHEET_CHARS.contains(c)) {
        return Err(Error::InvalidSheetName(format!(
            "Sheet name cannot contain '{}'",
            c
        )));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(Error::InvalidSheetName(
            "Sheet name cannot start or end with an apostrophe".into(),
        ));
    }
    Ok(())
}

fn sheet_names_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Split `"Name (3)"` into `("Name", 3)`; other names get a count of 1
fn split_clone_suffix(name: &str) -> (&str, u32) {
    if let Some(inner) = name.strip_suffix(')') {
        if let Some(open) = inner.rfind(" (") {
            if let Ok(n) = inner[open + 2..].parse::<u32>() {
                return (&name[..open], n);
            }
        }
    }
    (name, 1)
}

/// Workbook-level settings
#[derive(Debug, Clone)]
pub struct WorkbookSettings {
    /// Date system: false = 1900 (Windows), true = 1904 (Mac)
    pub date_1904: bool,
    /// Workbook structure is protected
    pub protected: bool,
    /// Password hash for protection (if protected)
    pub password_hash: Option<u16>,
    /// Codepage for byte strings (1200 = UTF-16)
    pub codepage: u16,
}

impl Default for WorkbookSettings {
    fn default() -> Self {
        Self {
            date_1904: false,
            protected: false,
            password_hash: None,
            codepage: 1200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Sheet1");
        assert!(wb.worksheet(0).unwrap().is_selected());
        assert_eq!(wb.settings().codepage, 1200);
    }

    #[test]
    fn test_add_worksheets() {
        let mut wb = Workbook::new();

        let idx = wb.add_worksheet().unwrap();
        assert_eq!(idx, 1);
        assert_eq!(wb.sheet_count(), 2);
        assert_eq!(wb.worksheet(1).unwrap().name(), "Sheet2");

        let idx = wb.add_worksheet_with_name("Data").unwrap();
        assert_eq!(idx, 2);
        assert_eq!(wb.worksheet(2).unwrap().name(), "Data");
    }

    #[test]
    fn test_duplicate_name() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.add_worksheet_with_name("sheet1"),
            Err(Error::DuplicateSheetName(_))
        ));
    }

    #[test]
    fn test_invalid_names() {
        let mut wb = Workbook::new();
        for bad in ["", "a:b", "a/b", "a\\b", "a?", "a*", "[x]", "'quoted", "trailing'"] {
            assert!(
                matches!(
                    wb.add_worksheet_with_name(bad),
                    Err(Error::InvalidSheetName(_))
                ),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(wb.add_worksheet_with_name(&"x".repeat(32)).is_err());
        assert!(wb.add_worksheet_with_name(&"x".repeat(31)).is_ok());
        assert!(wb.add_worksheet_with_name("O'Brien").is_ok());
    }

    #[test]
    fn test_rename_keeps_own_name_case() {
        let mut wb = Workbook::new();
        wb.rename_worksheet(0, "SHEET1").unwrap();
        assert_eq!(wb.worksheet(0).unwrap().name(), "SHEET1");
    }

    #[test]
    fn test_move_worksheet_reindexes_names() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("B").unwrap();
        wb.add_worksheet_with_name("C").unwrap();
        wb.define_name_for_sheet("Local", "C!$A$1", 2).unwrap();

        wb.move_worksheet(2, 0).unwrap();
        let names: Vec<_> = wb.worksheets().map(|s| s.name()).collect();
        assert_eq!(names, vec!["C", "Sheet1", "B"]);
        assert_eq!(
            wb.named_ranges().iter().next().unwrap().scope,
            NameScope::Sheet(0)
        );
        assert_eq!(wb.active_sheet(), 1);
    }

    #[test]
    fn test_remove_worksheet_drops_local_names() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("B").unwrap();
        wb.add_worksheet_with_name("C").unwrap();
        wb.define_name_for_sheet("OnB", "B!$A$1", 1).unwrap();
        wb.define_name_for_sheet("OnC", "C!$A$1", 2).unwrap();
        wb.define_name("Global", "Sheet1!$A$1").unwrap();

        wb.remove_worksheet(1).unwrap();
        assert_eq!(wb.named_ranges().len(), 2);
        assert!(wb.get_named_range("OnB", 1).is_none());
        assert_eq!(wb.get_named_range("OnC", 1).unwrap().refers_to, "C!$A$1");
    }

    #[test]
    fn test_clone_worksheet_names() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_value("A1", 5.0)
            .unwrap();
        wb.set_print_area(0, "A1:B2").unwrap();

        let idx = wb.clone_worksheet(0).unwrap();
        assert_eq!(wb.worksheet(idx).unwrap().name(), "Sheet1 (2)");
        assert_eq!(wb.worksheet(idx).unwrap().get_value_at(0, 0).as_number(), Some(5.0));
        assert!(!wb.worksheet(idx).unwrap().is_selected());
        assert!(wb.print_area(idx).is_some());

        let idx = wb.clone_worksheet(0).unwrap();
        assert_eq!(wb.worksheet(idx).unwrap().name(), "Sheet1 (3)");

        let idx = wb.clone_worksheet(idx).unwrap();
        assert_eq!(wb.worksheet(idx).unwrap().name(), "Sheet1 (4)");
    }

    #[test]
    fn test_clone_name_fits_limit() {
        let mut wb = Workbook::empty();
        wb.add_worksheet_with_name(&"x".repeat(31)).unwrap();
        let idx = wb.clone_worksheet(0).unwrap();
        let name = wb.worksheet(idx).unwrap().name().to_string();
        assert_eq!(name.chars().count(), 31);
        assert!(name.ends_with(" (2)"));
    }

    #[test]
    fn test_print_area() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("My Sheet").unwrap();
        wb.set_print_area(1, "C5:A1").unwrap();
        assert_eq!(wb.print_area(1), Some("'My Sheet'!$A$1:$C$5"));
        assert_eq!(wb.print_area(0), None);

        wb.set_print_area(1, "B2:D4").unwrap();
        assert_eq!(wb.named_ranges().len(), 1);
        let name = wb.named_ranges().iter().next().unwrap();
        assert_eq!(name.name, "Print_Area");
        assert_eq!(name.builtin, Some(BuiltinName::PrintArea));

        assert!(wb.remove_print_area(1));
        assert_eq!(wb.print_area(1), None);
    }

    #[test]
    fn test_define_name_for_missing_sheet() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.define_name_for_sheet("x", "1", 4),
            Err(Error::SheetOutOfBounds(4, 1))
        ));
    }

    #[test]
    fn test_rename_name() {
        let mut wb = Workbook::new();
        wb.define_name("Old", "Sheet1!$A$1").unwrap();
        wb.rename_name("old", NameScope::Workbook, "New").unwrap();
        assert!(wb.get_named_range("Old", 0).is_none());
        assert_eq!(wb.get_named_range("NEW", 0).unwrap().name, "New");
        assert!(wb.rename_name("New", NameScope::Workbook, "A1").is_err());
    }

    #[test]
    fn test_pictures_are_one_based() {
        let mut wb = Workbook::new();
        let first = wb.add_picture(vec![0x89, b'P', b'N', b'G'], PictureFormat::Png);
        let second = wb.add_picture(vec![0xFF, 0xD8], PictureFormat::Jpeg);
        assert_eq!((first, second), (1, 2));
        assert_eq!(wb.picture(2).unwrap().format, PictureFormat::Jpeg);
        assert!(wb.picture(0).is_none());
        assert_eq!(wb.pictures().len(), 2);
    }

    #[test]
    fn test_by_name_ignores_case() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        assert_eq!(wb.sheet_index("DATA"), Some(1));
        assert!(wb.worksheet_by_name("data").is_some());
        assert!(wb.worksheet_by_name("missing").is_none());
    }

    #[test]
    fn test_insert_worksheet() {
        let mut wb = Workbook::new();
        wb.insert_worksheet(0, "First").unwrap();
        assert_eq!(wb.sheet_index("First"), Some(0));
        assert_eq!(wb.active_sheet(), 1);
    }
}

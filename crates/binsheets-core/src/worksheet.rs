//! Worksheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellData, CellRange, CellStorage, CellType, CellValue};
use crate::column::{ColumnData, ColumnInfo};
use crate::comment::CellComment;
use crate::drawing::Patriarch;
use crate::error::{Error, Result};
use crate::hyperlink::Hyperlink;
use crate::row::{RowInfo, RowView};
use crate::style::{Style, StylePool};
use crate::{MAX_COLS, MAX_ROWS};

/// Sheet visibility as stored in BOUNDSHEET
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    /// Hidden and not listed in the unhide dialog
    VeryHidden,
}

impl SheetVisibility {
    pub fn code(self) -> u8 {
        match self {
            SheetVisibility::Visible => 0,
            SheetVisibility::Hidden => 1,
            SheetVisibility::VeryHidden => 2,
        }
    }

    /// Decode a BOUNDSHEET visibility byte. Unknown values are treated as hidden.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => SheetVisibility::Visible,
            2 => SheetVisibility::VeryHidden,
            _ => SheetVisibility::Hidden,
        }
    }
}

/// Freeze pane settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezePanes {
    /// Freeze row (first unfrozen row)
    pub row: u32,
    /// Freeze column (first unfrozen column)
    pub col: u16,
}

/// A completed move of the rows `first..=last` by `delta` rows
///
/// Returned by [`Worksheet::shift_rows`] so that formulas and names that
/// point at the moved rows can be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowShift {
    pub first: u32,
    pub last: u32,
    pub delta: i64,
}

impl RowShift {
    /// First row of the destination block
    pub fn dest_first(&self) -> u32 {
        (self.first as i64 + self.delta) as u32
    }

    /// Last row of the destination block
    pub fn dest_last(&self) -> u32 {
        (self.last as i64 + self.delta) as u32
    }

    /// New position of `row` if it was part of the moved block
    pub fn moved(&self, row: u32) -> Option<u32> {
        (self.first..=self.last)
            .contains(&row)
            .then(|| (row as i64 + self.delta) as u32)
    }

    /// Whether `row` was overwritten by the moved block (and not itself moved)
    pub fn overwritten(&self, row: u32) -> bool {
        self.delta != 0
            && (self.dest_first()..=self.dest_last()).contains(&row)
            && !(self.first..=self.last).contains(&row)
    }

    /// Whether the shift changed anything
    pub fn is_noop(&self) -> bool {
        self.delta == 0
    }
}

/// A worksheet (single sheet in a workbook)
#[derive(Debug, Clone)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Cell storage
    cells: CellStorage,
    visibility: SheetVisibility,
    /// Sheet tab is selected
    selected: bool,
    /// Freeze pane settings
    freeze_panes: Option<FreezePanes>,
    active_cell: CellAddress,
    /// Cell comments keyed by (row, col)
    comments: BTreeMap<(u32, u16), CellComment>,
    hyperlinks: Vec<Hyperlink>,
    patriarch: Option<Patriarch>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: CellStorage::new(),
            visibility: SheetVisibility::Visible,
            selected: false,
            freeze_panes: None,
            active_cell: CellAddress::new(0, 0),
            comments: BTreeMap::new(),
            hyperlinks: Vec::new(),
            patriarch: None,
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name. The workbook checks name rules and uniqueness.
    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn visibility(&self) -> SheetVisibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: SheetVisibility) {
        self.visibility = visibility;
    }

    /// Check if the sheet is visible
    pub fn is_visible(&self) -> bool {
        self.visibility == SheetVisibility::Visible
    }

    /// Show or hide the sheet
    pub fn set_visible(&mut self, visible: bool) {
        self.visibility = if visible {
            SheetVisibility::Visible
        } else {
            SheetVisibility::Hidden
        };
    }

    pub fn is_very_hidden(&self) -> bool {
        self.visibility == SheetVisibility::VeryHidden
    }

    /// Check if the sheet is selected
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Set sheet selected state
    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Cell with the cursor
    pub fn active_cell(&self) -> CellAddress {
        self.active_cell
    }

    pub fn set_active_cell(&mut self, row: u32, col: u16) -> Result<()> {
        validate_cell_position(row, col)?;
        self.active_cell = CellAddress::new(row, col);
        Ok(())
    }

    // === Cell Access ===

    /// Get a cell value by address string (e.g., "A1")
    pub fn cell(&self, address: &str) -> Result<Option<&CellData>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cells.get(addr.row, addr.col))
    }

    /// Get a cell value by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Get cell value (convenience method)
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get cell value by indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(row, col)
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty)
    }

    /// Type of the value at a cell (`Blank` for missing cells)
    pub fn cell_type_at(&self, row: u32, col: u16) -> CellType {
        self.cells
            .get(row, col)
            .map(|c| c.value.cell_type())
            .unwrap_or(CellType::Blank)
    }

    /// Get a cell's style index by row/column.
    ///
    /// Returns 0 if the cell does not exist or has the default style.
    pub fn cell_style_index_at(&self, row: u32, col: u16) -> u32 {
        self.cells.get(row, col).map(|c| c.style_index).unwrap_or(0)
    }

    /// Get a style by its index in this worksheet's style pool.
    pub fn style_by_index(&self, style_index: u32) -> Option<&Style> {
        self.cells.style_pool().get(style_index)
    }

    /// Get the non-default style applied to a cell, if any.
    pub fn cell_style_at(&self, row: u32, col: u16) -> Option<&Style> {
        let idx = self.cell_style_index_at(row, col);
        if idx == 0 {
            None
        } else {
            self.style_by_index(idx)
        }
    }

    /// Get the non-default style applied to a cell by address, if any.
    pub fn cell_style(&self, address: &str) -> Result<Option<&Style>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell_style_at(addr.row, addr.col))
    }

    /// The style pool of this sheet
    pub fn style_pool(&self) -> &StylePool {
        self.cells.style_pool()
    }

    pub fn style_pool_mut(&mut self) -> &mut StylePool {
        self.cells.style_pool_mut()
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        validate_cell_position(row, col)?;
        self.cells.set_value(row, col, value.into());
        Ok(())
    }

    /// Set a cell formula by address string. The leading `=` is optional.
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a cell formula by row and column indices
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        validate_cell_position(row, col)?;
        self.cells.set_value(row, col, CellValue::formula(formula));
        Ok(())
    }

    /// Set a cell style by address string
    pub fn set_cell_style(&mut self, address: &str, style: &Style) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_style_at(addr.row, addr.col, style)
    }

    /// Set a cell style by row and column indices
    pub fn set_cell_style_at(&mut self, row: u32, col: u16, style: &Style) -> Result<()> {
        validate_cell_position(row, col)?;
        let style_index = self.cells.style_pool_mut().get_or_insert(style.clone());
        self.cells.set_style(row, col, style_index);
        Ok(())
    }

    /// Apply a style that is already in this sheet's pool
    pub fn set_cell_style_index_at(&mut self, row: u32, col: u16, style_index: u32) -> Result<()> {
        validate_cell_position(row, col)?;
        if self.cells.style_pool().get(style_index).is_none() {
            return Err(Error::InvalidStyleIndex(style_index));
        }
        self.cells.set_style(row, col, style_index);
        Ok(())
    }

    /// Clear a cell
    pub fn clear_cell(&mut self, address: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.cells.remove(addr.row, addr.col);
        Ok(())
    }

    /// Clear a cell by indices
    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        self.cells.remove(row, col);
    }

    /// Remove every cell of a row together with its height, hidden flag and style
    pub fn remove_row(&mut self, row: u32) {
        let cols: Vec<u16> = self.cells.iter_row(row).map(|(c, _)| c).collect();
        for col in cols {
            self.cells.remove(row, col);
        }
        let default_height = self.cells.default_row_height();
        self.cells.set_row_height(row, default_height);
        self.cells.set_row_hidden(row, false);
        self.cells.set_row_outline_level(row, 0);
        self.cells.set_row_style(row, None);
    }

    // === Range Operations ===

    /// Get the used range (bounds of all non-empty cells)
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells
            .used_bounds()
            .map(|(min_row, min_col, max_row, max_col)| {
                CellRange::from_indices(min_row, min_col, max_row, max_col)
            })
    }

    /// Clear all cells in a range
    pub fn clear_range(&mut self, range: &CellRange) {
        for addr in range.cells() {
            self.cells.remove(addr.row, addr.col);
        }
    }

    // === Row/Column Operations ===

    /// View of a row and its cells
    pub fn row(&self, row: u32) -> RowView<'_> {
        RowView::new(&self.cells, row)
    }

    /// Row metadata
    pub fn row_info(&self, row: u32) -> RowInfo {
        RowInfo::from_storage(&self.cells, row)
    }

    /// Rows holding cells or row settings, ascending
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.cells
            .formatted_row_indices()
            .into_iter()
            .map(move |r| RowView::new(&self.cells, r))
    }

    /// First row holding cells or row settings
    pub fn first_row_num(&self) -> Option<u32> {
        self.cells.formatted_row_indices().first().copied()
    }

    /// Last row holding cells or row settings
    pub fn last_row_num(&self) -> Option<u32> {
        self.cells.formatted_row_indices().last().copied()
    }

    /// Get row height in points
    pub fn row_height(&self, row: u32) -> f64 {
        self.cells.row_height(row)
    }

    /// Set row height in points
    pub fn set_row_height(&mut self, row: u32, height: f64) -> Result<()> {
        validate_cell_position(row, 0)?;
        self.cells.set_row_height(row, height);
        Ok(())
    }

    /// Check if row is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.cells.is_row_hidden(row)
    }

    /// Set row hidden state
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) -> Result<()> {
        validate_cell_position(row, 0)?;
        self.cells.set_row_hidden(row, hidden);
        Ok(())
    }

    /// Set the outline level of a row (0-7)
    pub fn set_row_outline_level(&mut self, row: u32, level: u8) -> Result<()> {
        validate_cell_position(row, 0)?;
        self.cells.set_row_outline_level(row, level);
        Ok(())
    }

    /// Give a row a default style
    pub fn set_row_style(&mut self, row: u32, style: &Style) -> Result<()> {
        validate_cell_position(row, 0)?;
        let idx = self.cells.style_pool_mut().get_or_insert(style.clone());
        self.cells.set_row_style(row, Some(idx));
        Ok(())
    }

    /// Give a row a default style already in the pool (`None` clears it)
    pub fn set_row_style_index(&mut self, row: u32, style_index: Option<u32>) -> Result<()> {
        validate_cell_position(row, 0)?;
        if let Some(idx) = style_index {
            if self.cells.style_pool().get(idx).is_none() {
                return Err(Error::InvalidStyleIndex(idx));
            }
        }
        self.cells.set_row_style(row, style_index);
        Ok(())
    }

    /// Default row height in points
    pub fn default_row_height(&self) -> f64 {
        self.cells.default_row_height()
    }

    pub fn set_default_row_height(&mut self, height: f64) {
        self.cells.set_default_row_height(height);
    }

    /// Get column width in characters
    pub fn column_width(&self, col: u16) -> f64 {
        self.cells.column_width(col)
    }

    /// Set column width in characters
    pub fn set_column_width(&mut self, col: u16, width: f64) -> Result<()> {
        validate_cell_position(0, col)?;
        self.cells.set_column_width(col, width);
        Ok(())
    }

    /// Check if column is hidden
    pub fn is_column_hidden(&self, col: u16) -> bool {
        self.cells.is_column_hidden(col)
    }

    /// Set column hidden state
    pub fn set_column_hidden(&mut self, col: u16, hidden: bool) -> Result<()> {
        validate_cell_position(0, col)?;
        self.cells.set_column_hidden(col, hidden);
        Ok(())
    }

    /// Set the outline level of a column (0-7)
    pub fn set_column_outline_level(&mut self, col: u16, level: u8) -> Result<()> {
        validate_cell_position(0, col)?;
        self.cells.set_column_outline_level(col, level);
        Ok(())
    }

    /// Give a column a default style already in the pool (`None` clears it)
    pub fn set_column_style_index(&mut self, col: u16, style_index: Option<u32>) -> Result<()> {
        validate_cell_position(0, col)?;
        if let Some(idx) = style_index {
            if self.cells.style_pool().get(idx).is_none() {
                return Err(Error::InvalidStyleIndex(idx));
            }
        }
        self.cells.set_column_style(col, style_index);
        Ok(())
    }

    /// Column metadata
    pub fn column_info(&self, col: u16) -> ColumnInfo {
        ColumnInfo::from_storage(&self.cells, col)
    }

    /// Formatted columns grouped into runs of equal settings
    pub fn column_runs(&self) -> Vec<ColumnData> {
        ColumnData::runs(&self.cells)
    }

    /// Default column width in characters
    pub fn default_column_width(&self) -> f64 {
        self.cells.default_column_width()
    }

    pub fn set_default_column_width(&mut self, width: f64) {
        self.cells.set_default_column_width(width);
    }

    // === Merged Cells ===

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        self.cells.merged_regions()
    }

    /// Merge cells. Fails if the range overlaps an existing merged region.
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        validate_cell_position(range.end.row, range.end.col)?;
        for existing in self.cells.merged_regions() {
            if range.overlaps(existing) {
                return Err(Error::MergedCellConflict(range.to_string()));
            }
        }
        self.cells.add_merged_region(*range);
        Ok(())
    }

    /// Remove a merged region. Returns whether it existed.
    pub fn unmerge(&mut self, range: &CellRange) -> bool {
        let found = self
            .cells
            .merged_regions()
            .iter()
            .position(|existing| existing == range);
        match found {
            Some(i) => self.cells.remove_merged_region(i).is_some(),
            None => false,
        }
    }

    // === Freeze Panes ===

    /// Get freeze pane settings
    pub fn freeze_panes(&self) -> Option<&FreezePanes> {
        self.freeze_panes.as_ref()
    }

    /// Freeze the rows above `row` and the columns left of `col`
    pub fn set_freeze_panes(&mut self, row: u32, col: u16) {
        if row == 0 && col == 0 {
            self.freeze_panes = None;
        } else {
            self.freeze_panes = Some(FreezePanes { row, col });
        }
    }

    /// Remove freeze panes
    pub fn unfreeze_panes(&mut self) {
        self.freeze_panes = None;
    }

    // === Cell Comments ===

    /// Set a comment on a cell by address string
    ///
    /// # Example
    ///
    /// ```rust
    /// use binsheets_core::{CellComment, Worksheet};
    ///
    /// let mut ws = Worksheet::new("Test");
    /// ws.set_comment("A1", CellComment::new("Author", "This is a note")).unwrap();
    /// assert_eq!(ws.comment_count(), 1);
    /// ```
    pub fn set_comment(&mut self, address: &str, comment: CellComment) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_comment_at(addr.row, addr.col, comment)
    }

    /// Set a comment on a cell by row and column indices
    pub fn set_comment_at(&mut self, row: u32, col: u16, comment: CellComment) -> Result<()> {
        validate_cell_position(row, col)?;
        self.comments.insert((row, col), comment);
        Ok(())
    }

    /// Get a comment from a cell by address string
    pub fn comment(&self, address: &str) -> Result<Option<&CellComment>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.comment_at(addr.row, addr.col))
    }

    /// Get a comment from a cell by row and column indices
    pub fn comment_at(&self, row: u32, col: u16) -> Option<&CellComment> {
        self.comments.get(&(row, col))
    }

    /// Get a mutable reference to a comment
    pub fn comment_at_mut(&mut self, row: u32, col: u16) -> Option<&mut CellComment> {
        self.comments.get_mut(&(row, col))
    }

    /// Remove a comment from a cell by address string
    pub fn remove_comment(&mut self, address: &str) -> Result<Option<CellComment>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.remove_comment_at(addr.row, addr.col))
    }

    /// Remove a comment from a cell by row and column indices
    pub fn remove_comment_at(&mut self, row: u32, col: u16) -> Option<CellComment> {
        self.comments.remove(&(row, col))
    }

    /// Check if a cell has a comment by row and column indices
    pub fn has_comment_at(&self, row: u32, col: u16) -> bool {
        self.comments.contains_key(&(row, col))
    }

    /// Get the number of comments in this worksheet
    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    /// Iterate over all comments in row-major order: ((row, col), comment)
    pub fn comments(&self) -> impl Iterator<Item = ((u32, u16), &CellComment)> {
        self.comments.iter().map(|(&k, v)| (k, v))
    }

    /// Distinct comment authors in first-seen order
    pub fn comment_authors(&self) -> Vec<&str> {
        let mut authors: Vec<&str> = Vec::new();
        for c in self.comments.values() {
            if c.has_author() && !authors.contains(&c.author.as_str()) {
                authors.push(&c.author);
            }
        }
        authors
    }

    // === Hyperlinks ===

    /// Attach a hyperlink. A link already starting at the same cell is replaced.
    pub fn add_hyperlink(&mut self, link: Hyperlink) -> Result<()> {
        validate_cell_position(link.range.end.row, link.range.end.col)?;
        let start = (link.range.start.row, link.range.start.col);
        self.hyperlinks
            .retain(|h| (h.range.start.row, h.range.start.col) != start);
        self.hyperlinks.push(link);
        Ok(())
    }

    /// The hyperlink covering a cell
    pub fn hyperlink_at(&self, row: u32, col: u16) -> Option<&Hyperlink> {
        self.hyperlinks
            .iter()
            .find(|h| h.range.contains_cell(row, col))
    }

    /// Remove the hyperlink covering a cell
    pub fn remove_hyperlink(&mut self, row: u32, col: u16) -> Option<Hyperlink> {
        let pos = self
            .hyperlinks
            .iter()
            .position(|h| h.range.contains_cell(row, col))?;
        Some(self.hyperlinks.remove(pos))
    }

    /// All hyperlinks in insertion order
    pub fn hyperlinks(&self) -> &[Hyperlink] {
        &self.hyperlinks
    }

    // === Drawing ===

    /// The drawing patriarch, if the sheet has one
    pub fn drawing_patriarch(&self) -> Option<&Patriarch> {
        self.patriarch.as_ref()
    }

    pub fn drawing_patriarch_mut(&mut self) -> Option<&mut Patriarch> {
        self.patriarch.as_mut()
    }

    /// Get the drawing patriarch, creating an empty one on first use
    pub fn create_drawing_patriarch(&mut self) -> &mut Patriarch {
        self.patriarch.get_or_insert_with(Patriarch::new)
    }

    // === Row shifting ===

    /// Move rows `first..=last` by `n` rows (negative moves up).
    ///
    /// Cells, row settings, merged regions fully inside the block, comments
    /// and hyperlinks travel with the rows. Whatever was in the destination
    /// is overwritten. Formula text is not touched; see the returned
    /// [`RowShift`].
    pub fn shift_rows(&mut self, first: u32, last: u32, n: i64) -> Result<RowShift> {
        if first > last {
            return Err(Error::invalid_argument(format!(
                "first row {} is after last row {}",
                first, last
            )));
        }
        let dest_first = first as i64 + n;
        let dest_last = last as i64 + n;
        if dest_first < 0 || dest_last >= MAX_ROWS as i64 {
            return Err(Error::invalid_argument(format!(
                "shifting rows {}..={} by {} leaves the sheet",
                first + 1,
                last + 1,
                n
            )));
        }
        let shift = RowShift {
            first,
            last,
            delta: n,
        };
        if n == 0 {
            return Ok(shift);
        }

        self.cells.shift_rows(first, last, n);

        let block = |r: &CellRange| r.start.row >= first && r.end.row <= last;
        let dest = CellRange::from_indices(shift.dest_first(), 0, shift.dest_last(), MAX_COLS - 1);
        let regions: Vec<CellRange> = self
            .cells
            .merged_regions()
            .iter()
            .filter_map(|r| {
                if block(r) {
                    r.offset_rows(n)
                } else if r.overlaps(&dest) {
                    None
                } else {
                    Some(*r)
                }
            })
            .collect();
        self.cells.set_merged_regions(regions);

        let comments = std::mem::take(&mut self.comments);
        let (moving, staying): (Vec<_>, Vec<_>) = comments
            .into_iter()
            .partition(|((r, _), _)| shift.moved(*r).is_some());
        self.comments = staying
            .into_iter()
            .filter(|((r, _), _)| !shift.overwritten(*r))
            .collect();
        for ((r, c), mut comment) in moving {
            if let Some(anchor) = comment.anchor.and_then(|a| a.offset_rows(n)) {
                comment.anchor = Some(anchor);
            }
            let row = (r as i64 + n) as u32;
            self.comments.insert((row, c), comment);
        }

        let links = std::mem::take(&mut self.hyperlinks);
        self.hyperlinks = links
            .into_iter()
            .filter_map(|mut h| {
                if block(&h.range) {
                    h.range = h.range.offset_rows(n)?;
                    Some(h)
                } else if h.range.overlaps(&dest) {
                    None
                } else {
                    Some(h)
                }
            })
            .collect();

        log::debug!(
            "sheet '{}': shifted rows {}..={} by {}",
            self.name,
            first,
            last,
            n
        );
        Ok(shift)
    }

    // === Cells ===

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    /// Check if the worksheet is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over all non-empty cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter()
    }

    /// Iterate over all formula cells: (row, col, formula_text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells.iter().filter_map(|(row, col, cell)| {
            cell.value.formula_text().map(|text| (row, col, text))
        })
    }

    /// Get the formula text at a cell position (if it's a formula)
    pub fn get_formula_at(&self, row: u32, col: u16) -> Option<&str> {
        self.cells
            .get(row, col)
            .and_then(|cell| cell.value.formula_text())
    }

    /// Replace the formula text of a formula cell, keeping its cached value
    pub fn set_formula_text(&mut self, row: u32, col: u16, new_text: String) -> Result<()> {
        let cell = self
            .cells
            .get_mut(row, col)
            .ok_or_else(|| Error::InvalidAddress(CellAddress::new(row, col).to_string()))?;
        match &mut cell.value {
            CellValue::Formula { text, .. } => {
                *text = new_text;
                Ok(())
            }
            other => Err(Error::InvalidValueType {
                expected: "formula",
                actual: other.type_name(),
            }),
        }
    }

    /// Set the cached result value of a formula cell
    pub fn set_formula_result(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        let cell = self
            .cells
            .get_mut(row, col)
            .ok_or_else(|| Error::InvalidAddress(CellAddress::new(row, col).to_string()))?;

        match &mut cell.value {
            CellValue::Formula { cached_value, .. } => {
                *cached_value = Some(Box::new(value));
                Ok(())
            }
            other => Err(Error::InvalidValueType {
                expected: "formula",
                actual: other.type_name(),
            }),
        }
    }

    /// Get the cached value of a formula cell, or the cell value directly if not a formula
    pub fn get_calculated_value_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(row, col).map(|cell| cell.value.effective_value())
    }
}

/// Check that a position lies on the BIFF8 grid
pub(crate) fn validate_cell_position(row: u32, col: u16) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
    }
    Ok(())
}

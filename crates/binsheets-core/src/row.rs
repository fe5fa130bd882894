//! Row types

use crate::cell::{CellData, CellStorage};

/// Row metadata, the content of a BIFF8 ROW record
#[derive(Debug, Clone, PartialEq)]
pub struct RowInfo {
    /// Height in points
    pub height: f64,
    /// Row is hidden
    pub hidden: bool,
    /// Height differs from the sheet default
    pub custom_height: bool,
    /// Row-level style index (None = no row style)
    pub style_index: Option<u32>,
    /// Outline/grouping level (0-7)
    pub outline_level: u8,
}

impl RowInfo {
    pub(crate) fn from_storage(storage: &CellStorage, row: u32) -> Self {
        Self {
            height: storage.row_height(row),
            hidden: storage.is_row_hidden(row),
            custom_height: storage.custom_row_heights().contains_key(&row),
            style_index: storage.row_style(row),
            outline_level: storage.row_outline_level(row),
        }
    }

    /// Check if this row has any custom settings
    pub fn has_custom_settings(&self) -> bool {
        self.custom_height || self.hidden || self.outline_level > 0 || self.style_index.is_some()
    }

    /// Height in twips (1/20 point)
    pub fn height_twips(&self) -> u16 {
        (self.height * 20.0).round().clamp(0.0, 8192.0) as u16
    }
}

/// Borrowed view of one row: its metadata plus its cells in column order
#[derive(Debug)]
pub struct RowView<'a> {
    /// Row index (0-based)
    pub index: u32,
    info: RowInfo,
    cells: Vec<(u16, &'a CellData)>,
}

impl<'a> RowView<'a> {
    pub(crate) fn new(storage: &'a CellStorage, index: u32) -> Self {
        Self {
            index,
            info: RowInfo::from_storage(storage, index),
            cells: storage.iter_row(index).collect(),
        }
    }

    /// First column holding a cell
    pub fn first_cell_num(&self) -> Option<u16> {
        self.cells.first().map(|(c, _)| *c)
    }

    /// One past the last column holding a cell
    pub fn last_cell_num(&self) -> Option<u16> {
        self.cells.last().map(|(c, _)| c + 1)
    }

    /// Number of stored cells
    pub fn physical_cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Height in points
    pub fn height(&self) -> f64 {
        self.info.height
    }

    pub fn is_hidden(&self) -> bool {
        self.info.hidden
    }

    pub fn info(&self) -> &RowInfo {
        &self.info
    }

    /// Get a cell by column index
    pub fn cell(&self, col: u16) -> Option<&'a CellData> {
        self.cells
            .binary_search_by_key(&col, |(c, _)| *c)
            .ok()
            .map(|i| self.cells[i].1)
    }

    /// Cells in column order
    pub fn cells(&self) -> impl Iterator<Item = (u16, &'a CellData)> + '_ {
        self.cells.iter().copied()
    }

    /// Check if row has any cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;

    #[test]
    fn test_row_view_cell_numbers() {
        let mut storage = CellStorage::new();
        storage.set(3, 2, CellData::new(CellValue::Number(1.0)));
        storage.set(3, 7, CellData::new(CellValue::Number(2.0)));
        storage.set_row_height(3, 25.0);

        let row = RowView::new(&storage, 3);
        assert_eq!(row.first_cell_num(), Some(2));
        assert_eq!(row.last_cell_num(), Some(8));
        assert_eq!(row.physical_cell_count(), 2);
        assert_eq!(row.height(), 25.0);
        assert!(row.info().custom_height);
        assert!(row.cell(7).is_some());
        assert!(row.cell(3).is_none());
    }

    #[test]
    fn test_empty_row_view() {
        let storage = CellStorage::new();
        let row = RowView::new(&storage, 0);
        assert_eq!(row.first_cell_num(), None);
        assert_eq!(row.last_cell_num(), None);
        assert!(row.is_empty());
        assert!(!row.info().has_custom_settings());
        assert_eq!(row.info().height_twips(), 255);
    }
}

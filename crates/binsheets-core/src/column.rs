//! Column types

use crate::cell::CellStorage;

/// Column metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Width in characters
    pub width: f64,
    /// Column is hidden
    pub hidden: bool,
    /// Column-level style index (None = no column style)
    pub style_index: Option<u32>,
    /// Outline/grouping level (0-7)
    pub outline_level: u8,
}

impl ColumnInfo {
    pub(crate) fn from_storage(storage: &CellStorage, col: u16) -> Self {
        Self {
            width: storage.column_width(col),
            hidden: storage.is_column_hidden(col),
            style_index: storage.column_style(col),
            outline_level: storage.column_outline_level(col),
        }
    }

    /// Width in 1/256 of a character, as stored in COLINFO
    pub fn width_units(&self) -> u16 {
        (self.width * 256.0).round().clamp(0.0, 65535.0) as u16
    }
}

/// A run of adjacent columns sharing the same settings (one COLINFO record)
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    /// Start column index
    pub min: u16,
    /// End column index (inclusive)
    pub max: u16,
    pub info: ColumnInfo,
}

impl ColumnData {
    /// Collect the formatted columns of a sheet into runs of equal settings
    pub fn runs(storage: &CellStorage) -> Vec<ColumnData> {
        let mut runs: Vec<ColumnData> = Vec::new();
        for col in storage.formatted_column_indices() {
            let info = ColumnInfo::from_storage(storage, col);
            match runs.last_mut() {
                Some(run) if run.max + 1 == col && run.info == info => run.max = col,
                _ => runs.push(ColumnData {
                    min: col,
                    max: col,
                    info,
                }),
            }
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_merge_adjacent_equal_columns() {
        let mut storage = CellStorage::new();
        storage.set_column_width(1, 20.0);
        storage.set_column_width(2, 20.0);
        storage.set_column_width(3, 10.0);
        storage.set_column_hidden(5, true);

        let runs = ColumnData::runs(&storage);
        assert_eq!(runs.len(), 3);
        assert_eq!((runs[0].min, runs[0].max), (1, 2));
        assert_eq!(runs[0].info.width_units(), 5120);
        assert_eq!((runs[1].min, runs[1].max), (3, 3));
        assert!(runs[2].info.hidden);
    }
}

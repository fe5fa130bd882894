//! Per-sheet style interning

use super::Style;
use ahash::AHashMap;

/// Interned styles of one worksheet
///
/// Cells store a `u32` index into the pool; index 0 is always the default
/// style. The XLS writer merges the pools of all sheets into one XF table,
/// so equal styles on different sheets share a single XF record.
#[derive(Debug, Clone)]
pub struct StylePool {
    styles: Vec<Style>,
    lookup: AHashMap<Style, u32>,
}

impl StylePool {
    /// Create a pool holding only the default style
    pub fn new() -> Self {
        let mut lookup = AHashMap::new();
        lookup.insert(Style::default(), 0);
        Self {
            styles: vec![Style::default()],
            lookup,
        }
    }

    /// Index of `style`, interning it on first use
    pub fn get_or_insert(&mut self, style: Style) -> u32 {
        if let Some(&idx) = self.lookup.get(&style) {
            return idx;
        }
        let idx = self.styles.len() as u32;
        self.lookup.insert(style.clone(), idx);
        self.styles.push(style);
        idx
    }

    pub fn get(&self, index: u32) -> Option<&Style> {
        self.styles.get(index as usize)
    }

    /// Number of styles, the default included
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// True while only the default style is present
    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }

    /// Styles with their indices, default first
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Style)> {
        self.styles.iter().enumerate().map(|(i, s)| (i as u32, s))
    }
}

impl Default for StylePool {
    fn default() -> Self {
        Self::new()
    }
}

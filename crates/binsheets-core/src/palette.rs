//! Workbook color palette
//!
//! BIFF8 cell and font colors are indices into a 64-entry palette. Entries
//! 0-7 are fixed EGA colors, 8-63 are the 56 user-modifiable slots that a
//! PALETTE record overrides, and 0x40/0x41 are the system foreground and
//! background colors.

use crate::error::{Error, Result};

/// First index of the modifiable palette range
pub const FIRST_CUSTOM_INDEX: u8 = 8;
/// Last index of the modifiable palette range
pub const LAST_CUSTOM_INDEX: u8 = 63;
/// System window text color
pub const SYSTEM_FOREGROUND: u8 = 0x40;
/// System window background color
pub const SYSTEM_BACKGROUND: u8 = 0x41;
/// "Automatic" font color
pub const AUTOMATIC_FONT: u16 = 0x7FFF;

/// Default BIFF8 palette (indices 8-63)
pub const DEFAULT_PALETTE: [(u8, u8, u8); 56] = [
    (0, 0, 0),       //  8: Black
    (255, 255, 255), //  9: White
    (255, 0, 0),     // 10: Red
    (0, 255, 0),     // 11: Bright Green
    (0, 0, 255),     // 12: Blue
    (255, 255, 0),   // 13: Yellow
    (255, 0, 255),   // 14: Pink
    (0, 255, 255),   // 15: Turquoise
    (128, 0, 0),     // 16: Dark Red
    (0, 128, 0),     // 17: Green
    (0, 0, 128),     // 18: Dark Blue
    (128, 128, 0),   // 19: Dark Yellow
    (128, 0, 128),   // 20: Violet
    (0, 128, 128),   // 21: Teal
    (192, 192, 192), // 22: Silver (25% Gray)
    (128, 128, 128), // 23: Gray (50% Gray)
    (153, 153, 255), // 24: Periwinkle
    (153, 51, 102),  // 25: Plum
    (255, 255, 204), // 26: Ivory
    (204, 255, 255), // 27: Light Turquoise
    (102, 0, 102),   // 28: Dark Purple
    (255, 128, 128), // 29: Coral
    (0, 102, 204),   // 30: Ocean Blue
    (204, 204, 255), // 31: Ice Blue
    (0, 0, 128),     // 32: Dark Blue
    (255, 0, 255),   // 33: Pink
    (255, 255, 0),   // 34: Yellow
    (0, 255, 255),   // 35: Turquoise
    (128, 0, 128),   // 36: Violet
    (128, 0, 0),     // 37: Dark Red
    (0, 128, 128),   // 38: Teal
    (0, 0, 255),     // 39: Blue
    (0, 204, 255),   // 40: Sky Blue
    (204, 255, 255), // 41: Light Turquoise
    (204, 255, 204), // 42: Light Green
    (255, 255, 153), // 43: Light Yellow
    (153, 204, 255), // 44: Pale Blue
    (255, 153, 204), // 45: Rose
    (204, 153, 255), // 46: Lavender
    (255, 204, 153), // 47: Tan
    (51, 102, 255),  // 48: Light Blue
    (51, 204, 204),  // 49: Aqua
    (153, 204, 0),   // 50: Lime
    (255, 204, 0),   // 51: Gold
    (255, 153, 0),   // 52: Light Orange
    (255, 102, 0),   // 53: Orange
    (102, 102, 153), // 54: Blue-Gray
    (150, 150, 150), // 55: 40% Gray
    (0, 51, 102),    // 56: Dark Teal
    (51, 153, 102),  // 57: Sea Green
    (0, 51, 0),      // 58: Dark Green
    (51, 51, 0),     // 59: Olive Green
    (153, 51, 0),    // 60: Brown
    (153, 51, 51),   // 61: Dark Rose
    (51, 51, 153),   // 62: Indigo
    (51, 51, 51),    // 63: 80% Gray
];

const EGA: [(u8, u8, u8); 8] = [
    (0, 0, 0),
    (255, 255, 255),
    (255, 0, 0),
    (0, 255, 0),
    (0, 0, 255),
    (255, 255, 0),
    (255, 0, 255),
    (0, 255, 255),
];

/// Color of a palette index in an unmodified workbook
pub fn default_color(index: u8) -> Option<(u8, u8, u8)> {
    match index {
        0..=7 => Some(EGA[index as usize]),
        FIRST_CUSTOM_INDEX..=LAST_CUSTOM_INDEX => {
            Some(DEFAULT_PALETTE[(index - FIRST_CUSTOM_INDEX) as usize])
        }
        SYSTEM_FOREGROUND => Some((0, 0, 0)),
        SYSTEM_BACKGROUND => Some((255, 255, 255)),
        _ => None,
    }
}

/// The modifiable part of a workbook palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [(u8, u8, u8); 56],
    /// Slots handed out by `add_color` or set explicitly
    assigned: [bool; 56],
}

impl Palette {
    /// Create a palette holding the BIFF8 defaults
    pub fn new() -> Self {
        Self {
            colors: DEFAULT_PALETTE,
            assigned: [false; 56],
        }
    }

    /// Get the color at a palette index
    pub fn color(&self, index: u8) -> Option<(u8, u8, u8)> {
        match index {
            FIRST_CUSTOM_INDEX..=LAST_CUSTOM_INDEX => {
                Some(self.colors[(index - FIRST_CUSTOM_INDEX) as usize])
            }
            other => default_color(other),
        }
    }

    /// Replace the color at `index` (8-63)
    pub fn set_color_at_index(&mut self, index: u8, r: u8, g: u8, b: u8) -> Result<()> {
        if !(FIRST_CUSTOM_INDEX..=LAST_CUSTOM_INDEX).contains(&index) {
            return Err(Error::InvalidArgument(format!(
                "palette index {} outside {}..={}",
                index, FIRST_CUSTOM_INDEX, LAST_CUSTOM_INDEX
            )));
        }
        let slot = (index - FIRST_CUSTOM_INDEX) as usize;
        self.colors[slot] = (r, g, b);
        self.assigned[slot] = true;
        Ok(())
    }

    /// Find the first index holding exactly this color
    pub fn find_color(&self, r: u8, g: u8, b: u8) -> Option<u8> {
        self.colors
            .iter()
            .position(|&c| c == (r, g, b))
            .map(|p| p as u8 + FIRST_CUSTOM_INDEX)
    }

    /// Find the index whose color is nearest to the given one
    pub fn find_similar_color(&self, r: u8, g: u8, b: u8) -> u8 {
        let mut best = FIRST_CUSTOM_INDEX;
        let mut best_distance = u32::MAX;
        for (i, &(pr, pg, pb)) in self.colors.iter().enumerate() {
            let dr = pr as i32 - r as i32;
            let dg = pg as i32 - g as i32;
            let db = pb as i32 - b as i32;
            let distance = (dr * dr + dg * dg + db * db) as u32;
            if distance < best_distance {
                best_distance = distance;
                best = i as u8 + FIRST_CUSTOM_INDEX;
            }
        }
        best
    }

    /// Return the index of this color, claiming a free slot if it is not present.
    ///
    /// A slot is free while it still holds its default color and has never
    /// been assigned.
    pub fn add_color(&mut self, r: u8, g: u8, b: u8) -> Result<u8> {
        if let Some(index) = self.find_color(r, g, b) {
            return Ok(index);
        }
        let slot = (0..56)
            .find(|&i| !self.assigned[i] && self.colors[i] == DEFAULT_PALETTE[i])
            .ok_or(Error::PaletteFull(r, g, b))?;
        self.colors[slot] = (r, g, b);
        self.assigned[slot] = true;
        Ok(slot as u8 + FIRST_CUSTOM_INDEX)
    }

    /// Whether any slot differs from the default palette
    pub fn is_modified(&self) -> bool {
        self.colors != DEFAULT_PALETTE
    }

    /// The 56 modifiable colors in index order (8-63)
    pub fn colors(&self) -> &[(u8, u8, u8); 56] {
        &self.colors
    }

    /// Load colors from a PALETTE record body. Extra entries are ignored.
    pub fn load(&mut self, colors: &[(u8, u8, u8)]) {
        for (i, &c) in colors.iter().take(56).enumerate() {
            self.colors[i] = c;
            self.assigned[i] = c != DEFAULT_PALETTE[i];
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lookup() {
        let palette = Palette::new();
        assert_eq!(palette.color(8), Some((0, 0, 0)));
        assert_eq!(palette.color(10), Some((255, 0, 0)));
        assert_eq!(palette.color(63), Some((51, 51, 51)));
        assert_eq!(palette.color(SYSTEM_BACKGROUND), Some((255, 255, 255)));
        assert_eq!(palette.color(0x50), None);
        assert!(!palette.is_modified());
    }

    #[test]
    fn test_set_color_rejects_fixed_indices() {
        let mut palette = Palette::new();
        assert!(palette.set_color_at_index(7, 1, 2, 3).is_err());
        assert!(palette.set_color_at_index(64, 1, 2, 3).is_err());
        palette.set_color_at_index(8, 1, 2, 3).unwrap();
        assert_eq!(palette.color(8), Some((1, 2, 3)));
        assert!(palette.is_modified());
    }

    #[test]
    fn test_find_similar() {
        let palette = Palette::new();
        // Close to pure red
        assert_eq!(palette.find_similar_color(250, 5, 5), 10);
        // Close to 80% gray
        assert_eq!(palette.find_similar_color(50, 50, 52), 63);
    }

    #[test]
    fn test_add_color_reuses_then_claims() {
        let mut palette = Palette::new();
        assert_eq!(palette.add_color(255, 0, 0).unwrap(), 10);

        let idx = palette.add_color(1, 2, 3).unwrap();
        assert_eq!(idx, 8);
        assert_eq!(palette.add_color(1, 2, 3).unwrap(), 8);
        assert_eq!(palette.add_color(4, 5, 6).unwrap(), 9);
    }

    #[test]
    fn test_palette_full() {
        let mut palette = Palette::new();
        for i in 0..56u8 {
            palette.add_color(i, 200, 201).unwrap();
        }
        assert!(matches!(
            palette.add_color(7, 7, 7),
            Err(Error::PaletteFull(7, 7, 7))
        ));
    }
}

//! Text alignment and its BIFF8 XF encoding

/// Text alignment settings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Alignment {
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
    pub wrap_text: bool,
    pub shrink_to_fit: bool,
    /// Indent level (0-15, the XF field is four bits wide)
    pub indent: u8,
    /// Degrees counter-clockwise (-90 to 90), or [`Alignment::VERTICAL_TEXT`]
    pub rotation: i16,
    pub reading_order: ReadingOrder,
}

impl Alignment {
    /// Rotation value for letters stacked top to bottom
    pub const VERTICAL_TEXT: i16 = 255;

    /// Largest indent an XF record can hold
    pub const MAX_INDENT: u8 = 15;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_horizontal(mut self, align: HorizontalAlignment) -> Self {
        self.horizontal = align;
        self
    }

    pub fn with_vertical(mut self, align: VerticalAlignment) -> Self {
        self.vertical = align;
        self
    }

    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.wrap_text = wrap;
        self
    }

    /// Set the indent level, capped at [`Alignment::MAX_INDENT`]
    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent.min(Self::MAX_INDENT);
        self
    }

    /// Set the rotation, clamped to -90..=90 degrees
    pub fn with_rotation(mut self, degrees: i16) -> Self {
        self.rotation = degrees.clamp(-90, 90);
        self
    }

    pub fn vertical_text(mut self) -> Self {
        self.rotation = Self::VERTICAL_TEXT;
        self
    }

    /// XF `trot` byte: 0-90 counter-clockwise, 91-180 clockwise as
    /// `90 + degrees`, 255 for vertical text
    pub fn biff_rotation(&self) -> u8 {
        match self.rotation {
            Self::VERTICAL_TEXT => 255,
            r @ 0..=90 => r as u8,
            r @ -90..=-1 => (90 - r) as u8,
            _ => 0,
        }
    }

    /// Inverse of [`biff_rotation`](Self::biff_rotation); unknown codes read
    /// as no rotation
    pub fn rotation_from_biff(code: u8) -> i16 {
        match code {
            r @ 0..=90 => r as i16,
            r @ 91..=180 => 90 - r as i16,
            255 => Self::VERTICAL_TEXT,
            _ => 0,
        }
    }
}

/// Horizontal alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlignment {
    /// Text left, numbers right
    #[default]
    General,
    Left,
    Center,
    Right,
    /// Repeat the content across the cell
    Fill,
    Justify,
    /// Center across the selection
    CenterContinuous,
    Distributed,
}

impl HorizontalAlignment {
    /// BIFF8 `alc` code (0-7)
    pub fn biff_code(&self) -> u8 {
        match self {
            HorizontalAlignment::General => 0,
            HorizontalAlignment::Left => 1,
            HorizontalAlignment::Center => 2,
            HorizontalAlignment::Right => 3,
            HorizontalAlignment::Fill => 4,
            HorizontalAlignment::Justify => 5,
            HorizontalAlignment::CenterContinuous => 6,
            HorizontalAlignment::Distributed => 7,
        }
    }

    pub fn from_biff_code(code: u8) -> Self {
        match code {
            1 => HorizontalAlignment::Left,
            2 => HorizontalAlignment::Center,
            3 => HorizontalAlignment::Right,
            4 => HorizontalAlignment::Fill,
            5 => HorizontalAlignment::Justify,
            6 => HorizontalAlignment::CenterContinuous,
            7 => HorizontalAlignment::Distributed,
            _ => HorizontalAlignment::General,
        }
    }
}

/// Vertical alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlignment {
    Top,
    Center,
    #[default]
    Bottom,
    Justify,
    Distributed,
}

impl VerticalAlignment {
    /// BIFF8 `alcV` code (0-4)
    pub fn biff_code(&self) -> u8 {
        match self {
            VerticalAlignment::Top => 0,
            VerticalAlignment::Center => 1,
            VerticalAlignment::Bottom => 2,
            VerticalAlignment::Justify => 3,
            VerticalAlignment::Distributed => 4,
        }
    }

    pub fn from_biff_code(code: u8) -> Self {
        match code {
            0 => VerticalAlignment::Top,
            1 => VerticalAlignment::Center,
            3 => VerticalAlignment::Justify,
            4 => VerticalAlignment::Distributed,
            _ => VerticalAlignment::Bottom,
        }
    }
}

/// Reading order for text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadingOrder {
    #[default]
    ContextDependent,
    LeftToRight,
    RightToLeft,
}

impl ReadingOrder {
    /// BIFF8 `iReadOrder` code (0-2)
    pub fn biff_code(&self) -> u8 {
        match self {
            ReadingOrder::ContextDependent => 0,
            ReadingOrder::LeftToRight => 1,
            ReadingOrder::RightToLeft => 2,
        }
    }

    pub fn from_biff_code(code: u8) -> Self {
        match code {
            1 => ReadingOrder::LeftToRight,
            2 => ReadingOrder::RightToLeft,
            _ => ReadingOrder::ContextDependent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_codes() {
        for r in [0i16, 1, 45, 90, -1, -45, -90, Alignment::VERTICAL_TEXT] {
            let a = Alignment {
                rotation: r,
                ..Alignment::default()
            };
            assert_eq!(Alignment::rotation_from_biff(a.biff_rotation()), r);
        }
        assert_eq!(Alignment::new().with_rotation(-90).biff_rotation(), 180);
        assert_eq!(Alignment::new().with_rotation(120).rotation, 90);
        assert_eq!(Alignment::rotation_from_biff(200), 0);
    }

    #[test]
    fn test_alignment_codes() {
        assert_eq!(HorizontalAlignment::CenterContinuous.biff_code(), 6);
        assert_eq!(
            HorizontalAlignment::from_biff_code(7),
            HorizontalAlignment::Distributed
        );
        assert_eq!(HorizontalAlignment::from_biff_code(9), HorizontalAlignment::General);
        assert_eq!(VerticalAlignment::default().biff_code(), 2);
        assert_eq!(VerticalAlignment::from_biff_code(0), VerticalAlignment::Top);
        assert_eq!(VerticalAlignment::from_biff_code(6), VerticalAlignment::Bottom);
        assert_eq!(ReadingOrder::from_biff_code(2), ReadingOrder::RightToLeft);
        assert_eq!(ReadingOrder::LeftToRight.biff_code(), 1);
    }

    #[test]
    fn test_indent_is_capped() {
        assert_eq!(Alignment::new().with_indent(3).indent, 3);
        assert_eq!(Alignment::new().with_indent(40).indent, Alignment::MAX_INDENT);
    }
}

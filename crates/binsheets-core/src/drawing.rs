//! Drawing layer: anchors, shapes, pictures and the sheet patriarch
//!
//! Every sheet has at most one [`Patriarch`], the top-level shape group that
//! owns all drawn shapes. Top-level shapes are positioned with a
//! [`ClientAnchor`] (cell plus offset); shapes inside a group use a
//! [`ChildAnchor`] in the group's own coordinate space.
//!
//! ## Example
//!
//! ```rust
//! use binsheets_core::{ClientAnchor, ShapeKind, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! let patriarch = sheet.create_drawing_patriarch();
//!
//! let anchor = ClientAnchor::new(0, 0, 0, 0, 1, 1, 4, 6).unwrap();
//! patriarch.create_simple_shape(anchor, ShapeKind::Oval);
//! assert_eq!(patriarch.shape_count(), 1);
//! ```

use crate::error::{Error, Result};
use crate::style::Color;
use crate::{MAX_COLS, MAX_ROWS};

/// How a shape reacts when the cells under it are resized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnchorType {
    /// Move and resize with the cells
    #[default]
    MoveAndResize,
    /// Move with the cells but keep the size
    MoveDontResize,
    /// Stay put
    DontMoveOrResize,
}

impl AnchorType {
    /// Flag value stored in the client anchor atom
    pub fn flag(self) -> u16 {
        match self {
            AnchorType::MoveAndResize => 0,
            AnchorType::MoveDontResize => 2,
            AnchorType::DontMoveOrResize => 3,
        }
    }

    /// Decode the flag of a client anchor atom. Unknown values mean move and resize.
    pub fn from_flag(flag: u16) -> Self {
        match flag {
            2 => AnchorType::MoveDontResize,
            3 => AnchorType::DontMoveOrResize,
            _ => AnchorType::MoveAndResize,
        }
    }
}

/// Position of a top-level shape: two cell corners plus offsets
///
/// `dx` offsets are in 1/1024 of the column width and `dy` offsets in 1/256
/// of the row height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientAnchor {
    pub col1: u16,
    pub dx1: u16,
    pub row1: u32,
    pub dy1: u16,
    pub col2: u16,
    pub dx2: u16,
    pub row2: u32,
    pub dy2: u16,
    pub anchor_type: AnchorType,
}

impl ClientAnchor {
    /// Largest horizontal offset within a cell
    pub const MAX_DX: u16 = 1023;
    /// Largest vertical offset within a cell
    pub const MAX_DY: u16 = 255;

    /// Create an anchor from offsets and cell corners.
    ///
    /// Corners given in reverse order are swapped, together with their
    /// offsets, so that `(col1, row1)` is always the top-left corner.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dx1: u16,
        dy1: u16,
        dx2: u16,
        dy2: u16,
        col1: u16,
        row1: u32,
        col2: u16,
        row2: u32,
    ) -> Result<Self> {
        for dx in [dx1, dx2] {
            if dx > Self::MAX_DX {
                return Err(Error::invalid_argument(format!(
                    "dx {} exceeds {}",
                    dx,
                    Self::MAX_DX
                )));
            }
        }
        for dy in [dy1, dy2] {
            if dy > Self::MAX_DY {
                return Err(Error::invalid_argument(format!(
                    "dy {} exceeds {}",
                    dy,
                    Self::MAX_DY
                )));
            }
        }
        for col in [col1, col2] {
            if col >= MAX_COLS {
                return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
            }
        }
        for row in [row1, row2] {
            if row >= MAX_ROWS {
                return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
            }
        }

        let (col1, dx1, col2, dx2) = if col1 > col2 {
            (col2, dx2, col1, dx1)
        } else {
            (col1, dx1, col2, dx2)
        };
        let (row1, dy1, row2, dy2) = if row1 > row2 {
            (row2, dy2, row1, dy1)
        } else {
            (row1, dy1, row2, dy2)
        };

        Ok(Self {
            col1,
            dx1,
            row1,
            dy1,
            col2,
            dx2,
            row2,
            dy2,
            anchor_type: AnchorType::MoveAndResize,
        })
    }

    /// Anchor covering whole cells from `(row1, col1)` to `(row2, col2)`
    pub fn from_cells(row1: u32, col1: u16, row2: u32, col2: u16) -> Result<Self> {
        Self::new(0, 0, 0, 0, col1, row1, col2, row2)
    }

    /// The default box of a new comment on `(row, col)`.
    ///
    /// The box starts one column to the right of the cell, is two columns
    /// wide and four rows tall, and is clipped to the sheet.
    pub fn for_comment(row: u32, col: u16) -> Self {
        let last_col = MAX_COLS - 1;
        let last_row = MAX_ROWS - 1;
        let col1 = col.saturating_add(1).min(last_col);
        let col2 = col.saturating_add(3).min(last_col);
        let row2 = row.saturating_add(4).min(last_row);
        Self {
            col1,
            dx1: 0,
            row1: row,
            dy1: 0,
            col2,
            dx2: 0,
            row2,
            dy2: 0,
            anchor_type: AnchorType::MoveAndResize,
        }
    }

    /// Set the anchor type
    pub fn with_anchor_type(mut self, anchor_type: AnchorType) -> Self {
        self.anchor_type = anchor_type;
        self
    }

    /// Top-left corner as `(row, col)`
    pub fn top_left(&self) -> (u32, u16) {
        (self.row1, self.col1)
    }

    /// The same anchor moved by `delta` rows, or `None` if it would leave the sheet
    pub fn offset_rows(&self, delta: i64) -> Option<Self> {
        let row1 = self.row1 as i64 + delta;
        let row2 = self.row2 as i64 + delta;
        if row1 < 0 || row2 >= MAX_ROWS as i64 {
            return None;
        }
        Some(Self {
            row1: row1 as u32,
            row2: row2 as u32,
            ..*self
        })
    }

    /// Smallest anchor that covers both anchors
    pub fn union(&self, other: &ClientAnchor) -> ClientAnchor {
        let (col1, dx1) = (self.col1, self.dx1).min((other.col1, other.dx1));
        let (row1, dy1) = (self.row1, self.dy1).min((other.row1, other.dy1));
        let (col2, dx2) = (self.col2, self.dx2).max((other.col2, other.dx2));
        let (row2, dy2) = (self.row2, self.dy2).max((other.row2, other.dy2));
        ClientAnchor {
            col1,
            dx1,
            row1,
            dy1,
            col2,
            dx2,
            row2,
            dy2,
            anchor_type: self.anchor_type,
        }
    }
}

/// Position of a shape inside a group, in the group's coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChildAnchor {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl ChildAnchor {
    /// Create a child anchor, normalising reversed corners
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// Where a shape sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeAnchor {
    /// Top-level shape anchored to cells
    Client(ClientAnchor),
    /// Shape inside a group
    Child(ChildAnchor),
}

impl ShapeAnchor {
    /// The client anchor of a top-level shape
    pub fn as_client(&self) -> Option<&ClientAnchor> {
        match self {
            ShapeAnchor::Client(a) => Some(a),
            ShapeAnchor::Child(_) => None,
        }
    }

    /// The child anchor of a grouped shape
    pub fn as_child(&self) -> Option<&ChildAnchor> {
        match self {
            ShapeAnchor::Child(a) => Some(a),
            ShapeAnchor::Client(_) => None,
        }
    }
}

/// Outline dash style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineStyle {
    #[default]
    Solid,
    DashSys,
    DotSys,
    DashDotSys,
    DashDotDotSys,
    DotGel,
    DashGel,
    LongDashGel,
    DashDotGel,
    LongDashDotGel,
    LongDashDotDotGel,
    /// No outline at all
    None,
}

impl LineStyle {
    /// The escher `lineDashing` value; `None` draws no line
    pub fn dashing(self) -> Option<u32> {
        Some(match self {
            LineStyle::Solid => 0,
            LineStyle::DashSys => 1,
            LineStyle::DotSys => 2,
            LineStyle::DashDotSys => 3,
            LineStyle::DashDotDotSys => 4,
            LineStyle::DotGel => 5,
            LineStyle::DashGel => 6,
            LineStyle::LongDashGel => 7,
            LineStyle::DashDotGel => 8,
            LineStyle::LongDashDotGel => 9,
            LineStyle::LongDashDotDotGel => 10,
            LineStyle::None => return None,
        })
    }

    /// Decode an escher `lineDashing` value
    pub fn from_dashing(value: u32) -> Self {
        match value {
            1 => LineStyle::DashSys,
            2 => LineStyle::DotSys,
            3 => LineStyle::DashDotSys,
            4 => LineStyle::DashDotDotSys,
            5 => LineStyle::DotGel,
            6 => LineStyle::DashGel,
            7 => LineStyle::LongDashGel,
            8 => LineStyle::DashDotGel,
            9 => LineStyle::LongDashDotGel,
            10 => LineStyle::LongDashDotDotGel,
            _ => LineStyle::Solid,
        }
    }
}

/// What a shape draws
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeKind {
    Rectangle,
    Oval,
    Line,
    Arc,
    /// Rectangle holding text
    TextBox { text: String },
    /// Picture referencing a workbook picture by its 1-based index
    Picture { picture_index: u32 },
    /// Closed or open polyline, points in the shape's own coordinates
    Polygon { points: Vec<(i32, i32)> },
    /// Group of shapes positioned with child anchors inside `coords`
    Group {
        coords: ChildAnchor,
        children: Vec<Shape>,
    },
}

impl ShapeKind {
    /// A group with the default 1024x256 coordinate space
    pub fn empty_group() -> Self {
        ShapeKind::Group {
            coords: ChildAnchor::new(0, 0, 1023, 255),
            children: Vec::new(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ShapeKind::Group { .. })
    }
}

/// A drawn shape with its outline and fill properties
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    pub kind: ShapeKind,
    pub anchor: ShapeAnchor,
    /// Outline color (`Auto` is the system foreground color)
    pub line_color: Color,
    /// Fill color (`Auto` is white)
    pub fill_color: Color,
    pub no_fill: bool,
    /// Outline width in EMU
    pub line_width: u32,
    pub line_style: LineStyle,
    /// Shape id assigned when the sheet was read or written
    pub shape_id: Option<u32>,
}

impl Shape {
    /// Default outline width (0.75pt)
    pub const DEFAULT_LINE_WIDTH: u32 = 9525;

    /// Create a shape with default outline and fill
    pub fn new(kind: ShapeKind, anchor: ShapeAnchor) -> Self {
        Self {
            kind,
            anchor,
            line_color: Color::Auto,
            fill_color: Color::Auto,
            no_fill: false,
            line_width: Self::DEFAULT_LINE_WIDTH,
            line_style: LineStyle::Solid,
            shape_id: None,
        }
    }

    /// Children of a group shape
    pub fn children(&self) -> &[Shape] {
        match &self.kind {
            ShapeKind::Group { children, .. } => children,
            _ => &[],
        }
    }

    /// Number of shapes in this subtree, the shape itself included
    pub fn count_all(&self) -> usize {
        1 + self.children().iter().map(Shape::count_all).sum::<usize>()
    }
}

/// Image format of an embedded picture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PictureFormat {
    Emf,
    Wmf,
    Pict,
    Jpeg,
    Png,
    Dib,
}

impl PictureFormat {
    /// Escher blip type (the `btWin32` field of a BSE record)
    pub fn blip_type(self) -> u8 {
        match self {
            PictureFormat::Emf => 2,
            PictureFormat::Wmf => 3,
            PictureFormat::Pict => 4,
            PictureFormat::Jpeg => 5,
            PictureFormat::Png => 6,
            PictureFormat::Dib => 7,
        }
    }

    /// Decode an escher blip type
    pub fn from_blip_type(value: u8) -> Option<Self> {
        Some(match value {
            2 => PictureFormat::Emf,
            3 => PictureFormat::Wmf,
            4 => PictureFormat::Pict,
            5 => PictureFormat::Jpeg,
            6 => PictureFormat::Png,
            7 => PictureFormat::Dib,
            _ => return None,
        })
    }

    /// Whether the blip stores a metafile header ahead of its data
    pub fn is_metafile(self) -> bool {
        matches!(self, PictureFormat::Emf | PictureFormat::Wmf | PictureFormat::Pict)
    }
}

/// Picture bytes stored in the workbook
///
/// Bitmap formats hold the raw image file. Metafile formats hold the blip
/// body after its uid: the metafile header followed by the (possibly
/// compressed) data. The bytes are never decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PictureData {
    pub format: PictureFormat,
    pub data: Vec<u8>,
}

impl PictureData {
    pub fn new(format: PictureFormat, data: Vec<u8>) -> Self {
        Self { format, data }
    }
}

/// Top-level shape container of a sheet
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Patriarch {
    shapes: Vec<Shape>,
    /// Coordinate space of the patriarch group
    coords: ChildAnchor,
}

impl Patriarch {
    /// Create an empty patriarch
    pub fn new() -> Self {
        Self {
            shapes: Vec::new(),
            coords: ChildAnchor::new(0, 0, 1023, 255),
        }
    }

    fn push(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    /// Add a top-level shape and return its index
    pub fn create_simple_shape(&mut self, anchor: ClientAnchor, kind: ShapeKind) -> usize {
        self.push(Shape::new(kind, ShapeAnchor::Client(anchor)))
    }

    /// Add a text box
    pub fn create_textbox(&mut self, anchor: ClientAnchor, text: impl Into<String>) -> usize {
        self.create_simple_shape(anchor, ShapeKind::TextBox { text: text.into() })
    }

    /// Add a picture referencing a workbook picture (1-based index)
    pub fn create_picture(&mut self, anchor: ClientAnchor, picture_index: u32) -> usize {
        self.create_simple_shape(anchor, ShapeKind::Picture { picture_index })
    }

    /// Add a polygon with points in its own coordinate space
    pub fn create_polygon(&mut self, anchor: ClientAnchor, points: Vec<(i32, i32)>) -> usize {
        self.create_simple_shape(anchor, ShapeKind::Polygon { points })
    }

    /// Add an empty group
    pub fn create_group(&mut self, anchor: ClientAnchor) -> usize {
        self.create_simple_shape(anchor, ShapeKind::empty_group())
    }

    /// Add a shape to the top-level group at `group` and return its index
    /// within that group
    pub fn create_shape_in_group(
        &mut self,
        group: usize,
        anchor: ChildAnchor,
        kind: ShapeKind,
    ) -> Result<usize> {
        let shape = self
            .shapes
            .get_mut(group)
            .ok_or_else(|| Error::invalid_argument(format!("no shape at index {}", group)))?;
        match &mut shape.kind {
            ShapeKind::Group { children, .. } => {
                children.push(Shape::new(kind, ShapeAnchor::Child(anchor)));
                Ok(children.len() - 1)
            }
            _ => Err(Error::invalid_argument(format!(
                "shape {} is not a group",
                group
            ))),
        }
    }

    /// Set the coordinate space of a group shape
    pub fn set_group_coordinates(&mut self, group: usize, coords: ChildAnchor) -> Result<()> {
        match self.shapes.get_mut(group).map(|s| &mut s.kind) {
            Some(ShapeKind::Group { coords: c, .. }) => {
                *c = coords;
                Ok(())
            }
            _ => Err(Error::invalid_argument(format!(
                "shape {} is not a group",
                group
            ))),
        }
    }

    /// Top-level shapes
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Mutable access to a top-level shape
    pub fn shape_mut(&mut self, index: usize) -> Option<&mut Shape> {
        self.shapes.get_mut(index)
    }

    /// Number of top-level shapes
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of shapes including group members
    pub fn total_shape_count(&self) -> usize {
        self.shapes.iter().map(Shape::count_all).sum()
    }

    /// Remove every shape
    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    /// Coordinate space of the patriarch
    pub fn coordinates(&self) -> ChildAnchor {
        self.coords
    }

    /// Set the coordinate space of the patriarch
    pub fn set_coordinates(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.coords = ChildAnchor::new(x1, y1, x2, y2);
    }

    /// Smallest client anchor covering all top-level shapes
    pub fn bounds(&self) -> Option<ClientAnchor> {
        self.shapes
            .iter()
            .filter_map(|s| s.anchor.as_client())
            .copied()
            .reduce(|acc, a| acc.union(&a))
    }

    /// Restore a shape list read from a file
    pub fn push_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }
}

impl Default for Patriarch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_normalises_corners() {
        let a = ClientAnchor::new(10, 20, 30, 40, 5, 8, 1, 2).unwrap();
        assert_eq!((a.col1, a.dx1, a.col2, a.dx2), (1, 30, 5, 10));
        assert_eq!((a.row1, a.dy1, a.row2, a.dy2), (2, 40, 8, 20));
    }

    #[test]
    fn test_anchor_rejects_offsets() {
        assert!(ClientAnchor::new(1024, 0, 0, 0, 0, 0, 1, 1).is_err());
        assert!(ClientAnchor::new(0, 256, 0, 0, 0, 0, 1, 1).is_err());
        assert!(ClientAnchor::new(0, 0, 0, 0, 256, 0, 1, 1).is_err());
        assert!(ClientAnchor::new(1023, 255, 1023, 255, 0, 0, 1, 1).is_ok());
    }

    #[test]
    fn test_comment_anchor_clipped() {
        let a = ClientAnchor::for_comment(3, 2);
        assert_eq!((a.col1, a.row1, a.col2, a.row2), (3, 3, 5, 7));

        let edge = ClientAnchor::for_comment(MAX_ROWS - 1, MAX_COLS - 1);
        assert_eq!(edge.col2, MAX_COLS - 1);
        assert_eq!(edge.row2, MAX_ROWS - 1);
    }

    #[test]
    fn test_groups() {
        let mut p = Patriarch::new();
        let anchor = ClientAnchor::from_cells(0, 0, 5, 5).unwrap();
        let g = p.create_group(anchor);
        let r = p.create_simple_shape(anchor, ShapeKind::Rectangle);

        assert_eq!(
            p.create_shape_in_group(g, ChildAnchor::new(0, 0, 100, 100), ShapeKind::Oval)
                .unwrap(),
            0
        );
        assert!(p
            .create_shape_in_group(r, ChildAnchor::default(), ShapeKind::Oval)
            .is_err());
        assert!(p
            .create_shape_in_group(9, ChildAnchor::default(), ShapeKind::Oval)
            .is_err());

        assert_eq!(p.shape_count(), 2);
        assert_eq!(p.total_shape_count(), 3);
    }

    #[test]
    fn test_bounds() {
        let mut p = Patriarch::new();
        assert!(p.bounds().is_none());
        p.create_textbox(ClientAnchor::new(10, 0, 0, 0, 1, 1, 2, 2).unwrap(), "a");
        p.create_simple_shape(
            ClientAnchor::new(0, 0, 5, 5, 3, 0, 4, 6).unwrap(),
            ShapeKind::Line,
        );
        let b = p.bounds().unwrap();
        assert_eq!((b.col1, b.dx1, b.row1), (1, 10, 0));
        assert_eq!((b.col2, b.dx2, b.row2, b.dy2), (4, 5, 6, 5));
    }

    #[test]
    fn test_line_style_codes() {
        assert_eq!(LineStyle::None.dashing(), None);
        assert_eq!(LineStyle::from_dashing(6), LineStyle::DashGel);
        assert_eq!(LineStyle::DashGel.dashing(), Some(6));
    }
}

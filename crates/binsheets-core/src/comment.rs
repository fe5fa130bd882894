//! Cell comments (notes)
//!
//! A comment is stored on the sheet keyed by its cell. In a BIFF8 file it is a
//! NOTE record plus a text-box shape in the sheet drawing; the shape's client
//! anchor decides where the comment box is drawn.
//!
//! ## Example
//!
//! ```rust
//! use binsheets_core::{CellComment, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_comment("A1", CellComment::new("Author", "This is a note")).unwrap();
//!
//! let comment = sheet.comment("A1").unwrap().unwrap();
//! assert_eq!(comment.text, "This is a note");
//! ```

use crate::drawing::ClientAnchor;

/// A cell comment/note
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellComment {
    /// Author of the comment
    pub author: String,
    /// Comment text content
    pub text: String,
    /// Whether the comment box is shown without hovering
    pub visible: bool,
    /// Position of the comment box. `None` uses the default box next to the cell.
    pub anchor: Option<ClientAnchor>,
    /// Shape id of the comment box, set when read from or written to a file
    pub shape_id: Option<u32>,
}

impl CellComment {
    /// Create a new comment with the given author and text
    ///
    /// # Example
    ///
    /// ```rust
    /// use binsheets_core::CellComment;
    ///
    /// let comment = CellComment::new("John Doe", "Review this value");
    /// assert_eq!(comment.author, "John Doe");
    /// assert!(!comment.visible);
    /// ```
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            visible: false,
            anchor: None,
            shape_id: None,
        }
    }

    /// Create a comment with just text (empty author)
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(String::new(), text)
    }

    /// Set whether the comment is visible by default
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Place the comment box explicitly
    pub fn with_anchor(mut self, anchor: ClientAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Check if this comment has an author
    pub fn has_author(&self) -> bool {
        !self.author.is_empty()
    }

    /// The comment box for a comment on `(row, col)`
    pub fn anchor_for(&self, row: u32, col: u16) -> ClientAnchor {
        self.anchor
            .unwrap_or_else(|| ClientAnchor::for_comment(row, col))
    }
}

impl Default for CellComment {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

impl std::fmt::Display for CellComment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_author() {
            write!(f, "[{}]: {}", self.author, self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_comment() {
        let comment = CellComment::new("Author", "Text");
        assert_eq!(comment.author, "Author");
        assert_eq!(comment.text, "Text");
        assert!(!comment.visible);
        assert!(comment.anchor.is_none());
    }

    #[test]
    fn test_text_only() {
        let comment = CellComment::text_only("Just text");
        assert_eq!(comment.author, "");
        assert!(!comment.has_author());
    }

    #[test]
    fn test_default_anchor() {
        let comment = CellComment::new("A", "B");
        let anchor = comment.anchor_for(4, 1);
        assert_eq!((anchor.row1, anchor.col1), (4, 2));
        assert_eq!((anchor.row2, anchor.col2), (8, 4));

        let placed = ClientAnchor::from_cells(0, 0, 2, 2).unwrap();
        let comment = comment.with_anchor(placed);
        assert_eq!(comment.anchor_for(4, 1), placed);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellComment::new("John", "Hello").to_string(), "[John]: Hello");
        assert_eq!(CellComment::text_only("Hello").to_string(), "Hello");
    }
}

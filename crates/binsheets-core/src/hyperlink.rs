//! Cell hyperlinks
//!
//! A hyperlink covers a cell range and points at a URL, an e-mail address, a
//! file, or a location inside the workbook. In BIFF8 each one is an HLINK
//! record, optionally followed by an HLINKTOOLTIP.

use crate::cell::CellRange;

/// What a hyperlink points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HyperlinkKind {
    /// Web address
    Url,
    /// Location inside this workbook, like `Sheet2!A1` or a defined name
    Document,
    /// E-mail address
    Email,
    /// Local or network file
    File,
}

/// A hyperlink attached to a cell range
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hyperlink {
    pub kind: HyperlinkKind,
    address: String,
    /// Display text stored with the link
    pub label: Option<String>,
    /// Tooltip shown on hover
    pub tooltip: Option<String>,
    /// Cells covered by the link
    pub range: CellRange,
}

impl Hyperlink {
    fn new(kind: HyperlinkKind, address: String, row: u32, col: u16) -> Self {
        Self {
            kind,
            address,
            label: None,
            tooltip: None,
            range: CellRange::from_indices(row, col, row, col),
        }
    }

    /// Link to a web address
    pub fn url(row: u32, col: u16, url: impl Into<String>) -> Self {
        Self::new(HyperlinkKind::Url, url.into(), row, col)
    }

    /// Link to a location in this workbook
    pub fn document(row: u32, col: u16, location: impl Into<String>) -> Self {
        Self::new(HyperlinkKind::Document, location.into(), row, col)
    }

    /// Link to an e-mail address. A missing `mailto:` prefix is added.
    pub fn email(row: u32, col: u16, address: impl Into<String>) -> Self {
        let address = address.into();
        let address = if has_mailto(&address) {
            address
        } else {
            format!("mailto:{}", address)
        };
        Self::new(HyperlinkKind::Email, address, row, col)
    }

    /// Link to a file
    pub fn file(row: u32, col: u16, path: impl Into<String>) -> Self {
        Self::new(HyperlinkKind::File, path.into(), row, col)
    }

    /// Target of the link. E-mail targets include the `mailto:` prefix.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = address.into();
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Extend the link over a range
    pub fn with_range(mut self, range: CellRange) -> Self {
        self.range = range;
        self
    }

    /// First row covered by the link
    pub fn first_row(&self) -> u32 {
        self.range.start.row
    }

    /// First column covered by the link
    pub fn first_col(&self) -> u16 {
        self.range.start.col
    }
}

pub(crate) fn has_mailto(address: &str) -> bool {
    address
        .get(..7)
        .is_some_and(|p| p.eq_ignore_ascii_case("mailto:"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_prefix() {
        let link = Hyperlink::email(0, 0, "someone@example.com");
        assert_eq!(link.address(), "mailto:someone@example.com");

        let link = Hyperlink::email(0, 0, "MAILTO:x@y.org");
        assert_eq!(link.address(), "MAILTO:x@y.org");
    }

    #[test]
    fn test_constructors_anchor_to_cell() {
        let link = Hyperlink::url(2, 3, "http://poi.apache.org/").with_label("POI");
        assert_eq!(link.kind, HyperlinkKind::Url);
        assert_eq!(link.range.to_string(), "D3");
        assert_eq!(link.label.as_deref(), Some("POI"));

        let link = Hyperlink::document(0, 0, "'Target Sheet'!A1");
        assert_eq!(link.kind, HyperlinkKind::Document);
        assert_eq!(link.address(), "'Target Sheet'!A1");
    }
}

//! Named range definitions
//!
//! Names are kept in definition order. Formulas refer to a name by its
//! 1-based position in this list (the BIFF8 NAME index), so positions stay
//! stable until a name is removed.
//!
//! # Example
//!
//! ```rust
//! use binsheets_core::{NameScope, Workbook};
//!
//! let mut workbook = Workbook::new();
//! workbook.define_name("TaxRate", "Sheet1!$B$1").unwrap();
//! workbook.define_name_for_sheet("TaxRate", "0.08", 0).unwrap();
//!
//! // Sheet scope wins over workbook scope
//! assert_eq!(workbook.get_named_range("taxrate", 0).unwrap().refers_to, "0.08");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cell::CellAddress;
use crate::error::{Error, Result};

/// Longest name Excel accepts
pub const MAX_NAME_LEN: usize = 255;

static NAME_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}_\\][\p{L}\p{N}_.\\?]*$")
        .unwrap_or_else(|e| panic!("invalid name regex: {}", e))
});

static R1C1_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(r[0-9]*)?(c[0-9]*)?$")
        .unwrap_or_else(|e| panic!("invalid R1C1 regex: {}", e))
});

/// Scope of a named range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NameScope {
    /// Available throughout the workbook (global)
    Workbook,
    /// Scoped to a specific sheet (local)
    Sheet(usize),
}

impl NameScope {
    /// Sheet index of a local name
    pub fn sheet(&self) -> Option<usize> {
        match self {
            NameScope::Workbook => None,
            NameScope::Sheet(idx) => Some(*idx),
        }
    }
}

/// Names with a reserved meaning, stored as a one-byte code in BIFF8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuiltinName {
    ConsolidateArea,
    AutoOpen,
    AutoClose,
    Extract,
    Database,
    Criteria,
    PrintArea,
    PrintTitles,
    Recorder,
    DataForm,
    AutoActivate,
    AutoDeactivate,
    SheetTitle,
    FilterDatabase,
}

impl BuiltinName {
    const ALL: [BuiltinName; 14] = [
        BuiltinName::ConsolidateArea,
        BuiltinName::AutoOpen,
        BuiltinName::AutoClose,
        BuiltinName::Extract,
        BuiltinName::Database,
        BuiltinName::Criteria,
        BuiltinName::PrintArea,
        BuiltinName::PrintTitles,
        BuiltinName::Recorder,
        BuiltinName::DataForm,
        BuiltinName::AutoActivate,
        BuiltinName::AutoDeactivate,
        BuiltinName::SheetTitle,
        BuiltinName::FilterDatabase,
    ];

    /// BIFF8 built-in name code
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Display name of the built-in name
    pub fn name(self) -> &'static str {
        match self {
            BuiltinName::ConsolidateArea => "Consolidate_Area",
            BuiltinName::AutoOpen => "Auto_Open",
            BuiltinName::AutoClose => "Auto_Close",
            BuiltinName::Extract => "Extract",
            BuiltinName::Database => "Database",
            BuiltinName::Criteria => "Criteria",
            BuiltinName::PrintArea => "Print_Area",
            BuiltinName::PrintTitles => "Print_Titles",
            BuiltinName::Recorder => "Recorder",
            BuiltinName::DataForm => "Data_Form",
            BuiltinName::AutoActivate => "Auto_Activate",
            BuiltinName::AutoDeactivate => "Auto_Deactivate",
            BuiltinName::SheetTitle => "Sheet_Title",
            BuiltinName::FilterDatabase => "_FilterDatabase",
        }
    }

    /// Look up a built-in name by its display name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.name().eq_ignore_ascii_case(name))
    }
}

/// A named range definition
///
/// `refers_to` holds formula text without the leading `=`, for example
/// `Sheet1!$A$1:$D$10` or `0.0725`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedRange {
    /// The name. Lookups ignore case.
    pub name: String,
    pub scope: NameScope,
    pub refers_to: String,
    /// Optional description
    pub comment: Option<String>,
    /// Whether this name is hidden from the UI
    pub hidden: bool,
    /// Whether the name is a macro function
    pub function: bool,
    /// Reserved meaning, if this is a built-in name
    pub builtin: Option<BuiltinName>,
}

impl NamedRange {
    /// Create a new named range. A leading `=` on `refers_to` is dropped.
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        let refers_to = refers_to.into();
        let refers_to = match refers_to.strip_prefix('=') {
            Some(rest) => rest.to_string(),
            None => refers_to,
        };
        Self {
            name: name.into(),
            scope,
            refers_to,
            comment: None,
            hidden: false,
            function: false,
            builtin: None,
        }
    }

    /// Create a workbook-scoped named range
    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self::new(name, refers_to, NameScope::Workbook)
    }

    /// Create a sheet-scoped named range
    pub fn sheet_scope(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet_index: usize,
    ) -> Self {
        Self::new(name, refers_to, NameScope::Sheet(sheet_index))
    }

    /// Create a built-in name (always sheet-scoped)
    pub fn builtin(kind: BuiltinName, refers_to: impl Into<String>, sheet_index: usize) -> Self {
        let mut name = Self::sheet_scope(kind.name(), refers_to, sheet_index);
        name.builtin = Some(kind);
        name
    }

    /// Set a comment for this named range
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Mark this named range as hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    fn matches(&self, name: &str, scope: &NameScope) -> bool {
        self.scope == *scope && self.name.eq_ignore_ascii_case(name)
    }
}

/// Check that `name` is usable as a defined name.
///
/// A name starts with a letter, `_` or `\`, continues with letters, digits,
/// `_`, `.`, `\` or `?`, is at most 255 characters long and must not read as
/// a cell reference in A1 or R1C1 style.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("name is empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidName(format!(
            "name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if !NAME_SYNTAX.is_match(name) {
        return Err(Error::InvalidName(format!(
            "'{}' contains characters not allowed in a name",
            name
        )));
    }
    if CellAddress::parse(name).is_ok() {
        return Err(Error::InvalidName(format!(
            "'{}' is a cell reference",
            name
        )));
    }
    if looks_like_r1c1(name) {
        return Err(Error::InvalidName(format!(
            "'{}' is an R1C1 reference",
            name
        )));
    }
    Ok(())
}

/// Whether text reads as an R1C1 reference such as `R`, `C5` or `R2C3`
pub(crate) fn looks_like_r1c1(text: &str) -> bool {
    !text.is_empty() && R1C1_REF.is_match(text)
}

/// Ordered collection of named ranges
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    names: Vec<NamedRange>,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a new named range and return its 0-based position.
    ///
    /// Fails with `InvalidName` for a malformed name or a duplicate in the
    /// same scope.
    pub fn define(&mut self, range: NamedRange) -> Result<usize> {
        if range.builtin.is_none() {
            validate_name(&range.name)?;
        }
        if self.contains(&range.name, &range.scope) {
            return Err(Error::InvalidName(format!(
                "'{}' already exists in this scope",
                range.name
            )));
        }
        self.names.push(range);
        Ok(self.names.len() - 1)
    }

    /// Define or replace a named range, keeping the position of a replaced name
    pub fn define_or_update(&mut self, range: NamedRange) -> Result<usize> {
        match self.position(&range.name, &range.scope) {
            Some(pos) => {
                self.names[pos] = range;
                Ok(pos)
            }
            None => self.define(range),
        }
    }

    /// Append a name read from a file without validation
    pub fn push_unchecked(&mut self, range: NamedRange) -> usize {
        self.names.push(range);
        self.names.len() - 1
    }

    /// Get a named range visible from `current_sheet`.
    ///
    /// A name scoped to the sheet hides a workbook name with the same text.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.resolve(name, current_sheet).map(|pos| &self.names[pos])
    }

    /// Position of the name visible from `current_sheet`
    pub fn resolve(&self, name: &str, current_sheet: usize) -> Option<usize> {
        self.position(name, &NameScope::Sheet(current_sheet))
            .or_else(|| self.position(name, &NameScope::Workbook))
    }

    /// Get a named range by exact scope
    pub fn get_exact(&self, name: &str, scope: &NameScope) -> Option<&NamedRange> {
        self.position(name, scope).map(|pos| &self.names[pos])
    }

    /// Mutable access by exact scope
    pub fn get_exact_mut(&mut self, name: &str, scope: &NameScope) -> Option<&mut NamedRange> {
        self.position(name, scope).map(|pos| &mut self.names[pos])
    }

    /// 0-based position of a name in its exact scope
    pub fn position(&self, name: &str, scope: &NameScope) -> Option<usize> {
        self.names.iter().position(|n| n.matches(name, scope))
    }

    /// Name at a 0-based position
    pub fn by_position(&self, pos: usize) -> Option<&NamedRange> {
        self.names.get(pos)
    }

    /// Built-in name of a sheet
    pub fn builtin(&self, kind: BuiltinName, sheet: usize) -> Option<&NamedRange> {
        self.names
            .iter()
            .find(|n| n.builtin == Some(kind) && n.scope == NameScope::Sheet(sheet))
    }

    /// Remove a named range. Later names move up one position.
    pub fn remove(&mut self, name: &str, scope: &NameScope) -> Option<NamedRange> {
        let pos = self.position(name, scope)?;
        Some(self.names.remove(pos))
    }

    /// Rename a name in place
    pub fn rename(&mut self, old: &str, scope: &NameScope, new: &str) -> Result<()> {
        let pos = self
            .position(old, scope)
            .ok_or_else(|| Error::InvalidName(format!("'{}' is not defined", old)))?;
        validate_name(new)?;
        if let Some(other) = self.position(new, scope) {
            if other != pos {
                return Err(Error::InvalidName(format!(
                    "'{}' already exists in this scope",
                    new
                )));
            }
        }
        let entry = &mut self.names[pos];
        entry.name = new.to_string();
        entry.builtin = None;
        Ok(())
    }

    /// Check if a name exists in the given scope
    pub fn contains(&self, name: &str, scope: &NameScope) -> bool {
        self.position(name, scope).is_some()
    }

    /// Drop names local to a removed sheet and renumber later sheet scopes
    pub fn remove_sheet(&mut self, sheet: usize) {
        self.names.retain(|n| n.scope != NameScope::Sheet(sheet));
        for n in &mut self.names {
            if let NameScope::Sheet(idx) = &mut n.scope {
                if *idx > sheet {
                    *idx -= 1;
                }
            }
        }
    }

    /// Renumber sheet scopes after a sheet moved from `from` to `to`
    pub fn move_sheet(&mut self, from: usize, to: usize) {
        for n in &mut self.names {
            if let NameScope::Sheet(idx) = &mut n.scope {
                *idx = moved_index(*idx, from, to);
            }
        }
    }

    /// Iterate over all named ranges in definition order
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.names.iter()
    }

    /// Mutable iteration, used when rewriting references
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NamedRange> {
        self.names.iter_mut()
    }

    /// Get the number of named ranges
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get all workbook-scoped names
    pub fn workbook_names(&self) -> impl Iterator<Item = &NamedRange> {
        self.names
            .iter()
            .filter(|r| matches!(r.scope, NameScope::Workbook))
    }

    /// Get all names scoped to a specific sheet
    pub fn sheet_names(&self, sheet_index: usize) -> impl Iterator<Item = &NamedRange> {
        self.names
            .iter()
            .filter(move |r| matches!(r.scope, NameScope::Sheet(idx) if idx == sheet_index))
    }
}

/// Where the sheet at `idx` ends up after moving the sheet at `from` to `to`
pub(crate) fn moved_index(idx: usize, from: usize, to: usize) -> usize {
    if idx == from {
        to
    } else if from < to && idx > from && idx <= to {
        idx - 1
    } else if to < from && idx >= to && idx < from {
        idx + 1
    } else {
        idx
    }
}

//! Rewriting formula references after rows move
//!
//! When rows `first..=last` of a sheet move by `amount`, references into
//! the moved block follow it, references into the rows it overwrote become
//! `#REF!`, and areas that straddle the block edge are stretched or
//! trimmed.

use crate::ast::FormulaExpr;
use crate::parser::parse_formula;
use binsheets_core::{CellError, CellRange, RowShift, MAX_ROWS};

/// Row move applied to the references of one sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaShifter {
    sheet: String,
    first: i64,
    last: i64,
    amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowMove {
    Unchanged,
    To(u32),
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AreaMove {
    Unchanged,
    To(u32, u32),
    Deleted,
}

impl FormulaShifter {
    /// Shift for rows `first..=last` of `sheet_name` moving by `amount`
    pub fn rows(sheet_name: impl Into<String>, first: u32, last: u32, amount: i64) -> Self {
        Self {
            sheet: sheet_name.into(),
            first: first as i64,
            last: last as i64,
            amount,
        }
    }

    /// Shift matching a move already applied to a worksheet
    pub fn from_row_shift(sheet_name: impl Into<String>, shift: &RowShift) -> Self {
        Self::rows(sheet_name, shift.first, shift.last, shift.delta)
    }

    fn dest_first(&self) -> i64 {
        self.first + self.amount
    }

    fn dest_last(&self) -> i64 {
        self.last + self.amount
    }

    fn in_block(&self, row: i64) -> bool {
        self.first <= row && row <= self.last
    }

    fn applies_to(&self, sheet: Option<&str>, current_sheet: &str) -> bool {
        sheet.unwrap_or(current_sheet).eq_ignore_ascii_case(&self.sheet)
    }

    fn checked(row: i64) -> Option<u32> {
        (0..MAX_ROWS as i64).contains(&row).then_some(row as u32)
    }

    fn shift_row(&self, row: u32) -> RowMove {
        let row = row as i64;
        if self.in_block(row) {
            return match Self::checked(row + self.amount) {
                Some(r) => RowMove::To(r),
                None => RowMove::Deleted,
            };
        }
        if self.dest_first() <= row && row <= self.dest_last() {
            RowMove::Deleted
        } else {
            RowMove::Unchanged
        }
    }

    fn shift_area(&self, top: u32, bottom: u32) -> AreaMove {
        let (top, bottom) = (top as i64, bottom as i64);
        let (dest_first, dest_last) = (self.dest_first(), self.dest_last());
        let to = |new_top: i64, new_bottom: i64| match (Self::checked(new_top), Self::checked(new_bottom)) {
            (Some(t), Some(b)) => AreaMove::To(t, b),
            _ => AreaMove::Deleted,
        };

        if self.in_block(top) && self.in_block(bottom) {
            return to(top + self.amount, bottom + self.amount);
        }

        if top < self.first && self.last < bottom {
            // the block lies strictly inside the area
            return if dest_first < top && top <= dest_last {
                to(dest_last + 1, bottom)
            } else if dest_first <= bottom && bottom < dest_last {
                to(top, dest_first - 1)
            } else {
                AreaMove::Unchanged
            };
        }

        if self.in_block(top) {
            // top moves, bottom stays
            if self.amount < 0 {
                return to(top + self.amount, bottom);
            }
            if dest_first > bottom {
                return AreaMove::Unchanged;
            }
            let mut new_top = top + self.amount;
            if dest_last < bottom {
                return to(new_top, bottom);
            }
            let remaining_top = self.last + 1;
            if dest_first > remaining_top {
                new_top = remaining_top;
            }
            return to(new_top, bottom.max(dest_last));
        }

        if self.in_block(bottom) {
            // bottom moves, top stays
            if self.amount > 0 {
                return to(top, bottom + self.amount);
            }
            if dest_last < top {
                return AreaMove::Unchanged;
            }
            let mut new_bottom = bottom + self.amount;
            if dest_first > top {
                return to(top, new_bottom);
            }
            let remaining_bottom = self.first - 1;
            if dest_last < remaining_bottom {
                new_bottom = remaining_bottom;
            }
            return to(top.min(dest_first), new_bottom);
        }

        // the area is outside the moved block
        if dest_last < top || bottom < dest_first {
            AreaMove::Unchanged
        } else if dest_first <= top && bottom <= dest_last {
            AreaMove::Deleted
        } else if top <= dest_first && dest_last <= bottom {
            AreaMove::Unchanged
        } else if dest_first < top && top <= dest_last {
            to(dest_last + 1, bottom)
        } else {
            to(top, dest_first - 1)
        }
    }

    /// Rewrite the references of a parsed formula that lives on
    /// `current_sheet`; returns the new tree and whether anything changed
    pub fn shift_expr(&self, expr: FormulaExpr, current_sheet: &str) -> (FormulaExpr, bool) {
        if self.amount == 0 {
            return (expr, false);
        }
        let mut changed = false;
        let shifted = expr.map(&mut |node| match node {
            FormulaExpr::CellRef(mut r) if self.applies_to(r.sheet.as_deref(), current_sheet) => {
                match self.shift_row(r.address.row) {
                    RowMove::Unchanged => FormulaExpr::CellRef(r),
                    RowMove::To(row) => {
                        changed = true;
                        r.address.row = row;
                        FormulaExpr::CellRef(r)
                    }
                    RowMove::Deleted => {
                        changed = true;
                        FormulaExpr::Error(CellError::Ref)
                    }
                }
            }
            FormulaExpr::RangeRef(mut r)
                if !r.is_whole_columns() && self.applies_to(r.sheet.as_deref(), current_sheet) =>
            {
                match self.shift_area(r.range.start.row, r.range.end.row) {
                    AreaMove::Unchanged => FormulaExpr::RangeRef(r),
                    AreaMove::To(top, bottom) => {
                        changed = true;
                        let (mut start, mut end) = (r.range.start, r.range.end);
                        start.row = top;
                        end.row = bottom;
                        r.range = CellRange::new(start, end);
                        FormulaExpr::RangeRef(r)
                    }
                    AreaMove::Deleted => {
                        changed = true;
                        FormulaExpr::Error(CellError::Ref)
                    }
                }
            }
            other => other,
        });
        (shifted, changed)
    }
}

/// Shift the references in formula text that lives on `current_sheet`
///
/// Returns the rewritten text (without `=`), or `None` when nothing changed
/// or the text does not parse.
pub fn shift_formula(text: &str, current_sheet: &str, shifter: &FormulaShifter) -> Option<String> {
    let expr = match parse_formula(text) {
        Ok(expr) => expr,
        Err(e) => {
            log::debug!("not shifting unparsable formula '{}': {}", text, e);
            return None;
        }
    };
    let (shifted, changed) = shifter.shift_expr(expr, current_sheet);
    changed.then(|| shifted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shift(text: &str, first: u32, last: u32, amount: i64) -> Option<String> {
        shift_formula(text, "Sheet1", &FormulaShifter::rows("Sheet1", first, last, amount))
    }

    #[test]
    fn test_moved_cells_follow_the_block() {
        assert_eq!(shift("=A5+$B$6", 4, 5, 2).as_deref(), Some("A7+$B$8"));
        assert_eq!(shift("=A1*2", 4, 5, 2), None);
        assert_eq!(shift("=A6", 5, 9, -2).as_deref(), Some("A4"));
    }

    #[test]
    fn test_overwritten_cells_become_ref_errors() {
        assert_eq!(shift("=A7", 4, 5, 2).as_deref(), Some("#REF!"));
        assert_eq!(shift("=A4+1", 5, 9, -2).as_deref(), Some("#REF!+1"));
        assert_eq!(shift("=SUM(A7:B8)", 4, 5, 2).as_deref(), Some("SUM(#REF!)"));
    }

    #[test]
    fn test_areas() {
        // whole area inside the block
        assert_eq!(shift("=SUM(A5:A6)", 4, 5, 2).as_deref(), Some("SUM(A7:A8)"));
        // bottom edge in the block stretches
        assert_eq!(shift("=SUM(A1:A5)", 4, 4, 1).as_deref(), Some("SUM(A1:A6)"));
        // top edge in the block stretches upwards
        assert_eq!(shift("=SUM(A5:A9)", 4, 4, -2).as_deref(), Some("SUM(A3:A9)"));
        // block moving inside the area leaves it alone
        assert_eq!(shift("=SUM(A1:A20)", 4, 5, 3), None);
        // destination overlapping the top of the area trims it
        assert_eq!(shift("=SUM(A3:A10)", 10, 11, -9).as_deref(), Some("SUM(A4:A10)"));
        // destination inside the area leaves it alone
        assert_eq!(shift("=SUM(A3:A10)", 0, 0, 3), None);
        // whole columns never move
        assert_eq!(shift("=SUM(A:A)", 0, 5, 2), None);
    }

    #[test]
    fn test_only_the_shifted_sheet_is_touched() {
        let shifter = FormulaShifter::rows("Sheet1", 4, 5, 2);
        assert_eq!(shift_formula("=A5", "Other", &shifter), None);
        assert_eq!(
            shift_formula("=Sheet1!A5+A5", "Other", &shifter).as_deref(),
            Some("Sheet1!A7+A5")
        );
        assert_eq!(
            shift_formula("='sheet1'!A5", "Other", &shifter).as_deref(),
            Some("sheet1!A7")
        );
    }

    #[test]
    fn test_moving_past_the_last_row_deletes() {
        assert_eq!(shift("=A65535", 65534, 65534, 5).as_deref(), Some("#REF!"));
    }

    #[test]
    fn test_unparsable_text_is_left_alone() {
        assert_eq!(shift("=SUM(", 0, 0, 1), None);
    }
}

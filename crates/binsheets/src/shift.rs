//! Row shifting across the whole workbook
//!
//! [`Worksheet::shift_rows`](crate::Worksheet::shift_rows) moves cells and
//! their attachments but leaves formula text alone. The extension here
//! finishes the job: every formula on every sheet and every defined name
//! is rewritten so its references follow the moved rows.

use crate::{shift_formula, Error, FormulaShifter, NameScope, Result, RowShift, Workbook};

/// Extension trait for Workbook to move rows and fix up references
pub trait WorkbookShiftExt {
    /// Move rows `first..=last` of `sheet` by `n` (negative moves up)
    ///
    /// Formulas anywhere in the workbook that point into the moved block
    /// follow it; references to overwritten rows become `#REF!`.
    fn shift_rows(&mut self, sheet: usize, first: u32, last: u32, n: i64) -> Result<RowShift>;
}

impl WorkbookShiftExt for Workbook {
    fn shift_rows(&mut self, sheet: usize, first: u32, last: u32, n: i64) -> Result<RowShift> {
        let count = self.sheet_count();
        let ws = self
            .worksheet_mut(sheet)
            .ok_or(Error::SheetOutOfBounds(sheet, count))?;
        let shift = ws.shift_rows(first, last, n)?;
        if shift.is_noop() {
            return Ok(shift);
        }
        let shifter = FormulaShifter::from_row_shift(ws.name(), &shift);

        let sheet_names: Vec<String> = self.worksheets().map(|s| s.name().to_string()).collect();
        let mut rewritten = 0usize;
        for (idx, name) in sheet_names.iter().enumerate() {
            let Some(ws) = self.worksheet_mut(idx) else {
                continue;
            };
            let updates: Vec<(u32, u16, String)> = ws
                .formula_cells()
                .filter_map(|(row, col, text)| {
                    shift_formula(text, name, &shifter).map(|t| (row, col, t))
                })
                .collect();
            rewritten += updates.len();
            for (row, col, text) in updates {
                ws.set_formula_text(row, col, text)?;
            }
        }

        for range in self.named_ranges_mut().iter_mut() {
            // a workbook-level name has no home sheet for bare references
            let home = match range.scope {
                NameScope::Sheet(idx) => sheet_names.get(idx).map(String::as_str).unwrap_or(""),
                NameScope::Workbook => "",
            };
            if let Some(text) = shift_formula(&range.refers_to, home, &shifter) {
                log::debug!("name '{}' now refers to {}", range.name, text);
                range.refers_to = text;
                rewritten += 1;
            }
        }

        log::debug!(
            "shifted rows {}..={} of sheet {} by {}; {} formulas rewritten",
            first,
            last,
            sheet,
            n,
            rewritten
        );
        Ok(shift)
    }
}

//! Structural checks of a BIFF8 workbook stream
//!
//! Each substream is held against an ordered list of record rules. A rule
//! names a record type, how often it may occur and whether its occurrences
//! must be adjacent. Records the rules mention must appear in rule order;
//! records they do not mention (cells, drawing pieces) may appear anywhere.

use std::fmt;

use crate::biff::records::{self, record_name};
use crate::biff::{parse_bof, read_all_records, BiffRecord};
use crate::error::XlsResult;

/// How many times a record may occur in a substream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    One,
    ZeroOrOne,
    OneOrMore,
    ZeroOrMore,
}

impl Occurrence {
    pub fn allows(self, count: usize) -> bool {
        match self {
            Occurrence::One => count == 1,
            Occurrence::ZeroOrOne => count <= 1,
            Occurrence::OneOrMore => count >= 1,
            Occurrence::ZeroOrMore => true,
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Occurrence::One => "exactly once",
            Occurrence::ZeroOrOne => "at most once",
            Occurrence::OneOrMore => "at least once",
            Occurrence::ZeroOrMore => "any number of times",
        })
    }
}

/// One rule of a substream layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub record_type: u16,
    pub name: &'static str,
    pub occurrence: Occurrence,
    /// Repeated occurrences must be adjacent
    pub together: bool,
}

impl CheckRecord {
    pub fn new(record_type: u16, occurrence: Occurrence, together: bool) -> Self {
        Self {
            record_type,
            name: record_name(record_type).unwrap_or("?"),
            occurrence,
            together,
        }
    }
}

/// Which substream a violation was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substream {
    Globals,
    /// Worksheet by BOUNDSHEET position
    Sheet(usize),
}

impl fmt::Display for Substream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Substream::Globals => f.write_str("workbook globals"),
            Substream::Sheet(i) => write!(f, "sheet {}", i),
        }
    }
}

/// A broken layout rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanityViolation {
    MissingBof,
    MissingEof,
    /// A BOUNDSHEET offset that does not hold a worksheet BOF
    BadSheetOffset { sheet: usize, offset: u32 },
    Occurrence {
        substream: Substream,
        record: &'static str,
        expected: Occurrence,
        found: usize,
    },
    /// Occurrences of a `together` record are split by other records
    Scattered {
        substream: Substream,
        record: &'static str,
    },
    OutOfOrder {
        substream: Substream,
        record: &'static str,
        after: &'static str,
    },
}

impl fmt::Display for SanityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanityViolation::MissingBof => f.write_str("stream does not start with BOF"),
            SanityViolation::MissingEof => f.write_str("stream does not end with EOF"),
            SanityViolation::BadSheetOffset { sheet, offset } => write!(
                f,
                "BOUNDSHEET {} points at offset {}, which holds no worksheet BOF",
                sheet, offset
            ),
            SanityViolation::Occurrence {
                substream,
                record,
                expected,
                found,
            } => write!(
                f,
                "{}: {} must occur {}, found {}",
                substream, record, expected, found
            ),
            SanityViolation::Scattered { substream, record } => {
                write!(f, "{}: {} records are not adjacent", substream, record)
            }
            SanityViolation::OutOfOrder {
                substream,
                record,
                after,
            } => write!(f, "{}: {} appears after {}", substream, record, after),
        }
    }
}

/// Checks written streams against the expected record layout
pub struct SanityChecker;

impl SanityChecker {
    /// Layout of the workbook globals substream
    pub fn workbook_rules() -> Vec<CheckRecord> {
        use Occurrence::*;
        vec![
            CheckRecord::new(records::BOF, One, false),
            CheckRecord::new(records::INTERFACEHDR, ZeroOrOne, false),
            CheckRecord::new(records::MMS, ZeroOrOne, false),
            CheckRecord::new(records::INTERFACEEND, ZeroOrOne, false),
            CheckRecord::new(records::WRITEACCESS, ZeroOrOne, false),
            CheckRecord::new(records::CODEPAGE, One, false),
            CheckRecord::new(records::DSF, ZeroOrOne, false),
            CheckRecord::new(records::TABID, ZeroOrOne, false),
            CheckRecord::new(records::FNGROUPCOUNT, ZeroOrOne, false),
            CheckRecord::new(records::WINDOWPROTECT, One, false),
            CheckRecord::new(records::PROTECT, One, false),
            CheckRecord::new(records::PASSWORD, One, false),
            CheckRecord::new(records::PROT4REV, ZeroOrOne, false),
            CheckRecord::new(records::PROT4REVPASS, ZeroOrOne, false),
            CheckRecord::new(records::BACKUP, One, false),
            CheckRecord::new(records::HIDEOBJ, One, false),
            CheckRecord::new(records::WINDOW1, One, false),
            CheckRecord::new(records::DATEMODE, One, false),
            CheckRecord::new(records::PRECISION, One, false),
            CheckRecord::new(records::REFRESHALL, ZeroOrOne, false),
            CheckRecord::new(records::BOOKBOOL, One, false),
            CheckRecord::new(records::FONT, OneOrMore, true),
            CheckRecord::new(records::FORMAT, ZeroOrMore, true),
            CheckRecord::new(records::XF, OneOrMore, true),
            CheckRecord::new(records::STYLE, OneOrMore, true),
            CheckRecord::new(records::PALETTE, ZeroOrOne, false),
            CheckRecord::new(records::USESELFS, ZeroOrOne, false),
            CheckRecord::new(records::BOUNDSHEET, OneOrMore, true),
            CheckRecord::new(records::COUNTRY, ZeroOrOne, false),
            CheckRecord::new(records::SUPBOOK, ZeroOrMore, false),
            CheckRecord::new(records::EXTERNSHEET, ZeroOrOne, false),
            CheckRecord::new(records::NAME, ZeroOrMore, true),
            CheckRecord::new(records::MSODRAWINGGROUP, ZeroOrOne, false),
            CheckRecord::new(records::SST, One, false),
            CheckRecord::new(records::EXTSST, ZeroOrOne, false),
            CheckRecord::new(records::EOF, One, false),
        ]
    }

    /// Layout of a worksheet substream; rows, cells and drawing pieces
    /// interleave and are not listed
    pub fn sheet_rules() -> Vec<CheckRecord> {
        use Occurrence::*;
        vec![
            CheckRecord::new(records::BOF, One, false),
            CheckRecord::new(records::INDEX, ZeroOrOne, false),
            CheckRecord::new(records::CALCMODE, ZeroOrOne, false),
            CheckRecord::new(records::CALCCOUNT, ZeroOrOne, false),
            CheckRecord::new(records::REFMODE, ZeroOrOne, false),
            CheckRecord::new(records::ITERATION, ZeroOrOne, false),
            CheckRecord::new(records::DELTA, ZeroOrOne, false),
            CheckRecord::new(records::SAVERECALC, ZeroOrOne, false),
            CheckRecord::new(records::PRINTHEADERS, ZeroOrOne, false),
            CheckRecord::new(records::PRINTGRIDLINES, ZeroOrOne, false),
            CheckRecord::new(records::GRIDSET, ZeroOrOne, false),
            CheckRecord::new(records::GUTS, ZeroOrOne, false),
            CheckRecord::new(records::DEFAULTROWHEIGHT, One, false),
            CheckRecord::new(records::WSBOOL, ZeroOrOne, false),
            CheckRecord::new(records::HEADER, ZeroOrOne, false),
            CheckRecord::new(records::FOOTER, ZeroOrOne, false),
            CheckRecord::new(records::HCENTER, ZeroOrOne, false),
            CheckRecord::new(records::VCENTER, ZeroOrOne, false),
            CheckRecord::new(records::SETUP, ZeroOrOne, false),
            CheckRecord::new(records::DEFCOLWIDTH, One, false),
            CheckRecord::new(records::COLINFO, ZeroOrMore, true),
            CheckRecord::new(records::DIMENSIONS, One, false),
            CheckRecord::new(records::NOTE, ZeroOrMore, true),
            CheckRecord::new(records::WINDOW2, One, false),
            CheckRecord::new(records::PANE, ZeroOrOne, false),
            CheckRecord::new(records::SELECTION, ZeroOrMore, true),
            CheckRecord::new(records::MERGECELLS, ZeroOrMore, true),
            CheckRecord::new(records::HLINK, ZeroOrMore, false),
            CheckRecord::new(records::EOF, One, false),
        ]
    }

    /// Hold one substream against `rules`
    pub fn check_records<'a>(
        records: impl IntoIterator<Item = &'a BiffRecord>,
        rules: &[CheckRecord],
        substream: Substream,
    ) -> Vec<SanityViolation> {
        // rule index of every record a rule covers, in stream order
        let matched: Vec<usize> = records
            .into_iter()
            .filter_map(|rec| rules.iter().position(|r| r.record_type == rec.record_type))
            .collect();

        let mut violations = Vec::new();
        for (i, rule) in rules.iter().enumerate() {
            let found = matched.iter().filter(|&&m| m == i).count();
            if !rule.occurrence.allows(found) {
                violations.push(SanityViolation::Occurrence {
                    substream,
                    record: rule.name,
                    expected: rule.occurrence,
                    found,
                });
            }
            if rule.together && found > 1 {
                let first = matched.iter().position(|&m| m == i).unwrap_or(0);
                if matched[first..first + found].iter().any(|&m| m != i) {
                    violations.push(SanityViolation::Scattered {
                        substream,
                        record: rule.name,
                    });
                }
            }
        }

        for pair in matched.windows(2) {
            if pair[1] < pair[0] {
                let violation = SanityViolation::OutOfOrder {
                    substream,
                    record: rules[pair[1]].name,
                    after: rules[pair[0]].name,
                };
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            }
        }
        violations
    }

    /// Check a whole workbook stream; an empty result means it passed
    pub fn check_stream(stream: &[u8]) -> XlsResult<Vec<SanityViolation>> {
        let all = read_all_records(stream, true)?;
        let mut violations = Vec::new();
        if all.first().map(|r| r.record_type) != Some(records::BOF) {
            violations.push(SanityViolation::MissingBof);
            return Ok(violations);
        }
        if all.last().map(|r| r.record_type) != Some(records::EOF) {
            violations.push(SanityViolation::MissingEof);
        }

        let globals_end = all
            .iter()
            .position(|r| r.record_type == records::EOF)
            .map_or(all.len(), |p| p + 1);
        let globals = &all[..globals_end];
        violations.extend(Self::check_records(
            globals,
            &Self::workbook_rules(),
            Substream::Globals,
        ));

        let sheet_rules = Self::sheet_rules();
        let offsets = globals
            .iter()
            .filter(|r| r.record_type == records::BOUNDSHEET)
            .filter_map(|r| r.data.get(..4))
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        for (sheet, offset) in offsets.enumerate() {
            let start = all[globals_end..]
                .iter()
                .position(|r| r.stream_offset == offset as u64)
                .map(|p| p + globals_end);
            let is_worksheet = start.is_some_and(|s| {
                all[s].record_type == records::BOF
                    && matches!(parse_bof(&all[s].data), Ok((_, dt)) if dt == records::BOF_WORKSHEET)
            });
            let Some(start) = start.filter(|_| is_worksheet) else {
                violations.push(SanityViolation::BadSheetOffset { sheet, offset });
                continue;
            };
            violations.extend(Self::check_records(
                substream(&all[start..]),
                &sheet_rules,
                Substream::Sheet(sheet),
            ));
        }
        Ok(violations)
    }
}

/// Records from a BOF up to its matching EOF; embedded substreams are skipped
fn substream(records: &[BiffRecord]) -> Vec<&BiffRecord> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    for rec in records {
        match rec.record_type {
            records::BOF => depth += 1,
            records::EOF => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth <= 1 {
            out.push(rec);
        }
        if depth == 0 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::XlsWriteOptions;
    use crate::writer::XlsWriter;
    use binsheets_core::{CellComment, Hyperlink, Workbook};
    use pretty_assertions::assert_eq;

    fn rec(record_type: u16) -> BiffRecord {
        BiffRecord {
            record_type,
            data: Vec::new(),
            continue_offsets: Vec::new(),
            stream_offset: 0,
        }
    }

    fn rules() -> Vec<CheckRecord> {
        vec![
            CheckRecord::new(records::BOF, Occurrence::One, false),
            CheckRecord::new(records::FONT, Occurrence::OneOrMore, true),
            CheckRecord::new(records::NAME, Occurrence::ZeroOrMore, false),
            CheckRecord::new(records::EOF, Occurrence::One, false),
        ]
    }

    #[test]
    fn test_check_records_accepts_layout() {
        let stream = [
            rec(records::BOF),
            rec(records::FONT),
            rec(records::FONT),
            rec(records::NUMBER),
            rec(records::NAME),
            rec(records::EOF),
        ];
        assert_eq!(
            SanityChecker::check_records(&stream, &rules(), Substream::Globals),
            vec![]
        );
    }

    #[test]
    fn test_check_records_reports_each_rule() {
        let stream = [
            rec(records::BOF),
            rec(records::FONT),
            rec(records::NAME),
            rec(records::FONT),
            rec(records::EOF),
            rec(records::EOF),
        ];
        let violations = SanityChecker::check_records(&stream, &rules(), Substream::Sheet(0));
        assert_eq!(
            violations,
            vec![
                SanityViolation::Scattered {
                    substream: Substream::Sheet(0),
                    record: "FONT",
                },
                SanityViolation::Occurrence {
                    substream: Substream::Sheet(0),
                    record: "EOF",
                    expected: Occurrence::One,
                    found: 2,
                },
                SanityViolation::OutOfOrder {
                    substream: Substream::Sheet(0),
                    record: "FONT",
                    after: "NAME",
                },
            ]
        );
    }

    #[test]
    fn test_written_workbook_passes() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Other").unwrap();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", "text").unwrap();
        sheet.set_cell_formula("B1", "Other!A1+1").unwrap();
        sheet.set_freeze_panes(1, 0);
        sheet
            .set_comment("C3", CellComment::new("me", "a note"))
            .unwrap();
        sheet
            .add_hyperlink(Hyperlink::url(4, 0, "https://example.com/"))
            .unwrap();
        wb.define_name("Total", "Other!$A$1:$A$9").unwrap();

        let stream = XlsWriter::workbook_stream(&wb, &XlsWriteOptions::default()).unwrap();
        assert_eq!(SanityChecker::check_stream(&stream).unwrap(), vec![]);
    }

    #[test]
    fn test_stream_without_eof() {
        let mut stream = Vec::new();
        for (rt, body) in [(records::BOF, &[0x00u8, 0x06, 0x05, 0x00][..]), (records::SST, &[0u8; 8][..])] {
            stream.extend_from_slice(&rt.to_le_bytes());
            stream.extend_from_slice(&(body.len() as u16).to_le_bytes());
            stream.extend_from_slice(body);
        }
        let violations = SanityChecker::check_stream(&stream).unwrap();
        assert_eq!(violations[0], SanityViolation::MissingEof);
    }
}

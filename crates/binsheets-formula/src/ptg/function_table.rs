//! BIFF8 built-in function table
//!
//! `Func` and `FuncVar` tokens name a built-in function by its index in
//! Excel's function table. Functions outside the table (add-ins and
//! functions newer than BIFF8, such as IFERROR) use [`FUNCTION_ADDIN`] with
//! the name supplied by a preceding `NameX` token.

use ahash::AHashMap;
use std::sync::OnceLock;

/// Function index of add-in and future functions
pub const FUNCTION_ADDIN: u16 = 255;

/// Most arguments a BIFF8 function call may take
const MAX_ARGS: u8 = 30;

/// A built-in function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub index: u16,
    pub name: &'static str,
    pub min_args: u8,
    pub max_args: u8,
}

impl FunctionMetadata {
    /// Fixed-arity functions are written as `Func`, the rest as `FuncVar`
    pub fn is_fixed_arity(&self) -> bool {
        self.min_args == self.max_args
    }
}

const fn f(index: u16, name: &'static str, min_args: u8, max_args: u8) -> FunctionMetadata {
    FunctionMetadata {
        index,
        name,
        min_args,
        max_args,
    }
}

#[rustfmt::skip]
static FUNCTIONS: &[FunctionMetadata] = &[
    f(0, "COUNT", 0, MAX_ARGS),
    f(1, "IF", 2, 3),
    f(2, "ISNA", 1, 1),
    f(3, "ISERROR", 1, 1),
    f(4, "SUM", 0, MAX_ARGS),
    f(5, "AVERAGE", 1, MAX_ARGS),
    f(6, "MIN", 1, MAX_ARGS),
    f(7, "MAX", 1, MAX_ARGS),
    f(8, "ROW", 0, 1),
    f(9, "COLUMN", 0, 1),
    f(10, "NA", 0, 0),
    f(11, "NPV", 2, MAX_ARGS),
    f(12, "STDEV", 1, MAX_ARGS),
    f(15, "SIN", 1, 1),
    f(16, "COS", 1, 1),
    f(17, "TAN", 1, 1),
    f(18, "ATAN", 1, 1),
    f(19, "PI", 0, 0),
    f(20, "SQRT", 1, 1),
    f(21, "EXP", 1, 1),
    f(22, "LN", 1, 1),
    f(23, "LOG10", 1, 1),
    f(24, "ABS", 1, 1),
    f(25, "INT", 1, 1),
    f(26, "SIGN", 1, 1),
    f(27, "ROUND", 2, 2),
    f(28, "LOOKUP", 2, 3),
    f(29, "INDEX", 2, 4),
    f(30, "REPT", 2, 2),
    f(31, "MID", 3, 3),
    f(32, "LEN", 1, 1),
    f(33, "VALUE", 1, 1),
    f(34, "TRUE", 0, 0),
    f(35, "FALSE", 0, 0),
    f(36, "AND", 1, MAX_ARGS),
    f(37, "OR", 1, MAX_ARGS),
    f(38, "NOT", 1, 1),
    f(39, "MOD", 2, 2),
    f(46, "VAR", 1, MAX_ARGS),
    f(48, "TEXT", 2, 2),
    f(56, "PV", 3, 5),
    f(57, "FV", 3, 5),
    f(58, "NPER", 3, 5),
    f(59, "PMT", 3, 5),
    f(60, "RATE", 3, 6),
    f(63, "RAND", 0, 0),
    f(64, "MATCH", 2, 3),
    f(65, "DATE", 3, 3),
    f(66, "TIME", 3, 3),
    f(67, "DAY", 1, 1),
    f(68, "MONTH", 1, 1),
    f(69, "YEAR", 1, 1),
    f(70, "WEEKDAY", 1, 2),
    f(71, "HOUR", 1, 1),
    f(72, "MINUTE", 1, 1),
    f(73, "SECOND", 1, 1),
    f(74, "NOW", 0, 0),
    f(76, "ROWS", 1, 1),
    f(77, "COLUMNS", 1, 1),
    f(78, "OFFSET", 3, 5),
    f(82, "SEARCH", 2, 3),
    f(97, "ATAN2", 2, 2),
    f(98, "ASIN", 1, 1),
    f(99, "ACOS", 1, 1),
    f(100, "CHOOSE", 2, MAX_ARGS),
    f(101, "HLOOKUP", 3, 4),
    f(102, "VLOOKUP", 3, 4),
    f(105, "ISREF", 1, 1),
    f(109, "LOG", 1, 2),
    f(111, "CHAR", 1, 1),
    f(112, "LOWER", 1, 1),
    f(113, "UPPER", 1, 1),
    f(114, "PROPER", 1, 1),
    f(115, "LEFT", 1, 2),
    f(116, "RIGHT", 1, 2),
    f(117, "EXACT", 2, 2),
    f(118, "TRIM", 1, 1),
    f(119, "REPLACE", 4, 4),
    f(120, "SUBSTITUTE", 3, 4),
    f(121, "CODE", 1, 1),
    f(124, "FIND", 2, 3),
    f(126, "ISERR", 1, 1),
    f(127, "ISTEXT", 1, 1),
    f(128, "ISNUMBER", 1, 1),
    f(129, "ISBLANK", 1, 1),
    f(130, "T", 1, 1),
    f(131, "N", 1, 1),
    f(140, "DATEVALUE", 1, 1),
    f(141, "TIMEVALUE", 1, 1),
    f(148, "INDIRECT", 1, 2),
    f(162, "CLEAN", 1, 1),
    f(169, "COUNTA", 0, MAX_ARGS),
    f(183, "PRODUCT", 0, MAX_ARGS),
    f(190, "ISNONTEXT", 1, 1),
    f(197, "TRUNC", 1, 2),
    f(198, "ISLOGICAL", 1, 1),
    f(212, "ROUNDUP", 2, 2),
    f(213, "ROUNDDOWN", 2, 2),
    f(221, "TODAY", 0, 0),
    f(227, "MEDIAN", 1, MAX_ARGS),
    f(228, "SUMPRODUCT", 1, MAX_ARGS),
    f(261, "ERROR.TYPE", 1, 1),
    f(279, "EVEN", 1, 1),
    f(285, "FLOOR", 2, 2),
    f(288, "CEILING", 2, 2),
    f(298, "ODD", 1, 1),
    f(321, "SUMSQ", 0, MAX_ARGS),
    f(325, "LARGE", 2, 2),
    f(326, "SMALL", 2, 2),
    f(336, "CONCATENATE", 0, MAX_ARGS),
    f(337, "POWER", 2, 2),
    f(342, "RADIANS", 1, 1),
    f(343, "DEGREES", 1, 1),
    f(345, "SUMIF", 2, 3),
    f(346, "COUNTIF", 2, 2),
    f(347, "COUNTBLANK", 1, 1),
];

/// Functions whose result changes on every recalculation
pub(crate) const VOLATILE: &[&str] = &["RAND", "NOW", "TODAY", "INDIRECT", "OFFSET"];

struct FunctionIndex {
    by_index: AHashMap<u16, &'static FunctionMetadata>,
    by_name: AHashMap<&'static str, &'static FunctionMetadata>,
}

fn index() -> &'static FunctionIndex {
    static INDEX: OnceLock<FunctionIndex> = OnceLock::new();
    INDEX.get_or_init(|| FunctionIndex {
        by_index: FUNCTIONS.iter().map(|f| (f.index, f)).collect(),
        by_name: FUNCTIONS.iter().map(|f| (f.name, f)).collect(),
    })
}

/// Look up a built-in function by its table index
pub fn function_by_index(id: u16) -> Option<&'static FunctionMetadata> {
    index().by_index.get(&id).copied()
}

/// Look up a built-in function by name (case-insensitive)
pub fn function_by_name(name: &str) -> Option<&'static FunctionMetadata> {
    index().by_name.get(name.to_ascii_uppercase().as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_ways() {
        let sum = function_by_name("sum").unwrap();
        assert_eq!(sum.index, 4);
        assert!(!sum.is_fixed_arity());
        assert_eq!(function_by_index(102).unwrap().name, "VLOOKUP");
        assert!(function_by_name("ROUND").unwrap().is_fixed_arity());
    }

    #[test]
    fn test_newer_functions_are_not_built_in() {
        assert!(function_by_name("IFERROR").is_none());
        assert!(function_by_name("SUMIFS").is_none());
        assert!(function_by_index(FUNCTION_ADDIN).is_none());
    }

    #[test]
    fn test_table_has_unique_entries() {
        let idx = index();
        assert_eq!(idx.by_index.len(), FUNCTIONS.len());
        assert_eq!(idx.by_name.len(), FUNCTIONS.len());
    }
}

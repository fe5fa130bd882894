//! Built-in Excel functions

/// Unwrap a `Result<_, CellError>`, returning the error as the function's value
macro_rules! try_value {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Ok(FormulaValue::Error(e)),
        }
    };
}

pub mod criteria;
pub mod date;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use ahash::AHashMap;
use binsheets_core::CellError;

/// Function implementation signature
///
/// Functions can consult the evaluation context (e.g. workbook settings, date system,
/// current sheet/cell) to match Excel semantics.
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Is volatile (recalculates every time)
    pub volatile: bool,
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

const VARIADIC: Option<usize> = None;

/// (name, min args, max args, implementation, volatile)
#[rustfmt::skip]
const BUILTINS: &[(&str, usize, Option<usize>, FunctionImpl, bool)] = &[
    // math
    ("SUM", 1, VARIADIC, math::fn_sum, false),
    ("PRODUCT", 1, VARIADIC, math::fn_product, false),
    ("ABS", 1, Some(1), math::fn_abs, false),
    ("INT", 1, Some(1), math::fn_int, false),
    ("ROUND", 2, Some(2), math::fn_round, false),
    ("ROUNDUP", 2, Some(2), math::fn_roundup, false),
    ("ROUNDDOWN", 2, Some(2), math::fn_rounddown, false),
    ("TRUNC", 1, Some(2), math::fn_trunc, false),
    ("MOD", 2, Some(2), math::fn_mod, false),
    ("SQRT", 1, Some(1), math::fn_sqrt, false),
    ("POWER", 2, Some(2), math::fn_power, false),
    ("PI", 0, Some(0), math::fn_pi, false),
    ("EXP", 1, Some(1), math::fn_exp, false),
    ("LN", 1, Some(1), math::fn_ln, false),
    ("LOG", 1, Some(2), math::fn_log, false),
    ("LOG10", 1, Some(1), math::fn_log10, false),
    ("SIGN", 1, Some(1), math::fn_sign, false),
    ("RAND", 0, Some(0), math::fn_rand, true),
    ("SIN", 1, Some(1), math::fn_sin, false),
    ("COS", 1, Some(1), math::fn_cos, false),
    ("TAN", 1, Some(1), math::fn_tan, false),
    ("ASIN", 1, Some(1), math::fn_asin, false),
    ("ACOS", 1, Some(1), math::fn_acos, false),
    ("ATAN", 1, Some(1), math::fn_atan, false),
    ("ATAN2", 2, Some(2), math::fn_atan2, false),
    ("DEGREES", 1, Some(1), math::fn_degrees, false),
    ("RADIANS", 1, Some(1), math::fn_radians, false),
    ("ODD", 1, Some(1), math::fn_odd, false),
    ("EVEN", 1, Some(1), math::fn_even, false),
    ("SUMPRODUCT", 1, VARIADIC, math::fn_sumproduct, false),
    ("SUMIF", 2, Some(3), math::fn_sumif, false),
    ("SUMIFS", 3, VARIADIC, math::fn_sumifs, false),
    // statistical
    ("AVERAGE", 1, VARIADIC, statistical::fn_average, false),
    ("MIN", 1, VARIADIC, statistical::fn_min, false),
    ("MAX", 1, VARIADIC, statistical::fn_max, false),
    ("COUNT", 1, VARIADIC, statistical::fn_count, false),
    ("COUNTA", 1, VARIADIC, statistical::fn_counta, false),
    ("COUNTBLANK", 1, Some(1), statistical::fn_countblank, false),
    ("COUNTIF", 2, Some(2), statistical::fn_countif, false),
    ("COUNTIFS", 2, VARIADIC, statistical::fn_countifs, false),
    ("AVERAGEIF", 2, Some(3), statistical::fn_averageif, false),
    ("AVERAGEIFS", 3, VARIADIC, statistical::fn_averageifs, false),
    ("MEDIAN", 1, VARIADIC, statistical::fn_median, false),
    ("LARGE", 2, Some(2), statistical::fn_large, false),
    ("SMALL", 2, Some(2), statistical::fn_small, false),
    // logical
    ("IF", 2, Some(3), logical::fn_if, false),
    ("AND", 1, VARIADIC, logical::fn_and, false),
    ("OR", 1, VARIADIC, logical::fn_or, false),
    ("NOT", 1, Some(1), logical::fn_not, false),
    ("TRUE", 0, Some(0), logical::fn_true, false),
    ("FALSE", 0, Some(0), logical::fn_false, false),
    ("IFERROR", 2, Some(2), logical::fn_iferror, false),
    ("IFNA", 2, Some(2), logical::fn_ifna, false),
    ("CHOOSE", 2, VARIADIC, logical::fn_choose, false),
    // info
    ("ISBLANK", 1, Some(1), info::fn_isblank, false),
    ("ISERROR", 1, Some(1), info::fn_iserror, false),
    ("ISERR", 1, Some(1), info::fn_iserr, false),
    ("ISNUMBER", 1, Some(1), info::fn_isnumber, false),
    ("ISTEXT", 1, Some(1), info::fn_istext, false),
    ("ISNONTEXT", 1, Some(1), info::fn_isnontext, false),
    ("ISNA", 1, Some(1), info::fn_isna, false),
    ("ISLOGICAL", 1, Some(1), info::fn_islogical, false),
    ("NA", 0, Some(0), info::fn_na, false),
    ("ERROR.TYPE", 1, Some(1), info::fn_error_type, false),
    // text
    ("LEN", 1, Some(1), text::fn_len, false),
    ("LEFT", 1, Some(2), text::fn_left, false),
    ("RIGHT", 1, Some(2), text::fn_right, false),
    ("MID", 3, Some(3), text::fn_mid, false),
    ("UPPER", 1, Some(1), text::fn_upper, false),
    ("LOWER", 1, Some(1), text::fn_lower, false),
    ("PROPER", 1, Some(1), text::fn_proper, false),
    ("TRIM", 1, Some(1), text::fn_trim, false),
    ("CONCATENATE", 1, VARIADIC, text::fn_concatenate, false),
    ("TEXT", 2, Some(2), text::fn_text, false),
    ("VALUE", 1, Some(1), text::fn_value, false),
    ("FIND", 2, Some(3), text::fn_find, false),
    ("SEARCH", 2, Some(3), text::fn_search, false),
    ("SUBSTITUTE", 3, Some(4), text::fn_substitute, false),
    ("REPLACE", 4, Some(4), text::fn_replace, false),
    ("REPT", 2, Some(2), text::fn_rept, false),
    ("EXACT", 2, Some(2), text::fn_exact, false),
    ("CHAR", 1, Some(1), text::fn_char, false),
    ("CODE", 1, Some(1), text::fn_code, false),
    ("CLEAN", 1, Some(1), text::fn_clean, false),
    ("T", 1, Some(1), text::fn_t, false),
    ("N", 1, Some(1), text::fn_n, false),
    // date and time
    ("DATE", 3, Some(3), date::fn_date, false),
    ("TIME", 3, Some(3), date::fn_time, false),
    ("YEAR", 1, Some(1), date::fn_year, false),
    ("MONTH", 1, Some(1), date::fn_month, false),
    ("DAY", 1, Some(1), date::fn_day, false),
    ("HOUR", 1, Some(1), date::fn_hour, false),
    ("MINUTE", 1, Some(1), date::fn_minute, false),
    ("SECOND", 1, Some(1), date::fn_second, false),
    ("WEEKDAY", 1, Some(2), date::fn_weekday, false),
    ("TODAY", 0, Some(0), date::fn_today, true),
    ("NOW", 0, Some(0), date::fn_now, true),
    // lookup and reference
    ("VLOOKUP", 3, Some(4), lookup::fn_vlookup, false),
    ("HLOOKUP", 3, Some(4), lookup::fn_hlookup, false),
    ("MATCH", 2, Some(3), lookup::fn_match, false),
    ("INDEX", 2, Some(3), lookup::fn_index, false),
    ("ROW", 0, Some(1), lookup::fn_row, false),
    ("COLUMN", 0, Some(1), lookup::fn_column, false),
    ("ROWS", 1, Some(1), lookup::fn_rows, false),
    ("COLUMNS", 1, Some(1), lookup::fn_columns, false),
];

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::with_capacity(BUILTINS.len()),
        };

        for &(name, min_args, max_args, implementation, volatile) in BUILTINS {
            registry.register(FunctionDef {
                name,
                min_args,
                max_args,
                implementation,
                volatile,
            });
        }

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Whether a function is volatile (RAND, NOW, TODAY)
    pub fn is_volatile(&self, name: &str) -> bool {
        self.get(name).map_or(false, |f| f.volatile)
    }

    /// Names of all registered functions
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.values().map(|f| f.name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// === Argument helpers shared by the function modules ===

/// Argument `i`, with omitted trailing arguments reading as blank
pub(crate) fn arg(args: &[FormulaValue], i: usize) -> &FormulaValue {
    static EMPTY: FormulaValue = FormulaValue::Empty;
    args.get(i).unwrap_or(&EMPTY)
}

/// Optional numeric argument: blank means `default`
pub(crate) fn number_or(
    args: &[FormulaValue],
    i: usize,
    default: f64,
) -> Result<f64, CellError> {
    match arg(args, i) {
        FormulaValue::Empty => Ok(default),
        v => v.to_number(),
    }
}

/// Numbers for aggregate functions
///
/// Direct arguments are coerced like operands. Inside ranges and arrays only
/// numbers count; text, booleans and blanks are skipped. Errors propagate.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for value in args {
        match value {
            FormulaValue::Array(rows) => {
                for v in rows.iter().flatten() {
                    match v {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            scalar => numbers.push(scalar.to_number()?),
        }
    }
    Ok(numbers)
}

/// Values of a range argument in row-major order, with its shape
pub(crate) fn grid(value: &FormulaValue) -> (Vec<&FormulaValue>, usize, usize) {
    match value {
        FormulaValue::Array(rows) => {
            let width = rows.first().map_or(0, Vec::len);
            (rows.iter().flatten().collect(), rows.len(), width)
        }
        scalar => (vec![scalar], 1, 1),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("sum").is_some());
        assert!(registry.get("Vlookup").is_some());
        assert!(registry.get("NOSUCH").is_none());
    }

    #[test]
    fn test_volatile_functions() {
        let registry = FunctionRegistry::new();
        assert!(registry.is_volatile("RAND"));
        assert!(registry.is_volatile("now"));
        assert!(!registry.is_volatile("SUM"));
    }

    #[test]
    fn test_every_builtin_is_registered_once() {
        let registry = FunctionRegistry::new();
        assert_eq!(registry.names().count(), BUILTINS.len());
    }
}

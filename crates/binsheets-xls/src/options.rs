//! XLS options

/// Options for reading XLS files
#[derive(Debug, Clone)]
pub struct XlsReadOptions {
    /// Fail on recoverable anomalies instead of logging them (default: false)
    pub strict: bool,
    /// Parse drawings, shapes and comments (default: true)
    pub read_drawings: bool,
    /// Recalculate formulas after loading. The reader ignores this; the
    /// `binsheets` facade acts on it.
    pub evaluate_on_load: bool,
}

impl Default for XlsReadOptions {
    fn default() -> Self {
        Self {
            strict: false,
            read_drawings: true,
            evaluate_on_load: false,
        }
    }
}

impl XlsReadOptions {
    /// Lenient defaults with strict mode switched on
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Options for writing XLS files
#[derive(Debug, Clone)]
pub struct XlsWriteOptions {
    /// Store numbers as RK records when that is exact (default: true)
    pub use_rk: bool,
    /// Write the EXTSST index after the SST (default: true)
    pub write_extsst: bool,
    /// Check the produced stream with the sanity checker (default: false)
    pub run_sanity_check: bool,
}

impl Default for XlsWriteOptions {
    fn default() -> Self {
        Self {
            use_rk: true,
            write_extsst: true,
            run_sanity_check: false,
        }
    }
}

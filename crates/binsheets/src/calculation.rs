//! Workbook calculation engine
//!
//! Recalculates formula cells in dependency order, detects circular
//! references and optionally iterates them, and recalculates volatile
//! functions on demand.
//!
//! # Example
//!
//! ```rust
//! use binsheets::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 20.0).unwrap();
//! sheet.set_cell_formula("A3", "=A1+A2").unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! ```

use crate::{
    evaluate, function_registry, parse_formula, CellError, CellKey, CellType, CellValue,
    DependencyGraph, Error, EvaluationContext, FormulaExpr, FormulaValue, Result, Workbook,
};
use std::collections::{BTreeSet, HashMap};

/// Options for workbook calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Recalculate every formula; otherwise only formulas without a cached
    /// result, volatile formulas and whatever depends on them (default: true)
    pub force_full_calculation: bool,
    /// Recalculate formulas that call NOW, TODAY or RAND (default: true)
    pub calculate_volatile: bool,
    /// Iterate circular references instead of marking them `#REF!`
    /// (default: false)
    pub iterative: bool,
    /// Upper bound on passes over circular references (default: 100)
    pub max_iterations: u32,
    /// Largest change between passes that counts as converged (default: 0.001)
    pub max_change: f64,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            force_full_calculation: true,
            calculate_volatile: true,
            iterative: false,
            max_iterations: 100,
            max_change: 0.001,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of cells calculated
    pub cells_calculated: usize,
    /// Number of iterations performed (for circular references)
    pub iterations: u32,
    /// Number of cells on circular references
    pub circular_references: usize,
    /// Number of volatile formula cells
    pub volatile_cells: usize,
    /// Number of formulas that did not parse or evaluate
    pub errors: usize,
    /// Whether iterative calculation converged
    pub converged: bool,
}

/// Extension trait for Workbook to add calculation methods
pub trait WorkbookCalculationExt {
    /// Calculate all formulas in the workbook with default options
    fn calculate(&mut self) -> Result<CalculationStats>;

    /// Calculate all formulas with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats>;

    /// Evaluate one cell against the current cached values without storing
    /// anything; non-formula cells return their value
    fn evaluate_cell(&self, sheet: usize, row: u32, col: u16) -> Result<CellValue>;

    /// Evaluate a formula cell and store its cached result
    ///
    /// Returns the type of the result, or the cell's own type when it holds
    /// no formula.
    fn evaluate_formula_cell(&mut self, sheet: usize, row: u32, col: u16) -> Result<CellType>;

    /// Evaluate a formula cell and replace the formula with its result
    fn evaluate_in_cell(&mut self, sheet: usize, row: u32, col: u16) -> Result<CellValue>;
}

impl WorkbookCalculationExt for Workbook {
    fn calculate(&mut self) -> Result<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats> {
        let mut engine = CalculationEngine::new(options.clone());
        engine.calculate_all(self)
    }

    fn evaluate_cell(&self, sheet: usize, row: u32, col: u16) -> Result<CellValue> {
        let ws = self
            .worksheet(sheet)
            .ok_or(Error::SheetOutOfBounds(sheet, self.sheet_count()))?;
        match ws.get_formula_at(row, col) {
            Some(text) => {
                let ast = parse_formula(text).map_err(|e| {
                    Error::other(format!("formula at {}: {}", CellKey::new(sheet, row, col), e))
                })?;
                Ok(evaluate_at(self, &ast, CellKey::new(sheet, row, col)))
            }
            None => Ok(ws.get_value_at(row, col)),
        }
    }

    fn evaluate_formula_cell(&mut self, sheet: usize, row: u32, col: u16) -> Result<CellType> {
        let value = self.evaluate_cell(sheet, row, col)?;
        let count = self.sheet_count();
        let ws = self
            .worksheet_mut(sheet)
            .ok_or(Error::SheetOutOfBounds(sheet, count))?;
        if ws.get_formula_at(row, col).is_none() {
            return Ok(ws.cell_type_at(row, col));
        }
        let result_type = value.cell_type();
        ws.set_formula_result(row, col, value)?;
        Ok(result_type)
    }

    fn evaluate_in_cell(&mut self, sheet: usize, row: u32, col: u16) -> Result<CellValue> {
        let value = self.evaluate_cell(sheet, row, col)?;
        let count = self.sheet_count();
        let ws = self
            .worksheet_mut(sheet)
            .ok_or(Error::SheetOutOfBounds(sheet, count))?;
        if ws.get_formula_at(row, col).is_some() {
            ws.set_cell_value_at(row, col, value.clone())?;
        }
        Ok(value)
    }
}

/// Evaluate a parsed formula for `key`, turning evaluator failures into
/// `#VALUE!`
fn evaluate_at(workbook: &Workbook, ast: &FormulaExpr, key: CellKey) -> CellValue {
    let ctx = EvaluationContext::new(Some(workbook), key.sheet, key.row, key.col);
    match evaluate(ast, &ctx) {
        Ok(value) => value.into(),
        Err(e) => {
            log::warn!("evaluation of {} failed: {}", key, e);
            FormulaValue::Error(CellError::Value).into()
        }
    }
}

/// The calculation engine
struct CalculationEngine {
    options: CalculationOptions,
    /// Parsed formula ASTs, keyed by CellKey
    parsed_formulas: HashMap<CellKey, FormulaExpr>,
    /// Cells whose formula calls a volatile function
    volatile_cells: BTreeSet<CellKey>,
}

impl CalculationEngine {
    fn new(options: CalculationOptions) -> Self {
        Self {
            options,
            parsed_formulas: HashMap::new(),
            volatile_cells: BTreeSet::new(),
        }
    }

    fn calculate_all(&mut self, workbook: &mut Workbook) -> Result<CalculationStats> {
        let mut stats = CalculationStats::default();
        self.collect_formulas(workbook, &mut stats);
        if stats.formula_count == 0 {
            stats.converged = true;
            return Ok(stats);
        }

        let graph = DependencyGraph::from_workbook(workbook);
        let (order, cyclic) = graph.ordered_with_cycles();
        stats.circular_references = cyclic.len();
        let dirty = self.dirty_cells(workbook, &graph);

        let order: Vec<CellKey> = order.into_iter().filter(|k| dirty.contains(k)).collect();
        if cyclic.is_empty() || !self.options.iterative {
            for &key in &cyclic {
                log::warn!("circular reference at {}", key);
                store_result(workbook, key, CellValue::Error(CellError::Ref));
                stats.errors += 1;
            }
            self.calculate_in_order(workbook, &order, &mut stats);
            stats.iterations = 1;
            stats.converged = true;
        } else {
            self.calculate_iteratively(workbook, &cyclic, &order, &mut stats);
        }

        log::debug!(
            "calculated {} of {} formulas ({} circular)",
            stats.cells_calculated,
            stats.formula_count,
            stats.circular_references
        );
        Ok(stats)
    }

    fn collect_formulas(&mut self, workbook: &Workbook, stats: &mut CalculationStats) {
        for (sheet_idx, sheet) in workbook.worksheets().enumerate() {
            for (row, col, text) in sheet.formula_cells() {
                let key = CellKey::new(sheet_idx, row, col);
                stats.formula_count += 1;
                match parse_formula(text) {
                    Ok(ast) => {
                        if contains_volatile_function(&ast) {
                            self.volatile_cells.insert(key);
                        }
                        self.parsed_formulas.insert(key, ast);
                    }
                    Err(e) => {
                        log::warn!("formula at {} does not parse: {}", key, e);
                        stats.errors += 1;
                    }
                }
            }
        }
        stats.volatile_cells = self.volatile_cells.len();
    }

    /// Cells to recalculate: the seeds chosen by the options plus every
    /// formula that depends on a seed
    fn dirty_cells(&self, workbook: &Workbook, graph: &DependencyGraph) -> BTreeSet<CellKey> {
        let has_cache = |key: &CellKey| {
            workbook
                .worksheet(key.sheet)
                .and_then(|s| s.cell_at(key.row, key.col))
                .map_or(false, |c| matches!(&c.value, CellValue::Formula { cached_value: Some(_), .. }))
        };
        let seeds: Vec<CellKey> = self
            .parsed_formulas
            .keys()
            .copied()
            .filter(|key| {
                let volatile = self.volatile_cells.contains(key);
                if volatile && !self.options.calculate_volatile {
                    return !has_cache(key);
                }
                self.options.force_full_calculation || volatile || !has_cache(key)
            })
            .collect();

        let mut dirty = BTreeSet::new();
        let mut stack = seeds;
        while let Some(key) = stack.pop() {
            if dirty.insert(key) {
                stack.extend(graph.get_dependents(key));
            }
        }
        dirty.retain(|k| self.parsed_formulas.contains_key(k));
        dirty
    }

    fn calculate_in_order(
        &self,
        workbook: &mut Workbook,
        order: &[CellKey],
        stats: &mut CalculationStats,
    ) {
        for &key in order {
            if let Some(ast) = self.parsed_formulas.get(&key) {
                let value = evaluate_at(workbook, ast, key);
                store_result(workbook, key, value);
                stats.cells_calculated += 1;
            }
        }
    }

    /// Evaluate the cells on cycles against their previous results until the
    /// largest numeric change drops to `max_change`, then the rest in order
    fn calculate_iteratively(
        &self,
        workbook: &mut Workbook,
        cyclic: &[CellKey],
        order: &[CellKey],
        stats: &mut CalculationStats,
    ) {
        let mut previous: HashMap<CellKey, f64> = HashMap::new();
        stats.converged = false;

        for iteration in 0..self.options.max_iterations {
            stats.iterations = iteration + 1;
            let mut max_change: f64 = 0.0;
            for &key in cyclic {
                let Some(ast) = self.parsed_formulas.get(&key) else {
                    continue;
                };
                let value = evaluate_at(workbook, ast, key);
                if let CellValue::Number(n) = value {
                    let old = previous.insert(key, n).unwrap_or(0.0);
                    max_change = max_change.max((n - old).abs());
                }
                store_result(workbook, key, value);
            }
            if iteration > 0 && max_change <= self.options.max_change {
                stats.converged = true;
                break;
            }
        }
        if !stats.converged {
            log::warn!(
                "circular references did not converge after {} iterations",
                stats.iterations
            );
        }
        stats.cells_calculated += cyclic.len();
        self.calculate_in_order(workbook, order, stats);
    }
}

fn store_result(workbook: &mut Workbook, key: CellKey, value: CellValue) {
    if let Some(sheet) = workbook.worksheet_mut(key.sheet) {
        if let Err(e) = sheet.set_formula_result(key.row, key.col, value) {
            log::warn!("cannot store result at {}: {}", key, e);
        }
    }
}

/// Check if a formula calls a volatile function anywhere
fn contains_volatile_function(expr: &FormulaExpr) -> bool {
    let mut volatile = false;
    expr.walk(&mut |node| {
        if let FormulaExpr::Function { name, .. } = node {
            volatile |= function_registry().is_volatile(name);
        }
    });
    volatile
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_calculation() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();

        sheet.set_cell_value("A1", 10.0).unwrap();
        sheet.set_cell_value("A2", 20.0).unwrap();
        sheet.set_cell_formula("A3", "=A1+A2").unwrap();

        let stats = workbook.calculate().unwrap();

        assert_eq!(stats.formula_count, 1);
        assert_eq!(stats.cells_calculated, 1);
        assert_eq!(stats.errors, 0);

        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.get_calculated_value_at(2, 0), Some(&CellValue::Number(30.0)));
    }

    #[test]
    fn test_chain_calculation() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();

        // declared out of order on purpose
        sheet.set_cell_formula("A4", "=A3*A1").unwrap();
        sheet.set_cell_value("A1", 5.0).unwrap();
        sheet.set_cell_formula("A2", "=A1*2").unwrap();
        sheet.set_cell_formula("A3", "=A2+10").unwrap();

        let stats = workbook.calculate().unwrap();
        assert_eq!(stats.formula_count, 3);
        assert_eq!(stats.cells_calculated, 3);

        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.get_calculated_value_at(1, 0), Some(&CellValue::Number(10.0)));
        assert_eq!(sheet.get_calculated_value_at(2, 0), Some(&CellValue::Number(20.0)));
        assert_eq!(sheet.get_calculated_value_at(3, 0), Some(&CellValue::Number(100.0)));
    }

    #[test]
    fn test_circular_reference_detection() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "=B1").unwrap();
        sheet.set_cell_formula("B1", "=A1").unwrap();
        sheet.set_cell_formula("C1", "=1+1").unwrap();

        let stats = workbook.calculate().unwrap();

        assert_eq!(stats.circular_references, 2);
        assert_eq!(stats.errors, 2);
        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(
            sheet.get_calculated_value_at(0, 0),
            Some(&CellValue::Error(CellError::Ref))
        );
        assert_eq!(sheet.get_calculated_value_at(0, 2), Some(&CellValue::Number(2.0)));
    }

    #[test]
    fn test_iterative_calculation() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();

        // B1 = A1, A1 = B1/2 + 0.5 converges to 1
        sheet.set_cell_formula("B1", "=A1").unwrap();
        sheet.set_cell_formula("A1", "=B1/2+0.5").unwrap();

        let options = CalculationOptions {
            iterative: true,
            max_iterations: 100,
            max_change: 0.0001,
            ..Default::default()
        };
        let stats = workbook.calculate_with_options(&options).unwrap();

        assert!(stats.converged);
        let a1 = workbook
            .worksheet(0)
            .unwrap()
            .get_calculated_value_at(0, 0)
            .and_then(CellValue::as_number)
            .unwrap();
        assert!((a1 - 1.0).abs() < 0.01, "got {a1}");
    }

    #[test]
    fn test_volatile_function_detection() {
        let volatile = |f: &str| contains_volatile_function(&parse_formula(f).unwrap());
        assert!(volatile("=NOW()"));
        assert!(volatile("=TODAY()"));
        assert!(volatile("=RAND()"));
        assert!(volatile("=IF(A1>0,NOW(),0)"));
        assert!(!volatile("=SUM(A1:A10)"));
    }

    #[test]
    fn test_partial_calculation_keeps_cached_results() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 4.0).unwrap();
        sheet
            .set_cell_value("B1", CellValue::formula_with_result("A1*2", CellValue::Number(-1.0)))
            .unwrap();
        sheet.set_cell_formula("C1", "A1*3").unwrap();
        sheet.set_cell_formula("D1", "C1+1").unwrap();

        let options = CalculationOptions {
            force_full_calculation: false,
            ..Default::default()
        };
        let stats = workbook.calculate_with_options(&options).unwrap();
        assert_eq!(stats.cells_calculated, 2);

        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.get_calculated_value_at(0, 1), Some(&CellValue::Number(-1.0)));
        assert_eq!(sheet.get_calculated_value_at(0, 2), Some(&CellValue::Number(12.0)));
        assert_eq!(sheet.get_calculated_value_at(0, 3), Some(&CellValue::Number(13.0)));
    }

    #[test]
    fn test_volatile_cells_can_be_skipped() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet
            .set_cell_value("A1", CellValue::formula_with_result("RAND()", CellValue::Number(7.0)))
            .unwrap();

        let options = CalculationOptions {
            calculate_volatile: false,
            ..Default::default()
        };
        let stats = workbook.calculate_with_options(&options).unwrap();
        assert_eq!(stats.volatile_cells, 1);
        assert_eq!(stats.cells_calculated, 0);
        assert_eq!(
            workbook.worksheet(0).unwrap().get_calculated_value_at(0, 0),
            Some(&CellValue::Number(7.0))
        );
    }

    #[test]
    fn test_multiple_sheets() {
        let mut workbook = Workbook::new();
        workbook
            .worksheet_mut(0)
            .unwrap()
            .set_cell_value("A1", 100.0)
            .unwrap();
        workbook.add_worksheet_with_name("Sheet2").unwrap();
        let sheet2 = workbook.worksheet_mut(1).unwrap();
        sheet2.set_cell_value("A1", 50.0).unwrap();
        sheet2.set_cell_formula("A2", "=Sheet1!A1+A1").unwrap();

        let stats = workbook.calculate().unwrap();
        assert_eq!(stats.formula_count, 1);
        assert_eq!(
            workbook.worksheet(1).unwrap().get_calculated_value_at(1, 0),
            Some(&CellValue::Number(150.0))
        );
    }

    #[test]
    fn test_evaluate_cell_does_not_store() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 3.0).unwrap();
        sheet.set_cell_formula("B1", "A1*A1").unwrap();

        assert_eq!(workbook.evaluate_cell(0, 0, 1).unwrap(), CellValue::Number(9.0));
        assert_eq!(workbook.evaluate_cell(0, 0, 0).unwrap(), CellValue::Number(3.0));
        assert_eq!(workbook.evaluate_cell(0, 5, 5).unwrap(), CellValue::Empty);
        match workbook.worksheet(0).unwrap().get_value_at(0, 1) {
            CellValue::Formula { cached_value, .. } => assert_eq!(cached_value, None),
            other => panic!("expected a formula, got {other:?}"),
        }
        assert!(workbook.evaluate_cell(3, 0, 0).is_err());
    }

    #[test]
    fn test_evaluate_formula_cell_stores_result() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "\"a\"&\"b\"").unwrap();
        sheet.set_cell_value("A2", true).unwrap();

        assert_eq!(workbook.evaluate_formula_cell(0, 0, 0).unwrap(), CellType::String);
        assert_eq!(workbook.evaluate_formula_cell(0, 1, 0).unwrap(), CellType::Boolean);
        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.get_formula_at(0, 0), Some("\"a\"&\"b\""));
        assert_eq!(
            sheet.get_calculated_value_at(0, 0).and_then(CellValue::as_string),
            Some("ab")
        );
    }

    #[test]
    fn test_evaluate_in_cell_replaces_formula() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_formula("A1", "1/0").unwrap();

        let value = workbook.evaluate_in_cell(0, 0, 0).unwrap();
        assert_eq!(value, CellValue::Error(CellError::Div0));
        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.get_formula_at(0, 0), None);
        assert_eq!(sheet.get_value_at(0, 0), CellValue::Error(CellError::Div0));
    }
}

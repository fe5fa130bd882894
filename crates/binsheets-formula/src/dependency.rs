//! Dependency tracking for formula calculation

use crate::ast::FormulaExpr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use crate::parser::parse_formula;
use binsheets_core::{CellAddress, CellRange, Workbook};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Names nested deeper than this are not followed
const MAX_NAME_DEPTH: u8 = 32;

/// Unique key for a cell (sheet index + address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }

    /// Create from sheet index and cell address
    pub fn from_address(sheet: usize, addr: &CellAddress) -> Self {
        Self::new(sheet, addr.row, addr.col)
    }
}

impl fmt::Display for CellKey {
    /// `[sheet]A1`, with the sheet as its 0-based index
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.sheet, CellAddress::new(self.row, self.col))
    }
}

/// A rectangular area on one sheet that a formula reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaKey {
    pub sheet: usize,
    pub range: CellRange,
}

impl AreaKey {
    pub fn contains(&self, cell: CellKey) -> bool {
        self.sheet == cell.sheet && self.range.contains_cell(cell.row, cell.col)
    }
}

/// Areas a formula reads, with defined names followed to their targets
///
/// References to sheets that do not exist are dropped.
pub fn collect_references(
    expr: &FormulaExpr,
    workbook: &Workbook,
    current_sheet: usize,
) -> Vec<AreaKey> {
    let ctx = EvaluationContext::new(Some(workbook), current_sheet, 0, 0);
    let mut areas = Vec::new();
    collect_into(expr, &ctx, 0, &mut areas);
    areas
}

fn collect_into(expr: &FormulaExpr, ctx: &EvaluationContext, depth: u8, out: &mut Vec<AreaKey>) {
    match expr {
        FormulaExpr::CellRef(_) | FormulaExpr::RangeRef(_) | FormulaExpr::BinaryOp { .. }
            if expr.is_reference() =>
        {
            if let Some(areas) = ctx.reference_areas(expr) {
                out.extend(areas.ranges.into_iter().map(|range| AreaKey {
                    sheet: areas.sheet,
                    range,
                }));
            } else if let FormulaExpr::BinaryOp { left, right, .. } = expr {
                collect_into(left, ctx, depth, out);
                collect_into(right, ctx, depth, out);
            }
        }
        FormulaExpr::NameRef(name) => {
            if depth >= MAX_NAME_DEPTH {
                return;
            }
            if let Some(target) = ctx.name_expression(name) {
                collect_into(&target, ctx, depth + 1, out);
            }
        }
        FormulaExpr::BinaryOp { left, right, .. } => {
            collect_into(left, ctx, depth, out);
            collect_into(right, ctx, depth, out);
        }
        FormulaExpr::UnaryOp { operand, .. } => collect_into(operand, ctx, depth, out),
        FormulaExpr::Function { args, .. } => {
            for arg in args {
                collect_into(arg, ctx, depth, out);
            }
        }
        _ => {}
    }
}

/// Dependency graph for formula cells
///
/// Tracks which formula cells depend on which other formula cells, so a
/// workbook can be calculated in dependency order.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    formula_cells: BTreeSet<CellKey>,
    /// Cell → Cells that depend on it (dependents)
    dependents: BTreeMap<CellKey, BTreeSet<CellKey>>,
    /// Cell → Cells it depends on (precedents)
    precedents: BTreeMap<CellKey, BTreeSet<CellKey>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every formula in the workbook
    ///
    /// Formulas that do not parse are included without precedents.
    pub fn from_workbook(workbook: &Workbook) -> Self {
        let mut graph = Self::new();
        let mut reads: Vec<(CellKey, Vec<AreaKey>)> = Vec::new();

        for (sheet_idx, sheet) in workbook.worksheets().enumerate() {
            for (row, col, text) in sheet.formula_cells() {
                let key = CellKey::new(sheet_idx, row, col);
                graph.add_formula_cell(key);
                match parse_formula(text) {
                    Ok(ast) => reads.push((key, collect_references(&ast, workbook, sheet_idx))),
                    Err(e) => log::debug!("formula at {} does not parse: {}", key, e),
                }
            }
        }

        let formula_cells: Vec<CellKey> = graph.formula_cells.iter().copied().collect();
        for (dependent, areas) in reads {
            for area in areas {
                for &precedent in formula_cells.iter().filter(|c| area.contains(**c)) {
                    graph.add_dependency(precedent, dependent);
                }
            }
        }
        graph
    }

    /// Register a formula cell, whether or not it has precedents
    pub fn add_formula_cell(&mut self, cell: CellKey) {
        self.formula_cells.insert(cell);
    }

    /// Formula cells known to the graph, in sheet/row/column order
    pub fn formula_cells(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.formula_cells.iter().copied()
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellKey, dependent: CellKey) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Remove all dependencies for a cell
    pub fn clear_dependencies(&mut self, cell: CellKey) {
        // Remove from all precedents' dependents list
        if let Some(precedents) = self.precedents.remove(&cell) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&cell);
                }
            }
        }

        // Remove as a precedent for others
        if let Some(dependents) = self.dependents.remove(&cell) {
            for dependent in dependents {
                if let Some(precs) = self.precedents.get_mut(&dependent) {
                    precs.remove(&cell);
                }
            }
        }
    }

    /// Get cells that depend on the given cell
    pub fn get_dependents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Get cells that the given cell depends on
    pub fn get_precedents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Whether a cell depends on itself, directly or through other cells
    pub fn has_circular_reference(&self, cell: CellKey) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<CellKey> = self.get_precedents(cell).collect();
        while let Some(next) = stack.pop() {
            if next == cell {
                return true;
            }
            if visited.insert(next) {
                stack.extend(self.get_precedents(next));
            }
        }
        false
    }

    /// Formula cells in calculation order, and the cells that lie on cycles
    ///
    /// Every cell appears after its precedents. Cells on a cycle are left out
    /// of the order; their dependents are ordered as if they were constants.
    pub fn ordered_with_cycles(&self) -> (Vec<CellKey>, Vec<CellKey>) {
        let cyclic: BTreeSet<CellKey> = self
            .formula_cells
            .iter()
            .copied()
            .filter(|&c| self.has_circular_reference(c))
            .collect();

        let counts = |cell: &CellKey| {
            self.get_precedents(*cell)
                .filter(|p| self.formula_cells.contains(p) && !cyclic.contains(p))
                .count()
        };
        let mut pending: BTreeMap<CellKey, usize> = self
            .formula_cells
            .iter()
            .filter(|c| !cyclic.contains(c))
            .map(|c| (*c, counts(c)))
            .collect();

        let mut ready: VecDeque<CellKey> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(c, _)| *c)
            .collect();
        let mut order = Vec::with_capacity(pending.len());

        while let Some(cell) = ready.pop_front() {
            order.push(cell);
            for dependent in self.get_dependents(cell) {
                if let Some(n) = pending.get_mut(&dependent) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        (order, cyclic.into_iter().collect())
    }

    /// Formula cells in calculation order
    ///
    /// Fails with [`FormulaError::CircularReference`] listing the cells on
    /// cycles.
    pub fn evaluation_order(&self) -> FormulaResult<Vec<CellKey>> {
        let (order, cyclic) = self.ordered_with_cycles();
        if cyclic.is_empty() {
            Ok(order)
        } else {
            Err(FormulaError::CircularReference(cyclic))
        }
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.formula_cells.clear();
        self.dependents.clear();
        self.precedents.clear();
    }
}

use gridcalc_common::{CellAddress, ExcelError, RangeAddress, SheetId};

use super::super::{DependencyGraph, GraphError};
use super::reference_adjuster::{ReferenceAdjuster, ShiftOperation};
use crate::engine::vertex::{Vertex, VertexId, VertexKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    #[error("sheet '{0}' does not exist")]
    UnknownSheet(String),
    #[error("sheet '{0}' already exists")]
    DuplicateSheet(String),
    #[error("sheet names must not be blank")]
    BlankSheetName,
    #[error("sheet id {0} does not exist")]
    InvalidSheetId(SheetId),
    #[error("cell {0} is covered by a spilled array")]
    SpillBlocked(CellAddress),
    #[error("edits are not accepted while a recalculation pass is running")]
    EvaluationInProgress,
    #[error("position out of bounds: row {row}, col {col}")]
    OutOfBounds { row: u64, col: u64 },
    #[error("moves across sheets are not supported")]
    CrossSheetMove,
    #[error("invalid formula: {0}")]
    InvalidFormula(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("{0}")]
    Excel(#[from] ExcelError),
}

/// Outcome of one structural edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftSummary {
    pub vertices_moved: usize,
    pub vertices_deleted: Vec<VertexId>,
    pub ranges_adjusted: usize,
    pub ranges_deleted: usize,
}

/// Vertices a structural edit is about to destroy or rewrite. Computed
/// before the edit so callers can snapshot what undo needs.
#[derive(Debug, Clone, Default)]
pub struct EditPlan {
    /// Cell vertices removed by the edit, at their pre-edit positions.
    pub doomed: Vec<(CellAddress, VertexId)>,
    /// Range vertices whose bounds vanish.
    pub doomed_ranges: Vec<VertexId>,
    /// Range vertices that survive with different membership.
    pub reshaped_ranges: Vec<VertexId>,
    /// Surviving formulas reading any of the above.
    pub rewritten: Vec<VertexId>,
}

fn sheet_range_ids<A>(graph: &DependencyGraph<A>, sheet_id: SheetId) -> Vec<VertexId> {
    let mut ids: Vec<VertexId> = graph
        .sheet_ranges
        .get(&sheet_id)
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default();
    graph.sort_by_seq(&mut ids);
    ids
}

fn range_of<A>(graph: &DependencyGraph<A>, id: VertexId) -> Option<RangeAddress> {
    graph.store.get(id).and_then(Vertex::range).map(|rv| rv.range)
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Col,
}

/// Furthest row or column an insert could shift: stored cells (spill
/// placeholders included) and range vertex ends.
fn furthest<A>(graph: &DependencyGraph<A>, sheet_id: SheetId, axis: Axis) -> Option<u32> {
    let cells = graph.cells.get(&sheet_id).and_then(|index| match axis {
        Axis::Row => index.max_row(),
        Axis::Col => index.max_col(),
    });
    let ranges = graph
        .sheet_ranges
        .get(&sheet_id)
        .into_iter()
        .flatten()
        .filter_map(|id| range_of(graph, *id))
        .map(|r| match axis {
            Axis::Row => r.end_row,
            Axis::Col => r.end_col,
        })
        .max();
    cells.max(ranges)
}

/// Whether a surviving range's member set changes under `op`.
fn reshapes(op: &ShiftOperation, old: &RangeAddress, new: &RangeAddress) -> bool {
    if old.height() != new.height() || old.width() != new.width() {
        return true;
    }
    match op {
        ShiftOperation::MoveRange { source, .. } => {
            !source.contains_range(old)
                && (old.overlaps(source) || op.move_target().is_some_and(|t| old.overlaps(&t)))
        }
        _ => false,
    }
}

impl EditPlan {
    pub fn for_op<A>(graph: &DependencyGraph<A>, op: &ShiftOperation) -> Self {
        let sheet_id = op.sheet_id();
        let mut plan = EditPlan::default();
        if let Some(index) = graph.cells.get(&sheet_id) {
            let at = |(row, col): (u32, u32)| CellAddress::new(sheet_id, row, col);
            plan.doomed = match *op {
                ShiftOperation::InsertRows { .. } | ShiftOperation::InsertColumns { .. } => Vec::new(),
                ShiftOperation::DeleteRows { start, count, .. } => index
                    .iter()
                    .filter(|((r, _), _)| *r >= start && *r - start < count)
                    .map(|(k, id)| (at(k), id))
                    .collect(),
                ShiftOperation::DeleteColumns { start, count, .. } => index
                    .iter()
                    .filter(|((_, c), _)| *c >= start && *c - start < count)
                    .map(|(k, id)| (at(k), id))
                    .collect(),
                ShiftOperation::MoveRange { source, .. } => match op.move_target() {
                    Some(target) => index
                        .cells_in(&target)
                        .map(|(k, id)| (at(k), id))
                        .filter(|(cell, _)| !source.contains(*cell))
                        .collect(),
                    None => Vec::new(),
                },
                ShiftOperation::RemoveSheet { .. } => index.iter().map(|(k, id)| (at(k), id)).collect(),
            };
        }
        for id in sheet_range_ids(graph, sheet_id) {
            let Some(old) = range_of(graph, id) else {
                continue;
            };
            match ReferenceAdjuster::adjust_range(op, old) {
                None => plan.doomed_ranges.push(id),
                Some(new) if reshapes(op, &old, &new) => plan.reshaped_ranges.push(id),
                Some(_) => {}
            }
        }

        let doomed: Vec<VertexId> = plan.doomed.iter().map(|(_, id)| *id).collect();
        let mut rewritten: Vec<VertexId> = doomed
            .iter()
            .chain(&plan.doomed_ranges)
            .chain(&plan.reshaped_ranges)
            .flat_map(|id| graph.dependents(*id))
            .filter(|d| graph.formulas.contains_key(d) && !doomed.contains(d))
            .collect();
        graph.sort_by_seq(&mut rewritten);
        rewritten.dedup();
        plan.rewritten = rewritten;
        plan
    }
}

/// Applies structural edits to a [`DependencyGraph`]: moves cell vertices,
/// adjusts range vertices, removes what the edit destroys, and appends the
/// operation to the transform log so stored formulas catch up lazily.
pub struct VertexEditor<'g, A> {
    graph: &'g mut DependencyGraph<A>,
}

impl<'g, A> VertexEditor<'g, A> {
    pub fn new(graph: &'g mut DependencyGraph<A>) -> Self {
        VertexEditor { graph }
    }

    pub fn insert_rows(&mut self, sheet_id: SheetId, before: u32, count: u32) -> Result<ShiftSummary, EditorError> {
        self.apply(&ShiftOperation::InsertRows {
            sheet_id,
            before,
            count,
        })
    }

    pub fn delete_rows(&mut self, sheet_id: SheetId, start: u32, count: u32) -> Result<ShiftSummary, EditorError> {
        self.apply(&ShiftOperation::DeleteRows {
            sheet_id,
            start,
            count,
        })
    }

    pub fn insert_columns(&mut self, sheet_id: SheetId, before: u32, count: u32) -> Result<ShiftSummary, EditorError> {
        self.apply(&ShiftOperation::InsertColumns {
            sheet_id,
            before,
            count,
        })
    }

    pub fn delete_columns(&mut self, sheet_id: SheetId, start: u32, count: u32) -> Result<ShiftSummary, EditorError> {
        self.apply(&ShiftOperation::DeleteColumns {
            sheet_id,
            start,
            count,
        })
    }

    pub fn move_range(&mut self, source: RangeAddress, dest_row: u32, dest_col: u32) -> Result<ShiftSummary, EditorError> {
        self.apply(&ShiftOperation::MoveRange {
            source,
            dest_row,
            dest_col,
        })
    }

    pub fn remove_sheet(&mut self, sheet_id: SheetId) -> Result<ShiftSummary, EditorError> {
        self.apply(&ShiftOperation::RemoveSheet { sheet_id })
    }

    /// Check `op` against the sheet before anything is touched. `Ok(false)`
    /// marks a no-op edit.
    pub(crate) fn validate(graph: &DependencyGraph<A>, op: &ShiftOperation) -> Result<bool, EditorError> {
        graph.ensure_live_sheet(op.sheet_id())?;
        let out_of_bounds = |row: u64, col: u64| EditorError::OutOfBounds { row, col };
        match *op {
            ShiftOperation::InsertRows {
                sheet_id,
                before,
                count,
            } => {
                if let Some(last) = furthest(graph, sheet_id, Axis::Row).filter(|last| *last >= before) {
                    if last.checked_add(count).is_none() {
                        return Err(out_of_bounds(last as u64 + count as u64, 0));
                    }
                }
                Ok(count > 0)
            }
            ShiftOperation::InsertColumns {
                sheet_id,
                before,
                count,
            } => {
                if let Some(last) = furthest(graph, sheet_id, Axis::Col).filter(|last| *last >= before) {
                    if last.checked_add(count).is_none() {
                        return Err(out_of_bounds(0, last as u64 + count as u64));
                    }
                }
                Ok(count > 0)
            }
            ShiftOperation::DeleteRows { start, count, .. } => {
                if start.checked_add(count).is_none() {
                    return Err(out_of_bounds(start as u64 + count as u64, 0));
                }
                Ok(count > 0)
            }
            ShiftOperation::DeleteColumns { start, count, .. } => {
                if start.checked_add(count).is_none() {
                    return Err(out_of_bounds(0, start as u64 + count as u64));
                }
                Ok(count > 0)
            }
            ShiftOperation::MoveRange {
                source,
                dest_row,
                dest_col,
            } => {
                let end_row = dest_row as u64 + source.height() as u64 - 1;
                let end_col = dest_col as u64 + source.width() as u64 - 1;
                if end_row > u32::MAX as u64 || end_col > u32::MAX as u64 {
                    return Err(out_of_bounds(end_row, end_col));
                }
                Ok(source.start_row != dest_row || source.start_col != dest_col)
            }
            ShiftOperation::RemoveSheet { .. } => Ok(true),
        }
    }

    /// Apply one structural edit. No-op edits (zero counts, moves onto
    /// themselves) leave the graph and the transform log untouched.
    pub fn apply(&mut self, op: &ShiftOperation) -> Result<ShiftSummary, EditorError> {
        if !Self::validate(self.graph, op)? {
            return Ok(ShiftSummary::default());
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("structural_edit", op = ?op).entered();

        let sheet_id = op.sheet_id();
        self.graph.release_spills_on_sheet(sheet_id);
        let plan = EditPlan::for_op(self.graph, op);
        let mut summary = ShiftSummary::default();

        for (_, id) in &plan.doomed {
            if self.graph.store.contains(*id) {
                self.remove_and_reseed(*id)?;
                summary.vertices_deleted.push(*id);
            }
        }

        if matches!(op, ShiftOperation::RemoveSheet { .. }) {
            for id in sheet_range_ids(self.graph, sheet_id) {
                if self.graph.store.contains(id) {
                    self.remove_and_reseed(id)?;
                    summary.ranges_deleted += 1;
                }
            }
            self.graph.cells.remove(&sheet_id);
            self.graph.sheet_ranges.remove(&sheet_id);
            self.graph.sheets.remove(sheet_id);
        } else {
            summary.vertices_moved = self.relocate_cells(op);
            self.adjust_ranges(op, &mut summary)?;
        }

        self.graph.transforms.push(op.clone());
        Ok(summary)
    }

    fn remove_and_reseed(&mut self, id: VertexId) -> Result<(), GraphError> {
        for dependent in self.graph.remove_vertex(id, true)? {
            self.graph.mark_dirty(dependent);
        }
        Ok(())
    }

    /// Re-key surviving cell vertices to their post-edit positions.
    fn relocate_cells(&mut self, op: &ShiftOperation) -> usize {
        let sheet_id = op.sheet_id();
        let Some(index) = self.graph.cells.get_mut(&sheet_id) else {
            return 0;
        };
        let moving: Vec<((u32, u32), VertexId)> = match *op {
            ShiftOperation::InsertRows { before, .. } => index.split_rows(before),
            ShiftOperation::DeleteRows { start, count, .. } => index.split_rows(start + count),
            ShiftOperation::InsertColumns { before, .. } => index.split_cols(before),
            ShiftOperation::DeleteColumns { start, count, .. } => index.split_cols(start + count),
            ShiftOperation::MoveRange { source, .. } => {
                let keys: Vec<_> = index.cells_in(&source).collect();
                for ((row, col), _) in &keys {
                    index.remove(*row, *col);
                }
                keys
            }
            ShiftOperation::RemoveSheet { .. } => Vec::new(),
        };

        let mut moved = 0;
        let mut lost = Vec::new();
        for ((row, col), id) in moving {
            let old = CellAddress::new(sheet_id, row, col);
            match ReferenceAdjuster::adjust_cell(op, old) {
                Some(new) => {
                    index.insert(new.row, new.col, id);
                    if let Some(v) = self.graph.store.get_mut(id) {
                        v.addr = Some(new);
                    }
                    if new != old {
                        moved += 1;
                    }
                }
                None => lost.push(id),
            }
        }
        debug_assert!(lost.is_empty(), "surviving cells must have a destination");
        moved
    }

    /// Re-key range vertices. Vanished ranges are removed, reshaped ones get
    /// fresh members and a cleared cache, and ranges that land on the same
    /// bounds are merged.
    fn adjust_ranges(&mut self, op: &ShiftOperation, summary: &mut ShiftSummary) -> Result<(), EditorError> {
        let ids = sheet_range_ids(self.graph, op.sheet_id());
        for id in &ids {
            if let Some(range) = range_of(self.graph, *id) {
                if self.graph.ranges.get(&range) == Some(id) {
                    self.graph.ranges.remove(&range);
                }
            }
        }

        for id in ids {
            let Some(old) = range_of(self.graph, id) else {
                continue;
            };
            let Some(new) = ReferenceAdjuster::adjust_range(op, old) else {
                self.remove_and_reseed(id)?;
                summary.ranges_deleted += 1;
                continue;
            };
            let reshaped = reshapes(op, &old, &new);
            if let Some(v) = self.graph.store.get_mut(id) {
                if let VertexKind::Range(rv) = &mut v.kind {
                    rv.range = new;
                }
            }
            let survivor = match self.graph.ranges.get(&new).copied() {
                Some(existing) => {
                    self.merge_range_into(id, existing)?;
                    existing
                }
                None => {
                    self.graph.ranges.insert(new, id);
                    id
                }
            };
            if reshaped || survivor != id {
                self.refresh_range(survivor)?;
            }
            if new != old {
                summary.ranges_adjusted += 1;
            }
        }
        Ok(())
    }

    /// Re-point every reader of `from` at `into`, then drop `from`.
    fn merge_range_into(&mut self, from: VertexId, into: VertexId) -> Result<(), GraphError> {
        for dependent in self.graph.dependents(from) {
            let mut precedents = self.graph.precedents(dependent);
            for p in precedents.iter_mut() {
                if *p == from {
                    *p = into;
                }
            }
            self.graph.set_precedents(dependent, &precedents)?;
        }
        if self.graph.store.contains(from) {
            self.graph.remove_vertex(from, true)?;
        }
        Ok(())
    }

    fn refresh_range(&mut self, id: VertexId) -> Result<(), GraphError> {
        let Some(range) = range_of(self.graph, id) else {
            return Ok(());
        };
        let members = self.graph.cells_in(&range);
        self.graph.set_precedents(id, &members)?;
        if let Some(rv) = self.graph.store.get(id).and_then(Vertex::range) {
            rv.cache.invalidate();
        }
        self.graph.mark_dirty(id);
        Ok(())
    }
}

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use gridcalc_common::{CellAddress, ExcelError, LiteralValue, RangeAddress, SheetId};
use rustc_hash::FxHasher;

use super::graph::DependencyGraph;
use super::graph::editor::{
    CellContent, ChangeEvent, ChangeLog, Displaced, EditPlan, EditorError, ShiftOperation,
    ShiftSummary, UndoEngine, VertexEditor,
};
use super::range_cache::{ErrorPolicy, RangeCacheCounters, Reduction, ReductionKind};
use super::scheduler::{ScheduleStep, Scheduler};
use super::vertex::{VertexId, VertexKind};
use super::{EvalConfig, EvalPhase, EvalResult};
use crate::function_registry::BuiltinProvider;
use crate::traits::{EvaluationContext, Function, FunctionProvider, Interpreter};

type QueuedWrites = RefCell<Vec<(CellAddress, LiteralValue)>>;

/// Result of an internal edit: its outcome plus the event to log, if the
/// edit changed anything.
type Edit<T, A> = (T, Option<ChangeEvent<A>>);

pub struct Engine<I: Interpreter> {
    graph: DependencyGraph<I::Ast>,
    interpreter: I,
    provider: Arc<dyn FunctionProvider>,
    config: EvalConfig,
    phase: EvalPhase,
    recalc_epoch: u64,
    evaluations: u64,
    change_log: ChangeLog<I::Ast>,
    undo: UndoEngine<I::Ast>,
    queued: QueuedWrites,
}

impl<I: Interpreter> Engine<I> {
    /// Engine using the global builtin function registry.
    pub fn new(interpreter: I, config: EvalConfig) -> Self {
        Self::with_provider(interpreter, Arc::new(BuiltinProvider), config)
    }

    pub fn with_provider(
        interpreter: I,
        provider: Arc<dyn FunctionProvider>,
        config: EvalConfig,
    ) -> Self {
        let mut change_log = ChangeLog::new();
        change_log.set_enabled(config.change_log_enabled);
        Engine {
            graph: DependencyGraph::with_cache_options(
                config.range_cache_enabled,
                config.range_decomposition_enabled,
            ),
            interpreter,
            provider,
            config,
            phase: EvalPhase::Idle,
            recalc_epoch: 0,
            evaluations: 0,
            change_log,
            undo: UndoEngine::new(),
            queued: RefCell::new(Vec::new()),
        }
    }

    pub fn graph(&self) -> &DependencyGraph<I::Ast> {
        &self.graph
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn phase(&self) -> EvalPhase {
        self.phase
    }

    pub fn recalc_epoch(&self) -> u64 {
        self.recalc_epoch
    }

    /// Formula evaluations since the engine was created.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations
    }

    pub fn range_cache_stats(&self) -> RangeCacheCounters {
        self.graph.range_cache_stats()
    }

    pub fn change_log(&self) -> &ChangeLog<I::Ast> {
        &self.change_log
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    fn ensure_idle(&self) -> Result<(), EditorError> {
        if self.phase == EvalPhase::Idle {
            Ok(())
        } else {
            Err(EditorError::EvaluationInProgress)
        }
    }

    /// Log a user edit. Any new edit invalidates the redo stack.
    fn commit<T>(&mut self, (out, event): Edit<T, I::Ast>) -> T {
        if let Some(event) = event {
            self.undo.clear();
            self.change_log.record(event);
        }
        out
    }

    /* ───────────────────────────── sheets ───────────────────────────── */

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.graph.sheet_id(name)
    }

    pub fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.graph.sheet_name(id)
    }

    fn require_sheet(&self, name: &str) -> Result<SheetId, EditorError> {
        self.graph
            .sheet_id(name)
            .ok_or_else(|| EditorError::UnknownSheet(name.to_string()))
    }

    pub fn add_sheet(&mut self, name: &str) -> Result<SheetId, EditorError> {
        self.ensure_idle()?;
        let edit = self.add_sheet_inner(name)?;
        Ok(self.commit(edit))
    }

    fn add_sheet_inner(&mut self, name: &str) -> Result<Edit<SheetId, I::Ast>, EditorError> {
        if name.trim().is_empty() {
            return Err(EditorError::BlankSheetName);
        }
        if self.graph.sheet_id(name).is_some() {
            return Err(EditorError::DuplicateSheet(name.to_string()));
        }
        let (id, _) = self.graph.add_sheet(name);
        // Formulas that named this sheet before it existed.
        for waiting in self.graph.take_unresolved(name) {
            self.materialize(waiting);
            let refs = match self.graph.formula(waiting) {
                Some(record) => self.interpreter.references(&record.ast),
                None => continue,
            };
            self.graph.relink_formula(waiting, &refs)?;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(sheet = name, id, "sheet added");
        Ok((id, Some(ChangeEvent::AddSheet { name: name.to_string() })))
    }

    /// Remove a sheet. References into it become `#REF!`.
    pub fn remove_sheet(&mut self, name: &str) -> Result<ShiftSummary, EditorError> {
        self.ensure_idle()?;
        let sheet_id = self.require_sheet(name)?;
        let edit = self.run_structural(ShiftOperation::RemoveSheet { sheet_id })?;
        Ok(self.commit(edit))
    }

    /* ─────────────────────────── cell contents ──────────────────────── */

    pub fn set_cell_value(&mut self, addr: CellAddress, value: LiteralValue) -> Result<(), EditorError> {
        self.set_cell_content(addr, CellContent::Value(value))
    }

    pub fn set_cell_formula(&mut self, addr: CellAddress, ast: I::Ast) -> Result<(), EditorError> {
        self.set_cell_content(addr, CellContent::Formula(ast))
    }

    pub fn clear_cell(&mut self, addr: CellAddress) -> Result<(), EditorError> {
        self.set_cell_content(addr, CellContent::Empty)
    }

    pub fn set_cell_content(&mut self, addr: CellAddress, content: CellContent<I::Ast>) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let edit = self.write_content(addr, content)?;
        self.commit(edit);
        Ok(())
    }

    fn write_content(
        &mut self,
        addr: CellAddress,
        content: CellContent<I::Ast>,
    ) -> Result<Edit<(), I::Ast>, EditorError> {
        self.graph.ensure_live_sheet(addr.sheet_id)?;
        if let Some(id) = self.graph.vertex_for_cell(addr) {
            self.materialize(id);
        }
        let old = self.graph.cell_content(addr);
        match &content {
            CellContent::Empty => self.graph.clear_cell(addr)?,
            CellContent::Value(LiteralValue::Empty) => self.graph.clear_cell(addr)?,
            CellContent::Value(v) => {
                self.graph.set_cell_value(addr, v.clone())?;
            }
            CellContent::Formula(ast) => {
                let refs = self.interpreter.references(ast);
                let volatile = self
                    .interpreter
                    .function_names(ast)
                    .iter()
                    .any(|name| self.provider.is_volatile(name));
                self.graph.set_cell_formula(addr, ast.clone(), &refs, volatile)?;
            }
        }
        Ok(((), Some(ChangeEvent::SetContent { addr, old, new: content })))
    }

    /// Value shown at `addr`; spilled array elements included.
    pub fn get_cell_value(&self, addr: CellAddress) -> LiteralValue {
        self.graph.cell_value(addr)
    }

    /// Formula stored at `addr` with every structural edit applied.
    pub fn get_formula(&mut self, addr: CellAddress) -> Option<I::Ast> {
        let id = self.graph.vertex_for_cell(addr)?;
        self.materialize(id);
        self.graph.formula(id).map(|r| r.ast.clone())
    }

    /// Bring a formula's AST up to date with the transform log.
    fn materialize(&mut self, id: VertexId) {
        let interpreter = &self.interpreter;
        self.graph
            .normalize_formula(id, |ast, f| interpreter.rewrite_references(ast, f));
    }

    fn compact_if_needed(&mut self) {
        if self.graph.transforms().pending_len() <= self.config.transform_log_compaction_threshold {
            return;
        }
        for id in self.graph.formula_ids() {
            self.materialize(id);
        }
        self.graph.compact_transforms();
        #[cfg(feature = "tracing")]
        tracing::debug!("transform log compacted");
    }

    /* ───────────────────────── structural edits ─────────────────────── */

    pub fn insert_rows(&mut self, sheet: &str, before: u32, count: u32) -> Result<ShiftSummary, EditorError> {
        self.ensure_idle()?;
        let sheet_id = self.require_sheet(sheet)?;
        let edit = self.run_structural(ShiftOperation::InsertRows {
            sheet_id,
            before,
            count,
        })?;
        Ok(self.commit(edit))
    }

    pub fn delete_rows(&mut self, sheet: &str, start: u32, count: u32) -> Result<ShiftSummary, EditorError> {
        self.ensure_idle()?;
        let sheet_id = self.require_sheet(sheet)?;
        let edit = self.run_structural(ShiftOperation::DeleteRows {
            sheet_id,
            start,
            count,
        })?;
        Ok(self.commit(edit))
    }

    pub fn insert_columns(&mut self, sheet: &str, before: u32, count: u32) -> Result<ShiftSummary, EditorError> {
        self.ensure_idle()?;
        let sheet_id = self.require_sheet(sheet)?;
        let edit = self.run_structural(ShiftOperation::InsertColumns {
            sheet_id,
            before,
            count,
        })?;
        Ok(self.commit(edit))
    }

    pub fn delete_columns(&mut self, sheet: &str, start: u32, count: u32) -> Result<ShiftSummary, EditorError> {
        self.ensure_idle()?;
        let sheet_id = self.require_sheet(sheet)?;
        let edit = self.run_structural(ShiftOperation::DeleteColumns {
            sheet_id,
            start,
            count,
        })?;
        Ok(self.commit(edit))
    }

    /// Cut `source` and paste it with its top-left corner at
    /// `(dest_row, dest_col)` on the same sheet.
    pub fn move_range(&mut self, source: RangeAddress, dest_row: u32, dest_col: u32) -> Result<ShiftSummary, EditorError> {
        self.ensure_idle()?;
        let edit = self.run_structural(ShiftOperation::MoveRange {
            source,
            dest_row,
            dest_col,
        })?;
        Ok(self.commit(edit))
    }

    /// Apply a structural edit, capturing what undo needs to restore.
    fn run_structural(&mut self, op: ShiftOperation) -> Result<Edit<ShiftSummary, I::Ast>, EditorError> {
        if !VertexEditor::validate(&self.graph, &op)? {
            return Ok((ShiftSummary::default(), None));
        }
        let version = self.graph.transforms().version();
        let plan = EditPlan::for_op(&self.graph, &op);
        for id in plan.doomed.iter().map(|(_, id)| *id).chain(plan.rewritten.iter().copied()) {
            self.materialize(id);
        }
        let displaced = Displaced {
            cells: plan
                .doomed
                .iter()
                .map(|(addr, _)| (*addr, self.graph.cell_content(*addr)))
                .filter(|(_, content)| !content.is_empty())
                .collect(),
            rewritten: plan
                .rewritten
                .iter()
                .filter_map(|id| {
                    let addr = self.graph.vertex(*id)?.addr?;
                    Some((addr, self.graph.formula(*id)?.ast.clone()))
                })
                .collect(),
        };
        let sheet_name = self.graph.sheet_name(op.sheet_id()).map(str::to_string);

        let summary = VertexEditor::new(&mut self.graph).apply(&op)?;
        if self.graph.transforms().version() == version {
            return Ok((summary, None));
        }
        self.compact_if_needed();

        let event = match op {
            ShiftOperation::InsertRows {
                sheet_id,
                before,
                count,
            } => ChangeEvent::InsertRows {
                sheet_id,
                before,
                count,
            },
            ShiftOperation::DeleteRows {
                sheet_id,
                start,
                count,
            } => ChangeEvent::DeleteRows {
                sheet_id,
                start,
                count,
                displaced,
            },
            ShiftOperation::InsertColumns {
                sheet_id,
                before,
                count,
            } => ChangeEvent::InsertColumns {
                sheet_id,
                before,
                count,
            },
            ShiftOperation::DeleteColumns {
                sheet_id,
                start,
                count,
            } => ChangeEvent::DeleteColumns {
                sheet_id,
                start,
                count,
                displaced,
            },
            ShiftOperation::MoveRange {
                source,
                dest_row,
                dest_col,
            } => ChangeEvent::MoveRange {
                source,
                dest_row,
                dest_col,
                displaced,
            },
            ShiftOperation::RemoveSheet { .. } => ChangeEvent::RemoveSheet {
                name: sheet_name.unwrap_or_default(),
                displaced,
            },
        };
        Ok((summary, Some(event)))
    }

    /* ──────────────────────────── undo / redo ───────────────────────── */

    /// Group every edit until the matching `end_action` into one undo step.
    pub fn begin_action(&mut self, description: &str) {
        self.change_log.begin_compound(description);
    }

    pub fn end_action(&mut self) {
        self.change_log.end_compound();
    }

    /// Revert the latest action. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        self.ensure_idle()?;
        let mut log = mem::take(&mut self.change_log);
        let mut undo = mem::take(&mut self.undo);
        let outcome = undo.undo(&mut log, &mut |event| self.apply_inverse(event));
        self.change_log = log;
        self.undo = undo;
        outcome
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        self.ensure_idle()?;
        let mut log = mem::take(&mut self.change_log);
        let mut undo = mem::take(&mut self.undo);
        let outcome = undo.redo(&mut log, &mut |event| self.apply_forward(event));
        self.change_log = log;
        self.undo = undo;
        outcome
    }

    fn restore(&mut self, displaced: &Displaced<I::Ast>) -> Result<(), EditorError> {
        for (addr, content) in &displaced.cells {
            self.write_content(*addr, content.clone())?;
        }
        for (addr, ast) in &displaced.rewritten {
            self.write_content(*addr, CellContent::Formula(ast.clone()))?;
        }
        Ok(())
    }

    fn apply_inverse(&mut self, event: &ChangeEvent<I::Ast>) -> Result<(), EditorError> {
        match event {
            ChangeEvent::SetContent { addr, old, .. } => {
                self.write_content(*addr, old.clone())?;
            }
            ChangeEvent::InsertRows {
                sheet_id,
                before,
                count,
            } => {
                self.run_structural(ShiftOperation::DeleteRows {
                    sheet_id: *sheet_id,
                    start: *before,
                    count: *count,
                })?;
            }
            ChangeEvent::DeleteRows {
                sheet_id,
                start,
                count,
                displaced,
            } => {
                self.run_structural(ShiftOperation::InsertRows {
                    sheet_id: *sheet_id,
                    before: *start,
                    count: *count,
                })?;
                self.restore(displaced)?;
            }
            ChangeEvent::InsertColumns {
                sheet_id,
                before,
                count,
            } => {
                self.run_structural(ShiftOperation::DeleteColumns {
                    sheet_id: *sheet_id,
                    start: *before,
                    count: *count,
                })?;
            }
            ChangeEvent::DeleteColumns {
                sheet_id,
                start,
                count,
                displaced,
            } => {
                self.run_structural(ShiftOperation::InsertColumns {
                    sheet_id: *sheet_id,
                    before: *start,
                    count: *count,
                })?;
                self.restore(displaced)?;
            }
            ChangeEvent::MoveRange {
                source,
                dest_row,
                dest_col,
                displaced,
            } => {
                let target = RangeAddress::new(
                    source.sheet_id,
                    *dest_row,
                    *dest_col,
                    dest_row + source.height() - 1,
                    dest_col + source.width() - 1,
                );
                self.run_structural(ShiftOperation::MoveRange {
                    source: target,
                    dest_row: source.start_row,
                    dest_col: source.start_col,
                })?;
                self.restore(displaced)?;
            }
            ChangeEvent::AddSheet { name } => {
                let sheet_id = self.require_sheet(name)?;
                let (_, removed) = self.run_structural(ShiftOperation::RemoveSheet { sheet_id })?;
                // Readers of the sheet go back to waiting for it by name.
                if let Some(ChangeEvent::RemoveSheet { displaced, .. }) = removed {
                    for (addr, ast) in displaced.rewritten {
                        self.write_content(addr, CellContent::Formula(ast))?;
                    }
                }
            }
            ChangeEvent::RemoveSheet { name, displaced } => {
                self.add_sheet_inner(name)?;
                self.restore(displaced)?;
            }
        }
        Ok(())
    }

    /// Replay an undone event, returning it as re-recorded now.
    fn apply_forward(&mut self, event: &ChangeEvent<I::Ast>) -> Result<ChangeEvent<I::Ast>, EditorError> {
        let op = match event {
            ChangeEvent::SetContent { addr, new, .. } => {
                let (_, replayed) = self.write_content(*addr, new.clone())?;
                return Ok(replayed.unwrap_or_else(|| event.clone()));
            }
            ChangeEvent::AddSheet { name } => {
                let (_, replayed) = self.add_sheet_inner(name)?;
                return Ok(replayed.unwrap_or_else(|| event.clone()));
            }
            ChangeEvent::RemoveSheet { name, .. } => ShiftOperation::RemoveSheet {
                sheet_id: self.require_sheet(name)?,
            },
            ChangeEvent::InsertRows {
                sheet_id,
                before,
                count,
            } => ShiftOperation::InsertRows {
                sheet_id: *sheet_id,
                before: *before,
                count: *count,
            },
            ChangeEvent::DeleteRows {
                sheet_id,
                start,
                count,
                ..
            } => ShiftOperation::DeleteRows {
                sheet_id: *sheet_id,
                start: *start,
                count: *count,
            },
            ChangeEvent::InsertColumns {
                sheet_id,
                before,
                count,
            } => ShiftOperation::InsertColumns {
                sheet_id: *sheet_id,
                before: *before,
                count: *count,
            },
            ChangeEvent::DeleteColumns {
                sheet_id,
                start,
                count,
                ..
            } => ShiftOperation::DeleteColumns {
                sheet_id: *sheet_id,
                start: *start,
                count: *count,
            },
            ChangeEvent::MoveRange {
                source,
                dest_row,
                dest_col,
                ..
            } => ShiftOperation::MoveRange {
                source: *source,
                dest_row: *dest_row,
                dest_col: *dest_col,
            },
        };
        let (_, replayed) = self.run_structural(op)?;
        Ok(replayed.unwrap_or_else(|| event.clone()))
    }

    /* ─────────────────────────── recalculation ──────────────────────── */

    fn clock(&self) -> NaiveDateTime {
        self.config.fixed_now.unwrap_or_else(system_now)
    }

    /// Evaluate everything edits have made stale, plus volatile formulas.
    pub fn recalculate(&mut self) -> Result<EvalResult, EditorError> {
        self.ensure_idle()?;
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("recalculate", epoch = self.recalc_epoch).entered();
        let start = Instant::now();
        let now = self.clock();
        let mut result = EvalResult::default();

        let mut seeds = self.graph.take_pending();
        seeds.extend(self.graph.volatiles());
        while !seeds.is_empty() {
            if result.passes > self.config.max_follow_up_passes {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    passes = result.passes,
                    remaining = seeds.len(),
                    "follow-up pass limit reached"
                );
                for id in seeds {
                    self.graph.mark_dirty(id);
                }
                break;
            }
            self.run_pass(&seeds, now, &mut result)?;
            seeds = self.graph.take_pending();
        }

        self.recalc_epoch = self.recalc_epoch.wrapping_add(1);
        result.elapsed = start.elapsed();
        Ok(result)
    }

    fn run_pass(&mut self, seeds: &[VertexId], now: NaiveDateTime, result: &mut EvalResult) -> Result<(), EditorError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("pass", n = result.passes, seeds = seeds.len()).entered();

        self.phase = EvalPhase::Collecting;
        let affected = self.graph.collect_affected(seeds);

        self.phase = EvalPhase::Ordering;
        let schedule = match Scheduler::new(&self.graph).create_schedule(&affected) {
            Ok(schedule) => schedule,
            Err(e) => {
                self.phase = EvalPhase::Idle;
                return Err(e.into());
            }
        };

        self.phase = EvalPhase::Evaluating;
        for step in &schedule.steps {
            match step {
                ScheduleStep::Evaluate(id) => self.evaluate_vertex(*id, now, result),
                ScheduleStep::Cycle(members) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(size = members.len(), "cycle detected");
                    result.cycle_errors += 1;
                    for id in members {
                        self.graph.mark_cycle(*id);
                    }
                }
            }
        }
        for id in &affected {
            self.graph.clear_dirty(*id);
        }
        self.phase = EvalPhase::Idle;
        result.passes += 1;
        self.apply_queued_writes();
        Ok(())
    }

    fn evaluate_vertex(&mut self, id: VertexId, now: NaiveDateTime, result: &mut EvalResult) {
        let Some(vertex) = self.graph.vertex(id) else {
            return;
        };
        let addr = match &vertex.kind {
            VertexKind::Range(rv) => {
                rv.cache.invalidate();
                return;
            }
            VertexKind::Formula { .. } | VertexKind::Array(_) => match vertex.addr {
                Some(addr) => addr,
                None => return,
            },
            VertexKind::Empty | VertexKind::Value(_) => return,
        };
        self.materialize(id);

        let value = {
            let Some(record) = self.graph.formula(id) else {
                return;
            };
            let ctx = EngineContext {
                graph: &self.graph,
                provider: self.provider.as_ref(),
                current: addr,
                seed: cell_seed(self.config.workbook_seed, self.recalc_epoch, addr),
                max_array_cells: self.config.max_array_cells,
                now,
                queued: &self.queued,
            };
            self.interpreter.evaluate(&record.ast, &ctx)
        };
        self.evaluations += 1;
        result.computed_vertices += 1;

        match value {
            LiteralValue::Array(rows) if array_cells(&rows) > self.config.max_array_cells => {
                self.graph.store_result(id, array_too_large(array_cells(&rows)));
            }
            LiteralValue::Array(rows) => {
                self.graph.commit_spill(id, rows);
            }
            scalar => self.graph.store_result(id, scalar),
        }
    }

    /// Writes requested during the pass become ordinary edits.
    fn apply_queued_writes(&mut self) {
        let writes = mem::take(&mut *self.queued.borrow_mut());
        for (addr, value) in writes {
            match self.write_content(addr, CellContent::Value(value)) {
                Ok(edit) => {
                    self.commit(edit);
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(cell = %addr, error = %_e, "queued write dropped");
                }
            }
        }
    }
}

#[cfg(feature = "system-clock")]
fn system_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(not(feature = "system-clock"))]
fn system_now() -> NaiveDateTime {
    NaiveDateTime::default()
}

fn array_cells(rows: &[Vec<LiteralValue>]) -> usize {
    rows.iter().map(Vec::len).sum()
}

/// Error for an array result over the configured cap.
fn array_too_large(cells: impl std::fmt::Display) -> LiteralValue {
    LiteralValue::Error(ExcelError::new_num().with_message(format!("array of {cells} cells is too large")))
}

/// Per-cell RAND seed: stable within one recalculation, fresh across them.
fn cell_seed(workbook_seed: u64, epoch: u64, addr: CellAddress) -> u64 {
    let mut hasher = FxHasher::default();
    workbook_seed.hash(&mut hasher);
    epoch.hash(&mut hasher);
    addr.hash(&mut hasher);
    hasher.finish()
}

/// Read-only view of the graph handed to the interpreter for one cell.
pub struct EngineContext<'a, A> {
    graph: &'a DependencyGraph<A>,
    provider: &'a dyn FunctionProvider,
    current: CellAddress,
    seed: u64,
    max_array_cells: usize,
    now: NaiveDateTime,
    queued: &'a QueuedWrites,
}

impl<A> EvaluationContext for EngineContext<'_, A> {
    fn current_cell(&self) -> CellAddress {
        self.current
    }

    fn resolve_sheet(&self, name: Option<&str>) -> Option<SheetId> {
        self.graph.resolve_sheet(name, self.current.sheet_id)
    }

    fn cell_value(&self, addr: CellAddress) -> LiteralValue {
        self.graph.cell_value(addr)
    }

    fn range_values(&self, range: &RangeAddress) -> Vec<Vec<LiteralValue>> {
        self.graph.range_values(range)
    }

    fn aggregate(&self, range: &RangeAddress, kind: ReductionKind) -> Reduction {
        self.graph.reduce(range, kind, self.error_policy(kind))
    }

    fn error_policy(&self, kind: ReductionKind) -> ErrorPolicy {
        self.provider.reduction_error_policy(kind)
    }

    fn function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.provider.get_function(name)
    }

    fn max_array_cells(&self) -> usize {
        self.max_array_cells
    }

    fn random_seed(&self) -> u64 {
        self.seed
    }

    fn now(&self) -> NaiveDateTime {
        self.now
    }

    fn queue_write(&self, addr: CellAddress, value: LiteralValue) {
        self.queued.borrow_mut().push((addr, value));
    }
}

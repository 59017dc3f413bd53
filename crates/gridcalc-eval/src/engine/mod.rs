//! Dependency graph engine
//!
//! Incremental recalculation over a vertex graph: edits mark vertices dirty,
//! `recalculate` evaluates the forward closure in dependency order, and
//! structural edits rewrite addresses without re-parsing formulas.

pub mod eval;
pub mod graph;
pub mod range_cache;
pub mod scheduler;
pub mod sheet_index;
pub mod sheet_registry;
pub mod vertex;
pub mod vertex_store;

#[cfg(test)]
mod tests;

use std::time::Duration;

use chrono::NaiveDateTime;

pub use eval::{EngineContext, Engine};
pub use graph::editor::{
    ActionGroup, CellContent, ChangeEvent, ChangeLog, Displaced, EditPlan, EditorError,
    ReferenceAdjuster, ShiftOperation, ShiftSummary, TransformLog, UndoEngine, VertexEditor,
};
pub use graph::{DependencyGraph, FormulaRecord, GraphError};
pub use range_cache::{ErrorPolicy, RangeCache, RangeCacheCounters, Reduction, ReductionKind};
pub use scheduler::{Schedule, ScheduleStep, Scheduler};
pub use sheet_registry::SheetRegistry;
pub use vertex::{RangeVertex, SpilledArray, Vertex, VertexFlags, VertexId, VertexKind};

/// Default cap on the cells of one array result.
pub const DEFAULT_MAX_ARRAY_CELLS: usize = 1 << 20;

/// Configuration for the evaluation engine
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Keep reduction results on range vertices between passes.
    pub range_cache_enabled: bool,
    /// On a cache miss, combine a cached sub-range with a scan of the rest.
    pub range_decomposition_enabled: bool,
    /// Extra passes a recalculation may run for spill changes and queued writes.
    pub max_follow_up_passes: usize,
    /// Largest array a formula may build or spill. Bigger results, including
    /// bare range references, evaluate to `#NUM!`.
    pub max_array_cells: usize,
    /// Mixed into every RAND seed.
    pub workbook_seed: u64,
    /// Clock reading for NOW/TODAY. `None` reads the system clock when the
    /// `system-clock` feature is on.
    pub fixed_now: Option<NaiveDateTime>,
    /// Transform-log length at which all formulas are materialized and the
    /// log truncated.
    pub transform_log_compaction_threshold: usize,
    pub change_log_enabled: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            range_cache_enabled: true,
            range_decomposition_enabled: true,
            max_follow_up_passes: 8,
            max_array_cells: DEFAULT_MAX_ARRAY_CELLS,
            workbook_seed: 0xC0FFEE,
            fixed_now: None,
            transform_log_compaction_threshold: 64,
            change_log_enabled: true,
        }
    }
}

impl EvalConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.workbook_seed = seed;
        self
    }

    pub fn with_fixed_now(mut self, now: NaiveDateTime) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn with_max_array_cells(mut self, cells: usize) -> Self {
        self.max_array_cells = cells;
        self
    }

    pub fn with_range_cache(mut self, enabled: bool, decomposition: bool) -> Self {
        self.range_cache_enabled = enabled;
        self.range_decomposition_enabled = decomposition;
        self
    }
}

/// Where a recalculation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalPhase {
    #[default]
    Idle,
    Collecting,
    Ordering,
    Evaluating,
}

/// Statistics of one `recalculate` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalResult {
    /// Formula vertices handed to the interpreter.
    pub computed_vertices: usize,
    /// Cycles found (one per strongly connected component).
    pub cycle_errors: usize,
    pub passes: usize,
    pub elapsed: Duration,
}

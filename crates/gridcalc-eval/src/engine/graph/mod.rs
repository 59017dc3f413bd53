//! Dependency graph over vertex handles.
//!
//! An edge `precedent -> dependent` means "dependent reads precedent". Cell
//! vertices are indexed per sheet by position, range vertices by their exact
//! bounds. Formula ASTs live in a side table together with the transform-log
//! version they were last normalized at.

pub mod editor;

use std::mem;

use gridcalc_common::{
    CellAddress, ExcelErrorKind, LiteralValue, RangeAddress, ReferenceType, SheetId,
};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::range_cache::{ErrorPolicy, RangeCacheCounters, RangeCacheStats, Reduction, ReductionKind};
use super::sheet_index::SheetIndex;
use super::sheet_registry::SheetRegistry;
use super::vertex::{RangeVertex, SpilledArray, Vertex, VertexFlags, VertexId, VertexKind};
use super::vertex_store::VertexStore;
use editor::change_log::CellContent;
use editor::reference_adjuster::ReferenceAdjuster;
use editor::transform_log::TransformLog;
use editor::vertex_editor::EditorError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("invalid vertex handle {0:?}")]
    InvalidHandle(VertexId),
    #[error("vertex {0:?} still has dependents")]
    HasDependents(VertexId),
}

/// Stored formula plus the transform-log version it is normalized at.
#[derive(Debug, Clone)]
pub struct FormulaRecord<A> {
    pub ast: A,
    pub version: u64,
}

#[derive(Debug)]
pub struct DependencyGraph<A> {
    store: VertexStore,
    sheets: SheetRegistry,
    cells: FxHashMap<SheetId, SheetIndex>,
    ranges: FxHashMap<RangeAddress, VertexId>,
    sheet_ranges: FxHashMap<SheetId, FxHashSet<VertexId>>,
    formulas: FxHashMap<VertexId, FormulaRecord<A>>,
    volatiles: FxHashSet<VertexId>,
    pending: FxHashSet<VertexId>,
    /// Non-anchor spill cells -> anchor vertex.
    spill_owner: FxHashMap<CellAddress, VertexId>,
    /// Anchors whose last array result could not spill, with the wanted region.
    blocked_spills: FxHashMap<VertexId, RangeAddress>,
    /// Lower-cased unknown sheet name -> formulas waiting for it.
    unresolved: FxHashMap<String, FxHashSet<VertexId>>,
    transforms: TransformLog,
    range_stats: RangeCacheStats,
    cache_enabled: bool,
    decomposition_enabled: bool,
}

impl<A> Default for DependencyGraph<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> DependencyGraph<A> {
    pub fn new() -> Self {
        DependencyGraph {
            store: VertexStore::new(),
            sheets: SheetRegistry::new(),
            cells: FxHashMap::default(),
            ranges: FxHashMap::default(),
            sheet_ranges: FxHashMap::default(),
            formulas: FxHashMap::default(),
            volatiles: FxHashSet::default(),
            pending: FxHashSet::default(),
            spill_owner: FxHashMap::default(),
            blocked_spills: FxHashMap::default(),
            unresolved: FxHashMap::default(),
            transforms: TransformLog::new(),
            range_stats: RangeCacheStats::default(),
            cache_enabled: true,
            decomposition_enabled: true,
        }
    }

    pub fn with_cache_options(cache_enabled: bool, decomposition_enabled: bool) -> Self {
        DependencyGraph {
            cache_enabled,
            decomposition_enabled,
            ..Self::new()
        }
    }

    /* ───────────────────────────── sheets ───────────────────────────── */

    /// Add (or revive) a sheet. Returns the id and whether it was not live before.
    pub fn add_sheet(&mut self, name: &str) -> (SheetId, bool) {
        let (id, fresh) = self.sheets.add(name);
        self.cells.entry(id).or_default();
        (id, fresh)
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheets.get_id(name)
    }

    pub fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.sheets.name(id)
    }

    pub fn sheet_registry(&self) -> &SheetRegistry {
        &self.sheets
    }

    /// Resolve a reference's sheet name against live sheets; `None` means the
    /// formula's own sheet.
    pub fn resolve_sheet(&self, name: Option<&str>, current: SheetId) -> Option<SheetId> {
        match name {
            None => self.sheets.is_live(current).then_some(current),
            Some(n) => self.sheets.get_id(n),
        }
    }

    pub(crate) fn ensure_live_sheet(&self, sheet_id: SheetId) -> Result<(), EditorError> {
        if self.sheets.is_live(sheet_id) {
            Ok(())
        } else {
            Err(EditorError::InvalidSheetId(sheet_id))
        }
    }

    /* ─────────────────────────── vertex access ──────────────────────── */

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.store.get(id)
    }

    fn checked(&self, id: VertexId) -> Result<&Vertex, GraphError> {
        debug_assert!(self.store.contains(id), "stale vertex handle {id:?}");
        self.store.get(id).ok_or(GraphError::InvalidHandle(id))
    }

    pub fn vertex_count(&self) -> usize {
        self.store.len()
    }

    pub(crate) fn seq(&self, id: VertexId) -> u64 {
        self.store.get(id).map_or(u64::MAX, Vertex::seq)
    }

    pub(crate) fn sort_by_seq(&self, ids: &mut [VertexId]) {
        ids.sort_by_key(|id| self.seq(*id));
    }

    pub fn vertex_for_cell(&self, addr: CellAddress) -> Option<VertexId> {
        self.cells.get(&addr.sheet_id)?.get(addr.row, addr.col)
    }

    pub fn range_vertex(&self, range: &RangeAddress) -> Option<VertexId> {
        self.ranges.get(range).copied()
    }

    pub fn dependents(&self, id: VertexId) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self
            .store
            .get(id)
            .map(|v| v.dependents.iter().copied().collect())
            .unwrap_or_default();
        self.sort_by_seq(&mut out);
        out
    }

    pub fn precedents(&self, id: VertexId) -> Vec<VertexId> {
        self.precedents_slice(id).to_vec()
    }

    pub(crate) fn precedents_slice(&self, id: VertexId) -> &[VertexId] {
        self.store.get(id).map_or(&[], |v| v.precedents.as_slice())
    }

    /* ─────────────────────────── edges & lifecycle ──────────────────── */

    fn add_edge(&mut self, dependent: VertexId, precedent: VertexId) {
        match self.store.get_mut(dependent) {
            Some(v) if !v.precedents.contains(&precedent) => v.precedents.push(precedent),
            _ => return,
        }
        if let Some(p) = self.store.get_mut(precedent) {
            p.dependents.insert(dependent);
        }
    }

    fn remove_edge(&mut self, dependent: VertexId, precedent: VertexId) {
        if let Some(v) = self.store.get_mut(dependent) {
            v.precedents.retain(|p| *p != precedent);
        }
        if let Some(p) = self.store.get_mut(precedent) {
            p.dependents.remove(&dependent);
        }
    }

    /// Create a cell vertex at an unoccupied address and link it into every
    /// range vertex (and live spill) that covers the address.
    pub fn add_vertex(&mut self, kind: VertexKind, addr: CellAddress) -> VertexId {
        debug_assert!(self.vertex_for_cell(addr).is_none(), "{addr} already has a vertex");
        let id = self.store.allocate(kind, Some(addr));
        self.cells
            .entry(addr.sheet_id)
            .or_default()
            .insert(addr.row, addr.col, id);
        for range_id in self.ranges_containing(addr) {
            self.add_edge(range_id, id);
        }
        if let Some(&anchor) = self.spill_owner.get(&addr) {
            self.add_edge(id, anchor);
        }
        id
    }

    pub fn get_or_create_cell_vertex(&mut self, addr: CellAddress) -> VertexId {
        match self.vertex_for_cell(addr) {
            Some(id) => id,
            None => self.add_vertex(VertexKind::Empty, addr),
        }
    }

    /// Range vertices are shared by every formula naming the same bounds.
    pub fn get_or_create_range_vertex(&mut self, range: RangeAddress) -> VertexId {
        if let Some(&id) = self.ranges.get(&range) {
            return id;
        }
        let id = self
            .store
            .allocate(VertexKind::Range(RangeVertex::new(range)), None);
        self.ranges.insert(range, id);
        self.sheet_ranges.entry(range.sheet_id).or_default().insert(id);
        for member in self.cells_in(&range) {
            self.add_edge(id, member);
        }
        id
    }

    /// Remove a vertex. Without `force` this fails while anything depends on
    /// it; with `force` inbound edges are detached and the former dependents
    /// returned (creation order) so callers can re-seed them.
    pub fn remove_vertex(&mut self, id: VertexId, force: bool) -> Result<Vec<VertexId>, GraphError> {
        let vertex = self.checked(id)?;
        if !force && !vertex.dependents.is_empty() {
            return Err(GraphError::HasDependents(id));
        }
        let mut detached: Vec<VertexId> = vertex.dependents.iter().copied().collect();
        self.sort_by_seq(&mut detached);

        if matches!(vertex.kind, VertexKind::Array(_)) {
            self.release_spill(id);
        }
        for d in &detached {
            if let Some(dv) = self.store.get_mut(*d) {
                dv.precedents.retain(|p| *p != id);
            }
        }
        let precedents = self
            .store
            .get_mut(id)
            .map(|v| mem::take(&mut v.precedents))
            .unwrap_or_default();
        for p in &precedents {
            if let Some(pv) = self.store.get_mut(*p) {
                pv.dependents.remove(&id);
            }
        }
        self.unindex(id);
        self.store.remove(id);
        for p in precedents {
            self.collect_if_orphan(p);
        }
        Ok(detached)
    }

    fn unindex(&mut self, id: VertexId) {
        let Some(vertex) = self.store.get(id) else {
            return;
        };
        if let VertexKind::Range(rv) = &vertex.kind {
            let range = rv.range;
            if self.ranges.get(&range) == Some(&id) {
                self.ranges.remove(&range);
            }
            if let Some(set) = self.sheet_ranges.get_mut(&range.sheet_id) {
                set.remove(&id);
            }
        } else if let Some(addr) = vertex.addr {
            if let Some(index) = self.cells.get_mut(&addr.sheet_id) {
                if index.get(addr.row, addr.col) == Some(id) {
                    index.remove(addr.row, addr.col);
                }
            }
        }
        self.formulas.remove(&id);
        self.volatiles.remove(&id);
        self.pending.remove(&id);
        self.blocked_spills.remove(&id);
        for waiting in self.unresolved.values_mut() {
            waiting.remove(&id);
        }
    }

    /// Garbage-collect placeholders and range vertices nobody reads anymore.
    fn collect_if_orphan(&mut self, id: VertexId) {
        let Some(vertex) = self.store.get(id) else {
            return;
        };
        if !vertex.dependents.is_empty() {
            return;
        }
        let collectable = match &vertex.kind {
            VertexKind::Range(_) => true,
            VertexKind::Empty => vertex
                .addr
                .is_some_and(|addr| !self.spill_owner.contains_key(&addr)),
            _ => false,
        };
        if collectable {
            let _ = self.remove_vertex(id, false);
        }
    }

    /// Replace a vertex's outgoing edges wholesale. Duplicates are dropped,
    /// first occurrence order is kept.
    pub fn set_precedents(&mut self, id: VertexId, precedents: &[VertexId]) -> Result<(), GraphError> {
        self.checked(id)?;
        for p in precedents {
            self.checked(*p)?;
        }
        let old = self
            .store
            .get_mut(id)
            .map(|v| mem::take(&mut v.precedents))
            .unwrap_or_default();
        for p in &old {
            if let Some(pv) = self.store.get_mut(*p) {
                pv.dependents.remove(&id);
            }
        }
        let mut deduped: SmallVec<[VertexId; 4]> = SmallVec::new();
        for p in precedents {
            if !deduped.contains(p) {
                deduped.push(*p);
            }
        }
        for p in &deduped {
            if let Some(pv) = self.store.get_mut(*p) {
                pv.dependents.insert(id);
            }
        }
        if let Some(v) = self.store.get_mut(id) {
            v.precedents = deduped;
        }
        for p in old {
            if !precedents.contains(&p) {
                self.collect_if_orphan(p);
            }
        }
        Ok(())
    }

    /* ────────────────────────── dirty & volatile ────────────────────── */

    pub fn mark_dirty(&mut self, id: VertexId) {
        if let Some(v) = self.store.get_mut(id) {
            v.flags.insert(VertexFlags::DIRTY);
            self.pending.insert(id);
        }
    }

    pub fn is_dirty(&self, id: VertexId) -> bool {
        self.store.get(id).is_some_and(Vertex::is_dirty)
    }

    /// Vertices re-seeded during the pass keep their flag.
    pub(crate) fn clear_dirty(&mut self, id: VertexId) {
        if self.pending.contains(&id) {
            return;
        }
        if let Some(v) = self.store.get_mut(id) {
            v.flags.remove(VertexFlags::DIRTY);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain the seeds recorded by edits, in creation order.
    pub fn take_pending(&mut self) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self
            .pending
            .drain()
            .filter(|id| self.store.contains(*id))
            .collect();
        self.sort_by_seq(&mut out);
        out
    }

    pub fn mark_volatile(&mut self, id: VertexId, volatile: bool) {
        let Some(v) = self.store.get_mut(id) else {
            return;
        };
        v.flags.set(VertexFlags::VOLATILE, volatile);
        if volatile {
            self.volatiles.insert(id);
        } else {
            self.volatiles.remove(&id);
        }
    }

    pub fn volatiles(&self) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self.volatiles.iter().copied().collect();
        self.sort_by_seq(&mut out);
        out
    }

    /// Forward transitive closure of `seeds` along dependent edges. Every
    /// vertex in the closure is flagged dirty.
    pub fn collect_affected(&mut self, seeds: &[VertexId]) -> Vec<VertexId> {
        let mut seen: FxHashSet<VertexId> = FxHashSet::default();
        let mut queue: Vec<VertexId> = Vec::with_capacity(seeds.len());
        for s in seeds {
            if self.store.contains(*s) && seen.insert(*s) {
                queue.push(*s);
            }
        }
        let mut head = 0;
        while head < queue.len() {
            let id = queue[head];
            head += 1;
            if let Some(v) = self.store.get(id) {
                for d in &v.dependents {
                    if seen.insert(*d) {
                        queue.push(*d);
                    }
                }
            }
        }
        for id in &queue {
            if let Some(v) = self.store.get_mut(*id) {
                v.flags.insert(VertexFlags::DIRTY);
            }
        }
        self.sort_by_seq(&mut queue);
        queue
    }

    /* ──────────────────────────── cell contents ─────────────────────── */

    fn check_writable(&self, addr: CellAddress) -> Result<(), EditorError> {
        self.ensure_live_sheet(addr.sheet_id)?;
        if self.spill_owner.contains_key(&addr) {
            return Err(EditorError::SpillBlocked(addr));
        }
        Ok(())
    }

    /// Drop formula bookkeeping (AST, volatility, spill) but keep edges.
    fn release_formula_state(&mut self, id: VertexId) {
        if matches!(self.store.get(id).map(|v| &v.kind), Some(VertexKind::Array(_))) {
            self.release_spill(id);
        }
        self.formulas.remove(&id);
        self.mark_volatile(id, false);
        self.blocked_spills.remove(&id);
        for waiting in self.unresolved.values_mut() {
            waiting.remove(&id);
        }
    }

    fn after_content_change(&mut self, id: VertexId, addr: CellAddress) {
        self.mark_dirty(id);
        self.invalidate_cell(addr);
        self.wake_blocked_spills(addr);
    }

    pub fn set_cell_value(&mut self, addr: CellAddress, value: LiteralValue) -> Result<VertexId, EditorError> {
        self.check_writable(addr)?;
        let id = self.get_or_create_cell_vertex(addr);
        self.release_formula_state(id);
        self.set_precedents(id, &[])?;
        if let Some(v) = self.store.get_mut(id) {
            v.kind = VertexKind::Value(value.into_scalar());
        }
        self.after_content_change(id, addr);
        Ok(id)
    }

    /// Store a formula with its already-extracted references. References to
    /// unknown sheets are remembered and linked once the sheet appears.
    pub fn set_cell_formula(
        &mut self,
        addr: CellAddress,
        ast: A,
        references: &[ReferenceType],
        volatile: bool,
    ) -> Result<VertexId, EditorError> {
        self.check_writable(addr)?;
        let id = self.get_or_create_cell_vertex(addr);
        self.release_formula_state(id);
        let precedents = self.link_references(id, addr.sheet_id, references);
        if let Some(v) = self.store.get_mut(id) {
            v.kind = VertexKind::Formula { result: None };
        }
        self.set_precedents(id, &precedents)?;
        self.formulas.insert(
            id,
            FormulaRecord {
                ast,
                version: self.transforms.version(),
            },
        );
        self.mark_volatile(id, volatile);
        self.after_content_change(id, addr);
        Ok(id)
    }

    /// Resolve references to precedent vertices, creating placeholders and
    /// range vertices on demand.
    fn link_references(
        &mut self,
        id: VertexId,
        sheet_id: SheetId,
        references: &[ReferenceType],
    ) -> SmallVec<[VertexId; 4]> {
        let mut precedents = SmallVec::new();
        for reference in references {
            let name = reference.sheet();
            let Some(sid) = self.resolve_sheet(name, sheet_id) else {
                if let Some(name) = name {
                    self.unresolved
                        .entry(name.to_lowercase())
                        .or_default()
                        .insert(id);
                }
                continue;
            };
            match reference {
                ReferenceType::Cell { coord, .. } => {
                    let cell = CellAddress::new(sid, coord.row, coord.col);
                    precedents.push(self.get_or_create_cell_vertex(cell));
                }
                ReferenceType::Range { start, end, .. } => {
                    let range = RangeAddress::new(sid, start.row, start.col, end.row, end.col);
                    precedents.push(self.get_or_create_range_vertex(range));
                }
                ReferenceType::Invalid => {}
            }
        }
        precedents
    }

    /// Re-link an existing formula after its references changed meaning
    /// (a sheet it names appeared).
    pub(crate) fn relink_formula(
        &mut self,
        id: VertexId,
        references: &[ReferenceType],
    ) -> Result<(), GraphError> {
        let Some(sheet_id) = self.checked(id)?.addr.map(|a| a.sheet_id) else {
            return Ok(());
        };
        for waiting in self.unresolved.values_mut() {
            waiting.remove(&id);
        }
        let precedents = self.link_references(id, sheet_id, references);
        self.set_precedents(id, &precedents)?;
        self.mark_dirty(id);
        Ok(())
    }

    pub(crate) fn take_unresolved(&mut self, sheet_name: &str) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self
            .unresolved
            .remove(&sheet_name.to_lowercase())
            .map(|set| set.into_iter().filter(|id| self.store.contains(*id)).collect())
            .unwrap_or_default();
        self.sort_by_seq(&mut out);
        out
    }

    /// Remove a cell's content. The vertex survives as a placeholder while
    /// something still reads it.
    pub fn clear_cell(&mut self, addr: CellAddress) -> Result<(), EditorError> {
        self.ensure_live_sheet(addr.sheet_id)?;
        if self.spill_owner.contains_key(&addr) {
            return Ok(());
        }
        let Some(id) = self.vertex_for_cell(addr) else {
            return Ok(());
        };
        self.release_formula_state(id);
        self.set_precedents(id, &[])?;
        let orphan = match self.store.get_mut(id) {
            Some(v) => {
                v.kind = VertexKind::Empty;
                v.dependents.is_empty()
            }
            None => return Ok(()),
        };
        if orphan {
            self.remove_vertex(id, false)?;
            self.invalidate_cell(addr);
            self.wake_blocked_spills(addr);
        } else {
            self.after_content_change(id, addr);
        }
        Ok(())
    }

    /// Value visible at `addr`, including spilled array elements.
    pub fn cell_value(&self, addr: CellAddress) -> LiteralValue {
        if let Some(v) = self.vertex_for_cell(addr).and_then(|id| self.store.get(id)) {
            if !matches!(v.kind, VertexKind::Empty) {
                return v.value();
            }
        }
        if let Some(anchor) = self.spill_owner.get(&addr).and_then(|id| self.store.get(*id)) {
            if let VertexKind::Array(arr) = &anchor.kind {
                return arr.value_at(addr);
            }
        }
        LiteralValue::Empty
    }

    pub fn formula(&self, id: VertexId) -> Option<&FormulaRecord<A>> {
        self.formulas.get(&id)
    }

    pub fn formula_ids(&self) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self.formulas.keys().copied().collect();
        self.sort_by_seq(&mut out);
        out
    }

    /// Bring a stored formula up to the current transform-log version.
    /// `rewrite` receives the stored AST and a reference mapper.
    pub(crate) fn normalize_formula<F>(&mut self, id: VertexId, rewrite: F)
    where
        F: FnOnce(&A, &mut dyn FnMut(&ReferenceType) -> ReferenceType) -> A,
    {
        let version = self.transforms.version();
        let Some(record) = self.formulas.get(&id) else {
            return;
        };
        if record.version == version {
            return;
        }
        let Some(own_sheet) = self.store.get(id).and_then(|v| v.addr).map(|a| a.sheet_id) else {
            return;
        };
        let ops = self.transforms.since(record.version);
        let sheets = &self.sheets;
        let mut adjust = |r: &ReferenceType| {
            let mut current = r.clone();
            for op in ops {
                let sid = match current.sheet() {
                    None => Some(own_sheet),
                    Some(name) => sheets.historical_id(name),
                };
                current = ReferenceAdjuster::adjust_reference(op, &current, sid);
            }
            current
        };
        let ast = rewrite(&record.ast, &mut adjust);
        if let Some(record) = self.formulas.get_mut(&id) {
            record.ast = ast;
            record.version = version;
        }
    }

    pub(crate) fn transforms(&self) -> &TransformLog {
        &self.transforms
    }

    pub(crate) fn compact_transforms(&mut self) {
        debug_assert!(
            self.formulas
                .values()
                .all(|r| r.version == self.transforms.version()),
            "compacting with stale formulas"
        );
        self.transforms.compact();
    }

    /* ─────────────────────────── evaluation results ─────────────────── */

    /// Commit a scalar formula result.
    pub(crate) fn store_result(&mut self, id: VertexId, value: LiteralValue) {
        if matches!(self.store.get(id).map(|v| &v.kind), Some(VertexKind::Array(_))) {
            self.release_spill(id);
        }
        self.blocked_spills.remove(&id);
        let Some(v) = self.store.get_mut(id) else {
            return;
        };
        let addr = v.addr;
        if v.kind.is_formula() {
            v.kind = VertexKind::Formula {
                result: Some(value),
            };
        }
        if let Some(addr) = addr {
            self.invalidate_cell(addr);
        }
    }

    /// Give every member of a cycle the CYCLE error.
    pub(crate) fn mark_cycle(&mut self, id: VertexId) {
        match self.store.get(id).map(|v| &v.kind) {
            Some(VertexKind::Formula { .. } | VertexKind::Array(_)) => {
                self.store_result(id, LiteralValue::error(ExcelErrorKind::Cycle));
            }
            Some(VertexKind::Range(rv)) => rv.cache.invalidate(),
            _ => {}
        }
    }

    /* ───────────────────────────── spills ───────────────────────────── */

    pub fn spill_owner(&self, addr: CellAddress) -> Option<VertexId> {
        self.spill_owner.get(&addr).copied()
    }

    /// Spill an array result from its anchor. Returns `false` (and stores
    /// `#SPILL!`) when the target region is occupied.
    pub(crate) fn commit_spill(&mut self, anchor: VertexId, values: Vec<Vec<LiteralValue>>) -> bool {
        let Some(addr) = self.store.get(anchor).and_then(|v| v.addr) else {
            return false;
        };
        let height = values.len() as u32;
        let width = values.iter().map(Vec::len).max().unwrap_or(0) as u32;
        if height == 0 || width == 0 {
            self.store_result(anchor, LiteralValue::error(ExcelErrorKind::Value));
            return false;
        }
        let (Some(end_row), Some(end_col)) = (
            addr.row.checked_add(height - 1),
            addr.col.checked_add(width - 1),
        ) else {
            self.store_result(anchor, LiteralValue::error(ExcelErrorKind::Spill));
            return false;
        };
        let region = RangeAddress::new(addr.sheet_id, addr.row, addr.col, end_row, end_col);

        if let Some(VertexKind::Array(arr)) = self.store.get_mut(anchor).map(|v| &mut v.kind) {
            if arr.region == region {
                arr.values = values;
                self.invalidate_region(&region);
                return true;
            }
        }
        self.release_spill(anchor);

        let blocked = region.cells().filter(|c| *c != addr).any(|c| {
            self.spill_owner.get(&c).is_some_and(|owner| *owner != anchor)
                || self
                    .vertex_for_cell(c)
                    .and_then(|id| self.store.get(id))
                    .is_some_and(|v| v.kind.has_content())
        });
        if blocked {
            #[cfg(feature = "tracing")]
            tracing::debug!(anchor = %addr, region = %region, "spill blocked");
            self.store_result(anchor, LiteralValue::error(ExcelErrorKind::Spill));
            self.blocked_spills.insert(anchor, region);
            return false;
        }
        self.blocked_spills.remove(&anchor);

        let targets: Vec<CellAddress> = region.cells().filter(|c| *c != addr).collect();
        for cell in targets {
            self.spill_owner.insert(cell, anchor);
            let placeholder = match self.vertex_for_cell(cell) {
                Some(pid) => {
                    self.add_edge(pid, anchor);
                    pid
                }
                // add_vertex links the new placeholder to its anchor.
                None => self.add_vertex(VertexKind::Empty, cell),
            };
            // Readers of newly claimed cells were not ordered after the anchor.
            if self
                .store
                .get(placeholder)
                .is_some_and(|v| !v.dependents.is_empty())
            {
                self.mark_dirty(placeholder);
            }
        }
        if let Some(v) = self.store.get_mut(anchor) {
            v.kind = VertexKind::Array(SpilledArray { values, region });
        }
        self.invalidate_region(&region);
        true
    }

    /// Give up an anchor's spill region. Placeholders still read by others
    /// are re-seeded; the rest are dropped.
    pub(crate) fn release_spill(&mut self, anchor: VertexId) {
        let Some(v) = self.store.get_mut(anchor) else {
            return;
        };
        let VertexKind::Array(arr) = &v.kind else {
            return;
        };
        let region = arr.region;
        let first = arr.values.first().and_then(|r| r.first()).cloned();
        v.kind = VertexKind::Formula { result: first };
        let anchor_addr = v.addr;

        for cell in region.cells() {
            if Some(cell) == anchor_addr || self.spill_owner.get(&cell) != Some(&anchor) {
                continue;
            }
            self.spill_owner.remove(&cell);
            if let Some(pid) = self.vertex_for_cell(cell) {
                self.remove_edge(pid, anchor);
                let orphan = self.store.get(pid).is_some_and(|p| {
                    p.dependents.is_empty() && matches!(p.kind, VertexKind::Empty)
                });
                if orphan {
                    let _ = self.remove_vertex(pid, false);
                } else {
                    self.mark_dirty(pid);
                }
            }
        }
        self.invalidate_region(&region);
    }

    /// Release every spill anchored on `sheet_id` and re-seed the anchors.
    pub(crate) fn release_spills_on_sheet(&mut self, sheet_id: SheetId) {
        let mut anchors: Vec<VertexId> = self
            .spill_owner
            .iter()
            .filter(|(cell, _)| cell.sheet_id == sheet_id)
            .map(|(_, anchor)| *anchor)
            .chain(
                self.blocked_spills
                    .iter()
                    .filter(|(_, region)| region.sheet_id == sheet_id)
                    .map(|(anchor, _)| *anchor),
            )
            .collect();
        self.sort_by_seq(&mut anchors);
        anchors.dedup();
        for anchor in anchors {
            self.release_spill(anchor);
            self.blocked_spills.remove(&anchor);
            self.mark_dirty(anchor);
        }
    }

    fn wake_blocked_spills(&mut self, addr: CellAddress) {
        let mut waiting: Vec<VertexId> = self
            .blocked_spills
            .iter()
            .filter(|(_, region)| region.contains(addr))
            .map(|(anchor, _)| *anchor)
            .collect();
        self.sort_by_seq(&mut waiting);
        for anchor in waiting {
            self.mark_dirty(anchor);
        }
    }

    /* ─────────────────────────── range reductions ───────────────────── */

    fn cells_in(&self, range: &RangeAddress) -> Vec<VertexId> {
        self.cells
            .get(&range.sheet_id)
            .map(|index| index.cells_in(range).map(|(_, id)| id).collect())
            .unwrap_or_default()
    }

    fn ranges_containing(&self, addr: CellAddress) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self
            .sheet_ranges
            .get(&addr.sheet_id)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| {
                        self.store
                            .get(*id)
                            .and_then(Vertex::range)
                            .is_some_and(|rv| rv.range.contains(addr))
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.sort_by_seq(&mut out);
        out
    }

    /// Drop cached reductions of every range containing `addr`.
    pub fn invalidate_cell(&self, addr: CellAddress) {
        for id in self.ranges_containing(addr) {
            if let Some(rv) = self.store.get(id).and_then(Vertex::range) {
                rv.cache.invalidate();
            }
        }
    }

    /// Drop cached reductions of every range overlapping `region`.
    pub fn invalidate_region(&self, region: &RangeAddress) {
        let Some(ids) = self.sheet_ranges.get(&region.sheet_id) else {
            return;
        };
        for id in ids {
            if let Some(rv) = self.store.get(*id).and_then(Vertex::range) {
                if rv.range.overlaps(region) {
                    rv.cache.invalidate();
                }
            }
        }
    }

    /// Cached reduction state for exact bounds, if present.
    pub fn cached_reduction(&self, range: &RangeAddress, kind: ReductionKind) -> Option<Reduction> {
        let id = self.ranges.get(range)?;
        self.store.get(*id)?.range()?.cache.get(kind)
    }

    pub fn range_cache_stats(&self) -> RangeCacheCounters {
        self.range_stats.snapshot()
    }

    /// Reduce a range, answering from the range vertex's cache when possible
    /// and otherwise combining a cached sub-range with a scan of the rest.
    pub fn reduce(&self, range: &RangeAddress, kind: ReductionKind, policy: ErrorPolicy) -> Reduction {
        let owner = self
            .ranges
            .get(range)
            .and_then(|id| self.store.get(*id))
            .and_then(Vertex::range);
        if self.cache_enabled {
            if let Some(hit) = owner
                .and_then(|rv| rv.cache.get(kind))
                .filter(|s| s.policy() == policy)
            {
                self.range_stats.hit();
                return hit;
            }
        }
        self.range_stats.miss();
        let state = self
            .decompose(range, kind, policy)
            .unwrap_or_else(|| self.scan(range, kind, policy));
        if self.cache_enabled {
            if let Some(rv) = owner {
                rv.cache.put(state.clone());
            }
        }
        state
    }

    /// Full row-major scan of stored cells; unstored cells count as blank.
    pub fn scan(&self, range: &RangeAddress, kind: ReductionKind, policy: ErrorPolicy) -> Reduction {
        let mut state = Reduction::new(kind, policy);
        let mut visited = 0u64;
        if let Some(index) = self.cells.get(&range.sheet_id) {
            for ((row, col), _) in index.cells_in(range) {
                visited += 1;
                state.push_cell(&self.cell_value(CellAddress::new(range.sheet_id, row, col)));
            }
        }
        state.push_blank_cells(range.cell_count().saturating_sub(visited));
        state
    }

    fn decompose(&self, range: &RangeAddress, kind: ReductionKind, policy: ErrorPolicy) -> Option<Reduction> {
        if !self.cache_enabled || !self.decomposition_enabled {
            return None;
        }
        let (sub, state) = self
            .sheet_ranges
            .get(&range.sheet_id)?
            .iter()
            .filter_map(|id| self.store.get(*id).and_then(Vertex::range))
            .filter(|rv| {
                rv.range != *range
                    && rv.range.start() == range.start()
                    && range.contains_range(&rv.range)
                    && (rv.range.width() == range.width() || rv.range.height() == range.height())
            })
            .filter_map(|rv| {
                rv.cache
                    .get(kind)
                    .filter(|s| s.policy() == policy)
                    .map(|s| (rv.range, s))
            })
            .max_by_key(|(r, _)| (r.cell_count(), *r))?;

        let rest = if sub.width() == range.width() {
            RangeAddress::new(
                range.sheet_id,
                sub.end_row + 1,
                range.start_col,
                range.end_row,
                range.end_col,
            )
        } else {
            // A column split interleaves in row-major order, so the first
            // error is only known when the cached part has none.
            if state.has_error() {
                return None;
            }
            RangeAddress::new(
                range.sheet_id,
                range.start_row,
                sub.end_col + 1,
                range.end_row,
                range.end_col,
            )
        };
        let mut combined = state;
        combined.merge(&self.scan(&rest, kind, policy));
        self.range_stats.decomposed();
        Some(combined)
    }

    /// Dense row-major values of a range.
    pub fn range_values(&self, range: &RangeAddress) -> Vec<Vec<LiteralValue>> {
        (range.start_row..=range.end_row)
            .map(|row| {
                (range.start_col..=range.end_col)
                    .map(|col| self.cell_value(CellAddress::new(range.sheet_id, row, col)))
                    .collect()
            })
            .collect()
    }
}

impl<A: Clone> DependencyGraph<A> {
    /// Content of a cell as stored (formula ASTs as last normalized).
    pub fn cell_content(&self, addr: CellAddress) -> CellContent<A> {
        let Some(id) = self.vertex_for_cell(addr) else {
            return CellContent::Empty;
        };
        match self.store.get(id).map(|v| &v.kind) {
            Some(VertexKind::Value(v)) => CellContent::Value(v.clone()),
            Some(VertexKind::Formula { .. } | VertexKind::Array(_)) => self
                .formulas
                .get(&id)
                .map(|r| CellContent::Formula(r.ast.clone()))
                .unwrap_or(CellContent::Empty),
            _ => CellContent::Empty,
        }
    }
}

use gridcalc_common::{CellAddress, LiteralValue, RangeAddress};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::range_cache::RangeCache;

/// Stable handle to a vertex. Handles survive structural edits; the arena
/// slot is only recycled after the vertex is removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub(crate) u32);

impl VertexId {
    pub fn new(id: u32) -> Self {
        VertexId(id)
    }

    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct VertexFlags: u8 {
        /// Needs to be (re)evaluated by the next pass.
        const DIRTY    = 0b0000_0001;
        /// Re-evaluated on every pass.
        const VOLATILE = 0b0000_0010;
    }
}

/// Range argument vertex; deduplicated by exact bounds.
#[derive(Debug)]
pub struct RangeVertex {
    pub range: RangeAddress,
    pub cache: RangeCache,
}

impl RangeVertex {
    pub fn new(range: RangeAddress) -> Self {
        RangeVertex {
            range,
            cache: RangeCache::default(),
        }
    }
}

/// Formula whose last result was an array, spilled from its own cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SpilledArray {
    pub values: Vec<Vec<LiteralValue>>,
    pub region: RangeAddress,
}

impl SpilledArray {
    pub fn value_at(&self, cell: CellAddress) -> LiteralValue {
        if !self.region.contains(cell) {
            return LiteralValue::Empty;
        }
        let r = (cell.row - self.region.start_row) as usize;
        let c = (cell.col - self.region.start_col) as usize;
        self.values
            .get(r)
            .and_then(|row| row.get(c))
            .cloned()
            .unwrap_or(LiteralValue::Empty)
    }
}

#[derive(Debug)]
pub enum VertexKind {
    /// Referenced cell without content (or a spill target).
    Empty,
    Value(LiteralValue),
    /// Scalar formula; `None` until the first evaluation.
    Formula { result: Option<LiteralValue> },
    Array(SpilledArray),
    Range(RangeVertex),
}

impl VertexKind {
    pub fn is_formula(&self) -> bool {
        matches!(self, VertexKind::Formula { .. } | VertexKind::Array(_))
    }

    /// Cells holding something a spill may not overwrite.
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            VertexKind::Value(_) | VertexKind::Formula { .. } | VertexKind::Array(_)
        )
    }
}

#[derive(Debug)]
pub struct Vertex {
    pub kind: VertexKind,
    /// Cell position; `None` for range vertices.
    pub addr: Option<CellAddress>,
    pub(crate) seq: u64,
    pub(crate) flags: VertexFlags,
    pub(crate) precedents: SmallVec<[VertexId; 4]>,
    pub(crate) dependents: FxHashSet<VertexId>,
}

impl Vertex {
    pub(crate) fn new(kind: VertexKind, addr: Option<CellAddress>, seq: u64) -> Self {
        Vertex {
            kind,
            addr,
            seq,
            flags: VertexFlags::empty(),
            precedents: SmallVec::new(),
            dependents: FxHashSet::default(),
        }
    }

    /// Creation order, used as the deterministic tie-break everywhere.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(VertexFlags::DIRTY)
    }

    pub fn is_volatile(&self) -> bool {
        self.flags.contains(VertexFlags::VOLATILE)
    }

    pub fn range(&self) -> Option<&RangeVertex> {
        match &self.kind {
            VertexKind::Range(rv) => Some(rv),
            _ => None,
        }
    }

    /// The value this vertex exposes to readers of its own cell.
    pub fn value(&self) -> LiteralValue {
        match &self.kind {
            VertexKind::Empty | VertexKind::Range(_) => LiteralValue::Empty,
            VertexKind::Value(v) => v.clone(),
            VertexKind::Formula { result } => result.clone().unwrap_or(LiteralValue::Empty),
            VertexKind::Array(arr) => arr
                .values
                .first()
                .and_then(|row| row.first())
                .cloned()
                .unwrap_or(LiteralValue::Empty),
        }
    }
}

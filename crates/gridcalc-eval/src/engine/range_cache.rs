//! Aggregation cache owned by range vertices.
//!
//! Each range vertex keeps one [`RangeCache`] keyed by [`ReductionKind`].
//! Entries hold a combinable [`Reduction`] state rather than a finished value
//! so that a cached sub-range can be merged with a scan of the remainder.

use std::cell::{Cell, RefCell};

use gridcalc_common::{ExcelError, LiteralValue};
use rustc_hash::FxHashMap;

/// Reductions the engine knows how to cache and combine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReductionKind {
    Sum,
    Count,
    CountA,
    CountBlank,
    Min,
    Max,
    SumSq,
    Product,
}

impl ReductionKind {
    /// Counting reductions ignore errors; everything else reports the first one.
    pub fn default_error_policy(self) -> ErrorPolicy {
        match self {
            ReductionKind::Count | ReductionKind::CountA | ReductionKind::CountBlank => {
                ErrorPolicy::Ignore
            }
            _ => ErrorPolicy::Propagate,
        }
    }
}

/// What a reduction does with error-valued elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorPolicy {
    Ignore,
    /// The first error in row-major order becomes the result.
    Propagate,
}

/// Partial state of a reduction over some set of cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Reduction {
    kind: ReductionKind,
    policy: ErrorPolicy,
    acc: f64,
    count: u64,
    seen: bool,
    first_error: Option<ExcelError>,
}

impl Reduction {
    pub fn new(kind: ReductionKind, policy: ErrorPolicy) -> Self {
        let acc = match kind {
            ReductionKind::Product => 1.0,
            _ => 0.0,
        };
        Reduction {
            kind,
            policy,
            acc,
            count: 0,
            seen: false,
            first_error: None,
        }
    }

    pub fn kind(&self) -> ReductionKind {
        self.kind
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn has_error(&self) -> bool {
        self.first_error.is_some()
    }

    /// Feed one cell value using range semantics: only real numbers take part
    /// in arithmetic reductions, text and booleans are skipped.
    pub fn push_cell(&mut self, value: &LiteralValue) {
        match value {
            LiteralValue::Error(e) => {
                if self.kind == ReductionKind::CountA {
                    self.count += 1;
                }
                self.push_error(e);
            }
            LiteralValue::Number(n) => self.push_number(*n),
            LiteralValue::Array(rows) => rows.iter().flatten().for_each(|v| self.push_cell(v)),
            other => match self.kind {
                ReductionKind::CountA if !matches!(other, LiteralValue::Empty) => self.count += 1,
                ReductionKind::CountBlank if other.is_blank() => self.count += 1,
                _ => {}
            },
        }
    }

    pub fn push_number(&mut self, n: f64) {
        match self.kind {
            ReductionKind::Sum => self.acc += n,
            ReductionKind::SumSq => self.acc += n * n,
            ReductionKind::Product => {
                self.acc *= n;
                self.seen = true;
            }
            ReductionKind::Min => {
                self.acc = if self.seen { self.acc.min(n) } else { n };
                self.seen = true;
            }
            ReductionKind::Max => {
                self.acc = if self.seen { self.acc.max(n) } else { n };
                self.seen = true;
            }
            ReductionKind::Count | ReductionKind::CountA => self.count += 1,
            ReductionKind::CountBlank => {}
        }
    }

    pub fn push_error(&mut self, e: &ExcelError) {
        if self.policy == ErrorPolicy::Propagate && self.first_error.is_none() {
            self.first_error = Some(e.clone());
        }
    }

    /// Account for cells that have no stored value at all.
    pub fn push_blank_cells(&mut self, n: u64) {
        if self.kind == ReductionKind::CountBlank {
            self.count += n;
        }
    }

    /// Fold in the state of a region that comes *after* this one in row-major
    /// order.
    pub fn merge(&mut self, other: &Reduction) {
        debug_assert_eq!(self.kind, other.kind);
        if self.first_error.is_none() {
            self.first_error = other.first_error.clone();
        }
        match self.kind {
            ReductionKind::Sum | ReductionKind::SumSq => self.acc += other.acc,
            ReductionKind::Product => {
                self.acc *= other.acc;
                self.seen |= other.seen;
            }
            ReductionKind::Min | ReductionKind::Max if other.seen => {
                if self.seen {
                    self.acc = if self.kind == ReductionKind::Min {
                        self.acc.min(other.acc)
                    } else {
                        self.acc.max(other.acc)
                    };
                } else {
                    self.acc = other.acc;
                    self.seen = true;
                }
            }
            ReductionKind::Min | ReductionKind::Max => {}
            ReductionKind::Count | ReductionKind::CountA | ReductionKind::CountBlank => {
                self.count += other.count
            }
        }
    }

    pub fn finish(&self) -> LiteralValue {
        if let Some(e) = &self.first_error {
            return LiteralValue::Error(e.clone());
        }
        match self.kind {
            ReductionKind::Sum | ReductionKind::SumSq => LiteralValue::Number(self.acc),
            ReductionKind::Product | ReductionKind::Min | ReductionKind::Max => {
                LiteralValue::Number(if self.seen { self.acc } else { 0.0 })
            }
            ReductionKind::Count | ReductionKind::CountA | ReductionKind::CountBlank => {
                LiteralValue::Number(self.count as f64)
            }
        }
    }
}

/// Per-range memo of reduction states.
#[derive(Debug, Default)]
pub struct RangeCache {
    entries: RefCell<FxHashMap<ReductionKind, Reduction>>,
}

impl RangeCache {
    pub fn get(&self, kind: ReductionKind) -> Option<Reduction> {
        self.entries.borrow().get(&kind).cloned()
    }

    pub fn put(&self, state: Reduction) {
        self.entries.borrow_mut().insert(state.kind(), state);
    }

    pub fn invalidate(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn contains(&self, kind: ReductionKind) -> bool {
        self.entries.borrow().contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Instrumentation counters for range reductions.
#[derive(Debug, Default)]
pub struct RangeCacheStats {
    hits: Cell<u64>,
    misses: Cell<u64>,
    decompositions: Cell<u64>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeCacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub decompositions: u64,
}

impl RangeCacheStats {
    pub(crate) fn hit(&self) {
        self.hits.set(self.hits.get() + 1);
    }

    pub(crate) fn miss(&self) {
        self.misses.set(self.misses.get() + 1);
    }

    pub(crate) fn decomposed(&self) {
        self.decompositions.set(self.decompositions.get() + 1);
    }

    pub fn snapshot(&self) -> RangeCacheCounters {
        RangeCacheCounters {
            hits: self.hits.get(),
            misses: self.misses.get(),
            decompositions: self.decompositions.get(),
        }
    }
}

use super::reference_adjuster::ShiftOperation;

/// Append-only log of structural edits used to normalize formulas lazily.
///
/// Each stored formula remembers the log version it was last rewritten at;
/// reading it replays only the operations appended since. Compaction drops
/// the prefix once every formula has caught up.
///
/// One log serves every sheet. Replay skips operations on sheets a reference
/// does not resolve to, so cross-sheet references catch up too; compaction
/// therefore materializes formulas on all sheets, not only the edited one.
#[derive(Debug, Default)]
pub struct TransformLog {
    base: u64,
    ops: Vec<ShiftOperation>,
}

impl TransformLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version a formula stored now is normalized at.
    pub fn version(&self) -> u64 {
        self.base + self.ops.len() as u64
    }

    pub fn push(&mut self, op: ShiftOperation) -> u64 {
        self.ops.push(op);
        self.version()
    }

    /// Operations a formula stored at `version` still has to apply.
    pub fn since(&self, version: u64) -> &[ShiftOperation] {
        debug_assert!(version >= self.base, "formula older than compacted log");
        let start = version.saturating_sub(self.base) as usize;
        self.ops.get(start..).unwrap_or(&[])
    }

    pub fn pending_len(&self) -> usize {
        self.ops.len()
    }

    /// Forget every operation. Callers must have brought all formulas up to
    /// `version()` first.
    pub fn compact(&mut self) {
        self.base += self.ops.len() as u64;
        self.ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(before: u32) -> ShiftOperation {
        ShiftOperation::InsertRows {
            sheet_id: 0,
            before,
            count: 1,
        }
    }

    #[test]
    fn since_returns_only_newer_ops() {
        let mut log = TransformLog::new();
        assert_eq!(log.version(), 0);
        log.push(op(1));
        let v = log.version();
        log.push(op(2));
        log.push(op(3));
        assert_eq!(log.since(v), &[op(2), op(3)]);
        assert!(log.since(log.version()).is_empty());
    }

    #[test]
    fn compaction_keeps_versions_monotonic() {
        let mut log = TransformLog::new();
        log.push(op(1));
        log.push(op(2));
        log.compact();
        assert_eq!(log.version(), 2);
        assert_eq!(log.pending_len(), 0);
        log.push(op(4));
        assert_eq!(log.since(2), &[op(4)]);
    }
}

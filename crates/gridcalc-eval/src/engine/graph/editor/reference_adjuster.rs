use gridcalc_common::{CellAddress, Coord, RangeAddress, ReferenceType, SheetId};

/// Centralized reference adjustment logic for structural changes.
///
/// Structural edits move anchored (`$`) and relative coordinates alike; the
/// anchors only matter when a formula is copied.
pub struct ReferenceAdjuster;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShiftOperation {
    InsertRows {
        sheet_id: SheetId,
        before: u32,
        count: u32,
    },
    DeleteRows {
        sheet_id: SheetId,
        start: u32,
        count: u32,
    },
    InsertColumns {
        sheet_id: SheetId,
        before: u32,
        count: u32,
    },
    DeleteColumns {
        sheet_id: SheetId,
        start: u32,
        count: u32,
    },
    /// Cut/paste of `source` so its top-left lands on `(dest_row, dest_col)`.
    MoveRange {
        source: RangeAddress,
        dest_row: u32,
        dest_col: u32,
    },
    RemoveSheet {
        sheet_id: SheetId,
    },
}

impl ShiftOperation {
    pub fn sheet_id(&self) -> SheetId {
        match self {
            ShiftOperation::InsertRows { sheet_id, .. }
            | ShiftOperation::DeleteRows { sheet_id, .. }
            | ShiftOperation::InsertColumns { sheet_id, .. }
            | ShiftOperation::DeleteColumns { sheet_id, .. }
            | ShiftOperation::RemoveSheet { sheet_id } => *sheet_id,
            ShiftOperation::MoveRange { source, .. } => source.sheet_id,
        }
    }

    /// Destination block of a move; `None` if it would leave the grid.
    pub fn move_target(&self) -> Option<RangeAddress> {
        match self {
            ShiftOperation::MoveRange {
                source,
                dest_row,
                dest_col,
            } => Some(RangeAddress::new(
                source.sheet_id,
                *dest_row,
                *dest_col,
                dest_row.checked_add(source.height() - 1)?,
                dest_col.checked_add(source.width() - 1)?,
            )),
            _ => None,
        }
    }
}

/// Index along one axis after an insert; `None` if it is pushed off the grid.
fn insert_index(idx: u32, before: u32, count: u32) -> Option<u32> {
    if idx >= before { idx.checked_add(count) } else { Some(idx) }
}

/// Index along one axis after a delete; `None` if it was deleted.
fn delete_index(idx: u32, start: u32, count: u32) -> Option<u32> {
    if idx < start {
        Some(idx)
    } else if idx >= start + count {
        Some(idx - count)
    } else {
        None
    }
}

/// Span `[lo, hi]` after an insert: spans that straddle the insertion point grow.
fn insert_span(lo: u32, hi: u32, before: u32, count: u32) -> Option<(u32, u32)> {
    if lo >= before {
        Some((lo.checked_add(count)?, hi.checked_add(count)?))
    } else if hi >= before {
        Some((lo, hi.checked_add(count)?))
    } else {
        Some((lo, hi))
    }
}

/// Span `[lo, hi]` after a delete: partially deleted spans contract,
/// wholly deleted spans vanish.
fn delete_span(lo: u32, hi: u32, start: u32, count: u32) -> Option<(u32, u32)> {
    let end = start + count - 1;
    if hi < start {
        return Some((lo, hi));
    }
    if lo > end {
        return Some((lo - count, hi - count));
    }
    if lo >= start && hi <= end {
        return None;
    }
    let new_lo = lo.min(start);
    let new_hi = if hi > end { hi - count } else { start - 1 };
    Some((new_lo, new_hi))
}

impl ReferenceAdjuster {
    /// New position of a cell, or `None` if the cell was deleted, overwritten
    /// by a move, or shifted past the last row or column.
    pub fn adjust_cell(op: &ShiftOperation, cell: CellAddress) -> Option<CellAddress> {
        if cell.sheet_id != op.sheet_id() {
            return Some(cell);
        }
        match *op {
            ShiftOperation::InsertRows { before, count, .. } => {
                insert_index(cell.row, before, count).map(|row| CellAddress { row, ..cell })
            }
            ShiftOperation::DeleteRows { start, count, .. } => {
                delete_index(cell.row, start, count).map(|row| CellAddress { row, ..cell })
            }
            ShiftOperation::InsertColumns { before, count, .. } => {
                insert_index(cell.col, before, count).map(|col| CellAddress { col, ..cell })
            }
            ShiftOperation::DeleteColumns { start, count, .. } => {
                delete_index(cell.col, start, count).map(|col| CellAddress { col, ..cell })
            }
            ShiftOperation::MoveRange {
                source,
                dest_row,
                dest_col,
            } => {
                if source.contains(cell) {
                    cell.offset(
                        dest_row as i64 - source.start_row as i64,
                        dest_col as i64 - source.start_col as i64,
                    )
                } else if op.move_target().is_some_and(|t| t.contains(cell)) {
                    None
                } else {
                    Some(cell)
                }
            }
            ShiftOperation::RemoveSheet { .. } => None,
        }
    }

    /// New bounds of a range, or `None` if it no longer exists.
    pub fn adjust_range(op: &ShiftOperation, range: RangeAddress) -> Option<RangeAddress> {
        if range.sheet_id != op.sheet_id() {
            return Some(range);
        }
        let sheet = range.sheet_id;
        match *op {
            ShiftOperation::InsertRows { before, count, .. } => {
                let (lo, hi) = insert_span(range.start_row, range.end_row, before, count)?;
                Some(RangeAddress::new(sheet, lo, range.start_col, hi, range.end_col))
            }
            ShiftOperation::DeleteRows { start, count, .. } => {
                let (lo, hi) = delete_span(range.start_row, range.end_row, start, count)?;
                Some(RangeAddress::new(sheet, lo, range.start_col, hi, range.end_col))
            }
            ShiftOperation::InsertColumns { before, count, .. } => {
                let (lo, hi) = insert_span(range.start_col, range.end_col, before, count)?;
                Some(RangeAddress::new(sheet, range.start_row, lo, range.end_row, hi))
            }
            ShiftOperation::DeleteColumns { start, count, .. } => {
                let (lo, hi) = delete_span(range.start_col, range.end_col, start, count)?;
                Some(RangeAddress::new(sheet, range.start_row, lo, range.end_row, hi))
            }
            ShiftOperation::MoveRange {
                source,
                dest_row,
                dest_col,
            } => {
                if source.contains_range(&range) {
                    range.shift(
                        dest_row as i64 - source.start_row as i64,
                        dest_col as i64 - source.start_col as i64,
                    )
                } else {
                    Some(range)
                }
            }
            ShiftOperation::RemoveSheet { .. } => None,
        }
    }

    /// Adjust a formula reference. `sheet_id` is the sheet the reference
    /// resolves to (`None` when it names an unknown sheet, which is left alone).
    pub fn adjust_reference(
        op: &ShiftOperation,
        reference: &ReferenceType,
        sheet_id: Option<SheetId>,
    ) -> ReferenceType {
        let Some(sheet_id) = sheet_id else {
            return reference.clone();
        };
        if sheet_id != op.sheet_id() {
            return reference.clone();
        }
        match reference {
            ReferenceType::Cell { sheet, coord } => {
                let cell = CellAddress::new(sheet_id, coord.row, coord.col);
                match Self::adjust_cell(op, cell) {
                    Some(moved) => ReferenceType::Cell {
                        sheet: sheet.clone(),
                        coord: coord.moved_to(moved.row, moved.col),
                    },
                    None => ReferenceType::Invalid,
                }
            }
            ReferenceType::Range { sheet, start, end } => {
                let range = RangeAddress::new(sheet_id, start.row, start.col, end.row, end.col);
                match Self::adjust_range(op, range) {
                    Some(r) => ReferenceType::Range {
                        sheet: sheet.clone(),
                        start: Coord::moved_to(*start, r.start_row, r.start_col),
                        end: Coord::moved_to(*end, r.end_row, r.end_col),
                    },
                    None => ReferenceType::Invalid,
                }
            }
            ReferenceType::Invalid => ReferenceType::Invalid,
        }
    }
}

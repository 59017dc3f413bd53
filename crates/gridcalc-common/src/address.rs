//! Sheet-scoped coordinates: single cells and rectangular ranges.
//!
//! All coordinates are 0-based. A1 helpers convert to and from the familiar
//! 1-based column-letter notation.

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable sheet identifier used across the workspace.
pub type SheetId = u16;

/// Errors that can occur while building or parsing addresses.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AddressError {
    /// Text was not a valid A1 cell reference.
    InvalidA1(String),
    /// Range bounds refer to different sheets.
    MismatchedSheets,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::InvalidA1(s) => write!(f, "invalid A1 reference '{s}'"),
            AddressError::MismatchedSheets => write!(f, "range bounds refer to different sheets"),
        }
    }
}

impl Error for AddressError {}

/// A single cell. Orders by `(sheet_id, row, col)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub sheet_id: SheetId,
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub const fn new(sheet_id: SheetId, row: u32, col: u32) -> Self {
        Self { sheet_id, row, col }
    }

    /// Parse an unqualified A1 reference (`B7`, `$C$2`) on `sheet_id`.
    pub fn parse_a1(sheet_id: SheetId, text: &str) -> Result<Self, AddressError> {
        let (row, col, _, _) =
            parse_a1_parts(text).ok_or_else(|| AddressError::InvalidA1(text.to_string()))?;
        Ok(Self::new(sheet_id, row, col))
    }

    /// Shift by signed deltas; `None` if the result would leave the grid.
    pub fn offset(self, drow: i64, dcol: i64) -> Option<Self> {
        let row = u32::try_from(self.row as i64 + drow).ok()?;
        let col = u32::try_from(self.col as i64 + dcol).ok()?;
        Some(Self::new(self.sheet_id, row, col))
    }

    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_letters(self.col), self.row + 1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.sheet_id, self.to_a1())
    }
}

/// A rectangular, normalized range (`start <= end` componentwise).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeAddress {
    pub sheet_id: SheetId,
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl RangeAddress {
    /// Build a range from two corners in any order.
    pub fn new(sheet_id: SheetId, r1: u32, c1: u32, r2: u32, c2: u32) -> Self {
        Self {
            sheet_id,
            start_row: r1.min(r2),
            start_col: c1.min(c2),
            end_row: r1.max(r2),
            end_col: c1.max(c2),
        }
    }

    pub fn from_cells(a: CellAddress, b: CellAddress) -> Result<Self, AddressError> {
        if a.sheet_id != b.sheet_id {
            return Err(AddressError::MismatchedSheets);
        }
        Ok(Self::new(a.sheet_id, a.row, a.col, b.row, b.col))
    }

    pub fn single(cell: CellAddress) -> Self {
        Self::new(cell.sheet_id, cell.row, cell.col, cell.row, cell.col)
    }

    pub fn start(&self) -> CellAddress {
        CellAddress::new(self.sheet_id, self.start_row, self.start_col)
    }

    pub fn end(&self) -> CellAddress {
        CellAddress::new(self.sheet_id, self.end_row, self.end_col)
    }

    pub fn height(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn width(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn cell_count(&self) -> u64 {
        self.height() as u64 * self.width() as u64
    }

    pub fn contains(&self, cell: CellAddress) -> bool {
        cell.sheet_id == self.sheet_id
            && (self.start_row..=self.end_row).contains(&cell.row)
            && (self.start_col..=self.end_col).contains(&cell.col)
    }

    pub fn contains_range(&self, other: &RangeAddress) -> bool {
        self.contains(other.start()) && self.contains(other.end())
    }

    pub fn overlaps(&self, other: &RangeAddress) -> bool {
        self.intersection(other).is_some()
    }

    pub fn intersection(&self, other: &RangeAddress) -> Option<RangeAddress> {
        if self.sheet_id != other.sheet_id {
            return None;
        }
        let sr = self.start_row.max(other.start_row);
        let sc = self.start_col.max(other.start_col);
        let er = self.end_row.min(other.end_row);
        let ec = self.end_col.min(other.end_col);
        (sr <= er && sc <= ec).then(|| RangeAddress::new(self.sheet_id, sr, sc, er, ec))
    }

    /// Translate the whole range; `None` if it would leave the grid.
    pub fn shift(&self, drow: i64, dcol: i64) -> Option<RangeAddress> {
        let start = self.start().offset(drow, dcol)?;
        let end = self.end().offset(drow, dcol)?;
        Some(RangeAddress::new(
            self.sheet_id,
            start.row,
            start.col,
            end.row,
            end.col,
        ))
    }

    /// Row-major iteration over every cell in the range.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start_row..=self.end_row).flat_map(move |row| {
            (self.start_col..=self.end_col).map(move |col| CellAddress::new(self.sheet_id, row, col))
        })
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]{}:{}",
            self.sheet_id,
            self.start().to_a1(),
            self.end().to_a1()
        )
    }
}

/// `0 -> "A"`, `27 -> "AB"`.
pub fn col_to_letters(mut col: u32) -> String {
    let mut buf = Vec::new();
    loop {
        buf.push(b'A' + (col % 26) as u8);
        col /= 26;
        if col == 0 {
            break;
        }
        col -= 1;
    }
    buf.reverse();
    buf.into_iter().map(char::from).collect()
}

/// `"A" -> 0`, `"ab" -> 27`. Case-insensitive.
pub fn letters_to_col(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut acc: u32 = 0;
    for ch in s.bytes() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let val = (ch.to_ascii_uppercase() - b'A') as u32 + 1;
        acc = acc.checked_mul(26)?.checked_add(val)?;
    }
    Some(acc - 1)
}

/// Split `$C$12` into `(row, col, row_abs, col_abs)`, 0-based.
pub fn parse_a1_parts(text: &str) -> Option<(u32, u32, bool, bool)> {
    let bytes = text.trim().as_bytes();
    let mut i = 0;
    let col_abs = bytes.first() == Some(&b'$');
    if col_abs {
        i += 1;
    }
    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = std::str::from_utf8(&bytes[letters_start..i]).ok()?;
    let row_abs = bytes.get(i) == Some(&b'$');
    if row_abs {
        i += 1;
    }
    let digits = std::str::from_utf8(&bytes[i..]).ok()?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, letters_to_col(letters)?, row_abs, col_abs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(27), "AB");
        assert_eq!(letters_to_col("AB"), Some(27));
        assert_eq!(letters_to_col("zz"), Some(701));
        assert_eq!(letters_to_col("A1"), None);
    }

    #[test]
    fn parse_a1_handles_anchors() {
        assert_eq!(parse_a1_parts("B7"), Some((6, 1, false, false)));
        assert_eq!(parse_a1_parts("$C$2"), Some((1, 2, true, true)));
        assert_eq!(parse_a1_parts("A$1"), Some((0, 0, true, false)));
        assert_eq!(parse_a1_parts("A0"), None);
        assert_eq!(parse_a1_parts("7B"), None);
    }

    #[test]
    fn range_normalizes_and_queries() {
        let r = RangeAddress::new(0, 4, 3, 1, 1);
        assert_eq!((r.start_row, r.start_col, r.end_row, r.end_col), (1, 1, 4, 3));
        assert_eq!(r.height(), 4);
        assert_eq!(r.width(), 3);
        assert!(r.contains(CellAddress::new(0, 2, 2)));
        assert!(!r.contains(CellAddress::new(1, 2, 2)));
        assert!(!r.contains(CellAddress::new(0, 0, 2)));
    }

    #[test]
    fn overlap_and_intersection() {
        let a = RangeAddress::new(0, 0, 0, 4, 4);
        let b = RangeAddress::new(0, 3, 3, 6, 6);
        let c = RangeAddress::new(0, 5, 5, 6, 6);
        assert_eq!(a.intersection(&b), Some(RangeAddress::new(0, 3, 3, 4, 4)));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&RangeAddress::new(1, 0, 0, 4, 4)));
    }

    #[test]
    fn shift_refuses_to_leave_grid() {
        let r = RangeAddress::new(0, 1, 1, 2, 2);
        assert_eq!(r.shift(3, 0), Some(RangeAddress::new(0, 4, 1, 5, 2)));
        assert_eq!(r.shift(-2, 0), None);
    }

    #[test]
    fn cells_iterate_row_major() {
        let r = RangeAddress::new(0, 0, 0, 1, 1);
        let cells: Vec<_> = r.cells().map(|c| (c.row, c.col)).collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }
}

use std::collections::BTreeMap;

use gridcalc_common::RangeAddress;

use super::vertex::VertexId;

/// Row-major ordered map from `(row, col)` to the cell vertex stored there.
///
/// Ordered storage gives row-major scans for range reductions and lets row
/// shifts touch only the rows at or after the edit point.
#[derive(Debug, Default)]
pub struct SheetIndex {
    cells: BTreeMap<(u32, u32), VertexId>,
}

impl SheetIndex {
    pub fn get(&self, row: u32, col: u32) -> Option<VertexId> {
        self.cells.get(&(row, col)).copied()
    }

    pub fn insert(&mut self, row: u32, col: u32, id: VertexId) -> Option<VertexId> {
        self.cells.insert((row, col), id)
    }

    pub fn remove(&mut self, row: u32, col: u32) -> Option<VertexId> {
        self.cells.remove(&(row, col))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Stored cells inside `range`, row-major.
    pub fn cells_in<'a>(
        &'a self,
        range: &RangeAddress,
    ) -> impl Iterator<Item = ((u32, u32), VertexId)> + 'a {
        let (sc, ec) = (range.start_col, range.end_col);
        self.cells
            .range((range.start_row, sc)..=(range.end_row, ec))
            .filter(move |((_, c), _)| (sc..=ec).contains(c))
            .map(|(k, v)| (*k, *v))
    }

    /// Remove and return every entry with `row >= from_row`.
    pub fn split_rows(&mut self, from_row: u32) -> Vec<((u32, u32), VertexId)> {
        self.cells.split_off(&(from_row, 0)).into_iter().collect()
    }

    /// Remove and return every entry with `col >= from_col`.
    pub fn split_cols(&mut self, from_col: u32) -> Vec<((u32, u32), VertexId)> {
        let keys: Vec<_> = self
            .cells
            .keys()
            .filter(|(_, c)| *c >= from_col)
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|k| self.cells.remove(&k).map(|v| (k, v)))
            .collect()
    }

    pub fn max_row(&self) -> Option<u32> {
        self.cells.last_key_value().map(|((row, _), _)| *row)
    }

    pub fn max_col(&self) -> Option<u32> {
        self.cells.keys().map(|(_, col)| *col).max()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((u32, u32), VertexId)> + '_ {
        self.cells.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(cells: &[(u32, u32)]) -> SheetIndex {
        let mut idx = SheetIndex::default();
        for (i, (r, c)) in cells.iter().enumerate() {
            idx.insert(*r, *c, VertexId(i as u32));
        }
        idx
    }

    #[test]
    fn cells_in_is_row_major_and_clipped() {
        let idx = index(&[(0, 0), (0, 5), (1, 1), (2, 0), (3, 1)]);
        let hits: Vec<_> = idx
            .cells_in(&RangeAddress::new(0, 0, 0, 2, 1))
            .map(|(k, _)| k)
            .collect();
        assert_eq!(hits, vec![(0, 0), (1, 1), (2, 0)]);
    }

    #[test]
    fn split_rows_and_cols() {
        let mut idx = index(&[(0, 0), (2, 1), (4, 0)]);
        let moved: Vec<_> = idx.split_rows(2).into_iter().map(|(k, _)| k).collect();
        assert_eq!(moved, vec![(2, 1), (4, 0)]);
        assert_eq!(idx.len(), 1);

        let mut idx = index(&[(0, 0), (2, 1), (4, 3)]);
        let moved: Vec<_> = idx.split_cols(1).into_iter().map(|(k, _)| k).collect();
        assert_eq!(moved, vec![(2, 1), (4, 3)]);
        assert_eq!(idx.get(0, 0), Some(VertexId(0)));
    }

    #[test]
    fn furthest_row_and_col() {
        assert_eq!(SheetIndex::default().max_row(), None);
        let idx = index(&[(0, 7), (3, 1), (2, 4)]);
        assert_eq!(idx.max_row(), Some(3));
        assert_eq!(idx.max_col(), Some(7));
    }
}

use gridcalc_common::CellAddress;

use super::vertex::{Vertex, VertexId, VertexKind};

/// Arena of vertices addressed by [`VertexId`].
///
/// Removed slots go on a free list and are handed out again by `allocate`.
/// Every allocation gets a fresh, monotonically increasing sequence number so
/// ordering by creation stays well defined across slot reuse.
#[derive(Debug, Default)]
pub struct VertexStore {
    slots: Vec<Option<Vertex>>,
    free: Vec<u32>,
    next_seq: u64,
    live: usize,
}

impl VertexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, kind: VertexKind, addr: Option<CellAddress>) -> VertexId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live += 1;
        let vertex = Vertex::new(kind, addr, seq);
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(vertex);
                VertexId(idx)
            }
            None => {
                self.slots.push(Some(vertex));
                VertexId((self.slots.len() - 1) as u32)
            }
        }
    }

    pub fn remove(&mut self, id: VertexId) -> Option<Vertex> {
        let slot = self.slots.get_mut(id.as_index())?;
        let vertex = slot.take()?;
        self.free.push(id.0);
        self.live -= 1;
        Some(vertex)
    }

    #[inline]
    pub fn get(&self, id: VertexId) -> Option<&Vertex> {
        self.slots.get(id.as_index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.slots.get_mut(id.as_index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live vertex ids in slot order.
    pub fn ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| VertexId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_common::LiteralValue;

    #[test]
    fn allocate_and_reuse_slots() {
        let mut store = VertexStore::new();
        let a = store.allocate(VertexKind::Empty, None);
        let b = store.allocate(VertexKind::Value(LiteralValue::Number(1.0)), None);
        assert_eq!(store.len(), 2);

        assert!(store.remove(a).is_some());
        assert!(!store.contains(a));
        assert!(store.remove(a).is_none());

        let c = store.allocate(VertexKind::Empty, None);
        assert_eq!(c, a, "freed slot is reused");
        assert!(store.get(c).unwrap().seq() > store.get(b).unwrap().seq());
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![c, b]);
    }
}

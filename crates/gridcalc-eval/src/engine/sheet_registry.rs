use gridcalc_common::SheetId;
use rustc_hash::{FxHashMap, FxHashSet};

/// Name <-> id mapping for sheets.
///
/// Names compare case-insensitively. Ids are never reused for a different
/// name: removing a sheet only tombstones it, and adding the same name again
/// revives the original id so references recorded against it stay coherent.
#[derive(Default, Debug)]
pub struct SheetRegistry {
    id_by_name: FxHashMap<String, SheetId>,
    name_by_id: Vec<String>,
    removed: FxHashSet<SheetId>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl SheetRegistry {
    pub fn new() -> Self {
        SheetRegistry::default()
    }

    /// Returns the id and whether the sheet was newly added or revived.
    pub fn add(&mut self, name: &str) -> (SheetId, bool) {
        if let Some(&id) = self.id_by_name.get(&key(name)) {
            let revived = self.removed.remove(&id);
            if revived {
                self.name_by_id[id as usize] = name.to_string();
            }
            return (id, revived);
        }
        let id = self.name_by_id.len() as SheetId;
        self.name_by_id.push(name.to_string());
        self.id_by_name.insert(key(name), id);
        (id, true)
    }

    pub fn remove(&mut self, id: SheetId) -> bool {
        (id as usize) < self.name_by_id.len() && self.removed.insert(id)
    }

    pub fn name(&self, id: SheetId) -> Option<&str> {
        self.name_by_id.get(id as usize).map(String::as_str)
    }

    /// Id of a live sheet.
    pub fn get_id(&self, name: &str) -> Option<SheetId> {
        self.id_by_name
            .get(&key(name))
            .copied()
            .filter(|id| !self.removed.contains(id))
    }

    /// Id ever assigned to `name`, including removed sheets.
    pub fn historical_id(&self, name: &str) -> Option<SheetId> {
        self.id_by_name.get(&key(name)).copied()
    }

    pub fn is_live(&self, id: SheetId) -> bool {
        (id as usize) < self.name_by_id.len() && !self.removed.contains(&id)
    }

    pub fn live_ids(&self) -> impl Iterator<Item = SheetId> + '_ {
        (0..self.name_by_id.len() as SheetId).filter(|id| !self.removed.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        let mut reg = SheetRegistry::new();
        let (id, fresh) = reg.add("Sheet1");
        assert!(fresh);
        assert_eq!(reg.add("SHEET1"), (id, false));
        assert_eq!(reg.get_id("sheet1"), Some(id));
        assert_eq!(reg.name(id), Some("Sheet1"));
    }

    #[test]
    fn removal_tombstones_and_revives() {
        let mut reg = SheetRegistry::new();
        let (a, _) = reg.add("A");
        let (b, _) = reg.add("B");
        assert!(reg.remove(a));
        assert!(!reg.remove(a));
        assert_eq!(reg.get_id("A"), None);
        assert_eq!(reg.historical_id("A"), Some(a));
        assert_eq!(reg.live_ids().collect::<Vec<_>>(), vec![b]);

        assert_eq!(reg.add("a"), (a, true));
        assert!(reg.is_live(a));
        assert_eq!(reg.name(a), Some("a"));
    }
}

use super::change_log::{ActionGroup, ChangeEvent, ChangeLog};
use super::vertex_editor::EditorError;

/// Undo/redo driver over a [`ChangeLog`].
///
/// The engine owning the graph supplies the callbacks that actually apply an
/// event or its inverse; this type only moves action groups between the log
/// and the redo stack.
#[derive(Debug)]
pub struct UndoEngine<A> {
    undone: Vec<ActionGroup<A>>,
}

impl<A> Default for UndoEngine<A> {
    fn default() -> Self {
        UndoEngine { undone: Vec::new() }
    }
}

impl<A> UndoEngine<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revert the latest group, newest event first. Returns `false` when
    /// there is nothing to undo.
    pub fn undo(
        &mut self,
        log: &mut ChangeLog<A>,
        apply_inverse: &mut dyn FnMut(&ChangeEvent<A>) -> Result<(), EditorError>,
    ) -> Result<bool, EditorError> {
        let Some(group) = log.pop_group() else {
            return Ok(false);
        };
        for event in group.events.iter().rev() {
            apply_inverse(event)?;
        }
        self.undone.push(group);
        Ok(true)
    }

    /// Re-apply the most recently undone group. `apply` returns the event as
    /// re-recorded against the current state, which goes back into the log.
    pub fn redo(
        &mut self,
        log: &mut ChangeLog<A>,
        apply: &mut dyn FnMut(&ChangeEvent<A>) -> Result<ChangeEvent<A>, EditorError>,
    ) -> Result<bool, EditorError> {
        let Some(group) = self.undone.pop() else {
            return Ok(false);
        };
        let mut replayed = Vec::with_capacity(group.events.len());
        for event in &group.events {
            replayed.push(apply(event)?);
        }
        log.push_group(ActionGroup {
            description: group.description,
            events: replayed,
        });
        Ok(true)
    }

    /// A fresh edit invalidates everything that was undone.
    pub fn clear(&mut self) {
        self.undone.clear();
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::change_log::CellContent;
    use super::*;
    use gridcalc_common::{CellAddress, LiteralValue};

    fn set(v: f64) -> ChangeEvent<()> {
        ChangeEvent::SetContent {
            addr: CellAddress::new(0, 0, 0),
            old: CellContent::Empty,
            new: CellContent::Value(LiteralValue::Number(v)),
        }
    }

    #[test]
    fn undo_reverses_events_and_redo_rerecords() {
        let mut log = ChangeLog::new();
        log.begin_compound("two");
        log.record(set(1.0));
        log.record(set(2.0));
        log.end_compound();

        let mut undo = UndoEngine::new();
        let mut seen = Vec::new();
        assert!(undo
            .undo(&mut log, &mut |e| {
                seen.push(e.clone());
                Ok(())
            })
            .unwrap());
        assert_eq!(seen, vec![set(2.0), set(1.0)]);
        assert!(log.is_empty());
        assert!(undo.can_redo());

        assert!(undo.redo(&mut log, &mut |e| Ok(e.clone())).unwrap());
        assert_eq!(log.len(), 1);
        assert_eq!(log.groups()[0].events.len(), 2);
        assert!(!undo.redo(&mut log, &mut |e| Ok(e.clone())).unwrap());
    }

    #[test]
    fn undo_with_empty_log_is_a_no_op() {
        let mut log: ChangeLog<()> = ChangeLog::new();
        let mut undo = UndoEngine::new();
        assert!(!undo.undo(&mut log, &mut |_| Ok(())).unwrap());
    }
}

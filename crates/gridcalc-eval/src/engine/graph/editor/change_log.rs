//! Change logging for undo/redo.
//!
//! Events carry enough state to be inverted: structural edits keep the cells
//! they destroyed plus the pre-edit ASTs of formulas whose references the
//! edit rewrote irreversibly (contracted or invalidated).

use gridcalc_common::{CellAddress, LiteralValue, RangeAddress, SheetId};

/// What a cell holds, in the shape the engine accepts as input.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent<A> {
    Empty,
    Value(LiteralValue),
    Formula(A),
}

impl<A> CellContent<A> {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Empty)
    }
}

/// State a structural edit destroyed.
#[derive(Debug, Clone, PartialEq)]
pub struct Displaced<A> {
    /// Cells removed by the edit, at their pre-edit positions.
    pub cells: Vec<(CellAddress, CellContent<A>)>,
    /// Surviving formulas at their pre-edit positions with pre-edit ASTs.
    pub rewritten: Vec<(CellAddress, A)>,
}

impl<A> Default for Displaced<A> {
    fn default() -> Self {
        Displaced {
            cells: Vec::new(),
            rewritten: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<A> {
    SetContent {
        addr: CellAddress,
        old: CellContent<A>,
        new: CellContent<A>,
    },
    InsertRows {
        sheet_id: SheetId,
        before: u32,
        count: u32,
    },
    DeleteRows {
        sheet_id: SheetId,
        start: u32,
        count: u32,
        displaced: Displaced<A>,
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
        displaced: Displaced<A>,
    },
    MoveRange {
        source: RangeAddress,
        dest_row: u32,
        dest_col: u32,
        displaced: Displaced<A>,
    },
    AddSheet {
        name: String,
    },
    RemoveSheet {
        name: String,
        displaced: Displaced<A>,
    },
}

impl<A> ChangeEvent<A> {
    pub fn describe(&self) -> &'static str {
        match self {
            ChangeEvent::SetContent { .. } => "edit cell",
            ChangeEvent::InsertRows { .. } => "insert rows",
            ChangeEvent::DeleteRows { .. } => "delete rows",
            ChangeEvent::InsertColumns { .. } => "insert columns",
            ChangeEvent::DeleteColumns { .. } => "delete columns",
            ChangeEvent::MoveRange { .. } => "move range",
            ChangeEvent::AddSheet { .. } => "add sheet",
            ChangeEvent::RemoveSheet { .. } => "remove sheet",
        }
    }
}

/// Events undone and redone as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionGroup<A> {
    pub description: String,
    pub events: Vec<ChangeEvent<A>>,
}

/// Ordered history of edits, grouped into undoable actions.
#[derive(Debug)]
pub struct ChangeLog<A> {
    groups: Vec<ActionGroup<A>>,
    open: Option<ActionGroup<A>>,
    depth: usize,
    enabled: bool,
}

impl<A> Default for ChangeLog<A> {
    fn default() -> Self {
        ChangeLog {
            groups: Vec::new(),
            open: None,
            depth: 0,
            enabled: true,
        }
    }
}

impl<A> ChangeLog<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an event. Outside a compound action each event is its own group.
    pub fn record(&mut self, event: ChangeEvent<A>) {
        if !self.enabled {
            return;
        }
        match self.open.as_mut() {
            Some(group) => group.events.push(event),
            None => self.groups.push(ActionGroup {
                description: event.describe().to_string(),
                events: vec![event],
            }),
        }
    }

    /// Start a compound action. Nested calls fold into the outermost one.
    pub fn begin_compound(&mut self, description: impl Into<String>) {
        self.depth += 1;
        if self.depth == 1 {
            self.open = Some(ActionGroup {
                description: description.into(),
                events: Vec::new(),
            });
        }
    }

    pub fn end_compound(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            if let Some(group) = self.open.take().filter(|g| !g.events.is_empty()) {
                self.groups.push(group);
            }
        }
    }

    pub fn in_compound(&self) -> bool {
        self.depth > 0
    }

    /// Most recent closed group. Open compounds are closed first.
    pub fn pop_group(&mut self) -> Option<ActionGroup<A>> {
        while self.depth > 0 {
            self.end_compound();
        }
        self.groups.pop()
    }

    pub(crate) fn push_group(&mut self, group: ActionGroup<A>) {
        if !group.events.is_empty() {
            self.groups.push(group);
        }
    }

    pub fn groups(&self) -> &[ActionGroup<A>] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.open = None;
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(row: u32, v: f64) -> ChangeEvent<()> {
        ChangeEvent::SetContent {
            addr: CellAddress::new(0, row, 0),
            old: CellContent::Empty,
            new: CellContent::Value(LiteralValue::Number(v)),
        }
    }

    #[test]
    fn single_events_form_their_own_groups() {
        let mut log = ChangeLog::new();
        log.record(set(0, 1.0));
        log.record(set(1, 2.0));
        assert_eq!(log.len(), 2);
        assert_eq!(log.groups()[0].description, "edit cell");
    }

    #[test]
    fn nested_compounds_fold_into_one_group() {
        let mut log = ChangeLog::new();
        log.begin_compound("paste");
        log.record(set(0, 1.0));
        log.begin_compound("inner");
        log.record(set(1, 2.0));
        log.end_compound();
        assert!(log.in_compound());
        log.end_compound();
        assert_eq!(log.len(), 1);
        assert_eq!(log.groups()[0].description, "paste");
        assert_eq!(log.groups()[0].events.len(), 2);
    }

    #[test]
    fn empty_compound_is_dropped_and_disabled_log_ignores_events() {
        let mut log: ChangeLog<()> = ChangeLog::new();
        log.begin_compound("nothing");
        log.end_compound();
        assert!(log.is_empty());

        log.set_enabled(false);
        log.record(set(0, 1.0));
        assert!(log.is_empty());
    }
}

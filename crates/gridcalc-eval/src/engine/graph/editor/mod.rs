pub mod change_log;
pub mod reference_adjuster;
pub mod transform_log;
pub mod undo_engine;
pub mod vertex_editor;

pub use change_log::{ActionGroup, CellContent, ChangeEvent, ChangeLog, Displaced};
pub use reference_adjuster::{ReferenceAdjuster, ShiftOperation};
pub use transform_log::TransformLog;
pub use undo_engine::UndoEngine;
pub use vertex_editor::{EditPlan, EditorError, ShiftSummary, VertexEditor};

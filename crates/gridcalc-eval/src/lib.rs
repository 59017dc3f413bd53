//! Spreadsheet dependency graph and incremental recalculation engine.
//!
//! [`engine::Engine`] owns the graph and drives evaluation through the
//! [`traits::Interpreter`] seam; [`interpreter::FormulaInterpreter`] and
//! [`builtins`] provide a small reference formula language on top of
//! `gridcalc-parse`.

pub mod builtins;
pub mod engine;
pub mod function;
pub mod function_registry;
pub mod interpreter;
pub mod telemetry;
pub mod traits;

pub use engine::{
    CellContent, ChangeEvent, EditorError, Engine, EvalConfig, EvalPhase, EvalResult, GraphError,
    ShiftSummary, VertexId,
};
pub use function::FnCaps;
pub use interpreter::FormulaInterpreter;
pub use traits::{EvaluationContext, Function, FunctionMeta, FunctionProvider, Interpreter};

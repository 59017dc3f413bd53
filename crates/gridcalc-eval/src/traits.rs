//! Core object-safe traits shared by the engine, the interpreter and builtins.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::NaiveDateTime;
use gridcalc_common::{
    CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress, ReferenceType, SheetId,
};
use gridcalc_parse::{ASTNode, ASTNodeType};

use crate::engine::DEFAULT_MAX_ARRAY_CELLS;
use crate::engine::range_cache::{ErrorPolicy, Reduction, ReductionKind};
use crate::function::FnCaps;
use crate::interpreter::FormulaInterpreter;

/* ───────────────────────── Interpreter seam ───────────────────────── */

/// What the engine needs from a formula language: reference extraction,
/// reference rewriting for structural edits, and evaluation.
pub trait Interpreter {
    type Ast: Clone + Debug;

    /// Every cell/range reference the formula reads, in source order.
    fn references(&self, ast: &Self::Ast) -> Vec<ReferenceType>;

    /// Upper-cased names of every function the formula calls.
    fn function_names(&self, ast: &Self::Ast) -> Vec<String>;

    /// Copy of `ast` with each reference replaced by `f(reference)`.
    fn rewrite_references(
        &self,
        ast: &Self::Ast,
        f: &mut dyn FnMut(&ReferenceType) -> ReferenceType,
    ) -> Self::Ast;

    fn evaluate(&self, ast: &Self::Ast, ctx: &dyn EvaluationContext) -> LiteralValue;
}

/* ────────────────────────── Function lookup ───────────────────────── */

/// Arity and capabilities of a registered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionMeta {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub caps: FnCaps,
}

pub trait FunctionProvider: Send + Sync {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>>;

    fn function_meta(&self, name: &str) -> Option<FunctionMeta> {
        self.get_function(name).map(|f| FunctionMeta {
            name: f.name(),
            min_args: f.min_args(),
            max_args: f.max_args(),
            caps: f.caps(),
        })
    }

    /// How reductions of `kind` treat error cells.
    fn reduction_error_policy(&self, kind: ReductionKind) -> ErrorPolicy {
        kind.default_error_policy()
    }

    fn is_volatile(&self, name: &str) -> bool {
        self.function_meta(name)
            .is_some_and(|m| m.caps.contains(FnCaps::VOLATILE))
    }
}

/* ─────────────────────── Evaluation context ──────────────────────── */

/// Read access to the graph for a formula under evaluation.
pub trait EvaluationContext {
    /// Cell whose formula is being evaluated.
    fn current_cell(&self) -> CellAddress;

    /// `None` is the current cell's sheet. Unknown sheets resolve to `None`.
    fn resolve_sheet(&self, name: Option<&str>) -> Option<SheetId>;

    fn cell_value(&self, addr: CellAddress) -> LiteralValue;

    fn range_values(&self, range: &RangeAddress) -> Vec<Vec<LiteralValue>>;

    /// Reduce a range using the error policy configured for `kind`.
    fn aggregate(&self, range: &RangeAddress, kind: ReductionKind) -> Reduction;

    fn error_policy(&self, kind: ReductionKind) -> ErrorPolicy {
        kind.default_error_policy()
    }

    fn function(&self, name: &str) -> Option<Arc<dyn Function>>;

    /// Largest array a formula may materialize.
    fn max_array_cells(&self) -> usize {
        DEFAULT_MAX_ARRAY_CELLS
    }

    /// Seed for random functions, stable within one recalculation pass.
    fn random_seed(&self) -> u64;

    fn now(&self) -> NaiveDateTime;

    /// Ask the engine to write `value` into `addr` once the pass finishes.
    fn queue_write(&self, addr: CellAddress, value: LiteralValue);
}

/* ───────────────────────────── Functions ──────────────────────────── */

/// A callable builtin of the reference formula language.
pub trait Function: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn caps(&self) -> FnCaps {
        FnCaps::PURE
    }

    fn min_args(&self) -> usize {
        0
    }

    /// `None` for variadic functions.
    fn max_args(&self) -> Option<usize> {
        None
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext)
    -> Result<LiteralValue, ExcelError>;
}

/// Lazily evaluated function argument.
pub struct ArgumentHandle<'a> {
    node: &'a ASTNode,
    interp: &'a FormulaInterpreter,
    ctx: &'a dyn EvaluationContext,
}

impl<'a> ArgumentHandle<'a> {
    pub(crate) fn new(
        node: &'a ASTNode,
        interp: &'a FormulaInterpreter,
        ctx: &'a dyn EvaluationContext,
    ) -> Self {
        ArgumentHandle { node, interp, ctx }
    }

    /// Evaluated argument; range references come back as arrays.
    pub fn value(&self) -> LiteralValue {
        if let ASTNodeType::Literal(v) = &self.node.node_type {
            return v.clone();
        }
        self.interp.eval_node(self.node, self.ctx)
    }

    /// Evaluated argument collapsed to one value (top-left of arrays).
    pub fn scalar(&self) -> LiteralValue {
        self.value().into_scalar()
    }

    /// Resolved bounds when the argument is a literal range reference.
    pub fn range(&self) -> Result<Option<RangeAddress>, ExcelError> {
        match &self.node.node_type {
            ASTNodeType::Reference(ReferenceType::Range { sheet, start, end }) => {
                let sheet_id = self
                    .ctx
                    .resolve_sheet(sheet.as_deref())
                    .ok_or_else(|| ExcelError::new(ExcelErrorKind::Ref))?;
                Ok(Some(RangeAddress::new(
                    sheet_id, start.row, start.col, end.row, end.col,
                )))
            }
            ASTNodeType::Reference(ReferenceType::Invalid) => {
                Err(ExcelError::new(ExcelErrorKind::Ref))
            }
            _ => Ok(None),
        }
    }

    /// Whether the argument is written as a cell or range reference.
    pub fn is_reference(&self) -> bool {
        matches!(self.node.node_type, ASTNodeType::Reference(_))
    }

    pub fn ast(&self) -> &'a ASTNode {
        self.node
    }
}

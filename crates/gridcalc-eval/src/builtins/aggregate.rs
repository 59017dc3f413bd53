//! Range reductions: SUM, COUNT, MIN, ... routed through the range cache.

use std::sync::Arc;

use gridcalc_common::{ExcelError, ExcelErrorKind, LiteralValue};

use crate::engine::range_cache::{Reduction, ReductionKind};
use crate::function::FnCaps;
use crate::function_registry;
use crate::traits::{ArgumentHandle, EvaluationContext, Function};

/// Feed a directly supplied argument (not read from a cell). Direct text
/// and booleans take part in arithmetic, unlike values read from ranges.
fn push_direct(state: &mut Reduction, value: LiteralValue) -> Result<(), ExcelError> {
    let kind = state.kind();
    match value {
        LiteralValue::Number(n) => state.push_number(n),
        LiteralValue::Boolean(b) => state.push_number(if b { 1.0 } else { 0.0 }),
        LiteralValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) if kind != ReductionKind::CountA => state.push_number(n),
            _ => match kind {
                ReductionKind::CountA | ReductionKind::CountBlank => {
                    state.push_cell(&LiteralValue::Text(s))
                }
                ReductionKind::Count => {}
                _ => {
                    return Err(ExcelError::new(ExcelErrorKind::Value)
                        .with_message(format!("cannot use '{s}' as a number")));
                }
            },
        },
        other => state.push_cell(&other),
    }
    Ok(())
}

/// Fold every argument into one state, left to right.
fn reduce_args(
    kind: ReductionKind,
    args: &[ArgumentHandle<'_>],
    ctx: &dyn EvaluationContext,
) -> Result<Reduction, ExcelError> {
    let mut state = Reduction::new(kind, ctx.error_policy(kind));
    for arg in args {
        match arg.range()? {
            Some(range) => state.merge(&ctx.aggregate(&range, kind)),
            // Single-cell references use range semantics.
            None if arg.is_reference() => state.push_cell(&arg.value()),
            None => push_direct(&mut state, arg.value())?,
        }
    }
    Ok(state)
}

#[derive(Debug)]
pub struct ReduceFn {
    name: &'static str,
    kind: ReductionKind,
    min_args: usize,
}

impl Function for ReduceFn {
    fn name(&self) -> &'static str {
        self.name
    }

    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::REDUCTION
    }

    fn min_args(&self) -> usize {
        self.min_args
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        Ok(reduce_args(self.kind, args, ctx)?.finish())
    }
}

#[derive(Debug)]
pub struct AverageFn;

impl Function for AverageFn {
    fn name(&self) -> &'static str {
        "AVERAGE"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::REDUCTION
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        let sum = reduce_args(ReductionKind::Sum, args, ctx)?.finish();
        let count = reduce_args(ReductionKind::Count, args, ctx)?.finish();
        match (sum, count) {
            (LiteralValue::Error(e), _) => Ok(LiteralValue::Error(e)),
            (_, LiteralValue::Number(c)) if c == 0.0 => Err(ExcelError::new_div()),
            (LiteralValue::Number(s), LiteralValue::Number(c)) => Ok(LiteralValue::Number(s / c)),
            (_, other) => Ok(other),
        }
    }
}

pub fn register_builtins() {
    let reductions = [
        ("SUM", ReductionKind::Sum, 1),
        ("COUNT", ReductionKind::Count, 1),
        ("COUNTA", ReductionKind::CountA, 1),
        ("COUNTBLANK", ReductionKind::CountBlank, 1),
        ("MIN", ReductionKind::Min, 1),
        ("MAX", ReductionKind::Max, 1),
        ("SUMSQ", ReductionKind::SumSq, 1),
        ("PRODUCT", ReductionKind::Product, 1),
    ];
    for (name, kind, min_args) in reductions {
        function_registry::insert(Arc::new(ReduceFn {
            name,
            kind,
            min_args,
        }));
    }
    function_registry::insert(Arc::new(AverageFn));
}

use std::sync::Arc;

use gridcalc_common::{ExcelError, ExcelErrorKind, LiteralValue};

use crate::function::FnCaps;
use crate::function_registry;
use crate::traits::{ArgumentHandle, EvaluationContext, Function};

/// Truth value of a condition argument. Text other than TRUE/FALSE is #VALUE!.
fn condition(v: LiteralValue) -> Result<bool, ExcelError> {
    match v {
        LiteralValue::Error(e) => Err(e),
        LiteralValue::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        LiteralValue::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        LiteralValue::Text(_) => Err(ExcelError::new(ExcelErrorKind::Value)),
        other => Ok(other.is_truthy()),
    }
}

/* ─────────────────────────── IF() ───────────────────────────────── */

#[derive(Debug)]
pub struct IfFn;

impl Function for IfFn {
    fn name(&self) -> &'static str {
        "IF"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::SHORT_CIRCUIT
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        if condition(args[0].scalar())? {
            Ok(args[1].value())
        } else {
            Ok(args.get(2).map_or(LiteralValue::Boolean(false), |a| a.value()))
        }
    }
}

/* ─────────────────────────── IFERROR() ──────────────────────────── */

#[derive(Debug)]
pub struct IfErrorFn;

impl Function for IfErrorFn {
    fn name(&self) -> &'static str {
        "IFERROR"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::SHORT_CIRCUIT
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        match args[0].value() {
            LiteralValue::Error(_) => Ok(args[1].value()),
            v => Ok(v),
        }
    }
}

/* ─────────────────────────── AND() / OR() ───────────────────────── */

/// Shared body of AND/OR. Inside arrays, text and blanks are skipped; with
/// no logical value at all the result is #VALUE!.
fn fold_logical(args: &[ArgumentHandle<'_>], is_and: bool) -> Result<LiteralValue, ExcelError> {
    let mut acc = is_and;
    let mut seen = false;
    let mut take = |b: bool| {
        seen = true;
        acc = if is_and { acc && b } else { acc || b };
    };
    for arg in args {
        match arg.value() {
            LiteralValue::Array(rows) => {
                for v in rows.iter().flatten() {
                    match v {
                        LiteralValue::Error(e) => return Err(e.clone()),
                        LiteralValue::Boolean(b) => take(*b),
                        LiteralValue::Number(n) => take(*n != 0.0),
                        _ => {}
                    }
                }
            }
            LiteralValue::Empty => {}
            LiteralValue::Text(_) if arg.is_reference() => {}
            other => take(condition(other)?),
        }
    }
    if seen {
        Ok(LiteralValue::Boolean(acc))
    } else {
        Err(ExcelError::new(ExcelErrorKind::Value))
    }
}

#[derive(Debug)]
pub struct AndFn;

impl Function for AndFn {
    fn name(&self) -> &'static str {
        "AND"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        fold_logical(args, true)
    }
}

#[derive(Debug)]
pub struct OrFn;

impl Function for OrFn {
    fn name(&self) -> &'static str {
        "OR"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        fold_logical(args, false)
    }
}

/* ─────────────────────────── NOT() ──────────────────────────────── */

#[derive(Debug)]
pub struct NotFn;

impl Function for NotFn {
    fn name(&self) -> &'static str {
        "NOT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(!condition(args[0].scalar())?))
    }
}

pub fn register_builtins() {
    function_registry::insert(Arc::new(IfFn));
    function_registry::insert(Arc::new(IfErrorFn));
    function_registry::insert(Arc::new(AndFn));
    function_registry::insert(Arc::new(OrFn));
    function_registry::insert(Arc::new(NotFn));
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::MapContext;
    use gridcalc_common::{ExcelErrorKind, LiteralValue};

    fn b(v: bool) -> LiteralValue {
        LiteralValue::Boolean(v)
    }

    #[test]
    fn if_evaluates_only_the_taken_branch() {
        let ctx = MapContext::with(&[((0, 0), LiteralValue::Number(5.0))]);
        assert_eq!(ctx.eval("=IF(A1>3, \"big\", 1/0)"), LiteralValue::Text("big".into()));
        assert_eq!(ctx.eval("=IF(A1<3, 1)"), b(false));
        assert_eq!(ctx.eval("=IF(1/0, 1, 2)").error_kind(), Some(ExcelErrorKind::Div));
        assert_eq!(ctx.eval("=IFERROR(1/0, -1)"), LiteralValue::Number(-1.0));
        assert_eq!(ctx.eval("=IFERROR(2, -1)"), LiteralValue::Number(2.0));
    }

    #[test]
    fn and_or_not() {
        let ctx = MapContext::with(&[
            ((0, 0), LiteralValue::Boolean(true)),
            ((1, 0), LiteralValue::Text("x".into())),
            ((2, 0), LiteralValue::Number(0.0)),
        ]);
        assert_eq!(ctx.eval("=AND(A1:A2)"), b(true));
        assert_eq!(ctx.eval("=AND(A1:A3)"), b(false));
        assert_eq!(ctx.eval("=OR(A3, 1)"), b(true));
        assert_eq!(ctx.eval("=OR(B1:B3)").error_kind(), Some(ExcelErrorKind::Value));
        assert_eq!(ctx.eval("=AND(\"x\")").error_kind(), Some(ExcelErrorKind::Value));
        assert_eq!(ctx.eval("=NOT(A3)"), b(true));
    }
}

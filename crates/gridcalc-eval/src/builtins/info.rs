//! IS* predicates and NA().

use std::sync::Arc;

use gridcalc_common::{ExcelError, ExcelErrorKind, LiteralValue};

use crate::function_registry;
use crate::traits::{ArgumentHandle, EvaluationContext, Function};

/// One-argument predicate over the argument's scalar value.
pub struct IsFn {
    name: &'static str,
    test: fn(&LiteralValue) -> bool,
}

impl Function for IsFn {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean((self.test)(&args[0].scalar())))
    }
}

#[derive(Debug)]
pub struct NaFn;

impl Function for NaFn {
    fn name(&self) -> &'static str {
        "NA"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn eval(&self, _args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::error(ExcelErrorKind::Na))
    }
}

pub fn register_builtins() {
    let predicates: [(&'static str, fn(&LiteralValue) -> bool); 5] = [
        ("ISERROR", |v| v.is_error()),
        ("ISERR", |v| v.is_error() && v.error_kind() != Some(ExcelErrorKind::Na)),
        ("ISNA", |v| v.error_kind() == Some(ExcelErrorKind::Na)),
        ("ISBLANK", |v| matches!(v, LiteralValue::Empty)),
        ("ISNUMBER", |v| matches!(v, LiteralValue::Number(_))),
    ];
    for (name, test) in predicates {
        function_registry::insert(Arc::new(IsFn { name, test }));
    }
    function_registry::insert(Arc::new(NaFn));
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::MapContext;
    use gridcalc_common::{ExcelErrorKind, LiteralValue};

    #[test]
    fn predicates() {
        let ctx = MapContext::with(&[((0, 0), LiteralValue::Number(1.0))]);
        let t = LiteralValue::Boolean(true);
        let f = LiteralValue::Boolean(false);
        assert_eq!(ctx.eval("=ISERROR(1/0)"), t);
        assert_eq!(ctx.eval("=ISERR(NA())"), f);
        assert_eq!(ctx.eval("=ISNA(NA())"), t);
        assert_eq!(ctx.eval("=ISBLANK(B1)"), t);
        assert_eq!(ctx.eval("=ISBLANK(A1)"), f);
        assert_eq!(ctx.eval("=ISNUMBER(A1)"), t);
        assert_eq!(ctx.eval("=NA()").error_kind(), Some(ExcelErrorKind::Na));
    }
}

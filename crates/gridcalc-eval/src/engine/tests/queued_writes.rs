use std::sync::Arc;

use gridcalc_common::{CellAddress, ExcelError, LiteralValue};

use super::common::{n, sheet};
use crate::engine::ChangeEvent;
use crate::function_registry;
use crate::traits::{ArgumentHandle, EvaluationContext, Function};

/// Writes its argument into the cell below the caller.
#[derive(Debug)]
struct WriteBelow;

impl Function for WriteBelow {
    fn name(&self) -> &'static str {
        "WRITEBELOW"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        let here = ctx.current_cell();
        ctx.queue_write(CellAddress::new(here.sheet_id, here.row + 1, here.col), args[0].scalar());
        Ok(LiteralValue::Boolean(true))
    }
}

#[test]
fn queued_writes_land_after_the_pass() {
    function_registry::register(Arc::new(WriteBelow));
    let mut s = sheet();
    s.set("A1", "=WRITEBELOW(7)");
    s.set("B1", "=A2*2");
    let result = s.recalc();
    assert_eq!(result.passes, 2);
    assert_eq!(s.value("A1"), LiteralValue::Boolean(true));
    assert_eq!(s.value("A2"), n(7.0));
    assert_eq!(s.value("B1"), n(14.0));

    let last = s.engine.change_log().groups().last().unwrap();
    assert!(matches!(
        last.events.as_slice(),
        [ChangeEvent::SetContent { addr, .. }] if *addr == s.addr("A2")
    ));
    assert_eq!(s.recalc().computed_vertices, 0);
}

#[test]
fn queued_writes_can_be_undone() {
    function_registry::register(Arc::new(WriteBelow));
    let mut s = sheet();
    s.set("C1", "=WRITEBELOW(\"x\")");
    s.recalc();
    assert_eq!(s.value("C2"), LiteralValue::Text("x".into()));
    s.engine.undo().unwrap();
    assert!(s.value("C2").is_blank());
}

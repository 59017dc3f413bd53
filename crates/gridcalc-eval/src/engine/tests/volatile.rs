use chrono::NaiveDate;
use gridcalc_common::LiteralValue;

use super::common::{n, sheet, sheet_with};
use crate::engine::EvalConfig;

#[test]
fn volatile_cells_recompute_every_time() {
    let mut s = sheet();
    s.set("A1", "=RAND()");
    s.set("B1", "=A1*2");
    assert_eq!(s.recalc().computed_vertices, 2);
    let first = s.value("A1");

    let again = s.recalc();
    assert_eq!(again.computed_vertices, 2);
    assert_ne!(s.value("A1"), first);
    let (LiteralValue::Number(a), LiteralValue::Number(b)) = (s.value("A1"), s.value("B1")) else {
        panic!("expected numbers");
    };
    assert!((0.0..1.0).contains(&a));
    assert_eq!(b, a * 2.0);
}

#[test]
fn same_seed_same_sequence() {
    let run = || {
        let mut s = sheet_with(EvalConfig::default().with_seed(7));
        s.set("A1", "=RAND()");
        s.set("A2", "=RANDBETWEEN(1,100)");
        s.recalc();
        let first = (s.value("A1"), s.value("A2"));
        s.recalc();
        (first, (s.value("A1"), s.value("A2")))
    };
    assert_eq!(run(), run());
}

#[test]
fn fixed_clock_drives_now() {
    let now = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let mut s = sheet_with(EvalConfig::default().with_fixed_now(now));
    s.set("A1", "=NOW()");
    s.set("A2", "=TODAY()");
    s.recalc();
    assert_eq!(s.value("A1"), n(45292.5));
    assert_eq!(s.value("A2"), n(45292.0));
}

#[test]
fn replacing_a_volatile_formula_stops_recompute() {
    let mut s = sheet();
    s.set("A1", "=RAND()");
    s.recalc();
    s.set("A1", "=1+1");
    s.recalc();
    assert_eq!(s.recalc().computed_vertices, 0);
    assert!(!s.engine.graph().vertex(s.vertex("A1").unwrap()).unwrap().is_volatile());
}

#[test]
fn volatility_is_found_inside_nested_calls() {
    let mut s = sheet();
    s.set("A1", "=IF(TRUE,ROUND(RAND()*10,0),0)");
    s.recalc();
    assert_eq!(s.recalc().computed_vertices, 1);
}

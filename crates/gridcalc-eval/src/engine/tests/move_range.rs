use gridcalc_common::{ExcelErrorKind, LiteralValue, RangeAddress};

use super::common::{n, sheet};
use crate::engine::EditorError;

#[test]
fn references_follow_moved_cells() {
    let mut s = sheet();
    s.set("A1", "1");
    s.set("A2", "2");
    s.set("B1", "=A1+A2");
    s.set("B2", "=SUM(A1:A2)");
    s.recalc();
    let a1 = s.vertex("A1").unwrap();

    let source = RangeAddress::new(s.sid, 0, 0, 1, 0);
    s.engine.move_range(source, 0, 3).unwrap();
    assert_eq!(s.vertex("D1"), Some(a1));
    assert!(s.vertex("A1").is_none());
    assert_eq!(s.formula("B1").as_deref(), Some("=D1+D2"));
    assert_eq!(s.formula("B2").as_deref(), Some("=SUM(D1:D2)"));

    s.set("D2", "5");
    s.recalc();
    assert_eq!(s.value("B1"), n(6.0));
    assert_eq!(s.value("B2"), n(6.0));
}

#[test]
fn formulas_inside_the_block_move_with_it() {
    let mut s = sheet();
    s.set("A1", "3");
    s.set("A2", "=A1*2");
    s.set("C5", "7");
    s.set("A3", "=C5");
    let source = RangeAddress::new(s.sid, 0, 0, 2, 0);
    s.engine.move_range(source, 10, 1).unwrap();
    assert_eq!(s.formula("B12").as_deref(), Some("=B11*2"));
    // References leaving the block stay put.
    assert_eq!(s.formula("B13").as_deref(), Some("=C5"));
    s.recalc();
    assert_eq!(s.value("B12"), n(6.0));
    assert_eq!(s.value("B13"), n(7.0));
}

#[test]
fn overwritten_destination_becomes_ref_error() {
    let mut s = sheet();
    s.set("A1", "1");
    s.set("C1", "9");
    s.set("D1", "=C1+1");
    s.recalc();
    let source = RangeAddress::new(s.sid, 0, 0, 0, 0);
    s.engine.move_range(source, 0, 2).unwrap();
    assert_eq!(s.value("C1"), n(1.0));
    assert_eq!(s.formula("D1").as_deref(), Some("=#REF!+1"));
    s.recalc();
    assert_eq!(s.value("D1").error_kind(), Some(ExcelErrorKind::Ref));
    assert_eq!(s.value("A1"), LiteralValue::Empty);
}

#[test]
fn moving_onto_itself_does_nothing() {
    let mut s = sheet();
    s.set("A1", "1");
    let before = s.engine.change_log().len();
    let source = RangeAddress::new(s.sid, 0, 0, 0, 0);
    let summary = s.engine.move_range(source, 0, 0).unwrap();
    assert_eq!(summary.vertices_moved, 0);
    assert_eq!(s.engine.change_log().len(), before);
}

#[test]
fn unknown_sheet_in_source_is_rejected() {
    let mut s = sheet();
    let source = RangeAddress::new(42, 0, 0, 0, 0);
    assert_eq!(
        s.engine.move_range(source, 1, 1),
        Err(EditorError::InvalidSheetId(42))
    );
}

#[test]
fn moves_past_the_grid_are_rejected() {
    let mut s = sheet();
    s.set("A1", "1");
    s.set("A2", "2");
    s.set("B1", "=A1+A2");
    s.recalc();
    let version = s.engine.graph().transforms().version();

    let source = RangeAddress::new(s.sid, 0, 0, 1, 0);
    let err = s.engine.move_range(source, u32::MAX, 0).unwrap_err();
    assert!(matches!(err, EditorError::OutOfBounds { .. }));
    let wide = RangeAddress::new(s.sid, 0, 0, 0, 1);
    let err = s.engine.move_range(wide, 0, u32::MAX).unwrap_err();
    assert!(matches!(err, EditorError::OutOfBounds { .. }));

    assert_eq!(s.engine.graph().transforms().version(), version);
    assert_eq!(s.formula("B1").as_deref(), Some("=A1+A2"));
    assert_eq!(s.value("A2"), n(2.0));
}

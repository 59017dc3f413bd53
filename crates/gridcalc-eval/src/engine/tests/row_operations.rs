use gridcalc_common::ExcelErrorKind;

use super::common::{n, sheet};
use crate::engine::EditorError;

fn column_a(values: &[f64]) -> super::common::Sheet {
    let mut s = sheet();
    for (i, v) in values.iter().enumerate() {
        s.set(&format!("A{}", i + 1), &v.to_string());
    }
    s
}

#[test]
fn insert_expands_ranges_and_keeps_vertices() {
    let mut s = column_a(&[1.0, 2.0, 3.0]);
    s.set("B1", "=SUM(A1:A3)");
    s.recalc();
    let b1 = s.vertex("B1").unwrap();
    let a3 = s.vertex("A3").unwrap();

    let summary = s.engine.insert_rows("Sheet1", 1, 2).unwrap();
    assert_eq!(summary.vertices_moved, 2);
    assert_eq!(s.formula("B1").as_deref(), Some("=SUM(A1:A5)"));
    assert_eq!(s.vertex("B1"), Some(b1));
    assert_eq!(s.vertex("A5"), Some(a3));
    // Insertions do not change any result.
    assert_eq!(s.value("B1"), n(6.0));

    s.set("A2", "10");
    s.recalc();
    assert_eq!(s.value("B1"), n(16.0));
}

#[test]
fn absolute_references_shift_too() {
    let mut s = column_a(&[1.0, 2.0, 3.0]);
    s.set("B1", "=$A$3*2");
    s.engine.insert_rows("Sheet1", 0, 1).unwrap();
    assert_eq!(s.formula("B2").as_deref(), Some("=$A$4*2"));
    s.recalc();
    assert_eq!(s.value("B2"), n(6.0));
}

#[test]
fn deleting_a_referenced_cell_gives_ref_error() {
    let mut s = column_a(&[1.0, 2.0, 3.0]);
    s.set("B1", "=A2*2");
    s.recalc();
    s.engine.delete_rows("Sheet1", 1, 1).unwrap();
    assert_eq!(s.formula("B1").as_deref(), Some("=#REF!*2"));
    s.recalc();
    assert_eq!(s.value("B1").error_kind(), Some(ExcelErrorKind::Ref));
    assert_eq!(s.value("A2"), n(3.0));
}

#[test]
fn partial_delete_contracts_ranges() {
    let mut s = column_a(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    s.set("B1", "=SUM(A1:A5)");
    s.recalc();
    s.engine.delete_rows("Sheet1", 1, 2).unwrap();
    assert_eq!(s.formula("B1").as_deref(), Some("=SUM(A1:A3)"));
    s.recalc();
    assert_eq!(s.value("B1"), n(10.0));
}

#[test]
fn deleting_a_whole_range_invalidates_it() {
    let mut s = column_a(&[1.0, 2.0, 3.0, 4.0]);
    s.set("B1", "=SUM(A2:A3)+1");
    s.recalc();
    let summary = s.engine.delete_rows("Sheet1", 1, 2).unwrap();
    assert_eq!(summary.ranges_deleted, 1);
    assert_eq!(s.formula("B1").as_deref(), Some("=SUM(#REF!)+1"));
    s.recalc();
    assert_eq!(s.value("B1").error_kind(), Some(ExcelErrorKind::Ref));
}

#[test]
fn formulas_below_a_delete_move_up() {
    let mut s = column_a(&[1.0, 2.0, 3.0]);
    s.set("A4", "=A1+A3");
    s.recalc();
    s.engine.delete_rows("Sheet1", 1, 1).unwrap();
    assert_eq!(s.formula("A3").as_deref(), Some("=A1+A2"));
    s.set("A2", "30");
    s.recalc();
    assert_eq!(s.value("A3"), n(31.0));
}

#[test]
fn other_sheets_are_untouched() {
    let mut s = column_a(&[1.0, 2.0]);
    s.engine.add_sheet("Other").unwrap();
    let other = s.engine.sheet_id("Other").unwrap();
    let b1 = gridcalc_common::CellAddress::new(other, 0, 1);
    s.set_at(b1, "=Sheet1!A2+A2");
    s.engine.insert_rows("Other", 0, 1).unwrap();
    let moved = gridcalc_common::CellAddress::new(other, 1, 1);
    let ast = s.engine.get_formula(moved).unwrap();
    assert_eq!(gridcalc_parse::to_formula(&ast), "=Sheet1!A2+A3");
}

#[test]
fn unknown_sheet_is_rejected() {
    let mut s = sheet();
    assert_eq!(
        s.engine.insert_rows("Nope", 0, 1),
        Err(EditorError::UnknownSheet("Nope".into()))
    );
}

#[test]
fn zero_count_is_a_no_op() {
    let mut s = column_a(&[1.0]);
    let before = s.engine.change_log().len();
    s.engine.delete_rows("Sheet1", 0, 0).unwrap();
    assert_eq!(s.engine.change_log().len(), before);
    assert_eq!(s.value("A1"), n(1.0));
}

#[test]
fn inserts_past_the_last_row_are_rejected() {
    let mut s = sheet();
    s.set("A5", "1");
    s.set("B1", "=A5");
    s.recalc();
    let version = s.engine.graph().transforms().version();
    let history = s.engine.change_log().len();

    let err = s.engine.insert_rows("Sheet1", 0, u32::MAX).unwrap_err();
    assert!(matches!(err, EditorError::OutOfBounds { .. }));
    assert_eq!(s.engine.graph().transforms().version(), version);
    assert_eq!(s.engine.change_log().len(), history);
    assert_eq!(s.value("A5"), n(1.0));
    assert_eq!(s.formula("B1").as_deref(), Some("=A5"));
    s.recalc();
    assert_eq!(s.value("B1"), n(1.0));

    // Nothing at or below the insert point, so nothing has to move.
    s.engine.insert_rows("Sheet1", 5, u32::MAX - 5).unwrap();
    assert_eq!(s.formula("B1").as_deref(), Some("=A5"));
}

#[test]
fn range_ends_count_towards_the_row_limit() {
    let mut s = column_a(&[1.0, 2.0]);
    s.set("B1", "=SUM(A1:A10)");
    s.recalc();
    let version = s.engine.graph().transforms().version();
    let err = s.engine.insert_rows("Sheet1", 5, u32::MAX - 5).unwrap_err();
    assert!(matches!(err, EditorError::OutOfBounds { .. }));
    assert_eq!(s.engine.graph().transforms().version(), version);
    assert_eq!(s.formula("B1").as_deref(), Some("=SUM(A1:A10)"));
}

#[test]
fn deletes_past_the_last_row_are_rejected() {
    let mut s = column_a(&[1.0, 2.0]);
    let version = s.engine.graph().transforms().version();
    let err = s.engine.delete_rows("Sheet1", u32::MAX, 2).unwrap_err();
    assert!(matches!(err, EditorError::OutOfBounds { .. }));
    assert_eq!(s.engine.graph().transforms().version(), version);
    assert_eq!(s.value("A2"), n(2.0));
}

use gridcalc_common::ExcelErrorKind;

use super::common::{n, sheet, Sheet};
use crate::engine::EditorError;

fn row_1(values: &[f64]) -> Sheet {
    let mut s = sheet();
    let cols = ["A", "B", "C", "D", "E"];
    for (i, v) in values.iter().enumerate() {
        s.set(&format!("{}1", cols[i]), &v.to_string());
    }
    s
}

#[test]
fn insert_columns_expands_ranges() {
    let mut s = row_1(&[1.0, 2.0, 3.0]);
    s.set("A2", "=SUM(A1:C1)");
    s.recalc();
    s.engine.insert_columns("Sheet1", 1, 1).unwrap();
    assert_eq!(s.formula("A2").as_deref(), Some("=SUM(A1:D1)"));
    assert_eq!(s.value("D1"), n(3.0));
    s.set("B1", "4");
    s.recalc();
    assert_eq!(s.value("A2"), n(10.0));
}

#[test]
fn formulas_right_of_an_insert_move() {
    let mut s = row_1(&[1.0, 2.0]);
    s.set("C1", "=A1+B1");
    s.engine.insert_columns("Sheet1", 0, 2).unwrap();
    assert_eq!(s.formula("E1").as_deref(), Some("=C1+D1"));
    assert!(s.vertex("C1").is_some());
    s.recalc();
    assert_eq!(s.value("E1"), n(3.0));
}

#[test]
fn deleting_a_referenced_column() {
    let mut s = row_1(&[1.0, 2.0, 3.0]);
    s.set("A2", "=B1+C1");
    s.set("A3", "=SUM(A1:C1)");
    s.recalc();
    s.engine.delete_columns("Sheet1", 1, 1).unwrap();
    assert_eq!(s.formula("A2").as_deref(), Some("=#REF!+B1"));
    assert_eq!(s.formula("A3").as_deref(), Some("=SUM(A1:B1)"));
    s.recalc();
    assert_eq!(s.value("A2").error_kind(), Some(ExcelErrorKind::Ref));
    assert_eq!(s.value("A3"), n(4.0));
}

#[test]
fn delete_columns_drops_cells_in_the_band() {
    let mut s = row_1(&[1.0, 2.0, 3.0, 4.0]);
    let summary = s.engine.delete_columns("Sheet1", 0, 2).unwrap();
    assert_eq!(summary.vertices_deleted.len(), 2);
    assert_eq!(s.value("A1"), n(3.0));
    assert_eq!(s.value("B1"), n(4.0));
    assert_eq!(s.value("C1"), gridcalc_common::LiteralValue::Empty);
}

#[test]
fn column_shifts_past_the_grid_are_rejected() {
    let mut s = row_1(&[1.0, 2.0, 3.0]);
    s.set("A2", "=C1*2");
    s.recalc();
    let version = s.engine.graph().transforms().version();

    let err = s.engine.insert_columns("Sheet1", 0, u32::MAX).unwrap_err();
    assert!(matches!(err, EditorError::OutOfBounds { .. }));
    let err = s.engine.delete_columns("Sheet1", u32::MAX, 2).unwrap_err();
    assert!(matches!(err, EditorError::OutOfBounds { .. }));

    assert_eq!(s.engine.graph().transforms().version(), version);
    assert_eq!(s.value("C1"), n(3.0));
    assert_eq!(s.formula("A2").as_deref(), Some("=C1*2"));
    s.set("C1", "4");
    s.recalc();
    assert_eq!(s.value("A2"), n(8.0));
}

use gridcalc_common::{CellAddress, ExcelErrorKind};

use super::common::{n, sheet};
use crate::engine::EditorError;

#[test]
fn cross_sheet_references_evaluate() {
    let mut s = sheet();
    let data = s.engine.add_sheet("Data").unwrap();
    s.set_at(CellAddress::new(data, 0, 0), "21");
    s.set("A1", "=Data!A1*2");
    s.recalc();
    assert_eq!(s.value("A1"), n(42.0));

    s.set_at(CellAddress::new(data, 0, 0), "1");
    assert_eq!(s.recalc().computed_vertices, 1);
    assert_eq!(s.value("A1"), n(2.0));
}

#[test]
fn unknown_sheets_resolve_once_added() {
    let mut s = sheet();
    s.set("A1", "=Later!B2+1");
    s.recalc();
    assert_eq!(s.value("A1").error_kind(), Some(ExcelErrorKind::Ref));

    let later = s.engine.add_sheet("later").unwrap();
    s.set_at(CellAddress::new(later, 1, 1), "4");
    s.recalc();
    assert_eq!(s.value("A1"), n(5.0));
    assert_eq!(s.formula("A1").as_deref(), Some("=Later!B2+1"));
}

#[test]
fn removing_a_sheet_breaks_references_to_it() {
    let mut s = sheet();
    let data = s.engine.add_sheet("Data").unwrap();
    s.set_at(CellAddress::new(data, 0, 0), "5");
    s.set("A1", "=Data!A1*2");
    s.set("A2", "=SUM(Data!A1:A3)");
    s.recalc();

    s.engine.remove_sheet("Data").unwrap();
    assert_eq!(s.engine.sheet_id("Data"), None);
    assert_eq!(s.formula("A1").as_deref(), Some("=#REF!*2"));
    s.recalc();
    assert_eq!(s.value("A1").error_kind(), Some(ExcelErrorKind::Ref));
    assert_eq!(s.value("A2").error_kind(), Some(ExcelErrorKind::Ref));
    assert_eq!(
        s.engine.set_cell_value(CellAddress::new(data, 0, 0), n(1.0)),
        Err(EditorError::InvalidSheetId(data))
    );
}

#[test]
fn names_are_unique_and_case_insensitive() {
    let mut s = sheet();
    assert_eq!(
        s.engine.add_sheet("SHEET1"),
        Err(EditorError::DuplicateSheet("SHEET1".into()))
    );
    assert_eq!(s.engine.sheet_id("sheet1"), Some(s.sid));
    assert_eq!(s.engine.sheet_name(s.sid), Some("Sheet1"));
    assert_eq!(
        s.engine.remove_sheet("Missing"),
        Err(EditorError::UnknownSheet("Missing".into()))
    );
    assert_eq!(s.engine.add_sheet(""), Err(EditorError::BlankSheetName));
    assert_eq!(s.engine.add_sheet("  "), Err(EditorError::BlankSheetName));
    assert_eq!(s.engine.graph().sheet_registry().live_ids().count(), 1);
}

#[test]
fn readding_a_removed_sheet_starts_empty() {
    let mut s = sheet();
    let data = s.engine.add_sheet("Data").unwrap();
    s.set_at(CellAddress::new(data, 0, 0), "5");
    s.engine.remove_sheet("Data").unwrap();
    let again = s.engine.add_sheet("Data").unwrap();
    assert_eq!(again, data);
    assert!(s.engine.get_cell_value(CellAddress::new(again, 0, 0)).is_blank());
}

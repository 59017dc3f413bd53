use chrono::NaiveDate;
use gridcalc::{
    EditorError, EvalConfig, ExcelErrorKind, LiteralValue, Workbook, WorkbookConfig, WorkbookError,
};

fn n(v: f64) -> LiteralValue {
    LiteralValue::Number(v)
}

#[test]
fn edit_then_recalculate() {
    let mut wb = Workbook::new().unwrap();
    wb.set_cell_content("Sheet1", "A1", "10").unwrap();
    wb.set_cell_content("Sheet1", "A2", "32").unwrap();
    wb.set_cell_content("Sheet1", "A3", "=SUM(A1:A2)").unwrap();
    assert_eq!(wb.get_cell_value("Sheet1", "A3").unwrap(), LiteralValue::Empty);

    let result = wb.recalculate().unwrap();
    assert_eq!(result.computed_vertices, 1);
    assert_eq!(wb.get_cell_value("Sheet1", "A3").unwrap(), n(42.0));
    assert_eq!(wb.get_formula("Sheet1", "A3").unwrap().as_deref(), Some("=SUM(A1:A2)"));
    assert_eq!(wb.get_formula("Sheet1", "A1").unwrap(), None);
}

#[test]
fn auto_recalculate_keeps_values_current() {
    let mut wb = Workbook::new_with_config(WorkbookConfig::interactive()).unwrap();
    wb.set_cell_content("Sheet1", "A1", "2").unwrap();
    wb.set_cell_content("Sheet1", "B1", "=A1*A1").unwrap();
    assert_eq!(wb.get_cell_value("Sheet1", "B1").unwrap(), n(4.0));
    wb.set_cell_content("Sheet1", "A1", "3").unwrap();
    assert_eq!(wb.get_cell_value("Sheet1", "B1").unwrap(), n(9.0));
    assert_eq!(wb.last_result().map(|r| r.computed_vertices), Some(1));
}

#[test]
fn malformed_formula_stores_error() {
    let mut wb = Workbook::new().unwrap();
    wb.set_cell_content("Sheet1", "A1", "=1+").unwrap();
    wb.set_cell_content("Sheet1", "B1", "=A1").unwrap();
    wb.recalculate().unwrap();
    assert_eq!(
        wb.get_cell_value("Sheet1", "A1").unwrap().error_kind(),
        Some(ExcelErrorKind::Error)
    );
    assert_eq!(
        wb.get_cell_value("Sheet1", "B1").unwrap().error_kind(),
        Some(ExcelErrorKind::Error)
    );
}

#[test]
fn structural_edits_use_display_numbers() {
    let mut wb = Workbook::new_with_config(WorkbookConfig::interactive()).unwrap();
    for (cell, raw) in [("A1", "1"), ("A2", "2"), ("A3", "3"), ("B1", "=SUM(A1:A3)")] {
        wb.set_cell_content("Sheet1", cell, raw).unwrap();
    }
    wb.insert_rows("Sheet1", 2, 1).unwrap();
    assert_eq!(wb.get_formula("Sheet1", "B1").unwrap().as_deref(), Some("=SUM(A1:A4)"));
    assert_eq!(wb.get_cell_value("Sheet1", "A3").unwrap(), n(2.0));

    wb.delete_columns("Sheet1", 1, 1).unwrap();
    assert_eq!(wb.get_formula("Sheet1", "A1").unwrap().as_deref(), Some("=SUM(#REF!)"));
    assert_eq!(
        wb.get_cell_value("Sheet1", "A1").unwrap().error_kind(),
        Some(ExcelErrorKind::Ref)
    );
    assert_eq!(wb.insert_rows("Sheet1", 0, 1), Err(WorkbookError::ZeroIndex));
}

#[test]
fn move_and_read_ranges() {
    let mut wb = Workbook::new_with_config(WorkbookConfig::interactive()).unwrap();
    wb.set_cell_content("Sheet1", "A1", "1").unwrap();
    wb.set_cell_content("Sheet1", "A2", "hello").unwrap();
    wb.set_cell_content("Sheet1", "C1", "=A1+1").unwrap();
    wb.move_range("Sheet1", "A1:A2", "E5").unwrap();
    assert_eq!(wb.get_formula("Sheet1", "C1").unwrap().as_deref(), Some("=E5+1"));
    assert_eq!(
        wb.read_range("Sheet1", "E5:E6").unwrap(),
        vec![vec![n(1.0)], vec![LiteralValue::Text("hello".into())]]
    );
    assert_eq!(wb.get_cell_value("Sheet1", "C1").unwrap(), n(2.0));
}

#[test]
fn sheets_come_and_go() {
    let mut wb = Workbook::new_with_config(WorkbookConfig::interactive()).unwrap();
    wb.set_cell_content("Sheet1", "A1", "=Rates!B2*100").unwrap();
    assert_eq!(
        wb.get_cell_value("Sheet1", "A1").unwrap().error_kind(),
        Some(ExcelErrorKind::Ref)
    );
    wb.add_sheet("Rates").unwrap();
    wb.set_cell_content("Rates", "B2", "0.05").unwrap();
    assert_eq!(wb.get_cell_value("Sheet1", "A1").unwrap(), n(5.0));
    assert_eq!(wb.sheet_names(), vec!["Sheet1".to_string(), "Rates".to_string()]);

    wb.remove_sheet("Rates").unwrap();
    assert!(!wb.has_sheet("Rates"));
    assert_eq!(
        wb.get_cell_value("Sheet1", "A1").unwrap().error_kind(),
        Some(ExcelErrorKind::Ref)
    );
    assert_eq!(
        wb.set_cell_content("Rates", "A1", "1"),
        Err(WorkbookError::UnknownSheet("Rates".into()))
    );
}

#[test]
fn undo_and_redo_actions() {
    let mut wb = Workbook::new_with_config(WorkbookConfig::interactive()).unwrap();
    wb.set_cell_content("Sheet1", "A1", "1").unwrap();
    wb.set_cell_content("Sheet1", "B1", "=A1+1").unwrap();
    wb.action("fill", |wb| {
        wb.set_cell_content("Sheet1", "A1", "10")?;
        wb.set_cell_content("Sheet1", "A2", "20")
    })
    .unwrap();
    assert_eq!(wb.get_cell_value("Sheet1", "B1").unwrap(), n(11.0));

    assert!(wb.undo().unwrap());
    assert_eq!(wb.get_cell_value("Sheet1", "A1").unwrap(), n(1.0));
    assert!(wb.get_cell_value("Sheet1", "A2").unwrap().is_blank());
    assert_eq!(wb.get_cell_value("Sheet1", "B1").unwrap(), n(2.0));

    assert!(wb.redo().unwrap());
    assert_eq!(wb.get_cell_value("Sheet1", "B1").unwrap(), n(11.0));
}

#[test]
fn deterministic_volatiles() {
    let now = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let config = || WorkbookConfig {
        eval: EvalConfig::default().with_seed(99).with_fixed_now(now),
        auto_recalculate: true,
        default_sheet: Some("Main".into()),
    };
    let mut a = Workbook::new_with_config(config()).unwrap();
    let mut b = Workbook::new_with_config(config()).unwrap();
    for wb in [&mut a, &mut b] {
        wb.set_cell_content("Main", "A1", "=RAND()").unwrap();
        wb.set_cell_content("Main", "A2", "=TODAY()").unwrap();
    }
    assert_eq!(a.get_cell_value("Main", "A1").unwrap(), b.get_cell_value("Main", "A1").unwrap());
    assert_eq!(a.get_cell_value("Main", "A2").unwrap(), n(45352.0));
}

#[test]
fn bad_addresses_are_rejected() {
    let wb = Workbook::new().unwrap();
    assert!(matches!(
        wb.get_cell_value("Sheet1", "1A"),
        Err(WorkbookError::Address(_))
    ));
    assert_eq!(
        wb.read_range("Sheet1", "A1:??"),
        Err(WorkbookError::InvalidRange("A1:??".into()))
    );
}

#[test]
fn spilled_arrays_are_visible() {
    let mut wb = Workbook::new_with_config(WorkbookConfig::interactive()).unwrap();
    wb.set_cell_content("Sheet1", "A1", "=SEQUENCE(2,3)").unwrap();
    assert_eq!(
        wb.read_range("Sheet1", "A1:C2").unwrap(),
        vec![vec![n(1.0), n(2.0), n(3.0)], vec![n(4.0), n(5.0), n(6.0)]]
    );
    assert!(matches!(
        wb.set_cell_content("Sheet1", "B2", "1"),
        Err(WorkbookError::Editor(_))
    ));
}

#[test]
fn blank_default_sheet_is_rejected() {
    let config = WorkbookConfig {
        default_sheet: Some(String::new()),
        ..WorkbookConfig::default()
    };
    assert!(matches!(
        Workbook::new_with_config(config),
        Err(WorkbookError::Editor(EditorError::BlankSheetName))
    ));

    let empty = Workbook::new_with_config(WorkbookConfig {
        default_sheet: None,
        ..WorkbookConfig::default()
    })
    .unwrap();
    assert!(empty.sheet_names().is_empty());
}

use gridcalc_common::{CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress, SheetId};
use gridcalc_eval::engine::CellContent;
use gridcalc_eval::{Engine, EvalConfig, EvalResult, FormulaInterpreter, ShiftSummary};
use gridcalc_parse::{ASTNode, parse, to_formula};

use crate::error::WorkbookError;

#[derive(Clone, Debug)]
pub struct WorkbookConfig {
    pub eval: EvalConfig,
    /// Recalculate after every successful edit.
    pub auto_recalculate: bool,
    /// Sheet created by `Workbook::new_with_config`; `None` starts empty.
    pub default_sheet: Option<String>,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            eval: EvalConfig::default(),
            auto_recalculate: false,
            default_sheet: Some("Sheet1".to_string()),
        }
    }
}

impl WorkbookConfig {
    /// Recalculates after each edit, like a spreadsheet UI.
    pub fn interactive() -> Self {
        Self {
            auto_recalculate: true,
            ..Self::default()
        }
    }
}

/// Classify raw user input. Malformed formulas become `#ERROR!` values
/// carrying the parser message.
pub fn parse_input(raw: &str) -> CellContent<ASTNode> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellContent::Empty;
    }
    if trimmed.starts_with('=') {
        return match parse(trimmed) {
            Ok(ast) => CellContent::Formula(ast),
            Err(e) => CellContent::Value(LiteralValue::Error(
                ExcelError::new(ExcelErrorKind::Error).with_message(e.message),
            )),
        };
    }
    if trimmed.eq_ignore_ascii_case("TRUE") {
        return CellContent::Value(LiteralValue::Boolean(true));
    }
    if trimmed.eq_ignore_ascii_case("FALSE") {
        return CellContent::Value(LiteralValue::Boolean(false));
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellContent::Value(LiteralValue::Number(n)),
        _ => CellContent::Value(LiteralValue::Text(raw.to_string())),
    }
}

/// Engine-backed workbook facade.
pub struct Workbook {
    engine: Engine<FormulaInterpreter>,
    auto_recalculate: bool,
    last_result: Option<EvalResult>,
}

impl Workbook {
    pub fn new() -> Result<Self, WorkbookError> {
        Self::new_with_config(WorkbookConfig::default())
    }

    /// Fails when `default_sheet` is not a usable sheet name.
    pub fn new_with_config(config: WorkbookConfig) -> Result<Self, WorkbookError> {
        let mut engine = Engine::new(FormulaInterpreter, config.eval);
        if let Some(name) = &config.default_sheet {
            engine.add_sheet(name)?;
        }
        Ok(Self {
            engine,
            auto_recalculate: config.auto_recalculate,
            last_result: None,
        })
    }

    pub fn engine(&self) -> &Engine<FormulaInterpreter> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<FormulaInterpreter> {
        &mut self.engine
    }

    pub fn set_auto_recalculate(&mut self, enabled: bool) {
        self.auto_recalculate = enabled;
    }

    /// Statistics of the most recent recalculation, manual or automatic.
    pub fn last_result(&self) -> Option<&EvalResult> {
        self.last_result.as_ref()
    }

    // Sheets
    pub fn sheet_names(&self) -> Vec<String> {
        let registry = self.engine.graph().sheet_registry();
        registry
            .live_ids()
            .filter_map(|id| registry.name(id).map(str::to_string))
            .collect()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.engine.sheet_id(name).is_some()
    }

    pub fn add_sheet(&mut self, name: &str) -> Result<(), WorkbookError> {
        self.engine.add_sheet(name)?;
        self.after_edit()
    }

    /// Remove a sheet; references to it become `#REF!`.
    pub fn remove_sheet(&mut self, name: &str) -> Result<(), WorkbookError> {
        self.engine.remove_sheet(name)?;
        self.after_edit()
    }

    // Cells
    pub fn set_cell_content(&mut self, sheet: &str, cell: &str, raw: &str) -> Result<(), WorkbookError> {
        let addr = self.cell(sheet, cell)?;
        self.engine.set_cell_content(addr, parse_input(raw))?;
        self.after_edit()
    }

    pub fn set_value(&mut self, sheet: &str, cell: &str, value: LiteralValue) -> Result<(), WorkbookError> {
        let addr = self.cell(sheet, cell)?;
        self.engine.set_cell_value(addr, value)?;
        self.after_edit()
    }

    pub fn clear_cell(&mut self, sheet: &str, cell: &str) -> Result<(), WorkbookError> {
        let addr = self.cell(sheet, cell)?;
        self.engine.clear_cell(addr)?;
        self.after_edit()
    }

    /// Last computed value; formulas read `Empty` until recalculated.
    pub fn get_cell_value(&self, sheet: &str, cell: &str) -> Result<LiteralValue, WorkbookError> {
        Ok(self.engine.get_cell_value(self.cell(sheet, cell)?))
    }

    /// Canonical formula text with structural edits applied.
    pub fn get_formula(&mut self, sheet: &str, cell: &str) -> Result<Option<String>, WorkbookError> {
        let addr = self.cell(sheet, cell)?;
        Ok(self.engine.get_formula(addr).map(|ast| to_formula(&ast)))
    }

    pub fn read_range(&self, sheet: &str, range: &str) -> Result<Vec<Vec<LiteralValue>>, WorkbookError> {
        let range = self.range(sheet, range)?;
        Ok(self.engine.graph().range_values(&range))
    }

    pub fn recalculate(&mut self) -> Result<EvalResult, WorkbookError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("workbook_recalculate", auto = self.auto_recalculate).entered();
        let result = self.engine.recalculate()?;
        self.last_result = Some(result.clone());
        Ok(result)
    }

    // Structure. Rows and columns are numbered from 1, as displayed.
    pub fn insert_rows(&mut self, sheet: &str, before: u32, count: u32) -> Result<ShiftSummary, WorkbookError> {
        let summary = self.engine.insert_rows(sheet, to_index(before)?, count)?;
        self.after_edit()?;
        Ok(summary)
    }

    pub fn delete_rows(&mut self, sheet: &str, start: u32, count: u32) -> Result<ShiftSummary, WorkbookError> {
        let summary = self.engine.delete_rows(sheet, to_index(start)?, count)?;
        self.after_edit()?;
        Ok(summary)
    }

    pub fn insert_columns(&mut self, sheet: &str, before: u32, count: u32) -> Result<ShiftSummary, WorkbookError> {
        let summary = self.engine.insert_columns(sheet, to_index(before)?, count)?;
        self.after_edit()?;
        Ok(summary)
    }

    pub fn delete_columns(&mut self, sheet: &str, start: u32, count: u32) -> Result<ShiftSummary, WorkbookError> {
        let summary = self.engine.delete_columns(sheet, to_index(start)?, count)?;
        self.after_edit()?;
        Ok(summary)
    }

    /// Cut `source` (e.g. `"A1:B3"`) and paste it with its top-left at `dest`.
    pub fn move_range(&mut self, sheet: &str, source: &str, dest: &str) -> Result<ShiftSummary, WorkbookError> {
        let source = self.range(sheet, source)?;
        let dest = self.cell(sheet, dest)?;
        let summary = self.engine.move_range(source, dest.row, dest.col)?;
        self.after_edit()?;
        Ok(summary)
    }

    // History
    pub fn begin_action(&mut self, description: &str) {
        self.engine.begin_action(description);
    }

    pub fn end_action(&mut self) {
        self.engine.end_action();
    }

    /// Group the edits made by `f` into one undo step.
    pub fn action<T>(
        &mut self,
        description: &str,
        f: impl FnOnce(&mut Self) -> Result<T, WorkbookError>,
    ) -> Result<T, WorkbookError> {
        self.engine.begin_action(description);
        let out = f(self);
        self.engine.end_action();
        out
    }

    pub fn undo(&mut self) -> Result<bool, WorkbookError> {
        let undone = self.engine.undo()?;
        if undone {
            self.after_edit()?;
        }
        Ok(undone)
    }

    pub fn redo(&mut self) -> Result<bool, WorkbookError> {
        let redone = self.engine.redo()?;
        if redone {
            self.after_edit()?;
        }
        Ok(redone)
    }

    fn after_edit(&mut self) -> Result<(), WorkbookError> {
        if self.auto_recalculate {
            self.recalculate()?;
        }
        Ok(())
    }

    fn sheet(&self, name: &str) -> Result<SheetId, WorkbookError> {
        self.engine
            .sheet_id(name)
            .ok_or_else(|| WorkbookError::UnknownSheet(name.to_string()))
    }

    fn cell(&self, sheet: &str, cell: &str) -> Result<CellAddress, WorkbookError> {
        Ok(CellAddress::parse_a1(self.sheet(sheet)?, cell.trim())?)
    }

    /// `"B2:C9"` or a single cell.
    fn range(&self, sheet: &str, text: &str) -> Result<RangeAddress, WorkbookError> {
        let sheet_id = self.sheet(sheet)?;
        let (start, end) = match text.split_once(':') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (text.trim(), text.trim()),
        };
        let invalid = || WorkbookError::InvalidRange(text.to_string());
        let a = CellAddress::parse_a1(sheet_id, start).map_err(|_| invalid())?;
        let b = CellAddress::parse_a1(sheet_id, end).map_err(|_| invalid())?;
        Ok(RangeAddress::new(sheet_id, a.row, a.col, b.row, b.col))
    }
}

fn to_index(n: u32) -> Result<u32, WorkbookError> {
    n.checked_sub(1).ok_or(WorkbookError::ZeroIndex)
}

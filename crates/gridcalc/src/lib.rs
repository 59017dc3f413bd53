//! Workbook facade over the gridcalc engine.
//!
//! Cells are addressed in A1 notation on named sheets. Raw input is
//! classified the way a spreadsheet UI does it: `=` starts a formula,
//! numbers and `TRUE`/`FALSE` are typed, everything else is text.

mod error;
mod workbook;

pub use error::WorkbookError;
pub use workbook::{Workbook, WorkbookConfig, parse_input};

pub use gridcalc_common::{CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress};
pub use gridcalc_eval as eval;
pub use gridcalc_eval::{EditorError, EvalConfig, EvalResult, ShiftSummary};
pub use gridcalc_parse as parse;

//! Common test helpers
use gridcalc_common::{CellAddress, LiteralValue, SheetId};
use gridcalc_parse::{parse, to_formula};

use crate::engine::{Engine, EvalConfig, EvalResult, VertexId};
use crate::interpreter::FormulaInterpreter;

/// Engine with one sheet named `Sheet1`, addressed in A1 notation.
pub struct Sheet {
    pub engine: Engine<FormulaInterpreter>,
    pub sid: SheetId,
}

pub fn sheet() -> Sheet {
    sheet_with(EvalConfig::default())
}

pub fn sheet_with(config: EvalConfig) -> Sheet {
    let mut engine = Engine::new(FormulaInterpreter, config);
    let sid = engine.add_sheet("Sheet1").unwrap();
    Sheet { engine, sid }
}

pub fn n(v: f64) -> LiteralValue {
    LiteralValue::Number(v)
}

impl Sheet {
    pub fn addr(&self, a1: &str) -> CellAddress {
        CellAddress::parse_a1(self.sid, a1).unwrap()
    }

    /// `=...` is parsed as a formula, anything else stored as a number or text.
    pub fn set(&mut self, a1: &str, raw: &str) {
        let addr = self.addr(a1);
        self.set_at(addr, raw);
    }

    pub fn set_at(&mut self, addr: CellAddress, raw: &str) {
        if raw.starts_with('=') {
            let ast = parse(raw).unwrap();
            self.engine.set_cell_formula(addr, ast).unwrap();
        } else if let Ok(v) = raw.parse::<f64>() {
            self.engine.set_cell_value(addr, n(v)).unwrap();
        } else {
            self.engine.set_cell_value(addr, LiteralValue::Text(raw.into())).unwrap();
        }
    }

    pub fn value(&self, a1: &str) -> LiteralValue {
        self.engine.get_cell_value(self.addr(a1))
    }

    pub fn formula(&mut self, a1: &str) -> Option<String> {
        let addr = self.addr(a1);
        self.engine.get_formula(addr).map(|ast| to_formula(&ast))
    }

    pub fn vertex(&self, a1: &str) -> Option<VertexId> {
        self.engine.graph().vertex_for_cell(self.addr(a1))
    }

    pub fn recalc(&mut self) -> EvalResult {
        self.engine.recalculate().unwrap()
    }
}

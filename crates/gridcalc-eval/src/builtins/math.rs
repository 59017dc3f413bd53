use std::sync::Arc;

use gridcalc_common::{ExcelError, LiteralValue};

use super::utils::{number_arg, optional_number, round_half_away};
use crate::function::FnCaps;
use crate::function_registry;
use crate::traits::{ArgumentHandle, EvaluationContext, Function};

#[derive(Debug)]
pub struct AbsFn;

impl Function for AbsFn {
    fn name(&self) -> &'static str {
        "ABS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Number(number_arg(&args[0])?.abs()))
    }
}

#[derive(Debug)]
pub struct RoundFn;

impl Function for RoundFn {
    fn name(&self) -> &'static str {
        "ROUND"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], _ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        let n = number_arg(&args[0])?;
        let digits = optional_number(args, 1, 0.0)?.trunc() as i32;
        Ok(LiteralValue::Number(round_half_away(n, digits)))
    }
}

/// `SEQUENCE(rows, [cols], [start], [step])`
#[derive(Debug)]
pub struct SequenceFn;

impl Function for SequenceFn {
    fn name(&self) -> &'static str {
        "SEQUENCE"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::PURE | FnCaps::ARRAY_RESULT
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(4)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        let rows = number_arg(&args[0])?.trunc();
        let cols = optional_number(args, 1, 1.0)?.trunc();
        let start = optional_number(args, 2, 1.0)?;
        let step = optional_number(args, 3, 1.0)?;
        if rows < 1.0 || cols < 1.0 {
            return Err(ExcelError::new_value());
        }
        if rows * cols > ctx.max_array_cells() as f64 {
            return Err(ExcelError::new_num().with_message("SEQUENCE result too large"));
        }
        let (rows, cols) = (rows as usize, cols as usize);
        let grid = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| LiteralValue::Number(start + step * (r * cols + c) as f64))
                    .collect()
            })
            .collect();
        Ok(LiteralValue::Array(grid))
    }
}

pub fn register_builtins() {
    function_registry::insert(Arc::new(AbsFn));
    function_registry::insert(Arc::new(RoundFn));
    function_registry::insert(Arc::new(SequenceFn));
}

use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, Timelike};
use gridcalc_common::{ExcelError, LiteralValue};

use crate::function::FnCaps;
use crate::function_registry;
use crate::traits::{ArgumentHandle, EvaluationContext, Function};

/// `num_days_from_ce` of 1899-12-30, day zero of the 1900 date system.
const SERIAL_EPOCH_CE_DAYS: i32 = 693_594;

/// Days since 1899-12-30 with the time of day as the fractional part.
pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let days = f64::from(dt.date().num_days_from_ce() - SERIAL_EPOCH_CE_DAYS);
    days + dt.time().num_seconds_from_midnight() as f64 / 86_400.0
}

#[derive(Debug)]
pub struct NowFn;

impl Function for NowFn {
    fn name(&self) -> &'static str {
        "NOW"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::VOLATILE
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn eval(&self, _args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Number(datetime_to_serial(&ctx.now())))
    }
}

#[derive(Debug)]
pub struct TodayFn;

impl Function for TodayFn {
    fn name(&self) -> &'static str {
        "TODAY"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::VOLATILE
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn eval(&self, _args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Number(datetime_to_serial(&ctx.now()).floor()))
    }
}

pub fn register_builtins() {
    function_registry::insert(Arc::new(NowFn));
    function_registry::insert(Arc::new(TodayFn));
}

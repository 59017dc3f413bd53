use gridcalc_common::{ExcelError, LiteralValue};

use crate::interpreter::coerce_number;
use crate::traits::ArgumentHandle;

/// Scalar numeric argument; errors in the argument propagate.
pub fn number_arg(arg: &ArgumentHandle<'_>) -> Result<f64, ExcelError> {
    match arg.scalar() {
        LiteralValue::Error(e) => Err(e),
        other => coerce_number(&other),
    }
}

/// Optional numeric argument at `idx`, `default` when absent.
pub fn optional_number(args: &[ArgumentHandle<'_>], idx: usize, default: f64) -> Result<f64, ExcelError> {
    args.get(idx).map_or(Ok(default), number_arg)
}

/// Excel-style rounding: halves go away from zero.
pub fn round_half_away(n: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits.abs());
    let scaled = if digits >= 0 { n * factor } else { n / factor };
    let rounded = scaled.abs().round().copysign(scaled);
    if digits >= 0 { rounded / factor } else { rounded * factor }
}

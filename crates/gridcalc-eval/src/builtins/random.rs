use std::sync::Arc;

use gridcalc_common::{ExcelError, LiteralValue};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::utils::number_arg;
use crate::function::FnCaps;
use crate::function_registry;
use crate::traits::{ArgumentHandle, EvaluationContext, Function};

fn rng_for(ctx: &dyn EvaluationContext) -> SmallRng {
    SmallRng::seed_from_u64(ctx.random_seed())
}

/// `RAND()` in `[0, 1)`, deterministic for a given seed.
#[derive(Debug)]
pub struct RandFn;

impl Function for RandFn {
    fn name(&self) -> &'static str {
        "RAND"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::VOLATILE
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn eval(&self, _args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Number(rng_for(ctx).r#gen::<f64>()))
    }
}

#[derive(Debug)]
pub struct RandBetweenFn;

impl Function for RandBetweenFn {
    fn name(&self) -> &'static str {
        "RANDBETWEEN"
    }

    fn caps(&self) -> FnCaps {
        FnCaps::VOLATILE
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &dyn EvaluationContext) -> Result<LiteralValue, ExcelError> {
        let lo = number_arg(&args[0])?.ceil() as i64;
        let hi = number_arg(&args[1])?.floor() as i64;
        if hi < lo {
            return Err(ExcelError::new_num());
        }
        Ok(LiteralValue::Number(rng_for(ctx).gen_range(lo..=hi) as f64))
    }
}

pub fn register_builtins() {
    function_registry::insert(Arc::new(RandFn));
    function_registry::insert(Arc::new(RandBetweenFn));
}

#[cfg(test)]
mod tests {
    use crate::interpreter::tests::MapContext;
    use gridcalc_common::{ExcelErrorKind, LiteralValue};

    #[test]
    fn rand_is_stable_per_seed() {
        let ctx = MapContext { seed: 42, ..Default::default() };
        let a = ctx.eval("=RAND()");
        assert_eq!(a, ctx.eval("=RAND()"));
        match a {
            LiteralValue::Number(v) => assert!((0.0..1.0).contains(&v)),
            other => panic!("expected number, got {other:?}"),
        }
        let other = MapContext { seed: 43, ..Default::default() };
        assert_ne!(a, other.eval("=RAND()"));
    }

    #[test]
    fn randbetween_bounds() {
        let ctx = MapContext { seed: 7, ..Default::default() };
        match ctx.eval("=RANDBETWEEN(3, 5)") {
            LiteralValue::Number(v) => assert!((3.0..=5.0).contains(&v) && v.fract() == 0.0),
            other => panic!("expected number, got {other:?}"),
        }
        assert_eq!(ctx.eval("=RANDBETWEEN(5, 3)").error_kind(), Some(ExcelErrorKind::Num));
    }
}

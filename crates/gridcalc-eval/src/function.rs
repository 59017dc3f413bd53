bitflags::bitflags! {
    /// Capabilities a function advertises to the engine.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FnCaps: u16 {
        /// Same inputs, same output, no side effects.
        const PURE         = 0b0000_0001;
        /// Output may change between passes with identical inputs (`RAND`, `NOW`).
        /// Formulas calling one are re-evaluated on every recalculation.
        const VOLATILE     = 0b0000_0010;
        /// Folds ranges into one value; eligible for the range cache.
        const REDUCTION    = 0b0000_0100;
        /// May return a two-dimensional array that spills.
        const ARRAY_RESULT = 0b0000_1000;
        /// Arguments are evaluated lazily by the function itself (`IF`).
        const SHORT_CIRCUIT = 0b0001_0000;
    }
}

impl Default for FnCaps {
    fn default() -> Self {
        FnCaps::PURE
    }
}

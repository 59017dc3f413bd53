//! Optional tracing setup for binaries, benches and tests.
//!
//! Spans are emitted around `recalculate`, each pass and every structural
//! edit. Without the `tracing` feature the engine carries no
//! instrumentation and [`init_tracing`] does nothing.

/// Environment variable holding the filter directive, e.g. `gridcalc_eval=debug`.
pub const LOG_ENV: &str = "GRIDCALC_LOG";

/// Install a formatting subscriber filtered by [`LOG_ENV`] (default `info`).
/// Returns `false` if a global subscriber was already set.
#[cfg(feature = "tracing")]
pub fn init_tracing() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing() -> bool {
    false
}

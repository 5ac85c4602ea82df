//! Fixed-point simulation time.
//!
//! All simulated durations are Q32.32 fixed-point so that step
//! boundaries land on the same step on every platform.

use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fix64 = I32F32;

/// Convert an f64 to [`Fix64`]. Use only for configuration and tests.
#[inline]
pub fn fix_from_f64(v: f64) -> Fix64 {
    Fix64::from_num(v)
}

/// Convert [`Fix64`] to f64. Use only for display.
#[inline]
pub fn fix_to_f64(v: Fix64) -> f64 {
    v.to_num::<f64>()
}

/// Number of whole `dt` intervals contained in `time`.
///
/// Negative or zero-length intervals yield 0.
#[inline]
pub fn whole_steps(time: Fix64, dt: Fix64) -> u64 {
    if dt <= Fix64::ZERO || time <= Fix64::ZERO {
        return 0;
    }
    match time.checked_div(dt) {
        Some(q) => q.floor().saturating_to_num::<u64>(),
        None => u64::MAX,
    }
}

/// `dt * steps`, saturating at the representable range.
#[inline]
pub fn span_of(dt: Fix64, steps: u64) -> Fix64 {
    let count = Fix64::saturating_from_num(steps);
    dt.saturating_mul(count)
}

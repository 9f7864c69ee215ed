use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Logical clock rate. Every per-second quantity is divided by this once
/// to obtain its per-tick value.
pub const TICKS_PER_SECOND: u32 = 60;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Convert a duration in seconds to whole ticks, rounding up.
///
/// Values that land within float noise of a whole tick count are snapped to
/// it, so `3.2` seconds is exactly 192 ticks rather than 193.
pub fn secs_to_ticks(secs: f64) -> Ticks {
    if secs <= 0.0 {
        return 0;
    }
    let raw = secs * TICKS_PER_SECOND as f64;
    let nearest = raw.round();
    if (raw - nearest).abs() < 1e-6 {
        nearest as Ticks
    } else {
        raw.ceil() as Ticks
    }
}

/// Convert a per-second rate into its per-tick share.
#[inline]
pub fn per_tick(rate_per_second: Fixed64) -> Fixed64 {
    rate_per_second / Fixed64::from_num(TICKS_PER_SECOND)
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

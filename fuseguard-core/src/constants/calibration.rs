//! Fixed-Point Scale and Exponential Averaging
//!
//! Zero references and the averaged power are carried at 1000x so that an
//! exponential average with a small discount still moves on integer math.

/// Scale of every fixed-point value in the pipeline.
pub const FIXED_POINT_SCALE: i64 = 1000;

/// Denominator of the per-mille discount factors.
pub const DISCOUNT_DENOMINATOR: i64 = 1000;

/// Weight of a new voltage-zero estimate (per mille).
///
/// Slow: the zero drifts with temperature, not from cycle to cycle.
pub const VOLTAGE_ZERO_DISCOUNT: u16 = 10;

/// Weight of a new current-zero estimate (per mille).
pub const CURRENT_ZERO_DISCOUNT: u16 = 10;

/// Weight of a new power value in the averaged power (per mille).
pub const POWER_DISCOUNT: u16 = 200;

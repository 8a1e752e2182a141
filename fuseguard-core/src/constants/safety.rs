//! Soft-Fuse Thresholds and Detection Windows
//!
//! Thresholds are RMS currents in milliampere, compared against the
//! smoothed readings the pipeline produces once per buffer (20 ms).

/// Hard overcurrent threshold (mA).
///
/// Above this the relay must open regardless of the dimmer state.
pub const CURRENT_THRESHOLD_MA: i32 = 16_000;

/// Overcurrent threshold while the dimmer is conducting (mA).
///
/// The dimmer transistor is rated far below the relay contacts.
pub const CURRENT_THRESHOLD_PWM_MA: i32 = 1_000;

/// Consecutive over-threshold buffers tolerated before a PWM overcurrent.
///
/// The event fires when the counter *exceeds* this value, so on buffer 21.
pub const PWM_OVERCURRENT_BUFFER_LIMIT: u32 = 20;

/// Grace window after the switch turned off (milliseconds).
///
/// Current may keep flowing for a few cycles after the outputs are released.
pub const SWITCH_OFF_GRACE_MS: u32 = 1000;

/// Time after boot before dimmer-on failures are reported (milliseconds).
pub const FAILURE_DETECTION_WARMUP_MS: u32 = 2000;

/// Time after which captured samples count as sent (milliseconds).
pub const SAMPLES_SEND_TIMEOUT_MS: u32 = 3000;

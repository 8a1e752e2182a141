//! Constants for FuseGuard Core
//!
//! Every numeric value the sampling pipeline depends on lives here, grouped
//! by the stage that uses it. Values that a board or a deployment may want to
//! change are only *defaults*: they seed [`crate::config`] and are never read
//! directly by the hot path.
//!
//! ## Organization
//!
//! - **ADC**: buffer geometry, sample timing, valid input ranges
//! - **Filter**: median window sizes for the noise filter and the smoothers
//! - **Calibration**: fixed-point scale and exponential discount factors
//! - **Safety**: soft-fuse thresholds and detection windows
//! - **Time**: tick and unit conversions
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Include the unit in the name (`_US`, `_MS`, `_MV`, `_MA`)
//! 3. Document where a value comes from when it is not obvious

/// ADC timing, buffer layout and input range limits.
pub mod adc;

/// Median window sizes for filtering and smoothing.
pub mod filter;

/// Fixed-point scale and exponential averaging discounts.
pub mod calibration;

/// Soft-fuse thresholds and detection windows.
pub mod safety;

/// Time unit and RTC tick conversions.
pub mod time;

pub use adc::{
    SAMPLE_INTERVAL_US, MAINS_PERIOD_US, CHANNEL_COUNT,
    VOLTAGE_CHANNEL_IDX, CURRENT_CHANNEL_IDX, SAMPLES_PER_CHANNEL,
    MIN_RANGE_MV, MAX_RANGE_MV, RANGE_STEP_MV, POWER_SAMPLES_CAPACITY,
};

pub use filter::{NOISE_FILTER_HALF_WINDOW, RMS_WINDOW_SIZE, LOG_DUMP_INTERVAL};

pub use calibration::{
    FIXED_POINT_SCALE, VOLTAGE_ZERO_DISCOUNT, CURRENT_ZERO_DISCOUNT, POWER_DISCOUNT,
};

pub use safety::{
    CURRENT_THRESHOLD_MA, CURRENT_THRESHOLD_PWM_MA, PWM_OVERCURRENT_BUFFER_LIMIT,
    SWITCH_OFF_GRACE_MS, FAILURE_DETECTION_WARMUP_MS, SAMPLES_SEND_TIMEOUT_MS,
};

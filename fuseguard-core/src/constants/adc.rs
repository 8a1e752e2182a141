//! ADC Timing and Buffer Layout
//!
//! The ADC samples two channels (voltage, current) back to back, interleaved
//! in a single buffer. At a 200 µs interval and 50 Hz mains one cycle is
//! exactly 100 samples per channel, which is also what one buffer holds.

// ===== TIMING =====

/// Interval between two samples of the same channel (microseconds).
///
/// 5 kHz per channel: enough to resolve the harmonics a dimmer produces
/// while leaving CPU time for the pipeline between buffers.
pub const SAMPLE_INTERVAL_US: u32 = 200;

/// Mains cycle period (microseconds).
///
/// 50 Hz grid. A 60 Hz grid would use 16667.
pub const MAINS_PERIOD_US: u32 = 20_000;

// ===== LAYOUT =====

/// Number of interleaved channels in a buffer.
pub const CHANNEL_COUNT: usize = 2;

/// Position of the voltage sample within each interleaved frame.
pub const VOLTAGE_CHANNEL_IDX: usize = 0;

/// Position of the current sample within each interleaved frame.
pub const CURRENT_CHANNEL_IDX: usize = 1;

/// Samples per channel in one buffer delivery.
pub const SAMPLES_PER_CHANNEL: usize = 100;

/// Total number of samples in one buffer delivery.
pub const BUFFER_SIZE: usize = SAMPLES_PER_CHANNEL * CHANNEL_COUNT;

// ===== INPUT RANGE =====

/// Smallest input range the ADC gain stage supports (millivolt).
pub const MIN_RANGE_MV: i32 = 150;

/// Largest input range the ADC gain stage supports (millivolt).
pub const MAX_RANGE_MV: i32 = 3600;

/// Step applied by a single increment/decrement range request (millivolt).
pub const RANGE_STEP_MV: i32 = 600;

/// Default range for both channels on the reference boards (millivolt).
pub const DEFAULT_RANGE_MV: i32 = 1200;

/// Number of signals the voltage channel can be switched between at runtime.
pub const VOLTAGE_CHANNEL_INPUT_COUNT: u8 = 5;

/// Frames held by the raw sample capture for external reporting.
pub const POWER_SAMPLES_CAPACITY: usize = SAMPLES_PER_CHANNEL;

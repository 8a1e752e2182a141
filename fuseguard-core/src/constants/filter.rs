//! Median Window Sizes
//!
//! Two different medians run in the pipeline:
//! - the noise filter, a sliding median over the raw current samples
//! - the multi-cycle smoothers, a median over the last few RMS values

/// Half window of the current-channel noise filter (samples).
///
/// Window is `2 * 16 + 1 = 33` samples, about a third of a cycle. With 100
/// samples per channel the padded input (132) splits into exactly 4 blocks.
pub const NOISE_FILTER_HALF_WINDOW: usize = 16;

/// Number of buffers the multi-cycle smoothers remember.
///
/// Must be one of the sizes with a dedicated sorting network (7, 9, 25);
/// other sizes fall back to a full sort.
pub const RMS_WINDOW_SIZE: usize = 7;

/// Interval between calculated-value log dumps (processed buffers).
pub const LOG_DUMP_INTERVAL: u32 = 500;

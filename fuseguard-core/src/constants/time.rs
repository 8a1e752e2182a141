//! Time Unit and Tick Conversions

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Microseconds per millisecond.
pub const US_PER_MS: u64 = 1000;

/// Microseconds per second.
pub const US_PER_SECOND: u64 = 1_000_000;

/// Frequency of the low-power RTC the firmware counts ticks with (Hz).
pub const RTC_FREQUENCY_HZ: u32 = 32_768;

/// The RTC counter is 24 bits wide and wraps roughly every 512 seconds.
pub const RTC_COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Factor applied to ticks before the millisecond conversion.
///
/// Keeps the sub-millisecond part of each interval in the energy counter.
pub const ENERGY_TICK_SCALE: u64 = 1024;

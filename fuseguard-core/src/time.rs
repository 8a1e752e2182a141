//! Tick-based time for the sampling pipeline
//!
//! The pipeline never waits on time. It only compares tick counts:
//! - elapsed time between two energy updates
//! - the grace window after the switch turned off
//! - the warm-up period after boot
//!
//! Ticks come from a free-running hardware counter that may be narrower than
//! 32 bits (the nRF RTC is 24 bits), so every difference is taken modulo the
//! counter's range.

use crate::constants::time::{MS_PER_SECOND, RTC_COUNTER_MASK, RTC_FREQUENCY_HZ};

/// Raw counter value of a [`TickSource`]
pub type Ticks = u32;

/// Free-running monotonic tick counter
///
/// Implementations wrap around at [`TickSource::counter_mask`]; callers must
/// use [`tick_difference`] instead of subtracting ticks directly.
pub trait TickSource {
    /// Current counter value
    fn now(&self) -> Ticks;

    /// Counter frequency in Hz
    fn frequency_hz(&self) -> u32;

    /// Largest counter value before it wraps to zero
    fn counter_mask(&self) -> u32 {
        u32::MAX
    }

    /// Ticks elapsed since `earlier`
    fn since(&self, earlier: Ticks) -> Ticks {
        tick_difference(self.now(), earlier, self.counter_mask())
    }

    /// Convert a tick count of this source to milliseconds
    fn to_ms(&self, ticks: Ticks) -> u64 {
        ticks_to_ms(ticks as u64, self.frequency_hz())
    }

    /// Convert milliseconds to a tick count of this source
    fn from_ms(&self, ms: u32) -> Ticks {
        ms_to_ticks(ms, self.frequency_hz())
    }
}

/// Difference `later - earlier` on a counter that wraps at `mask`
pub fn tick_difference(later: Ticks, earlier: Ticks, mask: u32) -> Ticks {
    later.wrapping_sub(earlier) & mask
}

/// Convert ticks to whole milliseconds
///
/// Takes a `u64` so callers can pre-scale the tick count to keep precision.
pub fn ticks_to_ms(ticks: u64, frequency_hz: u32) -> u64 {
    if frequency_hz == 0 {
        return 0;
    }
    ticks * MS_PER_SECOND / frequency_hz as u64
}

/// Convert milliseconds to ticks, saturating at `u32::MAX`
pub fn ms_to_ticks(ms: u32, frequency_hz: u32) -> Ticks {
    let ticks = ms as u64 * frequency_hz as u64 / MS_PER_SECOND;
    ticks.min(u32::MAX as u64) as Ticks
}

/// Tick source with a manually controlled counter
///
/// Used by tests and simulations to step through time deterministically.
/// Wraps at the RTC width by default so wraparound paths get exercised.
#[derive(Debug, Clone)]
pub struct FixedTicks {
    ticks: Ticks,
    frequency_hz: u32,
    mask: u32,
}

impl FixedTicks {
    /// RTC-like source (32768 Hz, 24-bit counter) starting at `ticks`
    pub fn new(ticks: Ticks) -> Self {
        Self {
            ticks: ticks & RTC_COUNTER_MASK,
            frequency_hz: RTC_FREQUENCY_HZ,
            mask: RTC_COUNTER_MASK,
        }
    }

    /// Source with a custom frequency and counter width
    pub fn with_counter(ticks: Ticks, frequency_hz: u32, mask: u32) -> Self {
        Self { ticks: ticks & mask, frequency_hz, mask }
    }

    /// Set the counter
    pub fn set(&mut self, ticks: Ticks) {
        self.ticks = ticks & self.mask;
    }

    /// Advance the counter by a number of ticks, wrapping at the mask
    pub fn advance(&mut self, ticks: Ticks) {
        self.ticks = self.ticks.wrapping_add(ticks) & self.mask;
    }

    /// Advance the counter by a number of milliseconds
    pub fn advance_ms(&mut self, ms: u32) {
        let ticks = self.from_ms(ms);
        self.advance(ticks);
    }
}

impl TickSource for FixedTicks {
    fn now(&self) -> Ticks {
        self.ticks
    }

    fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    fn counter_mask(&self) -> u32 {
        self.mask
    }
}

/// Host tick source backed by `std::time::Instant` (microsecond ticks)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct StdTicks {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdTicks {
    /// Start counting from now
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for StdTicks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TickSource for StdTicks {
    fn now(&self) -> Ticks {
        // Truncation is the wraparound of a 32-bit microsecond counter
        self.start.elapsed().as_micros() as Ticks
    }

    fn frequency_hz(&self) -> u32 {
        1_000_000
    }
}

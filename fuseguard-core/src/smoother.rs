//! Multi-Cycle Smoothing
//!
//! A single 20 ms cycle is noisy: a dimmer switching mid-cycle or a spike the
//! noise filter let through moves the RMS value by a lot. Each reported metric
//! therefore goes through a smoother that remembers the last `N` per-cycle
//! values:
//!
//! - window full: output is the median of the window
//! - still filling: output is the mean of what has been pushed so far
//!
//! The mean covers the first `N - 1` buffers after start-up, when a median of
//! a half-empty window would mostly be the default fill value.
//!
//! Real power is smoothed with an exponential moving average instead
//! ([`PowerAverage`]); the energy counter integrates that average.

use crate::buffer::HistoryBuffer;
use crate::calibration::exp_average;
use crate::median::window_median;

/// Median-if-full-else-mean smoother over the last `N` values
#[derive(Debug, Clone)]
pub struct MultiCycleSmoother<const N: usize> {
    history: HistoryBuffer<i32, N>,
    output: i32,
}

impl<const N: usize> MultiCycleSmoother<N> {
    /// Empty smoother, output 0
    pub fn new() -> Self {
        Self { history: HistoryBuffer::new(), output: 0 }
    }

    /// Add a per-cycle value and return the smoothed value
    pub fn push(&mut self, value: i32) -> i32 {
        self.history.push(value);

        self.output = if self.history.is_full() {
            let mut window = self.history.snapshot();
            window_median(&mut window)
        } else {
            let sum: i64 = self.history.iter().map(i64::from).sum();
            (sum / self.history.len() as i64) as i32
        };

        self.output
    }

    /// Most recent smoothed value
    pub fn output(&self) -> i32 {
        self.output
    }

    /// Whether the output is a median
    pub fn is_warmed_up(&self) -> bool {
        self.history.is_full()
    }

    /// Values currently in the window
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether nothing has been pushed yet
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl<const N: usize> Default for MultiCycleSmoother<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential moving average of the real power
#[derive(Debug, Clone)]
pub struct PowerAverage {
    average_mw: i64,
    discount: u16,
}

impl PowerAverage {
    /// Average starting at 0 mW; `discount` is the weight of a new value (per mille)
    pub fn new(discount: u16) -> Self {
        Self { average_mw: 0, discount }
    }

    /// Blend in a new power value and return the average (mW)
    pub fn update(&mut self, power_mw: i32) -> i32 {
        self.average_mw = exp_average(self.average_mw, power_mw as i64, self.discount);
        self.average_mw as i32
    }

    /// Current average (mW)
    pub fn average_mw(&self) -> i32 {
        self.average_mw as i32
    }
}

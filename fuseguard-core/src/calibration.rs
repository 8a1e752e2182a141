//! Zero-Reference Calibration
//!
//! ## Overview
//!
//! The ADC code that corresponds to 0 V or 0 A drifts with temperature and
//! differs per device. Both zero references are tracked continuously with an
//! exponential moving average over the mean of one mains cycle:
//!
//! ```text
//! mean  = 1000 * sum(samples of the first cycle) / samples_per_cycle
//! zero' = ((1000 - discount) * zero + discount * mean) / 1000
//! ```
//!
//! Everything is carried at 1000x so that a discount of a few per mille still
//! moves the estimate on integer math.
//!
//! The voltage zero is taken from the raw voltage samples. The current zero is
//! taken from the noise-filtered current samples so that switching spikes do
//! not leak into the baseline.

use crate::adc::SampleBuffer;
use crate::constants::calibration::{DISCOUNT_DENOMINATOR, FIXED_POINT_SCALE};
use crate::errors::{SamplingError, SamplingResult};

/// Exponential moving average with a per-mille discount
///
/// `discount` is the weight of the new sample; values above 1000 are clamped.
pub fn exp_average(previous: i64, sample: i64, discount: u16) -> i64 {
    let discount = (discount as i64).min(DISCOUNT_DENOMINATOR);
    ((DISCOUNT_DENOMINATOR - discount) * previous + discount * sample) / DISCOUNT_DENOMINATOR
}

/// Zero references at 1000x fixed-point scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZeroReferences {
    /// Voltage zero (ADC code * 1000)
    pub voltage: i64,
    /// Current zero (ADC code * 1000)
    pub current: i64,
}

impl ZeroReferences {
    /// References from plain ADC codes
    pub const fn from_codes(voltage: i32, current: i32) -> Self {
        Self {
            voltage: voltage as i64 * FIXED_POINT_SCALE,
            current: current as i64 * FIXED_POINT_SCALE,
        }
    }

    /// Voltage zero rounded down to an ADC code
    pub const fn voltage_code(&self) -> i32 {
        (self.voltage / FIXED_POINT_SCALE) as i32
    }

    /// Current zero rounded down to an ADC code
    pub const fn current_code(&self) -> i32 {
        (self.current / FIXED_POINT_SCALE) as i32
    }
}

/// Running zero-reference estimates for both channels
#[derive(Debug, Clone)]
pub struct CalibrationTracker {
    zeros: ZeroReferences,
    voltage_discount: u16,
    current_discount: u16,
    track_voltage: bool,
    track_current: bool,
}

impl CalibrationTracker {
    /// Start from the configured zeros with fixed discounts (per mille)
    pub fn new(initial: ZeroReferences, voltage_discount: u16, current_discount: u16) -> Self {
        Self {
            zeros: initial,
            voltage_discount,
            current_discount,
            track_voltage: true,
            track_current: true,
        }
    }

    /// Current estimates
    pub fn zeros(&self) -> ZeroReferences {
        self.zeros
    }

    /// Enable or disable voltage-zero tracking
    pub fn set_voltage_tracking(&mut self, enabled: bool) {
        self.track_voltage = enabled;
    }

    /// Enable or disable current-zero tracking
    pub fn set_current_tracking(&mut self, enabled: bool) {
        self.track_current = enabled;
    }

    /// Whether the voltage zero follows the measurements
    pub fn is_tracking_voltage(&self) -> bool {
        self.track_voltage
    }

    /// Whether the current zero follows the measurements
    pub fn is_tracking_current(&self) -> bool {
        self.track_current
    }

    /// Run every enabled tracker on one buffer
    pub fn update<B: AsRef<[i16]>>(
        &mut self,
        buffer: &SampleBuffer<B>,
        filtered_current: &[i32],
    ) -> SamplingResult<ZeroReferences> {
        if self.track_voltage {
            self.update_voltage_zero(buffer)?;
        }
        if self.track_current {
            let samples_per_cycle = buffer.samples_per_cycle_checked()?;
            self.update_current_zero(filtered_current, samples_per_cycle)?;
        }
        Ok(self.zeros)
    }

    /// Blend the mean of the first cycle of raw voltage samples into the zero
    pub fn update_voltage_zero<B: AsRef<[i16]>>(
        &mut self,
        buffer: &SampleBuffer<B>,
    ) -> SamplingResult<i64> {
        let samples_per_cycle = buffer.samples_per_cycle_checked()?;
        let sum: i64 = buffer.voltage().take(samples_per_cycle).map(i64::from).sum();
        let mean = sum * FIXED_POINT_SCALE / samples_per_cycle as i64;

        self.zeros.voltage = exp_average(self.zeros.voltage, mean, self.voltage_discount);
        Ok(self.zeros.voltage)
    }

    /// Blend the mean of the first cycle of filtered current samples into the zero
    pub fn update_current_zero(
        &mut self,
        filtered: &[i32],
        samples_per_cycle: usize,
    ) -> SamplingResult<i64> {
        if samples_per_cycle == 0 || filtered.len() < samples_per_cycle {
            return Err(SamplingError::InsufficientSamples {
                required: samples_per_cycle,
                available: filtered.len(),
            });
        }

        let sum: i64 = filtered[..samples_per_cycle].iter().map(|&s| s as i64).sum();
        let mean = sum * FIXED_POINT_SCALE / samples_per_cycle as i64;

        self.zeros.current = exp_average(self.zeros.current, mean, self.current_discount);
        Ok(self.zeros.current)
    }
}

//! Per-Cycle RMS and Real Power
//!
//! ## Overview
//!
//! For exactly one mains cycle of a buffer the calculator produces:
//!
//! - RMS current (raw samples)
//! - RMS voltage (raw samples)
//! - real power, the mean of `(i - i0) * (v - v0)`
//! - RMS current over the noise-filtered current samples
//!
//! ## Numeric Model
//!
//! Samples and zeros are lifted to 1000x before subtracting, so the fractional
//! part of the tracked zero is not lost. Each product is scaled back down by
//! 1000 * 1000 before it is accumulated:
//!
//! ```text
//! i_k = code_k * 1000 - zero          |i_k| < 2^15 * 1000 ≈ 3.3e7
//! sq  = i_k * i_k / 10^6               < 1.1e9 per sample
//! sum over 100 samples                 < 1.1e11, far from 2^63
//! ```
//!
//! Summation stays in `i64`. Only the final scaling by the calibration
//! multipliers and the square root run in floating point.

use crate::adc::SampleBuffer;
use crate::calibration::ZeroReferences;
use crate::constants::calibration::FIXED_POINT_SCALE;
use crate::errors::{SamplingError, SamplingResult};

const PRODUCT_SCALE: i64 = FIXED_POINT_SCALE * FIXED_POINT_SCALE;

/// Readings of one mains cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleMetrics {
    /// RMS of the raw current samples (mA)
    pub current_rms_ma: i32,
    /// RMS of the raw voltage samples (mV)
    pub voltage_rms_mv: i32,
    /// Real power, offset by the power zero (mW)
    pub power_mw: i32,
    /// RMS of the filtered current samples (mA)
    pub filtered_current_rms_ma: i32,
}

/// Converts one cycle of ADC codes into calibrated readings
#[derive(Debug, Clone, Copy)]
pub struct CycleMetricsCalculator {
    voltage_multiplier: f32,
    current_multiplier: f32,
    power_zero: i32,
}

impl CycleMetricsCalculator {
    /// Calculator with volts and amps per ADC code and a power offset (mW)
    pub fn new(voltage_multiplier: f32, current_multiplier: f32, power_zero: i32) -> Self {
        Self { voltage_multiplier, current_multiplier, power_zero }
    }

    /// Volts per ADC code
    pub fn voltage_multiplier(&self) -> f32 {
        self.voltage_multiplier
    }

    /// Amps per ADC code
    pub fn current_multiplier(&self) -> f32 {
        self.current_multiplier
    }

    /// Offset subtracted from every power reading (mW)
    pub fn power_zero(&self) -> i32 {
        self.power_zero
    }

    /// Compute the readings for the first cycle of `buffer`
    ///
    /// `filtered_current` is the noise filter output for the same buffer.
    pub fn compute<B: AsRef<[i16]>>(
        &self,
        buffer: &SampleBuffer<B>,
        filtered_current: &[i32],
        zeros: ZeroReferences,
    ) -> SamplingResult<CycleMetrics> {
        let n = buffer.samples_per_cycle_checked()?;
        if filtered_current.len() < n {
            return Err(SamplingError::InsufficientSamples {
                required: n,
                available: filtered_current.len(),
            });
        }

        let mut current_square_sum: i64 = 0;
        let mut voltage_square_sum: i64 = 0;
        let mut power_sum: i64 = 0;

        for (voltage, current) in buffer.frames().take(n) {
            let current = current as i64 * FIXED_POINT_SCALE - zeros.current;
            let voltage = voltage as i64 * FIXED_POINT_SCALE - zeros.voltage;
            current_square_sum += current * current / PRODUCT_SCALE;
            voltage_square_sum += voltage * voltage / PRODUCT_SCALE;
            power_sum += current * voltage / PRODUCT_SCALE;
        }

        let cm = self.current_multiplier as f64;
        let vm = self.voltage_multiplier as f64;
        let samples = n as f64;

        let power_mw = (power_sum as f64 * cm * vm * 1000.0 / samples) as i64 - self.power_zero as i64;

        Ok(CycleMetrics {
            current_rms_ma: rms(current_square_sum, cm, samples),
            voltage_rms_mv: rms(voltage_square_sum, vm, samples),
            power_mw: saturate(power_mw),
            filtered_current_rms_ma: self.filtered_rms(&filtered_current[..n], zeros.current),
        })
    }

    fn filtered_rms(&self, filtered: &[i32], current_zero: i64) -> i32 {
        let square_sum: i64 = filtered
            .iter()
            .map(|&code| {
                let current = code as i64 * FIXED_POINT_SCALE - current_zero;
                current * current / PRODUCT_SCALE
            })
            .sum();

        rms(square_sum, self.current_multiplier as f64, filtered.len() as f64)
    }
}

/// `sqrt(sum * multiplier² / n) * 1000`, in milli-units
fn rms(square_sum: i64, multiplier: f64, samples: f64) -> i32 {
    let mean_square = square_sum as f64 * multiplier * multiplier / samples;
    (libm::sqrt(mean_square) * 1000.0) as i32
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

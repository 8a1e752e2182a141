//! Board, Soft-Fuse and Sampling Configuration
//!
//! All configuration is read once when the sampler is created and never
//! changes afterwards. Three groups:
//!
//! - [`BoardConfig`]: what the hardware looks like (pins, calibration)
//! - [`SoftFuseConfig`]: protective thresholds
//! - [`SamplingConfig`]: buffer timing, filter and averaging parameters
//!
//! With the `serde` feature every group can be loaded from a persisted
//! settings blob.

use crate::constants::adc::{
    CHANNEL_COUNT, CURRENT_CHANNEL_IDX, DEFAULT_RANGE_MV, MAINS_PERIOD_US, MAX_RANGE_MV,
    MIN_RANGE_MV, SAMPLE_INTERVAL_US, SAMPLES_PER_CHANNEL, VOLTAGE_CHANNEL_IDX,
};
use crate::constants::calibration::{
    CURRENT_ZERO_DISCOUNT, DISCOUNT_DENOMINATOR, POWER_DISCOUNT, VOLTAGE_ZERO_DISCOUNT,
};
use crate::constants::filter::NOISE_FILTER_HALF_WINDOW;
use crate::constants::safety::{CURRENT_THRESHOLD_MA, CURRENT_THRESHOLD_PWM_MA};
use crate::errors::{SamplingError, SamplingResult};

/// Known board revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardModel {
    /// Plug, first production series
    Acr01b1d,
    /// Plug with zero-reference pin
    Acr01b6c,
    /// Plug with zero-reference pin and three current gain stages
    Acr01b6d,
    /// Built-in, no zero reference
    Acr01b2c,
    /// Built-in with zero-reference pin
    Acr01b2g,
    /// Development kit, sampling checks effectively disabled
    Pca10040,
}

/// Pins and calibration of one board
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardConfig {
    /// Voltage divider input
    pub pin_voltage: u8,
    /// Current sense input (highest gain)
    pub pin_current: u8,
    /// Current sense input, medium gain
    pub pin_current_gain_med: Option<u8>,
    /// Current sense input, low gain
    pub pin_current_gain_low: Option<u8>,
    /// Zero-reference input, if wired
    pub pin_zero_ref: Option<u8>,
    /// Volts per ADC code
    pub voltage_multiplier: f32,
    /// Amps per ADC code
    pub current_multiplier: f32,
    /// ADC code of 0 V
    pub voltage_zero: i32,
    /// ADC code of 0 A
    pub current_zero: i32,
    /// Offset subtracted from the real power (mW)
    pub power_zero: i32,
    /// Voltage channel input range (mV)
    pub voltage_range_mv: i32,
    /// Current channel input range (mV)
    pub current_range_mv: i32,
}

impl BoardConfig {
    /// Configuration of a known board
    pub fn for_model(model: BoardModel) -> Self {
        match model {
            BoardModel::Acr01b1d => Self::acr01b1d(),
            BoardModel::Acr01b6c => Self::acr01b6c(),
            BoardModel::Acr01b6d => Self::acr01b6d(),
            BoardModel::Acr01b2c => Self::acr01b2c(),
            BoardModel::Acr01b2g => Self::acr01b2g(),
            BoardModel::Pca10040 => Self::pca10040(),
        }
    }

    /// ACR01B1D plug
    pub fn acr01b1d() -> Self {
        Self {
            pin_voltage: 1,
            pin_current: 2,
            pin_current_gain_med: None,
            pin_current_gain_low: None,
            pin_zero_ref: None,
            voltage_multiplier: 0.2,
            current_multiplier: 0.0044,
            voltage_zero: 1993,
            current_zero: 1980,
            power_zero: 3504,
            voltage_range_mv: DEFAULT_RANGE_MV,
            current_range_mv: DEFAULT_RANGE_MV,
        }
    }

    /// ACR01B6C plug
    pub fn acr01b6c() -> Self {
        Self {
            pin_voltage: 1,
            pin_current: 2,
            pin_current_gain_med: None,
            pin_current_gain_low: None,
            pin_zero_ref: Some(0),
            voltage_multiplier: 0.171,
            current_multiplier: 0.0042,
            voltage_zero: -99,
            current_zero: -270,
            power_zero: 8000,
            voltage_range_mv: 1200,
            current_range_mv: 600,
        }
    }

    /// ACR01B6D plug
    pub fn acr01b6d() -> Self {
        Self {
            pin_voltage: 2,
            pin_current: 4,
            pin_current_gain_med: Some(5),
            pin_current_gain_low: Some(6),
            ..Self::acr01b6c()
        }
    }

    /// ACR01B2C built-in
    pub fn acr01b2c() -> Self {
        Self {
            current_multiplier: 0.0045,
            voltage_zero: 2003,
            current_zero: 1997,
            power_zero: 1500,
            ..Self::acr01b1d()
        }
    }

    /// ACR01B2G built-in
    pub fn acr01b2g() -> Self {
        Self::acr01b6c()
    }

    /// PCA10040 development kit
    pub fn pca10040() -> Self {
        Self {
            pin_voltage: 2,
            pin_current: 1,
            pin_current_gain_med: None,
            pin_current_gain_low: None,
            pin_zero_ref: None,
            voltage_multiplier: 0.0,
            current_multiplier: 0.0,
            voltage_zero: 1000,
            current_zero: 1000,
            power_zero: 0,
            voltage_range_mv: MAX_RANGE_MV,
            current_range_mv: MAX_RANGE_MV,
        }
    }

    /// Whether a zero-reference pin is wired
    pub fn has_adc_zero_ref(&self) -> bool {
        self.pin_zero_ref.is_some()
    }

    /// Reject ranges the ADC cannot be set to
    pub fn validate(&self) -> SamplingResult<()> {
        let ranges = MIN_RANGE_MV..=MAX_RANGE_MV;
        if !ranges.contains(&self.voltage_range_mv) || !ranges.contains(&self.current_range_mv) {
            return Err(SamplingError::InvalidConfig { reason: "input range outside ADC limits" });
        }
        if !self.voltage_multiplier.is_finite() || !self.current_multiplier.is_finite() {
            return Err(SamplingError::InvalidConfig { reason: "multiplier not finite" });
        }
        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::acr01b1d()
    }
}

/// Soft-fuse thresholds (RMS, mA)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftFuseConfig {
    /// Hard overcurrent threshold
    pub current_threshold_ma: i32,
    /// Overcurrent threshold while dimming
    pub current_threshold_pwm_ma: i32,
}

impl Default for SoftFuseConfig {
    fn default() -> Self {
        Self {
            current_threshold_ma: CURRENT_THRESHOLD_MA,
            current_threshold_pwm_ma: CURRENT_THRESHOLD_PWM_MA,
        }
    }
}

/// Buffer geometry, filter and averaging parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplingConfig {
    /// Interval between samples of one channel (µs)
    pub sample_interval_us: u32,
    /// Mains cycle period (µs)
    pub cycle_period_us: u32,
    /// Interleaved channels per buffer
    pub channel_count: usize,
    /// Voltage sample position in a frame
    pub voltage_index: usize,
    /// Current sample position in a frame
    pub current_index: usize,
    /// Samples per channel per buffer
    pub samples_per_channel: usize,
    /// Noise filter half window
    pub filter_half_window: usize,
    /// Voltage-zero discount (per mille)
    pub voltage_zero_discount: u16,
    /// Current-zero discount (per mille)
    pub current_zero_discount: u16,
    /// Power average discount (per mille)
    pub power_discount: u16,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_interval_us: SAMPLE_INTERVAL_US,
            cycle_period_us: MAINS_PERIOD_US,
            channel_count: CHANNEL_COUNT,
            voltage_index: VOLTAGE_CHANNEL_IDX,
            current_index: CURRENT_CHANNEL_IDX,
            samples_per_channel: SAMPLES_PER_CHANNEL,
            filter_half_window: NOISE_FILTER_HALF_WINDOW,
            voltage_zero_discount: VOLTAGE_ZERO_DISCOUNT,
            current_zero_discount: CURRENT_ZERO_DISCOUNT,
            power_discount: POWER_DISCOUNT,
        }
    }
}

impl SamplingConfig {
    /// Samples per channel in one mains cycle
    pub fn samples_per_cycle(&self) -> usize {
        if self.sample_interval_us == 0 {
            return 0;
        }
        (self.cycle_period_us / self.sample_interval_us) as usize
    }

    /// Check that a buffer can hold a full cycle and the discounts are per mille
    pub fn validate(&self) -> SamplingResult<()> {
        if self.channel_count == 0
            || self.voltage_index >= self.channel_count
            || self.current_index >= self.channel_count
        {
            return Err(SamplingError::InvalidLayout { reason: "channel index outside frame" });
        }

        let per_cycle = self.samples_per_cycle();
        if per_cycle == 0 {
            return Err(SamplingError::InvalidConfig { reason: "cycle shorter than sample interval" });
        }
        if per_cycle > self.samples_per_channel {
            return Err(SamplingError::InsufficientSamples {
                required: per_cycle,
                available: self.samples_per_channel,
            });
        }

        let limit = DISCOUNT_DENOMINATOR as u16;
        if self.voltage_zero_discount > limit
            || self.current_zero_discount > limit
            || self.power_discount > limit
        {
            return Err(SamplingError::InvalidConfig { reason: "discount above 1000 per mille" });
        }

        Ok(())
    }
}

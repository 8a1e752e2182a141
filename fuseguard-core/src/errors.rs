//! Error Types for the Power Sampling Pipeline
//!
//! ## Design Philosophy
//!
//! The errors in this module follow the same rules as every other value that
//! travels through the sampling hot path:
//!
//! 1. **Small Size**: Every variant carries a handful of integers or a
//!    `&'static str`. Errors are returned once per ADC buffer and must not
//!    cost more than the reading they replace.
//!
//! 2. **No Heap Allocation**: No `String` anywhere, so an error can be created
//!    from inside the buffer-done callback.
//!
//! 3. **Copy Semantics**: Errors are `Copy` and can be logged and returned at
//!    the same time.
//!
//! ## Error Categories
//!
//! ### Recoverable (skip and continue)
//! - `InsufficientSamples`: the buffer does not hold a full mains cycle. The
//!   buffer is skipped, the next delivery is processed normally.
//! - `RangeOutOfBounds`: a runtime range change would leave the valid ADC
//!   input range. The request is reverted, nothing is reconfigured.
//! - `QueueFull`: the processing task fell behind and the ADC callback could
//!   not hand over a buffer.
//!
//! ### Configuration (startup only)
//! - `InvalidLayout` / `InvalidConfig`: the configured buffer geometry or
//!   calibration parameters cannot work. Reported once at initialisation.
//!
//! Protective conditions (overcurrent, dimmer failure) are *not* errors: they
//! are reported as events and sticky flags, see [`crate::safety`].
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use fuseguard_core::{SamplingError, SampleBuffer, CycleMetricsCalculator};
//! use fuseguard_core::calibration::ZeroReferences;
//!
//! let calculator = CycleMetricsCalculator::new(0.2, 0.0044, 0);
//! let samples = [0i16; 20]; // far less than one 20ms cycle
//! let buffer = SampleBuffer::interleaved(&samples[..], 2, 0, 1, 200, 20_000);
//!
//! match calculator.compute(&buffer, &[], ZeroReferences::default()) {
//!     Ok(_) => {}
//!     Err(SamplingError::InsufficientSamples { .. }) => {
//!         // Skip this buffer, the next one will be fine
//!     }
//!     Err(_) => {}
//! }
//! ```

use thiserror_no_std::Error;

/// Result type for sampling operations
pub type SamplingResult<T> = Result<T, SamplingError>;

/// Sampling errors - kept small for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingError {
    /// Buffer holds less than one full mains cycle
    #[error("Insufficient samples: need {required}, have {available}")]
    InsufficientSamples {
        /// Samples per channel needed for one mains cycle
        required: usize,
        /// Samples per channel present in the buffer
        available: usize,
    },

    /// Buffer geometry does not match the channel layout
    #[error("Invalid buffer layout: {reason}")]
    InvalidLayout {
        /// What is wrong with the layout
        reason: &'static str,
    },

    /// Requested input range is outside what the ADC supports
    #[error("Range {requested_mv}mV on channel {channel} outside [{min_mv}, {max_mv}]")]
    RangeOutOfBounds {
        /// ADC channel index the request was for
        channel: u8,
        /// Range that would have resulted from the request
        requested_mv: i32,
        /// Smallest accepted range
        min_mv: i32,
        /// Largest accepted range
        max_mv: i32,
    },

    /// Delivery queue has no free slot for another buffer
    #[error("Buffer queue full")]
    QueueFull,

    /// Configuration rejected at initialisation
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Which parameter is wrong
        reason: &'static str,
    },
}

impl SamplingError {
    /// Whether the pipeline can simply skip the offending buffer or request
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfig { .. })
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SamplingError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InsufficientSamples { required, available } =>
                defmt::write!(fmt, "Need {} samples, have {}", required, available),
            Self::InvalidLayout { reason } =>
                defmt::write!(fmt, "Invalid layout: {}", reason),
            Self::RangeOutOfBounds { channel, requested_mv, min_mv, max_mv } =>
                defmt::write!(fmt, "Range {}mV ch{} outside [{}, {}]", requested_mv, channel, min_mv, max_mv),
            Self::QueueFull =>
                defmt::write!(fmt, "Buffer queue full"),
            Self::InvalidConfig { reason } =>
                defmt::write!(fmt, "Invalid config: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_small() {
        assert!(core::mem::size_of::<SamplingError>() <= 24);
    }

    #[test]
    fn config_errors_are_not_recoverable() {
        assert!(SamplingError::QueueFull.is_recoverable());
        assert!(SamplingError::InsufficientSamples { required: 100, available: 10 }.is_recoverable());
        assert!(!SamplingError::InvalidConfig { reason: "discount" }.is_recoverable());
    }
}

//! ADC Buffers and the ADC Driver Interface
//!
//! ## Overview
//!
//! The ADC peripheral samples voltage and current back to back and writes
//! them interleaved into one of two buffers (double buffering). When a buffer
//! is full the driver hands it to the pipeline as a [`SampleBuffer`] and
//! continues filling the other one. The pipeline must give the buffer back
//! through [`AdcDriver::release_buffer`] before the driver wraps around to it.
//!
//! ```text
//! raw:     [v0 c0 v1 c1 v2 c2 ... v99 c99]    channel_count = 2
//!           ↑  ↑
//!           │  └─ current_index = 1
//!           └──── voltage_index = 0
//!
//! samples_per_cycle = cycle_period_us / sample_interval_us
//!                   = 20000 / 200 = 100
//! ```
//!
//! A buffer is only usable when it holds at least one full mains cycle per
//! channel; [`SampleBuffer::samples_per_cycle_checked`] verifies the layout
//! before any stage reads from it.

use crate::errors::{SamplingError, SamplingResult};

/// One ADC buffer delivery with its channel layout and timing
///
/// `B` is whatever the driver uses to own the storage: a slice for tests and
/// simulations, a static buffer handle on the device.
#[derive(Debug, Clone)]
pub struct SampleBuffer<B> {
    samples: B,
    channel_count: usize,
    voltage_index: usize,
    current_index: usize,
    sample_interval_us: u32,
    cycle_period_us: u32,
}

impl<B: AsRef<[i16]>> SampleBuffer<B> {
    /// Describe a buffer of interleaved samples
    pub fn interleaved(
        samples: B,
        channel_count: usize,
        voltage_index: usize,
        current_index: usize,
        sample_interval_us: u32,
        cycle_period_us: u32,
    ) -> Self {
        Self {
            samples,
            channel_count,
            voltage_index,
            current_index,
            sample_interval_us,
            cycle_period_us,
        }
    }

    /// Raw interleaved samples
    pub fn samples(&self) -> &[i16] {
        self.samples.as_ref()
    }

    /// Total number of samples over all channels
    pub fn sample_count(&self) -> usize {
        self.samples.as_ref().len()
    }

    /// Number of interleaved channels
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Position of the voltage sample in each frame
    pub fn voltage_index(&self) -> usize {
        self.voltage_index
    }

    /// Position of the current sample in each frame
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Interval between two samples of one channel (µs)
    pub fn sample_interval_us(&self) -> u32 {
        self.sample_interval_us
    }

    /// Mains cycle period (µs)
    pub fn cycle_period_us(&self) -> u32 {
        self.cycle_period_us
    }

    /// Samples per channel in this buffer
    pub fn samples_per_channel(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.sample_count() / self.channel_count
    }

    /// Samples per channel that make up one mains cycle
    pub fn samples_per_cycle(&self) -> usize {
        if self.sample_interval_us == 0 {
            return 0;
        }
        (self.cycle_period_us / self.sample_interval_us) as usize
    }

    /// Samples per cycle, after checking that the buffer holds a full cycle
    pub fn samples_per_cycle_checked(&self) -> SamplingResult<usize> {
        if self.channel_count == 0
            || self.voltage_index >= self.channel_count
            || self.current_index >= self.channel_count
        {
            return Err(SamplingError::InvalidLayout {
                reason: "channel index outside frame",
            });
        }

        let required = self.samples_per_cycle();
        if required == 0 {
            return Err(SamplingError::InvalidLayout {
                reason: "cycle shorter than one sample interval",
            });
        }

        let available = self.samples_per_channel();
        if required > available {
            return Err(SamplingError::InsufficientSamples { required, available });
        }

        Ok(required)
    }

    /// Samples of one channel in time order
    pub fn channel(&self, index: usize) -> impl Iterator<Item = i16> + '_ {
        let step = self.channel_count.max(1);
        let skip = if index < self.channel_count { index } else { self.sample_count() };
        self.samples().iter().skip(skip).step_by(step).copied()
    }

    /// Voltage channel samples
    pub fn voltage(&self) -> impl Iterator<Item = i16> + '_ {
        self.channel(self.voltage_index)
    }

    /// Current channel samples
    pub fn current(&self) -> impl Iterator<Item = i16> + '_ {
        self.channel(self.current_index)
    }

    /// Voltage and current sample of each frame, in time order
    pub fn frames(&self) -> impl Iterator<Item = (i16, i16)> + '_ {
        self.voltage().zip(self.current())
    }

    /// Give up the descriptor and return the storage to its owner
    pub fn into_inner(self) -> B {
        self.samples
    }
}

/// Analog input of the ADC multiplexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcInput {
    /// Analog input pin
    Pin(u8),
    /// Supply voltage
    Vdd,
}

/// Hardware setting of one ADC channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcChannelConfig {
    /// Positive input
    pub input: AdcInput,
    /// Input range (mV)
    pub range_mv: i32,
    /// Negative input for differential measurements, `None` for single ended
    pub reference: Option<u8>,
}

/// Callback invoked by the driver on a voltage zero crossing
pub type ZeroCrossingCallback = fn();

/// The ADC peripheral as seen by the sampling pipeline
///
/// Buffer completion is not part of this trait: the driver pushes finished
/// buffers into a [`crate::delivery::BufferProducer`].
pub trait AdcDriver {
    /// Storage of one buffer, moved to the pipeline and back
    type Buffer: AsRef<[i16]>;

    /// Start continuous sampling
    fn start(&mut self);

    /// Hand a processed buffer back for refilling
    fn release_buffer(&mut self, buffer: Self::Buffer);

    /// Reconfigure one channel
    fn change_channel(&mut self, channel: u8, config: &AdcChannelConfig) -> SamplingResult<()>;

    /// Register the zero-crossing callback
    fn set_zero_crossing_callback(&mut self, callback: ZeroCrossingCallback);

    /// Fire the callback whenever `channel` crosses `zero` (ADC code)
    fn enable_zero_crossing_interrupt(&mut self, channel: u8, zero: i32);
}

//! Raw Sample Capture for External Reporting
//!
//! Now and then the app wants to see the actual waveforms. The sampler then
//! copies the raw current and voltage samples of one buffer into a capture
//! of fixed capacity, with a timestamp per frame. While the capture is being
//! sent it is left alone; the next copy happens only after the transport
//! reports it done, or after a timeout.
//!
//! Timestamps are synthetic: the tick count at copy time plus the sample
//! interval per frame.

use heapless::Vec;

use crate::adc::SampleBuffer;
use crate::time::Ticks;

/// Captured waveforms of up to `N` frames
#[derive(Debug, Clone, Default)]
pub struct PowerSamples<const N: usize> {
    current: Vec<i16, N>,
    voltage: Vec<i16, N>,
    timestamps: Vec<Ticks, N>,
}

impl<const N: usize> PowerSamples<N> {
    /// Empty capture
    pub fn new() -> Self {
        Self { current: Vec::new(), voltage: Vec::new(), timestamps: Vec::new() }
    }

    /// Drop all captured samples
    pub fn clear(&mut self) {
        self.current.clear();
        self.voltage.clear();
        self.timestamps.clear();
    }

    /// Copy frames of `buffer` until it ends or the capture is full
    ///
    /// Returns the number of frames copied.
    pub fn capture<B: AsRef<[i16]>>(
        &mut self,
        buffer: &SampleBuffer<B>,
        start: Ticks,
        interval_ticks: Ticks,
    ) -> usize {
        let mut copied = 0;
        for (frame, (voltage, current)) in buffer.frames().enumerate() {
            if self.is_full() {
                break;
            }
            let timestamp = start.wrapping_add((frame as Ticks).wrapping_mul(interval_ticks));
            // Capacity was checked above, all three have the same length
            let _ = self.current.push(current);
            let _ = self.voltage.push(voltage);
            let _ = self.timestamps.push(timestamp);
            copied += 1;
        }
        copied
    }

    /// Captured current samples
    pub fn current(&self) -> &[i16] {
        &self.current
    }

    /// Captured voltage samples
    pub fn voltage(&self) -> &[i16] {
        &self.voltage
    }

    /// Timestamp of each captured frame
    pub fn timestamps(&self) -> &[Ticks] {
        &self.timestamps
    }

    /// Frames captured
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether nothing is captured
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Whether the capture is at capacity
    pub fn is_full(&self) -> bool {
        self.current.is_full()
    }
}

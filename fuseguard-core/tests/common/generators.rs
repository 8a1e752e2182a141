//! Interleaved mains buffers for the pipeline
//!
//! Every generator produces one 20 ms cycle at 200 µs per sample (100 frames)
//! in the voltage-first layout the ADC delivers.

use core::f32::consts::PI;

use fuseguard_core::SampleBuffer;

/// Frames in one generated cycle
pub const FRAMES: usize = 100;

/// Wrap raw interleaved samples in the default buffer layout
pub fn mains_buffer(raw: Vec<i16>) -> SampleBuffer<Vec<i16>> {
    SampleBuffer::interleaved(raw, 2, 0, 1, 200, 20_000)
}

/// Both channels held at a constant code
pub fn constant_buffer(voltage: i16, current: i16) -> SampleBuffer<Vec<i16>> {
    constant_frames(voltage, current, FRAMES)
}

/// Constant codes with a custom frame count
pub fn constant_frames(voltage: i16, current: i16, frames: usize) -> SampleBuffer<Vec<i16>> {
    mains_buffer((0..frames).flat_map(|_| [voltage, current]).collect())
}

/// Sine on both channels around `zero`, current lagging by `phase` radians
pub fn sine_buffer(zero: i16, voltage_amplitude: f32, current_amplitude: f32, phase: f32) -> SampleBuffer<Vec<i16>> {
    let raw = (0..FRAMES)
        .flat_map(|i| {
            let angle = 2.0 * PI * i as f32 / FRAMES as f32;
            let voltage = zero as f32 + voltage_amplitude * angle.sin();
            let current = zero as f32 + current_amplitude * (angle - phase).sin();
            [voltage.round() as i16, current.round() as i16]
        })
        .collect();
    mains_buffer(raw)
}

/// Constant current with a few isolated spikes, as seen from switching noise
pub fn spiky_current_buffer(voltage: i16, current: i16, spike: i16) -> SampleBuffer<Vec<i16>> {
    let raw = (0..FRAMES)
        .flat_map(|i| {
            let sample = if i % 10 == 5 { current + spike } else { current };
            [voltage, sample]
        })
        .collect();
    mains_buffer(raw)
}

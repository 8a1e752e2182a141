//! Common test utilities for integration tests
//!
//! This module provides:
//! - Mains waveform generators producing interleaved ADC buffers
//! - A recording ADC driver standing in for the SAADC
//! - An event sink that keeps everything published

#![allow(dead_code)]

use fuseguard_core::{
    adc::{AdcChannelConfig, AdcDriver, ZeroCrossingCallback},
    events::{EventSink, PowerEvent},
    BoardConfig, SamplingResult,
};

pub mod generators;

/// Board with unit multipliers and zeros at 2000 codes
pub fn unit_board() -> BoardConfig {
    BoardConfig {
        voltage_multiplier: 1.0,
        current_multiplier: 1.0,
        voltage_zero: 2000,
        current_zero: 2000,
        power_zero: 0,
        ..BoardConfig::acr01b6c()
    }
}

/// ADC driver that records every call
#[derive(Default)]
pub struct MockAdc {
    pub started: bool,
    pub released: Vec<Vec<i16>>,
    pub changes: Vec<(u8, AdcChannelConfig)>,
    pub callback: Option<ZeroCrossingCallback>,
    pub zero_crossing: Option<(u8, i32)>,
}

impl AdcDriver for MockAdc {
    type Buffer = Vec<i16>;

    fn start(&mut self) {
        self.started = true;
    }

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        self.released.push(buffer);
    }

    fn change_channel(&mut self, channel: u8, config: &AdcChannelConfig) -> SamplingResult<()> {
        self.changes.push((channel, *config));
        Ok(())
    }

    fn set_zero_crossing_callback(&mut self, callback: ZeroCrossingCallback) {
        self.callback = Some(callback);
    }

    fn enable_zero_crossing_interrupt(&mut self, channel: u8, zero: i32) {
        self.zero_crossing = Some((channel, zero));
    }
}

/// Event bus stand-in
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<PowerEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protective events only
    pub fn faults(&self) -> Vec<PowerEvent> {
        self.events.iter().copied().filter(PowerEvent::is_fault).collect()
    }

    /// Number of events with the given name
    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|event| event.name() == name).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&mut self, event: PowerEvent) {
        self.events.push(event);
    }
}

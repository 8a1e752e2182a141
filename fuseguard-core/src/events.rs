//! Events Published by the Pipeline and Commands It Accepts
//!
//! ## Overview
//!
//! The sampling pipeline talks to the rest of the firmware only through the
//! event bus:
//!
//! ```text
//!                 ┌──────────────────┐
//!  Command ──────▶│  PowerSampler    │──────▶ PowerEvent
//!  (toggle log,   │  ChannelCtrl     │        (power, energy,
//!   range, ...)   │  SafetyMonitor   │         faults, samples)
//!                 └──────────────────┘
//! ```
//!
//! Events are small `Copy` values. Large payloads (the captured sample wave)
//! stay in the sampler; the event only announces that they are ready.
//!
//! ## Fault Events
//!
//! `CurrentAboveThreshold`, `CurrentAboveThresholdPwm` and `DimmerOnFailure`
//! are expected to make the switch driver cut power. The pipeline does not
//! touch the switch itself.

use crate::channel::{Channel, LogCategory};

/// Outbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerEvent {
    /// Averaged real and apparent power, once per buffer
    PowerUsage {
        /// Real power (mW)
        power_mw: i32,
        /// Smoothed RMS current times smoothed RMS voltage (mW)
        apparent_power_mw: u32,
    },
    /// Cumulative energy, once per buffer
    AccumulatedEnergy {
        /// Energy since start (µJ)
        energy_uj: i64,
    },
    /// Hard overcurrent
    CurrentAboveThreshold,
    /// Sustained overcurrent while dimming
    CurrentAboveThresholdPwm,
    /// Current flowing with relay and dimmer off
    DimmerOnFailure,
    /// Sample capture cleared and about to be refilled
    SamplesStart,
    /// Sample capture complete
    SamplesEnd {
        /// Samples captured per channel
        samples: usize,
    },
}

impl PowerEvent {
    /// Short name for logs
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PowerUsage { .. } => "power_usage",
            Self::AccumulatedEnergy { .. } => "accumulated_energy",
            Self::CurrentAboveThreshold => "current_above_threshold",
            Self::CurrentAboveThresholdPwm => "current_above_threshold_pwm",
            Self::DimmerOnFailure => "dimmer_on_failure",
            Self::SamplesStart => "samples_start",
            Self::SamplesEnd { .. } => "samples_end",
        }
    }

    /// Whether the switch driver must act on this event
    pub const fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::CurrentAboveThreshold | Self::CurrentAboveThresholdPwm | Self::DimmerOnFailure
        )
    }
}

/// Inbound command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Flip one periodic log category
    ToggleLog(LogCategory),
    /// Switch the voltage channel to the next input
    ToggleVoltageChannelInput,
    /// Flip differential mode of a channel
    ToggleDifferential(Channel),
    /// Raise a channel's input range by one step
    IncreaseRange(Channel),
    /// Lower a channel's input range by one step
    DecreaseRange(Channel),
}

/// Receiver of pipeline events (the event bus)
pub trait EventSink {
    /// Deliver one event; must not block
    fn publish(&mut self, event: PowerEvent);
}

impl<F: FnMut(PowerEvent)> EventSink for F {
    fn publish(&mut self, event: PowerEvent) {
        self(event)
    }
}

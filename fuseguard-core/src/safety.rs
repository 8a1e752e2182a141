//! Soft Fuse and Dimmer Failure Detection
//!
//! ## Overview
//!
//! The monitor runs once per buffer on the smoothed current readings and
//! decides whether one of three protective conditions has occurred:
//!
//! | Condition         | Trigger                                        | Event                      |
//! |-------------------|------------------------------------------------|----------------------------|
//! | Hard overcurrent  | filtered current > hard threshold              | `CurrentAboveThreshold`    |
//! | PWM overcurrent   | current > PWM threshold for > 20 buffers       | `CurrentAboveThresholdPwm` |
//! | Dimmer-on failure | same, but relay and dimmer both off            | `DimmerOnFailure`          |
//!
//! ## Sticky Flags
//!
//! Each condition has a flag in [`ErrorState`]. The monitor only ever raises
//! flags; clearing one is an external acknowledgement. A condition whose flag
//! is already raised is not reported again, so every failure mode produces at
//! most one event until it is acknowledged.
//!
//! ## Timing Windows
//!
//! ```text
//! boot            +2000 ms
//!  │───warm-up───│ dimmer-failure detection enabled (latched) ──────────▶
//!
//! switch off       +1000 ms
//!  │───grace────│ current may still flow, no dimmer-failure verdict
//! ```
//!
//! ## Detection Flow
//!
//! ```text
//! switch snapshot ──▶ off transition? ──▶ grace window bookkeeping
//!                                             │
//! filtered > hard threshold && !overCurrent ──┴──▶ raise, return
//!                                             │
//! current > PWM threshold ? count++ : count=0 │
//!                                             │
//! count > 20 && !overCurrentPwm ──────────────┴──▶ dimmer on?  ──▶ PWM overcurrent
//!                                                  relay off, outside grace,
//!                                                  warmed up?  ──▶ dimmer-on failure
//! ```
//!
//! The monitor reads the switch state once per pass. A switch change caused
//! by an event it publishes only shows up in the next pass.

use crate::config::SoftFuseConfig;
use crate::constants::safety::{
    FAILURE_DETECTION_WARMUP_MS, PWM_OVERCURRENT_BUFFER_LIMIT, SWITCH_OFF_GRACE_MS,
};
use crate::events::{EventSink, PowerEvent};
use crate::store::StateStore;
use crate::time::{tick_difference, TickSource, Ticks};

/// Output state of the switch, written by the switch driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwitchState {
    /// Relay contacts closed
    pub relay_on: bool,
    /// Dimmer duty cycle, 0 = off
    pub pwm_level: u8,
}

impl SwitchState {
    /// Both outputs off
    pub const OFF: Self = Self { relay_on: false, pwm_level: 0 };

    /// Relay closed, dimmer off
    pub const fn relay() -> Self {
        Self { relay_on: true, pwm_level: 0 }
    }

    /// Relay open, dimmer at `level`
    pub const fn dimmed(level: u8) -> Self {
        Self { relay_on: false, pwm_level: level }
    }

    /// Dimmer conducting
    pub const fn is_dimming(&self) -> bool {
        self.pwm_level != 0
    }

    /// Either output conducting
    pub const fn is_on(&self) -> bool {
        self.relay_on || self.is_dimming()
    }
}

/// Protective condition detected by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// Current above the hard threshold
    OverCurrent,
    /// Sustained current above the PWM threshold with the dimmer on
    OverCurrentPwm,
    /// Sustained current with both outputs off
    DimmerOnFailure,
}

impl FaultKind {
    /// Every fault, in flag bit order
    pub const ALL: [FaultKind; 3] = [Self::OverCurrent, Self::OverCurrentPwm, Self::DimmerOnFailure];

    /// Flag bit in [`ErrorState::bits`]
    pub const fn bit(&self) -> u8 {
        match self {
            Self::OverCurrent => 1 << 0,
            Self::OverCurrentPwm => 1 << 1,
            Self::DimmerOnFailure => 1 << 2,
        }
    }

    /// Event announcing this fault
    pub const fn event(&self) -> PowerEvent {
        match self {
            Self::OverCurrent => PowerEvent::CurrentAboveThreshold,
            Self::OverCurrentPwm => PowerEvent::CurrentAboveThresholdPwm,
            Self::DimmerOnFailure => PowerEvent::DimmerOnFailure,
        }
    }
}

/// Sticky fault flags
///
/// Raised by the monitor, cleared only by [`ErrorState::acknowledge`] from
/// outside the sampling pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorState {
    bits: u8,
}

impl ErrorState {
    /// No flags raised
    pub const CLEAR: Self = Self { bits: 0 };

    /// Restore from persisted bits, unknown bits dropped
    pub const fn from_bits(bits: u8) -> Self {
        Self { bits: bits & 0b111 }
    }

    /// Persistable representation
    pub const fn bits(&self) -> u8 {
        self.bits
    }

    /// Whether `fault` has been raised
    pub const fn is_raised(&self, fault: FaultKind) -> bool {
        self.bits & fault.bit() != 0
    }

    /// Whether any flag is raised
    pub const fn any(&self) -> bool {
        self.bits != 0
    }

    /// Raise `fault`; returns false when it was already raised
    pub fn raise(&mut self, fault: FaultKind) -> bool {
        let newly = !self.is_raised(fault);
        self.bits |= fault.bit();
        newly
    }

    /// Clear `fault` after it has been dealt with
    pub fn acknowledge(&mut self, fault: FaultKind) {
        self.bits &= !fault.bit();
    }
}

/// Per-buffer overcurrent and dimmer-failure detector
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    threshold_ma: i32,
    threshold_pwm_ma: i32,
    boot_ticks: Ticks,
    mask: u32,
    grace_ticks: Ticks,
    warmup_ticks: Ticks,
    previous_switch: SwitchState,
    switched_off_at: Option<Ticks>,
    warmed_up: bool,
    consecutive_overcurrent: u32,
}

impl SafetyMonitor {
    /// Monitor with the given thresholds, counting warm-up from now
    pub fn new<T: TickSource>(config: &SoftFuseConfig, clock: &T) -> Self {
        Self {
            threshold_ma: config.current_threshold_ma,
            threshold_pwm_ma: config.current_threshold_pwm_ma,
            boot_ticks: clock.now(),
            mask: clock.counter_mask(),
            grace_ticks: clock.from_ms(SWITCH_OFF_GRACE_MS),
            warmup_ticks: clock.from_ms(FAILURE_DETECTION_WARMUP_MS),
            previous_switch: SwitchState::OFF,
            switched_off_at: None,
            warmed_up: false,
            consecutive_overcurrent: 0,
        }
    }

    /// Consecutive buffers above the PWM threshold
    pub fn consecutive_overcurrent(&self) -> u32 {
        self.consecutive_overcurrent
    }

    /// Whether dimmer-on failures can be reported yet
    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    /// Whether the switch turned off less than the grace window ago
    pub fn in_switch_off_grace(&self) -> bool {
        self.switched_off_at.is_some()
    }

    /// Evaluate one buffer against a switch and flag snapshot
    ///
    /// `filtered_ma` feeds the hard threshold, `current_ma` the PWM counter.
    /// Returns the fault to report, if any; the caller publishes it and
    /// raises the flag.
    pub fn evaluate(
        &mut self,
        filtered_ma: i32,
        current_ma: i32,
        switch: SwitchState,
        errors: ErrorState,
        now: Ticks,
    ) -> Option<FaultKind> {
        if !self.warmed_up && tick_difference(now, self.boot_ticks, self.mask) > self.warmup_ticks {
            self.warmed_up = true;
        }

        let previous = core::mem::replace(&mut self.previous_switch, switch);
        if !switch.is_on() && previous.is_on() {
            self.switched_off_at = Some(now);
        }

        if let Some(off_at) = self.switched_off_at {
            if tick_difference(now, off_at, self.mask) >= self.grace_ticks {
                self.switched_off_at = None;
            }
        }
        let just_switched_off = self.switched_off_at.is_some();

        if filtered_ma > self.threshold_ma && !errors.is_raised(FaultKind::OverCurrent) {
            return Some(FaultKind::OverCurrent);
        }

        if current_ma > self.threshold_pwm_ma {
            self.consecutive_overcurrent = self.consecutive_overcurrent.saturating_add(1);
        } else {
            self.consecutive_overcurrent = 0;
        }

        if self.consecutive_overcurrent > PWM_OVERCURRENT_BUFFER_LIMIT
            && !errors.is_raised(FaultKind::OverCurrentPwm)
        {
            if switch.is_dimming() {
                return Some(FaultKind::OverCurrentPwm);
            }
            if !switch.relay_on
                && !just_switched_off
                && self.warmed_up
                && !errors.is_raised(FaultKind::DimmerOnFailure)
            {
                return Some(FaultKind::DimmerOnFailure);
            }
        }

        None
    }

    /// Evaluate one buffer, publish the resulting event and raise its flag
    pub fn check<S, E, T>(
        &mut self,
        filtered_ma: i32,
        current_ma: i32,
        store: &mut S,
        events: &mut E,
        clock: &T,
    ) -> Option<FaultKind>
    where
        S: StateStore,
        E: EventSink,
        T: TickSource,
    {
        let switch = store.switch_state();
        let errors = store.error_state();

        let fault = self.evaluate(filtered_ma, current_ma, switch, errors, clock.now())?;

        match fault {
            FaultKind::OverCurrent => {
                log_warn!("current above threshold: {} mA", filtered_ma);
            }
            FaultKind::OverCurrentPwm => {
                log_warn!("current above pwm threshold: {} mA", current_ma);
            }
            FaultKind::DimmerOnFailure => {
                log_error!("dimmer on failure detected: {} mA", current_ma);
            }
        }

        events.publish(fault.event());
        store.raise_error(fault);
        Some(fault)
    }
}

//! Runtime ADC Channel Control
//!
//! Debug and calibration commands can reconfigure the two ADC channels while
//! sampling runs:
//!
//! - switch the voltage channel to a different input, to look at the zero
//!   reference, the supply or the other current gain stages through the
//!   voltage path
//! - toggle differential measurement against the zero-reference pin
//! - raise or lower the input range by 600 mV, within 150..=3600 mV
//! - toggle the periodic log dumps
//!
//! Every accepted change is pushed to the driver with
//! [`AdcDriver::change_channel`]. None of this touches the calibration state:
//! after a range change the zero references simply re-converge.

use crate::adc::{AdcChannelConfig, AdcDriver, AdcInput};
use crate::config::BoardConfig;
use crate::constants::adc::{
    CURRENT_CHANNEL_IDX, MAX_RANGE_MV, MIN_RANGE_MV, RANGE_STEP_MV, VOLTAGE_CHANNEL_IDX,
};
use crate::errors::{SamplingError, SamplingResult};
use crate::events::Command;

/// One of the two sampled channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Mains voltage
    Voltage,
    /// Load current
    Current,
}

impl Channel {
    /// Index of the channel in the ADC configuration and sample frames
    pub const fn index(&self) -> u8 {
        match self {
            Self::Voltage => VOLTAGE_CHANNEL_IDX as u8,
            Self::Current => CURRENT_CHANNEL_IDX as u8,
        }
    }
}

/// Periodic log dump category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogCategory {
    /// Calculated values
    Power,
    /// Raw current wave
    Current,
    /// Raw voltage wave
    Voltage,
    /// Filtered current wave
    FilteredCurrent,
}

/// Enabled log dump categories, all off at start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogFlags {
    /// Calculated values
    pub power: bool,
    /// Raw current wave
    pub current: bool,
    /// Raw voltage wave
    pub voltage: bool,
    /// Filtered current wave
    pub filtered_current: bool,
}

impl LogFlags {
    /// Flip one category
    pub fn toggle(&mut self, category: LogCategory) {
        let flag = match category {
            LogCategory::Power => &mut self.power,
            LogCategory::Current => &mut self.current,
            LogCategory::Voltage => &mut self.voltage,
            LogCategory::FilteredCurrent => &mut self.filtered_current,
        };
        *flag = !*flag;
    }

    /// Whether any dump is enabled
    pub fn any(&self) -> bool {
        self.power || self.current || self.voltage || self.filtered_current
    }
}

/// Signal currently sampled through the voltage channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VoltageChannelInput {
    /// The voltage divider, normal operation
    VoltagePin,
    /// The zero-reference pin
    ZeroReference,
    /// The supply voltage
    Vdd,
    /// Current sense, medium gain stage
    CurrentMediumGain,
    /// Current sense, low gain stage
    CurrentLowGain,
}

impl VoltageChannelInput {
    const CYCLE: [Self; 5] = [
        Self::VoltagePin,
        Self::ZeroReference,
        Self::Vdd,
        Self::CurrentMediumGain,
        Self::CurrentLowGain,
    ];

    fn position(&self) -> usize {
        Self::CYCLE.iter().position(|input| input == self).unwrap_or(0)
    }

    /// Physical input on `board`, `None` when the board does not wire it
    pub fn resolve(&self, board: &BoardConfig) -> Option<AdcInput> {
        match self {
            Self::VoltagePin => Some(AdcInput::Pin(board.pin_voltage)),
            Self::ZeroReference => board.pin_zero_ref.map(AdcInput::Pin),
            Self::Vdd => Some(AdcInput::Vdd),
            Self::CurrentMediumGain => board.pin_current_gain_med.map(AdcInput::Pin),
            Self::CurrentLowGain => board.pin_current_gain_low.map(AdcInput::Pin),
        }
    }

    /// Next input in the cycle that `board` wires
    pub fn next(&self, board: &BoardConfig) -> (Self, AdcInput) {
        let start = self.position();
        for step in 1..=Self::CYCLE.len() {
            let candidate = Self::CYCLE[(start + step) % Self::CYCLE.len()];
            if let Some(input) = candidate.resolve(board) {
                return (candidate, input);
            }
        }
        (Self::VoltagePin, AdcInput::Pin(board.pin_voltage))
    }
}

/// Runtime configuration of both ADC channels
#[derive(Debug, Clone)]
pub struct ChannelController {
    board: BoardConfig,
    voltage_input: VoltageChannelInput,
    voltage_pin: AdcInput,
    range_mv: [i32; 2],
    voltage_differential: bool,
    current_differential: bool,
    log_flags: LogFlags,
}

impl ChannelController {
    /// Controller in the board's start-up configuration
    pub fn new(board: &BoardConfig) -> Self {
        Self {
            board: board.clone(),
            voltage_input: VoltageChannelInput::VoltagePin,
            voltage_pin: AdcInput::Pin(board.pin_voltage),
            range_mv: [board.voltage_range_mv, board.current_range_mv],
            voltage_differential: true,
            current_differential: true,
            log_flags: LogFlags::default(),
        }
    }

    /// Enabled log dumps
    pub fn log_flags(&self) -> LogFlags {
        self.log_flags
    }

    /// Signal on the voltage channel
    pub fn voltage_input(&self) -> VoltageChannelInput {
        self.voltage_input
    }

    /// Input range of `channel` (mV)
    pub fn range_mv(&self, channel: Channel) -> i32 {
        self.range_mv[channel.index() as usize]
    }

    /// Whether `channel` measures against the zero reference
    pub fn is_differential(&self, channel: Channel) -> bool {
        match channel {
            Channel::Voltage => self.voltage_differential,
            Channel::Current => self.current_differential,
        }
    }

    /// Hardware configuration of `channel`
    pub fn channel_config(&self, channel: Channel) -> AdcChannelConfig {
        let input = match channel {
            Channel::Voltage => self.voltage_pin,
            Channel::Current => AdcInput::Pin(self.board.pin_current),
        };
        let reference = if self.is_differential(channel) { self.board.pin_zero_ref } else { None };

        AdcChannelConfig { input, range_mv: self.range_mv(channel), reference }
    }

    /// Push the configuration of both channels to the driver
    pub fn apply_all<A: AdcDriver>(&self, adc: &mut A) -> SamplingResult<()> {
        self.apply(Channel::Voltage, adc)?;
        self.apply(Channel::Current, adc)
    }

    /// Apply one inbound command
    pub fn handle<A: AdcDriver>(&mut self, command: Command, adc: &mut A) -> SamplingResult<()> {
        match command {
            Command::ToggleLog(category) => {
                self.log_flags.toggle(category);
                Ok(())
            }
            Command::ToggleVoltageChannelInput => self.toggle_voltage_input(adc),
            Command::ToggleDifferential(channel) => self.toggle_differential(channel, adc),
            Command::IncreaseRange(channel) => self.change_range(channel, RANGE_STEP_MV, adc),
            Command::DecreaseRange(channel) => self.change_range(channel, -RANGE_STEP_MV, adc),
        }
    }

    /// Move the voltage channel to the next wired input
    pub fn toggle_voltage_input<A: AdcDriver>(&mut self, adc: &mut A) -> SamplingResult<()> {
        let (input, pin) = self.voltage_input.next(&self.board);
        self.voltage_input = input;
        self.voltage_pin = pin;
        log_info!("voltage channel input: {}", input.position());
        self.apply(Channel::Voltage, adc)
    }

    /// Flip differential mode of `channel`
    pub fn toggle_differential<A: AdcDriver>(
        &mut self,
        channel: Channel,
        adc: &mut A,
    ) -> SamplingResult<()> {
        match channel {
            Channel::Voltage => self.voltage_differential = !self.voltage_differential,
            Channel::Current => self.current_differential = !self.current_differential,
        }
        self.apply(channel, adc)
    }

    /// Shift the input range of `channel`; out-of-range requests leave it unchanged
    pub fn change_range<A: AdcDriver>(
        &mut self,
        channel: Channel,
        delta_mv: i32,
        adc: &mut A,
    ) -> SamplingResult<()> {
        let slot = channel.index() as usize;
        let requested = self.range_mv[slot] + delta_mv;

        if !(MIN_RANGE_MV..=MAX_RANGE_MV).contains(&requested) {
            log_warn!("range {} mV rejected on channel {}", requested, slot);
            return Err(SamplingError::RangeOutOfBounds {
                channel: channel.index(),
                requested_mv: requested,
                min_mv: MIN_RANGE_MV,
                max_mv: MAX_RANGE_MV,
            });
        }

        self.range_mv[slot] = requested;
        self.apply(channel, adc)
    }

    fn apply<A: AdcDriver>(&self, channel: Channel, adc: &mut A) -> SamplingResult<()> {
        adc.change_channel(channel.index(), &self.channel_config(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::ZeroCrossingCallback;

    #[derive(Default)]
    struct RecordingAdc {
        changes: Vec<(u8, AdcChannelConfig)>,
    }

    impl AdcDriver for RecordingAdc {
        type Buffer = Vec<i16>;

        fn start(&mut self) {}

        fn release_buffer(&mut self, _buffer: Self::Buffer) {}

        fn change_channel(&mut self, channel: u8, config: &AdcChannelConfig) -> SamplingResult<()> {
            self.changes.push((channel, *config));
            Ok(())
        }

        fn set_zero_crossing_callback(&mut self, _callback: ZeroCrossingCallback) {}

        fn enable_zero_crossing_interrupt(&mut self, _channel: u8, _zero: i32) {}
    }

    #[test]
    fn range_steps_and_bounds() {
        let board = BoardConfig::acr01b6c();
        let mut controller = ChannelController::new(&board);
        let mut adc = RecordingAdc::default();

        assert_eq!(controller.range_mv(Channel::Current), 600);
        controller.handle(Command::IncreaseRange(Channel::Current), &mut adc).unwrap();
        assert_eq!(controller.range_mv(Channel::Current), 1200);
        assert_eq!(adc.changes.last().map(|(ch, cfg)| (*ch, cfg.range_mv)), Some((1, 1200)));

        controller.handle(Command::DecreaseRange(Channel::Current), &mut adc).unwrap();
        let err = controller.handle(Command::DecreaseRange(Channel::Current), &mut adc);
        assert_eq!(
            err,
            Err(SamplingError::RangeOutOfBounds { channel: 1, requested_mv: 0, min_mv: 150, max_mv: 3600 })
        );
        assert_eq!(controller.range_mv(Channel::Current), 600);
        assert_eq!(adc.changes.len(), 2);
    }

    #[test]
    fn range_upper_bound() {
        let mut board = BoardConfig::acr01b1d();
        board.voltage_range_mv = 3600;
        let mut controller = ChannelController::new(&board);
        let mut adc = RecordingAdc::default();

        assert!(controller.change_range(Channel::Voltage, RANGE_STEP_MV, &mut adc).is_err());
        assert_eq!(controller.range_mv(Channel::Voltage), 3600);
        assert!(adc.changes.is_empty());
    }

    #[test]
    fn voltage_input_cycle_with_zero_reference() {
        let board = BoardConfig::acr01b6d();
        let mut controller = ChannelController::new(&board);
        let mut adc = RecordingAdc::default();

        let mut seen = Vec::new();
        for _ in 0..5 {
            controller.handle(Command::ToggleVoltageChannelInput, &mut adc).unwrap();
            seen.push(adc.changes.last().map(|(_, cfg)| cfg.input));
        }

        assert_eq!(
            seen,
            vec![
                Some(AdcInput::Pin(0)),
                Some(AdcInput::Vdd),
                Some(AdcInput::Pin(5)),
                Some(AdcInput::Pin(6)),
                Some(AdcInput::Pin(2)),
            ]
        );
        assert_eq!(controller.voltage_input(), VoltageChannelInput::VoltagePin);
    }

    #[test]
    fn voltage_input_cycle_skips_missing_pins() {
        let board = BoardConfig::acr01b1d();
        let mut controller = ChannelController::new(&board);
        let mut adc = RecordingAdc::default();

        controller.toggle_voltage_input(&mut adc).unwrap();
        assert_eq!(controller.voltage_input(), VoltageChannelInput::Vdd);
        controller.toggle_voltage_input(&mut adc).unwrap();
        assert_eq!(controller.voltage_input(), VoltageChannelInput::VoltagePin);
    }

    #[test]
    fn differential_uses_zero_reference_pin() {
        let board = BoardConfig::acr01b6c();
        let mut controller = ChannelController::new(&board);
        let mut adc = RecordingAdc::default();

        assert_eq!(controller.channel_config(Channel::Current).reference, Some(0));
        controller.handle(Command::ToggleDifferential(Channel::Current), &mut adc).unwrap();
        assert_eq!(adc.changes[0], (1, AdcChannelConfig {
            input: AdcInput::Pin(2),
            range_mv: 600,
            reference: None,
        }));

        // Voltage channel keeps its own setting
        assert_eq!(controller.channel_config(Channel::Voltage).reference, Some(0));
    }

    #[test]
    fn no_zero_reference_means_single_ended() {
        let controller = ChannelController::new(&BoardConfig::acr01b1d());
        assert!(controller.is_differential(Channel::Voltage));
        assert_eq!(controller.channel_config(Channel::Voltage).reference, None);
    }

    #[test]
    fn log_toggles() {
        let mut controller = ChannelController::new(&BoardConfig::acr01b1d());
        let mut adc = RecordingAdc::default();

        controller.handle(Command::ToggleLog(LogCategory::FilteredCurrent), &mut adc).unwrap();
        assert!(controller.log_flags().filtered_current);
        assert!(!controller.log_flags().power);

        controller.handle(Command::ToggleLog(LogCategory::FilteredCurrent), &mut adc).unwrap();
        assert!(!controller.log_flags().any());
        assert!(adc.changes.is_empty());
    }
}

//! Power Sampling Pipeline
//!
//! ## Overview
//!
//! [`PowerSampler`] owns every piece of per-buffer state and runs the stages
//! in a fixed order for each delivered ADC buffer:
//!
//! ```text
//! SampleBuffer ─▶ NoiseFilter ─▶ CalibrationTracker ─▶ CycleMetricsCalculator
//!                 (current)       (zero references)     (RMS, real power)
//!                                                              │
//!        ┌─────────────────────────────────────────────────────┘
//!        ▼
//!  filtered RMS median ─▶ SafetyMonitor ─▶ fault event + sticky flag
//!  current/voltage medians ─▶ apparent power
//!  real power ─▶ PowerAverage ─▶ EnergyIntegrator
//!        │
//!        ▼  (normal operation only)
//!  PowerUsage + AccumulatedEnergy events, raw sample capture
//! ```
//!
//! All state lives in the sampler itself; the firmware keeps one instance
//! and hands it each buffer from the processing task. Nothing here blocks
//! or allocates.
//!
//! ## Buffer ownership
//!
//! [`PowerSampler::process_buffer`] only borrows the buffer. Callers that go
//! through [`PowerSampler::run_pending`] get the release back to the ADC for
//! free, on success and on error alike.

use crate::adc::{AdcDriver, SampleBuffer, ZeroCrossingCallback};
use crate::calibration::{CalibrationTracker, ZeroReferences};
use crate::channel::ChannelController;
use crate::config::{BoardConfig, SamplingConfig, SoftFuseConfig};
use crate::constants::adc::POWER_SAMPLES_CAPACITY;
use crate::constants::filter::{LOG_DUMP_INTERVAL, RMS_WINDOW_SIZE};
use crate::constants::safety::SAMPLES_SEND_TIMEOUT_MS;
use crate::constants::time::US_PER_SECOND;
use crate::delivery::BufferConsumer;
use crate::energy::EnergyIntegrator;
use crate::errors::{SamplingError, SamplingResult};
use crate::events::{Command, EventSink, PowerEvent};
use crate::filter::NoiseFilter;
use crate::metrics::{CycleMetrics, CycleMetricsCalculator};
use crate::safety::{FaultKind, SafetyMonitor};
use crate::samples::PowerSamples;
use crate::smoother::{MultiCycleSmoother, PowerAverage};
use crate::store::{OperationMode, StateStore};
use crate::time::{tick_difference, TickSource, Ticks};

/// Everything one processed buffer produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerReading {
    /// Single-cycle values of this buffer
    pub cycle: CycleMetrics,
    /// Multi-cycle median of the current RMS (mA)
    pub current_rms_ma: i32,
    /// Multi-cycle median of the voltage RMS (mV)
    pub voltage_rms_mv: i32,
    /// Multi-cycle median of the filtered current RMS (mA)
    pub filtered_current_rms_ma: i32,
    /// Current median times voltage median (mW)
    pub apparent_power_mw: u32,
    /// Averaged real power (mW)
    pub power_mw: i32,
    /// Energy counter after this buffer (µJ)
    pub energy_uj: i64,
    /// Voltage zero after calibration (ADC code * 1000)
    pub voltage_zero: i64,
    /// Current zero after calibration (ADC code * 1000)
    pub current_zero: i64,
    /// Fault reported on this buffer
    pub fault: Option<FaultKind>,
}

/// The power sampling context
pub struct PowerSampler {
    config: SamplingConfig,
    voltage_zero_code: i32,
    filter: NoiseFilter,
    calibration: CalibrationTracker,
    calculator: CycleMetricsCalculator,
    current_rms: MultiCycleSmoother<RMS_WINDOW_SIZE>,
    voltage_rms: MultiCycleSmoother<RMS_WINDOW_SIZE>,
    filtered_current_rms: MultiCycleSmoother<RMS_WINDOW_SIZE>,
    power: PowerAverage,
    energy: EnergyIntegrator,
    safety: SafetyMonitor,
    channels: ChannelController,
    samples: PowerSamples<POWER_SAMPLES_CAPACITY>,
    operation_mode: OperationMode,
    sending_since: Option<Ticks>,
    send_timeout_ticks: Ticks,
    sample_interval_ticks: Ticks,
    counter_mask: u32,
    processed: u32,
}

impl PowerSampler {
    /// Create a sampler; every configuration group is validated here once
    pub fn new<T: TickSource>(
        board: &BoardConfig,
        fuse: &SoftFuseConfig,
        config: &SamplingConfig,
        clock: &T,
    ) -> SamplingResult<Self> {
        board.validate()?;
        config.validate()?;
        if fuse.current_threshold_ma <= 0 || fuse.current_threshold_pwm_ma <= 0 {
            return Err(SamplingError::InvalidConfig { reason: "soft fuse threshold not positive" });
        }

        let zeros = ZeroReferences::from_codes(board.voltage_zero, board.current_zero);
        let sample_interval_ticks =
            (config.sample_interval_us as u64 * clock.frequency_hz() as u64 / US_PER_SECOND) as Ticks;

        Ok(Self {
            config: *config,
            voltage_zero_code: board.voltage_zero,
            filter: NoiseFilter::new(config.filter_half_window, config.samples_per_channel),
            calibration: CalibrationTracker::new(
                zeros,
                config.voltage_zero_discount,
                config.current_zero_discount,
            ),
            calculator: CycleMetricsCalculator::new(
                board.voltage_multiplier,
                board.current_multiplier,
                board.power_zero,
            ),
            current_rms: MultiCycleSmoother::new(),
            voltage_rms: MultiCycleSmoother::new(),
            filtered_current_rms: MultiCycleSmoother::new(),
            power: PowerAverage::new(config.power_discount),
            energy: EnergyIntegrator::new(clock.now()),
            safety: SafetyMonitor::new(fuse, clock),
            channels: ChannelController::new(board),
            samples: PowerSamples::new(),
            operation_mode: OperationMode::default(),
            sending_since: None,
            send_timeout_ticks: clock.from_ms(SAMPLES_SEND_TIMEOUT_MS),
            sample_interval_ticks,
            counter_mask: clock.counter_mask(),
            processed: 0,
        })
    }

    /// Push the initial channel configuration to the ADC
    pub fn init_adc<A: AdcDriver>(&self, adc: &mut A) -> SamplingResult<()> {
        self.channels.apply_all(adc)
    }

    /// Read the operation mode and start continuous sampling
    pub fn start_sampling<A, S, E>(&mut self, adc: &mut A, store: &S, events: &mut E)
    where
        A: AdcDriver,
        S: StateStore,
        E: EventSink,
    {
        self.operation_mode = store.operation_mode();
        log_info!("start power sampling");

        events.publish(PowerEvent::SamplesStart);
        self.samples.clear();
        adc.start();
    }

    /// Install the zero-crossing callback and arm the interrupt on the voltage channel
    pub fn enable_zero_crossing_interrupt<A: AdcDriver>(
        &self,
        adc: &mut A,
        callback: ZeroCrossingCallback,
    ) {
        adc.set_zero_crossing_callback(callback);
        adc.enable_zero_crossing_interrupt(self.config.voltage_index as u8, self.voltage_zero_code);
    }

    /// The transport finished sending the captured samples
    pub fn sent_done(&mut self) {
        self.sending_since = None;
    }

    /// Apply a runtime command
    pub fn handle_command<A: AdcDriver>(&mut self, command: Command, adc: &mut A) -> SamplingResult<()> {
        self.channels.handle(command, adc)
    }

    /// Run the whole pipeline on one buffer
    ///
    /// A buffer that does not hold a full mains cycle is rejected before any
    /// state changes.
    pub fn process_buffer<B, S, E, T>(
        &mut self,
        buffer: &SampleBuffer<B>,
        store: &mut S,
        events: &mut E,
        clock: &T,
    ) -> SamplingResult<PowerReading>
    where
        B: AsRef<[i16]>,
        S: StateStore,
        E: EventSink,
        T: TickSource,
    {
        let samples_per_cycle = buffer.samples_per_cycle_checked().map_err(|err| {
            log_error!("buffer skipped: {}", err);
            err
        })?;

        let (zeros, cycle) = {
            let filtered = self.filter.apply(buffer.current().map(i32::from))?;
            let zeros = self.calibration.update(buffer, filtered)?;
            let cycle = self.calculator.compute(buffer, filtered, zeros)?;
            (zeros, cycle)
        };

        // Both arguments are the filtered median: the raw current is too
        // noisy for the PWM counter
        let filtered_current_rms_ma = self.filtered_current_rms.push(cycle.filtered_current_rms_ma);
        let fault = self.safety.check(
            filtered_current_rms_ma,
            filtered_current_rms_ma,
            store,
            events,
            clock,
        );

        let current_rms_ma = self.current_rms.push(cycle.current_rms_ma);
        let voltage_rms_mv = self.voltage_rms.push(cycle.voltage_rms_mv);
        let apparent_power_mw = (current_rms_ma as i64 * voltage_rms_mv as i64 / 1000).max(0) as u32;

        let power_mw = self.power.update(cycle.power_mw);
        let energy_uj = self.energy.update(power_mw, clock);

        let reading = PowerReading {
            cycle,
            current_rms_ma,
            voltage_rms_mv,
            filtered_current_rms_ma,
            apparent_power_mw,
            power_mw,
            energy_uj,
            voltage_zero: zeros.voltage,
            current_zero: zeros.current,
            fault,
        };

        if self.processed % LOG_DUMP_INTERVAL == 0 {
            self.dump_logs(buffer, samples_per_cycle, &reading);
        }
        self.processed = self.processed.wrapping_add(1);

        if self.operation_mode == OperationMode::Normal {
            self.publish(buffer, &reading, events, clock);
        }

        Ok(reading)
    }

    /// Take the next delivered buffer, process it and release it to the ADC
    ///
    /// `WouldBlock` when nothing is waiting. Processing errors are returned
    /// after the buffer was released.
    pub fn run_pending<A, S, E, T, const N: usize>(
        &mut self,
        queue: &mut BufferConsumer<'_, A::Buffer, N>,
        adc: &mut A,
        store: &mut S,
        events: &mut E,
        clock: &T,
    ) -> nb::Result<PowerReading, SamplingError>
    where
        A: AdcDriver,
        S: StateStore,
        E: EventSink,
        T: TickSource,
    {
        let buffer = queue.poll()?;
        let result = self.process_buffer(&buffer, store, events, clock);
        adc.release_buffer(buffer.into_inner());

        result.map_err(nb::Error::Other)
    }

    fn publish<B, E, T>(&mut self, buffer: &SampleBuffer<B>, reading: &PowerReading, events: &mut E, clock: &T)
    where
        B: AsRef<[i16]>,
        E: EventSink,
        T: TickSource,
    {
        let now = clock.now();
        if let Some(since) = self.sending_since {
            if tick_difference(now, since, self.counter_mask) >= self.send_timeout_ticks {
                log_debug!("sample transfer timed out");
                self.sending_since = None;
            }
        }

        if self.sending_since.is_none() {
            events.publish(PowerEvent::SamplesStart);
            self.samples.clear();
            let copied = self.samples.capture(buffer, now, self.sample_interval_ticks);
            self.sending_since = Some(now);
            events.publish(PowerEvent::SamplesEnd { samples: copied });
        }

        events.publish(PowerEvent::PowerUsage {
            power_mw: reading.power_mw,
            apparent_power_mw: reading.apparent_power_mw,
        });
        events.publish(PowerEvent::AccumulatedEnergy { energy_uj: reading.energy_uj });
    }

    #[cfg(any(feature = "log", feature = "defmt"))]
    fn dump_logs<B: AsRef<[i16]>>(&self, buffer: &SampleBuffer<B>, samples_per_cycle: usize, reading: &PowerReading) {
        let flags = self.channels.log_flags();
        let shown = samples_per_cycle.min(POWER_SAMPLES_CAPACITY);

        if flags.power {
            log_info!(
                "I={} I_med={} filt_I={} filt_I_med={} V={} V_med={} vZero={} cZero={} S={} P={} P_avg={}",
                reading.cycle.current_rms_ma,
                reading.current_rms_ma,
                reading.cycle.filtered_current_rms_ma,
                reading.filtered_current_rms_ma,
                reading.cycle.voltage_rms_mv,
                reading.voltage_rms_mv,
                reading.voltage_zero,
                reading.current_zero,
                reading.apparent_power_mw,
                reading.cycle.power_mw,
                reading.power_mw
            );
        }
        if flags.current {
            let wave: heapless::Vec<i16, POWER_SAMPLES_CAPACITY> = buffer.current().take(shown).collect();
            log_info!("current: {:?}", wave.as_slice());
        }
        if flags.filtered_current {
            let wave: heapless::Vec<i32, POWER_SAMPLES_CAPACITY> =
                self.filter.output().iter().copied().take(shown).collect();
            log_info!("filtered current: {:?}", wave.as_slice());
        }
        if flags.voltage {
            let wave: heapless::Vec<i16, POWER_SAMPLES_CAPACITY> = buffer.voltage().take(shown).collect();
            log_info!("voltage: {:?}", wave.as_slice());
        }
    }

    #[cfg(not(any(feature = "log", feature = "defmt")))]
    fn dump_logs<B: AsRef<[i16]>>(&self, _buffer: &SampleBuffer<B>, _samples_per_cycle: usize, _reading: &PowerReading) {}

    /// Current zero references
    pub fn zeros(&self) -> ZeroReferences {
        self.calibration.zeros()
    }

    /// Zero tracking switches
    pub fn calibration_mut(&mut self) -> &mut CalibrationTracker {
        &mut self.calibration
    }

    /// Energy counter (µJ)
    pub fn energy_uj(&self) -> i64 {
        self.energy.energy_uj()
    }

    /// Restore a persisted energy counter
    pub fn set_energy_uj(&mut self, energy_uj: i64) {
        self.energy.set_energy_uj(energy_uj);
    }

    /// Averaged real power (mW)
    pub fn power_mw(&self) -> i32 {
        self.power.average_mw()
    }

    /// Last captured raw samples
    pub fn power_samples(&self) -> &PowerSamples<POWER_SAMPLES_CAPACITY> {
        &self.samples
    }

    /// Whether a capture is waiting for the transport
    pub fn is_sending_samples(&self) -> bool {
        self.sending_since.is_some()
    }

    /// Channel configuration and log switches
    pub fn channels(&self) -> &ChannelController {
        &self.channels
    }

    /// Overcurrent and dimmer-failure detector state
    pub fn safety(&self) -> &SafetyMonitor {
        &self.safety
    }

    /// Operation mode read at sampling start
    pub fn operation_mode(&self) -> OperationMode {
        self.operation_mode
    }

    /// Buffers processed since creation
    pub fn buffers_processed(&self) -> u32 {
        self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SwitchState;
    use crate::store::MemoryStore;
    use crate::time::FixedTicks;

    fn sampling() -> SamplingConfig {
        SamplingConfig { samples_per_channel: 100, ..SamplingConfig::default() }
    }

    fn board() -> BoardConfig {
        BoardConfig {
            voltage_multiplier: 1.0,
            current_multiplier: 1.0,
            voltage_zero: 2000,
            current_zero: 2000,
            power_zero: 0,
            ..BoardConfig::acr01b2g()
        }
    }

    fn constant(value: i16, frames: usize) -> Vec<i16> {
        (0..frames).flat_map(|_| [value, value]).collect()
    }

    #[test]
    fn invalid_config_rejected() {
        let clock = FixedTicks::new(0);
        let config = SamplingConfig { voltage_index: 5, ..sampling() };
        assert!(PowerSampler::new(&board(), &SoftFuseConfig::default(), &config, &clock).is_err());

        let fuse = SoftFuseConfig { current_threshold_ma: 0, ..SoftFuseConfig::default() };
        assert!(PowerSampler::new(&board(), &fuse, &sampling(), &clock).is_err());
    }

    #[test]
    fn short_buffer_leaves_state_untouched() {
        let clock = FixedTicks::new(0);
        let mut sampler =
            PowerSampler::new(&board(), &SoftFuseConfig::default(), &sampling(), &clock).unwrap();
        let mut store = MemoryStore::normal(SwitchState::OFF);
        let mut events: Vec<PowerEvent> = Vec::new();

        let raw = constant(2100, 50);
        let buffer = SampleBuffer::interleaved(&raw[..], 2, 0, 1, 200, 20_000);
        let err = sampler
            .process_buffer(&buffer, &mut store, &mut |e| events.push(e), &clock)
            .unwrap_err();

        assert!(matches!(err, SamplingError::InsufficientSamples { .. }));
        assert_eq!(sampler.zeros(), ZeroReferences::from_codes(2000, 2000));
        assert_eq!(sampler.buffers_processed(), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn setup_mode_publishes_nothing() {
        let mut clock = FixedTicks::new(0);
        let mut sampler =
            PowerSampler::new(&board(), &SoftFuseConfig::default(), &sampling(), &clock).unwrap();
        let mut store = MemoryStore::default();
        let mut events: Vec<PowerEvent> = Vec::new();

        let raw = constant(2000, 100);
        let buffer = SampleBuffer::interleaved(&raw[..], 2, 0, 1, 200, 20_000);
        clock.advance_ms(20);
        sampler.process_buffer(&buffer, &mut store, &mut |e| events.push(e), &clock).unwrap();

        assert!(events.is_empty());
        assert_eq!(sampler.buffers_processed(), 1);
    }

    #[test]
    fn capture_waits_for_sent_done() {
        let mut clock = FixedTicks::new(0);
        let mut sampler =
            PowerSampler::new(&board(), &SoftFuseConfig::default(), &sampling(), &clock).unwrap();
        let mut store = MemoryStore::normal(SwitchState::OFF);
        sampler.operation_mode = OperationMode::Normal;

        let raw = constant(2000, 100);
        let buffer = SampleBuffer::interleaved(&raw[..], 2, 0, 1, 200, 20_000);
        let mut events: Vec<PowerEvent> = Vec::new();

        clock.advance_ms(20);
        sampler.process_buffer(&buffer, &mut store, &mut |e| events.push(e), &clock).unwrap();
        assert_eq!(events[0], PowerEvent::SamplesStart);
        assert_eq!(events[1], PowerEvent::SamplesEnd { samples: 100 });
        assert!(sampler.is_sending_samples());
        assert_eq!(sampler.power_samples().len(), 100);

        events.clear();
        clock.advance_ms(20);
        sampler.process_buffer(&buffer, &mut store, &mut |e| events.push(e), &clock).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PowerEvent::PowerUsage { .. }));

        sampler.sent_done();
        events.clear();
        clock.advance_ms(20);
        sampler.process_buffer(&buffer, &mut store, &mut |e| events.push(e), &clock).unwrap();
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn capture_resumes_after_timeout() {
        let mut clock = FixedTicks::new(0);
        let mut sampler =
            PowerSampler::new(&board(), &SoftFuseConfig::default(), &sampling(), &clock).unwrap();
        let mut store = MemoryStore::normal(SwitchState::OFF);
        sampler.operation_mode = OperationMode::Normal;

        let raw = constant(2000, 100);
        let buffer = SampleBuffer::interleaved(&raw[..], 2, 0, 1, 200, 20_000);
        let mut events: Vec<PowerEvent> = Vec::new();

        sampler.process_buffer(&buffer, &mut store, &mut |e| events.push(e), &clock).unwrap();
        events.clear();

        clock.advance_ms(SAMPLES_SEND_TIMEOUT_MS + 10);
        sampler.process_buffer(&buffer, &mut store, &mut |e| events.push(e), &clock).unwrap();
        assert_eq!(events[0], PowerEvent::SamplesStart);
    }

    #[test]
    fn apparent_power_from_medians() {
        let mut clock = FixedTicks::new(0);
        let mut sampler =
            PowerSampler::new(&board(), &SoftFuseConfig::default(), &sampling(), &clock).unwrap();
        let mut store = MemoryStore::normal(SwitchState::OFF);
        sampler.calibration_mut().set_voltage_tracking(false);
        sampler.calibration_mut().set_current_tracking(false);

        // 10 codes above zero on both channels: 10 A and 10 V at multiplier 1.0
        let raw = constant(2010, 100);
        let buffer = SampleBuffer::interleaved(&raw[..], 2, 0, 1, 200, 20_000);
        clock.advance_ms(20);
        let reading = sampler.process_buffer(&buffer, &mut store, &mut |_: PowerEvent| {}, &clock).unwrap();

        assert_eq!(reading.current_rms_ma, 10_000);
        assert_eq!(reading.voltage_rms_mv, 10_000);
        assert_eq!(reading.apparent_power_mw, 100_000);
    }
}

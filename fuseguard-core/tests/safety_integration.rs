//! Soft-fuse behaviour of the full pipeline
//!
//! Every test runs buffers at the real 20 ms cadence on a simulated RTC so
//! that warm-up and switch-off grace windows behave as on the device.

mod common;

use fuseguard_core::{
    events::PowerEvent,
    safety::{FaultKind, SwitchState},
    store::MemoryStore,
    time::FixedTicks,
    PowerSampler, SamplingConfig, SoftFuseConfig,
};

use common::{generators::constant_buffer, unit_board, RecordingSink};

/// 10 A with unit multipliers, one mA above the PWM threshold
const CURRENT_CODE: i16 = 2010;

fn pwm_fuse() -> SoftFuseConfig {
    SoftFuseConfig { current_threshold_pwm_ma: 9_999, ..SoftFuseConfig::default() }
}

fn sampler(fuse: &SoftFuseConfig, clock: &FixedTicks) -> PowerSampler {
    let mut sampler = PowerSampler::new(&unit_board(), fuse, &SamplingConfig::default(), clock).unwrap();
    sampler.calibration_mut().set_current_tracking(false);
    sampler
}

#[test]
fn sustained_pwm_overcurrent_reported_once() {
    let mut clock = FixedTicks::new(0);
    let mut sampler = sampler(&pwm_fuse(), &clock);
    let mut store = MemoryStore::normal(SwitchState::dimmed(60));
    let mut sink = RecordingSink::new();
    let buffer = constant_buffer(2000, CURRENT_CODE);

    for n in 1..=30 {
        clock.advance_ms(20);
        let reading = sampler.process_buffer(&buffer, &mut store, &mut sink, &clock).unwrap();
        assert_eq!(reading.filtered_current_rms_ma, 10_000);

        if n == 21 {
            assert_eq!(reading.fault, Some(FaultKind::OverCurrentPwm));
        } else {
            assert_eq!(reading.fault, None, "unexpected fault on buffer {}", n);
        }
    }

    assert_eq!(sink.faults(), vec![PowerEvent::CurrentAboveThresholdPwm]);
    assert!(store.errors.is_raised(FaultKind::OverCurrentPwm));
}

#[test]
fn hard_overcurrent_until_acknowledged() {
    let clock = FixedTicks::new(0);
    let mut sampler = sampler(&SoftFuseConfig::default(), &clock);
    let mut store = MemoryStore::normal(SwitchState::relay());
    let mut sink = RecordingSink::new();
    let buffer = constant_buffer(2000, 2100);

    sampler.process_buffer(&buffer, &mut store, &mut sink, &clock).unwrap();
    sampler.process_buffer(&buffer, &mut store, &mut sink, &clock).unwrap();
    assert_eq!(sink.faults(), vec![PowerEvent::CurrentAboveThreshold]);
    assert!(store.errors.is_raised(FaultKind::OverCurrent));

    store.acknowledge(FaultKind::OverCurrent);
    sampler.process_buffer(&buffer, &mut store, &mut sink, &clock).unwrap();
    assert_eq!(sink.count("current_above_threshold"), 2);
}

#[test]
fn dimmer_on_failure_after_warm_up() {
    let mut clock = FixedTicks::new(0);
    let mut sampler = sampler(&pwm_fuse(), &clock);
    let mut store = MemoryStore::normal(SwitchState::OFF);
    let mut sink = RecordingSink::new();
    let buffer = constant_buffer(2000, CURRENT_CODE);

    clock.advance_ms(2_100);
    for _ in 0..30 {
        clock.advance_ms(20);
        sampler.process_buffer(&buffer, &mut store, &mut sink, &clock).unwrap();
    }

    assert_eq!(sink.faults(), vec![PowerEvent::DimmerOnFailure]);
    assert!(store.errors.is_raised(FaultKind::DimmerOnFailure));
}

#[test]
fn no_dimmer_failure_during_warm_up() {
    let mut clock = FixedTicks::new(0);
    let mut sampler = sampler(&pwm_fuse(), &clock);
    let mut store = MemoryStore::normal(SwitchState::OFF);
    let mut sink = RecordingSink::new();
    let buffer = constant_buffer(2000, CURRENT_CODE);

    // 30 buffers end at 600 ms, well inside the warm-up
    for _ in 0..30 {
        clock.advance_ms(20);
        sampler.process_buffer(&buffer, &mut store, &mut sink, &clock).unwrap();
    }

    assert!(sink.faults().is_empty());
    assert!(!sampler.safety().is_warmed_up());
}

#[test]
fn switch_off_grace_delays_dimmer_failure() {
    let mut clock = FixedTicks::new(0);
    let mut sampler = sampler(&pwm_fuse(), &clock);
    let mut store = MemoryStore::normal(SwitchState::relay());
    let mut sink = RecordingSink::new();
    let buffer = constant_buffer(2000, CURRENT_CODE);

    clock.advance_ms(2_100);
    for _ in 0..25 {
        clock.advance_ms(20);
        sampler.process_buffer(&buffer, &mut store, &mut sink, &clock).unwrap();
    }
    assert!(sink.faults().is_empty());

    store.switch = SwitchState::OFF;
    let mut first_fault = None;
    for n in 0..70 {
        let reading = sampler.process_buffer(&buffer, &mut store, &mut sink, &clock).unwrap();
        if reading.fault.is_some() && first_fault.is_none() {
            first_fault = Some(n);
        }
        clock.advance_ms(20);
    }

    // The grace window is one second, 50 buffers
    let first_fault = first_fault.unwrap();
    assert!(first_fault >= 50, "fault after {} buffers", first_fault);
    assert_eq!(sink.faults(), vec![PowerEvent::DimmerOnFailure]);
}

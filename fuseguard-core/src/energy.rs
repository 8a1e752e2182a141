//! Energy Integration
//!
//! Once per buffer the averaged power is multiplied by the time since the
//! previous buffer and added to a microjoule counter (mW * ms = µJ).
//!
//! Converting RTC ticks to whole milliseconds would drop up to a millisecond
//! per update, which at 50 updates per second adds up to a 5% error. The tick
//! difference is therefore scaled by 1024 before the conversion and the
//! product divided by 1024 afterwards:
//!
//! ```text
//! energy += power_mw * ticks_to_ms(1024 * ticks) / 1024
//! ```

use crate::constants::time::ENERGY_TICK_SCALE;
use crate::time::{tick_difference, ticks_to_ms, TickSource, Ticks};

/// Cumulative energy counter
#[derive(Debug, Clone)]
pub struct EnergyIntegrator {
    energy_uj: i64,
    last_ticks: Ticks,
}

impl EnergyIntegrator {
    /// Start integrating at `start` ticks with an empty counter
    pub fn new(start: Ticks) -> Self {
        Self { energy_uj: 0, last_ticks: start }
    }

    /// Accumulated energy (µJ)
    pub fn energy_uj(&self) -> i64 {
        self.energy_uj
    }

    /// Tick count of the last update
    pub fn last_ticks(&self) -> Ticks {
        self.last_ticks
    }

    /// Add the energy used at `power_mw` since the last update
    pub fn update<T: TickSource>(&mut self, power_mw: i32, clock: &T) -> i64 {
        self.update_at(power_mw, clock.now(), clock.frequency_hz(), clock.counter_mask())
    }

    /// Same as [`EnergyIntegrator::update`] with an explicit counter reading
    pub fn update_at(&mut self, power_mw: i32, now: Ticks, frequency_hz: u32, mask: u32) -> i64 {
        let elapsed = tick_difference(now, self.last_ticks, mask) as u64;
        let scaled_ms = ticks_to_ms(elapsed * ENERGY_TICK_SCALE, frequency_hz) as i64;

        self.energy_uj += power_mw as i64 * scaled_ms / ENERGY_TICK_SCALE as i64;
        self.last_ticks = now;
        self.energy_uj
    }

    /// Restore a persisted counter value
    pub fn set_energy_uj(&mut self, energy_uj: i64) {
        self.energy_uj = energy_uj;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::time::{RTC_COUNTER_MASK, RTC_FREQUENCY_HZ};
    use crate::time::FixedTicks;
    use proptest::prelude::*;

    #[test]
    fn one_second_at_one_watt() {
        let mut clock = FixedTicks::new(0);
        let mut energy = EnergyIntegrator::new(clock.now());

        clock.advance(RTC_FREQUENCY_HZ);
        assert_eq!(energy.update(1000, &clock), 1_000_000);
    }

    #[test]
    fn keeps_sub_millisecond_part() {
        // One mains cycle: 655 ticks = 19.989 ms
        let mut energy = EnergyIntegrator::new(0);
        let mut now = 0;
        for _ in 0..50 {
            now += 655;
            energy.update_at(100_000, now, RTC_FREQUENCY_HZ, RTC_COUNTER_MASK);
        }

        // 50 * 655 ticks = 999.45 ms at 100 W, whole-ms truncation would give 950 ms
        let expected = 100_000i64 * 999;
        assert!((energy.energy_uj() - expected).abs() <= 100_000);
        assert!(energy.energy_uj() > 100_000 * 990);
    }

    #[test]
    fn survives_counter_wraparound() {
        let mut clock = FixedTicks::new(RTC_COUNTER_MASK - 16_383);
        let mut energy = EnergyIntegrator::new(clock.now());

        clock.advance(RTC_FREQUENCY_HZ);
        assert!(clock.now() < 32_768);
        assert_eq!(energy.update(2000, &clock), 2_000_000);
    }

    #[test]
    fn negative_power_decreases_counter() {
        let mut energy = EnergyIntegrator::new(0);
        energy.set_energy_uj(5_000_000);
        energy.update_at(-1000, 32_768, RTC_FREQUENCY_HZ, RTC_COUNTER_MASK);
        assert_eq!(energy.energy_uj(), 4_000_000);
    }

    proptest! {
        #[test]
        fn constant_power_matches_elapsed_time(
            power in 0i32..3_600_000,
            steps in prop::collection::vec(1u32..100_000, 1..30),
        ) {
            let mut energy = EnergyIntegrator::new(0);
            let mut now: u32 = 0;
            let mut previous = 0;

            for &step in &steps {
                now = now.wrapping_add(step) & RTC_COUNTER_MASK;
                let total = energy.update_at(power, now, RTC_FREQUENCY_HZ, RTC_COUNTER_MASK);

                // Exact product up to one unit of rounding
                let exact = power as i128 * step as i128 * 1000 / RTC_FREQUENCY_HZ as i128;
                prop_assert!(((total - previous) as i128 - exact).abs() <= 1 + power as i128 / 1024);
                prop_assert!(total >= previous);
                previous = total;
            }
        }
    }
}

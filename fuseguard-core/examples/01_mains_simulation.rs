//! Mains Simulation Example
//!
//! Feeds simulated 50 Hz cycles through the sampler the way the firmware
//! does: the ADC side delivers buffers into the queue, the processing task
//! drains it and hands every buffer back to the driver.
//!
//! ## What You'll Learn
//!
//! - Wiring `PowerSampler` to an ADC driver, a state store and an event sink
//! - Watching the soft fuse trip when the load steps up
//! - Reading power and energy from the published events
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_mains_simulation
//! ```

use fuseguard_core::{
    adc::{AdcChannelConfig, AdcDriver, ZeroCrossingCallback},
    delivery::{self, BufferQueue},
    events::PowerEvent,
    safety::SwitchState,
    store::MemoryStore,
    time::FixedTicks,
    BoardConfig, PowerSampler, SampleBuffer, SamplingConfig, SamplingResult, SoftFuseConfig,
};

/// Driver that only counts what it is asked to do
#[derive(Default)]
struct SimulatedAdc {
    released: usize,
}

impl AdcDriver for SimulatedAdc {
    type Buffer = Vec<i16>;

    fn start(&mut self) {
        println!("ADC started");
    }

    fn release_buffer(&mut self, _buffer: Self::Buffer) {
        self.released += 1;
    }

    fn change_channel(&mut self, channel: u8, config: &AdcChannelConfig) -> SamplingResult<()> {
        println!("channel {} -> {:?}", channel, config);
        Ok(())
    }

    fn set_zero_crossing_callback(&mut self, _callback: ZeroCrossingCallback) {}

    fn enable_zero_crossing_interrupt(&mut self, _channel: u8, _zero: i32) {}
}

/// One cycle of 230 V with `amps` of resistive load on an ACR01B1D board
fn mains_cycle(board: &BoardConfig, amps: f32) -> SampleBuffer<Vec<i16>> {
    let voltage_amplitude = 230.0 * core::f32::consts::SQRT_2 / board.voltage_multiplier;
    let current_amplitude = amps * core::f32::consts::SQRT_2 / board.current_multiplier;

    let raw = (0..100)
        .flat_map(|i| {
            let angle = 2.0 * core::f32::consts::PI * i as f32 / 100.0;
            let voltage = board.voltage_zero as f32 + voltage_amplitude * angle.sin();
            let current = board.current_zero as f32 + current_amplitude * angle.sin();
            [voltage.round() as i16, current.round() as i16]
        })
        .collect();
    SampleBuffer::interleaved(raw, 2, 0, 1, 200, 20_000)
}

fn main() {
    println!("FuseGuard Mains Simulation");
    println!("==========================\n");

    let board = BoardConfig::default();
    let mut clock = FixedTicks::new(0);
    let mut sampler = match PowerSampler::new(
        &board,
        &SoftFuseConfig::default(),
        &SamplingConfig::default(),
        &clock,
    ) {
        Ok(sampler) => sampler,
        Err(e) => {
            println!("configuration rejected: {}", e);
            return;
        }
    };

    let mut adc = SimulatedAdc::default();
    let mut store = MemoryStore::normal(SwitchState::relay());
    let mut print_event = |event: PowerEvent| match event {
        PowerEvent::PowerUsage { power_mw, apparent_power_mw } => {
            println!("  power {:>8} mW, apparent {:>8} mW", power_mw, apparent_power_mw)
        }
        PowerEvent::AccumulatedEnergy { .. } | PowerEvent::SamplesStart | PowerEvent::SamplesEnd { .. } => {}
        fault => println!("  !! {}", fault.name()),
    };

    if let Err(e) = sampler.init_adc(&mut adc) {
        println!("ADC setup failed: {}", e);
        return;
    }
    sampler.start_sampling(&mut adc, &store, &mut print_event);

    let mut queue: BufferQueue<Vec<i16>, 3> = BufferQueue::new();
    let (mut producer, mut consumer) = delivery::split(&mut queue);

    // 2 s at 5 A, then the load steps up to 20 A
    for cycle in 0..200 {
        let amps = if cycle < 100 { 5.0 } else { 20.0 };
        if cycle % 50 == 0 {
            println!("cycle {} ({} A):", cycle, amps);
        }

        clock.advance_ms(20);
        if delivery::deliver_or_report(&mut producer, mains_cycle(&board, amps)).is_err() {
            continue;
        }

        let quiet = cycle % 50 != 0;
        let result = if quiet {
            sampler.run_pending(&mut consumer, &mut adc, &mut store, &mut |event: PowerEvent| {
                if event.is_fault() {
                    println!("  !! {} at cycle {}", event.name(), cycle);
                }
            }, &clock)
        } else {
            sampler.run_pending(&mut consumer, &mut adc, &mut store, &mut print_event, &clock)
        };

        if let Err(nb::Error::Other(e)) = result {
            println!("  buffer skipped: {}", e);
        }
    }

    println!("\nBuffers released to the ADC: {}", adc.released);
    println!("Energy: {:.1} J", sampler.energy_uj() as f64 / 1_000_000.0);
    println!("Fault flags: {:?}", store.errors);
}

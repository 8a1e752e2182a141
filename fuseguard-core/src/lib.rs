//! Power sampling and soft-fuse monitor for FuseGuard smart switches
//!
//! Turns interleaved voltage/current ADC buffers into RMS readings, real and
//! apparent power and an energy counter, and trips protective faults when the
//! load current misbehaves.
//!
//! Key constraints:
//! - One buffer per mains cycle (20 ms at 50 Hz), processed well before the
//!   next one arrives
//! - No heap allocation per buffer
//! - Protective faults are raised at most once until acknowledged
//!
//! ```no_run
//! use fuseguard_core::{BoardConfig, PowerSampler, SamplingConfig, SampleBuffer, SoftFuseConfig};
//! use fuseguard_core::store::MemoryStore;
//! use fuseguard_core::safety::SwitchState;
//! use fuseguard_core::events::PowerEvent;
//! use fuseguard_core::time::FixedTicks;
//!
//! let clock = FixedTicks::new(0);
//! let mut sampler = PowerSampler::new(
//!     &BoardConfig::default(),
//!     &SoftFuseConfig::default(),
//!     &SamplingConfig::default(),
//!     &clock,
//! ).unwrap();
//!
//! let mut store = MemoryStore::normal(SwitchState::relay());
//! let raw = [0i16; 200];
//! let buffer = SampleBuffer::interleaved(&raw[..], 2, 0, 1, 200, 20_000);
//!
//! match sampler.process_buffer(&buffer, &mut store, &mut |_: PowerEvent| {}, &clock) {
//!     Ok(reading) => { let _ = reading.power_mw; }
//!     Err(e) => { let _ = e.is_recoverable(); } // skip this buffer
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

#[macro_use]
mod logging;

pub mod adc;
pub mod buffer;
pub mod calibration;
pub mod channel;
pub mod config;
pub mod constants;
pub mod delivery;
pub mod energy;
pub mod errors;
pub mod events;
pub mod filter;
pub mod median;
pub mod metrics;
pub mod safety;
pub mod samples;
pub mod sampler;
pub mod smoother;
pub mod store;
pub mod time;

// Public API
pub use adc::{AdcDriver, SampleBuffer};
pub use config::{BoardConfig, BoardModel, SamplingConfig, SoftFuseConfig};
pub use errors::{SamplingError, SamplingResult};
pub use events::{Command, EventSink, PowerEvent};
pub use metrics::{CycleMetrics, CycleMetricsCalculator};
pub use sampler::{PowerReading, PowerSampler};
pub use store::{OperationMode, StateStore};
pub use time::{TickSource, Ticks};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Buffer Hand-Over from the ADC Interrupt to the Processing Task
//!
//! ## Overview
//!
//! The ADC finishes a buffer in interrupt context; the pipeline runs in a
//! task. A single-producer single-consumer queue sits in between:
//!
//! ```text
//! ADC done IRQ                          processing task
//!      │                                       │
//!  BufferProducer::deliver ──▶ [ spsc ] ──▶ BufferConsumer::poll
//!                                              │
//!                                   PowerSampler::process_buffer
//!                                              │
//!                                   AdcDriver::release_buffer
//! ```
//!
//! Buffers are moved through the queue, never copied. With double buffering
//! a queue of capacity 2 (`N = 3`) never fills as long as the task releases
//! each buffer before the ADC wraps around to it.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::adc::SampleBuffer;
use crate::errors::{SamplingError, SamplingResult};

/// Backing storage of the delivery queue; holds `N - 1` buffers
pub type BufferQueue<B, const N: usize> = Queue<SampleBuffer<B>, N>;

/// Split a queue into its interrupt side and task side
pub fn split<B, const N: usize>(
    queue: &mut BufferQueue<B, N>,
) -> (BufferProducer<'_, B, N>, BufferConsumer<'_, B, N>) {
    let (producer, consumer) = queue.split();
    (BufferProducer { inner: producer, dropped: 0 }, BufferConsumer { inner: consumer })
}

/// A buffer the queue had no room for, handed back to the caller
#[derive(Debug)]
pub struct Undelivered<B>(pub SampleBuffer<B>);

impl<B> Undelivered<B> {
    /// Error describing the failure
    pub fn error(&self) -> SamplingError {
        SamplingError::QueueFull
    }

    /// The buffer, for releasing it back to the ADC
    pub fn into_buffer(self) -> SampleBuffer<B> {
        self.0
    }
}

/// Interrupt side of the queue
pub struct BufferProducer<'a, B, const N: usize> {
    inner: Producer<'a, SampleBuffer<B>, N>,
    dropped: u32,
}

impl<'a, B, const N: usize> BufferProducer<'a, B, N> {
    /// Queue a finished buffer; returns it when the queue is full
    pub fn deliver(&mut self, buffer: SampleBuffer<B>) -> Result<(), Undelivered<B>> {
        self.inner.enqueue(buffer).map_err(|buffer| {
            self.dropped = self.dropped.wrapping_add(1);
            Undelivered(buffer)
        })
    }

    /// Whether another buffer fits
    pub fn ready(&self) -> bool {
        self.inner.ready()
    }

    /// Buffers that could not be delivered so far
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// Task side of the queue
pub struct BufferConsumer<'a, B, const N: usize> {
    inner: Consumer<'a, SampleBuffer<B>, N>,
}

impl<'a, B, const N: usize> BufferConsumer<'a, B, N> {
    /// Take the oldest buffer, `WouldBlock` when none is waiting
    pub fn poll(&mut self) -> nb::Result<SampleBuffer<B>, SamplingError> {
        self.inner.dequeue().ok_or(nb::Error::WouldBlock)
    }

    /// Number of buffers waiting
    pub fn pending(&self) -> usize {
        self.inner.len()
    }
}

/// Deliver or report, for drivers that log instead of handling the rejection
pub fn deliver_or_report<B, const N: usize>(
    producer: &mut BufferProducer<'_, B, N>,
    buffer: SampleBuffer<B>,
) -> SamplingResult<()> {
    producer.deliver(buffer).map_err(|undelivered| {
        log_warn!("adc buffer dropped, queue full");
        undelivered.error()
    })
}

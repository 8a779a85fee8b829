//! Poll-tick sampling into a time-windowed buffer.

use crate::io::Clock;
use crate::sensor::{CounterHandle, PulseCounter, PulseInput};
use crate::stats::Sample;
use std::sync::Arc;
use std::time::Duration;

/// Anything the sampler can take a pulse delta from
pub trait PulseSource {
    /// Pulses since the previous call
    fn read_and_reset(&self) -> u64;
}

impl PulseSource for PulseCounter {
    fn read_and_reset(&self) -> u64 {
        PulseCounter::read_and_reset(self)
    }
}

impl PulseSource for Arc<PulseCounter> {
    fn read_and_reset(&self) -> u64 {
        PulseCounter::read_and_reset(self)
    }
}

impl<P: PulseInput> PulseSource for CounterHandle<P> {
    fn read_and_reset(&self) -> u64 {
        CounterHandle::read_and_reset(self)
    }
}

/// Seconds between the first and last sample of a window
pub fn window_secs(samples: &[Sample]) -> f64 {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.timestamp - first.timestamp,
        _ => 0.0,
    }
}

/// Buffers one sample per poll tick until the buffer spans the write interval
///
/// The window closes after a fixed number of poll intervals, so a wall clock
/// stepping backwards cannot hold a write back. Sample timestamps still come
/// from the clock and drive the rate math.
pub struct Sampler<C: Clock> {
    clock: C,
    buffer: Vec<Sample>,
    intervals_per_window: usize,
}

impl<C: Clock> Sampler<C> {
    pub fn new(clock: C, poll_interval: Duration, write_interval: Duration) -> Self {
        let poll_nanos = poll_interval.as_nanos().max(1);
        let intervals = write_interval.as_nanos().div_ceil(poll_nanos);
        Sampler {
            clock,
            buffer: Vec::new(),
            intervals_per_window: usize::try_from(intervals).unwrap_or(usize::MAX),
        }
    }

    /// Stamp `delta` with the current time and buffer it
    pub fn record(&mut self, delta: u64) -> Sample {
        let sample = Sample::new(self.clock.now().as_secs_f64(), delta);
        self.buffer.push(sample);
        sample
    }

    /// Poll intervals a window spans; it holds one more sample than this
    pub fn intervals_per_window(&self) -> usize {
        self.intervals_per_window
    }

    pub fn is_due(&self) -> bool {
        self.buffer.len() > self.intervals_per_window
    }

    /// Hand over the whole buffer once it spans the write interval,
    /// leaving an empty one behind
    pub fn take_window(&mut self) -> Option<Vec<Sample>> {
        if self.is_due() {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    pub fn buffered(&self) -> &[Sample] {
        &self.buffer
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

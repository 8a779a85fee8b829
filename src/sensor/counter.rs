use super::{PinConfig, PinGuard, PulseInput, SensorError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pulse count shared between the edge thread and the poll loop
///
/// The edge side only does atomic operations: a debounce check on the time
/// of the last accepted edge, then an increment. The poll side takes the
/// pending count with a swap.
pub struct PulseCounter {
    pending: AtomicU64,
    total: AtomicU64,
    rejected: AtomicU64,
    /// Microseconds since `epoch` of the last accepted edge, plus one.
    /// Zero means no edge yet.
    last_edge_us: AtomicU64,
    debounce_us: u64,
    epoch: Instant,
}

impl PulseCounter {
    pub fn new(debounce: Duration) -> Self {
        PulseCounter {
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            last_edge_us: AtomicU64::new(0),
            debounce_us: u64::try_from(debounce.as_micros()).unwrap_or(u64::MAX),
            epoch: Instant::now(),
        }
    }

    /// Count an edge seen at `at` unless it falls inside the debounce window
    /// of the previous accepted edge. Returns whether it was counted.
    pub fn record_edge(&self, at: Instant) -> bool {
        let since_epoch = at.saturating_duration_since(self.epoch).as_micros();
        let now_us = u64::try_from(since_epoch).unwrap_or(u64::MAX - 1) + 1;
        let debounce_us = self.debounce_us;

        let accepted = self
            .last_edge_us
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                (last == 0 || now_us.saturating_sub(last) >= debounce_us).then_some(now_us)
            })
            .is_ok();

        if accepted {
            self.pending.fetch_add(1, Ordering::SeqCst);
            self.total.fetch_add(1, Ordering::SeqCst);
        } else {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
        accepted
    }

    /// Take the pulses counted since the previous call
    pub fn read_and_reset(&self) -> u64 {
        self.pending.swap(0, Ordering::SeqCst)
    }

    /// Pulses accepted since creation
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Edges dropped by the debounce window since creation
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }
}

/// A configured input wired to a [`PulseCounter`]
///
/// Lifecycle: [`init`](Self::init) claims the pin and registers the edge
/// callback, [`read_and_reset`](Self::read_and_reset) is called once per
/// poll, and [`teardown`](Self::teardown) (or drop) releases the pin.
pub struct CounterHandle<P: PulseInput> {
    counter: Arc<PulseCounter>,
    guard: PinGuard<P>,
}

impl<P: PulseInput> CounterHandle<P> {
    pub fn init(input: P, config: &PinConfig) -> Result<Self, SensorError> {
        let mut guard = PinGuard::acquire(input, config)?;
        let counter = Arc::new(PulseCounter::new(config.debounce));

        let edge_counter = counter.clone();
        guard.register_callback(Box::new(move |pin| {
            if edge_counter.record_edge(Instant::now()) {
                tracing::trace!(pin, total = edge_counter.total(), "Pulse detected");
            }
        }))?;

        Ok(CounterHandle { counter, guard })
    }

    pub fn read_and_reset(&self) -> u64 {
        self.counter.read_and_reset()
    }

    pub fn counter(&self) -> &Arc<PulseCounter> {
        &self.counter
    }

    pub fn input(&self) -> &P {
        self.guard.input()
    }

    /// Release the pin. Returns the lifetime pulse total
    pub fn teardown(self) -> u64 {
        let total = self.counter.total();
        tracing::info!(
            pin = self.guard.pin(),
            total,
            debounced = self.counter.rejected(),
            "Pulse counter stopped"
        );
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SimulatedInput;

    #[test]
    fn test_debounce_window() {
        let counter = PulseCounter::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert!(counter.record_edge(t0));
        assert!(!counter.record_edge(t0 + Duration::from_millis(20)));
        assert!(!counter.record_edge(t0 + Duration::from_millis(99)));
        assert!(counter.record_edge(t0 + Duration::from_millis(100)));
        assert!(counter.record_edge(t0 + Duration::from_millis(250)));

        assert_eq!(counter.read_and_reset(), 3);
        assert_eq!(counter.rejected(), 2);
    }

    #[test]
    fn test_rejected_edges_do_not_extend_window() {
        let counter = PulseCounter::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert!(counter.record_edge(t0));
        assert!(!counter.record_edge(t0 + Duration::from_millis(90)));
        // Measured from the accepted edge, not the rejected one.
        assert!(counter.record_edge(t0 + Duration::from_millis(110)));
    }

    #[test]
    fn test_read_and_reset() {
        let counter = PulseCounter::new(Duration::ZERO);
        let t0 = Instant::now();
        for i in 0..5 {
            counter.record_edge(t0 + Duration::from_millis(i));
        }

        assert_eq!(counter.read_and_reset(), 5);
        assert_eq!(counter.read_and_reset(), 0);
        assert_eq!(counter.total(), 5);
    }

    #[test]
    fn test_concurrent_increments_not_lost() {
        let counter = Arc::new(PulseCounter::new(Duration::ZERO));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.record_edge(Instant::now());
                    }
                })
            })
            .collect();

        let mut taken = 0;
        for handle in handles {
            taken += counter.read_and_reset();
            handle.join().unwrap();
        }
        taken += counter.read_and_reset();

        assert_eq!(taken, 4000);
        assert_eq!(counter.total(), 4000);
    }

    #[test]
    fn test_handle_counts_simulated_edges() {
        let input = SimulatedInput::new();
        let trigger = input.trigger();
        let handle = CounterHandle::init(input, &PinConfig::rising(4, Duration::ZERO)).unwrap();

        trigger.fire_n(3);
        assert_eq!(handle.read_and_reset(), 3);
        trigger.fire();
        assert_eq!(handle.read_and_reset(), 1);

        assert_eq!(handle.teardown(), 4);
        assert!(trigger.is_released());
    }

    #[test]
    fn test_handle_applies_debounce() {
        let input = SimulatedInput::new();
        let trigger = input.trigger();
        let handle =
            CounterHandle::init(input, &PinConfig::rising(4, Duration::from_secs(60))).unwrap();

        trigger.fire_n(10);
        assert_eq!(handle.read_and_reset(), 1);
        assert_eq!(handle.counter().rejected(), 9);
    }
}

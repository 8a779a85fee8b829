//! In-process pulse input.
//!
//! Edges are injected through a [`SimulatedTrigger`], or generated at a
//! fixed cadence by a background thread for hardware-free runs.

use super::{EdgeCallback, PinConfig, PulseInput, SensorError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Default)]
struct Shared {
    callback: Mutex<Option<EdgeCallback>>,
    pin: AtomicU8,
    configured: AtomicBool,
    released: AtomicBool,
}

impl Shared {
    fn fire(&self) -> bool {
        let callback = self.callback.lock();
        match callback.as_ref() {
            Some(callback) => {
                callback(self.pin.load(Ordering::SeqCst));
                true
            }
            None => false,
        }
    }
}

/// Handle for injecting edges into a [`SimulatedInput`]
#[derive(Clone)]
pub struct SimulatedTrigger {
    shared: Arc<Shared>,
}

impl SimulatedTrigger {
    /// Deliver one edge. Returns false when no callback is registered
    pub fn fire(&self) -> bool {
        self.shared.fire()
    }

    /// Deliver `count` edges back to back
    pub fn fire_n(&self, count: usize) -> usize {
        (0..count).filter(|_| self.fire()).count()
    }

    pub fn is_configured(&self) -> bool {
        self.shared.configured.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }
}

/// Simulated sensor input
pub struct SimulatedInput {
    shared: Arc<Shared>,
    failure: Option<String>,
    cadence: Option<Duration>,
    generator: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
}

impl Default for SimulatedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedInput {
    pub fn new() -> Self {
        SimulatedInput {
            shared: Arc::new(Shared::default()),
            failure: None,
            cadence: None,
            generator: None,
        }
    }

    /// An input whose `configure` always fails
    pub fn failing(reason: impl Into<String>) -> Self {
        SimulatedInput {
            failure: Some(reason.into()),
            ..Self::new()
        }
    }

    /// Generate edges at `rpm` once a callback is registered
    pub fn with_cadence(mut self, rpm: f64) -> Self {
        self.cadence = (rpm.is_finite() && rpm > 0.0).then(|| Duration::from_secs_f64(60.0 / rpm));
        self
    }

    pub fn trigger(&self) -> SimulatedTrigger {
        SimulatedTrigger {
            shared: self.shared.clone(),
        }
    }

    fn spawn_generator(&mut self, period: Duration) -> Result<(), SensorError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = self.shared.clone();
        let pin = shared.pin.load(Ordering::SeqCst);

        let handle = std::thread::Builder::new()
            .name(format!("sim-gpio-{}", pin))
            .spawn(move || {
                // Runs until the sender is dropped in release().
                while let Err(mpsc::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(period) {
                    shared.fire();
                }
            })
            .map_err(|e| SensorError::Unavailable(pin, e.to_string()))?;

        self.generator = Some((stop_tx, handle));
        Ok(())
    }
}

impl PulseInput for SimulatedInput {
    fn configure(&mut self, config: &PinConfig) -> Result<(), SensorError> {
        if let Some(reason) = &self.failure {
            return Err(SensorError::Unavailable(config.pin, reason.clone()));
        }
        self.shared.pin.store(config.pin, Ordering::SeqCst);
        self.shared.configured.store(true, Ordering::SeqCst);
        self.shared.released.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn register_callback(&mut self, callback: EdgeCallback) -> Result<(), SensorError> {
        let pin = self.shared.pin.load(Ordering::SeqCst);
        if !self.shared.configured.load(Ordering::SeqCst) {
            return Err(SensorError::NotConfigured(pin));
        }
        {
            let mut slot = self.shared.callback.lock();
            if slot.is_some() {
                return Err(SensorError::CallbackAlreadyRegistered(pin));
            }
            *slot = Some(callback);
        }
        if let Some(period) = self.cadence {
            self.spawn_generator(period)?;
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Some((stop_tx, handle)) = self.generator.take() {
            drop(stop_tx);
            let _ = handle.join();
        }
        self.shared.callback.lock().take();
        self.shared.configured.store(false, Ordering::SeqCst);
        self.shared.released.store(true, Ordering::SeqCst);
    }
}

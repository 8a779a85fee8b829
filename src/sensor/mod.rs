//! Pulse Input Abstraction
//!
//! The sensor is a digital input that goes high once per wheel rotation.
//! [`PulseInput`] hides where edges come from (a Linux GPIO line, or an
//! in-process simulation) so the counter and sampler are the same in
//! production and in tests.
//!
//! Inputs are always held through a [`PinGuard`], which deregisters the
//! callback and releases the pin on drop, whichever way the process exits.

mod counter;
pub mod simulation;
pub mod sysfs;

pub use counter::{CounterHandle, PulseCounter};
pub use simulation::{SimulatedInput, SimulatedTrigger};
pub use sysfs::SysfsInput;

use std::path::PathBuf;
use std::time::Duration;

/// How the sensor pin is set up.
///
/// The line is always an input with the pull-down resistor, counting rising
/// edges; only the pin and the debounce window vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    pub pin: u8,
    /// Applied in software by [`PulseCounter`]
    pub debounce: Duration,
}

impl PinConfig {
    pub fn rising(pin: u8, debounce: Duration) -> Self {
        PinConfig { pin, debounce }
    }
}

/// Called from the input's edge thread with the pin number
pub type EdgeCallback = Box<dyn Fn(u8) + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("gpio {pin}: failed to access {}: {source}", path.display())]
    Io {
        pin: u8,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gpio {0}: input used before configure")]
    NotConfigured(u8),

    #[error("gpio {0}: a callback is already registered")]
    CallbackAlreadyRegistered(u8),

    #[error("gpio {0}: {1}")]
    Unavailable(u8, String),
}

/// A source of edge events on one pin
pub trait PulseInput: Send {
    /// Claim the pin and set direction, bias and edge detection
    fn configure(&mut self, config: &PinConfig) -> Result<(), SensorError>;

    /// Start delivering qualifying edges to `callback`
    fn register_callback(&mut self, callback: EdgeCallback) -> Result<(), SensorError>;

    /// Stop delivering edges and give the pin back. Must be idempotent
    fn release(&mut self);
}

/// Owns a configured input and releases it on drop
pub struct PinGuard<P: PulseInput> {
    input: P,
    pin: u8,
}

impl<P: PulseInput> PinGuard<P> {
    /// Configure `input`; on failure the input is released before returning
    pub fn acquire(mut input: P, config: &PinConfig) -> Result<Self, SensorError> {
        if let Err(e) = input.configure(config) {
            input.release();
            return Err(e);
        }
        tracing::info!(pin = config.pin, "GPIO input configured for rising edges");
        Ok(PinGuard {
            input,
            pin: config.pin,
        })
    }

    pub fn register_callback(&mut self, callback: EdgeCallback) -> Result<(), SensorError> {
        self.input.register_callback(callback)
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn input(&self) -> &P {
        &self.input
    }
}

impl<P: PulseInput> Drop for PinGuard<P> {
    fn drop(&mut self) {
        self.input.release();
        tracing::info!(pin = self.pin, "GPIO input released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let input = SimulatedInput::new();
        let trigger = input.trigger();
        {
            let _guard = PinGuard::acquire(input, &PinConfig::rising(4, Duration::ZERO)).unwrap();
            assert!(trigger.is_configured());
            assert!(!trigger.is_released());
        }
        assert!(trigger.is_released());
    }

    #[test]
    fn test_guard_releases_when_configure_fails() {
        let input = SimulatedInput::failing("no such line");
        let trigger = input.trigger();

        let err = PinGuard::acquire(input, &PinConfig::rising(4, Duration::ZERO))
            .err()
            .unwrap();
        assert!(matches!(err, SensorError::Unavailable(4, _)));
        assert!(trigger.is_released());
    }
}

use crate::config::ConfigError;
use crate::sensor::SensorError;

/// Any failure that stops the counter before polling starts
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sensor(#[from] SensorError),
}

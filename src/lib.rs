pub mod config;
pub mod error;
pub mod io;
pub mod line;
pub mod monitor;
pub mod observability;
pub mod sampler;
pub mod sensor;
pub mod stats;

pub use config::{Config, ConfigError};
pub use error::Error;
pub use io::{Clock, ManualClock, SystemClock, Timestamp};
pub use line::{encode, LineEncoder, LineSink, MemorySink, StdoutSink};
pub use monitor::{CycleMonitor, TickOutcome};
pub use sampler::{PulseSource, Sampler};
pub use sensor::{CounterHandle, PinConfig, PinGuard, PulseCounter, PulseInput, SimulatedInput, SysfsInput};
pub use stats::{aggregate, convert_speed, Aggregation, Sample, SpeedUnit, StatsRecord};

//! Line Protocol Encoding
//!
//! One statistics record becomes one line:
//!
//! ```text
//! cycle_activity,poll_interval=5,cycles_per_cal=7,wheel_radius=5.6,speed_format=mph total_cycles=5i,max=3i,... 1700000000000000000
//! ```
//!
//! Integer fields carry the `i` suffix; floats are printed with a fixed
//! number of decimal places. The timestamp is the wall clock at encode time.

mod sink;

pub use sink::{LineSink, MemorySink, StdoutSink};

use crate::config::Config;
use crate::io::Timestamp;
use crate::stats::{FieldValue, StatsRecord};
use std::fmt::Write;

/// Encoder with the tag set fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEncoder {
    series: String,
    precision: usize,
}

impl LineEncoder {
    pub fn new(config: &Config) -> Self {
        let mut series = escape_measurement(&config.measurement);
        let _ = write!(
            series,
            ",poll_interval={},cycles_per_cal={}",
            config.poll_interval_secs, config.cycles_per_calorie
        );
        if config.calculate_distance {
            let _ = write!(
                series,
                ",wheel_radius={:?},speed_format={}",
                config.wheel_radius_cm, config.speed_format
            );
        }
        let extra = config.extra_tags.trim().trim_start_matches(',');
        if !extra.is_empty() {
            series.push(',');
            series.push_str(extra);
        }

        LineEncoder {
            series,
            precision: config.float_precision,
        }
    }

    /// Measurement plus tag set, the part before the first space
    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn encode(&self, record: &StatsRecord, at: Timestamp) -> String {
        let mut line = String::with_capacity(self.series.len() + 160);
        line.push_str(&self.series);

        let mut separator = ' ';
        for (name, value) in record.fields() {
            let Some(value) = value else { continue };
            match value {
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{}{}={}i", separator, name, v);
                }
                FieldValue::Float(v) if v.is_finite() => {
                    let _ = write!(line, "{}{}={:.*}", separator, name, self.precision, v);
                }
                FieldValue::Float(v) => {
                    tracing::debug!(field = name, value = v, "Skipping non-finite field");
                    continue;
                }
            }
            separator = ',';
        }

        let _ = write!(line, " {}", at.as_nanos());
        line
    }
}

/// One-shot form of [`LineEncoder::encode`]
pub fn encode(record: &StatsRecord, config: &Config, at: Timestamp) -> String {
    LineEncoder::new(config).encode(record, at)
}

fn escape_measurement(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if c == ',' || c == ' ' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

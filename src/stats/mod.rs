//! Cycle Statistics
//!
//! Turns a window of buffered pulse samples into one statistics record:
//!
//! - **Counts**: total, per-sample max and min, per-sample mean
//! - **Rates**: pulses per second, cadence (RPM), calories
//! - **Distance** (optional): distance covered, mean speed over the window
//!   and the peak per-sample speed, both in the configured unit

mod aggregate;
pub mod speed;

pub use aggregate::aggregate;
pub use speed::{circumference_cm, convert_speed, SpeedUnit, UnknownSpeedUnit};

/// One poll tick: pulses counted since the previous tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Wall-clock seconds since the Unix epoch
    pub timestamp: f64,
    pub delta: u64,
}

impl Sample {
    pub fn new(timestamp: f64, delta: u64) -> Self {
        Sample { timestamp, delta }
    }
}

/// A single field value as it goes on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(u64),
    Float(f64),
}

/// Distance-derived fields, present only when distance calculation is on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceStats {
    pub distance_cm: f64,
    /// Mean speed over the whole window
    pub speed: f64,
    /// Highest single-sample speed in the window
    pub max_speed: f64,
}

/// Statistics for one aggregation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsRecord {
    pub total_cycles: u64,
    pub max: u64,
    pub min: u64,
    pub mean: f64,
    pub rate: f64,
    pub calories: f64,
    pub rpm: f64,
    pub distance: Option<DistanceStats>,
}

/// Number of entries returned by [`StatsRecord::fields`]
pub const FIELD_COUNT: usize = 10;

impl StatsRecord {
    /// Fields in wire order; absent entries are skipped by the encoder
    pub fn fields(&self) -> [(&'static str, Option<FieldValue>); FIELD_COUNT] {
        let distance = self.distance.as_ref();
        [
            ("total_cycles", Some(FieldValue::Integer(self.total_cycles))),
            ("max", Some(FieldValue::Integer(self.max))),
            ("min", Some(FieldValue::Integer(self.min))),
            ("mean", Some(FieldValue::Float(self.mean))),
            ("rate", Some(FieldValue::Float(self.rate))),
            ("calories", Some(FieldValue::Float(self.calories))),
            ("rpm", Some(FieldValue::Float(self.rpm))),
            ("distance_cm", distance.map(|d| FieldValue::Float(d.distance_cm))),
            ("speed", distance.map(|d| FieldValue::Float(d.speed))),
            ("max_speed", distance.map(|d| FieldValue::Float(d.max_speed))),
        ]
    }
}

/// Outcome of aggregating one window
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Record(StatsRecord),
    /// No pulses in the window and idle windows are not written
    Suppressed,
}

impl Aggregation {
    pub fn record(&self) -> Option<&StatsRecord> {
        match self {
            Aggregation::Record(record) => Some(record),
            Aggregation::Suppressed => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Aggregation::Suppressed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    #[error("cannot aggregate an empty sample window")]
    EmptyWindow,
}

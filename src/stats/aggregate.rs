//! Window aggregation: counts, rates, calories and optional distance.

use super::speed::circumference_cm;
use super::{Aggregation, DistanceStats, Sample, StatsError, StatsRecord};
use crate::config::Config;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Aggregate a window of samples into one statistics record.
///
/// The window runs from the first to the last sample. A zero-length window
/// (one sample, or identical timestamps) reports `rate`, `rpm` and `speed`
/// as `0.0`. When the window holds no pulses and `write_on_no_change` is
/// off, the result is [`Aggregation::Suppressed`].
pub fn aggregate(samples: &[Sample], config: &Config) -> Result<Aggregation, StatsError> {
    let (first, last) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(StatsError::EmptyWindow),
    };

    let time_period = last.timestamp - first.timestamp;
    let total_cycles: u64 = samples.iter().map(|s| s.delta).sum();
    let max = samples.iter().map(|s| s.delta).max().unwrap_or(0);
    let min = samples.iter().map(|s| s.delta).min().unwrap_or(0);

    if total_cycles == 0 && !config.write_on_no_change {
        tracing::debug!(samples = samples.len(), "No activity in window, suppressing");
        return Ok(Aggregation::Suppressed);
    }

    let total = total_cycles as f64;
    let calories = if config.cycles_per_calorie == 0 {
        0.0
    } else {
        total / f64::from(config.cycles_per_calorie)
    };

    let distance = config
        .calculate_distance
        .then(|| distance_stats(samples, total, time_period, config));

    let record = StatsRecord {
        total_cycles,
        max,
        min,
        mean: total / samples.len() as f64,
        rate: per_second(total, time_period),
        calories,
        rpm: per_second(total * SECONDS_PER_MINUTE, time_period),
        distance,
    };

    tracing::trace!(
        samples = samples.len(),
        time_period,
        total_cycles,
        rpm = record.rpm,
        "Aggregated window"
    );

    Ok(Aggregation::Record(record))
}

fn distance_stats(samples: &[Sample], total: f64, time_period: f64, config: &Config) -> DistanceStats {
    let circumference = circumference_cm(config.wheel_radius_cm);
    let distance_cm = circumference * total;
    let mean_cm_per_sec = per_second(distance_cm, time_period);

    // Peak speed is per poll tick, not per window.
    let poll_interval = config.poll_interval_secs as f64;
    let peak_cm_per_sec = samples
        .iter()
        .map(|s| per_second(circumference * s.delta as f64, poll_interval))
        .fold(0.0, f64::max);

    let unit = config.speed_format;
    DistanceStats {
        distance_cm,
        speed: unit.convert(mean_cm_per_sec),
        max_speed: unit.convert(peak_cm_per_sec),
    }
}

#[inline]
fn per_second(amount: f64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        amount / seconds
    } else {
        0.0
    }
}

//! Span helpers for the poll loop.

use tracing::{span, Level, Span};

/// Span for one poll tick
#[inline]
pub fn poll_span(tick: u64) -> Span {
    span!(Level::TRACE, "counter.poll", tick = tick)
}

/// Span for aggregating one window
#[inline]
pub fn aggregation_span(samples: usize, window_secs: f64) -> Span {
    span!(
        Level::DEBUG,
        "counter.aggregate",
        samples = samples,
        window_secs = window_secs
    )
}

/// Span for emitting one line
#[inline]
pub fn emit_span(measurement: &str) -> Span {
    span!(Level::DEBUG, "counter.emit", measurement = %measurement)
}

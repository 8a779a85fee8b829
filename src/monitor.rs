//! The poll loop: sample, aggregate, encode, emit.

use crate::config::Config;
use crate::io::Clock;
use crate::line::{LineEncoder, LineSink};
use crate::observability::spans;
use crate::sampler::{window_secs, PulseSource, Sampler};
use crate::stats::{aggregate, Aggregation, Sample};
use std::future::Future;
use tokio::time::MissedTickBehavior;

/// What one poll tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sample buffered, window not complete yet
    Buffered,
    /// Window aggregated and this line written
    Emitted(String),
    /// Window had no pulses and idle windows are not written
    Suppressed,
    /// Window aggregated but the sink rejected the line; it is dropped
    WriteFailed,
}

/// Ties a pulse source to the aggregation and output pipeline
pub struct CycleMonitor<S, C, K>
where
    S: PulseSource,
    C: Clock,
    K: LineSink,
{
    source: S,
    sampler: Sampler<C>,
    encoder: LineEncoder,
    sink: K,
    config: Config,
    ticks: u64,
}

impl<S, C, K> CycleMonitor<S, C, K>
where
    S: PulseSource,
    C: Clock,
    K: LineSink,
{
    pub fn new(source: S, clock: C, sink: K, config: Config) -> Self {
        CycleMonitor {
            source,
            sampler: Sampler::new(clock, config.poll_interval(), config.write_interval()),
            encoder: LineEncoder::new(&config),
            sink,
            config,
            ticks: 0,
        }
    }

    /// Read the counter once and, if the window is complete, emit it
    pub fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;
        let _span = spans::poll_span(self.ticks).entered();

        let delta = self.source.read_and_reset();
        self.sampler.record(delta);

        match self.sampler.take_window() {
            Some(window) => self.process_window(&window),
            None => TickOutcome::Buffered,
        }
    }

    fn process_window(&mut self, window: &[Sample]) -> TickOutcome {
        let _span = spans::aggregation_span(window.len(), window_secs(window)).entered();

        match aggregate(window, &self.config) {
            Ok(Aggregation::Record(record)) => {
                let _emit = spans::emit_span(&self.config.measurement).entered();
                let line = self.encoder.encode(&record, self.sampler.clock().now());
                match self.sink.write_line(&line) {
                    Ok(()) => {
                        tracing::debug!(total_cycles = record.total_cycles, "Metric line written");
                        TickOutcome::Emitted(line)
                    }
                    Err(e) => {
                        tracing::error!("Failed to write metric line: {}", e);
                        TickOutcome::WriteFailed
                    }
                }
            }
            Ok(Aggregation::Suppressed) => TickOutcome::Suppressed,
            Err(e) => {
                tracing::warn!("Skipping window: {}", e);
                TickOutcome::Buffered
            }
        }
    }

    /// Poll every `poll_interval` until `shutdown` resolves, then hand the
    /// source back so the caller can tear it down.
    pub async fn run_until<F>(mut self, shutdown: F) -> S
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            write_interval_secs = self.config.write_interval_secs,
            samples_per_window = self.sampler.intervals_per_window() + 1,
            "Polling pulse counter"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = &mut shutdown => {
                    tracing::info!(
                        ticks = self.ticks,
                        buffered = self.sampler.buffered().len(),
                        "Shutdown requested, discarding partial window"
                    );
                    break;
                }
            }
        }

        self.source
    }

    pub fn buffered(&self) -> &[Sample] {
        self.sampler.buffered()
    }
}

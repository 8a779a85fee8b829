//! Line Sinks
//!
//! Where encoded lines go:
//! - Production: standard output, flushed per line for the log shipper
//! - Testing: in-memory capture for verification

use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Destination for encoded lines. One call per line, no retries
pub trait LineSink: Send {
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;
}

/// Writes each line to stdout and flushes immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        write_flushed(&mut std::io::stdout().lock(), line)
    }
}

/// One line plus newline, flushed so a downstream pipe sees it at once
fn write_flushed<W: Write>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}

#[derive(Default)]
struct Captured {
    lines: Mutex<Vec<String>>,
    attempts: AtomicU64,
    failing: AtomicBool,
}

/// In-memory sink; clones share the captured lines
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Captured>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured lines
    pub fn lines(&self) -> Vec<String> {
        self.inner.lines.lock().clone()
    }

    /// Remove and return captured lines
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.lines.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write calls made, including failed ones
    pub fn attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail with `BrokenPipe`
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }
}

impl LineSink for MemorySink {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "memory sink set to fail",
            ));
        }
        self.inner.lines.lock().push(line.to_string());
        Ok(())
    }
}

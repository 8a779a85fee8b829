//! Linux sysfs GPIO input (`/sys/class/gpio`).
//!
//! Exports the pin if needed, sets it as an input and watches the value
//! file from a dedicated thread. Edge qualification happens in that thread;
//! debounce is left to [`PulseCounter`](super::PulseCounter).
//!
//! The watcher samples the line every [`DEFAULT_POLL_PERIOD`] rather than
//! blocking on the kernel's `POLLPRI` edge notification. A pulse shorter
//! than the poll period can be missed, and the loop keeps one core lightly
//! busy. A reed switch on a bike wheel stays closed for tens of
//! milliseconds, well above the period. The value file is opened once and
//! re-read in place, so a sample costs a seek and one small read with no
//! allocation.

use super::{EdgeCallback, PinConfig, PulseInput, SensorError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// How often the watcher thread samples the line
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(1);

/// How long to wait for udev to create `gpioN/` after an export
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(2);

struct Watcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct SysfsInput {
    root: PathBuf,
    pin: u8,
    configured: bool,
    exported_by_us: bool,
    poll_period: Duration,
    export_timeout: Duration,
    watcher: Option<Watcher>,
}

impl Default for SysfsInput {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsInput {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_SYSFS_ROOT)
    }

    /// Use a different sysfs tree (tests, chroots)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        SysfsInput {
            root: root.into(),
            pin: 0,
            configured: false,
            exported_by_us: false,
            poll_period: DEFAULT_POLL_PERIOD,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
            watcher: None,
        }
    }

    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn write_attr(&self, path: &Path, value: &str) -> Result<(), SensorError> {
        std::fs::write(path, value).map_err(|source| SensorError::Io {
            pin: self.pin,
            path: path.to_path_buf(),
            source,
        })
    }

    fn export(&mut self) -> Result<(), SensorError> {
        let dir = self.pin_dir();
        if dir.exists() {
            return Ok(());
        }

        self.write_attr(&self.root.join("export"), &self.pin.to_string())?;
        self.exported_by_us = true;

        let deadline = Instant::now() + self.export_timeout;
        while !dir.exists() {
            if Instant::now() >= deadline {
                return Err(SensorError::Unavailable(
                    self.pin,
                    format!("{} did not appear after export", dir.display()),
                ));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }
}

#[inline]
fn is_rising(previous: bool, current: bool) -> bool {
    !previous && current
}

/// Re-read the value file from the start into `buf`
fn read_value(file: &mut File, buf: &mut [u8; 4]) -> std::io::Result<Option<bool>> {
    file.seek(SeekFrom::Start(0))?;
    let n = file.read(buf)?;
    Ok(parse_level(&buf[..n]))
}

fn parse_level(raw: &[u8]) -> Option<bool> {
    match raw.first() {
        Some(b'1') => Some(true),
        Some(b'0') => Some(false),
        _ => None,
    }
}

impl PulseInput for SysfsInput {
    fn configure(&mut self, config: &PinConfig) -> Result<(), SensorError> {
        self.pin = config.pin;

        self.export()?;
        let dir = self.pin_dir();
        self.write_attr(&dir.join("direction"), "in")?;
        self.write_attr(&dir.join("edge"), "rising")?;

        tracing::debug!(
            pin = config.pin,
            "sysfs cannot set the pull-down resistor; it must be set in the device tree"
        );

        self.configured = true;
        Ok(())
    }

    fn register_callback(&mut self, callback: EdgeCallback) -> Result<(), SensorError> {
        if !self.configured {
            return Err(SensorError::NotConfigured(self.pin));
        }
        if self.watcher.is_some() {
            return Err(SensorError::CallbackAlreadyRegistered(self.pin));
        }

        let value_path = self.pin_dir().join("value");
        let open_err = |source: std::io::Error| SensorError::Io {
            pin: self.pin,
            path: value_path.clone(),
            source,
        };
        let mut value = File::open(&value_path).map_err(open_err)?;
        let mut buf = [0u8; 4];
        let initial = read_value(&mut value, &mut buf).map_err(open_err)?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let pin = self.pin;
        let period = self.poll_period;

        let handle = std::thread::Builder::new()
            .name(format!("gpio-edge-{}", pin))
            .spawn(move || {
                let mut level = initial.unwrap_or(false);
                let mut read_failed = false;

                while !stop_flag.load(Ordering::Relaxed) {
                    match read_value(&mut value, &mut buf) {
                        Ok(sample) => {
                            read_failed = false;
                            // A torn read (empty file) keeps the previous level.
                            if let Some(current) = sample {
                                if is_rising(level, current) {
                                    callback(pin);
                                }
                                level = current;
                            }
                        }
                        Err(e) if !read_failed => {
                            tracing::warn!(pin, "Failed to read GPIO value: {}", e);
                            read_failed = true;
                        }
                        Err(_) => {}
                    }
                    std::thread::sleep(period);
                }
            })
            .map_err(|e| SensorError::Unavailable(pin, e.to_string()))?;

        self.watcher = Some(Watcher { stop, handle });
        Ok(())
    }

    fn release(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop.store(true, Ordering::Relaxed);
            let _ = watcher.handle.join();
        }
        if self.exported_by_us {
            let unexport = self.root.join("unexport");
            if let Err(e) = self.write_attr(&unexport, &self.pin.to_string()) {
                tracing::warn!("Failed to unexport GPIO: {}", e);
            }
            self.exported_by_us = false;
        }
        self.configured = false;
    }
}

//! Runtime Configuration
//!
//! Settings are read once at startup: built-in defaults, then an optional
//! TOML file, then environment variable overrides.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RPI_GPIO_NUM` | `4` | BCM pin the sensor is wired to |
//! | `CYCLES_PER_CALORIE` | `7` | Pulses per calorie burned |
//! | `CYCLES_POLL_INTERVAL` | `5` | Seconds between counter reads (>= 1) |
//! | `POLL_DEBOUNCE_MS` | `100` | Minimum ms between accepted pulses |
//! | `CYCLES_WRITE_INTERVAL` | `30` | Seconds of samples per output line |
//! | `CYCLES_WRITE_NOCHANGE` | `true` | Write lines for idle windows |
//! | `CALCULATE_DISTANCE` | `true` | Emit distance and speed fields |
//! | `WHEEL_RADIUS_CM` | `5.6` | Wheel radius used for distance |
//! | `SPEED_FORMAT` | `mph` | `mph`, `kph`, `cm/s`, `m/s` or `ft/s` |
//! | `INFLUXDB_MEASUREMENT` | `cycle_activity` | Measurement name |
//! | `INFLUXDB_EXTRA_TAGS` | `` | Raw tags appended to the tag set |
//! | `FLOAT_PRECISION` | `2` | Decimal places for float fields |

use crate::stats::SpeedUnit;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names
pub mod env {
    pub const GPIO_PIN: &str = "RPI_GPIO_NUM";
    pub const CYCLES_PER_CALORIE: &str = "CYCLES_PER_CALORIE";
    pub const POLL_INTERVAL: &str = "CYCLES_POLL_INTERVAL";
    pub const DEBOUNCE_MS: &str = "POLL_DEBOUNCE_MS";
    pub const WRITE_INTERVAL: &str = "CYCLES_WRITE_INTERVAL";
    pub const WRITE_NO_CHANGE: &str = "CYCLES_WRITE_NOCHANGE";
    pub const CALCULATE_DISTANCE: &str = "CALCULATE_DISTANCE";
    pub const WHEEL_RADIUS_CM: &str = "WHEEL_RADIUS_CM";
    pub const SPEED_FORMAT: &str = "SPEED_FORMAT";
    pub const MEASUREMENT: &str = "INFLUXDB_MEASUREMENT";
    pub const EXTRA_TAGS: &str = "INFLUXDB_EXTRA_TAGS";
    pub const FLOAT_PRECISION: &str = "FLOAT_PRECISION";
}

/// Largest accepted `FLOAT_PRECISION`; f64 carries no more than this
pub const MAX_FLOAT_PRECISION: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("poll interval must be at least 1 second, got {0}")]
    InvalidPollInterval(i64),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Pulse counter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// BCM GPIO pin the sensor is wired to
    pub gpio_pin: u8,
    /// Pulses per calorie; the calorie divisor
    pub cycles_per_calorie: u32,
    /// Seconds between counter reads. Must be at least 1
    pub poll_interval_secs: u64,
    /// Minimum milliseconds between two accepted pulses
    pub debounce_ms: u64,
    /// Seconds of buffered samples that trigger an aggregation
    pub write_interval_secs: u64,
    /// Write a line even when the window saw no pulses
    pub write_on_no_change: bool,
    /// Emit distance, speed and max speed fields
    pub calculate_distance: bool,
    /// Wheel radius for distance, in centimetres
    pub wheel_radius_cm: f64,
    /// Unit for speed fields. Unknown names fall back to cm/s
    #[serde(deserialize_with = "deserialize_speed_format")]
    pub speed_format: SpeedUnit,
    /// Line protocol measurement name
    pub measurement: String,
    /// Pre-formatted tags appended to every line (e.g. "host=bike,room=gym").
    /// Surrounding whitespace is trimmed and one leading comma is dropped,
    /// otherwise the text goes on the line as written
    pub extra_tags: String,
    /// Decimal places for float fields
    pub float_precision: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gpio_pin: 4,
            cycles_per_calorie: 7,
            poll_interval_secs: 5,
            debounce_ms: 100,
            write_interval_secs: 30,
            write_on_no_change: true,
            calculate_distance: true,
            wheel_radius_cm: 5.6,
            speed_format: SpeedUnit::Mph,
            measurement: "cycle_activity".to_string(),
            extra_tags: String::new(),
            float_precision: 2,
        }
    }
}

impl Config {
    /// Defaults overridden by an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Config::default().with_overrides(lookup)
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// Not validated: the environment may still correct a file value, so
    /// [`with_overrides`](Self::with_overrides) validates the merged result.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read a TOML config file, unvalidated like [`from_toml_str`](Self::from_toml_str)
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Startup loading: optional file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Config::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply every key the lookup knows about, then validate
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(env::POLL_INTERVAL) {
            let secs: i64 = parse_number(env::POLL_INTERVAL, &raw)?;
            if secs < 1 {
                return Err(ConfigError::InvalidPollInterval(secs));
            }
            self.poll_interval_secs = secs as u64;
        }
        if let Some(raw) = get(env::GPIO_PIN) {
            self.gpio_pin = parse_number(env::GPIO_PIN, &raw)?;
        }
        if let Some(raw) = get(env::CYCLES_PER_CALORIE) {
            self.cycles_per_calorie = parse_number(env::CYCLES_PER_CALORIE, &raw)?;
        }
        if let Some(raw) = get(env::DEBOUNCE_MS) {
            self.debounce_ms = parse_number(env::DEBOUNCE_MS, &raw)?;
        }
        if let Some(raw) = get(env::WRITE_INTERVAL) {
            self.write_interval_secs = parse_number(env::WRITE_INTERVAL, &raw)?;
        }
        if let Some(raw) = get(env::WRITE_NO_CHANGE) {
            self.write_on_no_change = parse_bool(env::WRITE_NO_CHANGE, &raw)?;
        }
        if let Some(raw) = get(env::CALCULATE_DISTANCE) {
            self.calculate_distance = parse_bool(env::CALCULATE_DISTANCE, &raw)?;
        }
        if let Some(raw) = get(env::WHEEL_RADIUS_CM) {
            self.wheel_radius_cm = parse_number(env::WHEEL_RADIUS_CM, &raw)?;
        }
        if let Some(raw) = get(env::SPEED_FORMAT) {
            self.speed_format = resolve_speed_format(&raw);
        }
        if let Some(raw) = get(env::MEASUREMENT) {
            self.measurement = raw.trim().to_string();
        }
        // Extra tags may legitimately be set to blank to clear a file value.
        if let Some(raw) = lookup(env::EXTRA_TAGS) {
            self.extra_tags = raw.trim().to_string();
        }
        if let Some(raw) = get(env::FLOAT_PRECISION) {
            self.float_precision = parse_number(env::FLOAT_PRECISION, &raw)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check the fatal rules. Poll interval is checked first
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs < 1 {
            return Err(ConfigError::InvalidPollInterval(self.poll_interval_secs as i64));
        }
        if self.cycles_per_calorie == 0 {
            return Err(ConfigError::invalid(
                env::CYCLES_PER_CALORIE,
                "0",
                "must be at least 1",
            ));
        }
        if self.calculate_distance
            && !(self.wheel_radius_cm.is_finite() && self.wheel_radius_cm > 0.0)
        {
            return Err(ConfigError::invalid(
                env::WHEEL_RADIUS_CM,
                self.wheel_radius_cm.to_string(),
                "must be a positive number when distance calculation is enabled",
            ));
        }
        if self.measurement.is_empty() {
            return Err(ConfigError::invalid(env::MEASUREMENT, "", "must not be empty"));
        }
        if self.float_precision > MAX_FLOAT_PRECISION {
            return Err(ConfigError::invalid(
                env::FLOAT_PRECISION,
                self.float_precision.to_string(),
                format!("must be at most {}", MAX_FLOAT_PRECISION),
            ));
        }
        Ok(())
    }

    pub fn with_gpio_pin(mut self, pin: u8) -> Self {
        self.gpio_pin = pin;
        self
    }

    pub fn with_cycles_per_calorie(mut self, cycles: u32) -> Self {
        self.cycles_per_calorie = cycles;
        self
    }

    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn with_write_interval_secs(mut self, secs: u64) -> Self {
        self.write_interval_secs = secs;
        self
    }

    pub fn with_write_on_no_change(mut self, enabled: bool) -> Self {
        self.write_on_no_change = enabled;
        self
    }

    pub fn with_distance(mut self, enabled: bool) -> Self {
        self.calculate_distance = enabled;
        self
    }

    pub fn with_wheel_radius_cm(mut self, radius: f64) -> Self {
        self.wheel_radius_cm = radius;
        self
    }

    pub fn with_speed_format(mut self, unit: SpeedUnit) -> Self {
        self.speed_format = unit;
        self
    }

    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    pub fn with_extra_tags(mut self, tags: impl Into<String>) -> Self {
        self.extra_tags = tags.into();
        self
    }

    pub fn with_float_precision(mut self, places: usize) -> Self {
        self.float_precision = places;
        self
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get write interval as Duration
    pub fn write_interval(&self) -> Duration {
        Duration::from_secs(self.write_interval_secs)
    }

    /// Get debounce window as Duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Parse a speed unit name, forcing cm/s for anything unrecognised
pub fn resolve_speed_format(raw: &str) -> SpeedUnit {
    match raw.parse::<SpeedUnit>() {
        Ok(unit) => unit,
        Err(e) => {
            tracing::warn!("{}; using {} for this run", e, SpeedUnit::CmPerSec);
            SpeedUnit::CmPerSec
        }
    }
}

fn deserialize_speed_format<'de, D>(deserializer: D) -> Result<SpeedUnit, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(resolve_speed_format(&raw))
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.gpio_pin, 4);
        assert_eq!(config.cycles_per_calorie, 7);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.debounce(), Duration::from_millis(100));
        assert_eq!(config.write_interval(), Duration::from_secs(30));
        assert!(config.write_on_no_change);
        assert!(config.calculate_distance);
        assert_eq!(config.wheel_radius_cm, 5.6);
        assert_eq!(config.speed_format, SpeedUnit::Mph);
        assert_eq!(config.measurement, "cycle_activity");
        assert_eq!(config.extra_tags, "");
        assert_eq!(config.float_precision, 2);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("RPI_GPIO_NUM", "17"),
            ("CYCLES_PER_CALORIE", "12"),
            ("CYCLES_POLL_INTERVAL", "2"),
            ("POLL_DEBOUNCE_MS", "40"),
            ("CYCLES_WRITE_INTERVAL", "60"),
            ("CYCLES_WRITE_NOCHANGE", "False"),
            ("CALCULATE_DISTANCE", "no"),
            ("WHEEL_RADIUS_CM", "33.5"),
            ("SPEED_FORMAT", "kph"),
            ("INFLUXDB_MEASUREMENT", "spin"),
            ("INFLUXDB_EXTRA_TAGS", "host=bike"),
            ("FLOAT_PRECISION", "3"),
        ]))
        .unwrap();

        assert_eq!(config.gpio_pin, 17);
        assert_eq!(config.cycles_per_calorie, 12);
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.debounce_ms, 40);
        assert_eq!(config.write_interval_secs, 60);
        assert!(!config.write_on_no_change);
        assert!(!config.calculate_distance);
        assert_eq!(config.wheel_radius_cm, 33.5);
        assert_eq!(config.speed_format, SpeedUnit::Kph);
        assert_eq!(config.measurement, "spin");
        assert_eq!(config.extra_tags, "host=bike");
        assert_eq!(config.float_precision, 3);
    }

    #[test]
    fn test_poll_interval_below_one_is_fatal() {
        for raw in ["0", "-5"] {
            let err = Config::from_lookup(lookup(&[("CYCLES_POLL_INTERVAL", raw)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPollInterval(v) if v == raw.parse::<i64>().unwrap()));
        }
    }

    #[test]
    fn test_unparseable_values_are_fatal() {
        let err = Config::from_lookup(lookup(&[("CYCLES_PER_CALORIE", "seven")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CYCLES_PER_CALORIE", .. }));

        let err = Config::from_lookup(lookup(&[("CALCULATE_DISTANCE", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CALCULATE_DISTANCE", .. }));
    }

    #[test]
    fn test_unknown_speed_format_falls_back() {
        let config = Config::from_lookup(lookup(&[("SPEED_FORMAT", "furlongs")])).unwrap();
        assert_eq!(config.speed_format, SpeedUnit::CmPerSec);
    }

    #[test]
    fn test_zero_cycles_per_calorie_rejected() {
        let err = Config::from_lookup(lookup(&[("CYCLES_PER_CALORIE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_wheel_radius_only_checked_with_distance() {
        assert!(Config::default().with_wheel_radius_cm(0.0).validate().is_err());
        assert!(Config::default()
            .with_distance(false)
            .with_wheel_radius_cm(0.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_float_precision_capped() {
        assert!(Config::default().with_float_precision(15).validate().is_ok());
        assert!(Config::default().with_float_precision(16).validate().is_err());
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = Config::from_lookup(lookup(&[("CYCLES_POLL_INTERVAL", "  ")])).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_toml_partial_document() {
        let config = Config::from_toml_str(
            r#"
            gpio_pin = 22
            speed_format = "kph"
            extra_tags = "rider=sam"
            "#,
        )
        .unwrap();
        assert_eq!(config.gpio_pin, 22);
        assert_eq!(config.speed_format, SpeedUnit::Kph);
        assert_eq!(config.extra_tags, "rider=sam");
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_toml_unknown_unit_and_bad_interval() {
        let config = Config::from_toml_str(r#"speed_format = "furlongs""#).unwrap();
        assert_eq!(config.speed_format, SpeedUnit::CmPerSec);

        let err = Config::from_toml_str("poll_interval_secs = 0")
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPollInterval(0)));

        let err = Config::from_toml_str("no_such_key = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let base = Config::from_toml_str("write_interval_secs = 10").unwrap();
        let config = base
            .with_overrides(lookup(&[("CYCLES_WRITE_INTERVAL", "45")]))
            .unwrap();
        assert_eq!(config.write_interval_secs, 45);
    }

    #[test]
    fn test_env_can_correct_file_values() {
        let base = Config::from_toml_str("poll_interval_secs = 0").unwrap();
        let config = base
            .with_overrides(lookup(&[("CYCLES_POLL_INTERVAL", "5")]))
            .unwrap();
        assert_eq!(config.poll_interval_secs, 5);

        let base = Config::from_toml_str("wheel_radius_cm = 0.0").unwrap();
        let config = base
            .with_overrides(lookup(&[("CALCULATE_DISTANCE", "false")]))
            .unwrap();
        assert!(!config.calculate_distance);
    }

    #[test]
    fn test_load_validates_file_without_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.toml");
        std::fs::write(&path, "cycles_per_calorie = 0").unwrap();

        let base = Config::from_toml_file(&path).unwrap();
        let err = base.with_overrides(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CYCLES_PER_CALORIE", .. }));
    }

    #[test]
    fn test_unknown_speed_format_logs_warning() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || CaptureWriter(writer.clone()))
            .finish();

        let config = tracing::subscriber::with_default(subscriber, || {
            Config::from_lookup(lookup(&[("SPEED_FORMAT", "furlongs")]))
        })
        .unwrap();
        assert_eq!(config.speed_format, SpeedUnit::CmPerSec);

        let output = String::from_utf8(captured.lock().clone()).unwrap();
        assert!(output.contains("WARN"), "{}", output);
        assert!(output.contains("furlongs"), "{}", output);
        assert!(output.contains("cm/s"), "{}", output);
    }

    #[test]
    fn test_toml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.toml");
        let original = Config::default()
            .with_gpio_pin(18)
            .with_speed_format(SpeedUnit::FeetPerSec);
        std::fs::write(&path, toml::to_string(&original).unwrap()).unwrap();

        assert_eq!(Config::from_toml_file(&path).unwrap(), original);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::from_toml_file(Path::new("/nonexistent/counter.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/counter.toml"));
    }
}

//! Wheel geometry and speed unit conversion.

use serde::{Serialize, Serializer};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Centimetres per second in one mile per hour
pub const CM_PER_SEC_PER_MPH: f64 = 44.704;
/// Kilometres per hour in one centimetre per second
pub const KPH_PER_CM_PER_SEC: f64 = 0.036;
/// Centimetres per second in one metre per second
pub const CM_PER_SEC_PER_MPS: f64 = 100.0;
/// Centimetres per second in one foot per second
pub const CM_PER_SEC_PER_FPS: f64 = 30.48;

/// Unit reported in the `speed` and `max_speed` fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpeedUnit {
    #[default]
    Mph,
    Kph,
    CmPerSec,
    MetersPerSec,
    FeetPerSec,
}

impl SpeedUnit {
    pub const ALL: [SpeedUnit; 5] = [
        SpeedUnit::Mph,
        SpeedUnit::Kph,
        SpeedUnit::CmPerSec,
        SpeedUnit::MetersPerSec,
        SpeedUnit::FeetPerSec,
    ];

    /// Name used in configuration and in the `speed_format` tag
    pub const fn as_str(self) -> &'static str {
        match self {
            SpeedUnit::Mph => "mph",
            SpeedUnit::Kph => "kph",
            SpeedUnit::CmPerSec => "cm/s",
            SpeedUnit::MetersPerSec => "m/s",
            SpeedUnit::FeetPerSec => "ft/s",
        }
    }

    /// Convert a speed in cm/s into this unit
    #[inline]
    pub fn convert(self, cm_per_second: f64) -> f64 {
        match self {
            SpeedUnit::Mph => cm_per_second / CM_PER_SEC_PER_MPH,
            SpeedUnit::Kph => cm_per_second * KPH_PER_CM_PER_SEC,
            SpeedUnit::CmPerSec => cm_per_second,
            SpeedUnit::MetersPerSec => cm_per_second / CM_PER_SEC_PER_MPS,
            SpeedUnit::FeetPerSec => cm_per_second / CM_PER_SEC_PER_FPS,
        }
    }
}

/// Free-function form of [`SpeedUnit::convert`]
#[inline]
pub fn convert_speed(cm_per_second: f64, unit: SpeedUnit) -> f64 {
    unit.convert(cm_per_second)
}

/// Wheel circumference in cm for a radius in cm
#[inline]
pub fn circumference_cm(wheel_radius_cm: f64) -> f64 {
    2.0 * PI * wheel_radius_cm
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported speed format {0:?} (expected one of mph, kph, cm/s, m/s, ft/s)")]
pub struct UnknownSpeedUnit(pub String);

impl FromStr for SpeedUnit {
    type Err = UnknownSpeedUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mph" => Ok(SpeedUnit::Mph),
            "kph" | "km/h" | "kmh" => Ok(SpeedUnit::Kph),
            "cm/s" | "cms" => Ok(SpeedUnit::CmPerSec),
            "m/s" | "mps" => Ok(SpeedUnit::MetersPerSec),
            "ft/s" | "fps" => Ok(SpeedUnit::FeetPerSec),
            _ => Err(UnknownSpeedUnit(s.to_string())),
        }
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SpeedUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn test_mph_conversion() {
        assert!(approx(convert_speed(4470.4, SpeedUnit::Mph), 100.0, 1e-9));
    }

    #[test]
    fn test_kph_conversion() {
        assert!(approx(convert_speed(100.0, SpeedUnit::Kph), 3.6, 1e-9));
    }

    #[test]
    fn test_identity_and_linear_units() {
        assert_eq!(convert_speed(12.5, SpeedUnit::CmPerSec), 12.5);
        assert!(approx(convert_speed(250.0, SpeedUnit::MetersPerSec), 2.5, 1e-12));
        assert!(approx(convert_speed(30.48, SpeedUnit::FeetPerSec), 1.0, 1e-12));
    }

    #[test]
    fn test_parse_round_trips_tag_names() {
        for unit in SpeedUnit::ALL {
            assert_eq!(unit.as_str().parse::<SpeedUnit>(), Ok(unit));
        }
        assert_eq!(" MPH ".parse::<SpeedUnit>(), Ok(SpeedUnit::Mph));
        assert_eq!("km/h".parse::<SpeedUnit>(), Ok(SpeedUnit::Kph));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "furlongs".parse::<SpeedUnit>().unwrap_err();
        assert_eq!(err, UnknownSpeedUnit("furlongs".to_string()));
        assert!(err.to_string().contains("furlongs"));
    }

    #[test]
    fn test_circumference() {
        assert!(approx(circumference_cm(5.6), 35.1858, 1e-4));
        assert_eq!(circumference_cm(0.0), 0.0);
    }
}

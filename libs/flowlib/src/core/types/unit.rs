// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Physical units for numeric port values.

use serde::{Deserialize, Serialize};

/// Unit family; only units of the same family convert into each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitFamily {
    Dimensionless,
    Length,
    Time,
    Angle,
    Speed,
    Frequency,
}

/// Unit attached to a numeric value or a bounded port.
///
/// `Unit::None` means "no unit information"; converting from or to it is the
/// identity, so unitless values are taken to already be in the port's unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    None,
    Kilometer,
    Meter,
    Centimeter,
    Millimeter,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
    Radian,
    Degree,
    MeterPerSecond,
    KilometerPerHour,
    Hertz,
    Kilohertz,
}

impl Unit {
    pub fn family(self) -> UnitFamily {
        match self {
            Unit::None => UnitFamily::Dimensionless,
            Unit::Kilometer | Unit::Meter | Unit::Centimeter | Unit::Millimeter => {
                UnitFamily::Length
            }
            Unit::Hour
            | Unit::Minute
            | Unit::Second
            | Unit::Millisecond
            | Unit::Microsecond
            | Unit::Nanosecond => UnitFamily::Time,
            Unit::Radian | Unit::Degree => UnitFamily::Angle,
            Unit::MeterPerSecond | Unit::KilometerPerHour => UnitFamily::Speed,
            Unit::Hertz | Unit::Kilohertz => UnitFamily::Frequency,
        }
    }

    /// Factor to the SI base unit of the family.
    fn factor(self) -> f64 {
        match self {
            Unit::None => 1.0,
            Unit::Kilometer => 1000.0,
            Unit::Meter => 1.0,
            Unit::Centimeter => 0.01,
            Unit::Millimeter => 0.001,
            Unit::Hour => 3600.0,
            Unit::Minute => 60.0,
            Unit::Second => 1.0,
            Unit::Millisecond => 1e-3,
            Unit::Microsecond => 1e-6,
            Unit::Nanosecond => 1e-9,
            Unit::Radian => 1.0,
            Unit::Degree => std::f64::consts::PI / 180.0,
            Unit::MeterPerSecond => 1.0,
            Unit::KilometerPerHour => 1.0 / 3.6,
            Unit::Hertz => 1.0,
            Unit::Kilohertz => 1000.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Kilometer => "km",
            Unit::Meter => "m",
            Unit::Centimeter => "cm",
            Unit::Millimeter => "mm",
            Unit::Hour => "h",
            Unit::Minute => "min",
            Unit::Second => "s",
            Unit::Millisecond => "ms",
            Unit::Microsecond => "us",
            Unit::Nanosecond => "ns",
            Unit::Radian => "rad",
            Unit::Degree => "deg",
            Unit::MeterPerSecond => "m/s",
            Unit::KilometerPerHour => "km/h",
            Unit::Hertz => "Hz",
            Unit::Kilohertz => "kHz",
        }
    }

    /// Whether values in `self` can be expressed in `other`.
    pub fn convertible_to(self, other: Unit) -> bool {
        self == Unit::None || other == Unit::None || self.family() == other.family()
    }

    /// Convert `value` given in `self` into `to`.
    ///
    /// Returns `None` for units of different families.
    pub fn convert(self, value: f64, to: Unit) -> Option<f64> {
        if self == to || self == Unit::None || to == Unit::None {
            return Some(value);
        }
        if self.family() != to.family() {
            return None;
        }
        Some(value * self.factor() / to.factor())
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_conversion() {
        assert_eq!(Unit::Kilometer.convert(1.5, Unit::Meter), Some(1500.0));
        let cm = Unit::Millimeter.convert(25.0, Unit::Centimeter).unwrap();
        assert!((cm - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_angle_conversion() {
        let rad = Unit::Degree.convert(180.0, Unit::Radian).unwrap();
        assert!((rad - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_incompatible_families() {
        assert_eq!(Unit::Meter.convert(1.0, Unit::Second), None);
        assert!(!Unit::Meter.convertible_to(Unit::Hertz));
    }

    #[test]
    fn test_unitless_is_identity() {
        assert_eq!(Unit::None.convert(3.0, Unit::Meter), Some(3.0));
        assert_eq!(Unit::Degree.convert(3.0, Unit::None), Some(3.0));
    }

    #[test]
    fn test_unit_serde() {
        let unit: Unit = serde_json::from_str("\"meter_per_second\"").unwrap();
        assert_eq!(unit, Unit::MeterPerSecond);
    }
}

//! Protocol definitions for weatherwire
//!
//! This module defines the core types carried over the message channel:
//! - Sensor readings and their value domains
//! - Wind directions and their 3-bit wire codes
//! - Wire modes and serialized frames

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest valid temperature (°C)
pub const TEMPERATURE_MIN: f64 = 0.0;

/// Highest valid temperature (°C)
pub const TEMPERATURE_MAX: f64 = 110.0;

/// Lowest valid relative humidity (%)
pub const HUMIDITY_MIN: i32 = 0;

/// Highest valid relative humidity (%)
pub const HUMIDITY_MAX: i32 = 100;

/// Size of a compact frame in bytes
pub const COMPACT_FRAME_SIZE: usize = 3;

/// One of the 8 compass points reported by the wind vane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindDirection {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "NW")]
    NorthWest,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "SW")]
    SouthWest,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "SE")]
    SouthEast,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "NE")]
    NorthEast,
}

impl WindDirection {
    /// All directions, indexed by their wire code
    pub const ALL: [WindDirection; 8] = [
        WindDirection::North,
        WindDirection::NorthWest,
        WindDirection::West,
        WindDirection::SouthWest,
        WindDirection::South,
        WindDirection::SouthEast,
        WindDirection::East,
        WindDirection::NorthEast,
    ];

    /// 3-bit wire code
    pub fn code(&self) -> u8 {
        match self {
            WindDirection::North => 0,
            WindDirection::NorthWest => 1,
            WindDirection::West => 2,
            WindDirection::SouthWest => 3,
            WindDirection::South => 4,
            WindDirection::SouthEast => 5,
            WindDirection::East => 6,
            WindDirection::NorthEast => 7,
        }
    }

    /// Map a 3-bit wire code back to a direction.
    ///
    /// Total: only the low 3 bits are looked at, and every one of their 8
    /// states names a direction. If the frame layout ever widens this
    /// field, this must become fallible again.
    pub fn from_code(code: u8) -> Self {
        Self::ALL[(code & 0x07) as usize]
    }

    /// Compass string used in text frames and the durable store
    pub fn as_str(&self) -> &'static str {
        match self {
            WindDirection::North => "N",
            WindDirection::NorthWest => "NW",
            WindDirection::West => "W",
            WindDirection::SouthWest => "SW",
            WindDirection::South => "S",
            WindDirection::SouthEast => "SE",
            WindDirection::East => "E",
            WindDirection::NorthEast => "NE",
        }
    }
}

impl fmt::Display for WindDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindDirection {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| CodecError::InvalidDirection(s.to_string()))
    }
}

/// A single weather sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    /// Temperature in °C, within [0.0, 110.0]
    pub temperature: f64,
    /// Relative humidity in %, within [0, 100]
    pub humidity: i32,
    /// Wind direction
    pub wind_direction: WindDirection,
}

impl SensorReading {
    /// Create a reading, rejecting out-of-domain values
    pub fn new(
        temperature: f64,
        humidity: i32,
        wind_direction: WindDirection,
    ) -> Result<Self, CodecError> {
        let reading = Self {
            temperature,
            humidity,
            wind_direction,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Check temperature and humidity against their domains
    pub fn validate(&self) -> Result<(), CodecError> {
        if !(HUMIDITY_MIN..=HUMIDITY_MAX).contains(&self.humidity) {
            return Err(CodecError::InvalidHumidity(self.humidity as i64));
        }
        if !self.temperature.is_finite()
            || !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&self.temperature)
        {
            return Err(CodecError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}°C, {}%, {}",
            self.temperature, self.humidity, self.wind_direction
        )
    }
}

/// On-wire representation chosen for a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireMode {
    /// Self-describing JSON field map, lossless
    #[default]
    Text,
    /// Fixed 3-byte frame, lossy for temperature
    Compact,
}

impl fmt::Display for WireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireMode::Text => write!(f, "text"),
            WireMode::Compact => write!(f, "compact"),
        }
    }
}

impl FromStr for WireMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "json" => Ok(WireMode::Text),
            "compact" => Ok(WireMode::Compact),
            other => Err(format!(
                "unknown mode '{}': must be either 'text' or 'compact'",
                other
            )),
        }
    }
}

/// One serialized sensor reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// JSON text frame
    Text(Vec<u8>),
    /// 24-bit compact frame, big-endian
    Compact([u8; COMPACT_FRAME_SIZE]),
}

impl WireFrame {
    /// Frame bytes as sent to the broker
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WireFrame::Text(bytes) => bytes,
            WireFrame::Compact(bytes) => bytes,
        }
    }

    /// Frame size in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the frame is empty
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Mode this frame was encoded with
    pub fn mode(&self) -> WireMode {
        match self {
            WireFrame::Text(_) => WireMode::Text,
            WireFrame::Compact(_) => WireMode::Compact,
        }
    }
}

impl fmt::Display for WireFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFrame::Text(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            WireFrame::Compact(bytes) => {
                write!(f, "[{:02x} {:02x} {:02x}]", bytes[0], bytes[1], bytes[2])
            }
        }
    }
}

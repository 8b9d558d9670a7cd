//! Encoder module
//!
//! This module turns sensor readings into wire frames, either as a
//! self-describing text frame or as a fixed 3-byte compact frame.
//!
//! # Compact frame layout
//!
//! ```text
//!  23                    10 9           3 2       0
//! [ temperature code (14) ][ humidity (7) ][ dir (3) ]
//! byte0 = bits 23..16, byte1 = bits 15..8, byte2 = bits 7..0
//! ```

use crate::error::CodecError;
use crate::protocol::{SensorReading, WireFrame, WireMode, COMPACT_FRAME_SIZE, TEMPERATURE_MAX};

/// Largest 14-bit temperature code
pub const TEMPERATURE_CODE_MAX: u16 = 0x3FFF;

pub(crate) const TEMPERATURE_SHIFT: u32 = 10;
pub(crate) const HUMIDITY_SHIFT: u32 = 3;
pub(crate) const HUMIDITY_MASK: u32 = 0x7F;
pub(crate) const DIRECTION_MASK: u32 = 0x07;

/// Encoder for a fixed wire mode
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder {
    mode: WireMode,
}

impl Encoder {
    /// Create an encoder for the given mode
    pub fn new(mode: WireMode) -> Self {
        Self { mode }
    }

    /// Mode this encoder produces
    pub fn mode(&self) -> WireMode {
        self.mode
    }

    /// Encode a reading per the active mode
    pub fn encode(&self, reading: &SensorReading) -> Result<WireFrame, CodecError> {
        match self.mode {
            WireMode::Text => encode_text(reading),
            WireMode::Compact => encode_compact(reading).map(WireFrame::Compact),
        }
    }
}

/// Quantize a temperature into its 14-bit code.
///
/// The clamp is a safety net only: validated readings always land inside
/// the code range.
pub fn quantize_temperature(temperature: f64) -> u16 {
    let code = (temperature / TEMPERATURE_MAX * TEMPERATURE_CODE_MAX as f64).round();
    code.clamp(0.0, TEMPERATURE_CODE_MAX as f64) as u16
}

/// Pack a reading into a 3-byte compact frame
pub fn encode_compact(reading: &SensorReading) -> Result<[u8; COMPACT_FRAME_SIZE], CodecError> {
    reading.validate()?;

    let temp_code = quantize_temperature(reading.temperature) as u32;
    let humidity = reading.humidity as u32 & HUMIDITY_MASK;
    let direction = reading.wind_direction.code() as u32 & DIRECTION_MASK;

    let word = (temp_code << TEMPERATURE_SHIFT) | (humidity << HUMIDITY_SHIFT) | direction;

    Ok([(word >> 16) as u8, (word >> 8) as u8, word as u8])
}

/// Serialize a reading as a JSON text frame
pub fn encode_text(reading: &SensorReading) -> Result<WireFrame, CodecError> {
    reading.validate()?;
    let bytes =
        serde_json::to_vec(reading).map_err(|e| CodecError::MalformedText(e.to_string()))?;
    Ok(WireFrame::Text(bytes))
}

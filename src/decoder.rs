//! Decoder module
//!
//! This module turns wire frames back into sensor readings. Both frame
//! kinds are re-validated on the way in, whatever the producer checked.

use crate::encoder::{
    DIRECTION_MASK, HUMIDITY_MASK, HUMIDITY_SHIFT, TEMPERATURE_CODE_MAX, TEMPERATURE_SHIFT,
};
use crate::error::CodecError;
use crate::protocol::{
    SensorReading, WindDirection, WireMode, COMPACT_FRAME_SIZE, HUMIDITY_MAX, HUMIDITY_MIN,
    TEMPERATURE_MAX,
};
use serde::Deserialize;

/// Largest absolute temperature error introduced by the compact frame (°C)
pub const TEMPERATURE_TOLERANCE: f64 = 0.0067;

/// A decoded compact frame together with its raw field values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactDecoded {
    /// Reconstructed reading
    pub reading: SensorReading,
    /// Raw 14-bit temperature code
    pub temp_code: u16,
    /// Raw 7-bit humidity field
    pub humidity: u8,
    /// Raw 3-bit direction code
    pub direction_code: u8,
}

/// Decoder for a fixed wire mode
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    mode: WireMode,
}

impl Decoder {
    /// Create a decoder for the given mode
    pub fn new(mode: WireMode) -> Self {
        Self { mode }
    }

    /// Mode this decoder expects
    pub fn mode(&self) -> WireMode {
        self.mode
    }

    /// Decode message bytes per the active mode
    pub fn decode(&self, bytes: &[u8]) -> Result<SensorReading, CodecError> {
        match self.mode {
            WireMode::Text => decode_text(bytes),
            WireMode::Compact => decode_compact(bytes).map(|d| d.reading),
        }
    }
}

/// Reconstruct a temperature from its 14-bit code
pub fn dequantize_temperature(code: u16) -> f64 {
    (code as f64 / TEMPERATURE_CODE_MAX as f64) * TEMPERATURE_MAX
}

/// Unpack a 3-byte compact frame
pub fn decode_compact(bytes: &[u8]) -> Result<CompactDecoded, CodecError> {
    let bytes: [u8; COMPACT_FRAME_SIZE] =
        bytes
            .try_into()
            .map_err(|_| CodecError::InvalidFrameSize {
                expected: COMPACT_FRAME_SIZE,
                actual: bytes.len(),
            })?;

    let word = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);

    let temp_code = (word >> TEMPERATURE_SHIFT) as u16;
    let humidity = ((word >> HUMIDITY_SHIFT) & HUMIDITY_MASK) as u8;
    let direction_code = (word & DIRECTION_MASK) as u8;

    // 7 bits hold up to 127
    if humidity as i32 > HUMIDITY_MAX {
        return Err(CodecError::InvalidHumidity(humidity as i64));
    }

    let reading = SensorReading {
        temperature: dequantize_temperature(temp_code),
        humidity: humidity as i32,
        wind_direction: WindDirection::from_code(direction_code),
    };

    Ok(CompactDecoded {
        reading,
        temp_code,
        humidity,
        direction_code,
    })
}

#[derive(Deserialize)]
struct TextFields {
    temperature: f64,
    humidity: i64,
    wind_direction: String,
}

/// Parse a JSON text frame
pub fn decode_text(bytes: &[u8]) -> Result<SensorReading, CodecError> {
    let fields: TextFields =
        serde_json::from_slice(bytes).map_err(|e| CodecError::MalformedText(e.to_string()))?;

    if !(HUMIDITY_MIN as i64..=HUMIDITY_MAX as i64).contains(&fields.humidity) {
        return Err(CodecError::InvalidHumidity(fields.humidity));
    }
    let wind_direction = fields.wind_direction.parse::<WindDirection>()?;

    SensorReading::new(fields.temperature, fields.humidity as i32, wind_direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_decode_reference_frame() {
        let decoded = decode_compact(&[0x80, 0x01, 0x94]).unwrap();
        assert_eq!(decoded.temp_code, 0x2000);
        assert_eq!(decoded.humidity, 50);
        assert_eq!(decoded.direction_code, 4);
        assert_eq!(decoded.reading.humidity, 50);
        assert_eq!(decoded.reading.wind_direction, WindDirection::South);
        assert_abs_diff_eq!(decoded.reading.temperature, 55.0, epsilon = TEMPERATURE_TOLERANCE);
    }

    #[test]
    fn test_decode_wrong_size() {
        for len in [0usize, 1, 2, 4, 16] {
            let bytes = vec![0u8; len];
            assert_eq!(
                decode_compact(&bytes),
                Err(CodecError::InvalidFrameSize {
                    expected: 3,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_decode_humidity_above_domain() {
        // humidity field = 127
        let word: u32 = 127 << 3;
        let bytes = [(word >> 16) as u8, (word >> 8) as u8, word as u8];
        assert_eq!(decode_compact(&bytes), Err(CodecError::InvalidHumidity(127)));
    }

    #[test]
    fn test_decode_text_order_independent() {
        let json = br#"{"wind_direction":"NW","humidity":12,"temperature":3.25}"#;
        let reading = decode_text(json).unwrap();
        assert_eq!(reading.temperature, 3.25);
        assert_eq!(reading.humidity, 12);
        assert_eq!(reading.wind_direction, WindDirection::NorthWest);
    }

    #[test]
    fn test_decode_text_malformed() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"temperature":20.0,"humidity":50}"#,
            br#"{"temperature":"hot","humidity":50,"wind_direction":"N"}"#,
            br#"{"temperature":20.0,"humidity":50.5,"wind_direction":"N"}"#,
            b"null",
        ];
        for case in cases {
            assert!(
                matches!(decode_text(case), Err(CodecError::MalformedText(_))),
                "expected MalformedText for {}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_decode_text_revalidates_domains() {
        assert_eq!(
            decode_text(br#"{"temperature":20.0,"humidity":101,"wind_direction":"N"}"#),
            Err(CodecError::InvalidHumidity(101))
        );
        assert_eq!(
            decode_text(br#"{"temperature":20.0,"humidity":-1,"wind_direction":"N"}"#),
            Err(CodecError::InvalidHumidity(-1))
        );
        assert_eq!(
            decode_text(br#"{"temperature":20.0,"humidity":50,"wind_direction":"NNE"}"#),
            Err(CodecError::InvalidDirection("NNE".to_string()))
        );
        assert!(matches!(
            decode_text(br#"{"temperature":-0.5,"humidity":50,"wind_direction":"N"}"#),
            Err(CodecError::InvalidTemperature(_))
        ));
    }

    #[test]
    fn test_decoder_follows_mode() {
        let compact = Decoder::new(WireMode::Compact);
        assert!(compact.decode(&[0x80, 0x01, 0x94]).is_ok());
        assert!(matches!(
            compact.decode(br#"{"temperature":1.0}"#),
            Err(CodecError::InvalidFrameSize { .. })
        ));

        let text = Decoder::new(WireMode::Text);
        assert!(matches!(
            text.decode(&[0x80, 0x01, 0x94]),
            Err(CodecError::MalformedText(_))
        ));
    }
}

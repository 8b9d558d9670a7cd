// Weatherwire - Codec property tests
//
// Properties checked against many random readings:
// 1. Compact round trip (humidity/direction exact, temperature within tolerance)
// 2. Text round trip (exact)
// 3. Domain rejection
// 4. Frame size rejection

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use weatherwire::{
    decode_compact, decode_text, encode_compact, encode_text, CodecError, ReadingGenerator,
    SensorReading, WindDirection, TEMPERATURE_TOLERANCE,
};

fn random_reading(rng: &mut StdRng) -> SensorReading {
    // Two-decimal temperatures, like the generator produces
    let temperature = (rng.gen_range(0.0..=110.0f64) * 100.0).round() / 100.0;
    SensorReading::new(
        temperature,
        rng.gen_range(0..=100),
        WindDirection::ALL[rng.gen_range(0..8)],
    )
    .unwrap()
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_compact_roundtrip_random_readings() {
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..10_000 {
        let reading = random_reading(&mut rng);
        let decoded = decode_compact(&encode_compact(&reading).unwrap()).unwrap();

        assert_eq!(decoded.reading.humidity, reading.humidity);
        assert_eq!(decoded.reading.wind_direction, reading.wind_direction);
        assert!(
            (decoded.reading.temperature - reading.temperature).abs() <= TEMPERATURE_TOLERANCE,
            "{} decoded as {}",
            reading.temperature,
            decoded.reading.temperature
        );
    }
}

#[test]
fn test_compact_roundtrip_domain_edges() {
    for (temperature, humidity) in [(0.0, 0), (110.0, 100), (0.01, 1), (109.99, 99)] {
        for direction in WindDirection::ALL {
            let reading = SensorReading::new(temperature, humidity, direction).unwrap();
            let decoded = decode_compact(&encode_compact(&reading).unwrap()).unwrap();
            assert_eq!(decoded.reading.humidity, humidity);
            assert_eq!(decoded.reading.wind_direction, direction);
            assert!((decoded.reading.temperature - temperature).abs() <= TEMPERATURE_TOLERANCE);
        }
    }
}

#[test]
fn test_text_roundtrip_is_exact() {
    let mut rng = StdRng::seed_from_u64(77);
    for _ in 0..2_000 {
        let reading = random_reading(&mut rng);
        let frame = encode_text(&reading).unwrap();
        assert_eq!(decode_text(frame.as_bytes()).unwrap(), reading);
    }

    // Arbitrary precision survives too
    let reading = SensorReading::new(1.0 / 3.0, 33, WindDirection::SouthWest).unwrap();
    let frame = encode_text(&reading).unwrap();
    assert_eq!(decode_text(frame.as_bytes()).unwrap(), reading);
}

#[test]
fn test_generated_readings_roundtrip() {
    let mut generator = ReadingGenerator::seeded(8);
    for _ in 0..10_000 {
        let reading = generator.generate();
        assert!((0.0..=110.0).contains(&reading.temperature));
        assert!((0..=100).contains(&reading.humidity));
        assert!(WindDirection::ALL.contains(&reading.wind_direction));

        let decoded = decode_compact(&encode_compact(&reading).unwrap()).unwrap();
        assert_eq!(decoded.reading.humidity, reading.humidity);
    }
}

// ============================================================================
// Rejection
// ============================================================================

#[test]
fn test_encode_rejects_humidity_outside_domain() {
    for humidity in [-1, 101] {
        let reading = SensorReading {
            temperature: 25.0,
            humidity,
            wind_direction: WindDirection::North,
        };
        assert_eq!(
            encode_compact(&reading),
            Err(CodecError::InvalidHumidity(humidity as i64))
        );
    }
}

#[test]
fn test_unknown_direction_string_is_rejected() {
    assert_eq!(
        "NNW".parse::<WindDirection>(),
        Err(CodecError::InvalidDirection("NNW".to_string()))
    );
    assert_eq!(
        decode_text(br#"{"temperature":25.0,"humidity":40,"wind_direction":"north"}"#),
        Err(CodecError::InvalidDirection("north".to_string()))
    );
}

#[test]
fn test_decode_rejects_every_wrong_length() {
    for len in (0..64).filter(|&n| n != 3) {
        let bytes = vec![0xAB; len];
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
fn test_reference_example() {
    let reading = SensorReading::new(55.0, 50, WindDirection::South).unwrap();
    let frame = encode_compact(&reading).unwrap();
    assert_eq!(frame, [0x80, 0x01, 0x94]);

    let decoded = decode_compact(&frame).unwrap();
    assert_eq!(decoded.temp_code, 8192);
    assert_eq!(decoded.humidity, 50);
    assert_eq!(decoded.direction_code, 4);
}

//! Reading generator.
//!
//! Synthesizes plausible readings from normal distributions (Box–Muller)
//! and a uniform draw over the compass points. The random source is owned
//! by the generator and seeded once by the caller.

use crate::protocol::{
    SensorReading, WindDirection, HUMIDITY_MAX, HUMIDITY_MIN, TEMPERATURE_MAX, TEMPERATURE_MIN,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Temperature distribution mean (°C)
pub const TEMPERATURE_MEAN: f64 = 55.0;
/// Temperature distribution standard deviation (°C)
pub const TEMPERATURE_STDDEV: f64 = 10.0;
/// Humidity distribution mean (%)
pub const HUMIDITY_MEAN: f64 = 55.0;
/// Humidity distribution standard deviation (%)
pub const HUMIDITY_STDDEV: f64 = 15.0;

/// Sensor reading generator.
#[derive(Debug, Clone)]
pub struct ReadingGenerator<R: Rng = StdRng> {
    rng: R,
}

impl ReadingGenerator<StdRng> {
    /// Create a generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Create a reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ReadingGenerator<R> {
    /// Wrap an existing random source.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Access the random source (shared with the producer's delay draw).
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Generate one reading. Never fails.
    pub fn generate(&mut self) -> SensorReading {
        SensorReading {
            temperature: self.temperature(),
            humidity: self.humidity(),
            wind_direction: self.wind_direction(),
        }
    }

    fn temperature(&mut self) -> f64 {
        let z = standard_normal(&mut self.rng);
        let t = (TEMPERATURE_MEAN + TEMPERATURE_STDDEV * z).clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
        (t * 100.0).round() / 100.0
    }

    fn humidity(&mut self) -> i32 {
        let z = standard_normal(&mut self.rng);
        let h = (HUMIDITY_MEAN + HUMIDITY_STDDEV * z).round();
        h.clamp(HUMIDITY_MIN as f64, HUMIDITY_MAX as f64) as i32
    }

    fn wind_direction(&mut self) -> WindDirection {
        WindDirection::ALL[self.rng.gen_range(0..WindDirection::ALL.len())]
    }
}

/// Box–Muller draw from N(0, 1).
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // u1 in (0, 1] keeps ln() finite
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

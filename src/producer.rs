// Weatherwire - Producer loop
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Producer loop: generate → encode → publish → randomized delay.
//!
//! The loop never ends on its own. Encode and publish failures are logged
//! and the loop moves on; nothing is retried.

use crate::channel::Publisher;
use crate::config::ProducerConfig;
use crate::encoder::Encoder;
use crate::error::{ChannelError, CodecError};
use crate::generator::ReadingGenerator;
use crate::protocol::{SensorReading, WireFrame};
use rand::rngs::StdRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Outcome of one loop iteration
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Frame acknowledged by the broker
    Sent(WireFrame),
    /// Reading could not be encoded; no delay follows
    EncodeFailed(CodecError),
    /// Broker did not acknowledge the frame
    PublishFailed(ChannelError),
}

impl StepOutcome {
    /// Whether the loop sleeps before the next iteration
    pub fn should_sleep(&self) -> bool {
        !matches!(self, StepOutcome::EncodeFailed(_))
    }
}

/// Producer counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub generated: u64,
    pub sent: u64,
    pub encode_failures: u64,
    pub publish_failures: u64,
}

/// Producer loop driver
pub struct Producer<P: Publisher, R: Rng = StdRng> {
    publisher: P,
    generator: ReadingGenerator<R>,
    encoder: Encoder,
    topic: String,
    min_interval_secs: u64,
    max_interval_secs: u64,
    stats: ProducerStats,
}

impl<P: Publisher, R: Rng> Producer<P, R> {
    /// Create a producer; interval bounds are normalized here.
    pub fn new(config: &ProducerConfig, publisher: P, generator: ReadingGenerator<R>) -> Self {
        let (min_interval_secs, max_interval_secs) = config.effective_intervals();
        Self {
            publisher,
            generator,
            encoder: Encoder::new(config.mode),
            topic: config.topic.clone(),
            min_interval_secs,
            max_interval_secs,
            stats: ProducerStats::default(),
        }
    }

    pub fn stats(&self) -> &ProducerStats {
        &self.stats
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    /// Effective interval bounds in seconds
    pub fn intervals(&self) -> (u64, u64) {
        (self.min_interval_secs, self.max_interval_secs)
    }

    /// Generate one reading and send it.
    pub async fn step(&mut self) -> StepOutcome {
        let reading = self.generator.generate();
        self.stats.generated += 1;
        self.send_reading(&reading).await
    }

    /// Encode and publish a reading.
    pub async fn send_reading(&mut self, reading: &SensorReading) -> StepOutcome {
        let frame = match self.encoder.encode(reading) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.encode_failures += 1;
                error!(topic = %self.topic, error = %e, "Error encoding sensor data");
                return StepOutcome::EncodeFailed(e);
            }
        };

        match self.publisher.publish(&frame).await {
            Ok(()) => {
                self.stats.sent += 1;
                info!(topic = %self.topic, mode = %frame.mode(), "Message sent: {}", frame);
                StepOutcome::Sent(frame)
            }
            Err(e) => {
                self.stats.publish_failures += 1;
                warn!(topic = %self.topic, error = %e, "Error sending message");
                StepOutcome::PublishFailed(e)
            }
        }
    }

    /// Draw the delay before the next iteration, whole seconds within the
    /// interval bounds (inclusive).
    pub fn next_delay(&mut self) -> Duration {
        let secs = self
            .generator
            .rng_mut()
            .gen_range(self.min_interval_secs..=self.max_interval_secs);
        Duration::from_secs(secs)
    }

    /// Run until the process is terminated.
    pub async fn run(mut self) {
        info!(
            topic = %self.topic,
            mode = %self.encoder.mode(),
            "Producer started. Sending data every {}-{} seconds...",
            self.min_interval_secs,
            self.max_interval_secs
        );

        loop {
            let outcome = self.step().await;
            if outcome.should_sleep() {
                sleep(self.next_delay()).await;
            }
        }
    }
}

// Weatherwire - Consumer pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Consumer pipeline: subscribe → decode → persist → display.
//!
//! ```text
//!   Subscriber ──► Decoder ──► ReadingStore (CSV)
//!                     │
//!                     ├──► LogRing<LogLine>        (newest first)
//!                     ├──► SlidingWindow<Sample>   temperature (oldest first)
//!                     └──► SlidingWindow<Sample>   humidity
//!                                 │
//!                                 ▼
//!                            DisplaySink
//! ```
//!
//! Offsets are committed on a fixed cadence regardless of per-message
//! outcome, so delivery is at-least-once. The only suspension point is the
//! read, which takes the cancellation token.

use crate::channel::{Message, Subscriber};
use crate::config::{ConsumerConfig, PersistencePolicy};
use crate::decoder::Decoder;
use crate::error::PipelineError;
use crate::store::{ReadingStore, StampedReading};
use crate::window::{LogRing, Sample, SlidingWindow};
use std::fmt;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Pipeline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Subscribed, not yet polling
    Connected,
    /// Waiting for the next message
    IdlePolling,
    /// Handling a message
    ProcessingMessage,
    /// Stopped by the cancellation signal
    Cancelled,
}

/// One rendered line of the on-screen message history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine(String);

impl LogLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&StampedReading> for LogLine {
    fn from(stamped: &StampedReading) -> Self {
        LogLine(format!(
            "Message received - Timestamp: {}, Temperature: {:.2}°C, Humidity: {}%, Wind Direction: {}",
            stamped.timestamp(),
            stamped.reading.temperature,
            stamped.reading.humidity,
            stamped.reading.wind_direction
        ))
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renderer fed by the pipeline
pub trait DisplaySink {
    /// Redraw the two charts and the log panel.
    fn update(
        &mut self,
        temperature: &SlidingWindow<Sample>,
        humidity: &SlidingWindow<Sample>,
        log: &LogRing<LogLine>,
    ) -> std::io::Result<()>;
}

/// Sink for headless runs: reports each update through `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DisplaySink for TracingSink {
    fn update(
        &mut self,
        temperature: &SlidingWindow<Sample>,
        humidity: &SlidingWindow<Sample>,
        _log: &LogRing<LogLine>,
    ) -> std::io::Result<()> {
        if let (Some((t_lo, t_hi)), Some((h_lo, h_hi))) =
            (temperature.value_range(), humidity.value_range())
        {
            info!(
                samples = temperature.len(),
                "window temperature {:.2}..{:.2}°C, humidity {:.0}..{:.0}%",
                t_lo,
                t_hi,
                h_lo,
                h_hi
            );
        }
        Ok(())
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Messages read from the subscriber
    pub received: u64,
    /// Messages decoded and handled
    pub processed: u64,
    /// Messages dropped as undecodable
    pub skipped: u64,
    /// Store appends that failed
    pub persistence_failures: u64,
    /// Failed reads
    pub receive_errors: u64,
    /// Successful commits
    pub commits: u64,
    /// Failed commits
    pub commit_failures: u64,
    /// Display refreshes
    pub renders: u64,
}

/// Consumer pipeline driver
pub struct ConsumerPipeline<S, St, D> {
    subscriber: S,
    store: St,
    sink: D,
    decoder: Decoder,
    topic: String,
    commit_interval: Duration,
    error_pause: Duration,
    persistence_policy: PersistencePolicy,
    temperature: SlidingWindow<Sample>,
    humidity: SlidingWindow<Sample>,
    log: LogRing<LogLine>,
    state: PipelineState,
    stats: PipelineStats,
}

impl<S, St, D> ConsumerPipeline<S, St, D>
where
    S: Subscriber,
    St: ReadingStore,
    D: DisplaySink,
{
    pub fn new(config: &ConsumerConfig, subscriber: S, store: St, sink: D) -> Self {
        Self {
            subscriber,
            store,
            sink,
            decoder: Decoder::new(config.mode),
            topic: config.topic.clone(),
            commit_interval: config.commit_interval.max(Duration::from_millis(1)),
            error_pause: config.error_pause,
            persistence_policy: config.persistence_policy,
            temperature: SlidingWindow::new(config.window_capacity),
            humidity: SlidingWindow::new(config.window_capacity),
            log: LogRing::new(config.log_capacity),
            state: PipelineState::Connected,
            stats: PipelineStats::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn temperature_window(&self) -> &SlidingWindow<Sample> {
        &self.temperature
    }

    pub fn humidity_window(&self) -> &SlidingWindow<Sample> {
        &self.humidity
    }

    pub fn log(&self) -> &LogRing<LogLine> {
        &self.log
    }

    pub fn subscriber(&self) -> &S {
        &self.subscriber
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Run until `cancel` fires, or until a failure configured as fatal.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<PipelineStats, PipelineError> {
        info!(
            topic = %self.topic,
            mode = %self.decoder.mode(),
            "Consumer started. Listening for messages..."
        );

        let mut commit_tick = interval(self.commit_interval);
        commit_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        commit_tick.tick().await;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.state = PipelineState::IdlePolling;

            let received = tokio::select! {
                _ = commit_tick.tick() => {
                    self.commit();
                    continue;
                }
                received = self.subscriber.next_message(cancel) => received,
            };

            match received {
                Ok(Some(message)) => {
                    self.state = PipelineState::ProcessingMessage;
                    self.process(message)?;
                }
                Ok(None) => break,
                Err(e) => {
                    self.stats.receive_errors += 1;
                    warn!(topic = %self.topic, error = %e, "Error reading message");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(self.error_pause) => {}
                    }
                }
            }
        }

        self.state = PipelineState::Cancelled;
        self.commit();
        info!(
            topic = %self.topic,
            processed = self.stats.processed,
            skipped = self.stats.skipped,
            "Consumer stopped"
        );
        Ok(self.stats.clone())
    }

    /// Handle one message. Only a persistence failure under
    /// [`PersistencePolicy::Halt`] is returned as an error.
    pub fn process(&mut self, message: Message) -> Result<(), PipelineError> {
        self.stats.received += 1;

        let reading = match self.decoder.decode(&message.payload) {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.skipped += 1;
                warn!(
                    topic = %self.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Skipping undecodable message"
                );
                return Ok(());
            }
        };

        let stamped = StampedReading::now(reading);

        if let Err(e) = self.store.append(&stamped) {
            self.stats.persistence_failures += 1;
            match self.persistence_policy {
                PersistencePolicy::Continue => {
                    error!(
                        topic = %self.topic,
                        offset = message.offset,
                        error = %e,
                        "Error writing to store"
                    );
                }
                PersistencePolicy::Halt => {
                    return Err(PipelineError::Persistence {
                        offset: Some(message.offset),
                        source: e,
                    });
                }
            }
        }

        let line = LogLine::from(&stamped);
        info!(offset = message.offset, "{}", line);
        self.log.push(line);

        let timestamp_ms = stamped.received_at.timestamp_millis();
        self.temperature.push(Sample {
            value: reading.temperature,
            timestamp_ms,
        });
        self.humidity.push(Sample {
            value: reading.humidity as f64,
            timestamp_ms,
        });
        self.stats.processed += 1;

        if self.temperature.len() >= 2 && self.humidity.len() >= 2 {
            match self.sink.update(&self.temperature, &self.humidity, &self.log) {
                Ok(()) => self.stats.renders += 1,
                Err(e) => warn!(error = %e, "Render failed"),
            }
        }

        Ok(())
    }

    fn commit(&mut self) {
        match self.subscriber.commit() {
            Ok(()) => self.stats.commits += 1,
            Err(e) => {
                self.stats.commit_failures += 1;
                warn!(topic = %self.topic, error = %e, "Offset commit failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{memory_channel, MemorySubscriber};
    use crate::error::StoreError;
    use crate::protocol::WireMode;

    #[derive(Default)]
    struct VecStore {
        rows: Vec<StampedReading>,
        fail: bool,
    }

    impl ReadingStore for VecStore {
        fn append(&mut self, row: &StampedReading) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Persistence(csv::Error::from(
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                )));
            }
            self.rows.push(*row);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSink {
        updates: Vec<usize>,
    }

    impl DisplaySink for CountingSink {
        fn update(
            &mut self,
            temperature: &SlidingWindow<Sample>,
            _humidity: &SlidingWindow<Sample>,
            _log: &LogRing<LogLine>,
        ) -> std::io::Result<()> {
            self.updates.push(temperature.len());
            Ok(())
        }
    }

    fn pipeline(
        mode: WireMode,
        store: VecStore,
    ) -> ConsumerPipeline<MemorySubscriber, VecStore, CountingSink> {
        let (_publisher, subscriber) = memory_channel("weather");
        let config = ConsumerConfig::new("weather").with_mode(mode);
        ConsumerPipeline::new(&config, subscriber, store, CountingSink::default())
    }

    fn message(offset: i64, payload: &[u8]) -> Message {
        Message {
            payload: payload.to_vec(),
            partition: 0,
            offset,
        }
    }

    #[test]
    fn test_process_persists_and_buffers() {
        let mut pipeline = pipeline(WireMode::Compact, VecStore::default());
        pipeline.process(message(0, &[0x80, 0x01, 0x94])).unwrap();

        assert_eq!(pipeline.store().rows.len(), 1);
        assert_eq!(pipeline.store().rows[0].reading.humidity, 50);
        assert_eq!(pipeline.temperature_window().len(), 1);
        assert_eq!(pipeline.humidity_window().values(), vec![50.0]);
        assert!(pipeline.log().iter().next().unwrap().as_str().contains("Humidity: 50%"));
    }

    #[test]
    fn test_render_needs_two_samples() {
        let mut pipeline = pipeline(WireMode::Compact, VecStore::default());
        pipeline.process(message(0, &[0x80, 0x01, 0x94])).unwrap();
        assert!(pipeline.sink().updates.is_empty());

        pipeline.process(message(1, &[0x80, 0x01, 0x94])).unwrap();
        pipeline.process(message(2, &[0x80, 0x01, 0x94])).unwrap();
        assert_eq!(pipeline.sink().updates, vec![2, 3]);
        assert_eq!(pipeline.stats().renders, 2);
    }

    #[test]
    fn test_undecodable_message_is_skipped() {
        let mut pipeline = pipeline(WireMode::Compact, VecStore::default());
        pipeline.process(message(0, &[0x80, 0x01])).unwrap();

        assert_eq!(pipeline.stats().skipped, 1);
        assert_eq!(pipeline.stats().processed, 0);
        assert!(pipeline.store().rows.is_empty());
        assert!(pipeline.log().is_empty());
    }

    #[test]
    fn test_store_failure_continue_keeps_display() {
        let store = VecStore {
            fail: true,
            ..Default::default()
        };
        let mut pipeline = pipeline(WireMode::Compact, store);
        pipeline.process(message(0, &[0x80, 0x01, 0x94])).unwrap();

        assert_eq!(pipeline.stats().persistence_failures, 1);
        assert_eq!(pipeline.stats().processed, 1);
        assert_eq!(pipeline.log().len(), 1);
    }

    #[test]
    fn test_store_failure_halt_stops() {
        let (_publisher, subscriber) = memory_channel("weather");
        let config = ConsumerConfig::new("weather")
            .with_mode(WireMode::Compact)
            .with_persistence_policy(PersistencePolicy::Halt);
        let store = VecStore {
            fail: true,
            ..Default::default()
        };
        let mut pipeline =
            ConsumerPipeline::new(&config, subscriber, store, CountingSink::default());

        let result = pipeline.process(message(9, &[0x80, 0x01, 0x94]));
        assert!(matches!(
            result,
            Err(PipelineError::Persistence {
                offset: Some(9),
                ..
            })
        ));
        assert!(pipeline.log().is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_sink_reports_at_info() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut temperature = SlidingWindow::new(20);
        let mut humidity = SlidingWindow::new(20);
        for (t, h) in [(20.5, 40.0), (22.25, 45.0)] {
            temperature.push(Sample {
                value: t,
                timestamp_ms: 0,
            });
            humidity.push(Sample {
                value: h,
                timestamp_ms: 0,
            });
        }

        tracing::subscriber::with_default(subscriber, || {
            TracingSink
                .update(&temperature, &humidity, &LogRing::new(20))
                .unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("INFO"), "{}", output);
        assert!(output.contains("window temperature 20.50..22.25"), "{}", output);
        assert!(output.contains("humidity 40..45"), "{}", output);
    }

    #[test]
    fn test_log_line_format() {
        use crate::protocol::{SensorReading, WindDirection};
        use chrono::{Local, TimeZone};

        let at = Local.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap();
        let stamped = StampedReading::new(
            at,
            SensorReading::new(54.5, 61, WindDirection::NorthWest).unwrap(),
        );
        let line = LogLine::from(&stamped);
        assert!(line.as_str().starts_with("Message received - Timestamp: 2025-01-05T08:00:00"));
        assert!(line
            .as_str()
            .ends_with("Temperature: 54.50°C, Humidity: 61%, Wind Direction: NW"));
    }
}

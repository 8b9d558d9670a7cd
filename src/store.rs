// Weatherwire - Durable reading store
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Append-only CSV store for received readings.
//!
//! ```text
//! Timestamp,Temperature (°C),Humidity (%),Wind Direction
//! 2025-03-02T10:15:04+01:00,54.87,61,SW
//! ```
//!
//! The header row is written exactly once, when the file is empty at open.
//! Every row is flushed as soon as it is written.

use crate::error::StoreError;
use crate::protocol::SensorReading;
use chrono::{DateTime, Local, SecondsFormat};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column names, in order
pub const HEADER: [&str; 4] = [
    "Timestamp",
    "Temperature (°C)",
    "Humidity (%)",
    "Wind Direction",
];

/// Default store file name
pub const DEFAULT_STORE_PATH: &str = "sensor_data.csv";

/// A reading stamped with its receipt time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedReading {
    /// Wall-clock time the consumer received the message
    pub received_at: DateTime<Local>,
    pub reading: SensorReading,
}

impl StampedReading {
    pub fn new(received_at: DateTime<Local>, reading: SensorReading) -> Self {
        Self {
            received_at,
            reading,
        }
    }

    /// Stamp a reading with the current time
    pub fn now(reading: SensorReading) -> Self {
        Self::new(Local::now(), reading)
    }

    /// RFC 3339 timestamp, second precision
    pub fn timestamp(&self) -> String {
        self.received_at.to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    /// Row in store column order
    pub fn to_record(&self) -> [String; 4] {
        [
            self.timestamp(),
            format!("{:.2}", self.reading.temperature),
            self.reading.humidity.to_string(),
            self.reading.wind_direction.as_str().to_string(),
        ]
    }
}

/// Durable sink for stamped readings
pub trait ReadingStore {
    /// Append one row
    fn append(&mut self, row: &StampedReading) -> Result<(), StoreError>;
}

/// CSV implementation of [`ReadingStore`]
#[derive(Debug)]
pub struct CsvStore<W: Write = File> {
    writer: csv::Writer<W>,
    path: Option<PathBuf>,
    rows_written: u64,
}

impl CsvStore<File> {
    /// Open or create the store file in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let setup = |source: std::io::Error| StoreError::Setup {
            path: path.display().to_string(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(setup)?;
        let is_empty = file.metadata().map_err(setup)?.len() == 0;

        // A header that cannot be written means the store never came up
        let mut store =
            Self::with_header(file, is_empty).map_err(|e| setup(std::io::Error::from(e)))?;
        store.path = Some(path.to_path_buf());
        Ok(store)
    }
}

impl<W: Write> CsvStore<W> {
    /// Wrap a writer; `is_empty` decides whether the header is written.
    pub fn from_writer(writer: W, is_empty: bool) -> Result<Self, StoreError> {
        Ok(Self::with_header(writer, is_empty)?)
    }

    fn with_header(writer: W, is_empty: bool) -> Result<Self, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        if is_empty {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            writer,
            path: None,
            rows_written: 0,
        })
    }

    /// File path, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Data rows appended through this handle
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Underlying writer
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

impl<W: Write> ReadingStore for CsvStore<W> {
    fn append(&mut self, row: &StampedReading) -> Result<(), StoreError> {
        self.writer.write_record(row.to_record())?;
        self.writer.flush().map_err(csv::Error::from)?;
        self.rows_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WindDirection;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn row(temperature: f64, humidity: i32, dir: WindDirection) -> StampedReading {
        let at = Local.with_ymd_and_hms(2025, 3, 2, 10, 15, 4).unwrap();
        StampedReading::new(at, SensorReading::new(temperature, humidity, dir).unwrap())
    }

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_header_written_once_for_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sensor_data.csv");

        let mut store = CsvStore::open(&path).unwrap();
        store.append(&row(54.87, 61, WindDirection::SouthWest)).unwrap();
        drop(store);

        let content = lines(&path);
        assert_eq!(content.len(), 2);
        assert_eq!(content[0], "Timestamp,Temperature (°C),Humidity (%),Wind Direction");
        assert!(content[1].ends_with(",54.87,61,SW"));
    }

    #[test]
    fn test_reopen_never_rewrites_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sensor_data.csv");

        CsvStore::open(&path)
            .unwrap()
            .append(&row(10.0, 5, WindDirection::North))
            .unwrap();
        let mut store = CsvStore::open(&path).unwrap();
        store.append(&row(20.5, 6, WindDirection::East)).unwrap();
        assert_eq!(store.rows_written(), 1);
        assert_eq!(store.path(), Some(path.as_path()));

        let content = lines(&path);
        assert_eq!(content.len(), 3);
        assert_eq!(content.iter().filter(|l| l.starts_with("Timestamp")).count(), 1);
        assert!(content[2].ends_with(",20.50,6,E"));
    }

    #[test]
    fn test_non_empty_writer_gets_no_header() {
        let mut store = CsvStore::from_writer(Vec::new(), false).unwrap();
        store.append(&row(1.0, 2, WindDirection::West)).unwrap();
        let text = String::from_utf8(store.get_ref().clone()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains("Timestamp"));
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("sensor_data.csv");
        assert!(matches!(
            CsvStore::open(&path),
            Err(StoreError::Setup { .. })
        ));
    }

    struct FullWriter;

    impl Write for FullWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_open_reports_header_failure_as_setup() {
        // Opens fine, rejects every write
        let result = CsvStore::open("/dev/full");
        match result {
            Err(StoreError::Setup { path, .. }) => assert_eq!(path, "/dev/full"),
            other => panic!("expected setup error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_writer_header_failure_is_persistence() {
        assert!(matches!(
            CsvStore::from_writer(FullWriter, true),
            Err(StoreError::Persistence(_))
        ));
        assert!(CsvStore::from_writer(FullWriter, false).is_ok());
    }

    #[test]
    fn test_timestamp_round_trips() {
        let stamped = row(1.0, 2, WindDirection::West);
        let parsed = DateTime::parse_from_rfc3339(&stamped.timestamp()).unwrap();
        assert_eq!(parsed, stamped.received_at);
    }
}

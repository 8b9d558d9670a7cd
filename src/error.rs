//! Error types for weatherwire
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias for weatherwire operations
pub type Result<T> = std::result::Result<T, WeatherError>;

/// Main error type for weatherwire operations
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Encoding or decoding error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Broker channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Durable store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Topic administration error
    #[error("Admin error: {0}")]
    Admin(#[from] AdminError),

    /// Consumer pipeline error
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Validation errors raised by the wire codec.
///
/// Always local and recoverable: the offending frame is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Compact frame is not exactly 3 bytes
    #[error("Invalid frame size: expected {expected} bytes, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    /// Humidity outside [0, 100]
    #[error("Invalid humidity: {0} (must be within 0..=100)")]
    InvalidHumidity(i64),

    /// Temperature outside [0.0, 110.0] or not finite
    #[error("Invalid temperature: {0} (must be within 0.0..=110.0)")]
    InvalidTemperature(f64),

    /// Wind direction not one of the 8 compass points
    #[error("Invalid wind direction: {0:?}")]
    InvalidDirection(String),

    /// Text frame missing a field or carrying an unparseable one
    #[error("Malformed text frame: {0}")]
    MalformedText(String),
}

/// Errors related to the broker channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Broker cannot be reached
    #[error("Cannot reach broker {brokers}: {reason}")]
    Connectivity { brokers: String, reason: String },

    /// Publish was not acknowledged
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// Reading the next message failed
    #[error("Receive failed: {0}")]
    Receive(String),

    /// Offset commit failed
    #[error("Offset commit failed: {0}")]
    Commit(String),

    /// The other side of the channel is gone
    #[error("Disconnected: {reason}")]
    Disconnected { reason: String },
}

/// Errors related to the durable store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store cannot be opened or created (fatal at startup)
    #[error("Cannot open store {path}: {source}")]
    Setup {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Row could not be appended
    #[error("Append failed: {0}")]
    Persistence(#[from] csv::Error),
}

/// Errors related to topic administration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdminError {
    /// Broker cannot be reached
    #[error("Failed to connect to broker {broker}: {reason}")]
    Connectivity { broker: String, reason: String },

    /// Topic creation rejected
    #[error("Failed to create topic {topic}: {reason}")]
    CreateTopic { topic: String, reason: String },

    /// Topic deletion rejected
    #[error("Failed to delete topic {topic}: {reason}")]
    DeleteTopic { topic: String, reason: String },
}

/// Conditions that stop the consumer pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Append failed while the store policy is `Halt`
    #[error("Persistence failure at offset {offset:?}: {source}")]
    Persistence {
        offset: Option<i64>,
        #[source]
        source: StoreError,
    },
}

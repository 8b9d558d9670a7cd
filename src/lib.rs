//! # Weatherwire
//!
//! Weather sensor readings over a publish/subscribe channel.
//!
//! ## Key Features
//!
//! - **Compact frames**: a reading packed into exactly 3 bytes
//! - **Text frames**: self-describing, lossless JSON field maps
//! - **Bounded pipeline**: fixed-size display buffers, cooperative cancellation
//! - **Broker-agnostic**: producer and consumer talk to narrow capability traits
//!
//! ## Quick Start
//!
//! ```rust
//! use weatherwire::{decode_compact, encode_compact, SensorReading, WindDirection};
//!
//! let reading = SensorReading::new(55.0, 50, WindDirection::South).unwrap();
//! let frame = encode_compact(&reading).unwrap();
//! assert_eq!(frame, [0x80, 0x01, 0x94]);
//!
//! let decoded = decode_compact(&frame).unwrap();
//! assert_eq!(decoded.reading.humidity, 50);
//! assert!((decoded.reading.temperature - 55.0).abs() < 0.0067);
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Readings, wind directions, wire modes and frames
//! - [`encoder`]: Reading → frame
//! - [`decoder`]: Frame → reading
//! - [`generator`]: Simulated readings
//! - [`channel`]: Broker capability traits and an in-memory broker
//! - [`producer`]: Generate/publish loop
//! - [`pipeline`]: Subscribe/decode/persist/display loop
//! - [`store`]: Append-only CSV store
//! - [`window`]: Bounded display buffers
//! - [`admin`]: Topic administration

// Modules
pub mod admin;
pub mod channel;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod producer;
pub mod protocol;
pub mod store;
pub mod window;

// Re-exports for convenient access
pub use admin::{MemoryAdmin, TopicAdmin};
pub use channel::{memory_channel, Message, Publisher, Subscriber};
pub use config::{ConsumerConfig, PersistencePolicy, ProducerConfig, TopicSpec};
pub use decoder::{decode_compact, decode_text, CompactDecoded, Decoder, TEMPERATURE_TOLERANCE};
pub use encoder::{encode_compact, encode_text, Encoder};
pub use error::{
    AdminError, ChannelError, CodecError, PipelineError, Result, StoreError, WeatherError,
};
pub use generator::ReadingGenerator;
pub use pipeline::{
    ConsumerPipeline, DisplaySink, LogLine, PipelineState, PipelineStats, TracingSink,
};
pub use producer::{Producer, ProducerStats, StepOutcome};
pub use protocol::{SensorReading, WindDirection, WireFrame, WireMode};
pub use store::{CsvStore, ReadingStore, StampedReading};
pub use window::{LogRing, Sample, SlidingWindow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Configuration types for the producer loop, consumer pipeline and topic
//! administration.

use crate::protocol::WireMode;
use crate::window::DEFAULT_CAPACITY;
use std::time::Duration;
use tracing::warn;

/// Default broker address
pub const DEFAULT_BROKERS: &str = "localhost:9092";

/// Default consumer group
pub const DEFAULT_GROUP_ID: &str = "weather_group";

/// Default message key for published readings
pub const DEFAULT_MESSAGE_KEY: &str = "sensor1";

/// What the consumer does when a row cannot be appended to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistencePolicy {
    /// Report the failure and keep consuming
    #[default]
    Continue,
    /// Stop the pipeline with an error
    Halt,
}

/// Producer loop configuration
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Destination topic
    pub topic: String,
    /// Wire mode, fixed for the run
    pub mode: WireMode,
    /// Minimum delay between messages (seconds)
    pub min_interval_secs: u64,
    /// Maximum delay between messages (seconds)
    pub max_interval_secs: u64,
    /// Key attached to every published message
    pub message_key: String,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            mode: WireMode::Text,
            min_interval_secs: 15,
            max_interval_secs: 30,
            message_key: DEFAULT_MESSAGE_KEY.to_string(),
        }
    }
}

impl ProducerConfig {
    /// Create a configuration for `topic`
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    /// Set the wire mode
    pub fn with_mode(mut self, mode: WireMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the inter-message interval bounds
    pub fn with_intervals(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.min_interval_secs = min_secs;
        self.max_interval_secs = max_secs;
        self
    }

    /// Set the message key
    pub fn with_message_key(mut self, key: impl Into<String>) -> Self {
        self.message_key = key.into();
        self
    }

    /// Interval bounds actually used; a maximum below the minimum is raised
    /// to the minimum, with a warning.
    pub fn effective_intervals(&self) -> (u64, u64) {
        if self.min_interval_secs > self.max_interval_secs {
            warn!(
                min = self.min_interval_secs,
                max = self.max_interval_secs,
                "min-interval is greater than max-interval, using min-interval for both"
            );
            (self.min_interval_secs, self.min_interval_secs)
        } else {
            (self.min_interval_secs, self.max_interval_secs)
        }
    }
}

/// Consumer pipeline configuration
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Source topic
    pub topic: String,
    /// Consumer group id
    pub group_id: String,
    /// Wire mode, fixed for the run
    pub mode: WireMode,
    /// Offset commit cadence
    pub commit_interval: Duration,
    /// Capacity of each chart window
    pub window_capacity: usize,
    /// Capacity of the log panel
    pub log_capacity: usize,
    /// Reaction to store append failures
    pub persistence_policy: PersistencePolicy,
    /// Pause after a failed read before polling again
    pub error_pause: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            mode: WireMode::Text,
            commit_interval: Duration::from_secs(1),
            window_capacity: DEFAULT_CAPACITY,
            log_capacity: DEFAULT_CAPACITY,
            persistence_policy: PersistencePolicy::Continue,
            error_pause: Duration::from_millis(500),
        }
    }
}

impl ConsumerConfig {
    /// Create a configuration for `topic`
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    /// Set the consumer group
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    /// Set the wire mode
    pub fn with_mode(mut self, mode: WireMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the store failure policy
    pub fn with_persistence_policy(mut self, policy: PersistencePolicy) -> Self {
        self.persistence_policy = policy;
        self
    }

    /// Set the commit cadence
    pub fn with_commit_interval(mut self, interval: Duration) -> Self {
        self.commit_interval = interval;
        self
    }
}

/// Topic creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    /// Single partition, single replica
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 1,
            replication_factor: 1,
        }
    }

    pub fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_replication_factor(mut self, replication_factor: i32) -> Self {
        self.replication_factor = replication_factor;
        self
    }
}

//! Topic administration.
//!
//! A thin pass-through to the broker's management API.

use crate::config::TopicSpec;
use crate::error::AdminError;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

/// Broker topic management
#[allow(async_fn_in_trait)]
pub trait TopicAdmin {
    /// Create a topic
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), AdminError>;

    /// Delete a topic
    async fn delete_topic(&self, topic: &str) -> Result<(), AdminError>;
}

/// Create a topic and report the outcome
pub async fn create_topic<A: TopicAdmin>(admin: &A, spec: &TopicSpec) -> Result<(), AdminError> {
    admin.create_topic(spec).await?;
    info!(
        topic = %spec.name,
        partitions = spec.partitions,
        replication_factor = spec.replication_factor,
        "Topic {} created successfully",
        spec.name
    );
    Ok(())
}

/// Delete a topic and report the outcome
pub async fn delete_topic<A: TopicAdmin>(admin: &A, topic: &str) -> Result<(), AdminError> {
    admin.delete_topic(topic).await?;
    info!(topic, "Topic {} deleted successfully", topic);
    Ok(())
}

/// In-memory topic registry
#[derive(Debug, Default)]
pub struct MemoryAdmin {
    topics: Mutex<HashMap<String, TopicSpec>>,
}

impl MemoryAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a topic
    pub fn topic(&self, name: &str) -> Option<TopicSpec> {
        self.topics
            .lock()
            .ok()
            .and_then(|topics| topics.get(name).cloned())
    }
}

impl TopicAdmin for MemoryAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), AdminError> {
        let fail = |reason: &str| AdminError::CreateTopic {
            topic: spec.name.clone(),
            reason: reason.to_string(),
        };
        if spec.partitions < 1 {
            return Err(fail("partition count must be at least 1"));
        }
        if spec.replication_factor < 1 {
            return Err(fail("replication factor must be at least 1"));
        }
        let mut topics = self.topics.lock().map_err(|_| fail("registry poisoned"))?;
        if topics.contains_key(&spec.name) {
            return Err(fail("topic already exists"));
        }
        topics.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn delete_topic(&self, topic: &str) -> Result<(), AdminError> {
        let fail = |reason: &str| AdminError::DeleteTopic {
            topic: topic.to_string(),
            reason: reason.to_string(),
        };
        let mut topics = self.topics.lock().map_err(|_| fail("registry poisoned"))?;
        topics
            .remove(topic)
            .map(|_| ())
            .ok_or_else(|| fail("unknown topic"))
    }
}

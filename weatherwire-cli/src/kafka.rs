// Weatherwire CLI - Kafka adapters
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Kafka implementations of the weatherwire capability traits.

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::Message as _;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use weatherwire::{
    AdminError, ChannelError, Message, Publisher, Subscriber, TopicAdmin, TopicSpec, WireFrame,
};

/// How long to wait for broker metadata at startup
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a publish may wait in the local queue
const QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the broker may take to apply a topic change
const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a blocking librdkafka call on the blocking pool.
async fn off_runtime<T, F>(call: F) -> Result<T, String>
where
    F: FnOnce() -> KafkaResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Publisher backed by an `rdkafka` future producer, acks from all replicas.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    key: String,
}

impl KafkaPublisher {
    /// Connect and verify the broker is reachable.
    pub async fn connect(brokers: &str, topic: &str, key: &str) -> Result<Self, ChannelError> {
        let connectivity = |reason: String| ChannelError::Connectivity {
            brokers: brokers.to_string(),
            reason,
        };

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .create()
            .map_err(|e| connectivity(e.to_string()))?;

        let handle = producer.clone();
        let owned_topic = topic.to_string();
        let broker_count = off_runtime(move || {
            handle
                .client()
                .fetch_metadata(Some(&owned_topic), METADATA_TIMEOUT)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(connectivity)?;
        debug!(brokers = broker_count, topic, "Broker metadata fetched");

        Ok(Self {
            producer,
            topic: topic.to_string(),
            key: key.to_string(),
        })
    }
}

impl Publisher for KafkaPublisher {
    async fn publish(&mut self, frame: &WireFrame) -> Result<(), ChannelError> {
        let record = FutureRecord::to(&self.topic)
            .key(self.key.as_str())
            .payload(frame.as_bytes());

        match self.producer.send(record, QUEUE_TIMEOUT).await {
            Ok((partition, offset)) => {
                debug!(partition, offset, "Delivery acknowledged");
                Ok(())
            }
            Err((e, _)) => Err(ChannelError::Publish {
                topic: self.topic.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Subscriber backed by an `rdkafka` stream consumer.
///
/// Reads from the earliest offset when the group has none, with automatic
/// commits disabled; [`Subscriber::commit`] commits the consumer position.
pub struct KafkaSubscriber {
    consumer: StreamConsumer,
}

impl KafkaSubscriber {
    /// Connect, verify the broker is reachable and subscribe to `topic`.
    pub async fn connect(
        brokers: &str,
        group_id: &str,
        topic: &str,
    ) -> Result<Self, ChannelError> {
        let connectivity = |reason: String| ChannelError::Connectivity {
            brokers: brokers.to_string(),
            reason,
        };

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| connectivity(e.to_string()))?;

        let owned_topic = topic.to_string();
        let consumer = off_runtime(move || {
            consumer.fetch_metadata(Some(&owned_topic), METADATA_TIMEOUT)?;
            consumer.subscribe(&[owned_topic.as_str()])?;
            Ok(consumer)
        })
        .await
        .map_err(connectivity)?;
        info!(topic, group_id, "Subscribed");

        Ok(Self { consumer })
    }
}

impl Subscriber for KafkaSubscriber {
    async fn next_message(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Message>, ChannelError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            received = self.consumer.recv() => match received {
                Ok(message) => Ok(Some(Message {
                    payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                    partition: message.partition(),
                    offset: message.offset(),
                })),
                Err(e) => Err(ChannelError::Receive(e.to_string())),
            },
        }
    }

    fn commit(&mut self) -> Result<(), ChannelError> {
        match self.consumer.commit_consumer_state(CommitMode::Async) {
            Ok(()) => Ok(()),
            // Nothing consumed since the last commit
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => Ok(()),
            Err(e) => Err(ChannelError::Commit(e.to_string())),
        }
    }
}

/// Topic administration through the Kafka admin API.
pub struct KafkaAdmin {
    client: AdminClient<DefaultClientContext>,
}

impl KafkaAdmin {
    /// Connect and verify the broker is reachable.
    pub async fn connect(broker: &str) -> Result<Self, AdminError> {
        let connectivity = |reason: String| AdminError::Connectivity {
            broker: broker.to_string(),
            reason,
        };

        let client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", broker)
            .create()
            .map_err(|e| connectivity(e.to_string()))?;

        let client = off_runtime(move || {
            client.inner().fetch_metadata(None, METADATA_TIMEOUT)?;
            Ok(client)
        })
        .await
        .map_err(connectivity)?;

        Ok(Self { client })
    }

    fn options() -> AdminOptions {
        AdminOptions::new().operation_timeout(Some(OPERATION_TIMEOUT))
    }
}

impl TopicAdmin for KafkaAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), AdminError> {
        let fail = |reason: String| AdminError::CreateTopic {
            topic: spec.name.clone(),
            reason,
        };

        let topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication_factor),
        );
        let results = self
            .client
            .create_topics(&[topic], &Self::options())
            .await
            .map_err(|e| fail(e.to_string()))?;

        for result in results {
            result.map_err(|(_, code)| fail(code.to_string()))?;
        }
        Ok(())
    }

    async fn delete_topic(&self, topic: &str) -> Result<(), AdminError> {
        let fail = |reason: String| AdminError::DeleteTopic {
            topic: topic.to_string(),
            reason,
        };

        let results = self
            .client
            .delete_topics(&[topic], &Self::options())
            .await
            .map_err(|e| fail(e.to_string()))?;

        for result in results {
            result.map_err(|(_, code)| fail(code.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::time::sleep;

    // Nothing listens on port 1: metadata fetches run until their timeout.
    const UNREACHABLE: &str = "127.0.0.1:1";

    #[tokio::test(flavor = "current_thread")]
    async fn test_connect_does_not_block_the_runtime() {
        let started = Instant::now();
        tokio::select! {
            _ = sleep(Duration::from_millis(200)) => {}
            result = KafkaAdmin::connect(UNREACHABLE) => {
                assert!(matches!(result, Err(AdminError::Connectivity { .. })));
            }
        }
        assert!(started.elapsed() < METADATA_TIMEOUT / 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_publisher_connect_does_not_block_the_runtime() {
        let started = Instant::now();
        tokio::select! {
            _ = sleep(Duration::from_millis(200)) => {}
            result = KafkaPublisher::connect(UNREACHABLE, "weather", "sensor1") => {
                assert!(matches!(result, Err(ChannelError::Connectivity { .. })));
            }
        }
        assert!(started.elapsed() < METADATA_TIMEOUT / 2);
    }
}

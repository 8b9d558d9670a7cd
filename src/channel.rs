// Weatherwire - Broker channel abstraction
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Channel abstraction module
//!
//! This module provides the narrow capability traits the producer loop and
//! consumer pipeline use to talk to a message broker, plus an in-memory
//! implementation for tests and local runs.

use crate::error::ChannelError;
use crate::protocol::WireFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A message as delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw frame bytes
    pub payload: Vec<u8>,
    /// Partition the message was read from
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
}

/// Statistics about channel usage
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Total bytes published
    pub bytes_sent: AtomicU64,
    /// Total messages published
    pub messages_sent: AtomicU64,
    /// Total messages delivered to the subscriber
    pub messages_received: AtomicU64,
    /// Successful offset commits
    pub commits: AtomicU64,
}

impl ChannelMetrics {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters: (bytes_sent, messages_sent,
    /// messages_received, commits)
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.bytes_sent.load(Ordering::Relaxed),
            self.messages_sent.load(Ordering::Relaxed),
            self.messages_received.load(Ordering::Relaxed),
            self.commits.load(Ordering::Relaxed),
        )
    }
}

/// Sending half of a broker connection
#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Publish a frame and wait for full acknowledgment.
    async fn publish(&mut self, frame: &WireFrame) -> Result<(), ChannelError>;
}

/// Receiving half of a broker connection
#[allow(async_fn_in_trait)]
pub trait Subscriber {
    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` as soon as `cancel` fires, without consuming a
    /// message. Dropping the returned future must not lose a message.
    async fn next_message(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Message>, ChannelError>;

    /// Commit the offsets of everything delivered so far.
    fn commit(&mut self) -> Result<(), ChannelError>;
}

type Delivery = Result<Message, ChannelError>;

/// Create a connected in-memory publisher/subscriber pair for `topic`.
pub fn memory_channel(topic: &str) -> (MemoryPublisher, MemorySubscriber) {
    let (tx, rx) = mpsc::unbounded_channel();
    let metrics = Arc::new(ChannelMetrics::default());
    (
        MemoryPublisher {
            topic: topic.to_string(),
            tx,
            next_offset: 0,
            fail_next: 0,
            metrics: Arc::clone(&metrics),
        },
        MemorySubscriber {
            rx,
            last_delivered: None,
            committed: None,
            fail_commits: false,
            metrics,
        },
    )
}

/// In-memory publisher
#[derive(Debug)]
pub struct MemoryPublisher {
    topic: String,
    tx: mpsc::UnboundedSender<Delivery>,
    next_offset: i64,
    fail_next: usize,
    metrics: Arc<ChannelMetrics>,
}

impl MemoryPublisher {
    /// Make the next `n` publishes fail
    pub fn fail_next(&mut self, n: usize) {
        self.fail_next = n;
    }

    /// Deliver arbitrary bytes, bypassing the encoder
    pub fn send_raw(&mut self, payload: Vec<u8>) -> Result<i64, ChannelError> {
        let offset = self.next_offset;
        let size = payload.len() as u64;
        self.tx
            .send(Ok(Message {
                payload,
                partition: 0,
                offset,
            }))
            .map_err(|_| ChannelError::Disconnected {
                reason: "subscriber dropped".to_string(),
            })?;
        self.next_offset += 1;
        ChannelMetrics::bump(&self.metrics.bytes_sent, size);
        ChannelMetrics::bump(&self.metrics.messages_sent, 1);
        Ok(offset)
    }

    /// Deliver a receive error to the subscriber, in order with messages
    pub fn inject_receive_error(&mut self, error: ChannelError) {
        let _ = self.tx.send(Err(error));
    }

    /// Shared channel metrics
    pub fn metrics(&self) -> Arc<ChannelMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Publisher for MemoryPublisher {
    async fn publish(&mut self, frame: &WireFrame) -> Result<(), ChannelError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ChannelError::Publish {
                topic: self.topic.clone(),
                reason: "injected failure".to_string(),
            });
        }
        self.send_raw(frame.as_bytes().to_vec()).map(|_| ())
    }
}

/// In-memory subscriber
#[derive(Debug)]
pub struct MemorySubscriber {
    rx: mpsc::UnboundedReceiver<Delivery>,
    last_delivered: Option<i64>,
    committed: Option<i64>,
    fail_commits: bool,
    metrics: Arc<ChannelMetrics>,
}

impl MemorySubscriber {
    /// Offset of the last committed message
    pub fn committed_offset(&self) -> Option<i64> {
        self.committed
    }

    /// Make every commit fail
    pub fn set_fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    /// Messages still queued
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Shared channel metrics
    pub fn metrics(&self) -> Arc<ChannelMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Subscriber for MemorySubscriber {
    async fn next_message(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Message>, ChannelError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            delivery = self.rx.recv() => match delivery {
                Some(Ok(message)) => {
                    self.last_delivered = Some(message.offset);
                    ChannelMetrics::bump(&self.metrics.messages_received, 1);
                    Ok(Some(message))
                }
                Some(Err(e)) => Err(e),
                None => {
                    // No publisher left: idle until cancelled
                    cancel.cancelled().await;
                    Ok(None)
                }
            },
        }
    }

    fn commit(&mut self) -> Result<(), ChannelError> {
        if self.fail_commits {
            return Err(ChannelError::Commit("injected failure".to_string()));
        }
        if self.last_delivered.is_some() {
            self.committed = self.last_delivered;
        }
        ChannelMetrics::bump(&self.metrics.commits, 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(byte: u8) -> WireFrame {
        WireFrame::Compact([byte, 0x00, 0x00])
    }

    #[tokio::test]
    async fn test_memory_channel_send_receive() {
        let (mut publisher, mut subscriber) = memory_channel("weather");
        let cancel = CancellationToken::new();

        publisher.publish(&frame(1)).await.unwrap();
        publisher.publish(&frame(2)).await.unwrap();
        assert_eq!(subscriber.pending(), 2);

        let first = subscriber.next_message(&cancel).await.unwrap().unwrap();
        let second = subscriber.next_message(&cancel).await.unwrap().unwrap();
        assert_eq!((first.offset, first.payload[0]), (0, 1));
        assert_eq!((second.offset, second.payload[0]), (1, 2));
    }

    #[tokio::test]
    async fn test_publish_failure_injection() {
        let (mut publisher, subscriber) = memory_channel("weather");
        publisher.fail_next(1);

        assert!(matches!(
            publisher.publish(&frame(1)).await,
            Err(ChannelError::Publish { .. })
        ));
        publisher.publish(&frame(2)).await.unwrap();
        assert_eq!(subscriber.pending(), 1);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_pending_read() {
        let (_publisher, mut subscriber) = memory_channel("weather");
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), subscriber.next_message(&cancel))
            .await
            .expect("read did not unblock");
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn test_cancel_wins_over_queued_message() {
        let (mut publisher, mut subscriber) = memory_channel("weather");
        publisher.publish(&frame(1)).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(subscriber.next_message(&cancel).await, Ok(None));
        assert_eq!(subscriber.pending(), 1);
    }

    #[tokio::test]
    async fn test_commit_tracks_last_delivered() {
        let (mut publisher, mut subscriber) = memory_channel("weather");
        let cancel = CancellationToken::new();

        subscriber.commit().unwrap();
        assert_eq!(subscriber.committed_offset(), None);

        publisher.publish(&frame(1)).await.unwrap();
        publisher.publish(&frame(2)).await.unwrap();
        subscriber.next_message(&cancel).await.unwrap();
        subscriber.commit().unwrap();
        assert_eq!(subscriber.committed_offset(), Some(0));

        subscriber.set_fail_commits(true);
        assert!(subscriber.commit().is_err());

        let (bytes, sent, received, commits) = subscriber.metrics().snapshot();
        assert_eq!((bytes, sent, received, commits), (6, 2, 1, 2));
    }

    #[tokio::test]
    async fn test_injected_receive_error_is_delivered_in_order() {
        let (mut publisher, mut subscriber) = memory_channel("weather");
        let cancel = CancellationToken::new();

        publisher.inject_receive_error(ChannelError::Receive("broker hiccup".to_string()));
        publisher.publish(&frame(7)).await.unwrap();

        assert!(subscriber.next_message(&cancel).await.is_err());
        let message = subscriber.next_message(&cancel).await.unwrap().unwrap();
        assert_eq!(message.payload[0], 7);
    }
}

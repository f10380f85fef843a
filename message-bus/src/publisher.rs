//! Best-effort publisher
//!
//! The fan-out channel is an advisory broadcast and never the system of
//! record: publishing has no return value and no delivery guarantee. Clients
//! that miss messages reconcile against the ordered event log.

use crate::types::{Message, Topic};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Capability for fanning out committed events to observers
#[async_trait]
pub trait Publisher<T>: Send + Sync {
    /// Publish to a topic. Best effort; delivery failures are swallowed.
    async fn publish(&self, topic: &Topic, message: Message<T>);
}

/// In-process broadcast bus, one channel per topic
pub struct BroadcastBus<T> {
    channels: DashMap<Topic, broadcast::Sender<Message<T>>>,
    capacity: usize,
}

impl<T: Clone> BroadcastBus<T> {
    /// Create a bus whose per-topic channels buffer `capacity` messages.
    /// Slow subscribers that fall further behind observe a lag gap and are
    /// expected to reconcile from the event log.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    fn sender(&self, topic: &Topic) -> broadcast::Sender<Message<T>> {
        self.channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to a topic
    pub fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<Message<T>> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to a topic as a stream
    pub fn subscribe_stream(&self, topic: &Topic) -> BroadcastStream<Message<T>>
    where
        T: Send + 'static,
    {
        BroadcastStream::new(self.subscribe(topic))
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Publisher<T> for BroadcastBus<T> {
    async fn publish(&self, topic: &Topic, message: Message<T>) {
        // A send error only means nobody is listening right now
        if self.sender(topic).send(message).is_err() {
            tracing::trace!(topic = %topic, "No subscribers for broadcast");
        }
    }
}

/// Publisher that drops everything, for tests and headless deployments
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl<T: Send + 'static> Publisher<T> for NoopPublisher {
    async fn publish(&self, _topic: &Topic, _message: Message<T>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_subscriber() {
        let bus: BroadcastBus<String> = BroadcastBus::new(16);
        let topic = Topic::new("payout");
        let mut rx = bus.subscribe(&topic);

        bus.publish(&topic, Message::new("hello".to_string())).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.payload, "hello");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus: BroadcastBus<String> = BroadcastBus::new(16);
        let topic = Topic::new("payout");

        // Nobody listening; must not error or panic
        bus.publish(&topic, Message::new("dropped".to_string()))
            .await;
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus: BroadcastBus<u32> = BroadcastBus::new(16);
        let payouts = Topic::new("payout");
        let ledger = Topic::new("ledger_transaction");

        let mut rx = bus.subscribe(&payouts);
        bus.publish(&ledger, Message::new(1)).await;
        bus.publish(&payouts, Message::new(2)).await;

        assert_eq!(rx.recv().await.unwrap().payload, 2);
    }

    #[tokio::test]
    async fn test_noop_publisher() {
        let publisher = NoopPublisher;
        publisher
            .publish(&Topic::new("payout"), Message::new(42u32))
            .await;
    }
}

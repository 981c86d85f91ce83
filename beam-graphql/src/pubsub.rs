use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::Value;
use async_stream::stream;
use futures_util::Stream;
use parking_lot::RwLock;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::config::PubSubConfig;

/// In-process topic broker backing GraphQL subscriptions.
///
/// One broadcast channel per topic, created on first use.
#[derive(Clone, Debug)]
pub struct PubSub {
    capacity: usize,
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<Value>>>>,
}

impl PubSub {
    pub fn new(config: &PubSubConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Value> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.clone();
        }
        self.topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish a payload. Returns how many subscribers received it.
    pub fn publish(&self, topic: &str, payload: Value) -> usize {
        self.sender(topic).send(payload).unwrap_or(0)
    }

    pub fn subscribe(&self, topic: &str) -> impl Stream<Item = Value> + Send + 'static {
        let mut receiver = self.sender(topic).subscribe();
        let topic = topic.to_string();

        stream! {
            loop {
                match receiver.recv().await {
                    Ok(payload) => yield payload,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %topic, skipped, "Subscription lagged, skipped events");
                    }
                }
            }
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}

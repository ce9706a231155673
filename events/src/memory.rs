//! In-process [`MessageBus`] used by tests in place of Redis.

use crate::error::Error;
use crate::{MessageBus, Payload, Subscription};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

/// Channel-per-name broadcast bus. Cloning shares the same channels.
#[derive(Clone, Default)]
pub struct MemoryBus {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<Payload>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a payload and returns how many subscribers it was delivered to.
    pub fn publish(&self, channel: &str, payload: impl Into<Payload>) -> usize {
        let channels = self.channels.lock().unwrap();
        match channels.get(channel) {
            Some(sender) => sender.send(payload.into()).unwrap_or(0),
            None => 0,
        }
    }

    /// Number of live subscriptions on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().unwrap();
        channels
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Waits until the channel has exactly `count` subscribers.
    pub async fn wait_for_subscribers(&self, channel: &str, count: usize) {
        while self.subscriber_count(channel) != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, Error> {
        let mut receiver = {
            let mut channels = self.channels.lock().unwrap();
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };

        let messages = stream! {
            loop {
                match receiver.recv().await {
                    Ok(payload) => yield payload,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(messages.boxed())
    }
}

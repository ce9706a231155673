//! Subscription bridge between the message bus and connection queues.
//!
//! Per-user topology: every connection gets its own bus subscription and a task that forwards
//! each payload into that connection's queue. Shared topology: one process-wide subscription
//! feeds the broadcaster. In both cases payloads are forwarded verbatim and in receive order,
//! and the bus-receive loop never waits on a slow consumer.

use crate::broadcaster::BroadcasterHandle;
use crate::connection::{EnqueueError, QueueProducer};
use events::{Identity, MessageBus};
use futures::StreamExt;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Delay before the shared subscription is re-established after failing or ending.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Spawns the forwarding task for one connection. The task owns the only producer of the
/// connection queue, so the queue closes when the task exits.
pub(crate) fn spawn_user_bridge(
    bus: Arc<dyn MessageBus>,
    channel: String,
    identity: Identity,
    producer: QueueProducer,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_user_bridge(bus, channel, identity, producer, cancel))
}

async fn run_user_bridge(
    bus: Arc<dyn MessageBus>,
    channel: String,
    identity: Identity,
    producer: QueueProducer,
    cancel: CancellationToken,
) {
    info!("Subscribing to channel {channel} for user {identity}");

    let subscription = tokio::select! {
        _ = cancel.cancelled() => return,
        subscription = bus.subscribe(&channel) => subscription,
    };

    let mut subscription = match subscription {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Failed to subscribe to {channel}: {e}");
            return;
        }
    };

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Stopping subscription for user {identity}");
                break;
            }
            next = subscription.next() => next,
        };

        let Some(payload) = next else {
            warn!("Subscription to {channel} ended for user {identity}");
            break;
        };

        debug!("User {identity} received message: {payload}");
        match producer.try_enqueue(payload) {
            Ok(()) => {}
            Err(EnqueueError::Full(_)) => {
                warn!("Dropping message for user {identity} (client slow)");
            }
            Err(EnqueueError::Closed(_)) => {
                debug!("Queue for user {identity} closed, stopping subscription");
                break;
            }
        }
    }
}

/// Spawns the single process-wide subscription that feeds the broadcaster. Runs until
/// `shutdown` is cancelled, re-subscribing after failures.
pub(crate) fn spawn_shared_bridge(
    bus: Arc<dyn MessageBus>,
    channel: String,
    broadcaster: BroadcasterHandle,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_shared_bridge(bus, channel, broadcaster, shutdown))
}

async fn run_shared_bridge(
    bus: Arc<dyn MessageBus>,
    channel: String,
    broadcaster: BroadcasterHandle,
    shutdown: CancellationToken,
) {
    loop {
        let subscription = tokio::select! {
            _ = shutdown.cancelled() => return,
            subscription = bus.subscribe(&channel) => subscription,
        };

        match subscription {
            Ok(mut subscription) => {
                info!("Subscribed to broadcast channel {channel}");
                loop {
                    let next = tokio::select! {
                        _ = shutdown.cancelled() => return,
                        next = subscription.next() => next,
                    };
                    match next {
                        Some(payload) => broadcaster.broadcast(payload),
                        None => break,
                    }
                }
                warn!("Broadcast subscription to {channel} ended");
            }
            Err(e) => error!("Failed to subscribe to broadcast channel {channel}: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::bounded_queue;
    use async_trait::async_trait;
    use events::{Error, ErrorKind, MemoryBus, Subscription};
    use tokio::time::timeout;

    const CHANNEL: &str = "events:user:42";
    const WAIT: Duration = Duration::from_secs(1);

    struct UnreachableBus;

    #[async_trait]
    impl MessageBus for UnreachableBus {
        async fn subscribe(&self, _channel: &str) -> Result<Subscription, Error> {
            Err(Error::new(ErrorKind::Connection, "connection refused"))
        }
    }

    fn spawn_for_42(
        bus: &MemoryBus,
        capacity: usize,
    ) -> (crate::connection::QueueConsumer, CancellationToken, JoinHandle<()>) {
        let (producer, consumer) = bounded_queue(capacity);
        let cancel = CancellationToken::new();
        let handle = spawn_user_bridge(
            Arc::new(bus.clone()),
            CHANNEL.to_string(),
            Identity::Numeric(42),
            producer,
            cancel.clone(),
        );
        (consumer, cancel, handle)
    }

    #[tokio::test]
    async fn test_user_bridge_forwards_payloads_verbatim_and_in_order() {
        let bus = MemoryBus::new();
        let (mut consumer, _cancel, _handle) = spawn_for_42(&bus, 10);
        timeout(WAIT, bus.wait_for_subscribers(CHANNEL, 1))
            .await
            .unwrap();

        bus.publish(CHANNEL, "m1");
        bus.publish(CHANNEL, r#"{"event":"ping"}"#);
        bus.publish(CHANNEL, "m3");

        assert_eq!(consumer.recv().await.as_deref(), Some("m1"));
        assert_eq!(consumer.recv().await.as_deref(), Some(r#"{"event":"ping"}"#));
        assert_eq!(consumer.recv().await.as_deref(), Some("m3"));
    }

    #[tokio::test]
    async fn test_user_bridge_drops_messages_when_queue_is_full() {
        let bus = MemoryBus::new();
        let (mut consumer, _cancel, _handle) = spawn_for_42(&bus, 3);
        timeout(WAIT, bus.wait_for_subscribers(CHANNEL, 1))
            .await
            .unwrap();

        for i in 0..10 {
            bus.publish(CHANNEL, format!("m{i}"));
        }
        // Let the bridge drain the subscription into the full queue
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(consumer.recv().await.as_deref(), Some("m0"));
        assert_eq!(consumer.recv().await.as_deref(), Some("m1"));
        assert_eq!(consumer.recv().await.as_deref(), Some("m2"));

        // The bridge kept receiving instead of blocking, the next message gets through
        bus.publish(CHANNEL, "after");
        assert_eq!(
            timeout(WAIT, consumer.recv()).await.unwrap().as_deref(),
            Some("after")
        );
    }

    #[tokio::test]
    async fn test_user_bridge_unsubscribes_on_cancel() {
        let bus = MemoryBus::new();
        let (mut consumer, cancel, handle) = spawn_for_42(&bus, 10);
        timeout(WAIT, bus.wait_for_subscribers(CHANNEL, 1))
            .await
            .unwrap();

        cancel.cancel();
        timeout(WAIT, handle).await.unwrap().unwrap();

        assert_eq!(bus.subscriber_count(CHANNEL), 0);
        assert_eq!(consumer.recv().await, None);
    }

    #[tokio::test]
    async fn test_user_bridge_closes_queue_when_subscribe_fails() {
        let (producer, mut consumer) = bounded_queue(10);
        let handle = spawn_user_bridge(
            Arc::new(UnreachableBus),
            CHANNEL.to_string(),
            Identity::Numeric(42),
            producer,
            CancellationToken::new(),
        );

        timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(consumer.recv().await, None);
    }

    #[tokio::test]
    async fn test_shared_bridge_feeds_broadcaster() {
        let bus = MemoryBus::new();
        let shutdown = CancellationToken::new();
        let broadcaster = BroadcasterHandle::spawn(shutdown.clone());
        let (producer, mut consumer) = bounded_queue(10);
        broadcaster.register(crate::connection::ConnectionId::new(), producer);

        let handle = spawn_shared_bridge(
            Arc::new(bus.clone()),
            "events:broadcast".to_string(),
            broadcaster,
            shutdown.clone(),
        );
        timeout(WAIT, bus.wait_for_subscribers("events:broadcast", 1))
            .await
            .unwrap();

        bus.publish("events:broadcast", "to everyone");
        assert_eq!(consumer.recv().await.as_deref(), Some("to everyone"));

        shutdown.cancel();
        timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(bus.subscriber_count("events:broadcast"), 0);
    }
}

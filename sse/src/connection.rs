use crate::broadcaster::BroadcasterHandle;
use events::{Identity, Payload};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a payload could not be placed on a connection queue. The payload is handed back.
#[derive(Debug, PartialEq)]
pub enum EnqueueError {
    /// The queue already holds `capacity` undelivered payloads.
    Full(Payload),
    /// The consuming side of the queue is gone.
    Closed(Payload),
}

/// Largest queue a connection may hold.
pub const MAX_QUEUE_CAPACITY: usize = u16::MAX as usize;

/// Creates a bounded FIFO queue for one connection. The capacity is clamped to
/// `1..=MAX_QUEUE_CAPACITY`.
pub fn bounded_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (sender, receiver) = mpsc::channel(capacity.clamp(1, MAX_QUEUE_CAPACITY));
    (QueueProducer { sender }, QueueConsumer { receiver })
}

/// Producing half of a connection queue, held by the bridge or the broadcaster.
#[derive(Debug, Clone)]
pub struct QueueProducer {
    sender: mpsc::Sender<Payload>,
}

impl QueueProducer {
    /// Non-blocking enqueue. Fails fast when the queue is full or closed, it never waits
    /// for the consumer to make room.
    pub fn try_enqueue(&self, payload: Payload) -> Result<(), EnqueueError> {
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(payload) => EnqueueError::Full(payload),
            TrySendError::Closed(payload) => EnqueueError::Closed(payload),
        })
    }
}

/// Consuming half of a connection queue, owned by the dispatcher loop.
#[derive(Debug)]
pub struct QueueConsumer {
    receiver: mpsc::Receiver<Payload>,
}

impl QueueConsumer {
    /// Waits for the next payload. Returns `None` once every producer is gone and the
    /// queue has been drained.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }
}

/// Count of connections that have been opened and not yet dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct ActiveConnections(Arc<AtomicUsize>);

impl ActiveConnections {
    pub(crate) fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tears a connection down when it is dropped: cancels its token (stopping the bridge
/// task), deregisters it from the broadcaster and releases its slot in the active count.
#[derive(Debug)]
pub(crate) struct ConnectionLifetime {
    pub(crate) id: ConnectionId,
    pub(crate) cancel: CancellationToken,
    pub(crate) active: ActiveConnections,
    pub(crate) registration: Option<BroadcasterHandle>,
}

impl Drop for ConnectionLifetime {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(broadcaster) = self.registration.take() {
            broadcaster.deregister(self.id.clone());
        }
        self.active.decrement();
    }
}

/// One open streaming session.
///
/// The connection owns the consuming side of its queue. Whoever was handed the
/// producing side (a per-user bridge task or the broadcaster) is the only writer.
#[derive(Debug)]
pub struct Connection {
    pub(crate) identity: Identity,
    pub(crate) queue: QueueConsumer,
    pub(crate) lifetime: ConnectionLifetime,
}

impl Connection {
    pub fn id(&self) -> &ConnectionId {
        &self.lifetime.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Token cancelled when the connection is dropped or the server shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.lifetime.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_try_enqueue_never_exceeds_capacity() {
        let (producer, _consumer) = bounded_queue(10);

        let accepted = (0..25)
            .map(|i| producer.try_enqueue(format!("m{i}")))
            .filter(Result::is_ok)
            .count();

        assert_eq!(accepted, 10);
        assert_eq!(
            producer.try_enqueue("overflow".to_string()),
            Err(EnqueueError::Full("overflow".to_string()))
        );
    }

    #[test]
    fn test_try_enqueue_reports_closed_queue() {
        let (producer, consumer) = bounded_queue(10);
        drop(consumer);

        assert_eq!(
            producer.try_enqueue("late".to_string()),
            Err(EnqueueError::Closed("late".to_string()))
        );
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (producer, _consumer) = bounded_queue(0);

        assert!(producer.try_enqueue("first".to_string()).is_ok());
        assert!(matches!(
            producer.try_enqueue("second".to_string()),
            Err(EnqueueError::Full(_))
        ));
    }

    #[test]
    fn test_oversized_capacity_is_clamped() {
        let (producer, _consumer) = bounded_queue(usize::MAX);

        let accepted = (0..=MAX_QUEUE_CAPACITY)
            .map(|i| producer.try_enqueue(i.to_string()))
            .filter(Result::is_ok)
            .count();

        assert_eq!(accepted, MAX_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn test_queue_is_fifo_and_closes_after_producer_drop() {
        let (producer, mut consumer) = bounded_queue(10);
        for payload in ["m1", "m2", "m3"] {
            producer.try_enqueue(payload.to_string()).unwrap();
        }
        drop(producer);

        assert_eq!(consumer.recv().await.as_deref(), Some("m1"));
        assert_eq!(consumer.recv().await.as_deref(), Some("m2"));
        assert_eq!(consumer.recv().await.as_deref(), Some("m3"));
        assert_eq!(consumer.recv().await, None);
    }

    #[test]
    fn test_dropping_lifetime_cancels_token_and_releases_slot() {
        let active = ActiveConnections::default();
        let cancel = CancellationToken::new();
        active.increment();

        let lifetime = ConnectionLifetime {
            id: ConnectionId::new(),
            cancel: cancel.clone(),
            active: active.clone(),
            registration: None,
        };
        assert_eq!(active.get(), 1);

        drop(lifetime);

        assert!(cancel.is_cancelled());
        assert_eq!(active.get(), 0);
    }
}

//! Shared-topology fan-out.
//!
//! A single coordinator task exclusively owns the registry of connection queues. Every
//! other task talks to it through a [`BroadcasterHandle`], whose methods only send
//! commands, so registration, deregistration and broadcast iteration are serialized and
//! the registry is never touched from two tasks.

use crate::connection::{ConnectionId, EnqueueError, QueueProducer};
use events::Payload;
use log::*;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
enum Command {
    Register {
        id: ConnectionId,
        producer: QueueProducer,
    },
    Deregister {
        id: ConnectionId,
    },
    Broadcast {
        payload: Payload,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the coordinator task.
#[derive(Debug, Clone)]
pub struct BroadcasterHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl BroadcasterHandle {
    /// Spawns the coordinator. It runs until `shutdown` is cancelled or every handle is dropped,
    /// then drops all registered queues so their streams end.
    pub fn spawn(shutdown: CancellationToken) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(receiver, shutdown));
        Self { commands }
    }

    pub fn register(&self, id: ConnectionId, producer: QueueProducer) {
        self.send(Command::Register { id, producer });
    }

    pub fn deregister(&self, id: ConnectionId) {
        self.send(Command::Deregister { id });
    }

    pub fn broadcast(&self, payload: Payload) {
        self.send(Command::Broadcast { payload });
    }

    /// Number of registered connections, or zero once the coordinator has stopped.
    pub async fn connection_count(&self) -> usize {
        let (reply, response) = oneshot::channel();
        self.send(Command::Count { reply });
        response.await.unwrap_or(0)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("SSE broadcaster has stopped, dropping command");
        }
    }
}

async fn run(mut commands: mpsc::UnboundedReceiver<Command>, shutdown: CancellationToken) {
    let mut registry: HashMap<ConnectionId, QueueProducer> = HashMap::new();

    loop {
        let command = tokio::select! {
            _ = shutdown.cancelled() => break,
            command = commands.recv() => command,
        };

        let Some(command) = command else {
            break;
        };

        match command {
            Command::Register { id, producer } => {
                debug!("Registered SSE connection {}", id.as_str());
                registry.insert(id, producer);
            }
            Command::Deregister { id } => {
                if registry.remove(&id).is_some() {
                    debug!("Deregistered SSE connection {}", id.as_str());
                }
            }
            Command::Broadcast { payload } => broadcast(&mut registry, &payload),
            Command::Count { reply } => {
                let _ = reply.send(registry.len());
            }
        }
    }

    info!(
        "SSE broadcaster stopped, closing {} connection queue(s)",
        registry.len()
    );
}

/// Offers the payload to every registered queue. A full queue marks a connection too slow
/// to keep up, it is evicted and its queue closed by dropping the producer.
fn broadcast(registry: &mut HashMap<ConnectionId, QueueProducer>, payload: &Payload) {
    registry.retain(|id, producer| match producer.try_enqueue(payload.clone()) {
        Ok(()) => true,
        Err(EnqueueError::Full(_)) => {
            warn!("Evicting slow SSE connection {}", id.as_str());
            false
        }
        Err(EnqueueError::Closed(_)) => {
            debug!("Removing closed SSE connection {}", id.as_str());
            false
        }
    });
}

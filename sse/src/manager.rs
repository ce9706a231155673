use crate::bridge;
use crate::broadcaster::BroadcasterHandle;
use crate::connection::{bounded_queue, ActiveConnections, Connection, ConnectionId, ConnectionLifetime};
use events::{Identity, MessageBus};
use log::*;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_CHANNEL_PREFIX: &str = "events:user:";
pub const DEFAULT_BROADCAST_CHANNEL: &str = "events:broadcast";

/// How connections are attached to the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// One bus subscription per connection, on the user's own channel.
    PerUser,
    /// One process-wide subscription fanned out to every connection.
    Shared,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TopologyParseError;

impl FromStr for Topology {
    type Err = TopologyParseError;
    fn from_str(topology: &str) -> Result<Topology, Self::Err> {
        match topology.to_lowercase().as_str() {
            "per-user" => Ok(Topology::PerUser),
            "shared" => Ok(Topology::Shared),
            _ => Err(TopologyParseError),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Topology::PerUser => write!(f, "per-user"),
            Topology::Shared => write!(f, "shared"),
        }
    }
}

/// Settings the manager needs, extracted from the service configuration.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    pub topology: Topology,
    pub queue_capacity: usize,
    pub channel_prefix: String,
    pub broadcast_channel: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            topology: Topology::PerUser,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            broadcast_channel: DEFAULT_BROADCAST_CHANNEL.to_string(),
        }
    }
}

/// Opens connections and attaches them to the bus according to the configured topology.
pub struct Manager {
    bus: Arc<dyn MessageBus>,
    config: ManagerConfig,
    shutdown: CancellationToken,
    broadcaster: Option<BroadcasterHandle>,
    active: ActiveConnections,
}

impl Manager {
    /// Must be called from within a Tokio runtime. In shared topology this spawns the
    /// broadcaster and the global subscription, both stopped by cancelling `shutdown`.
    pub fn new(bus: Arc<dyn MessageBus>, config: ManagerConfig, shutdown: CancellationToken) -> Self {
        let broadcaster = match config.topology {
            Topology::PerUser => None,
            Topology::Shared => {
                let broadcaster = BroadcasterHandle::spawn(shutdown.clone());
                bridge::spawn_shared_bridge(
                    Arc::clone(&bus),
                    config.broadcast_channel.clone(),
                    broadcaster.clone(),
                    shutdown.clone(),
                );
                Some(broadcaster)
            }
        };

        info!("SSE manager started with {} topology", config.topology);

        Self {
            bus,
            config,
            shutdown,
            broadcaster,
            active: ActiveConnections::default(),
        }
    }

    /// Opens a connection for an authenticated identity and attaches its queue to the bus.
    /// Dropping the returned connection (or the stream built from it) tears everything down.
    pub fn open_connection(&self, identity: Identity) -> Connection {
        let id = ConnectionId::new();
        let cancel = self.shutdown.child_token();
        let (producer, queue) = bounded_queue(self.config.queue_capacity);

        let registration = match &self.broadcaster {
            None => {
                bridge::spawn_user_bridge(
                    Arc::clone(&self.bus),
                    self.channel_for(&identity),
                    identity.clone(),
                    producer,
                    cancel.clone(),
                );
                None
            }
            Some(broadcaster) => {
                broadcaster.register(id.clone(), producer);
                Some(broadcaster.clone())
            }
        };

        self.active.increment();
        info!(
            "Opened SSE connection {} for user {identity} ({} active)",
            id.as_str(),
            self.active.get()
        );

        Connection {
            identity,
            queue,
            lifetime: ConnectionLifetime {
                id,
                cancel,
                active: self.active.clone(),
                registration,
            },
        }
    }

    /// Bus channel carrying events for a single user in per-user topology.
    pub fn channel_for(&self, identity: &Identity) -> String {
        format!("{}{identity}", self.config.channel_prefix)
    }

    /// Connections opened and not yet dropped.
    pub fn active_connections(&self) -> usize {
        self.active.get()
    }

    pub fn topology(&self) -> Topology {
        self.config.topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::payload_stream;
    use events::MemoryBus;
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    fn manager(bus: &MemoryBus, topology: Topology) -> (Manager, CancellationToken) {
        let shutdown = CancellationToken::new();
        let config = ManagerConfig {
            topology,
            ..ManagerConfig::default()
        };
        (
            Manager::new(Arc::new(bus.clone()), config, shutdown.clone()),
            shutdown,
        )
    }

    #[test]
    fn test_topology_parses_case_insensitively() {
        assert_eq!("per-user".parse::<Topology>(), Ok(Topology::PerUser));
        assert_eq!("SHARED".parse::<Topology>(), Ok(Topology::Shared));
        assert_eq!("global".parse::<Topology>(), Err(TopologyParseError));
    }

    #[tokio::test]
    async fn test_channel_is_namespaced_by_identity() {
        let (manager, _shutdown) = manager(&MemoryBus::new(), Topology::PerUser);

        assert_eq!(manager.channel_for(&Identity::Numeric(42)), "events:user:42");
        assert_eq!(manager.channel_for(&Identity::from("abc")), "events:user:abc");
    }

    #[tokio::test]
    async fn test_per_user_connection_receives_only_its_own_channel() {
        let bus = MemoryBus::new();
        let (manager, _shutdown) = manager(&bus, Topology::PerUser);

        let stream = payload_stream(manager.open_connection(Identity::Numeric(42)));
        futures::pin_mut!(stream);
        timeout(WAIT, bus.wait_for_subscribers("events:user:42", 1))
            .await
            .unwrap();

        bus.publish("events:user:7", "not for 42");
        bus.publish("events:user:42", r#"{"event":"ping"}"#);

        assert_eq!(
            timeout(WAIT, stream.next()).await.unwrap().as_deref(),
            Some(r#"{"event":"ping"}"#)
        );
    }

    #[tokio::test]
    async fn test_opening_and_closing_connections_leaks_nothing() {
        let bus = MemoryBus::new();
        let (manager, _shutdown) = manager(&bus, Topology::PerUser);

        for _ in 0..20 {
            let connection = manager.open_connection(Identity::Numeric(42));
            timeout(WAIT, bus.wait_for_subscribers("events:user:42", 1))
                .await
                .unwrap();
            assert_eq!(manager.active_connections(), 1);

            drop(connection);
            timeout(WAIT, bus.wait_for_subscribers("events:user:42", 0))
                .await
                .unwrap();
        }

        assert_eq!(manager.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_connection_token_follows_drop_and_shutdown() {
        let bus = MemoryBus::new();
        let (manager, shutdown) = manager(&bus, Topology::PerUser);

        let dropped = manager.open_connection(Identity::Numeric(1));
        let dropped_token = dropped.cancellation_token();
        let open = manager.open_connection(Identity::Numeric(2));
        let open_token = open.cancellation_token();

        drop(dropped);
        assert!(dropped_token.is_cancelled());
        assert!(!open_token.is_cancelled());

        shutdown.cancel();
        assert!(open_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_ends_every_stream() {
        let bus = MemoryBus::new();
        let (manager, shutdown) = manager(&bus, Topology::PerUser);
        let first = payload_stream(manager.open_connection(Identity::Numeric(1)));
        let second = payload_stream(manager.open_connection(Identity::Numeric(2)));
        futures::pin_mut!(first, second);

        shutdown.cancel();

        assert_eq!(timeout(WAIT, first.next()).await.unwrap(), None);
        assert_eq!(timeout(WAIT, second.next()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shared_topology_broadcasts_to_all_connections() {
        let bus = MemoryBus::new();
        let (manager, _shutdown) = manager(&bus, Topology::Shared);
        timeout(WAIT, bus.wait_for_subscribers(DEFAULT_BROADCAST_CHANNEL, 1))
            .await
            .unwrap();

        let first = payload_stream(manager.open_connection(Identity::Numeric(1)));
        let second = payload_stream(manager.open_connection(Identity::Numeric(2)));
        futures::pin_mut!(first, second);
        let broadcaster = manager.broadcaster.clone().unwrap();
        assert_eq!(broadcaster.connection_count().await, 2);

        bus.publish(DEFAULT_BROADCAST_CHANNEL, "hello all");

        assert_eq!(
            timeout(WAIT, first.next()).await.unwrap().as_deref(),
            Some("hello all")
        );
        assert_eq!(
            timeout(WAIT, second.next()).await.unwrap().as_deref(),
            Some("hello all")
        );
    }

    #[tokio::test]
    async fn test_shared_topology_deregisters_dropped_connections() {
        let bus = MemoryBus::new();
        let (manager, _shutdown) = manager(&bus, Topology::Shared);
        let broadcaster = manager.broadcaster.clone().unwrap();

        for _ in 0..20 {
            let connection = manager.open_connection(Identity::Numeric(1));
            assert_eq!(broadcaster.connection_count().await, 1);
            drop(connection);
            assert_eq!(broadcaster.connection_count().await, 0);
        }

        assert_eq!(manager.active_connections(), 0);
        // Per-user channels are never touched in shared topology
        assert_eq!(bus.subscriber_count("events:user:1"), 0);
    }
}

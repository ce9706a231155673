//! Server-Sent Events (SSE) fan-out engine for the relay.
//!
//! This crate multiplexes message bus subscriptions onto many concurrent SSE
//! connections while making sure a slow or disconnected client can neither stall
//! delivery to others nor leak resources.
//!
//! # Architecture
//!
//! - **Bounded queue per connection**: every connection owns a small FIFO queue.
//!   Producers only ever `try_enqueue`, so a full queue never blocks them.
//! - **Single producer, single consumer**: the bridge (or broadcaster) is the only
//!   writer of a queue and the dispatcher loop is the only reader. No locks are
//!   taken on the delivery path.
//! - **Two topologies**:
//!   - `per-user`: one bus subscription per connection on `<prefix><identity>`.
//!     A full queue drops the message.
//!   - `shared`: one bus subscription for the whole process, fanned out by a
//!     single coordinator task that owns the registry. A full queue evicts the
//!     connection.
//! - **Structured teardown**: each connection carries a cancellation token that is
//!   a child of the server's shutdown token. Dropping the connection cancels it,
//!   which stops the bridge task (unsubscribing from the bus) or deregisters the
//!   connection from the broadcaster.
//!
//! # Message Flow
//!
//! 1. `web` verifies the stream token and calls `Manager::open_connection(identity)`
//! 2. The manager creates the queue and hands its producer to a bridge task
//!    (per-user) or registers it with the broadcaster (shared)
//! 3. An external producer publishes a payload on the bus
//! 4. The bridge or broadcaster enqueues the payload, verbatim
//! 5. `dispatcher::event_stream` yields it as a `data:` event, which Axum writes
//!    and flushes to the client
//! 6. When the client disconnects Axum drops the stream, and with it the connection
//!
//! # Modules
//!
//! - `connection`: ConnectionId, bounded queue and the Connection handle
//! - `bridge`: per-user and shared bus subscription tasks
//! - `broadcaster`: single-owner registry coordinator for the shared topology
//! - `dispatcher`: the per-connection event stream
//! - `manager`: topology selection and connection setup

mod bridge;
pub mod broadcaster;
pub mod connection;
pub mod dispatcher;
pub mod manager;

pub use connection::Connection;
pub use manager::{Manager, ManagerConfig, Topology};

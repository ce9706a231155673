//! Message bus infrastructure for the SSE relay.
//!
//! This crate provides the seam between the relay and the publish/subscribe
//! bus that external producers write events to. It has no dependencies on the
//! other internal crates, so `domain`, `sse` and `service` can all depend on it
//! without creating cycles.
//!
//! # Architecture
//!
//! - **Identity**: the authenticated subject a connection is scoped to
//! - **MessageBus**: trait for opening a subscription against a bus channel
//! - **Subscription**: a stream of opaque payloads, unsubscribed on drop
//! - **RedisBus**: production implementation backed by Redis pub/sub
//! - **MemoryBus**: in-process implementation for tests (`test-utils` feature)
//!
//! Payloads are never parsed. Whatever bytes a producer publishes are handed
//! to the relay verbatim as a string.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod redis_bus;

pub use error::{Error, ErrorKind};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryBus;
pub use redis_bus::RedisBus;

/// An opaque message body received from the bus.
pub type Payload = String;

/// A live subscription to a single bus channel. Messages arrive in the order the
/// bus delivered them. Dropping the stream tears the subscription down.
pub type Subscription = BoxStream<'static, Payload>;

/// The authenticated subject of a stream connection.
///
/// Credentials may carry the subject as either a JSON number or a string, so
/// both are accepted and rendered unchanged when building channel names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identity::Numeric(id) => write!(f, "{id}"),
            Identity::Text(id) => write!(f, "{id}"),
        }
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Identity::Numeric(id)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Identity::Text(id.to_string())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Identity::Text(id)
    }
}

/// Trait for subscribing to channels on a publish/subscribe bus.
///
/// Implementations must be safe to share across many concurrent connections.
/// `subscribe` resolves only once the bus has confirmed the subscription.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display_renders_numeric_and_text_unchanged() {
        assert_eq!(Identity::Numeric(42).to_string(), "42");
        assert_eq!(Identity::from("user-abc").to_string(), "user-abc");
    }

    #[test]
    fn test_identity_deserializes_from_number_or_string() {
        let numeric: Identity = serde_json::from_str("42").unwrap();
        let text: Identity = serde_json::from_str("\"42\"").unwrap();

        assert_eq!(numeric, Identity::Numeric(42));
        assert_eq!(text, Identity::Text("42".to_string()));
    }
}

use crate::error::{Error, ErrorKind};
use crate::{MessageBus, Subscription};
use async_trait::async_trait;
use futures::StreamExt;
use log::*;

/// Redis pub/sub implementation of [`MessageBus`].
///
/// A single `redis::Client` is shared by every subscription. The client only holds
/// connection info, each call to `subscribe` opens its own pub/sub connection, which
/// is closed again when the returned stream is dropped.
#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
}

impl RedisBus {
    /// Parses the connection URL (e.g. `redis://:password@localhost:6379/0`).
    /// No connection is made until `ping` or `subscribe` is called.
    pub fn open(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(|e| Error::new(ErrorKind::InvalidUrl, e))?;
        Ok(Self { client })
    }

    /// Round-trips a PING to verify the bus is reachable.
    pub async fn ping(&self) -> Result<(), Error> {
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::new(ErrorKind::Connection, e))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| Error::new(ErrorKind::Connection, e))?;

        debug!("Redis answered PING with {pong}");
        Ok(())
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, Error> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::new(ErrorKind::Connection, e))?;

        // Resolves once Redis has confirmed the subscription
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| Error::new(ErrorKind::Subscribe, e))?;

        debug!("Subscribed to Redis channel {channel}");

        let messages = pubsub
            .into_on_message()
            .map(|msg| String::from_utf8_lossy(msg.get_payload_bytes()).into_owned());

        Ok(messages.boxed())
    }
}

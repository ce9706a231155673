use anyhow::{Context, Result};
use log::*;
use redis::AsyncCommands;

/// Publishes payloads onto the bus the relay is subscribed to.
pub struct Publisher {
    connection: redis::aio::MultiplexedConnection,
    channel_prefix: String,
}

impl Publisher {
    pub async fn connect(redis_url: &str, channel_prefix: String) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Invalid Redis URL")?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            connection,
            channel_prefix,
        })
    }

    /// Publishes `payload` on the channel of `user_id`, returning the number of bus subscribers
    /// that received it.
    pub async fn publish_to_user(&mut self, user_id: i64, payload: &str) -> Result<usize> {
        let channel = format!("{}{}", self.channel_prefix, user_id);
        let receivers: usize = self
            .connection
            .publish(&channel, payload)
            .await
            .with_context(|| format!("Failed to publish to {channel}"))?;
        debug!("Published {payload} to {channel} ({receivers} receivers)");
        Ok(receivers)
    }
}

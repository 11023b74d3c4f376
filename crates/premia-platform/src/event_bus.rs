use anyhow::Result;
use redis::{AsyncCommands, Client, aio::PubSub};
use serde::Serialize;

use crate::contracts::PolicyActivatedEvent;

/// Published by the gateway when a policy transitions into ACTIVE so the
/// scheduler can lay down its payment schedule immediately.
pub const POLICIES_ACTIVATED_CHANNEL: &str = "policies.activated";

#[derive(Clone)]
pub struct EventBus {
    client: Client,
}

impl EventBus {
    pub fn connect(redis_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::open(redis_url)?,
        })
    }

    pub async fn publish_policy_activated(&self, event: &PolicyActivatedEvent) -> Result<()> {
        self.publish_json(POLICIES_ACTIVATED_CHANNEL, event).await
    }

    /// Subscribe and hand back the live pub/sub connection; callers
    /// drain it with `on_message`.
    pub async fn subscribe(&self, channel: &str) -> Result<PubSub> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        Ok(pubsub)
    }

    async fn publish_json<T: Serialize>(&self, channel: &str, payload: &T) -> Result<()> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(payload)?;
        let _: i64 = connection.publish(channel, serialized).await?;
        Ok(())
    }
}

use anyhow::Result;
use redis::Client;
use serde_json::Value;

/// Fire-and-forget publish channel backed by Redis pub/sub. Subscribers
/// (the WebSocket gateway) live outside this process; this side only emits.
#[derive(Clone)]
pub struct PushChannel {
    client: Client,
}

impl PushChannel {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    /// Emit an event. Publish failures are logged and swallowed: a push
    /// event must never fail the action that produced it.
    pub async fn emit(&self, event: &str, payload: Value) {
        if let Err(err) = self.try_emit(event, &payload).await {
            tracing::warn!(error = ?err, event = %event, "push emit failed");
        }
    }

    async fn try_emit(&self, event: &str, payload: &Value) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PUBLISH")
            .arg(event)
            .arg(serde_json::to_string(payload)?)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

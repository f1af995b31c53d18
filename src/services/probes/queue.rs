use tracing::{debug, info, warn};

use super::{probe_timeout, with_timeout};
use crate::config::AiServiceSettings;
use crate::error::AppResult;

/// Opens a short-lived connection to the queue broker and sends PING.
pub async fn probe_queue(settings: &AiServiceSettings) -> bool {
    let url = &settings.queue.redis_url;

    match with_timeout("Redis", probe_timeout(settings), ping(url)).await {
        Ok(()) => {
            info!("Redis connection validated");
            true
        }
        Err(e) => {
            warn!(error = %e, "Redis connection failed");
            false
        }
    }
}

async fn ping(url: &str) -> AppResult<()> {
    let client = redis::Client::open(url)?;
    let mut connection = client.get_multiplexed_async_connection().await?;
    let reply: String = redis::cmd("PING").query_async(&mut connection).await?;
    debug!(reply = %reply, "Redis answered PING");
    Ok(())
}

use sqlx::Connection;
use sqlx::postgres::PgConnection;
use tracing::{info, warn};

use super::{probe_timeout, with_timeout};
use crate::config::{AiServiceSettings, Secret};
use crate::error::AppResult;

/// Opens and immediately closes one connection. Without a DATABASE_URL there is nothing to check.
pub async fn probe_database(settings: &AiServiceSettings) -> bool {
    let Some(url) = settings.database.url.as_ref().map(Secret::expose) else {
        info!("No database configuration found, skipping database check");
        return false;
    };

    match with_timeout("Database", probe_timeout(settings), connect_and_close(url)).await {
        Ok(()) => {
            info!("Database connection validated");
            true
        }
        Err(e) => {
            warn!(error = %e, "Database connection failed");
            false
        }
    }
}

async fn connect_and_close(url: &str) -> AppResult<()> {
    let connection = PgConnection::connect(url).await?;
    connection.close().await?;
    Ok(())
}

//! Health check functionality module.
//!
//! This module provides:
//! - Database connectivity checks
//! - Bot token shape checks
//! - Combined readiness checks and a periodic recorder

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

/// Perform comprehensive readiness checks
pub async fn perform_readiness_checks(
    db_pool: Option<Arc<PgPool>>,
    bot_token: Option<String>,
) -> Result<()> {
    if let Some(pool) = &db_pool {
        check_database_health(pool.as_ref()).await?;
    }

    if let Some(token) = &bot_token {
        check_bot_token_health(token)?;
    }

    Ok(())
}

/// Check database connectivity and basic query capability
pub async fn check_database_health(pool: &PgPool) -> Result<()> {
    crate::db::ping(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;

    tracing::debug!("Database health check passed");
    Ok(())
}

/// Check the configured bot token without calling the Bot API
pub fn check_bot_token_health(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(anyhow::anyhow!("Bot token is empty"));
    }

    if !token.contains(crate::validation::TOKEN_SEPARATOR) {
        return Err(anyhow::anyhow!("Bot token format is invalid"));
    }

    tracing::debug!("Bot token health check passed");
    Ok(())
}

/// Start a background task to periodically record health check metrics
pub fn start_health_metrics_recorder(
    db_pool: Option<Arc<PgPool>>,
    bot_token: Option<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));

        loop {
            interval.tick().await;

            if let Some(pool) = &db_pool {
                let check_start = std::time::Instant::now();
                let db_healthy = check_database_health(pool.as_ref()).await.is_ok();
                super::metrics::record_health_check_metrics(
                    "database",
                    db_healthy,
                    check_start.elapsed(),
                );
            }

            if let Some(token) = &bot_token {
                let check_start = std::time::Instant::now();
                let bot_healthy = check_bot_token_health(token).is_ok();
                super::metrics::record_health_check_metrics(
                    "telegram_bot",
                    bot_healthy,
                    check_start.elapsed(),
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_token_health() {
        assert!(check_bot_token_health("").is_err());
        assert!(check_bot_token_health("no-separator").is_err());
        assert!(check_bot_token_health("123:abc").is_ok());
    }

    #[tokio::test]
    async fn test_readiness_without_dependencies() {
        assert!(perform_readiness_checks(None, None).await.is_ok());
        assert!(perform_readiness_checks(None, Some("broken".to_string()))
            .await
            .is_err());
    }
}

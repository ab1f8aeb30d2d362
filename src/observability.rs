//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Metrics collection and Prometheus export
//! - Distributed tracing with OpenTelemetry
//! - Structured logging with configurable levels
//! - Health check endpoints for monitoring

pub mod health_checks;
pub mod metrics;
pub mod tracing_mod;

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use crate::observability_config::ObservabilityConfig;

pub use health_checks::{
    check_bot_token_health, check_database_health, perform_readiness_checks,
    start_health_metrics_recorder,
};
pub use metrics::{
    record_db_metrics, record_error_metrics, record_health_check_metrics,
    record_provisioning_transition, record_request_metrics, record_startup_metrics,
    record_telegram_message, ProvisioningTransition, RateLimiter,
};
pub use tracing_mod::{db_span, telegram_span};

/// Install the global tracing subscriber.
///
/// Runs before the rest of the configuration is loaded so configuration
/// errors are logged. Must be called once, before
/// [`init_observability_with_health_checks`].
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    tracing_mod::init_tracing_with_config(config)
}

/// Initialize exporters, metrics and health checks on top of the subscriber
/// installed by [`init_logging`]
pub async fn init_observability_with_health_checks(
    db_pool: Option<Arc<PgPool>>,
    bot_token: Option<String>,
    config: ObservabilityConfig,
) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    tracing_mod::init_opentelemetry_tracing_with_config(&config)?;

    if config.enable_metrics_export {
        let metrics_handle = metrics::init_metrics_with_config(&config)?;
        metrics::start_metrics_server(
            metrics_handle,
            config.metrics_port,
            db_pool.clone(),
            bot_token.clone(),
        )
        .await?;
        start_health_metrics_recorder(db_pool.clone(), bot_token.clone());
    } else {
        tracing::info!("Metrics export disabled");
    }

    tracing::info!(
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        metrics_port = %config.metrics_port,
        has_db_pool = %db_pool.is_some(),
        has_bot_token = %bot_token.is_some(),
        "Observability stack with health checks initialized successfully"
    );
    Ok(())
}

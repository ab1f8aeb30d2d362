//! # Unified Application Configuration
//!
//! This module consolidates all application settings into a single
//! structured configuration object loaded from environment variables.

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use serde::{Deserialize, Serialize};
use std::env;

/// Bot-specific configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token
    pub token: String,
    /// Telegram user id of the owner who reviews payments and receives relayed messages
    pub owner_id: i64,
    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            owner_id: 0,
            http_timeout_secs: 30,
        }
    }
}

impl BotConfig {
    /// Validate bot configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.token.trim().is_empty() {
            return Err(AppError::Config("Bot token cannot be empty".to_string()));
        }

        let parts: Vec<&str> = self.token.split(':').collect();
        if parts.len() != 2 {
            return Err(AppError::Config(
                "Bot token format is invalid. Expected format: 'bot_id:bot_token'".to_string(),
            ));
        }

        if parts[0].parse::<u64>().is_err() {
            return Err(AppError::Config(
                "Bot token bot ID must be numeric".to_string(),
            ));
        }

        if parts[1].len() < 20 {
            return Err(AppError::Config(
                "Bot token appears to be too short. Please verify it's a valid token".to_string(),
            ));
        }

        if self.owner_id <= 0 {
            return Err(AppError::Config(
                "OWNER_ID must be a positive Telegram user id".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("HTTP timeout cannot be 0".to_string()));
        }

        if self.http_timeout_secs > 300 {
            return Err(AppError::Config(
                "HTTP timeout cannot be greater than 300 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

/// Database configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Minimum number of idle connections
    pub min_connections: u32,
    /// Maximum time a connection can be idle in seconds
    pub idle_timeout_secs: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            connect_timeout_secs: 30,
            min_connections: 1,
            idle_timeout_secs: Some(600),
        }
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.url.trim().is_empty() {
            return Err(AppError::Config("Database URL cannot be empty".to_string()));
        }

        if !self.url.starts_with("postgresql://") && !self.url.starts_with("postgres://") {
            return Err(AppError::Config(
                "Database URL must start with 'postgresql://' or 'postgres://'".to_string(),
            ));
        }

        let connection_part = self.url.split("://").nth(1).unwrap_or_default();
        if !connection_part.contains('@') {
            return Err(AppError::Config(
                "Database URL must contain authentication information".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(AppError::Config("Max connections cannot be 0".to_string()));
        }

        if self.max_connections > 100 {
            return Err(AppError::Config(
                "Max connections cannot be greater than 100".to_string(),
            ));
        }

        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 300 {
            return Err(AppError::Config(
                "Connect timeout must be between 1 and 300 seconds".to_string(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(AppError::Config(
                "Min connections cannot be greater than max connections".to_string(),
            ));
        }

        Ok(())
    }
}

/// Server configuration for the metrics and health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port serving `/metrics` and `/health/*`
    pub metrics_port: u16,
    /// Whether to allow privileged ports (< 1024)
    pub allow_privileged_ports: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            allow_privileged_ports: false,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.metrics_port == 0 {
            return Err(AppError::Config("Metrics port cannot be 0".to_string()));
        }

        if !self.allow_privileged_ports && self.metrics_port < 1024 {
            return Err(AppError::Config(format!(
                "Metrics port {} is privileged. Set allow_privileged_ports=true or use port >= 1024",
                self.metrics_port
            )));
        }

        Ok(())
    }
}

/// Where users send money for a clone-bot plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// UPI id shown in payment instructions and owner notifications
    pub upi_id: String,
    /// Currency symbol prefixed to plan prices
    pub currency_symbol: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            upi_id: "thefatherofficial-3@okaxis".to_string(),
            currency_symbol: "₹".to_string(),
        }
    }
}

impl PaymentConfig {
    /// Validate payment configuration
    pub fn validate(&self) -> AppResult<()> {
        let upi = self.upi_id.trim();
        if upi.is_empty() {
            return Err(AppError::Config("Payment UPI id cannot be empty".to_string()));
        }

        // UPI virtual payment addresses are always handle@provider
        match upi.split_once('@') {
            Some((handle, provider)) if !handle.is_empty() && !provider.is_empty() => {}
            _ => {
                return Err(AppError::Config(format!(
                    "Payment UPI id '{}' must look like name@provider",
                    upi
                )))
            }
        }

        if self.currency_symbol.trim().is_empty() {
            return Err(AppError::Config(
                "Currency symbol cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Bot configuration
    pub bot: BotConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Server configuration
    pub server: ServerConfig,
    /// Payment destination configuration
    pub payment: PaymentConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> AppResult<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a valid number", key)))
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Bot
        config.bot.token = env::var("TELEGRAM_BOT_TOKEN").map_err(|_| {
            AppError::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        config.bot.owner_id = env::var("OWNER_ID")
            .map_err(|_| AppError::Config("OWNER_ID environment variable is required".to_string()))?
            .trim()
            .parse()
            .map_err(|_| AppError::Config("OWNER_ID must be a numeric Telegram user id".to_string()))?;
        config.bot.http_timeout_secs = env_or("HTTP_CLIENT_TIMEOUT_SECS", "30")?;

        // Database
        config.database.url = env::var("DATABASE_URL").map_err(|_| {
            AppError::Config("DATABASE_URL environment variable is required".to_string())
        })?;
        config.database.max_connections = env_or("DATABASE_MAX_CONNECTIONS", "10")?;
        config.database.min_connections = env_or("DATABASE_MIN_CONNECTIONS", "1")?;
        config.database.connect_timeout_secs = env_or("DATABASE_CONNECT_TIMEOUT_SECS", "30")?;
        if let Ok(raw) = env::var("DATABASE_IDLE_TIMEOUT_SECS") {
            config.database.idle_timeout_secs = Some(raw.trim().parse().map_err(|_| {
                AppError::Config("DATABASE_IDLE_TIMEOUT_SECS must be a valid number".to_string())
            })?);
        }

        // Server
        config.server.metrics_port = env_or("METRICS_PORT", "9090")?;
        config.server.allow_privileged_ports = env::var("ALLOW_PRIVILEGED_PORTS")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        // Payment
        if let Ok(upi_id) = env::var("PAYMENT_UPI_ID") {
            config.payment.upi_id = upi_id;
        }
        if let Ok(symbol) = env::var("PAYMENT_CURRENCY_SYMBOL") {
            config.payment.currency_symbol = symbol;
        }

        config.observability = ObservabilityConfig::from_env();
        config.observability.metrics_port = config.server.metrics_port;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.bot.validate()?;
        self.database.validate()?;
        self.server.validate()?;
        self.payment.validate()?;
        self.observability
            .validate()
            .map_err(AppError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: bot_token=[REDACTED], db_url=[REDACTED], owner_id={}, metrics_port={}, upi_id={}, environment={}",
            self.bot.owner_id,
            self.server.metrics_port,
            self.payment.upi_id,
            self.observability.environment
        )
    }
}

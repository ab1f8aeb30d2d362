use anyhow::Result;
use clone_relay_bot::bot::{callback_handler, message_handler, AppState};
use clone_relay_bot::config::AppConfig;
use clone_relay_bot::db;
use clone_relay_bot::dialogue::SelectionState;
use clone_relay_bot::errors::error_logging;
use clone_relay_bot::gateway::TelegramGateway;
use clone_relay_bot::localization;
use clone_relay_bot::observability;
use clone_relay_bot::observability_config::ObservabilityConfig;
use clone_relay_bot::store::PgStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let startup = Instant::now();

    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    // Logging comes up before the rest of the config so its errors are visible
    observability::init_logging(&ObservabilityConfig::from_env())?;

    let config = AppConfig::from_env().inspect_err(|e| {
        error_logging::log_config_error(e, "environment", "load_config");
    })?;
    config.validate().inspect_err(|e| {
        error_logging::log_config_error(e, "environment", "validate_config");
    })?;

    // Create database connection pool
    let mut pool_options = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs));
    if let Some(idle) = config.database.idle_timeout_secs {
        pool_options = pool_options.idle_timeout(Duration::from_secs(idle));
    }
    let pool = pool_options.connect(&config.database.url).await?;

    db::init_database_schema(&pool).await?;

    let shared_pool = Arc::new(pool);

    // Metrics and trace export with database and token readiness checks
    observability::init_observability_with_health_checks(
        Some(Arc::clone(&shared_pool)),
        Some(config.bot.token.clone()),
        config.observability.clone(),
    )
    .await?;

    info!("{}", config.summary());

    let localization_manager = localization::create_localization_manager()?;

    // Shared by the bot and clone-token checks
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.bot.http_timeout_secs))
        .build()?;

    let bot = Bot::with_client(config.bot.token.clone(), client.clone());

    let state = Arc::new(AppState {
        store: Arc::new(PgStore::new(Arc::clone(&shared_pool))),
        gateway: Arc::new(TelegramGateway::new(bot.clone(), client)),
        localization: localization_manager,
        selections: InMemStorage::<SelectionState>::new(),
        owner_id: config.bot.owner_id,
        payment: config.payment.clone(),
    });

    observability::record_startup_metrics(startup.elapsed());
    info!(
        timeout_secs = config.bot.http_timeout_secs,
        "Bot initialized, starting dispatcher"
    );

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let state = Arc::clone(&state);
            move |msg: Message| {
                let state = Arc::clone(&state);
                async move { message_handler(msg, state).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let state = Arc::clone(&state);
            move |q: CallbackQuery| {
                let state = Arc::clone(&state);
                async move { callback_handler(q, state).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

use anyhow::{anyhow, Context, Result};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgExecutor, Row};
use tracing::{debug, info};

use crate::store::{AwaitingTokenData, ClonedBot, PaymentStatus, PendingPayment};

/// `bot_settings` key holding the owner-curated paid batches text
pub const PAID_BATCHES_KEY: &str = "paid_batches";

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema");

    // Users who ever talked to the bot
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            telegram_id BIGINT PRIMARY KEY,
            username VARCHAR(64),
            first_name VARCHAR(255) NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS banned_users (
            telegram_id BIGINT PRIMARY KEY,
            banned_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create banned_users table")?;

    // Messages delivered to the owner on behalf of a user
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS message_map (
            message_id INTEGER PRIMARY KEY,
            user_id BIGINT NOT NULL,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create message_map table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pending_payments (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            plan_days INTEGER NOT NULL,
            plan_price INTEGER NOT NULL,
            screenshot_file_id TEXT NOT NULL,
            status VARCHAR(16) NOT NULL DEFAULT 'pending',
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create pending_payments table")?;

    // Plan columns are nullable so a flag without payment context can be represented
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS awaiting_tokens (
            user_id BIGINT PRIMARY KEY,
            plan_days INTEGER,
            plan_price INTEGER,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create awaiting_tokens table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS cloned_bots (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            token TEXT NOT NULL,
            plan_days INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create cloned_bots table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS greetings (
            id BIGSERIAL PRIMARY KEY,
            text TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create greetings table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bot_settings (
            key VARCHAR(64) PRIMARY KEY,
            value TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create bot_settings table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS cloned_bots_user_id_idx ON cloned_bots(user_id)")
        .execute(pool)
        .await
        .context("Failed to create cloned_bots user_id index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS pending_payments_user_id_idx ON pending_payments(user_id)",
    )
    .execute(pool)
    .await
    .context("Failed to create pending_payments user_id index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert or refresh a user registry entry
pub async fn upsert_user(
    pool: &PgPool,
    telegram_id: i64,
    username: Option<&str>,
    first_name: &str,
) -> Result<()> {
    debug!(telegram_id = %telegram_id, "Upserting user");

    sqlx::query(
        "INSERT INTO users (telegram_id, username, first_name) VALUES ($1, $2, $3)
         ON CONFLICT (telegram_id) DO UPDATE
         SET username = EXCLUDED.username,
             first_name = EXCLUDED.first_name,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(telegram_id)
    .bind(username)
    .bind(first_name)
    .execute(pool)
    .await
    .context("Failed to upsert user")?;

    Ok(())
}

pub async fn is_banned(pool: &PgPool, telegram_id: i64) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM banned_users WHERE telegram_id = $1")
        .bind(telegram_id)
        .fetch_optional(pool)
        .await
        .context("Failed to check ban list")?;

    Ok(row.is_some())
}

pub async fn is_awaiting_token(pool: &PgPool, user_id: i64) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM awaiting_tokens WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to check awaiting token flag")?;

    Ok(row.is_some())
}

/// Read the payment context stored with the awaiting-token flag
pub async fn get_awaiting_token_data(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<AwaitingTokenData>> {
    let row = sqlx::query("SELECT plan_days, plan_price FROM awaiting_tokens WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read awaiting token data")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let plan_days: Option<i32> = row.get(0);
    let plan_price: Option<i32> = row.get(1);
    Ok(match (plan_days, plan_price) {
        (Some(plan_days), Some(plan_price)) => Some(AwaitingTokenData {
            plan_days,
            plan_price,
        }),
        _ => None,
    })
}

/// Set (or overwrite) the awaiting-token flag of a user
pub async fn set_awaiting_token<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    plan_days: i32,
    plan_price: i32,
) -> Result<()> {
    debug!(user_id = %user_id, plan_days, plan_price, "Setting awaiting token flag");

    sqlx::query(
        "INSERT INTO awaiting_tokens (user_id, plan_days, plan_price) VALUES ($1, $2, $3)
         ON CONFLICT (user_id) DO UPDATE
         SET plan_days = EXCLUDED.plan_days,
             plan_price = EXCLUDED.plan_price,
             created_at = CURRENT_TIMESTAMP",
    )
    .bind(user_id)
    .bind(plan_days)
    .bind(plan_price)
    .execute(executor)
    .await
    .context("Failed to set awaiting token flag")?;

    Ok(())
}

pub async fn remove_awaiting_token<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> Result<()> {
    sqlx::query("DELETE FROM awaiting_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await
        .context("Failed to remove awaiting token flag")?;

    Ok(())
}

/// Remember which user an owner-side message belongs to
pub async fn map_message(pool: &PgPool, user_id: i64, message_id: i32) -> Result<()> {
    sqlx::query(
        "INSERT INTO message_map (message_id, user_id) VALUES ($1, $2)
         ON CONFLICT (message_id) DO UPDATE SET user_id = EXCLUDED.user_id",
    )
    .bind(message_id)
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to map message")?;

    Ok(())
}

pub async fn list_greetings(pool: &PgPool) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT text FROM greetings ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list greetings")?;

    Ok(rows.iter().map(|row| row.get(0)).collect())
}

pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM bot_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to read bot setting")?;

    Ok(row.map(|row| row.get(0)))
}

fn payment_from_row(row: &PgRow) -> Result<PendingPayment> {
    let status: String = row.get(5);
    Ok(PendingPayment {
        id: row.get(0),
        user_id: row.get(1),
        plan_days: row.get(2),
        plan_price: row.get(3),
        screenshot_file_id: row.get(4),
        status: PaymentStatus::parse(&status)
            .ok_or_else(|| anyhow!("Unknown payment status: {status}"))?,
        created_at: row.get(6),
    })
}

/// Record a submitted payment screenshot as `pending`
pub async fn create_pending_payment(
    pool: &PgPool,
    user_id: i64,
    plan_days: i32,
    plan_price: i32,
    screenshot_file_id: &str,
) -> Result<PendingPayment> {
    debug!(user_id = %user_id, plan_days, plan_price, "Creating pending payment");

    let row = sqlx::query(
        "INSERT INTO pending_payments (user_id, plan_days, plan_price, screenshot_file_id, status)
         VALUES ($1, $2, $3, $4, 'pending')
         RETURNING id, user_id, plan_days, plan_price, screenshot_file_id, status, created_at",
    )
    .bind(user_id)
    .bind(plan_days)
    .bind(plan_price)
    .bind(screenshot_file_id)
    .fetch_one(pool)
    .await
    .context("Failed to insert pending payment")?;

    let payment = payment_from_row(&row)?;
    debug!(payment_id = %payment.id, "Pending payment created");
    Ok(payment)
}

pub async fn read_pending_payment(pool: &PgPool, payment_id: i64) -> Result<Option<PendingPayment>> {
    debug!(payment_id = %payment_id, "Reading pending payment");

    let row = sqlx::query(
        "SELECT id, user_id, plan_days, plan_price, screenshot_file_id, status, created_at
         FROM pending_payments WHERE id = $1",
    )
    .bind(payment_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read pending payment")?;

    row.as_ref().map(payment_from_row).transpose()
}

/// Move a payment from `pending` to `status`.
///
/// The transition is conditional on the row still being pending, so two
/// concurrent reviews of the same payment cannot both succeed.
pub async fn resolve_pending_payment<'e>(
    executor: impl PgExecutor<'e>,
    payment_id: i64,
    status: PaymentStatus,
) -> Result<bool> {
    debug!(payment_id = %payment_id, status = %status, "Resolving pending payment");

    let result =
        sqlx::query("UPDATE pending_payments SET status = $1 WHERE id = $2 AND status = 'pending'")
            .bind(status.as_str())
            .bind(payment_id)
            .execute(executor)
            .await
            .context("Failed to update payment status")?;

    let updated = result.rows_affected() > 0;
    if !updated {
        info!("Payment {payment_id} was not pending");
    }
    Ok(updated)
}

/// Approve a pending payment and arm the awaiting-token flag for its plan.
///
/// Both writes commit together. Returns `false`, with nothing written, when
/// the payment was no longer pending.
pub async fn approve_pending_payment(
    pool: &PgPool,
    payment_id: i64,
    user_id: i64,
    plan_days: i32,
    plan_price: i32,
) -> Result<bool> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin payment approval")?;

    if !resolve_pending_payment(&mut *tx, payment_id, PaymentStatus::Approved).await? {
        return Ok(false);
    }
    set_awaiting_token(&mut *tx, user_id, plan_days, plan_price).await?;

    tx.commit()
        .await
        .context("Failed to commit payment approval")?;
    Ok(true)
}

/// Persist a newly provisioned clone bot, valid for `plan_days` from now
pub async fn create_cloned_bot<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
    token: &str,
    plan_days: i32,
) -> Result<ClonedBot> {
    debug!(user_id = %user_id, plan_days, "Creating cloned bot");

    let row = sqlx::query(
        "INSERT INTO cloned_bots (user_id, token, plan_days, expires_at)
         VALUES ($1, $2, $3, CURRENT_TIMESTAMP + make_interval(days => $3))
         RETURNING user_id, token, plan_days, created_at, expires_at",
    )
    .bind(user_id)
    .bind(token)
    .bind(plan_days)
    .fetch_one(executor)
    .await
    .context("Failed to insert cloned bot")?;

    Ok(ClonedBot {
        user_id: row.get(0),
        token: row.get(1),
        plan_days: row.get(2),
        created_at: row.get(3),
        expires_at: row.get(4),
    })
}

/// Record a clone bot and clear the owner's awaiting-token flag in one commit
pub async fn activate_cloned_bot(
    pool: &PgPool,
    user_id: i64,
    token: &str,
    plan_days: i32,
) -> Result<ClonedBot> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin clone activation")?;

    let clone = create_cloned_bot(&mut *tx, user_id, token, plan_days).await?;
    remove_awaiting_token(&mut *tx, user_id).await?;

    tx.commit()
        .await
        .context("Failed to commit clone activation")?;
    Ok(clone)
}

/// Read the user's clone bot with the latest expiry
pub async fn read_latest_cloned_bot(pool: &PgPool, user_id: i64) -> Result<Option<ClonedBot>> {
    let row = sqlx::query(
        "SELECT user_id, token, plan_days, created_at, expires_at
         FROM cloned_bots WHERE user_id = $1
         ORDER BY expires_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read cloned bot")?;

    Ok(row.map(|row| ClonedBot {
        user_id: row.get(0),
        token: row.get(1),
        plan_days: row.get(2),
        created_at: row.get(3),
        expires_at: row.get(4),
    }))
}

/// Check database connectivity
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database ping failed")?;
    Ok(())
}

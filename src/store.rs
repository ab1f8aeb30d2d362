//! Persistence capability used by the handlers.
//!
//! Handlers only talk to the [`ProvisioningStore`] trait. [`PgStore`] is the
//! production implementation on top of the free functions in [`crate::db`];
//! tests plug in an in-memory implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::db;
use crate::plans::Plan;

/// Review status of a submitted payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "approved" => Some(PaymentStatus::Approved),
            "rejected" => Some(PaymentStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment screenshot waiting for (or past) owner review
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPayment {
    pub id: i64,
    pub user_id: i64,
    pub plan_days: i32,
    pub plan_price: i32,
    pub screenshot_file_id: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Payment context attached to an awaiting-token flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwaitingTokenData {
    pub plan_days: i32,
    pub plan_price: i32,
}

/// A provisioned clone bot
#[derive(Debug, Clone, PartialEq)]
pub struct ClonedBot {
    pub user_id: i64,
    pub token: String,
    pub plan_days: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Everything the handlers read from or write to durable storage
#[async_trait]
pub trait ProvisioningStore: Send + Sync {
    async fn is_banned(&self, user_id: i64) -> Result<bool>;

    /// Idempotent upsert of the user registry entry
    async fn add_user(&self, user_id: i64, username: Option<&str>, first_name: &str)
        -> Result<()>;

    async fn is_awaiting_token(&self, user_id: i64) -> Result<bool>;

    /// Payment context of the awaiting-token flag, `None` when the flag or
    /// its context is missing
    async fn get_awaiting_token_data(&self, user_id: i64) -> Result<Option<AwaitingTokenData>>;

    async fn set_awaiting_token(&self, user_id: i64, plan: Plan) -> Result<()>;

    async fn remove_awaiting_token(&self, user_id: i64) -> Result<()>;

    /// Record an outbound message sent to the owner on behalf of `user_id`
    async fn map_message(&self, user_id: i64, message_id: i32) -> Result<()>;

    async fn get_random_greeting(&self) -> Result<Option<String>>;

    async fn get_paid_batches(&self) -> Result<Option<String>>;

    async fn add_pending_payment(
        &self,
        user_id: i64,
        plan: Plan,
        screenshot_file_id: &str,
    ) -> Result<PendingPayment>;

    async fn get_pending_payment(&self, payment_id: i64) -> Result<Option<PendingPayment>>;

    /// Move a payment out of `pending`. Returns `false` when it was not pending.
    async fn resolve_pending_payment(&self, payment_id: i64, status: PaymentStatus)
        -> Result<bool>;

    /// Approve a pending payment and arm the awaiting-token flag of `user_id`
    /// for `plan` as one unit. Returns `false`, writing nothing, when the
    /// payment was not pending.
    async fn approve_pending_payment(&self, payment_id: i64, user_id: i64, plan: Plan)
        -> Result<bool>;

    /// Record the clone bot and clear the awaiting-token flag as one unit
    async fn activate_cloned_bot(
        &self,
        user_id: i64,
        token: &str,
        plan_days: i32,
    ) -> Result<ClonedBot>;

    /// Most recently expiring clone bot of a user
    async fn get_cloned_bot(&self, user_id: i64) -> Result<Option<ClonedBot>>;
}

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<PgPool> {
        &self.pool
    }
}

/// Run a db call inside a span and record its latency under `operation`
macro_rules! timed {
    ($operation:expr, $table:expr, $call:expr) => {{
        let start = Instant::now();
        let result = $call
            .instrument(crate::observability::db_span($operation, $table))
            .await;
        crate::observability::record_db_metrics($operation, start.elapsed());
        if let Err(e) = &result {
            crate::errors::error_logging::log_database_error(e, $operation, None, None);
        }
        result
    }};
}

#[async_trait]
impl ProvisioningStore for PgStore {
    async fn is_banned(&self, user_id: i64) -> Result<bool> {
        timed!("is_banned", "banned_users", db::is_banned(&self.pool, user_id))
    }

    async fn add_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: &str,
    ) -> Result<()> {
        timed!("add_user", "users", db::upsert_user(&self.pool, user_id, username, first_name))
    }

    async fn is_awaiting_token(&self, user_id: i64) -> Result<bool> {
        timed!("is_awaiting_token", "awaiting_tokens", db::is_awaiting_token(&self.pool, user_id))
    }

    async fn get_awaiting_token_data(&self, user_id: i64) -> Result<Option<AwaitingTokenData>> {
        timed!(
            "get_awaiting_token_data",
            "awaiting_tokens",
            db::get_awaiting_token_data(&self.pool, user_id)
        )
    }

    async fn set_awaiting_token(&self, user_id: i64, plan: Plan) -> Result<()> {
        timed!(
            "set_awaiting_token",
            "awaiting_tokens",
            db::set_awaiting_token(self.pool.as_ref(), user_id, plan.days, plan.price)
        )
    }

    async fn remove_awaiting_token(&self, user_id: i64) -> Result<()> {
        timed!(
            "remove_awaiting_token",
            "awaiting_tokens",
            db::remove_awaiting_token(self.pool.as_ref(), user_id)
        )
    }

    async fn map_message(&self, user_id: i64, message_id: i32) -> Result<()> {
        timed!("map_message", "message_map", db::map_message(&self.pool, user_id, message_id))
    }

    async fn get_random_greeting(&self) -> Result<Option<String>> {
        let greetings = timed!("list_greetings", "greetings", db::list_greetings(&self.pool))?;
        Ok(pick_random(greetings))
    }

    async fn get_paid_batches(&self) -> Result<Option<String>> {
        timed!(
            "get_paid_batches",
            "bot_settings",
            db::get_setting(&self.pool, db::PAID_BATCHES_KEY)
        )
    }

    async fn add_pending_payment(
        &self,
        user_id: i64,
        plan: Plan,
        screenshot_file_id: &str,
    ) -> Result<PendingPayment> {
        timed!(
            "add_pending_payment",
            "pending_payments",
            db::create_pending_payment(
                &self.pool,
                user_id,
                plan.days,
                plan.price,
                screenshot_file_id
            )
        )
    }

    async fn get_pending_payment(&self, payment_id: i64) -> Result<Option<PendingPayment>> {
        timed!(
            "get_pending_payment",
            "pending_payments",
            db::read_pending_payment(&self.pool, payment_id)
        )
    }

    async fn resolve_pending_payment(
        &self,
        payment_id: i64,
        status: PaymentStatus,
    ) -> Result<bool> {
        timed!(
            "resolve_pending_payment",
            "pending_payments",
            db::resolve_pending_payment(self.pool.as_ref(), payment_id, status)
        )
    }

    async fn approve_pending_payment(
        &self,
        payment_id: i64,
        user_id: i64,
        plan: Plan,
    ) -> Result<bool> {
        timed!(
            "approve_pending_payment",
            "pending_payments",
            db::approve_pending_payment(&self.pool, payment_id, user_id, plan.days, plan.price)
        )
    }

    async fn activate_cloned_bot(
        &self,
        user_id: i64,
        token: &str,
        plan_days: i32,
    ) -> Result<ClonedBot> {
        timed!(
            "activate_cloned_bot",
            "cloned_bots",
            db::activate_cloned_bot(&self.pool, user_id, token, plan_days)
        )
    }

    async fn get_cloned_bot(&self, user_id: i64) -> Result<Option<ClonedBot>> {
        timed!("get_cloned_bot", "cloned_bots", db::read_latest_cloned_bot(&self.pool, user_id))
    }
}

/// Choose one entry uniformly, `None` for an empty pool
pub fn pick_random(mut pool: Vec<String>) -> Option<String> {
    use rand::Rng;

    if pool.is_empty() {
        return None;
    }
    let index = rand::rng().random_range(0..pool.len());
    Some(pool.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Approved,
            PaymentStatus::Rejected,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::parse("refunded"), None);
    }

    #[test]
    fn test_pick_random() {
        assert_eq!(pick_random(Vec::new()), None);
        assert_eq!(pick_random(vec!["hi".to_string()]), Some("hi".to_string()));

        let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let picked = pick_random(pool.clone()).unwrap();
        assert!(pool.contains(&picked));
    }
}

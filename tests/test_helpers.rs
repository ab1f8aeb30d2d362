//! # Test Helper Library
//!
//! In-memory stand-ins for the store and the Telegram gateway so the
//! provisioning flow can be driven end to end without PostgreSQL or a bot.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use clone_relay_bot::bot::{HandlerContext, UserProfile};
use clone_relay_bot::config::PaymentConfig;
use clone_relay_bot::dialogue::{selection_dialogue, SelectionDialogue, SelectionStorage};
use clone_relay_bot::gateway::{InboundContent, MessagingGateway, TokenCheck};
use clone_relay_bot::localization::{create_localization_manager, LocalizationManager};
use clone_relay_bot::plans::Plan;
use clone_relay_bot::store::{
    AwaitingTokenData, ClonedBot, PaymentStatus, PendingPayment, ProvisioningStore,
};
use parking_lot::Mutex;
use sqlx::postgres::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::types::{
    CallbackQueryId, ChatId, InlineKeyboardButtonKind, InlineKeyboardMarkup, MessageId,
};

pub const OWNER_ID: i64 = 1000;
pub const USER_ID: i64 = 42;
pub const VALID_TOKEN: &str = "123456:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Setup a test database connection pool
///
/// Returns None if DATABASE_URL is not set (graceful skip for integration tests)
pub async fn setup_test_database() -> Result<Option<Arc<PgPool>>> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            println!("⚠️ Skipping database test - DATABASE_URL not set");
            return Ok(None);
        }
    };

    let pool = match PgPool::connect(&database_url).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            println!("⚠️ Skipping database test - failed to connect: {}", e);
            return Ok(None);
        }
    };

    clone_relay_bot::db::init_database_schema(&pool).await?;
    Ok(Some(pool))
}

#[derive(Default)]
struct StoreState {
    users: HashMap<i64, (Option<String>, String)>,
    banned: HashSet<i64>,
    awaiting: HashMap<i64, Option<AwaitingTokenData>>,
    message_map: Vec<(i64, i32)>,
    greetings: Vec<String>,
    paid_batches: Option<String>,
    payments: Vec<PendingPayment>,
    clones: Vec<ClonedBot>,
    fail_payment_inserts: bool,
    fail_awaiting_writes: bool,
    fail_clone_activations: bool,
}

/// Store keeping everything in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn ban(&self, user_id: i64) {
        self.state.lock().banned.insert(user_id);
    }

    /// Arm the awaiting-token flag without any payment context
    pub fn set_awaiting_without_data(&self, user_id: i64) {
        self.state.lock().awaiting.insert(user_id, None);
    }

    pub fn add_greeting(&self, text: &str) {
        self.state.lock().greetings.push(text.to_string());
    }

    pub fn set_paid_batches(&self, text: &str) {
        self.state.lock().paid_batches = Some(text.to_string());
    }

    pub fn fail_payment_inserts(&self) {
        self.state.lock().fail_payment_inserts = true;
    }

    /// Make every awaiting-token write, approval included, fail until reset
    pub fn fail_awaiting_writes(&self, fail: bool) {
        self.state.lock().fail_awaiting_writes = fail;
    }

    pub fn fail_clone_activations(&self, fail: bool) {
        self.state.lock().fail_clone_activations = fail;
    }

    pub fn add_clone(&self, clone: ClonedBot) {
        self.state.lock().clones.push(clone);
    }

    pub fn payments(&self) -> Vec<PendingPayment> {
        self.state.lock().payments.clone()
    }

    pub fn clones(&self) -> Vec<ClonedBot> {
        self.state.lock().clones.clone()
    }

    pub fn mapped_messages(&self) -> Vec<(i64, i32)> {
        self.state.lock().message_map.clone()
    }

    pub fn has_user(&self, user_id: i64) -> bool {
        self.state.lock().users.contains_key(&user_id)
    }

    pub fn awaiting_flag(&self, user_id: i64) -> Option<Option<AwaitingTokenData>> {
        self.state.lock().awaiting.get(&user_id).copied()
    }
}

#[async_trait]
impl ProvisioningStore for MemoryStore {
    async fn is_banned(&self, user_id: i64) -> Result<bool> {
        Ok(self.state.lock().banned.contains(&user_id))
    }

    async fn add_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: &str,
    ) -> Result<()> {
        self.state.lock().users.insert(
            user_id,
            (username.map(str::to_string), first_name.to_string()),
        );
        Ok(())
    }

    async fn is_awaiting_token(&self, user_id: i64) -> Result<bool> {
        Ok(self.state.lock().awaiting.contains_key(&user_id))
    }

    async fn get_awaiting_token_data(&self, user_id: i64) -> Result<Option<AwaitingTokenData>> {
        Ok(self.state.lock().awaiting.get(&user_id).copied().flatten())
    }

    async fn set_awaiting_token(&self, user_id: i64, plan: Plan) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_awaiting_writes {
            return Err(anyhow!("connection reset"));
        }
        state.awaiting.insert(
            user_id,
            Some(AwaitingTokenData {
                plan_days: plan.days,
                plan_price: plan.price,
            }),
        );
        Ok(())
    }

    async fn remove_awaiting_token(&self, user_id: i64) -> Result<()> {
        self.state.lock().awaiting.remove(&user_id);
        Ok(())
    }

    async fn map_message(&self, user_id: i64, message_id: i32) -> Result<()> {
        self.state.lock().message_map.push((user_id, message_id));
        Ok(())
    }

    async fn get_random_greeting(&self) -> Result<Option<String>> {
        Ok(self.state.lock().greetings.first().cloned())
    }

    async fn get_paid_batches(&self) -> Result<Option<String>> {
        Ok(self.state.lock().paid_batches.clone())
    }

    async fn add_pending_payment(
        &self,
        user_id: i64,
        plan: Plan,
        screenshot_file_id: &str,
    ) -> Result<PendingPayment> {
        let mut state = self.state.lock();
        if state.fail_payment_inserts {
            return Err(anyhow!("payment insert failed"));
        }
        let payment = PendingPayment {
            id: state.payments.len() as i64 + 1,
            user_id,
            plan_days: plan.days,
            plan_price: plan.price,
            screenshot_file_id: screenshot_file_id.to_string(),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn get_pending_payment(&self, payment_id: i64) -> Result<Option<PendingPayment>> {
        Ok(self
            .state
            .lock()
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned())
    }

    async fn resolve_pending_payment(
        &self,
        payment_id: i64,
        status: PaymentStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        match state
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id && p.status == PaymentStatus::Pending)
        {
            Some(payment) => {
                payment.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn approve_pending_payment(
        &self,
        payment_id: i64,
        user_id: i64,
        plan: Plan,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        if state.fail_awaiting_writes {
            return Err(anyhow!("connection reset"));
        }
        let Some(payment) = state
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id && p.status == PaymentStatus::Pending)
        else {
            return Ok(false);
        };
        payment.status = PaymentStatus::Approved;
        state.awaiting.insert(
            user_id,
            Some(AwaitingTokenData {
                plan_days: plan.days,
                plan_price: plan.price,
            }),
        );
        Ok(true)
    }

    async fn activate_cloned_bot(
        &self,
        user_id: i64,
        token: &str,
        plan_days: i32,
    ) -> Result<ClonedBot> {
        let mut state = self.state.lock();
        if state.fail_clone_activations {
            return Err(anyhow!("connection reset"));
        }
        let created_at = Utc::now();
        let clone = ClonedBot {
            user_id,
            token: token.to_string(),
            plan_days,
            created_at,
            expires_at: created_at + Duration::days(plan_days as i64),
        };
        state.clones.push(clone.clone());
        state.awaiting.remove(&user_id);
        Ok(clone)
    }

    async fn get_cloned_bot(&self, user_id: i64) -> Result<Option<ClonedBot>> {
        Ok(self
            .state
            .lock()
            .clones
            .iter()
            .filter(|c| c.user_id == user_id)
            .max_by_key(|c| c.expires_at)
            .cloned())
    }
}

/// Something the bot sent
#[derive(Debug, Clone)]
pub enum Sent {
    Text {
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Html {
        chat: ChatId,
        html: String,
    },
    Content {
        chat: ChatId,
        content: InboundContent,
    },
    Photo {
        chat: ChatId,
        file_id: String,
        caption: String,
        keyboard: InlineKeyboardMarkup,
    },
    CallbackAnswer {
        toast: Option<String>,
    },
}

impl Sent {
    pub fn chat(&self) -> Option<ChatId> {
        match self {
            Sent::Text { chat, .. }
            | Sent::Html { chat, .. }
            | Sent::Content { chat, .. }
            | Sent::Photo { chat, .. } => Some(*chat),
            Sent::CallbackAnswer { .. } => None,
        }
    }
}

/// Gateway recording every outbound call
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
    token_checks: Mutex<Vec<String>>,
    token_check: Mutex<TokenCheck>,
    fail_owner_chat: Mutex<bool>,
    next_id: Mutex<i32>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            token_checks: Mutex::new(Vec::new()),
            token_check: Mutex::new(TokenCheck::Valid {
                username: "my_clone_bot".to_string(),
            }),
            fail_owner_chat: Mutex::new(false),
            next_id: Mutex::new(100),
        }
    }
}

impl RecordingGateway {
    pub fn set_token_check(&self, check: TokenCheck) {
        *self.token_check.lock() = check;
    }

    /// Make every delivery to the owner chat fail
    pub fn fail_owner_chat(&self) {
        *self.fail_owner_chat.lock() = true;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, chat: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.chat() == Some(ChatId(chat)))
            .collect()
    }

    /// Plain texts sent to a chat, in order
    pub fn texts_to(&self, chat: i64) -> Vec<String> {
        self.sent_to(chat)
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, chat: i64) -> Option<String> {
        self.texts_to(chat).pop()
    }

    pub fn token_checks(&self) -> Vec<String> {
        self.token_checks.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    fn record(&self, chat: ChatId, sent: Sent) -> Result<MessageId> {
        if *self.fail_owner_chat.lock() && chat == ChatId(OWNER_ID) {
            return Err(anyhow!("Forbidden: bot was blocked by the user"));
        }
        self.sent.lock().push(sent);
        let mut next = self.next_id.lock();
        *next += 1;
        Ok(MessageId(*next))
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        self.record(
            chat,
            Sent::Text {
                chat,
                text: text.to_string(),
                keyboard,
            },
        )
    }

    async fn send_html(&self, chat: ChatId, html: &str) -> Result<MessageId> {
        self.record(
            chat,
            Sent::Html {
                chat,
                html: html.to_string(),
            },
        )
    }

    async fn send_content(&self, chat: ChatId, content: &InboundContent) -> Result<MessageId> {
        self.record(
            chat,
            Sent::Content {
                chat,
                content: content.clone(),
            },
        )
    }

    async fn send_photo_with_actions(
        &self,
        chat: ChatId,
        file_id: &str,
        caption_html: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<MessageId> {
        self.record(
            chat,
            Sent::Photo {
                chat,
                file_id: file_id.to_string(),
                caption: caption_html.to_string(),
                keyboard,
            },
        )
    }

    async fn fetch_bot_identity(&self, token: &str) -> TokenCheck {
        self.token_checks.lock().push(token.to_string());
        self.token_check.lock().clone()
    }

    async fn answer_callback(
        &self,
        _callback_id: &CallbackQueryId,
        toast: Option<&str>,
    ) -> Result<()> {
        self.sent.lock().push(Sent::CallbackAnswer {
            toast: toast.map(str::to_string),
        });
        Ok(())
    }
}

/// Callback data of every button in a keyboard, row by row
pub fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
    keyboard
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|button| match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

/// Everything a handler needs, wired to the in-memory doubles
pub struct TestEnv {
    pub store: MemoryStore,
    pub gateway: RecordingGateway,
    pub localization: Arc<LocalizationManager>,
    pub payment: PaymentConfig,
    pub selections: Arc<SelectionStorage>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::default(),
            gateway: RecordingGateway::default(),
            localization: create_localization_manager()
                .expect("Failed to create localization manager"),
            payment: PaymentConfig::default(),
            selections: InMemStorage::new(),
        }
    }

    pub fn ctx(&self) -> HandlerContext<'_> {
        HandlerContext {
            store: &self.store,
            gateway: &self.gateway,
            localization: &self.localization,
            owner_chat: ChatId(OWNER_ID),
            payment: &self.payment,
        }
    }

    pub fn dialogue(&self, user_id: i64) -> SelectionDialogue {
        selection_dialogue(Arc::clone(&self.selections), user_id)
    }

    /// Localized English text, for comparing with what was sent
    pub fn text(&self, key: &str) -> String {
        self.ctx().text(key, None)
    }
}

pub fn user(id: i64) -> UserProfile {
    UserProfile {
        id,
        first_name: "Asha".to_string(),
        username: Some("asha_k".to_string()),
        language_code: Some("en".to_string()),
    }
}

pub fn photo(file_id: &str) -> InboundContent {
    InboundContent::Photo {
        file_id: file_id.to_string(),
        caption: None,
    }
}

pub fn text(value: &str) -> InboundContent {
    InboundContent::Text(value.to_string())
}

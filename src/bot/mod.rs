//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `callbacks`: Inline keyboard callback routing, including owner review
//! - `command_handlers`: `/start` and `/help`
//! - `dialogue_manager`: The clone-bot provisioning state machine
//! - `media_handlers`: Relay of user messages to the owner
//! - `message_handler`: Routing of incoming messages
//! - `ui_builder`: Keyboards and message formatting

pub mod callbacks;
pub mod command_handlers;
pub mod dialogue_manager;
pub mod media_handlers;
pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;

use teloxide::types::{ChatId, User};

use crate::config::PaymentConfig;
use crate::dialogue::{selection_dialogue, SelectionDialogue, SelectionStorage};
use crate::gateway::MessagingGateway;
use crate::localization::{t_args_lang, t_lang, LocalizationManager};
use crate::store::ProvisioningStore;

/// The Telegram user behind an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl UserProfile {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.0 as i64,
            first_name: user.first_name.clone(),
            username: user.username.clone(),
            language_code: user.language_code.clone(),
        }
    }

    /// Private chat with this user
    pub fn chat(&self) -> ChatId {
        ChatId(self.id)
    }

    /// Username for display, `None` when the user has none
    pub fn handle(&self) -> &str {
        self.username.as_deref().unwrap_or("None")
    }

    pub fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }
}

/// Common context for bot handlers containing shared dependencies
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub store: &'a dyn ProvisioningStore,
    pub gateway: &'a dyn MessagingGateway,
    pub localization: &'a LocalizationManager,
    pub owner_chat: ChatId,
    pub payment: &'a PaymentConfig,
}

impl HandlerContext<'_> {
    /// Localized text without arguments
    pub fn text(&self, key: &str, language_code: Option<&str>) -> String {
        t_lang(self.localization, key, language_code)
    }

    /// Localized text with arguments
    pub fn text_args(
        &self,
        key: &str,
        args: &[(&str, fluent_bundle::FluentValue<'_>)],
        language_code: Option<&str>,
    ) -> String {
        t_args_lang(self.localization, key, args, language_code)
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_chat.0 == user_id
    }
}

/// Long-lived handler dependencies, shared by every update
pub struct AppState {
    pub store: Arc<dyn ProvisioningStore>,
    pub gateway: Arc<dyn MessagingGateway>,
    pub localization: Arc<LocalizationManager>,
    pub selections: Arc<SelectionStorage>,
    pub owner_id: i64,
    pub payment: PaymentConfig,
}

impl AppState {
    pub fn ctx(&self) -> HandlerContext<'_> {
        HandlerContext {
            store: self.store.as_ref(),
            gateway: self.gateway.as_ref(),
            localization: self.localization.as_ref(),
            owner_chat: ChatId(self.owner_id),
            payment: &self.payment,
        }
    }

    /// Plan selection session of a user
    pub fn selection(&self, user_id: i64) -> SelectionDialogue {
        selection_dialogue(Arc::clone(&self.selections), user_id)
    }
}

pub use callbacks::callback_handler::callback_handler;
pub use message_handler::message_handler;

//! # Clone Relay Bot
//!
//! A Telegram bot that relays user messages to its owner and sells clone
//! bots: users pick a plan, pay, get approved by the owner and activate their
//! own bot with a token from @BotFather.

pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod gateway;
pub mod localization;
pub mod observability;
pub mod observability_config;
pub mod plans;
pub mod store;
pub mod validation;

// Re-export types for easier access
pub use gateway::{InboundContent, MessagingGateway, TelegramGateway, TokenCheck};
pub use plans::Plan;
pub use store::{PgStore, ProvisioningStore};

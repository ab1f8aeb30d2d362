//! Outbound side of the Telegram Bot API as seen by the handlers.
//!
//! [`MessagingGateway`] is the only way handlers talk back to Telegram, so the
//! provisioning flow can be driven in tests without a live bot.

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatId, FileId, InlineKeyboardMarkup, InputFile, MessageId, ParseMode,
};

/// Content of an inbound user message, by kind.
///
/// Captions are kept for the kinds Telegram allows them on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    Text(String),
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Video {
        file_id: String,
        caption: Option<String>,
    },
    Document {
        file_id: String,
        caption: Option<String>,
    },
    Voice {
        file_id: String,
    },
    Audio {
        file_id: String,
        caption: Option<String>,
    },
    VideoNote {
        file_id: String,
    },
}

impl InboundContent {
    /// Classify a Telegram message. `None` for kinds the relay does not carry
    /// (stickers, locations, service messages...).
    pub fn from_message(msg: &Message) -> Option<Self> {
        let caption = msg.caption().map(str::to_string);

        if let Some(text) = msg.text() {
            return Some(InboundContent::Text(text.to_string()));
        }
        if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
            return Some(InboundContent::Photo {
                file_id: photo.file.id.to_string(),
                caption,
            });
        }
        if let Some(video) = msg.video() {
            return Some(InboundContent::Video {
                file_id: video.file.id.to_string(),
                caption,
            });
        }
        if let Some(document) = msg.document() {
            return Some(InboundContent::Document {
                file_id: document.file.id.to_string(),
                caption,
            });
        }
        if let Some(voice) = msg.voice() {
            return Some(InboundContent::Voice {
                file_id: voice.file.id.to_string(),
            });
        }
        if let Some(audio) = msg.audio() {
            return Some(InboundContent::Audio {
                file_id: audio.file.id.to_string(),
                caption,
            });
        }
        msg.video_note().map(|note| InboundContent::VideoNote {
            file_id: note.file.id.to_string(),
        })
    }

    /// Short kind label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            InboundContent::Text(_) => "text",
            InboundContent::Photo { .. } => "photo",
            InboundContent::Video { .. } => "video",
            InboundContent::Document { .. } => "document",
            InboundContent::Voice { .. } => "voice",
            InboundContent::Audio { .. } => "audio",
            InboundContent::VideoNote { .. } => "video_note",
        }
    }

    /// File id of the largest photo, for payment screenshots
    pub fn photo_file_id(&self) -> Option<&str> {
        match self {
            InboundContent::Photo { file_id, .. } => Some(file_id),
            _ => None,
        }
    }
}

/// Outcome of probing a bot token against the Bot API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCheck {
    /// The token authenticates the bot with this username
    Valid { username: String },
    /// Telegram (or the network) refused the token
    Invalid { reason: String },
}

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send plain text, optionally with an inline keyboard
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId>;

    /// Send HTML formatted text
    async fn send_html(&self, chat: ChatId, html: &str) -> Result<MessageId>;

    /// Re-send user content by file id, captions preserved
    async fn send_content(&self, chat: ChatId, content: &InboundContent) -> Result<MessageId>;

    /// Send a photo with an HTML caption and action buttons
    async fn send_photo_with_actions(
        &self,
        chat: ChatId,
        file_id: &str,
        caption_html: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<MessageId>;

    /// Ask Telegram which bot `token` authenticates
    async fn fetch_bot_identity(&self, token: &str) -> TokenCheck;

    /// Acknowledge a button press, optionally with a toast
    async fn answer_callback(&self, callback_id: &CallbackQueryId, toast: Option<&str>)
        -> Result<()>;
}

/// Gateway backed by a live [`Bot`]
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
    client: reqwest::Client,
}

impl TelegramGateway {
    /// `client` is reused for token checks so they share the bot's timeouts
    pub fn new(bot: Bot, client: reqwest::Client) -> Self {
        Self { bot, client }
    }
}

fn file(file_id: &str) -> InputFile {
    InputFile::file_id(FileId(file_id.to_string()))
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId> {
        let sent = match keyboard {
            Some(keyboard) => {
                self.bot
                    .send_message(chat, text)
                    .reply_markup(keyboard)
                    .await?
            }
            None => self.bot.send_message(chat, text).await?,
        };
        crate::observability::record_telegram_message("outbound_text");
        Ok(sent.id)
    }

    async fn send_html(&self, chat: ChatId, html: &str) -> Result<MessageId> {
        let sent = self
            .bot
            .send_message(chat, html)
            .parse_mode(ParseMode::Html)
            .await?;
        crate::observability::record_telegram_message("outbound_html");
        Ok(sent.id)
    }

    async fn send_content(&self, chat: ChatId, content: &InboundContent) -> Result<MessageId> {
        let caption = |c: &Option<String>| c.clone().unwrap_or_default();

        let sent = match content {
            InboundContent::Text(text) => self.bot.send_message(chat, text).await?,
            InboundContent::Photo { file_id, caption: c } => {
                self.bot
                    .send_photo(chat, file(file_id))
                    .caption(caption(c))
                    .await?
            }
            InboundContent::Video { file_id, caption: c } => {
                self.bot
                    .send_video(chat, file(file_id))
                    .caption(caption(c))
                    .await?
            }
            InboundContent::Document { file_id, caption: c } => {
                self.bot
                    .send_document(chat, file(file_id))
                    .caption(caption(c))
                    .await?
            }
            InboundContent::Voice { file_id } => self.bot.send_voice(chat, file(file_id)).await?,
            InboundContent::Audio { file_id, caption: c } => {
                self.bot
                    .send_audio(chat, file(file_id))
                    .caption(caption(c))
                    .await?
            }
            InboundContent::VideoNote { file_id } => {
                self.bot.send_video_note(chat, file(file_id)).await?
            }
        };
        crate::observability::record_telegram_message(content.kind());
        Ok(sent.id)
    }

    async fn send_photo_with_actions(
        &self,
        chat: ChatId,
        file_id: &str,
        caption_html: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<MessageId> {
        let sent = self
            .bot
            .send_photo(chat, file(file_id))
            .caption(caption_html)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
        crate::observability::record_telegram_message("outbound_photo");
        Ok(sent.id)
    }

    async fn fetch_bot_identity(&self, token: &str) -> TokenCheck {
        let token_bot = Bot::with_client(token, self.client.clone());
        match token_bot.get_me().await {
            Ok(me) => TokenCheck::Valid {
                username: me.user.username.clone().unwrap_or_default(),
            },
            Err(e) => TokenCheck::Invalid {
                reason: e.to_string(),
            },
        }
    }

    async fn answer_callback(
        &self,
        callback_id: &CallbackQueryId,
        toast: Option<&str>,
    ) -> Result<()> {
        let request = self.bot.answer_callback_query(callback_id.clone());
        match toast {
            Some(text) => request.text(text).await?,
            None => request.await?,
        };
        Ok(())
    }
}

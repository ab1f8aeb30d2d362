//! Message Handler module for routing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use teloxide::prelude::*;
use tracing::{debug, Instrument};

use super::command_handlers::{handle_help_command, handle_start_command, Command};
use super::dialogue_manager::{
    handle_token_submission, submit_payment_screenshot, PaymentSubmission, TokenOutcome,
};
use super::media_handlers::{forward_to_owner, RelayOutcome};
use super::{AppState, HandlerContext, UserProfile};
use crate::dialogue::SelectionDialogue;
use crate::errors::error_logging;
use crate::gateway::InboundContent;
use crate::observability;

/// Where a message ended up
#[derive(Debug, Clone, PartialEq)]
pub enum MessageRoute {
    Command(Command),
    /// Dropped without a reply (banned sender, owner chatter)
    Ignored,
    Token(TokenOutcome),
    Payment(PaymentSubmission),
    Relayed(RelayOutcome),
    /// A message kind the relay does not carry
    Unsupported,
}

/// Entry point for every message update
pub async fn message_handler(msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user = UserProfile::from_user(from);
    let span = observability::telegram_span("message_handler", Some(user.id));

    let start_time = Instant::now();
    let content = InboundContent::from_message(&msg);
    observability::record_telegram_message(content.as_ref().map_or("unsupported", |c| c.kind()));

    let ctx = state.ctx();
    let dialogue = state.selection(user.id);
    let result = route_message(&ctx, &user, &dialogue, content.as_ref())
        .instrument(span)
        .await;

    let status = if result.is_ok() { 200 } else { 500 };
    observability::record_request_metrics("telegram_message", status, start_time.elapsed());

    if let Err(e) = result {
        error_logging::log_internal_error(&e, "message_handler", "route_message", Some(user.id));
        if let Err(send_err) = ctx
            .gateway
            .send_text(user.chat(), &ctx.text("error-generic", user.lang()), None)
            .await
        {
            error_logging::log_delivery_error(&send_err, "error_reply", user.id, None);
        }
    }

    Ok(())
}

/// Route one message through commands, ban list, token handling, payment
/// screenshots and finally the relay, in that order.
pub async fn route_message(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    dialogue: &SelectionDialogue,
    content: Option<&InboundContent>,
) -> Result<MessageRoute> {
    if let Some(InboundContent::Text(text)) = content {
        if let Some(command) = Command::parse(text) {
            match command {
                Command::Start => handle_start_command(ctx, user).await?,
                Command::Help => {
                    if ctx.store.is_banned(user.id).await? {
                        return Ok(MessageRoute::Ignored);
                    }
                    handle_help_command(ctx, user).await?
                }
            }
            return Ok(MessageRoute::Command(command));
        }
    }

    if ctx.store.is_banned(user.id).await? {
        debug!(user_id = %user.id, "Ignoring message from banned user");
        return Ok(MessageRoute::Ignored);
    }

    // Token handling pre-empts everything else, whatever the message kind
    if ctx.store.is_awaiting_token(user.id).await? {
        let outcome = handle_token_submission(ctx, user, content).await?;
        return Ok(MessageRoute::Token(outcome));
    }

    if ctx.is_owner(user.id) {
        return Ok(MessageRoute::Ignored);
    }

    let Some(content) = content else {
        debug!(user_id = %user.id, "Unsupported message kind");
        return Ok(MessageRoute::Unsupported);
    };

    if let Some(file_id) = content.photo_file_id() {
        match submit_payment_screenshot(ctx, user, dialogue, file_id).await? {
            PaymentSubmission::Ignored => {}
            submission => return Ok(MessageRoute::Payment(submission)),
        }
    }

    let outcome = forward_to_owner(ctx, user, content).await?;
    Ok(MessageRoute::Relayed(outcome))
}

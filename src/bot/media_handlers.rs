//! Relay of user messages to the owner

use anyhow::Result;
use tracing::info;

use super::ui_builder::format_relay_header;
use super::{HandlerContext, UserProfile};
use crate::errors::error_logging;
use crate::gateway::InboundContent;

/// Result of relaying one user message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Header and content reached the owner, the user got a greeting
    Delivered,
    /// Delivery failed, the user was told so
    Failed,
}

/// Forward a user's message to the owner behind an identifying header.
///
/// Every message that reaches the owner chat is mapped back to the user.
/// Delivery failures are reported to the user, not propagated.
pub async fn forward_to_owner(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    content: &InboundContent,
) -> Result<RelayOutcome> {
    ctx.store
        .add_user(user.id, user.username.as_deref(), &user.first_name)
        .await?;

    if let Err(e) = relay(ctx, user, content).await {
        error_logging::log_delivery_error(&e, "forward_to_owner", user.id, Some(ctx.owner_chat.0));
        ctx.gateway
            .send_text(user.chat(), &ctx.text("relay-failed", user.lang()), None)
            .await?;
        return Ok(RelayOutcome::Failed);
    }

    info!(user_id = %user.id, kind = content.kind(), "Message forwarded to owner");
    Ok(RelayOutcome::Delivered)
}

async fn relay(ctx: &HandlerContext<'_>, user: &UserProfile, content: &InboundContent) -> Result<()> {
    let header_id = ctx
        .gateway
        .send_html(ctx.owner_chat, &format_relay_header(ctx, user))
        .await?;
    ctx.store.map_message(user.id, header_id.0).await?;

    let content_id = ctx.gateway.send_content(ctx.owner_chat, content).await?;
    ctx.store.map_message(user.id, content_id.0).await?;

    let greeting = match ctx.store.get_random_greeting().await? {
        Some(greeting) => greeting,
        None => ctx.text("greeting-default", user.lang()),
    };
    ctx.gateway.send_text(user.chat(), &greeting, None).await?;

    Ok(())
}

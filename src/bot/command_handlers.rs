//! Command Handlers module for processing bot commands

use anyhow::Result;
use tracing::debug;

use super::ui_builder::create_user_panel_keyboard;
use super::{HandlerContext, UserProfile};

/// Commands the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

impl Command {
    /// Parse the command at the start of a message, ignoring arguments and a
    /// `@botname` suffix
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Handle the /start command
pub async fn handle_start_command(ctx: &HandlerContext<'_>, user: &UserProfile) -> Result<()> {
    if ctx.store.is_banned(user.id).await? {
        ctx.gateway
            .send_text(user.chat(), &ctx.text("banned", user.lang()), None)
            .await?;
        return Ok(());
    }

    ctx.store
        .add_user(user.id, user.username.as_deref(), &user.first_name)
        .await?;

    ctx.gateway
        .send_text(
            user.chat(),
            &ctx.text("welcome", user.lang()),
            Some(create_user_panel_keyboard(ctx, user.lang())),
        )
        .await?;

    debug!(user_id = %user.id, "User panel sent");
    Ok(())
}

/// Handle the /help command and the help button
pub async fn handle_help_command(ctx: &HandlerContext<'_>, user: &UserProfile) -> Result<()> {
    ctx.gateway
        .send_text(user.chat(), &ctx.text("help-text", user.lang()), None)
        .await?;
    Ok(())
}

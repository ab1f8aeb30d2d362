//! Main callback handler that routes button presses to the appropriate handlers

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::types::CallbackQuery;
use tracing::{debug, Instrument};

use super::callback_types::CallbackAction;
use super::owner_callbacks::{review_payment, review_toast, ReviewDecision};
use crate::bot::command_handlers::handle_help_command;
use crate::bot::dialogue_manager::{cancel_selection, list_plans, select_plan, show_clone_status};
use crate::bot::{AppState, HandlerContext, UserProfile};
use crate::dialogue::SelectionDialogue;
use crate::errors::error_logging;
use crate::observability;

/// Entry point for every callback query update
pub async fn callback_handler(q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let user = UserProfile::from_user(&q.from);
    let span = observability::telegram_span("callback_handler", Some(user.id));

    let start_time = std::time::Instant::now();
    let action = CallbackAction::parse(q.data.as_deref().unwrap_or_default());
    observability::record_telegram_message(&format!("callback_{}", action.name()));

    let ctx = state.ctx();
    let dialogue = state.selection(user.id);

    let toast = match route_callback(&ctx, &user, &dialogue, action)
        .instrument(span)
        .await
    {
        Ok(toast) => toast,
        Err(e) => {
            error_logging::log_internal_error(&e, "callback_handler", action.name(), Some(user.id));
            if let Err(send_err) = ctx
                .gateway
                .send_text(user.chat(), &ctx.text("error-generic", user.lang()), None)
                .await
            {
                error_logging::log_delivery_error(&send_err, "error_reply", user.id, None);
            }
            None
        }
    };

    // Every press is acknowledged so the client stops its spinner
    if let Err(e) = ctx.gateway.answer_callback(&q.id, toast.as_deref()).await {
        error_logging::log_delivery_error(&e, "answer_callback", user.id, None);
    }

    observability::record_request_metrics("telegram_callback", 200, start_time.elapsed());
    Ok(())
}

/// Run a callback action. Returns the toast to show on the button press.
pub async fn route_callback(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    dialogue: &SelectionDialogue,
    action: CallbackAction,
) -> Result<Option<String>> {
    match action {
        CallbackAction::Approve {
            payment_id,
            user_id,
        } => {
            let outcome =
                review_payment(ctx, user.id, payment_id, user_id, ReviewDecision::Approve).await?;
            return Ok(review_toast(ctx, &outcome));
        }
        CallbackAction::Reject {
            payment_id,
            user_id,
        } => {
            let outcome =
                review_payment(ctx, user.id, payment_id, user_id, ReviewDecision::Reject).await?;
            return Ok(review_toast(ctx, &outcome));
        }
        _ => {}
    }

    if ctx.store.is_banned(user.id).await? {
        debug!(user_id = %user.id, "Ignoring callback from banned user");
        return Ok(None);
    }

    match action {
        CallbackAction::UserSend => {
            ctx.gateway
                .send_text(user.chat(), &ctx.text("send-prompt", user.lang()), None)
                .await?;
        }
        CallbackAction::PaidBatches => {
            let text = match ctx.store.get_paid_batches().await? {
                Some(batches) if !batches.trim().is_empty() => ctx.text_args(
                    "paid-batches",
                    &[("batches", batches.into())],
                    user.lang(),
                ),
                _ => ctx.text("paid-batches-empty", user.lang()),
            };
            ctx.gateway.send_text(user.chat(), &text, None).await?;
        }
        CallbackAction::CloneBot => list_plans(ctx, user).await?,
        CallbackAction::SelectPlan { days, price } => {
            select_plan(ctx, user, dialogue, days, price).await?;
        }
        CallbackAction::CancelPayment => {
            cancel_selection(ctx, user, dialogue).await?;
            return Ok(Some(ctx.text("payment-cancelled-toast", user.lang())));
        }
        CallbackAction::MyClone => {
            show_clone_status(ctx, user, Utc::now()).await?;
        }
        CallbackAction::Help => handle_help_command(ctx, user).await?,
        CallbackAction::Unknown => {
            debug!(user_id = %user.id, "Unknown callback data");
        }
        CallbackAction::Approve { .. } | CallbackAction::Reject { .. } => {}
    }

    Ok(None)
}

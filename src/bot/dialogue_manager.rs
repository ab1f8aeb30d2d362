//! Clone-bot provisioning state machine.
//!
//! A user moves through `Idle -> PlanSelected -> payment under review ->
//! awaiting token -> active clone`. The plan selection lives in the user's
//! session ([`SelectionDialogue`]); every later stage is durable and lives in
//! the store. Owner review is handled in
//! [`crate::bot::callbacks::owner_callbacks`].

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::ui_builder::{
    create_cancel_keyboard, create_plans_keyboard, create_review_keyboard,
    format_expiry_date, format_expiry_timestamp, format_owner_payment_caption,
    format_payment_details,
};
use super::{HandlerContext, UserProfile};
use crate::dialogue::{pending_plan, SelectionDialogue, SelectionState};
use crate::errors::error_logging;
use crate::gateway::{InboundContent, TokenCheck};
use crate::observability::{record_provisioning_transition, ProvisioningTransition};
use crate::plans::Plan;
use crate::store::{ClonedBot, PendingPayment};
use crate::validation::validate_token_format;

/// Result of a payment screenshot submission
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentSubmission {
    /// No plan was selected, nothing happened
    Ignored,
    Submitted(PendingPayment),
    /// The payment could not be recorded, the selection is kept
    Failed,
}

/// Result of a message sent while the user is expected to send a bot token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenOutcome {
    NotText,
    MalformedToken,
    /// Telegram refused the token
    Rejected { reason: String },
    /// The awaiting-token flag had no payment context and was dropped
    MissingPaymentData,
    Activated(ClonedBot),
}

/// Clone bot status of a user at a point in time
#[derive(Debug, Clone, PartialEq)]
pub enum CloneStatus {
    NoClone,
    Active {
        days_left: i64,
        expires_at: DateTime<Utc>,
    },
    Expired {
        expires_at: DateTime<Utc>,
    },
}

/// Whole days from `now` until `expiry`, rounded down
pub fn days_remaining(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiry - now).num_seconds().div_euclid(86_400)
}

/// Classify a user's latest clone bot
pub fn clone_status(clone: Option<&ClonedBot>, now: DateTime<Utc>) -> CloneStatus {
    match clone {
        None => CloneStatus::NoClone,
        Some(clone) if clone.expires_at <= now => CloneStatus::Expired {
            expires_at: clone.expires_at,
        },
        Some(clone) => CloneStatus::Active {
            days_left: days_remaining(clone.expires_at, now),
            expires_at: clone.expires_at,
        },
    }
}

/// Send the plan catalog with one button per plan
pub async fn list_plans(ctx: &HandlerContext<'_>, user: &UserProfile) -> Result<()> {
    let keyboard = create_plans_keyboard(ctx, user.lang());
    ctx.gateway
        .send_text(
            user.chat(),
            &ctx.text("plans-title", user.lang()),
            Some(keyboard),
        )
        .await?;
    Ok(())
}

/// Select a plan from the catalog and send payment instructions.
///
/// Pairs that are not a catalog entry are refused and leave the session
/// untouched.
pub async fn select_plan(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    dialogue: &SelectionDialogue,
    days: i32,
    price: i32,
) -> Result<Option<Plan>> {
    let Some(plan) = Plan::from_catalog(days, price) else {
        error_logging::log_validation_error(
            &format!("{}_{} is not a catalog plan", days, price),
            "select_plan",
            Some(user.id),
            "plan",
            Some(format!("plan_{}_{}", days, price).as_str()),
        );
        ctx.gateway
            .send_text(
                user.chat(),
                &ctx.text("plan-unavailable", user.lang()),
                None,
            )
            .await?;
        return Ok(None);
    };

    dialogue
        .update(SelectionState::PlanSelected { plan })
        .await?;

    ctx.gateway
        .send_text(
            user.chat(),
            &format_payment_details(ctx, &plan, user.lang()),
            Some(create_cancel_keyboard(ctx, user.lang())),
        )
        .await?;

    record_provisioning_transition(ProvisioningTransition::PlanSelected);
    info!(
        user_id = %user.id,
        plan_days = plan.days,
        plan_price = plan.price,
        "User selected plan"
    );
    Ok(Some(plan))
}

/// Drop the pending selection, if any, and confirm
pub async fn cancel_selection(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    dialogue: &SelectionDialogue,
) -> Result<()> {
    let had_selection = pending_plan(dialogue).await?.is_some();
    dialogue.reset().await?;

    if had_selection {
        record_provisioning_transition(ProvisioningTransition::SelectionCancelled);
    }
    debug!(user_id = %user.id, had_selection, "Plan selection cancelled");

    ctx.gateway
        .send_text(
            user.chat(),
            &ctx.text("payment-cancelled", user.lang()),
            None,
        )
        .await?;
    Ok(())
}

/// Turn a screenshot into a pending payment for the selected plan.
///
/// Without a selection the screenshot is ignored. A failure to record the
/// payment keeps the selection so the user can resend.
pub async fn submit_payment_screenshot(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    dialogue: &SelectionDialogue,
    screenshot_file_id: &str,
) -> Result<PaymentSubmission> {
    let Some(plan) = pending_plan(dialogue).await? else {
        return Ok(PaymentSubmission::Ignored);
    };

    let payment = match ctx
        .store
        .add_pending_payment(user.id, plan, screenshot_file_id)
        .await
    {
        Ok(payment) => payment,
        Err(e) => {
            error_logging::log_internal_error(&e, "payments", "add_pending_payment", Some(user.id));
            ctx.gateway
                .send_text(
                    user.chat(),
                    &ctx.text("payment-failed", user.lang()),
                    None,
                )
                .await?;
            return Ok(PaymentSubmission::Failed);
        }
    };

    dialogue.reset().await?;
    record_provisioning_transition(ProvisioningTransition::PaymentSubmitted);

    ctx.gateway
        .send_text(
            user.chat(),
            &ctx.text_args(
                "payment-received",
                &[("payment_id", payment.id.to_string().into())],
                user.lang(),
            ),
            None,
        )
        .await?;

    ctx.gateway
        .send_photo_with_actions(
            ctx.owner_chat,
            screenshot_file_id,
            &format_owner_payment_caption(ctx, user, &payment),
            create_review_keyboard(ctx, &payment),
        )
        .await?;

    info!(
        user_id = %user.id,
        payment_id = %payment.id,
        "Payment screenshot sent to owner for review"
    );
    Ok(PaymentSubmission::Submitted(payment))
}

/// Handle a message from a user whose payment was approved.
///
/// The token is checked locally first, then against Telegram, and only then
/// is the payment context looked up.
pub async fn handle_token_submission(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    content: Option<&InboundContent>,
) -> Result<TokenOutcome> {
    let Some(InboundContent::Text(text)) = content else {
        ctx.gateway
            .send_text(
                user.chat(),
                &ctx.text("token-not-text", user.lang()),
                None,
            )
            .await?;
        return Ok(TokenOutcome::NotText);
    };

    let token = match validate_token_format(text) {
        Ok(token) => token,
        Err(e) => {
            error_logging::log_validation_error(&e, "token_format", Some(user.id), "bot_token", None);
            ctx.gateway
                .send_text(
                    user.chat(),
                    &ctx.text("token-invalid-format", user.lang()),
                    None,
                )
                .await?;
            return Ok(TokenOutcome::MalformedToken);
        }
    };

    let bot_username = match ctx.gateway.fetch_bot_identity(token).await {
        TokenCheck::Valid { username } => username,
        TokenCheck::Invalid { reason } => {
            warn!(user_id = %user.id, reason = %reason, "Bot token rejected by Telegram");
            record_provisioning_transition(ProvisioningTransition::TokenRejected);
            ctx.gateway
                .send_text(
                    user.chat(),
                    &ctx.text_args(
                        "token-rejected",
                        &[("error", reason.as_str().into())],
                        user.lang(),
                    ),
                    None,
                )
                .await?;
            return Ok(TokenOutcome::Rejected { reason });
        }
    };

    let Some(payment) = ctx.store.get_awaiting_token_data(user.id).await? else {
        warn!(user_id = %user.id, "Awaiting token without payment data, dropping flag");
        ctx.store.remove_awaiting_token(user.id).await?;
        ctx.gateway
            .send_text(
                user.chat(),
                &ctx.text("token-missing-payment", user.lang()),
                None,
            )
            .await?;
        return Ok(TokenOutcome::MissingPaymentData);
    };

    // Clears the flag in the same commit, so a later token cannot clone twice
    let clone = ctx
        .store
        .activate_cloned_bot(user.id, token, payment.plan_days)
        .await?;
    record_provisioning_transition(ProvisioningTransition::CloneActivated);

    ctx.gateway
        .send_text(
            user.chat(),
            &ctx.text_args(
                "clone-ready",
                &[
                    ("bot_username", bot_username.as_str().into()),
                    ("days", clone.plan_days.into()),
                    ("expiry", format_expiry_timestamp(&clone).into()),
                ],
                user.lang(),
            ),
            None,
        )
        .await?;

    ctx.gateway
        .send_text(
            ctx.owner_chat,
            &ctx.text_args(
                "owner-clone-created",
                &[
                    ("bot_username", bot_username.as_str().into()),
                    ("name", user.first_name.as_str().into()),
                    ("username", user.handle().into()),
                    ("user_id", user.id.to_string().into()),
                    ("days", payment.plan_days.into()),
                    ("currency", ctx.payment.currency_symbol.as_str().into()),
                    ("price", payment.plan_price.into()),
                ],
                None,
            ),
            None,
        )
        .await?;

    info!(
        user_id = %user.id,
        bot_username = %bot_username,
        plan_days = payment.plan_days,
        "Clone bot created"
    );
    Ok(TokenOutcome::Activated(clone))
}

/// Report the user's clone bot status as of `now`
pub async fn show_clone_status(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    now: DateTime<Utc>,
) -> Result<CloneStatus> {
    let clone = ctx.store.get_cloned_bot(user.id).await?;
    let status = clone_status(clone.as_ref(), now);

    let text = match (&status, clone.as_ref()) {
        (CloneStatus::Active { days_left, .. }, Some(clone)) => ctx.text_args(
            "clone-status",
            &[
                ("days_left", (*days_left).into()),
                ("expiry", format_expiry_date(clone).into()),
            ],
            user.lang(),
        ),
        (CloneStatus::Expired { .. }, Some(clone)) => ctx.text_args(
            "clone-expired",
            &[("expiry", format_expiry_date(clone).into())],
            user.lang(),
        ),
        _ => ctx.text("no-clone", user.lang()),
    };

    ctx.gateway.send_text(user.chat(), &text, None).await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn clone_expiring(expires_at: DateTime<Utc>) -> ClonedBot {
        ClonedBot {
            user_id: 1,
            token: "123456:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            plan_days: 7,
            created_at: expires_at - Duration::days(7),
            expires_at,
        }
    }

    #[test]
    fn test_days_remaining_floors() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(days_remaining(now + Duration::days(7), now), 7);
        assert_eq!(
            days_remaining(now + Duration::days(7) - Duration::seconds(1), now),
            6
        );
        assert_eq!(days_remaining(now + Duration::hours(23), now), 0);
    }

    #[test]
    fn test_clone_status() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(clone_status(None, now), CloneStatus::NoClone);

        let active = clone_expiring(now + Duration::days(7));
        assert_eq!(
            clone_status(Some(&active), now),
            CloneStatus::Active {
                days_left: 7,
                expires_at: active.expires_at
            }
        );

        let expired = clone_expiring(now);
        assert_eq!(
            clone_status(Some(&expired), now),
            CloneStatus::Expired { expires_at: now }
        );
    }
}

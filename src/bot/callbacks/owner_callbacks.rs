//! Owner review of submitted payments

use anyhow::Result;
use teloxide::types::ChatId;
use tracing::{info, warn};

use crate::bot::HandlerContext;
use crate::observability::{record_provisioning_transition, ProvisioningTransition};
use crate::plans::Plan;
use crate::store::{PaymentStatus, PendingPayment};

/// The owner's decision on a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// What a review button press did
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    /// Someone other than the owner pressed the button
    NotOwner,
    /// No such payment for that user
    NotFound,
    AlreadyProcessed(PaymentStatus),
    Approved(PendingPayment),
    Rejected(PendingPayment),
}

/// Toast shown on the owner's button press for an outcome
pub fn review_toast(ctx: &HandlerContext<'_>, outcome: &ReviewOutcome) -> Option<String> {
    let key = match outcome {
        ReviewOutcome::NotOwner => "owner-only",
        ReviewOutcome::Approved(_) => "payment-approved-toast",
        ReviewOutcome::Rejected(_) => "payment-rejected-toast",
        ReviewOutcome::NotFound | ReviewOutcome::AlreadyProcessed(_) => return None,
    };
    Some(ctx.text(key, None))
}

/// Apply the owner's decision to a pending payment.
///
/// Approval arms the user's awaiting-token flag with the payment's plan and
/// asks the user for a bot token. Rejection only notifies. A payment is
/// reviewed at most once.
pub async fn review_payment(
    ctx: &HandlerContext<'_>,
    reviewer_id: i64,
    payment_id: i64,
    user_id: i64,
    decision: ReviewDecision,
) -> Result<ReviewOutcome> {
    if !ctx.is_owner(reviewer_id) {
        warn!(reviewer_id = %reviewer_id, payment_id = %payment_id, "Review attempt by non-owner");
        return Ok(ReviewOutcome::NotOwner);
    }

    let payment = match ctx.store.get_pending_payment(payment_id).await? {
        Some(payment) if payment.user_id == user_id => payment,
        _ => {
            ctx.gateway
                .send_text(
                    ctx.owner_chat,
                    &ctx.text_args(
                        "payment-not-found",
                        &[("payment_id", payment_id.to_string().into())],
                        None,
                    ),
                    None,
                )
                .await?;
            return Ok(ReviewOutcome::NotFound);
        }
    };

    if payment.status != PaymentStatus::Pending {
        return already_processed(ctx, &payment, payment.status).await;
    }

    let new_status = match decision {
        ReviewDecision::Approve => PaymentStatus::Approved,
        ReviewDecision::Reject => PaymentStatus::Rejected,
    };

    // Approval arms the awaiting-token flag in the same commit as the status change
    let resolved = match decision {
        ReviewDecision::Approve => {
            let plan = Plan {
                days: payment.plan_days,
                price: payment.plan_price,
            };
            ctx.store
                .approve_pending_payment(payment.id, payment.user_id, plan)
                .await?
        }
        ReviewDecision::Reject => {
            ctx.store
                .resolve_pending_payment(payment.id, new_status)
                .await?
        }
    };

    if !resolved {
        // Lost a race with another review of the same payment
        let current = ctx
            .store
            .get_pending_payment(payment.id)
            .await?
            .map_or(new_status, |p| p.status);
        return already_processed(ctx, &payment, current).await;
    }

    let user_chat = ChatId(payment.user_id);
    let id_arg = payment.id.to_string();

    let (user_key, owner_key) = match decision {
        ReviewDecision::Approve => {
            record_provisioning_transition(ProvisioningTransition::PaymentApproved);
            ("payment-approved-user", "owner-payment-approved")
        }
        ReviewDecision::Reject => {
            record_provisioning_transition(ProvisioningTransition::PaymentRejected);
            ("payment-rejected-user", "owner-payment-rejected")
        }
    };

    ctx.gateway
        .send_text(
            user_chat,
            &ctx.text_args(user_key, &[("payment_id", id_arg.as_str().into())], None),
            None,
        )
        .await?;
    ctx.gateway
        .send_text(
            ctx.owner_chat,
            &ctx.text_args(owner_key, &[("payment_id", id_arg.as_str().into())], None),
            None,
        )
        .await?;

    info!(
        payment_id = %payment.id,
        user_id = %payment.user_id,
        status = %new_status,
        "Payment reviewed"
    );

    let reviewed = PendingPayment {
        status: new_status,
        ..payment
    };
    Ok(match decision {
        ReviewDecision::Approve => ReviewOutcome::Approved(reviewed),
        ReviewDecision::Reject => ReviewOutcome::Rejected(reviewed),
    })
}

async fn already_processed(
    ctx: &HandlerContext<'_>,
    payment: &PendingPayment,
    status: PaymentStatus,
) -> Result<ReviewOutcome> {
    ctx.gateway
        .send_text(
            ctx.owner_chat,
            &ctx.text_args(
                "payment-already-processed",
                &[
                    ("payment_id", payment.id.to_string().into()),
                    ("status", status.as_str().into()),
                ],
                None,
            ),
            None,
        )
        .await?;
    Ok(ReviewOutcome::AlreadyProcessed(status))
}

//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html;

use super::{HandlerContext, UserProfile};
use crate::plans::{catalog, Plan};
use crate::store::{ClonedBot, PendingPayment};

/// Callback data of the user panel buttons
pub const CB_USER_SEND: &str = "user_send";
pub const CB_PAID_BATCHES: &str = "paid_batches";
pub const CB_CLONE_BOT: &str = "clone_bot";
pub const CB_MY_CLONE: &str = "my_clone";
pub const CB_USER_HELP: &str = "user_help";
pub const CB_CANCEL_PAYMENT: &str = "cancel_payment";

/// Five-button user panel shown by `/start`
pub fn create_user_panel_keyboard(
    ctx: &HandlerContext<'_>,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let rows = [
        ("button-send-msg", CB_USER_SEND),
        ("button-paid-batches", CB_PAID_BATCHES),
        ("button-clone-bot", CB_CLONE_BOT),
        ("button-my-clone", CB_MY_CLONE),
        ("button-help", CB_USER_HELP),
    ]
    .into_iter()
    .map(|(key, data)| {
        vec![InlineKeyboardButton::callback(
            ctx.text(key, language_code),
            data,
        )]
    })
    .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(rows)
}

/// Label of a plan button, e.g. "7 Days - ₹12"
pub fn format_plan_label(
    ctx: &HandlerContext<'_>,
    plan: &Plan,
    language_code: Option<&str>,
) -> String {
    ctx.text_args(
        "plan-button",
        &[
            ("days", plan.days.into()),
            ("price", plan.price.into()),
            ("currency", ctx.payment.currency_symbol.as_str().into()),
        ],
        language_code,
    )
}

/// One button per catalog plan, cheapest first
pub fn create_plans_keyboard(
    ctx: &HandlerContext<'_>,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let rows = catalog()
        .iter()
        .map(|plan| {
            vec![InlineKeyboardButton::callback(
                format_plan_label(ctx, plan, language_code),
                plan.callback_data(),
            )]
        })
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(rows)
}

pub fn create_cancel_keyboard(
    ctx: &HandlerContext<'_>,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        ctx.text("button-cancel", language_code),
        CB_CANCEL_PAYMENT,
    )]])
}

/// Callback data of the owner's approve button for a payment
pub fn approve_callback_data(payment_id: i64, user_id: i64) -> String {
    format!("approve_{}_{}", payment_id, user_id)
}

/// Callback data of the owner's reject button for a payment
pub fn reject_callback_data(payment_id: i64, user_id: i64) -> String {
    format!("reject_{}_{}", payment_id, user_id)
}

/// Approve/Reject pair on a single row
pub fn create_review_keyboard(ctx: &HandlerContext<'_>, payment: &PendingPayment) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            ctx.text("button-approve", None),
            approve_callback_data(payment.id, payment.user_id),
        ),
        InlineKeyboardButton::callback(
            ctx.text("button-reject", None),
            reject_callback_data(payment.id, payment.user_id),
        ),
    ]])
}

/// Payment instructions for a selected plan
pub fn format_payment_details(
    ctx: &HandlerContext<'_>,
    plan: &Plan,
    language_code: Option<&str>,
) -> String {
    ctx.text_args(
        "payment-details",
        &[
            ("days", plan.days.into()),
            ("price", plan.price.into()),
            ("currency", ctx.payment.currency_symbol.as_str().into()),
            ("upi_id", ctx.payment.upi_id.as_str().into()),
        ],
        language_code,
    )
}

/// HTML header preceding relayed user content in the owner chat
pub fn format_relay_header(ctx: &HandlerContext<'_>, user: &UserProfile) -> String {
    ctx.text_args(
        "relay-header",
        &[
            ("name", html::escape(&user.first_name).into()),
            ("user_id", user.id.to_string().into()),
            ("username", html::escape(user.handle()).into()),
        ],
        None,
    )
}

/// HTML caption of the screenshot forwarded to the owner for review
pub fn format_owner_payment_caption(
    ctx: &HandlerContext<'_>,
    user: &UserProfile,
    payment: &PendingPayment,
) -> String {
    ctx.text_args(
        "owner-payment",
        &[
            ("payment_id", payment.id.to_string().into()),
            ("name", html::escape(&user.first_name).into()),
            ("user_id", user.id.to_string().into()),
            ("username", html::escape(user.handle()).into()),
            ("days", payment.plan_days.into()),
            ("price", payment.plan_price.into()),
            ("currency", html::escape(&ctx.payment.currency_symbol).into()),
            ("upi_id", html::escape(&ctx.payment.upi_id).into()),
        ],
        None,
    )
}

/// Date shown in status replies
pub fn format_expiry_date(clone: &ClonedBot) -> String {
    clone.expires_at.format("%Y-%m-%d").to_string()
}

/// Date and time shown when a clone is activated
pub fn format_expiry_timestamp(clone: &ClonedBot) -> String {
    clone.expires_at.format("%Y-%m-%d %H:%M UTC").to_string()
}

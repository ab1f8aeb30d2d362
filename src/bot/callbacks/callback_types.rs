//! Typed view of inline keyboard callback data

use lazy_static::lazy_static;
use regex::Regex;

use crate::bot::ui_builder::{
    CB_CANCEL_PAYMENT, CB_CLONE_BOT, CB_MY_CLONE, CB_PAID_BATCHES, CB_USER_HELP, CB_USER_SEND,
};

lazy_static! {
    static ref PLAN_RE: Regex =
        Regex::new(r"^plan_(\d{1,9})_(\d{1,9})$").expect("Invalid plan callback regex pattern");
    static ref REVIEW_RE: Regex = Regex::new(r"^(approve|reject)_(\d{1,18})_(\d{1,18})$")
        .expect("Invalid review callback regex pattern");
}

/// Every button the bot can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    UserSend,
    PaidBatches,
    CloneBot,
    SelectPlan { days: i32, price: i32 },
    CancelPayment,
    MyClone,
    Help,
    Approve { payment_id: i64, user_id: i64 },
    Reject { payment_id: i64, user_id: i64 },
    Unknown,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        match data {
            CB_USER_SEND => return CallbackAction::UserSend,
            CB_PAID_BATCHES => return CallbackAction::PaidBatches,
            CB_CLONE_BOT => return CallbackAction::CloneBot,
            CB_CANCEL_PAYMENT => return CallbackAction::CancelPayment,
            CB_MY_CLONE => return CallbackAction::MyClone,
            CB_USER_HELP => return CallbackAction::Help,
            _ => {}
        }

        if let Some(caps) = PLAN_RE.captures(data) {
            if let (Ok(days), Ok(price)) = (caps[1].parse(), caps[2].parse()) {
                return CallbackAction::SelectPlan { days, price };
            }
        }

        if let Some(caps) = REVIEW_RE.captures(data) {
            if let (Ok(payment_id), Ok(user_id)) = (caps[2].parse(), caps[3].parse()) {
                return match &caps[1] {
                    "approve" => CallbackAction::Approve {
                        payment_id,
                        user_id,
                    },
                    _ => CallbackAction::Reject {
                        payment_id,
                        user_id,
                    },
                };
            }
        }

        CallbackAction::Unknown
    }

    /// Short label for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            CallbackAction::UserSend => "user_send",
            CallbackAction::PaidBatches => "paid_batches",
            CallbackAction::CloneBot => "clone_bot",
            CallbackAction::SelectPlan { .. } => "select_plan",
            CallbackAction::CancelPayment => "cancel_payment",
            CallbackAction::MyClone => "my_clone",
            CallbackAction::Help => "help",
            CallbackAction::Approve { .. } => "approve",
            CallbackAction::Reject { .. } => "reject",
            CallbackAction::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::catalog;

    #[test]
    fn test_panel_buttons() {
        assert_eq!(CallbackAction::parse("user_send"), CallbackAction::UserSend);
        assert_eq!(CallbackAction::parse("paid_batches"), CallbackAction::PaidBatches);
        assert_eq!(CallbackAction::parse("clone_bot"), CallbackAction::CloneBot);
        assert_eq!(CallbackAction::parse("my_clone"), CallbackAction::MyClone);
        assert_eq!(CallbackAction::parse("user_help"), CallbackAction::Help);
        assert_eq!(CallbackAction::parse("cancel_payment"), CallbackAction::CancelPayment);
    }

    #[test]
    fn test_plan_buttons_parse_back() {
        for plan in catalog() {
            assert_eq!(
                CallbackAction::parse(&plan.callback_data()),
                CallbackAction::SelectPlan {
                    days: plan.days,
                    price: plan.price
                }
            );
        }
    }

    #[test]
    fn test_review_buttons() {
        assert_eq!(
            CallbackAction::parse("approve_1_987654321"),
            CallbackAction::Approve {
                payment_id: 1,
                user_id: 987654321
            }
        );
        assert_eq!(
            CallbackAction::parse("reject_12_5"),
            CallbackAction::Reject {
                payment_id: 12,
                user_id: 5
            }
        );
    }

    #[test]
    fn test_malformed_data() {
        for data in [
            "",
            "plan_7",
            "plan_7_12_3",
            "plan_-7_12",
            "plan_x_12",
            "approve_1",
            "approve_a_b",
            "delete_1_2",
            "plan_9999999999_1",
        ] {
            assert_eq!(CallbackAction::parse(data), CallbackAction::Unknown, "{data}");
        }
    }
}

//! Per-user session state for plan selection.
//!
//! Only the pending plan selection lives here. It is ephemeral by nature: the
//! storage is in-process and a restart forgets every selection. Durable
//! provisioning state (payments, awaiting-token flags, cloned bots) lives in
//! the store.

use crate::plans::Plan;
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::ChatId;

/// Session state of a single user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionState {
    #[default]
    Idle,
    /// A plan was chosen and payment instructions were sent
    PlanSelected { plan: Plan },
}

/// Session store keyed by user id
pub type SelectionStorage = InMemStorage<SelectionState>;

/// Type alias for a single user's selection session
pub type SelectionDialogue = Dialogue<SelectionState, SelectionStorage>;

/// Open the session of `user_id`.
///
/// Sessions are keyed by the user rather than the chat so a selection made
/// through a button and the screenshot sent as a message always meet.
pub fn selection_dialogue(
    storage: std::sync::Arc<SelectionStorage>,
    user_id: i64,
) -> SelectionDialogue {
    SelectionDialogue::new(storage, ChatId(user_id))
}

/// Current pending plan of a session, if any
pub async fn pending_plan(dialogue: &SelectionDialogue) -> anyhow::Result<Option<Plan>> {
    Ok(match dialogue.get().await? {
        Some(SelectionState::PlanSelected { plan }) => Some(plan),
        _ => None,
    })
}

//! Clone-bot subscription plan catalog.
//!
//! The catalog is fixed. Plan identifiers coming back from inline buttons are
//! always re-checked against it, so a forged `plan_<days>_<price>` callback
//! cannot select an arbitrary duration/price pair.

use serde::{Deserialize, Serialize};

/// A (duration, price) pair a user can buy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plan {
    /// Validity of the clone bot in days
    pub days: i32,
    /// Price in the configured currency unit
    pub price: i32,
}

/// The fixed plan catalog, cheapest first
pub const PLANS: [Plan; 4] = [
    Plan { days: 1, price: 2 },
    Plan { days: 7, price: 12 },
    Plan { days: 15, price: 18 },
    Plan { days: 30, price: 25 },
];

impl Plan {
    /// Look a plan up by the pair carried in a selection request.
    ///
    /// Returns `None` when the pair is not an exact catalog entry.
    pub fn from_catalog(days: i32, price: i32) -> Option<Plan> {
        PLANS
            .iter()
            .copied()
            .find(|plan| plan.days == days && plan.price == price)
    }

    /// Callback data used for this plan's selection button
    pub fn callback_data(&self) -> String {
        format!("plan_{}_{}", self.days, self.price)
    }

    /// Validity as a `chrono::Duration`
    pub fn validity(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days))
    }
}

/// All plans in display order
pub fn catalog() -> &'static [Plan] {
    &PLANS
}

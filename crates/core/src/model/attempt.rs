use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::ids::{CardId, OptionId};

/// Record of a single scored submission for a card.
///
/// Attempts are append-only facts: once created they are never mutated or
/// deleted from a progress record's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub card_id: CardId,
    /// 1-based counter of attempts on this card.
    pub attempt_number: u32,
    pub selected_option: OptionId,
    pub is_correct: bool,
    pub time_spent: Duration,
    pub timestamp: DateTime<Utc>,
    pub hints_used: u32,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{CardId, OptionId};

//
// ─── CATEGORIES & DIFFICULTY ───────────────────────────────────────────────────
//

/// Course category a card belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fundamentals,
    Strategy,
    Content,
    Networking,
    Tools,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Fundamentals,
        Category::Strategy,
        Category::Content,
        Category::Networking,
        Category::Tools,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Fundamentals => "fundamentals",
            Category::Strategy => "strategy",
            Category::Content => "content",
            Category::Networking => "networking",
            Category::Tools => "tools",
        };
        write!(f, "{name}")
    }
}

/// Ordered difficulty scale: beginner < intermediate < advanced < expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    /// Numeric rank on the ordered scale, beginner = 0.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Difficulty::Beginner => 0,
            Difficulty::Intermediate => 1,
            Difficulty::Advanced => 2,
            Difficulty::Expert => 3,
        }
    }

    /// One level up, clamped at expert.
    #[must_use]
    pub fn raised(self) -> Self {
        match self {
            Difficulty::Beginner => Difficulty::Intermediate,
            Difficulty::Intermediate => Difficulty::Advanced,
            Difficulty::Advanced | Difficulty::Expert => Difficulty::Expert,
        }
    }

    /// One level down, clamped at beginner.
    #[must_use]
    pub fn lowered(self) -> Self {
        match self {
            Difficulty::Expert => Difficulty::Advanced,
            Difficulty::Advanced => Difficulty::Intermediate,
            Difficulty::Intermediate | Difficulty::Beginner => Difficulty::Beginner,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Beginner
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        };
        write!(f, "{name}")
    }
}

//
// ─── CARD TYPES ────────────────────────────────────────────────────────────────
//

/// The situation a card asks the learner to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    pub description: String,
    /// Free-form context (industry, role, urgency, ...).
    #[serde(default)]
    pub context: String,
}

/// One selectable answer. Referenced only by id when answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
    pub feedback: String,
    pub is_correct: bool,
}

/// The back of the card, shown after answering or flipping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub explanation: String,
    #[serde(default)]
    pub best_practices: Vec<String>,
    #[serde(default)]
    pub related_concepts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: String,
}

/// A multiple-choice learning card.
///
/// Immutable once loaded into a catalog, except for the metadata timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub category: Category,
    pub difficulty: Difficulty,
    pub scenario: Scenario,
    pub options: Vec<AnswerOption>,
    pub solution: Solution,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Estimated time to answer, in minutes.
    pub estimated_time: u32,
    pub points: u32,
    pub metadata: CardMetadata,
}

impl Card {
    /// Checks the structural rules a card must satisfy before it may enter
    /// a catalog.
    ///
    /// # Errors
    ///
    /// Returns `CardError` when the id is blank, the scenario title is
    /// blank, there are no options, or no option is marked correct.
    pub fn validate(&self) -> Result<(), CardError> {
        if self.id.is_empty() {
            return Err(CardError::MissingId);
        }
        if self.scenario.title.trim().is_empty() {
            return Err(CardError::MissingScenario(self.id.clone()));
        }
        if self.options.is_empty() {
            return Err(CardError::NoOptions(self.id.clone()));
        }
        if !self.options.iter().any(|option| option.is_correct) {
            return Err(CardError::NoCorrectOption(self.id.clone()));
        }
        Ok(())
    }

    /// Looks up an option by id.
    #[must_use]
    pub fn option(&self, id: &OptionId) -> Option<&AnswerOption> {
        self.options.iter().find(|option| &option.id == id)
    }

    /// Case-insensitive substring match over title, description and tags.
    #[must_use]
    pub fn matches_query(&self, query_lower: &str) -> bool {
        self.scenario.title.to_lowercase().contains(query_lower)
            || self
                .scenario
                .description
                .to_lowercase()
                .contains(query_lower)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(query_lower))
    }

    /// Bumps the updated-at metadata timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.updated_at = now;
    }
}

//
// ─── CARD VALIDATION ERRORS ────────────────────────────────────────────────────
//

/// Reasons a card fails the catalog's validation gate
/// (the "invalid card format" family).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardError {
    #[error("card is missing an id")]
    MissingId,

    #[error("card {0} is missing a scenario title")]
    MissingScenario(CardId),

    #[error("card {0} has no answer options")]
    NoOptions(CardId),

    #[error("card {0} has no correct answer option")]
    NoCorrectOption(CardId),
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use crate::model::{Card, Category, Difficulty, ProgressRecord};

//
// ─── THRESHOLDS ────────────────────────────────────────────────────────────────
//

/// Accuracy below which a category counts as weak.
pub const WEAK_ACCURACY: f64 = 0.70;

/// How many recent attempts the increase/decrease predicates look at.
pub const RECENT_WINDOW: usize = 10;

const EXPERT_ACCURACY: f64 = 0.85;
const EXPERT_MAX_AVG_SECS: f64 = 60.0;
const ADVANCED_ACCURACY: f64 = 0.75;
const ADVANCED_MAX_AVG_SECS: f64 = 90.0;
const INTERMEDIATE_ACCURACY: f64 = 0.60;
const INTERMEDIATE_MAX_AVG_SECS: f64 = 120.0;

const INCREASE_ACCURACY: f64 = 0.85;
const INCREASE_MIN_STREAK: u32 = 5;
const DECREASE_ACCURACY: f64 = 0.50;

//
// ─── ADAPTIVE DIFFICULTY ENGINE ────────────────────────────────────────────────
//

/// Stateless rules that turn a progress record into a user level, a weak
/// area list, and an adapted card subset.
///
/// Every method is a pure function of `(catalog cards, progress record)`;
/// the engine carries no state of its own.
///
/// # Examples
///
/// ```
/// # use flipcard_core::AdaptiveEngine;
/// # use flipcard_core::model::{Difficulty, ProgressRecord, SessionId, UserId};
/// # use flipcard_core::time::fixed_now;
/// let engine = AdaptiveEngine::new();
/// let fresh = ProgressRecord::new(UserId::new("u"), SessionId::generate(), fixed_now());
/// assert_eq!(engine.user_level(&fresh), Difficulty::Beginner);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveEngine;

impl AdaptiveEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Derives the user's level from the category aggregates.
    ///
    /// Averages accuracy and average time across every category with at
    /// least one attempt, then applies the ordered thresholds (first match
    /// wins): 85%/60s → expert, 75%/90s → advanced, 60%/120s →
    /// intermediate, otherwise beginner. With no attempted categories the
    /// level is beginner.
    #[must_use]
    pub fn user_level(&self, progress: &ProgressRecord) -> Difficulty {
        let attempted: Vec<_> = progress
            .category_stats
            .values()
            .filter(|stats| stats.total > 0)
            .collect();

        if attempted.is_empty() {
            return Difficulty::Beginner;
        }

        let count = attempted.len() as f64;
        let avg_accuracy = attempted.iter().map(|s| s.accuracy).sum::<f64>() / count;
        let avg_time = attempted.iter().map(|s| s.average_time).sum::<f64>() / count;

        if avg_accuracy >= EXPERT_ACCURACY && avg_time <= EXPERT_MAX_AVG_SECS {
            Difficulty::Expert
        } else if avg_accuracy >= ADVANCED_ACCURACY && avg_time <= ADVANCED_MAX_AVG_SECS {
            Difficulty::Advanced
        } else if avg_accuracy >= INTERMEDIATE_ACCURACY && avg_time <= INTERMEDIATE_MAX_AVG_SECS {
            Difficulty::Intermediate
        } else {
            Difficulty::Beginner
        }
    }

    /// Categories with at least one attempt and accuracy below 70%.
    ///
    /// Never-attempted categories are neither weak nor strong.
    #[must_use]
    pub fn weak_categories(&self, progress: &ProgressRecord) -> Vec<Category> {
        progress
            .category_stats
            .iter()
            .filter(|(_, stats)| stats.total > 0 && stats.accuracy < WEAK_ACCURACY)
            .map(|(category, _)| *category)
            .collect()
    }

    /// True iff the card sits at the user's level or exactly one level
    /// above. Cards below the user's level are never appropriate.
    #[must_use]
    pub fn is_level_appropriate(&self, card_level: Difficulty, user_level: Difficulty) -> bool {
        card_level.rank() >= user_level.rank() && card_level.rank() <= user_level.rank() + 1
    }

    /// The catalog subset worth offering next: level-appropriate cards,
    /// restricted to weak categories whenever any exist.
    #[must_use]
    pub fn adapt_cards<'a, I>(&self, cards: I, progress: &ProgressRecord) -> Vec<&'a Card>
    where
        I: IntoIterator<Item = &'a Card>,
    {
        let user_level = self.user_level(progress);
        let weak = self.weak_categories(progress);

        cards
            .into_iter()
            .filter(|card| {
                self.is_level_appropriate(card.difficulty, user_level)
                    && (weak.is_empty() || weak.contains(&card.category))
            })
            .collect()
    }

    /// Accuracy over the `n` most recent attempts across the session,
    /// 0 when there are none.
    #[must_use]
    pub fn recent_accuracy(&self, progress: &ProgressRecord, n: usize) -> f64 {
        let recent = progress.recent_attempts(n);
        if recent.is_empty() {
            return 0.0;
        }
        let correct = recent.iter().filter(|attempt| attempt.is_correct).count();
        correct as f64 / recent.len() as f64
    }

    /// The learner is cruising: not yet expert, recent accuracy at or above
    /// 85%, and a streak of at least five.
    #[must_use]
    pub fn should_increase_difficulty(&self, progress: &ProgressRecord) -> bool {
        self.user_level(progress) != Difficulty::Expert
            && self.recent_accuracy(progress, RECENT_WINDOW) >= INCREASE_ACCURACY
            && progress.current_streak >= INCREASE_MIN_STREAK
    }

    /// The learner is struggling: recent accuracy under 50% and no active
    /// streak.
    #[must_use]
    pub fn should_decrease_difficulty(&self, progress: &ProgressRecord) -> bool {
        self.recent_accuracy(progress, RECENT_WINDOW) < DECREASE_ACCURACY
            && progress.current_streak == 0
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

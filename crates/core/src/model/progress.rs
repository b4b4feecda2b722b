use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::model::attempt::Attempt;
use crate::model::card::{AnswerOption, Card, Category, Difficulty};
use crate::model::ids::{CardId, SessionId, UserId};

//
// ─── CATEGORY STATS ────────────────────────────────────────────────────────────
//

/// Incrementally maintained accuracy/average-time aggregate for one category.
///
/// `accuracy` is always `completed / total` and is recomputed on every
/// update rather than stored independently. `average_time` is an
/// incremental moving average in seconds; no raw time history is retained,
/// so it accumulates floating rounding over very long sessions. Accepted
/// tradeoff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub completed: u32,
    pub total: u32,
    pub accuracy: f64,
    /// Moving average of time spent per attempt, in seconds.
    pub average_time: f64,
}

impl CategoryStats {
    /// Folds one attempt into the aggregate.
    pub fn record(&mut self, is_correct: bool, time_spent_secs: f64) {
        if is_correct {
            self.completed += 1;
        }
        self.total += 1;
        self.accuracy = f64::from(self.completed) / f64::from(self.total);
        self.average_time =
            (self.average_time * f64::from(self.total - 1) + time_spent_secs) / f64::from(self.total);
    }
}

//
// ─── ACHIEVEMENTS ──────────────────────────────────────────────────────────────
//

/// An unlocked achievement. The rules that unlock these live outside the
/// core; see the services crate's achievement hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub unlocked_at: DateTime<Utc>,
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// The mutable per-session aggregate of attempts, streaks, category stats,
/// bookmarks and mastery.
///
/// Exactly one instance exists per session. All counters are mutated only
/// through [`ProgressRecord::record_attempt`] (plus the explicit bookmark /
/// mastery / reset operations), which keeps the derived aggregates and the
/// attempt history from ever diverging.
///
/// Collections use BTree maps/sets so iteration order is deterministic and
/// exported JSON is stable and human-diffable. Collection fields carry
/// `#[serde(default)]`: restoring an older export with missing collections
/// yields empty ones, and unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub total_time_spent: Duration,
    #[serde(default)]
    pub completed_items: BTreeSet<CardId>,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub total_attempts: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    #[serde(default)]
    pub attempts: BTreeMap<CardId, Vec<Attempt>>,
    #[serde(default)]
    pub bookmarked_cards: BTreeSet<CardId>,
    #[serde(default)]
    pub mastered_cards: BTreeSet<CardId>,
    #[serde(default)]
    pub current_difficulty: Difficulty,
    #[serde(default)]
    pub category_stats: BTreeMap<Category, CategoryStats>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl ProgressRecord {
    /// Creates a fresh record: all counters zero, all collections empty.
    #[must_use]
    pub fn new(user_id: UserId, session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            session_id,
            start_time: now,
            last_activity: now,
            total_time_spent: Duration::ZERO,
            completed_items: BTreeSet::new(),
            correct_answers: 0,
            total_attempts: 0,
            current_streak: 0,
            best_streak: 0,
            attempts: BTreeMap::new(),
            bookmarked_cards: BTreeSet::new(),
            mastered_cards: BTreeSet::new(),
            current_difficulty: Difficulty::Beginner,
            category_stats: BTreeMap::new(),
            achievements: Vec::new(),
        }
    }

    /// Applies one answer event, maintaining every derived aggregate
    /// incrementally. The returned attempt is the one appended to the
    /// per-card history.
    ///
    /// This is the only code path that mutates the counters.
    pub fn record_attempt(
        &mut self,
        card: &Card,
        option: &AnswerOption,
        time_spent: Duration,
        hints_used: u32,
        now: DateTime<Utc>,
    ) -> Attempt {
        let history = self.attempts.entry(card.id.clone()).or_default();
        let attempt = Attempt {
            card_id: card.id.clone(),
            attempt_number: u32::try_from(history.len()).unwrap_or(u32::MAX).saturating_add(1),
            selected_option: option.id.clone(),
            is_correct: option.is_correct,
            time_spent,
            timestamp: now,
            hints_used,
        };
        history.push(attempt.clone());

        self.total_attempts += 1;
        if attempt.is_correct {
            self.correct_answers += 1;
            self.current_streak += 1;
            self.best_streak = self.best_streak.max(self.current_streak);
            self.completed_items.insert(card.id.clone());
        } else {
            self.current_streak = 0;
        }

        self.category_stats
            .entry(card.category)
            .or_default()
            .record(attempt.is_correct, time_spent.as_secs_f64());

        self.last_activity = now;
        self.total_time_spent += time_spent;

        attempt
    }

    /// Attempt history for one card, oldest first.
    #[must_use]
    pub fn attempts_for(&self, card_id: &CardId) -> &[Attempt] {
        self.attempts
            .get(card_id)
            .map_or(&[], |history| history.as_slice())
    }

    /// The `n` most recent attempts across the whole session, newest first.
    ///
    /// Ties on equal timestamps are broken by card id and per-card insertion
    /// order, which is deterministic because the history map is ordered.
    #[must_use]
    pub fn recent_attempts(&self, n: usize) -> Vec<&Attempt> {
        let mut all: Vec<&Attempt> = self.attempts.values().flatten().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(n);
        all
    }

    /// Overall accuracy across every attempt, 0 when none exist.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            f64::from(self.correct_answers) / f64::from(self.total_attempts)
        }
    }

    /// Mean time spent per attempt in seconds, 0 when none exist.
    #[must_use]
    pub fn average_time_per_attempt(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.total_time_spent.as_secs_f64() / f64::from(self.total_attempts)
        }
    }

    #[must_use]
    pub fn is_completed(&self, card_id: &CardId) -> bool {
        self.completed_items.contains(card_id)
    }

    #[must_use]
    pub fn is_bookmarked(&self, card_id: &CardId) -> bool {
        self.bookmarked_cards.contains(card_id)
    }

    /// Adds or removes a bookmark. Idempotent; returns whether the set
    /// changed.
    pub fn set_bookmarked(&mut self, card_id: &CardId, bookmarked: bool) -> bool {
        if bookmarked {
            self.bookmarked_cards.insert(card_id.clone())
        } else {
            self.bookmarked_cards.remove(card_id)
        }
    }

    /// Marks or unmarks a card as mastered. The policy for when mastery
    /// occurs is the caller's, not the core's.
    pub fn set_mastered(&mut self, card_id: &CardId, mastered: bool) -> bool {
        if mastered {
            self.mastered_cards.insert(card_id.clone())
        } else {
            self.mastered_cards.remove(card_id)
        }
    }

    /// Appends an achievement unless one with the same id is already
    /// unlocked.
    pub fn push_achievement(&mut self, achievement: Achievement) -> bool {
        if self.achievements.iter().any(|a| a.id == achievement.id) {
            return false;
        }
        self.achievements.push(achievement);
        true
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use flipcard_core::model::{
    Achievement, Card, CardId, Category, CategoryStats, EngineConfig, OptionId, ProgressRecord,
    SessionId, UserId,
};
use flipcard_core::{AdaptiveEngine, CardCatalog, CardFilter, Clock};
use storage::{ProgressStore, StorageError};

use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus, EventListener, FlipDirection};
use crate::recommend::RecommendationService;

/// Version stamped into export envelopes.
pub const ENGINE_VERSION: &str = "2.0.0";

const PROGRESS_KEY: &str = "flipcard:progress";
const CARDS_KEY: &str = "flipcard:cards";
const GENERIC_HINT: &str = "Consider the context and best practices for this scenario.";

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Session lifecycle. Created engines must be initialized before use;
/// destroyed engines only allow exporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initialized,
    Active,
    Destroyed,
}

//
// ─── EXPORT ENVELOPE ───────────────────────────────────────────────────────────
//

/// Wire format for progress export/import: textual, human-diffable JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressExport {
    pub progress: ProgressRecord,
    pub exported_at: DateTime<Utc>,
    pub version: String,
}

//
// ─── ACHIEVEMENTS ──────────────────────────────────────────────────────────────
//

/// Extension point for achievement unlocking.
///
/// Rules are checked after every recorded attempt; a returned achievement
/// is appended to the record unless one with the same id already exists.
/// The engine ships no built-in rules.
pub trait AchievementRule: Send {
    fn check(&self, progress: &ProgressRecord) -> Option<Achievement>;
}

//
// ─── STATS ─────────────────────────────────────────────────────────────────────
//

/// Point-in-time summary of catalog and progress, for UI surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStats {
    pub total_cards: usize,
    pub completed_cards: usize,
    pub accuracy: f64,
    /// Mean seconds per attempt across the whole session.
    pub average_time_per_card: f64,
    pub total_time_spent: Duration,
    pub current_streak: u32,
    pub best_streak: u32,
    pub category_breakdown: BTreeMap<Category, CategoryStats>,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// The session orchestrator: sequences the card lifecycle, owns the
/// progress record, and is the only component that talks to the
/// persistence collaborator.
///
/// One engine is one logical session. Methods take `&mut self`, so there is
/// never a concurrent mutator; the only suspension points are the awaits
/// into the [`ProgressStore`]. Callers must not start a second mutating
/// call before a prior one's persistence completed — the engine does not
/// queue requests itself.
///
/// On `answer`, persistence happens *before* the answered event and before
/// the correctness boolean is returned. A storage failure surfaces as an
/// error, but the already-applied in-memory mutation is kept: memory stays
/// authoritative and ahead of the store until the caller retries.
pub struct FlipCardEngine {
    config: EngineConfig,
    clock: Clock,
    store: Arc<dyn ProgressStore>,
    catalog: CardCatalog,
    progress: ProgressRecord,
    current_card: Option<CardId>,
    hints_used: BTreeMap<CardId, u32>,
    state: SessionState,
    events: EventBus,
    achievement_rules: Vec<Box<dyn AchievementRule>>,
    adaptive: AdaptiveEngine,
    recommender: RecommendationService,
}

impl FlipCardEngine {
    #[must_use]
    pub fn new(user_id: UserId, config: EngineConfig, store: Arc<dyn ProgressStore>) -> Self {
        let clock = Clock::default();
        let progress = ProgressRecord::new(user_id, SessionId::generate(), clock.now());
        Self {
            config,
            clock,
            store,
            catalog: CardCatalog::new(),
            progress,
            current_card: None,
            hints_used: BTreeMap::new(),
            state: SessionState::Created,
            events: EventBus::new(),
            achievement_rules: Vec::new(),
            adaptive: AdaptiveEngine::new(),
            recommender: RecommendationService::new(),
        }
    }

    /// Replaces the clock, e.g. with a fixed one in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.progress.start_time = clock.now();
        self.progress.last_activity = clock.now();
        self
    }

    /// Registers an event listener. Listeners are invoked synchronously in
    /// registration order.
    pub fn on_event(&mut self, listener: EventListener) {
        self.events.subscribe(listener);
    }

    /// Registers an achievement rule, checked after every attempt.
    pub fn add_achievement_rule(&mut self, rule: Box<dyn AchievementRule>) {
        self.achievement_rules.push(rule);
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────
    //

    /// Restores persisted progress and cards when present, else keeps the
    /// freshly seeded record, then announces the session. No-op when
    /// already initialized.
    ///
    /// # Errors
    ///
    /// `SessionClosed` after destruction, `InvalidProgressFormat` when a
    /// persisted snapshot cannot be parsed, `StorageError` when the store
    /// fails.
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        match self.state {
            SessionState::Destroyed => return Err(EngineError::SessionClosed),
            SessionState::Initialized | SessionState::Active => return Ok(()),
            SessionState::Created => {}
        }

        if let Some(raw) = self.store.load(PROGRESS_KEY).await? {
            self.progress = serde_json::from_str(&raw)
                .map_err(|e| EngineError::InvalidProgressFormat(e.to_string()))?;
            info!("progress restored for session {}", self.progress.session_id);
        }

        if let Some(raw) = self.store.load(CARDS_KEY).await? {
            let cards: Vec<Card> = serde_json::from_str(&raw)
                .map_err(|e| EngineError::InvalidProgressFormat(e.to_string()))?;
            self.insert_cards(cards)?;
            info!("{} cards restored", self.catalog.len());
        }

        self.state = SessionState::Initialized;
        self.events.emit(&EngineEvent::SessionStarted {
            session_id: self.progress.session_id,
            timestamp: self.clock.now(),
        });
        Ok(())
    }

    /// Drops the in-memory catalog and current card. The store is left
    /// untouched, and the record can still be exported.
    pub fn destroy(&mut self) {
        self.catalog.clear();
        self.current_card = None;
        self.hints_used.clear();
        self.state = SessionState::Destroyed;
    }

    fn ensure_ready(&self) -> Result<(), EngineError> {
        match self.state {
            SessionState::Created => Err(EngineError::NotInitialized),
            SessionState::Destroyed => Err(EngineError::SessionClosed),
            SessionState::Initialized | SessionState::Active => Ok(()),
        }
    }

    //
    // ─── CARD MANAGEMENT ───────────────────────────────────────────────────
    //

    /// Validates and upserts a batch of cards, announcing each accepted
    /// card and persisting the catalog afterwards.
    ///
    /// Validation is per item: the first invalid card aborts the call, but
    /// cards accepted earlier in the same batch stay in the catalog.
    ///
    /// # Errors
    ///
    /// `InvalidCard` for the first card failing validation, `StorageError`
    /// when persisting the accepted set fails.
    pub async fn load_cards(&mut self, cards: Vec<Card>) -> Result<(), EngineError> {
        self.ensure_ready()?;
        let count = cards.len();
        self.insert_cards(cards)?;
        debug!("loaded {count} cards, catalog size {}", self.catalog.len());
        self.persist_cards().await
    }

    fn insert_cards(&mut self, cards: Vec<Card>) -> Result<(), EngineError> {
        for card in cards {
            self.catalog.insert(card.clone())?;
            self.events.emit(&EngineEvent::CardLoaded { card });
        }
        Ok(())
    }

    /// Makes `card_id` the current card and announces the start. The first
    /// successful start activates the session.
    ///
    /// # Errors
    ///
    /// `CardNotFound` when the catalog does not know the id.
    pub fn start(&mut self, card_id: &CardId) -> Result<(), EngineError> {
        self.ensure_ready()?;
        if !self.catalog.contains(card_id) {
            return Err(EngineError::CardNotFound(card_id.clone()));
        }

        self.current_card = Some(card_id.clone());
        self.hints_used.insert(card_id.clone(), 0);
        self.state = SessionState::Active;
        self.events.emit(&EngineEvent::CardStarted {
            card_id: card_id.clone(),
            timestamp: self.clock.now(),
        });
        Ok(())
    }

    /// Scores one answer: records the attempt, adjusts difficulty, runs
    /// achievement rules, persists, then emits `card:answered` and returns
    /// the correctness flag.
    ///
    /// `time_spent` comes from the caller's timing context; the engine does
    /// not measure it.
    ///
    /// # Errors
    ///
    /// `CardNotFound` / `OptionNotFound` for stale ids; `StorageError` when
    /// persistence fails (the in-memory record keeps the mutation).
    pub async fn answer(
        &mut self,
        card_id: &CardId,
        option_id: &OptionId,
        time_spent: Duration,
    ) -> Result<bool, EngineError> {
        self.ensure_ready()?;
        let card = self
            .catalog
            .get(card_id)
            .ok_or_else(|| EngineError::CardNotFound(card_id.clone()))?;
        let option = card
            .option(option_id)
            .ok_or_else(|| EngineError::OptionNotFound {
                card: card_id.clone(),
                option: option_id.clone(),
            })?;

        let hints = self.hints_used.get(card_id).copied().unwrap_or(0);
        let now = self.clock.now();
        let attempt = self
            .progress
            .record_attempt(card, option, time_spent, hints, now);

        if self.adaptive.should_increase_difficulty(&self.progress) {
            self.progress.current_difficulty = self.progress.current_difficulty.raised();
            debug!("difficulty raised to {}", self.progress.current_difficulty);
        } else if self.adaptive.should_decrease_difficulty(&self.progress) {
            self.progress.current_difficulty = self.progress.current_difficulty.lowered();
            debug!("difficulty lowered to {}", self.progress.current_difficulty);
        }

        for rule in &self.achievement_rules {
            if let Some(achievement) = rule.check(&self.progress) {
                self.progress.push_achievement(achievement);
            }
        }

        self.persist_progress().await?;

        let is_correct = attempt.is_correct;
        self.events.emit(&EngineEvent::CardAnswered {
            card_id: card_id.clone(),
            attempt,
            is_correct,
        });
        Ok(is_correct)
    }

    /// Announces a flip of the card.
    ///
    /// # Errors
    ///
    /// `CardNotFound` when the catalog does not know the id.
    pub fn flip(&mut self, card_id: &CardId, direction: FlipDirection) -> Result<(), EngineError> {
        self.ensure_ready()?;
        if !self.catalog.contains(card_id) {
            return Err(EngineError::CardNotFound(card_id.clone()));
        }
        self.events.emit(&EngineEvent::CardFlipped {
            card_id: card_id.clone(),
            direction,
        });
        Ok(())
    }

    /// Hands out the next hint for a card: the nth best practice from its
    /// solution, or a generic nudge once those run out. Returns `None` when
    /// hints are disabled.
    ///
    /// # Errors
    ///
    /// `CardNotFound` when the catalog does not know the id.
    pub fn request_hint(&mut self, card_id: &CardId) -> Result<Option<String>, EngineError> {
        self.ensure_ready()?;
        let card = self
            .catalog
            .get(card_id)
            .ok_or_else(|| EngineError::CardNotFound(card_id.clone()))?;
        if !self.config.show_hints {
            return Ok(None);
        }

        let hint = card
            .solution
            .best_practices
            .get(self.hints_used.get(card_id).copied().unwrap_or(0) as usize)
            .cloned()
            .unwrap_or_else(|| GENERIC_HINT.to_string());

        let counter = self.hints_used.entry(card_id.clone()).or_insert(0);
        *counter += 1;
        let hint_number = *counter;

        self.events.emit(&EngineEvent::HintRequested {
            card_id: card_id.clone(),
            hint_number,
        });
        Ok(Some(hint))
    }

    //
    // ─── PROGRESS MANAGEMENT ───────────────────────────────────────────────
    //

    /// Adds or removes a bookmark, persists, and announces the change.
    /// Idempotent; a no-op when bookmarks are disabled. Unknown ids are
    /// allowed — bookmarks may refer to cards from an earlier catalog load.
    ///
    /// # Errors
    ///
    /// `StorageError` when persistence fails.
    pub async fn bookmark(&mut self, card_id: &CardId, bookmarked: bool) -> Result<(), EngineError> {
        self.ensure_ready()?;
        if !self.config.enable_bookmarks {
            return Ok(());
        }
        self.progress.set_bookmarked(card_id, bookmarked);
        self.persist_progress().await?;
        self.events.emit(&EngineEvent::CardBookmarked {
            card_id: card_id.clone(),
            bookmarked,
        });
        Ok(())
    }

    /// Marks or unmarks a card as mastered and persists. When mastery
    /// happens is the caller's policy; the engine only keeps the set.
    ///
    /// # Errors
    ///
    /// `StorageError` when persistence fails.
    pub async fn set_mastered(&mut self, card_id: &CardId, mastered: bool) -> Result<(), EngineError> {
        self.ensure_ready()?;
        self.progress.set_mastered(card_id, mastered);
        self.persist_progress().await
    }

    /// Replaces the record with a fresh one for the same user and session,
    /// persists, and signals the change.
    ///
    /// # Errors
    ///
    /// `StorageError` when persistence fails.
    pub async fn reset_progress(&mut self) -> Result<(), EngineError> {
        self.ensure_ready()?;
        self.progress = ProgressRecord::new(
            self.progress.user_id.clone(),
            self.progress.session_id,
            self.clock.now(),
        );
        self.persist_progress().await?;
        self.events.emit(&EngineEvent::ProgressChanged);
        Ok(())
    }

    /// Serializes the whole record into the export envelope. Available in
    /// every state, including after destruction.
    ///
    /// # Errors
    ///
    /// `StorageError::Serialization` if the record cannot be encoded.
    pub fn export_progress(&self) -> Result<String, EngineError> {
        let envelope = ProgressExport {
            progress: self.progress.clone(),
            exported_at: self.clock.now(),
            version: ENGINE_VERSION.to_string(),
        };
        let payload = serde_json::to_string_pretty(&envelope)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(payload)
    }

    /// Parses an export envelope and replaces the live record with it,
    /// then persists. A malformed payload aborts the import and leaves the
    /// live record untouched.
    ///
    /// # Errors
    ///
    /// `InvalidProgressFormat` on malformed payloads, `StorageError` when
    /// persistence fails.
    pub async fn import_progress(&mut self, payload: &str) -> Result<(), EngineError> {
        self.ensure_ready()?;
        let envelope: ProgressExport = serde_json::from_str(payload)
            .map_err(|e| EngineError::InvalidProgressFormat(e.to_string()))?;

        self.progress = envelope.progress;
        self.persist_progress().await?;
        self.events.emit(&EngineEvent::ProgressChanged);
        Ok(())
    }

    //
    // ─── READ SURFACE ──────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressRecord {
        &self.progress
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &CardCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        self.current_card
            .as_ref()
            .and_then(|id| self.catalog.get(id))
    }

    /// Level-appropriate, weak-area-weighted cards, randomly sampled down
    /// to `count` (deterministic order when shuffling is disabled).
    #[must_use]
    pub fn recommended_cards(&self, count: usize) -> Vec<&Card> {
        if self.config.shuffle_cards {
            self.recommender
                .recommend(self.catalog.all(), &self.progress, count)
        } else {
            let mut adapted = self.adaptive.adapt_cards(self.catalog.all(), &self.progress);
            adapted.truncate(count);
            adapted
        }
    }

    #[must_use]
    pub fn search_cards(&self, query: &str) -> Vec<&Card> {
        self.catalog.search(query)
    }

    #[must_use]
    pub fn filter_cards(&self, filter: &CardFilter) -> Vec<&Card> {
        self.catalog.filter(filter, &self.progress)
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            total_cards: self.catalog.len(),
            completed_cards: self.progress.completed_items.len(),
            accuracy: self.progress.accuracy(),
            average_time_per_card: self.progress.average_time_per_attempt(),
            total_time_spent: self.progress.total_time_spent,
            current_streak: self.progress.current_streak,
            best_streak: self.progress.best_streak,
            category_breakdown: self.progress.category_stats.clone(),
        }
    }

    //
    // ─── PERSISTENCE ───────────────────────────────────────────────────────
    //

    async fn persist_progress(&self) -> Result<(), EngineError> {
        if !self.config.auto_save {
            return Ok(());
        }
        let payload = serde_json::to_string_pretty(&self.progress)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.save(PROGRESS_KEY, &payload).await?;
        Ok(())
    }

    async fn persist_cards(&self) -> Result<(), EngineError> {
        if !self.config.auto_save {
            return Ok(());
        }
        let cards: Vec<&Card> = self.catalog.all().collect();
        let payload = serde_json::to_string_pretty(&cards)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.save(CARDS_KEY, &payload).await?;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flipcard_core::model::{AnswerOption, CardMetadata, Difficulty, Scenario, Solution};
    use flipcard_core::time::fixed_now;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use storage::InMemoryStore;

    fn build_card(id: &str, category: Category) -> Card {
        let now = fixed_now();
        Card {
            id: CardId::new(id),
            category,
            difficulty: Difficulty::Beginner,
            scenario: Scenario {
                title: format!("Scenario {id}"),
                description: "What is your first move?".into(),
                context: String::new(),
            },
            options: vec![
                AnswerOption {
                    id: OptionId::new("a"),
                    text: "Wrong".into(),
                    feedback: "Not quite.".into(),
                    is_correct: false,
                },
                AnswerOption {
                    id: OptionId::new("b"),
                    text: "Right".into(),
                    feedback: "Correct.".into(),
                    is_correct: true,
                },
            ],
            solution: Solution {
                explanation: "B wins.".into(),
                best_practices: vec!["Check the headline first".into()],
                related_concepts: Vec::new(),
            },
            tags: BTreeSet::from(["demo".to_string()]),
            estimated_time: 3,
            points: 10,
            metadata: CardMetadata {
                created_at: now,
                updated_at: now,
                version: "2.0.0".into(),
            },
        }
    }

    async fn ready_engine(store: Arc<dyn ProgressStore>) -> FlipCardEngine {
        let mut engine = FlipCardEngine::new(UserId::new("u1"), EngineConfig::default(), store)
            .with_clock(Clock::fixed(fixed_now()));
        engine.initialize().await.unwrap();
        engine
            .load_cards(vec![
                build_card("c1", Category::Fundamentals),
                build_card("c2", Category::Strategy),
            ])
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let mut engine = FlipCardEngine::new(
            UserId::new("u1"),
            EngineConfig::default(),
            Arc::new(InMemoryStore::new()),
        );
        let err = engine.start(&CardId::new("c1")).unwrap_err();
        assert!(matches!(err, EngineError::NotInitialized));
    }

    #[tokio::test]
    async fn start_activates_session_and_sets_current_card() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        assert_eq!(engine.state(), SessionState::Initialized);

        engine.start(&CardId::new("c1")).unwrap();
        assert_eq!(engine.state(), SessionState::Active);
        assert_eq!(engine.current_card().unwrap().id, CardId::new("c1"));

        let err = engine.start(&CardId::new("nope")).unwrap_err();
        assert!(matches!(err, EngineError::CardNotFound(_)));
    }

    #[tokio::test]
    async fn answer_scores_persists_and_emits() {
        let store = Arc::new(InMemoryStore::new());
        let mut engine = ready_engine(store.clone()).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            engine.on_event(Box::new(move |event| {
                if let EngineEvent::CardAnswered { is_correct, .. } = event {
                    seen.lock().unwrap().push(*is_correct);
                }
            }));
        }

        engine.start(&CardId::new("c1")).unwrap();
        let correct = engine
            .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(45))
            .await
            .unwrap();
        assert!(correct);
        assert_eq!(*seen.lock().unwrap(), vec![true]);

        // The persisted snapshot already contains the attempt.
        let raw = store.load("flipcard:progress").await.unwrap().unwrap();
        let persisted: ProgressRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.total_attempts, 1);
        assert_eq!(persisted.correct_answers, 1);

        let wrong = engine
            .answer(&CardId::new("c1"), &OptionId::new("a"), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(!wrong);
        assert_eq!(engine.progress().current_streak, 0);
        assert_eq!(engine.progress().best_streak, 1);
    }

    #[tokio::test]
    async fn answer_rejects_stale_ids() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;

        let err = engine
            .answer(&CardId::new("ghost"), &OptionId::new("b"), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CardNotFound(_)));

        let err = engine
            .answer(&CardId::new("c1"), &OptionId::new("z"), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::OptionNotFound { .. }));
        assert_eq!(engine.progress().total_attempts, 0);
    }

    struct FailingStore;

    #[async_trait]
    impl ProgressStore for FailingStore {
        async fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        async fn save(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Connection("backend down".into()))
        }
    }

    #[tokio::test]
    async fn persistence_failure_keeps_in_memory_mutation() {
        let mut engine = FlipCardEngine::new(
            UserId::new("u1"),
            EngineConfig::default(),
            Arc::new(FailingStore),
        )
        .with_clock(Clock::fixed(fixed_now()));
        engine.initialize().await.unwrap();
        let err = engine.load_cards(vec![build_card("c1", Category::Tools)]).await;
        assert!(matches!(err, Err(EngineError::Storage(_))));
        // The card still made it into the catalog before the save failed.
        assert_eq!(engine.catalog().len(), 1);

        let err = engine
            .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
        // Memory is ahead of the store, not rolled back.
        assert_eq!(engine.progress().total_attempts, 1);
        assert_eq!(engine.progress().correct_answers, 1);
    }

    #[tokio::test]
    async fn export_import_roundtrips_counters_and_stats() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        engine
            .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(40))
            .await
            .unwrap();
        engine
            .answer(&CardId::new("c2"), &OptionId::new("a"), Duration::from_secs(80))
            .await
            .unwrap();
        let exported = engine.export_progress().unwrap();

        let mut other = ready_engine(Arc::new(InMemoryStore::new())).await;
        other.import_progress(&exported).await.unwrap();

        assert_eq!(other.progress().total_attempts, 2);
        assert_eq!(other.progress().correct_answers, 1);
        assert_eq!(other.progress().current_streak, 0);
        assert_eq!(other.progress().category_stats, engine.progress().category_stats);
    }

    #[tokio::test]
    async fn malformed_import_leaves_live_record_untouched() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        engine
            .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(40))
            .await
            .unwrap();

        let err = engine.import_progress("{not json").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidProgressFormat(_)));
        assert_eq!(engine.progress().total_attempts, 1);
    }

    #[tokio::test]
    async fn bookmark_is_idempotent_and_emits() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        let seen = Arc::new(Mutex::new(0_u32));
        {
            let seen = Arc::clone(&seen);
            engine.on_event(Box::new(move |event| {
                if matches!(event, EngineEvent::CardBookmarked { .. }) {
                    *seen.lock().unwrap() += 1;
                }
            }));
        }

        let id = CardId::new("c1");
        engine.bookmark(&id, true).await.unwrap();
        engine.bookmark(&id, true).await.unwrap();
        assert!(engine.progress().is_bookmarked(&id));
        assert_eq!(*seen.lock().unwrap(), 2);

        engine.bookmark(&id, false).await.unwrap();
        assert!(!engine.progress().is_bookmarked(&id));
    }

    #[tokio::test]
    async fn reset_keeps_user_and_session_identity() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        let session_id = engine.progress().session_id;
        engine
            .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(40))
            .await
            .unwrap();

        engine.reset_progress().await.unwrap();
        assert_eq!(engine.progress().total_attempts, 0);
        assert_eq!(engine.progress().session_id, session_id);
        assert_eq!(engine.progress().user_id, UserId::new("u1"));
    }

    #[tokio::test]
    async fn hints_count_up_and_feed_the_next_attempt() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        let id = CardId::new("c1");
        engine.start(&id).unwrap();

        let first = engine.request_hint(&id).unwrap().unwrap();
        assert_eq!(first, "Check the headline first");
        let second = engine.request_hint(&id).unwrap().unwrap();
        assert_eq!(second, GENERIC_HINT);

        engine
            .answer(&id, &OptionId::new("b"), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(engine.progress().attempts_for(&id)[0].hints_used, 2);

        // Restarting the card resets the counter.
        engine.start(&id).unwrap();
        engine
            .answer(&id, &OptionId::new("b"), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(engine.progress().attempts_for(&id)[1].hints_used, 0);
    }

    #[tokio::test]
    async fn hints_disabled_by_config() {
        let store: Arc<dyn ProgressStore> = Arc::new(InMemoryStore::new());
        let config = EngineConfig {
            show_hints: false,
            ..EngineConfig::default()
        };
        let mut engine = FlipCardEngine::new(UserId::new("u1"), config, store)
            .with_clock(Clock::fixed(fixed_now()));
        engine.initialize().await.unwrap();
        engine
            .load_cards(vec![build_card("c1", Category::Fundamentals)])
            .await
            .unwrap();

        assert_eq!(engine.request_hint(&CardId::new("c1")).unwrap(), None);
    }

    #[tokio::test]
    async fn flip_emits_direction_and_rejects_unknown_cards() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            engine.on_event(Box::new(move |event| {
                if let EngineEvent::CardFlipped { direction, .. } = event {
                    seen.lock().unwrap().push(*direction);
                }
            }));
        }

        let id = CardId::new("c1");
        engine.flip(&id, FlipDirection::ToBack).unwrap();
        engine.flip(&id, FlipDirection::ToFront).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![FlipDirection::ToBack, FlipDirection::ToFront]
        );

        let err = engine.flip(&CardId::new("ghost"), FlipDirection::ToBack).unwrap_err();
        assert!(matches!(err, EngineError::CardNotFound(_)));
    }

    #[tokio::test]
    async fn destroy_clears_catalog_but_export_survives() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        engine
            .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(30))
            .await
            .unwrap();

        engine.destroy();
        assert_eq!(engine.state(), SessionState::Destroyed);
        assert!(engine.catalog().is_empty());
        assert!(engine.current_card().is_none());

        let err = engine.start(&CardId::new("c1")).unwrap_err();
        assert!(matches!(err, EngineError::SessionClosed));

        let exported = engine.export_progress().unwrap();
        let envelope: ProgressExport = serde_json::from_str(&exported).unwrap();
        assert_eq!(envelope.progress.total_attempts, 1);
        assert_eq!(envelope.version, ENGINE_VERSION);
    }

    #[tokio::test]
    async fn sustained_success_raises_current_difficulty() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        assert_eq!(engine.progress().current_difficulty, Difficulty::Beginner);

        // Five slow-but-correct answers: streak 5, recent accuracy 1.0,
        // level stays below expert, so the difficulty steps up once.
        for _ in 0..5 {
            engine
                .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(100))
                .await
                .unwrap();
        }
        assert_eq!(engine.progress().current_difficulty, Difficulty::Intermediate);
    }

    #[tokio::test]
    async fn repeated_failures_lower_current_difficulty() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        engine.progress.current_difficulty = Difficulty::Advanced;

        for _ in 0..3 {
            engine
                .answer(&CardId::new("c1"), &OptionId::new("a"), Duration::from_secs(100))
                .await
                .unwrap();
        }
        assert_eq!(engine.progress().current_difficulty, Difficulty::Beginner);
    }

    struct StreakBadge;

    impl AchievementRule for StreakBadge {
        fn check(&self, progress: &ProgressRecord) -> Option<Achievement> {
            (progress.current_streak >= 2).then(|| Achievement {
                id: "streak-2".into(),
                title: "Warming up".into(),
                description: "Two correct in a row".into(),
                unlocked_at: progress.last_activity,
            })
        }
    }

    #[tokio::test]
    async fn achievement_rules_unlock_once() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        engine.add_achievement_rule(Box::new(StreakBadge));

        for _ in 0..3 {
            engine
                .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(30))
                .await
                .unwrap();
        }
        assert_eq!(engine.progress().achievements.len(), 1);
        assert_eq!(engine.progress().achievements[0].id, "streak-2");
    }

    #[tokio::test]
    async fn initialize_restores_persisted_progress_and_cards() {
        let store = Arc::new(InMemoryStore::new());
        {
            let mut engine = ready_engine(store.clone()).await;
            engine
                .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(30))
                .await
                .unwrap();
        }

        let mut restored = FlipCardEngine::new(
            UserId::new("u1"),
            EngineConfig::default(),
            store.clone() as Arc<dyn ProgressStore>,
        )
        .with_clock(Clock::fixed(fixed_now()));
        restored.initialize().await.unwrap();

        assert_eq!(restored.catalog().len(), 2);
        assert_eq!(restored.progress().total_attempts, 1);
        assert!(restored.progress().is_completed(&CardId::new("c1")));
    }

    #[tokio::test]
    async fn corrupt_snapshot_fails_initialize() {
        let store = Arc::new(InMemoryStore::new());
        store.save("flipcard:progress", "not json").await.unwrap();

        let mut engine = FlipCardEngine::new(
            UserId::new("u1"),
            EngineConfig::default(),
            store as Arc<dyn ProgressStore>,
        );
        let err = engine.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidProgressFormat(_)));
    }

    #[tokio::test]
    async fn stats_summarize_catalog_and_record() {
        let mut engine = ready_engine(Arc::new(InMemoryStore::new())).await;
        engine
            .answer(&CardId::new("c1"), &OptionId::new("b"), Duration::from_secs(30))
            .await
            .unwrap();
        engine
            .answer(&CardId::new("c2"), &OptionId::new("a"), Duration::from_secs(90))
            .await
            .unwrap();

        let stats = engine.stats();
        assert_eq!(stats.total_cards, 2);
        assert_eq!(stats.completed_cards, 1);
        assert!((stats.accuracy - 0.5).abs() < f64::EPSILON);
        assert!((stats.average_time_per_card - 60.0).abs() < 1e-9);
        assert_eq!(stats.total_time_spent, Duration::from_secs(120));
        assert_eq!(stats.category_breakdown.len(), 2);
    }
}

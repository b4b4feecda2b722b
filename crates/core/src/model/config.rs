use std::time::Duration;

/// Behavioral switches for the session engine.
///
/// `max_attempts` and `time_limit` are advisory metadata surfaced to
/// callers; the engine itself does not enforce them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Persist progress and cards after every mutating operation.
    pub auto_save: bool,
    pub show_hints: bool,
    pub enable_bookmarks: bool,
    pub shuffle_cards: bool,
    pub max_attempts: u32,
    pub time_limit: Duration,
    /// Default size of a recommended card batch.
    pub recommended_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            show_hints: true,
            enable_bookmarks: true,
            shuffle_cards: true,
            max_attempts: 3,
            time_limit: Duration::from_secs(300),
            recommended_batch: 5,
        }
    }
}

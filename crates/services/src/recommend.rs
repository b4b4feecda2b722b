use rand::rng;
use rand::seq::SliceRandom;

use flipcard_core::model::{Card, ProgressRecord};
use flipcard_core::AdaptiveEngine;

/// Turns the adaptive engine's deterministic card subset into a randomized
/// recommendation batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationService {
    engine: AdaptiveEngine,
}

impl RecommendationService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: AdaptiveEngine::new(),
        }
    }

    #[must_use]
    pub fn adaptive(&self) -> &AdaptiveEngine {
        &self.engine
    }

    /// The adapted subset, uniformly shuffled and truncated to `count`.
    ///
    /// May return fewer than `count` cards when the adapted set is smaller.
    #[must_use]
    pub fn recommend<'a, I>(
        &self,
        cards: I,
        progress: &ProgressRecord,
        count: usize,
    ) -> Vec<&'a Card>
    where
        I: IntoIterator<Item = &'a Card>,
    {
        let mut adapted = self.engine.adapt_cards(cards, progress);
        let mut rng = rng();
        adapted.as_mut_slice().shuffle(&mut rng);
        adapted.truncate(count);
        adapted
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

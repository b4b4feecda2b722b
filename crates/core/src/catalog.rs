use std::collections::BTreeMap;

use crate::model::{Card, CardError, CardId, Category, Difficulty, ProgressRecord};

/// Criteria for [`CardCatalog::filter`]. Every populated field must match.
///
/// `completed` and `bookmarked` are evaluated against the progress record
/// passed to `filter`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFilter {
    pub categories: Option<Vec<Category>>,
    pub difficulties: Option<Vec<Difficulty>>,
    pub tags: Option<Vec<String>>,
    pub completed: Option<bool>,
    pub bookmarked: Option<bool>,
}

/// Validated, keyed collection of cards.
///
/// Cards only enter through the validation gate; anything a catalog hands
/// out has passed [`Card::validate`]. Keys are ordered so `all()` iterates
/// deterministically.
#[derive(Debug, Clone, Default)]
pub struct CardCatalog {
    cards: BTreeMap<CardId, Card>,
}

impl CardCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and upserts a single card (last write by id wins).
    ///
    /// # Errors
    ///
    /// Returns `CardError` if the card fails validation; the catalog is
    /// unchanged in that case.
    pub fn insert(&mut self, card: Card) -> Result<(), CardError> {
        card.validate()?;
        self.cards.insert(card.id.clone(), card);
        Ok(())
    }

    /// Inserts a batch of cards, validating per item.
    ///
    /// # Errors
    ///
    /// Returns the first item's `CardError` and stops there. Items accepted
    /// earlier in the same call remain inserted; validation is per item,
    /// not all-or-nothing across the batch.
    pub fn load(&mut self, cards: Vec<Card>) -> Result<(), CardError> {
        for card in cards {
            self.insert(card)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &CardId) -> Option<&Card> {
        self.cards.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.contains_key(id)
    }

    /// All cards in id order.
    pub fn all(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Removes every card. Used when a session is destroyed.
    pub fn clear(&mut self) {
        self.cards.clear();
    }

    /// Case-insensitive substring search over scenario title, description
    /// and tags.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Card> {
        let needle = query.to_lowercase();
        self.all().filter(|card| card.matches_query(&needle)).collect()
    }

    /// Cards matching every populated criterion of the filter.
    #[must_use]
    pub fn filter(&self, filter: &CardFilter, progress: &ProgressRecord) -> Vec<&Card> {
        self.all()
            .filter(|card| {
                if let Some(categories) = &filter.categories {
                    if !categories.contains(&card.category) {
                        return false;
                    }
                }
                if let Some(difficulties) = &filter.difficulties {
                    if !difficulties.contains(&card.difficulty) {
                        return false;
                    }
                }
                if let Some(tags) = &filter.tags {
                    if !tags.iter().any(|tag| card.tags.contains(tag)) {
                        return false;
                    }
                }
                if let Some(completed) = filter.completed {
                    if progress.is_completed(&card.id) != completed {
                        return false;
                    }
                }
                if let Some(bookmarked) = filter.bookmarked {
                    if progress.is_bookmarked(&card.id) != bookmarked {
                        return false;
                    }
                }
                true
            })
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

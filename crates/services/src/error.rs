//! Shared error types for the services crate.

use thiserror::Error;

use flipcard_core::model::{CardError, CardId, OptionId};
use storage::StorageError;

/// Errors emitted by the session engine.
///
/// Nothing here is retried internally; every failure is surfaced to the
/// caller, and for storage failures the in-memory record stays authoritative
/// (ahead of persisted state) until the caller retries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// A card failed the catalog's validation gate.
    #[error("invalid card format: {0}")]
    InvalidCard(#[from] CardError),

    /// The caller passed a card id the catalog does not know.
    #[error("card not found: {0}")]
    CardNotFound(CardId),

    /// The caller passed an option id the card does not carry.
    #[error("option {option} not found on card {card}")]
    OptionNotFound { card: CardId, option: OptionId },

    /// An import payload (or persisted snapshot) could not be parsed.
    #[error("invalid progress format: {0}")]
    InvalidProgressFormat(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The session has not been initialized yet.
    #[error("session not initialized")]
    NotInitialized,

    /// The session was destroyed; only export remains available.
    #[error("session destroyed")]
    SessionClosed,
}

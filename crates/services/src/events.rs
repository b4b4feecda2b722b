use chrono::{DateTime, Utc};

use flipcard_core::model::{Attempt, Card, CardId, SessionId};

/// Which way a card was turned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    /// Front to back: reveal the solution.
    ToBack,
    /// Back to front: back to the question.
    ToFront,
}

/// Notifications the engine emits while a session runs.
///
/// Events are delivered synchronously to every registered listener, in
/// registration order, before the triggering call returns (persistence on
/// `answer` happens first, see the engine docs).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SessionStarted {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
    CardLoaded {
        card: Card,
    },
    CardStarted {
        card_id: CardId,
        timestamp: DateTime<Utc>,
    },
    CardAnswered {
        card_id: CardId,
        attempt: Attempt,
        is_correct: bool,
    },
    CardFlipped {
        card_id: CardId,
        direction: FlipDirection,
    },
    CardBookmarked {
        card_id: CardId,
        bookmarked: bool,
    },
    HintRequested {
        card_id: CardId,
        hint_number: u32,
    },
    /// Generic signal that the progress record was replaced wholesale
    /// (reset or import).
    ProgressChanged,
}

/// Callback invoked for every emitted event.
pub type EventListener = Box<dyn Fn(&EngineEvent) + Send>;

/// Listener registry with synchronous in-order delivery.
#[derive(Default)]
pub(crate) struct EventBus {
    listeners: Vec<EventListener>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    pub(crate) fn emit(&self, event: &EngineEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

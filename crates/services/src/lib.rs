#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod events;
pub mod recommend;

pub use flipcard_core::Clock;

pub use engine::{
    AchievementRule, EngineStats, FlipCardEngine, ProgressExport, SessionState, ENGINE_VERSION,
};
pub use error::EngineError;
pub use events::{EngineEvent, EventListener, FlipDirection};
pub use recommend::RecommendationService;

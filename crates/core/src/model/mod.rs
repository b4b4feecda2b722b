mod attempt;
mod card;
mod config;
mod ids;
mod progress;

pub use attempt::Attempt;
pub use card::{
    AnswerOption, Card, CardError, CardMetadata, Category, Difficulty, Scenario, Solution,
};
pub use config::EngineConfig;
pub use ids::{CardId, OptionId, SessionId, UserId};
pub use progress::{Achievement, CategoryStats, ProgressRecord};

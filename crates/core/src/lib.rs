#![forbid(unsafe_code)]

pub mod adaptive;
pub mod catalog;
pub mod model;
pub mod time;

pub use adaptive::AdaptiveEngine;
pub use catalog::{CardCatalog, CardFilter};
pub use time::Clock;

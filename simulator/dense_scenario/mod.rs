// Dense single-AP DMG scenario substrate

pub mod config;
pub mod event_queue;
pub mod runner;
pub mod stats;

// Re-export commonly used types
pub use config::{AssociationConfig, DenseScenarioConfig, LinkAction, LinkConfig, ScheduledEvent};
pub use runner::DenseScenarioRunner;
pub use stats::ScenarioResult;

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod locks;
pub mod progression;

pub use curriculum_core::Clock;

pub use config::EngineConfig;
pub use error::{ConfigError, ProgressionError};
pub use progression::{ProgressOverview, ProgressionEngine};

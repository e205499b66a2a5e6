mod engine;
mod overview;

pub use engine::ProgressionEngine;
pub use overview::ProgressOverview;

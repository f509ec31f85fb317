//! Orchestrator - job execution and progress tracking

mod orchestrator;
mod progress;

pub use orchestrator::Orchestrator;
pub use progress::ProgressTracker;

//! Paced, bounded-concurrency launcher for pull attempts.
mod dispatcher;
mod pacing;
mod types;

#[cfg(test)]
mod tests;

pub use dispatcher::{Dispatcher, PullAttempt};
pub use pacing::Pacing;
pub use types::{
    AttemptReport, AttemptSpec, Outcome, OutcomeTally, Rate, RunConfig, RunSummary, TallySnapshot,
};

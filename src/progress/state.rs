use std::sync::atomic::{AtomicU64, Ordering};

/// Completed/total counter shared by every attempt of one run.
///
/// `completed` only moves forward, one step per finished attempt, and never
/// passes `total`.
#[derive(Debug)]
pub struct ProgressState {
    total: u64,
    completed: AtomicU64,
}

impl ProgressState {
    #[must_use]
    pub const fn new(total: u64) -> Self {
        Self {
            total,
            completed: AtomicU64::new(0),
        }
    }

    /// Counts one finished attempt and returns the new completed count.
    /// Calls beyond `total` leave the counter at `total`.
    pub fn record_completion(&self) -> u64 {
        match self
            .completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.total).then(|| current.saturating_add(1))
            }) {
            Ok(previous) => previous.saturating_add(1),
            Err(current) => current,
        }
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total
    }
}

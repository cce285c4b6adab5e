use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::pacing::Pacing;
use crate::args::{PositiveU64, PositiveUsize};

/// One requested pull. Ids start at 1 and follow launch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSpec {
    pub id: u64,
    pub target: Arc<str>,
}

impl AttemptSpec {
    pub fn new(id: u64, target: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The manifest endpoint answered; any status code counts.
    Success { status_code: u16 },
    /// The token endpoint was unreachable, refused, or returned no token.
    AuthFailure { cause: String },
    /// The manifest request failed at the transport level.
    RequestFailure { cause: String },
}

impl Outcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// What an attempt hands back: its outcome plus an optional description of
/// the client it pretended to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub outcome: Outcome,
    pub origin: Option<String>,
}

impl From<Outcome> for AttemptReport {
    fn from(outcome: Outcome) -> Self {
        Self {
            outcome,
            origin: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    pub total: PositiveU64,
    pub concurrency: PositiveUsize,
    pub pacing: Pacing,
}

/// Per-kind outcome counters shared by all attempt units.
#[derive(Debug, Default)]
pub struct OutcomeTally {
    successes: AtomicU64,
    auth_failures: AtomicU64,
    request_failures: AtomicU64,
}

impl OutcomeTally {
    pub fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Success { .. } => &self.successes,
            Outcome::AuthFailure { .. } => &self.auth_failures,
            Outcome::RequestFailure { .. } => &self.request_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            request_failures: self.request_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    pub successes: u64,
    pub auth_failures: u64,
    pub request_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Attempts requested for the run.
    pub total: u64,
    /// Attempts that finished; below `total` only after a cancellation.
    pub completed: u64,
    pub elapsed: Duration,
    pub tally: TallySnapshot,
    pub cancelled: bool,
}

impl RunSummary {
    /// Completed attempts per second, in tenths, rounded half up.
    #[must_use]
    pub fn rate_tenths_per_second(&self) -> u128 {
        let micros = self.elapsed.as_micros().max(1);
        u128::from(self.completed)
            .saturating_mul(20_000_000)
            .saturating_add(micros)
            .checked_div(micros.saturating_mul(2))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn rate_per_second(&self) -> Rate {
        Rate(self.rate_tenths_per_second())
    }
}

/// Requests per second with one decimal, e.g. `12.3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rate(u128);

impl Rate {
    #[must_use]
    pub const fn tenths(self) -> u128 {
        self.0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0.checked_div(10).unwrap_or(0);
        let tenths = self.0.checked_rem(10).unwrap_or(0);
        write!(f, "{}.{}", whole, tenths)
    }
}

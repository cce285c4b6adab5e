use std::time::Duration;

use rand::Rng;

use crate::args::JitterPercent;

/// Hundredths of a percent in 100%.
const FULL_SCALE: u64 = 10_000;
/// Upper bound on the post-run flush wait.
const MAX_GRACE: Duration = Duration::from_secs(2);

/// Delay policy between successive launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    base_delay: Duration,
    jitter: JitterPercent,
}

impl Pacing {
    #[must_use]
    pub const fn new(base_delay: Duration, jitter: JitterPercent) -> Self {
        Self { base_delay, jitter }
    }

    #[must_use]
    pub const fn fixed(base_delay: Duration) -> Self {
        Self::new(base_delay, JitterPercent::ZERO)
    }

    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    #[must_use]
    pub const fn jitter(&self) -> JitterPercent {
        self.jitter
    }

    /// Delay before the next launch: `base_delay` exactly without jitter,
    /// otherwise `base_delay` plus a uniform offset in `±base_delay·jitter`,
    /// never below zero.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let spread = self.spread_micros();
        if spread == 0 {
            return self.base_delay;
        }
        let spread = i128::from(spread);
        let offset = rng.gen_range(-spread..=spread);
        let delay = i128::from(self.base_micros())
            .saturating_add(offset)
            .max(0);
        Duration::from_micros(u64::try_from(delay).unwrap_or(u64::MAX))
    }

    /// Longest delay `next_delay` can produce.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_micros(self.base_micros().saturating_add(self.spread_micros()))
    }

    /// Wait after the last attempt joins so trailing notices can reach the
    /// relay before it is told to stop.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.max_delay().min(MAX_GRACE)
    }

    fn base_micros(&self) -> u64 {
        u64::try_from(self.base_delay.as_micros()).unwrap_or(u64::MAX)
    }

    fn spread_micros(&self) -> u64 {
        let spread = u128::from(self.base_micros())
            .saturating_mul(u128::from(self.jitter.hundredths()))
            .checked_div(u128::from(FULL_SCALE))
            .unwrap_or(0);
        u64::try_from(spread).unwrap_or(u64::MAX)
    }
}

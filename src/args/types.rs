use std::fmt;
use std::num::{NonZeroU64, NonZeroUsize};

use crate::error::ValidationError;

/// Hundredths of a percent in one whole percent.
const HUNDREDTHS_PER_PERCENT: u16 = 100;
/// Upper bound for jitter, 100.00%.
const MAX_JITTER_HUNDREDTHS: u16 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositiveU64(NonZeroU64);

impl PositiveU64 {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl TryFrom<u64> for PositiveU64 {
    type Error = ValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        NonZeroU64::new(value)
            .map(PositiveU64)
            .ok_or(ValidationError::ValueTooSmall { min: 1 })
    }
}

impl std::str::FromStr for PositiveU64 {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .trim()
            .parse()
            .map_err(|err| ValidationError::InvalidNumber { source: err })?;
        PositiveU64::try_from(value)
    }
}

impl From<PositiveU64> for u64 {
    fn from(value: PositiveU64) -> Self {
        value.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositiveUsize(NonZeroUsize);

impl PositiveUsize {
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<usize> for PositiveUsize {
    type Error = ValidationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        NonZeroUsize::new(value)
            .map(PositiveUsize)
            .ok_or(ValidationError::ValueTooSmall { min: 1 })
    }
}

impl std::str::FromStr for PositiveUsize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: usize = s
            .trim()
            .parse()
            .map_err(|err| ValidationError::InvalidNumber { source: err })?;
        PositiveUsize::try_from(value)
    }
}

impl From<PositiveUsize> for usize {
    fn from(value: PositiveUsize) -> Self {
        value.get()
    }
}

/// Jitter as a percentage of the base delay, stored in hundredths of a
/// percent so pacing math stays in integers. Always within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JitterPercent(u16);

impl JitterPercent {
    pub const ZERO: Self = Self(0);

    /// Builds a jitter value from hundredths of a percent (`1250` = 12.5%).
    ///
    /// # Errors
    ///
    /// Returns `JitterOutOfRange` when the value exceeds 100%.
    pub fn from_hundredths(hundredths: u16) -> Result<Self, ValidationError> {
        if hundredths > MAX_JITTER_HUNDREDTHS {
            return Err(ValidationError::JitterOutOfRange {
                value: format!(
                    "{}.{:02}",
                    hundredths / HUNDREDTHS_PER_PERCENT,
                    hundredths % HUNDREDTHS_PER_PERCENT
                ),
            });
        }
        Ok(Self(hundredths))
    }

    #[must_use]
    pub const fn hundredths(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for JitterPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / HUNDREDTHS_PER_PERCENT;
        let tenths = (self.0 % HUNDREDTHS_PER_PERCENT) / 10;
        write!(f, "{}.{}", whole, tenths)
    }
}

impl std::str::FromStr for JitterPercent {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::parsers::parse_jitter(s)
    }
}

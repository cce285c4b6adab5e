use std::time::Duration;

use super::types::{JitterPercent, PositiveU64, PositiveUsize};
use crate::error::{AppError, AppResult, ValidationError};

pub(super) fn parse_positive_u64(s: &str) -> AppResult<PositiveU64> {
    s.parse::<PositiveU64>().map_err(AppError::from)
}

pub(super) fn parse_positive_usize(s: &str) -> AppResult<PositiveUsize> {
    s.parse::<PositiveUsize>().map_err(AppError::from)
}

pub(crate) fn parse_bool_env(s: &str) -> AppResult<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" | "" => Ok(false),
        _ => Err(AppError::validation(ValidationError::InvalidBoolean {
            value: s.to_owned(),
        })),
    }
}

/// Parses a decimal percentage such as `0`, `12.5` or `100.0` into
/// hundredths of a percent. Digits past the second decimal are truncated.
pub(crate) fn parse_jitter(s: &str) -> Result<JitterPercent, ValidationError> {
    let value = s.trim();
    let invalid = || ValidationError::InvalidJitter {
        value: value.to_owned(),
    };
    let out_of_range = || ValidationError::JitterOutOfRange {
        value: value.to_owned(),
    };

    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let (whole_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !whole_part.chars().all(|ch| ch.is_ascii_digit())
        || !frac_part.chars().all(|ch| ch.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: u64 = if whole_part.is_empty() {
        0
    } else {
        whole_part.parse().map_err(|_parse| out_of_range())?
    };
    let mut frac: u64 = 0;
    let mut scale: u64 = 10;
    for digit in frac_part.chars().take(2) {
        let digit_value = u64::from(digit.to_digit(10).ok_or_else(invalid)?);
        frac = frac.saturating_add(digit_value.saturating_mul(scale));
        scale /= 10;
    }
    let truncated_nonzero = frac_part.chars().skip(2).any(|ch| ch != '0');

    let hundredths = whole.saturating_mul(100).saturating_add(frac);
    if negative && (hundredths > 0 || truncated_nonzero) {
        return Err(out_of_range());
    }
    if hundredths > 10_000 || (hundredths == 10_000 && truncated_nonzero) {
        return Err(out_of_range());
    }
    let hundredths = u16::try_from(hundredths).map_err(|_overflow| out_of_range())?;
    JitterPercent::from_hundredths(hundredths)
}

pub(crate) fn parse_duration_arg(s: &str) -> AppResult<Duration> {
    let value = s.trim();
    if value.is_empty() {
        return Err(AppError::validation(ValidationError::DurationEmpty));
    }

    let digits_len = value.chars().take_while(char::is_ascii_digit).count();
    if digits_len == 0 {
        return Err(AppError::validation(
            ValidationError::InvalidDurationFormat {
                value: value.to_owned(),
            },
        ));
    }
    let (num_part, unit_part) = value.split_at(digits_len);
    let number: u64 = num_part.parse().map_err(|err| {
        AppError::validation(ValidationError::InvalidDurationNumber {
            value: value.to_owned(),
            source: err,
        })
    })?;

    let unit = if unit_part.is_empty() { "s" } else { unit_part };
    let duration = match unit {
        "ms" => Duration::from_millis(number),
        "s" => Duration::from_secs(number),
        "m" => {
            let secs = number
                .checked_mul(60)
                .ok_or_else(|| AppError::validation(ValidationError::DurationOverflow))?;
            Duration::from_secs(secs)
        }
        "h" => {
            let secs = number
                .checked_mul(60)
                .and_then(|seconds| seconds.checked_mul(60))
                .ok_or_else(|| AppError::validation(ValidationError::DurationOverflow))?;
            Duration::from_secs(secs)
        }
        _ => {
            return Err(AppError::validation(ValidationError::InvalidDurationUnit {
                unit: unit.to_owned(),
            }));
        }
    };

    if duration.is_zero() {
        return Err(AppError::validation(ValidationError::ValueTooSmall {
            min: 1,
        }));
    }

    Ok(duration)
}

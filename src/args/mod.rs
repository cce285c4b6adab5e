//! CLI argument types and parsing helpers.
mod cli;
pub(crate) mod parsers;
mod types;

#[cfg(test)]
mod test_support;

pub use cli::PullArgs;
pub use types::{JitterPercent, PositiveU64, PositiveUsize};

pub(crate) use parsers::{parse_duration_arg, parse_jitter};

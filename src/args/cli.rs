use clap::Parser;
use std::time::Duration;

use super::parsers::{
    parse_bool_env, parse_duration_arg, parse_jitter, parse_positive_u64, parse_positive_usize,
};
use super::types::{JitterPercent, PositiveU64, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Simulates concurrent container-registry pulls (token + manifest handshake) to load test a registry."
)]
pub struct PullArgs {
    /// Image to pull (e.g., nginx:latest or ghcr.io/username/repo:tag)
    #[arg(long, short = 'i')]
    pub image: Option<String>,

    /// Number of pulls to simulate
    #[arg(long, short = 'p', default_value = "1", value_parser = parse_positive_u64)]
    pub pulls: PositiveU64,

    /// Registry to use (dockerhub, ghcr, or a key from the config registries table)
    #[arg(long, short = 'r', default_value = "dockerhub")]
    pub registry: String,

    /// Base delay between pull launches in milliseconds
    #[arg(long = "delay", short = 'd', default_value_t = 50)]
    pub delay_ms: u64,

    /// Jitter factor for randomizing delays, as a percentage of the delay (0.0-100.0)
    #[arg(long, short = 'j', default_value = "0", value_parser = parse_jitter)]
    pub jitter: JitterPercent,

    /// Number of concurrent pulls
    #[arg(long = "concurrent", short = 'c', default_value = "5", value_parser = parse_positive_usize)]
    pub concurrent: PositiveUsize,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long = "timeout", default_value = "10s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// Connection timeout (supports ms/s/m/h)
    #[arg(long = "connect-timeout", default_value = "5s", value_parser = parse_duration_arg)]
    pub connect_timeout: Duration,

    /// Print a completion notice for every Nth successful pull (failures are always printed)
    #[arg(long = "log-every", default_value = "50", value_parser = parse_positive_u64)]
    pub log_every: PositiveU64,

    /// Enable verbose logging (sets log level to debug unless overridden by PULLSTRESS_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Path to config file (TOML/JSON). Defaults to ./pullstress.toml or ./pullstress.json if present.
    #[arg(long)]
    pub config: Option<String>,

    /// Disable color output
    #[arg(long = "no-color", env = "NO_COLOR", value_parser = parse_bool_env)]
    pub no_color: bool,
}

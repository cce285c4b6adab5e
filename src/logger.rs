use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Level used when neither `PULLSTRESS_LOG` nor `RUST_LOG` is set.
const fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

fn log_filter(verbose: bool) -> EnvFilter {
    let fallback = default_level(verbose);
    std::env::var("PULLSTRESS_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

/// Installs the global tracing subscriber. Diagnostics are written to stderr
/// because stdout belongs to the progress relay and the final summary.
pub fn init_logging(verbose: bool, no_color: bool) {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(verbose))
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}

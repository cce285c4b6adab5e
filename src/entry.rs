use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::debug;

use crate::args::PullArgs;
use crate::dispatch::{Dispatcher, Pacing, RunConfig};
use crate::error::{AppError, AppResult, ValidationError};
use crate::progress::{Progress, ProgressOptions, RelayOutput};
use crate::registry::{
    ClientTimeouts, ImageReference, RegistryClient, RegistryDescriptor, RegistryPull,
};
use crate::shutdown::{setup_signal_shutdown_handler, shutdown_channel};
use crate::summary::write_summary;

/// Events the relay may buffer before completions wait for it.
const PROGRESS_QUEUE_CAPACITY: usize = 1024;

/// A validated run, ready to dispatch.
struct PullPlan {
    args: PullArgs,
    descriptor: Arc<RegistryDescriptor>,
    image: ImageReference,
}

/// Parses arguments, validates them and runs the pull simulation.
///
/// # Errors
///
/// Returns an error when validation fails or the runtime cannot be built.
pub fn run() -> AppResult<()> {
    let (args, matches) = parse_args()?;

    crate::logger::init_logging(args.verbose, args.no_color);

    let plan = match build_plan(args, &matches) {
        Ok(plan) => plan,
        Err(err) => {
            eprintln!("{}", PullArgs::command().render_usage());
            return Err(err);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(execute_plan(plan))
}

fn parse_args() -> AppResult<(PullArgs, ArgMatches)> {
    let matches = PullArgs::command().get_matches();
    let args = PullArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}

fn build_plan(mut args: PullArgs, matches: &ArgMatches) -> AppResult<PullPlan> {
    let config = crate::config::load_config(args.config.as_deref())?;
    if let Some(config) = config.as_ref() {
        crate::config::apply_config(&mut args, matches, config)?;
    }
    let catalog = crate::config::build_catalog(config.as_ref())?;

    let Some(image) = args.image.as_deref() else {
        return Err(AppError::validation(ValidationError::MissingImage));
    };
    let descriptor = catalog.lookup(&args.registry)?;
    let image = ImageReference::parse(image, descriptor.normalization)?;

    Ok(PullPlan {
        args,
        descriptor,
        image,
    })
}

async fn execute_plan(plan: PullPlan) -> AppResult<()> {
    let PullPlan {
        args,
        descriptor,
        image,
    } = plan;

    let pacing = Pacing::new(Duration::from_millis(args.delay_ms), args.jitter);
    announce(&args, &descriptor, &image)?;

    let client = RegistryClient::new(
        descriptor,
        ClientTimeouts {
            request: args.request_timeout,
            connect: args.connect_timeout,
        },
    )?;
    let attempt = Arc::new(RegistryPull::new(client, image));

    let dispatcher = Dispatcher::new(RunConfig {
        total: args.pulls,
        concurrency: args.concurrent,
        pacing,
    });

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let progress = Progress::start(
        ProgressOptions {
            total: args.pulls.get(),
            notice_every: args.log_every.get(),
            tick: ProgressOptions::DEFAULT_TICK,
            queue_capacity: PROGRESS_QUEUE_CAPACITY,
        },
        RelayOutput::stdout(args.no_color),
    );

    let summary = dispatcher.run(attempt, progress, shutdown_rx).await?;
    signal_handle.abort();

    debug!(
        "Run finished: {} of {} attempts in {:?}, at most {} tasks tracked",
        summary.completed,
        summary.total,
        summary.elapsed,
        dispatcher.peak_tracked_tasks()
    );
    write_summary(&mut std::io::stdout().lock(), &summary)?;
    Ok(())
}

fn announce(
    args: &PullArgs,
    descriptor: &RegistryDescriptor,
    image: &ImageReference,
) -> AppResult<()> {
    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "Starting {} manifest requests for {} from {}",
        args.pulls.get(),
        image,
        descriptor.name
    )?;
    if !args.jitter.is_zero() {
        writeln!(
            out,
            "Using base delay of {}ms with jitter factor of {}%",
            args.delay_ms, args.jitter
        )?;
    }
    out.flush()?;
    Ok(())
}

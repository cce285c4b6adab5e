use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::dispatcher::reap_finished;
use super::*;
use crate::args::{JitterPercent, PositiveU64, PositiveUsize};
use crate::progress::{Progress, ProgressBar, ProgressOptions, RelayOutput};
use crate::shutdown::shutdown_channel;
use crate::test_support::SharedBuffer;

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

fn run_config(total: u64, concurrency: usize, pacing: Pacing) -> Result<RunConfig, String> {
    Ok(RunConfig {
        total: PositiveU64::try_from(total).map_err(|err| err.to_string())?,
        concurrency: PositiveUsize::try_from(concurrency).map_err(|err| err.to_string())?,
        pacing,
    })
}

fn start_progress(config: &RunConfig, buffer: &SharedBuffer) -> Progress {
    Progress::start(
        ProgressOptions {
            total: config.total.get(),
            notice_every: 5,
            tick: Duration::from_millis(5),
            queue_capacity: config.concurrency.get(),
        },
        RelayOutput::plain(Box::new(buffer.clone()), ProgressBar::new(10)),
    )
}

async fn run_dispatcher<A: PullAttempt>(
    attempt: Arc<A>,
    config: RunConfig,
) -> Result<(RunSummary, Dispatcher, String), String> {
    let buffer = SharedBuffer::default();
    let progress = start_progress(&config, &buffer);
    let (_shutdown_tx, shutdown_rx) = shutdown_channel();
    let dispatcher = Dispatcher::new(config);
    let summary = dispatcher
        .run(attempt, progress, shutdown_rx)
        .await
        .map_err(|err| err.to_string())?;
    Ok((summary, dispatcher, buffer.contents()))
}

#[derive(Default)]
struct AlwaysOk {
    calls: AtomicU64,
}

#[async_trait]
impl PullAttempt for AlwaysOk {
    fn target(&self) -> String {
        "library/stub:latest".to_owned()
    }

    async fn attempt(&self, _spec: &AttemptSpec) -> AttemptReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Outcome::Success { status_code: 200 }.into()
    }
}

struct PeakTracker {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    hold: Duration,
}

impl PeakTracker {
    fn new(hold: Duration) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            hold,
        }
    }
}

#[async_trait]
impl PullAttempt for PeakTracker {
    fn target(&self) -> String {
        "library/peak:latest".to_owned()
    }

    async fn attempt(&self, _spec: &AttemptSpec) -> AttemptReport {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Outcome::Success { status_code: 200 }.into()
    }
}

#[derive(Default)]
struct LaunchRecorder {
    starts: Mutex<Vec<(u64, Instant)>>,
}

impl LaunchRecorder {
    fn gaps(&self) -> Result<Vec<Duration>, String> {
        let mut starts = self
            .starts
            .lock()
            .map_err(|err| format!("lock poisoned: {}", err))?
            .clone();
        starts.sort_by_key(|(id, _)| *id);
        Ok(starts
            .windows(2)
            .filter_map(|pair| match pair {
                [(_, first), (_, second)] => Some(second.saturating_duration_since(*first)),
                _ => None,
            })
            .collect())
    }
}

#[async_trait]
impl PullAttempt for LaunchRecorder {
    fn target(&self) -> String {
        "library/paced:latest".to_owned()
    }

    async fn attempt(&self, spec: &AttemptSpec) -> AttemptReport {
        if let Ok(mut guard) = self.starts.lock() {
            guard.push((spec.id, Instant::now()));
        }
        Outcome::Success { status_code: 200 }.into()
    }
}

struct Mixed;

#[async_trait]
impl PullAttempt for Mixed {
    fn target(&self) -> String {
        "library/mixed:latest".to_owned()
    }

    async fn attempt(&self, spec: &AttemptSpec) -> AttemptReport {
        match spec.id % 3 {
            0 => Outcome::AuthFailure {
                cause: "failed to get token, status: 401".to_owned(),
            }
            .into(),
            1 => Outcome::RequestFailure {
                cause: "connection refused".to_owned(),
            }
            .into(),
            _ => Outcome::Success { status_code: 404 }.into(),
        }
    }
}

struct Panicky {
    panic_on: u64,
}

#[async_trait]
impl PullAttempt for Panicky {
    fn target(&self) -> String {
        "library/panicky:latest".to_owned()
    }

    async fn attempt(&self, spec: &AttemptSpec) -> AttemptReport {
        if spec.id == self.panic_on {
            std::panic::panic_any("simulated attempt crash");
        }
        Outcome::Success { status_code: 200 }.into()
    }
}

#[test]
fn scenario_ten_pulls_two_slots_no_delay() -> Result<(), String> {
    run_async_test(async {
        let attempt = Arc::new(AlwaysOk::default());
        let config = run_config(10, 2, Pacing::fixed(Duration::ZERO))?;
        let (summary, dispatcher, output) = run_dispatcher(Arc::clone(&attempt), config).await?;

        if summary.completed != 10 || summary.total != 10 {
            return Err(format!("Unexpected summary: {:?}", summary));
        }
        if attempt.calls.load(Ordering::SeqCst) != 10 {
            return Err("Expected exactly ten attempt calls".to_owned());
        }
        if summary.rate_tenths_per_second() == 0 {
            return Err(format!("Expected positive rate: {:?}", summary));
        }
        if summary.tally.successes != 10 || summary.cancelled {
            return Err(format!("Unexpected tally: {:?}", summary));
        }
        if dispatcher.available_slots() != 2 {
            return Err(format!(
                "Leaked permits: {} available",
                dispatcher.available_slots()
            ));
        }
        if !output.contains("100.0% (10/10)") {
            return Err(format!("Final bar missing: {:?}", output));
        }
        Ok(())
    })
}

#[test]
fn concurrency_ceiling_is_never_exceeded() -> Result<(), String> {
    run_async_test(async {
        let attempt = Arc::new(PeakTracker::new(Duration::from_millis(10)));
        let config = run_config(40, 3, Pacing::fixed(Duration::ZERO))?;
        let (summary, dispatcher, _) = run_dispatcher(Arc::clone(&attempt), config).await?;

        let peak = attempt.peak.load(Ordering::SeqCst);
        if peak > 3 {
            return Err(format!("Peak concurrency {} exceeded 3", peak));
        }
        if peak == 0 {
            return Err("No attempts observed".to_owned());
        }
        if summary.completed != 40 {
            return Err(format!("Unexpected completed: {}", summary.completed));
        }
        if dispatcher.available_slots() != 3 {
            return Err("Leaked permits".to_owned());
        }
        Ok(())
    })
}

#[test]
fn finished_tasks_are_reaped_while_launching() -> Result<(), String> {
    run_async_test(async {
        let attempt = Arc::new(AlwaysOk::default());
        let config = run_config(5_000, 4, Pacing::fixed(Duration::ZERO))?;
        let (summary, dispatcher, _) = run_dispatcher(Arc::clone(&attempt), config).await?;

        if summary.completed != 5_000 {
            return Err(format!("Unexpected completed: {}", summary.completed));
        }
        let peak = dispatcher.peak_tracked_tasks();
        if peak == 0 || peak > 64 {
            return Err(format!("Tracked tasks grew to {} for 4 slots", peak));
        }
        Ok(())
    })
}

#[test]
fn reap_finished_joins_only_completed_tasks() -> Result<(), String> {
    run_async_test(async {
        let mut attempts = tokio::task::JoinSet::new();
        for _ in 0..8 {
            attempts.spawn(async {});
        }
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        attempts.spawn(async move {
            drop(release_rx.await);
        });

        let started = Instant::now();
        let mut reaped = 0_usize;
        while reaped < 8 && started.elapsed() < Duration::from_secs(2) {
            reaped = reaped.saturating_add(reap_finished(&mut attempts));
            tokio::task::yield_now().await;
        }
        if reaped != 8 || attempts.len() != 1 {
            return Err(format!("reaped {} with {} left", reaped, attempts.len()));
        }

        drop(release_tx.send(()));
        while attempts.join_next().await.is_some() {}
        Ok(())
    })
}

#[test]
fn single_slot_serializes_attempts() -> Result<(), String> {
    run_async_test(async {
        let attempt = Arc::new(PeakTracker::new(Duration::from_millis(2)));
        let config = run_config(15, 1, Pacing::fixed(Duration::ZERO))?;
        let (summary, _, _) = run_dispatcher(Arc::clone(&attempt), config).await?;
        if attempt.peak.load(Ordering::SeqCst) != 1 || summary.completed != 15 {
            return Err(format!(
                "Expected serialized run, peak {}",
                attempt.peak.load(Ordering::SeqCst)
            ));
        }
        Ok(())
    })
}

#[test]
fn fixed_pacing_spaces_launches() -> Result<(), String> {
    run_async_test(async {
        let attempt = Arc::new(LaunchRecorder::default());
        let delay = Duration::from_millis(25);
        let config = run_config(6, 6, Pacing::fixed(delay))?;
        run_dispatcher(Arc::clone(&attempt), config).await?;

        let gaps = attempt.gaps()?;
        if gaps.len() != 5 {
            return Err(format!("Expected 5 gaps, got {}", gaps.len()));
        }
        for gap in gaps {
            if gap < Duration::from_millis(20) || gap > Duration::from_millis(150) {
                return Err(format!("Gap {:?} outside tolerance of {:?}", gap, delay));
            }
        }
        Ok(())
    })
}

#[test]
fn jittered_pacing_stays_near_bounds() -> Result<(), String> {
    run_async_test(async {
        let attempt = Arc::new(LaunchRecorder::default());
        let jitter = JitterPercent::from_hundredths(5_000).map_err(|err| err.to_string())?;
        let config = run_config(6, 6, Pacing::new(Duration::from_millis(40), jitter))?;
        run_dispatcher(Arc::clone(&attempt), config).await?;

        for gap in attempt.gaps()? {
            if gap < Duration::from_millis(15) || gap > Duration::from_millis(160) {
                return Err(format!("Gap {:?} outside jitter bounds", gap));
            }
        }
        Ok(())
    })
}

#[test]
fn next_delay_without_jitter_is_exact() -> Result<(), String> {
    let pacing = Pacing::fixed(Duration::from_millis(100));
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..100 {
        if pacing.next_delay(&mut rng) != Duration::from_millis(100) {
            return Err("Expected exact base delay".to_owned());
        }
    }
    Ok(())
}

#[test]
fn next_delay_with_half_jitter_spans_range() -> Result<(), String> {
    let jitter = JitterPercent::from_hundredths(5_000).map_err(|err| err.to_string())?;
    let pacing = Pacing::new(Duration::from_millis(100), jitter);
    let mut rng = StdRng::seed_from_u64(42);
    let mut below = 0_u32;
    let mut above = 0_u32;
    for _ in 0..5_000 {
        let delay = pacing.next_delay(&mut rng);
        if delay < Duration::from_millis(50) || delay > Duration::from_millis(150) {
            return Err(format!("Delay {:?} outside [50ms, 150ms]", delay));
        }
        if delay < Duration::from_millis(75) {
            below = below.saturating_add(1);
        }
        if delay > Duration::from_millis(125) {
            above = above.saturating_add(1);
        }
    }
    if below == 0 || above == 0 {
        return Err(format!("Samples not spread: {} low, {} high", below, above));
    }
    if pacing.max_delay() != Duration::from_millis(150) {
        return Err(format!("Unexpected max delay {:?}", pacing.max_delay()));
    }
    Ok(())
}

#[test]
fn full_jitter_never_goes_negative() -> Result<(), String> {
    let jitter = JitterPercent::from_hundredths(10_000).map_err(|err| err.to_string())?;
    let pacing = Pacing::new(Duration::from_millis(10), jitter);
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..2_000 {
        if pacing.next_delay(&mut rng) > Duration::from_millis(20) {
            return Err("Delay above base + 100%".to_owned());
        }
    }
    if Pacing::new(Duration::from_secs(30), jitter).grace_period() != Duration::from_secs(2) {
        return Err("Grace period should be capped".to_owned());
    }
    Ok(())
}

#[test]
fn failures_are_counted_and_never_abort_the_run() -> Result<(), String> {
    run_async_test(async {
        let config = run_config(9, 4, Pacing::fixed(Duration::ZERO))?;
        let (summary, _, output) = run_dispatcher(Arc::new(Mixed), config).await?;

        let expected = TallySnapshot {
            successes: 3,
            auth_failures: 3,
            request_failures: 3,
        };
        if summary.tally != expected || summary.completed != 9 {
            return Err(format!("Unexpected summary: {:?}", summary));
        }
        let failure_notices = output.matches("failed:").count();
        if failure_notices != 6 {
            return Err(format!(
                "Expected 6 failure notices, got {}: {:?}",
                failure_notices, output
            ));
        }
        Ok(())
    })
}

#[test]
fn panicking_attempt_still_completes_and_frees_slot() -> Result<(), String> {
    run_async_test(async {
        let config = run_config(5, 2, Pacing::fixed(Duration::ZERO))?;
        let (summary, dispatcher, _) =
            run_dispatcher(Arc::new(Panicky { panic_on: 2 }), config).await?;
        if summary.completed != 5 {
            return Err(format!("Unexpected completed: {}", summary.completed));
        }
        if summary.tally.successes != 4 || summary.tally.request_failures != 1 {
            return Err(format!("Unexpected tally: {:?}", summary.tally));
        }
        if dispatcher.available_slots() != 2 {
            return Err("Leaked permits after panic".to_owned());
        }
        Ok(())
    })
}

#[test]
fn shutdown_stops_launching_and_joins_in_flight() -> Result<(), String> {
    run_async_test(async {
        let attempt = Arc::new(AlwaysOk::default());
        let config = run_config(1_000, 2, Pacing::fixed(Duration::from_millis(20)))?;
        let buffer = SharedBuffer::default();
        let progress = start_progress(&config, &buffer);
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let dispatcher = Dispatcher::new(config);

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(70)).await;
            drop(shutdown_tx.send(()));
            shutdown_tx
        });

        let summary = dispatcher
            .run(Arc::clone(&attempt), progress, shutdown_rx)
            .await
            .map_err(|err| err.to_string())?;
        drop(trigger.await.map_err(|err| err.to_string())?);

        if !summary.cancelled {
            return Err("Expected a cancelled run".to_owned());
        }
        let calls = attempt.calls.load(Ordering::SeqCst);
        if summary.completed != calls || calls == 0 || calls >= 1_000 {
            return Err(format!(
                "Completed {} vs calls {}",
                summary.completed, calls
            ));
        }
        if dispatcher.available_slots() != 2 {
            return Err("Leaked permits after shutdown".to_owned());
        }
        Ok(())
    })
}

#[test]
fn closed_shutdown_channel_does_not_cancel() -> Result<(), String> {
    run_async_test(async {
        let config = run_config(4, 2, Pacing::fixed(Duration::from_millis(1)))?;
        let buffer = SharedBuffer::default();
        let progress = start_progress(&config, &buffer);
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        drop(shutdown_tx);

        let summary = Dispatcher::new(config)
            .run(Arc::new(AlwaysOk::default()), progress, shutdown_rx)
            .await
            .map_err(|err| err.to_string())?;
        if summary.cancelled || summary.completed != 4 {
            return Err(format!("Unexpected summary: {:?}", summary));
        }
        Ok(())
    })
}

#[test]
fn rate_display_has_one_decimal() -> Result<(), String> {
    let summary = RunSummary {
        total: 25,
        completed: 25,
        elapsed: Duration::from_secs(2),
        tally: TallySnapshot::default(),
        cancelled: false,
    };
    if summary.rate_per_second().to_string() != "12.5" {
        return Err(format!("Unexpected rate {}", summary.rate_per_second()));
    }
    Ok(())
}

#[test]
fn rate_rounds_half_up_to_one_decimal() -> Result<(), String> {
    let rate_for = |completed: u64, elapsed: Duration| {
        RunSummary {
            total: completed,
            completed,
            elapsed,
            tally: TallySnapshot::default(),
            cancelled: false,
        }
        .rate_per_second()
        .to_string()
    };
    let cases = [
        (296, Duration::from_secs(100), "3.0"),
        (294, Duration::from_secs(100), "2.9"),
        (25, Duration::from_secs(10), "2.5"),
        (1, Duration::from_secs(3), "0.3"),
    ];
    for (completed, elapsed, expected) in cases {
        let shown = rate_for(completed, elapsed);
        if shown != expected {
            return Err(format!(
                "{} in {:?}: expected {}, got {}",
                completed, elapsed, expected, shown
            ));
        }
    }
    Ok(())
}

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::types::{AttemptReport, AttemptSpec, Outcome, OutcomeTally, RunConfig, RunSummary};
use crate::error::AppResult;
use crate::progress::{Progress, ProgressReporter};
use crate::shutdown::ShutdownReceiver;

/// The unit of work the dispatcher launches. Implementations must be safe to
/// call concurrently.
#[async_trait]
pub trait PullAttempt: Send + Sync + 'static {
    /// Label for what is being pulled, e.g. `library/nginx:latest`.
    fn target(&self) -> String;

    async fn attempt(&self, spec: &AttemptSpec) -> AttemptReport;
}

pub struct Dispatcher {
    config: RunConfig,
    slots: Arc<Semaphore>,
    peak_tracked: AtomicUsize,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.concurrency.get())),
            peak_tracked: AtomicUsize::new(0),
            config,
        }
    }

    /// Free pool slots. Equals the configured concurrency whenever no run is
    /// in progress.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Most unjoined attempt tasks held at once so far. Stays
    /// near the concurrency limit because finished tasks are reaped while
    /// launching.
    #[must_use]
    pub fn peak_tracked_tasks(&self) -> usize {
        self.peak_tracked.load(Ordering::Relaxed)
    }

    /// Launches `total` attempts, at most `concurrency` in flight, paced by
    /// the configured delay, then waits for all of them, lets the relay
    /// flush, and stops the progress aggregator.
    ///
    /// A shutdown signal stops further launches; attempts already started
    /// still run to completion.
    ///
    /// # Errors
    ///
    /// Returns an error when the progress tasks cannot be joined.
    pub async fn run<A: PullAttempt>(
        &self,
        attempt: Arc<A>,
        progress: Progress,
        mut shutdown_rx: ShutdownReceiver,
    ) -> AppResult<RunSummary> {
        let total = self.config.total.get();
        let pacing = self.config.pacing;
        let target: Arc<str> = Arc::from(attempt.target());
        let reporter = progress.reporter();
        let tally = Arc::new(OutcomeTally::default());
        let mut rng = StdRng::from_entropy();
        let mut attempts = JoinSet::new();
        let mut cancelled = false;
        let started = Instant::now();

        for id in 1..=total {
            let permit = tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown_rx) => {
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_closed) => {
                        cancelled = true;
                        break;
                    }
                },
            };

            reap_finished(&mut attempts);
            let spec = AttemptSpec::new(id, Arc::clone(&target));
            attempts.spawn(run_attempt(
                Arc::clone(&attempt),
                spec,
                permit,
                reporter.clone(),
                Arc::clone(&tally),
            ));
            self.peak_tracked.fetch_max(attempts.len(), Ordering::Relaxed);

            if id == total {
                break;
            }
            let delay = pacing.next_delay(&mut rng);
            if delay.is_zero() {
                continue;
            }
            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown_rx) => {
                    cancelled = true;
                    break;
                }
                () = sleep(delay) => {}
            }
        }

        if cancelled {
            info!(
                "Shutdown requested; waiting for {} in-flight pulls.",
                attempts.len()
            );
        }

        while let Some(joined) = attempts.join_next().await {
            if let Err(err) = joined {
                warn!("Pull task ended abnormally: {}", err);
            }
        }
        let elapsed = started.elapsed();

        sleep(pacing.grace_period()).await;
        let completed = reporter.state().completed();
        drop(reporter);
        progress.finish().await?;

        debug!("Dispatcher finished: {}/{} pulls", completed, total);
        Ok(RunSummary {
            total,
            completed,
            elapsed,
            tally: tally.snapshot(),
            cancelled,
        })
    }
}

/// Joins attempts that have already finished so their slots in the set are
/// freed while the launch loop is still running. Returns how many were reaped.
pub(super) fn reap_finished(attempts: &mut JoinSet<()>) -> usize {
    let mut reaped = 0_usize;
    while let Some(joined) = attempts.try_join_next() {
        if let Err(err) = joined {
            warn!("Pull task ended abnormally: {}", err);
        }
        reaped = reaped.saturating_add(1);
    }
    reaped
}

/// Resolves on a shutdown broadcast. A channel whose senders are all gone can
/// no longer deliver one, so it never resolves.
async fn shutdown_requested(shutdown_rx: &mut ShutdownReceiver) {
    match shutdown_rx.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
    }
}

/// Records the completion of one attempt exactly once, even if the attempt
/// unit unwinds before reaching the normal path.
struct CompletionGuard {
    reporter: ProgressReporter,
    tally: Arc<OutcomeTally>,
    armed: bool,
}

impl CompletionGuard {
    const fn new(reporter: ProgressReporter, tally: Arc<OutcomeTally>) -> Self {
        Self {
            reporter,
            tally,
            armed: true,
        }
    }

    fn complete(mut self, outcome: &Outcome) {
        self.armed = false;
        self.tally.record(outcome);
        self.reporter.record_completion();
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.armed {
            self.tally.record(&Outcome::RequestFailure {
                cause: "attempt aborted".to_owned(),
            });
            self.reporter.record_completion();
        }
    }
}

async fn run_attempt<A: PullAttempt>(
    attempt: Arc<A>,
    spec: AttemptSpec,
    permit: OwnedSemaphorePermit,
    reporter: ProgressReporter,
    tally: Arc<OutcomeTally>,
) {
    let guard = CompletionGuard::new(reporter.clone(), tally);
    let report = attempt.attempt(&spec).await;
    drop(permit);

    guard.complete(&report.outcome);
    reporter.report(&spec, &report).await;
}

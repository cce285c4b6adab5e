use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::render::ProgressBar;
use super::state::ProgressState;
use crate::dispatch::{AttemptReport, AttemptSpec, Outcome};
use crate::error::AppResult;
use crate::shutdown::{ShutdownReceiver, ShutdownSender, shutdown_channel};

/// Something for the relay to put on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Redraw the bar.
    Tick,
    /// Print a completion notice above the bar.
    Notice(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressOptions {
    pub total: u64,
    /// Successful attempts are announced when `id % notice_every == 0`.
    pub notice_every: u64,
    pub tick: Duration,
    pub queue_capacity: usize,
}

impl ProgressOptions {
    pub const DEFAULT_TICK: Duration = Duration::from_millis(100);
}

/// The output surface owned by the relay task.
pub struct RelayOutput {
    writer: Box<dyn Write + Send>,
    redraw: bool,
    color: bool,
    bar: ProgressBar,
    broken: bool,
}

impl RelayOutput {
    /// Stdout, redrawn in place when it is a terminal.
    #[must_use]
    pub fn stdout(no_color: bool) -> Self {
        let redraw = std::io::stdout().is_terminal();
        Self {
            writer: Box::new(std::io::stdout()),
            redraw,
            color: redraw && !no_color,
            bar: ProgressBar::default(),
            broken: false,
        }
    }

    /// Any writer, no escape sequences and no periodic redraws.
    #[must_use]
    pub fn plain(writer: Box<dyn Write + Send>, bar: ProgressBar) -> Self {
        Self {
            writer,
            redraw: false,
            color: false,
            bar,
            broken: false,
        }
    }

    fn handle(&mut self, event: &ProgressEvent, state: &ProgressState) {
        let result = match event {
            ProgressEvent::Tick if self.redraw => self.write_bar(state),
            ProgressEvent::Tick => Ok(()),
            ProgressEvent::Notice(message) => self.write_notice(message, state),
        };
        self.check(result);
    }

    fn finish(&mut self, state: &ProgressState) {
        let result = self.write_bar(state).and_then(|()| {
            self.writer.write_all(b"\n")?;
            self.writer.flush()
        });
        self.check(result);
    }

    fn check(&mut self, result: std::io::Result<()>) {
        if let Err(err) = result {
            if !self.broken {
                warn!("Progress output failed, continuing silently: {}", err);
            }
            self.broken = true;
        }
    }

    fn start_line(&mut self) -> std::io::Result<()> {
        if self.redraw {
            queue!(self.writer, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))
        } else {
            self.writer.write_all(b"\r")
        }
    }

    fn write_bar(&mut self, state: &ProgressState) -> std::io::Result<()> {
        if self.broken {
            return Ok(());
        }
        let (bar, stats) = self.bar.render_parts(state.completed(), state.total());
        self.start_line()?;
        if self.color {
            queue!(
                self.writer,
                Print(bar),
                SetForegroundColor(Color::Cyan),
                Print(stats),
                ResetColor
            )?;
        } else {
            queue!(self.writer, Print(bar), Print(stats))?;
        }
        self.writer.flush()
    }

    fn write_notice(&mut self, message: &str, state: &ProgressState) -> std::io::Result<()> {
        if self.broken {
            return Ok(());
        }
        self.start_line()?;
        self.writer.write_all(message.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.write_bar(state)
    }
}

/// Handle given to attempt units: counts completions and queues notices.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    state: Arc<ProgressState>,
    events: mpsc::Sender<ProgressEvent>,
    notice_every: u64,
}

impl ProgressReporter {
    pub fn record_completion(&self) -> u64 {
        self.state.record_completion()
    }

    #[must_use]
    pub fn state(&self) -> &Arc<ProgressState> {
        &self.state
    }

    /// Failures are always announced; successes only on every
    /// `notice_every`-th attempt id.
    #[must_use]
    pub fn should_notify(&self, spec: &AttemptSpec, outcome: &Outcome) -> bool {
        !outcome.is_success() || spec.id.checked_rem(self.notice_every) == Some(0)
    }

    pub async fn report(&self, spec: &AttemptSpec, report: &AttemptReport) {
        if self.should_notify(spec, &report.outcome) {
            self.notice(format_notice(spec, report)).await;
        }
    }

    pub async fn notice(&self, message: String) {
        if self.events.send(ProgressEvent::Notice(message)).await.is_err() {
            debug!("Progress relay already closed; notice dropped.");
        }
    }
}

/// Running aggregator: the ticker plus the relay that drains the event queue.
pub struct Progress {
    state: Arc<ProgressState>,
    events: mpsc::Sender<ProgressEvent>,
    notice_every: u64,
    stop_tx: ShutdownSender,
    ticker: JoinHandle<()>,
    relay: JoinHandle<()>,
}

impl Progress {
    /// Spawns the ticker and relay tasks. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(options: ProgressOptions, output: RelayOutput) -> Self {
        let state = Arc::new(ProgressState::new(options.total));
        let (events_tx, events_rx) = mpsc::channel(options.queue_capacity.max(1));
        let (stop_tx, stop_rx) = shutdown_channel();

        let ticker = spawn_ticker(
            Arc::clone(&state),
            events_tx.clone(),
            stop_rx,
            options.tick,
        );
        let relay = spawn_relay(Arc::clone(&state), events_rx, output);

        Self {
            state,
            events: events_tx,
            notice_every: options.notice_every.max(1),
            stop_tx,
            ticker,
            relay,
        }
    }

    #[must_use]
    pub fn reporter(&self) -> ProgressReporter {
        ProgressReporter {
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            notice_every: self.notice_every,
        }
    }

    /// Stops the ticker, closes the event queue and waits for the relay to
    /// drain it. Reporters still alive keep the queue open until dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when either task panicked.
    pub async fn finish(self) -> AppResult<()> {
        drop(self.stop_tx.send(()));
        drop(self.events);
        self.ticker.await?;
        self.relay.await?;
        Ok(())
    }
}

fn spawn_ticker(
    state: Arc<ProgressState>,
    events: mpsc::Sender<ProgressEvent>,
    mut stop_rx: ShutdownReceiver,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = ticker.tick() => {
                    if state.is_complete() {
                        break;
                    }
                    // A full queue means the relay is busy redrawing anyway.
                    if let Err(mpsc::error::TrySendError::Closed(_)) =
                        events.try_send(ProgressEvent::Tick)
                    {
                        break;
                    }
                }
            }
        }
    })
}

fn spawn_relay(
    state: Arc<ProgressState>,
    mut events: mpsc::Receiver<ProgressEvent>,
    mut output: RelayOutput,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            output.handle(&event, &state);
        }
        output.finish(&state);
    })
}

#[must_use]
pub(crate) fn format_notice(spec: &AttemptSpec, report: &AttemptReport) -> String {
    match &report.outcome {
        Outcome::Success { status_code } => match report.origin.as_deref() {
            Some(origin) => format!(
                "Pull {}: manifest request for {} from {} completed with status: {}",
                spec.id, spec.target, origin, status_code
            ),
            None => format!(
                "Pull {}: manifest request for {} completed with status: {}",
                spec.id, spec.target, status_code
            ),
        },
        Outcome::AuthFailure { cause } => {
            format!("Pull {}: auth failed: {}", spec.id, cause)
        }
        Outcome::RequestFailure { cause } => {
            format!("Pull {}: request failed: {}", spec.id, cause)
        }
    }
}

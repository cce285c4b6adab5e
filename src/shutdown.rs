use tokio::sync::broadcast;
use tracing::{debug, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

pub type ShutdownSender = broadcast::Sender<()>;
pub type ShutdownReceiver = broadcast::Receiver<()>;

/// Broadcast channel size for shutdown notifications (single signal fan-out).
const SHUTDOWN_CHANNEL_CAPACITY: usize = 1;

#[must_use]
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    broadcast::channel::<()>(SHUTDOWN_CHANNEL_CAPACITY)
}

/// Forwards Ctrl+C (and SIGTERM on unix) onto the shutdown channel, so an
/// interrupted run stops launching pulls and still prints its summary. Exits
/// when a shutdown is broadcast from elsewhere.
pub fn setup_signal_shutdown_handler(shutdown_tx: &ShutdownSender) -> tokio::task::JoinHandle<()> {
    let shutdown_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::select! {
            _ = shutdown_rx.recv() => {}
            signal = interrupted() => {
                debug!("Received {}; stopping new pulls.", signal);
                drop(shutdown_tx.send(()));
            }
        }
    })
}

/// Resolves with the name of the first termination signal received.
async fn interrupted() -> &'static str {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl+C",
            Err(err) => {
                warn!("Failed to listen for Ctrl+C: {}", err);
                std::future::pending::<&'static str>().await
            }
        }
    };
    tokio::select! {
        name = ctrl_c => name,
        name = terminated() => name,
    }
}

#[cfg(unix)]
async fn terminated() -> &'static str {
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
            "SIGTERM"
        }
        Err(err) => {
            warn!("Failed to register SIGTERM handler: {}", err);
            std::future::pending::<&'static str>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminated() -> &'static str {
    std::future::pending::<&'static str>().await
}

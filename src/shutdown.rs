use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::signal;
use tracing::{info, warn};

/// Cooperative shutdown flag shared by the watch loop and the sync driver.
///
/// The driver polls it between rows; the watch loop awaits it while idle.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once `trigger` has been called
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

/// Exit status when a second signal cuts a graceful shutdown short
pub const FORCED_EXIT_CODE: i32 = 130;

/// What to do about an incoming shutdown signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Finish the current row, then stop
    Graceful,
    /// Shutdown was already requested; exit now
    Force,
}

impl Shutdown {
    /// Record a shutdown signal. The first one triggers a graceful stop.
    pub fn on_signal(&self) -> SignalAction {
        if self.is_triggered() {
            SignalAction::Force
        } else {
            self.trigger();
            SignalAction::Graceful
        }
    }
}

/// Trigger `shutdown` on Ctrl-C or SIGTERM. A second signal exits the
/// process immediately.
pub fn listen_for_signals(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                None
            }
        };

        loop {
            #[cfg(unix)]
            let terminated = async {
                match terminate.as_mut() {
                    Some(stream) => {
                        stream.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            #[cfg(not(unix))]
            let terminated = std::future::pending::<()>();

            tokio::select! {
                result = signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!("Failed to listen for Ctrl-C: {}", e);
                        return;
                    }
                }
                _ = terminated => {}
            }

            match shutdown.on_signal() {
                SignalAction::Graceful => info!("Shutdown requested, finishing current row"),
                SignalAction::Force => {
                    warn!("Second shutdown signal, exiting now");
                    std::process::exit(FORCED_EXIT_CODE);
                }
            }
        }
    })
}

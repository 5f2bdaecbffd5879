use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// Watches the input directory and emits a debounced trigger whenever a
/// matching file is created or modified.
///
/// Dropping the watcher stops the background thread.
pub struct InputWatcher {
    #[allow(dead_code)]
    watcher: RecommendedWatcher,
}

impl InputWatcher {
    /// Start watching `dir`. Triggers are coalesced: at most one is ever
    /// pending on the returned receiver.
    pub fn start(
        dir: &Path,
        pattern: glob::Pattern,
        debounce: Duration,
    ) -> Result<(InputWatcher, mpsc::Receiver<()>)> {
        let (tx, rx) = channel::<notify::Result<Event>>();
        let (trigger_tx, trigger_rx) = mpsc::channel(1);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| SyncError::source(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| SyncError::source(format!("Failed to watch '{}': {}", dir.display(), e)))?;

        thread::spawn(move || {
            process_watch_events(rx, trigger_tx, pattern, debounce);
        });

        Ok((InputWatcher { watcher }, trigger_rx))
    }
}

/// Forward relevant events once they have been quiet for `debounce`
fn process_watch_events(
    rx: Receiver<notify::Result<Event>>,
    trigger_tx: mpsc::Sender<()>,
    pattern: glob::Pattern,
    debounce: Duration,
) {
    let tick = debounce.clamp(Duration::from_millis(50), Duration::from_secs(1));
    let mut pending_since: Option<Instant> = None;

    loop {
        match rx.recv_timeout(tick) {
            Ok(Ok(event)) => {
                if is_relevant(&event, &pattern) {
                    debug!(paths = ?event.paths, "Input change detected");
                    pending_since = Some(Instant::now());
                }
            }
            Ok(Err(e)) => {
                warn!("Watch error: {}", e);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(since) = pending_since {
            if since.elapsed() >= debounce {
                pending_since = None;
                match trigger_tx.try_send(()) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }
        }

        if trigger_tx.is_closed() {
            break;
        }
    }
}

fn is_relevant(event: &Event, pattern: &glob::Pattern) -> bool {
    let kind_matches = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    kind_matches
        && event.paths.iter().any(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| pattern.matches(n))
                .unwrap_or(false)
        })
}

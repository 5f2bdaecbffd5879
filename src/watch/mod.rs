//! Continuous mode: runs sync passes on file arrival or on a fixed interval.

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::sheet::{Row, SheetClient};
use crate::shutdown::Shutdown;
use crate::source::RowSource;
use crate::sync::{PassReport, SyncDriver};

/// What woke the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Files,
    Interval,
}

/// Runs passes one at a time until shutdown.
///
/// The last non-empty batch is kept, so an interval tick with no new input
/// re-checks the sheet against it. Triggers that arrive while a pass is
/// running are folded into a single follow-up pass.
pub struct WatchLoop<C: SheetClient, S: RowSource> {
    driver: SyncDriver<C>,
    source: S,
    shutdown: Shutdown,
    triggers: Option<mpsc::Receiver<()>>,
    last_batch: Option<Vec<Row>>,
    last_outcome: Option<Result<PassReport>>,
}

impl<C: SheetClient, S: RowSource> WatchLoop<C, S> {
    pub fn new(driver: SyncDriver<C>, source: S, shutdown: Shutdown) -> Self {
        Self {
            driver,
            source,
            shutdown,
            triggers: None,
            last_batch: None,
            last_outcome: None,
        }
    }

    /// Wake on file-arrival triggers as well as on the interval
    pub fn with_triggers(mut self, triggers: mpsc::Receiver<()>) -> Self {
        self.triggers = Some(triggers);
        self
    }

    pub fn driver(&self) -> &SyncDriver<C> {
        &self.driver
    }

    /// Run until shutdown; returns the outcome of the last pass, if any ran
    pub async fn run(&mut self) -> Option<Result<PassReport>> {
        let mut interval = tokio::time::interval(self.driver.config().poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut triggers = self.triggers.take();

        info!(
            interval_secs = self.driver.config().poll_interval.as_secs_f64(),
            file_triggers = triggers.is_some(),
            "Watch mode started"
        );

        loop {
            let wake = tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                _ = interval.tick() => Wake::Interval,
                trigger = next_trigger(&mut triggers) => match trigger {
                    Some(()) => Wake::Files,
                    None => {
                        debug!("Trigger channel closed, polling on interval only");
                        triggers = None;
                        continue;
                    }
                },
            };

            self.run_cycle(wake).await;

            while !self.shutdown.is_triggered() && take_pending(&mut triggers) {
                debug!("Input arrived during pass, running again");
                self.run_cycle(Wake::Files).await;
            }

            if self.shutdown.is_triggered() {
                break;
            }
        }

        info!("Watch mode stopped");
        self.last_outcome.take()
    }

    async fn run_cycle(&mut self, wake: Wake) {
        let fresh = match self.source.next_batch() {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to read input: {}", e);
                self.last_outcome = Some(Err(e));
                return;
            }
        };

        if !fresh.is_empty() {
            self.last_batch = Some(fresh);
        } else if wake == Wake::Files || self.last_batch.is_none() {
            debug!(?wake, "No new input");
            return;
        }

        let batch = match self.last_batch.as_deref() {
            Some(batch) => batch,
            None => return,
        };

        let outcome = self.driver.run_pass(batch, &self.shutdown).await;
        if let Err(ref e) = outcome {
            error!("Pass failed: {}", e);
        }
        self.last_outcome = Some(outcome);
    }
}

async fn next_trigger(triggers: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match triggers {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Drain queued triggers; true if any were waiting
fn take_pending(triggers: &mut Option<mpsc::Receiver<()>>) -> bool {
    let rx = match triggers {
        Some(rx) => rx,
        None => return false,
    };

    let mut pending = false;
    while rx.try_recv().is_ok() {
        pending = true;
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_settings, SyncSettings};
    use crate::error::SyncError;
    use crate::sheet::memory::MemorySheet;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    struct QueueSource {
        batches: VecDeque<Vec<Row>>,
    }

    impl RowSource for QueueSource {
        fn next_batch(&mut self) -> Result<Vec<Row>> {
            Ok(self.batches.pop_front().unwrap_or_default())
        }
    }

    fn batch(values: &[&str]) -> Vec<Row> {
        values.iter().map(|v| vec![v.to_string()]).collect()
    }

    fn watch_loop(
        sheet: MemorySheet,
        batches: Vec<Vec<Row>>,
        poll: Duration,
        shutdown: Shutdown,
    ) -> WatchLoop<MemorySheet, QueueSource> {
        let settings = SyncSettings {
            spreadsheet_id: Some("sheet".to_string()),
            credentials_path: Some(PathBuf::from("/tmp/token")),
            input_dir: Some(PathBuf::from("/tmp/in")),
            watch_columns: vec!["A".to_string()],
            update_columns: vec!["A".to_string()],
            watch: true,
            ..Default::default()
        };
        let mut config = resolve_settings(settings).unwrap();
        config.poll_interval = poll;

        let driver = SyncDriver::new(Arc::new(config), sheet);
        let source = QueueSource {
            batches: batches.into(),
        };
        WatchLoop::new(driver, source, shutdown)
    }

    #[tokio::test]
    async fn test_interval_recheck_is_idempotent() {
        let shutdown = Shutdown::new();
        let mut watch_loop = watch_loop(
            MemorySheet::default(),
            vec![batch(&["a", "b"])],
            Duration::from_millis(20),
            shutdown.clone(),
        );

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            shutdown.trigger();
        });

        let outcome = watch_loop.run().await.expect("a pass ran").unwrap();
        stopper.await.unwrap();

        let sheet = watch_loop.driver().client();
        assert!(sheet.read_count() >= 2);
        assert_eq!(sheet.writes().len(), 2);
        assert_eq!(outcome.changed_rows(), 0);
        assert_eq!(outcome.unchanged, 2);
    }

    #[tokio::test]
    async fn test_file_trigger_runs_new_batch() {
        let shutdown = Shutdown::new();
        let (tx, rx) = mpsc::channel(1);
        let mut watch_loop = watch_loop(
            MemorySheet::default(),
            vec![batch(&["a"]), batch(&["b"])],
            Duration::from_secs(3600),
            shutdown.clone(),
        )
        .with_triggers(rx);

        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.trigger();
        });

        let outcome = watch_loop.run().await.expect("a pass ran").unwrap();
        driver.await.unwrap();

        let rows = watch_loop.driver().client().rows();
        assert_eq!(rows, vec![vec!["b".to_string()]]);
        assert_eq!(outcome.written, 1);
    }

    #[tokio::test]
    async fn test_triggers_during_pass_coalesce_into_one_pass() {
        let shutdown = Shutdown::new();
        let (tx, rx) = mpsc::channel(8);
        let sheet = MemorySheet::default();
        sheet.slow_reads(Duration::from_millis(100));
        let mut watch_loop = watch_loop(
            sheet,
            vec![batch(&["a"]), batch(&["b"]), batch(&["c"]), batch(&["d"])],
            Duration::from_secs(3600),
            shutdown.clone(),
        )
        .with_triggers(rx);

        let sender = tokio::spawn(async move {
            // The first pass is still fetching at this point
            tokio::time::sleep(Duration::from_millis(30)).await;
            for _ in 0..5 {
                tx.send(()).await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(400)).await;
            shutdown.trigger();
            tx
        });

        let outcome = watch_loop.run().await.expect("a pass ran").unwrap();
        let _tx = sender.await.unwrap();

        let sheet = watch_loop.driver().client();
        assert_eq!(sheet.read_count(), 2);
        assert_eq!(sheet.rows(), vec![vec!["b".to_string()]]);
        assert_eq!(outcome.written, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_loop_alive() {
        let shutdown = Shutdown::new();
        let sheet = MemorySheet::default();
        sheet.fail_reads();
        let mut watch_loop = watch_loop(
            sheet,
            vec![batch(&["a"])],
            Duration::from_millis(20),
            shutdown.clone(),
        );

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            shutdown.trigger();
        });

        let outcome = watch_loop.run().await.expect("a pass ran");
        stopper.await.unwrap();

        assert!(matches!(outcome, Err(SyncError::Fetch(_))));
        assert!(watch_loop.driver().client().read_count() >= 2);
    }

    #[tokio::test]
    async fn test_shutdown_while_idle_returns_immediately() {
        let shutdown = Shutdown::new();
        let mut watch_loop = watch_loop(
            MemorySheet::default(),
            Vec::new(),
            Duration::from_secs(3600),
            shutdown.clone(),
        );
        shutdown.trigger();

        let outcome = tokio::time::timeout(Duration::from_secs(1), watch_loop.run())
            .await
            .expect("loop stopped");
        assert!(outcome.is_none());
    }

    #[test]
    fn test_take_pending_drains() {
        let (tx, rx) = mpsc::channel(1);
        let mut triggers = Some(rx);
        assert!(!take_pending(&mut triggers));
        tx.try_send(()).unwrap();
        assert!(take_pending(&mut triggers));
        assert!(!take_pending(&mut triggers));
        assert!(!take_pending(&mut None));
    }
}

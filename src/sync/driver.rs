use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::detector::{detect, Detection};
use super::planner::{plan, plan_new_row};
use super::types::{PassReport, RowKind, RowOutcome, SyncRecord};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::logging::log_preview;
use crate::sheet::{Row, SheetClient};
use crate::shutdown::Shutdown;

/// Runs sync passes of source batches against one remote worksheet
pub struct SyncDriver<C: SheetClient> {
    config: Arc<SyncConfig>,
    client: C,
}

impl<C: SheetClient> SyncDriver<C> {
    pub fn new(config: Arc<SyncConfig>, client: C) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run one pass over `batch` (raw rows, header rows included).
    ///
    /// Remote rows are fetched once up front; a fetch failure ends the pass
    /// with an error. Row write failures are recorded in the report and the
    /// pass moves on. When `shutdown` fires, the pass stops before the next
    /// row.
    pub async fn run_pass(&self, batch: &[Row], shutdown: &Shutdown) -> Result<PassReport> {
        let mut report = PassReport::new(self.config.dry_run);
        let span = info_span!("pass", pass_id = %report.pass_id);

        self.run_rows(batch, shutdown, &mut report).instrument(span).await?;
        Ok(report)
    }

    async fn run_rows(&self, batch: &[Row], shutdown: &Shutdown, report: &mut PassReport) -> Result<()> {
        let config = &self.config;
        let source_rows = batch.iter().skip(config.skip_header_rows as usize);

        let remote_rows = self
            .client
            .read_rows(&config.worksheet, config.skip_header_rows)
            .await?;
        info!(
            worksheet = %config.worksheet,
            source_rows = batch.len().saturating_sub(config.skip_header_rows as usize),
            remote_rows = remote_rows.len(),
            dry_run = config.dry_run,
            "Starting pass"
        );

        for (index, source_row) in source_rows.enumerate() {
            if shutdown.is_triggered() {
                warn!(row = config.row_position(index), "Pass cancelled before row");
                report.cancelled = true;
                break;
            }

            let record = self.sync_row(index, source_row, remote_rows.get(index)).await;
            report.push(record);
        }

        report.finish();
        info!("Pass finished: {}", report.summary());
        Ok(())
    }

    async fn sync_row(&self, index: usize, source_row: &Row, remote_row: Option<&Row>) -> SyncRecord {
        let config = &self.config;
        let position = config.row_position(index);

        let (kind, write_plan) = match detect(source_row, remote_row, &config.watch_columns, config.max_cell_length) {
            Detection::Unchanged => {
                debug!(row = position, "Row unchanged");
                return SyncRecord {
                    position,
                    source_index: index,
                    kind: RowKind::Existing,
                    changes: Vec::new(),
                    outcome: RowOutcome::Unchanged,
                    error: None,
                    error_kind: None,
                };
            }
            Detection::NewRow => (
                RowKind::New,
                plan_new_row(
                    source_row,
                    &config.update_columns,
                    &config.watch_columns,
                    &config.replacements,
                    config.max_cell_length,
                ),
            ),
            Detection::Changed(columns) => {
                debug!(row = position, columns = ?columns, "Watch columns changed");
                (
                    RowKind::Existing,
                    plan(source_row, &config.update_columns, &config.replacements, config.max_cell_length),
                )
            }
        };

        let changes = write_plan.changes(remote_row, config.max_cell_length);
        for change in changes.iter().filter(|c| c.truncated) {
            warn!(
                row = position,
                column = %change.column,
                max = config.max_cell_length,
                "Cell value truncated"
            );
        }

        let mut record = SyncRecord {
            position,
            source_index: index,
            kind,
            changes,
            outcome: RowOutcome::DryRun,
            error: None,
            error_kind: None,
        };

        if config.dry_run {
            for change in &record.changes {
                info!(
                    row = position,
                    column = %change.column,
                    "[dry-run] '{}' -> '{}'",
                    log_preview(&change.old_value),
                    log_preview(&change.new_value)
                );
            }
            return record;
        }

        match self
            .client
            .write_cells(&config.worksheet, position, &write_plan.to_cell_writes())
            .await
        {
            Ok(()) => {
                info!(row = position, cells = write_plan.len(), new_row = (kind == RowKind::New), "Row written");
                record.outcome = RowOutcome::Written;
            }
            Err(e) => {
                error!(row = position, "Write failed: {}", e);
                record.outcome = RowOutcome::Errored;
                record.error_kind = Some(e.kind());
                record.error = Some(e.to_string());
            }
        }

        record
    }
}

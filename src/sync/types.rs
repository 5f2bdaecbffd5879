use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncErrorKind;

/// Whether the aligned remote row already existed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Existing,
    New,
}

/// What happened to one row during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    Written,
    /// No watch column differed
    Unchanged,
    /// Changes planned but not written (dry run)
    DryRun,
    Errored,
}

/// One planned cell change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    pub column: String,
    pub old_value: String,
    pub new_value: String,
    pub truncated: bool,
}

/// Outcome of evaluating one source row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    /// 1-based row in the remote worksheet
    pub position: u32,
    /// Index into the source batch after header-skip
    pub source_index: usize,
    pub kind: RowKind,
    pub changes: Vec<CellChange>,
    pub outcome: RowOutcome,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<SyncErrorKind>,
}

/// Aggregated result of one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub records: Vec<SyncRecord>,
    /// Existing rows patched
    pub written: u32,
    /// New rows populated
    pub appended: u32,
    pub unchanged: u32,
    pub planned: u32,
    pub errored: u32,
    pub truncated_cells: u32,
    pub cancelled: bool,
}

impl PassReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            records: Vec::new(),
            written: 0,
            appended: 0,
            unchanged: 0,
            planned: 0,
            errored: 0,
            truncated_cells: 0,
            cancelled: false,
        }
    }

    /// Add a record and update the counters
    pub fn push(&mut self, record: SyncRecord) {
        match record.outcome {
            RowOutcome::Written => match record.kind {
                RowKind::Existing => self.written += 1,
                RowKind::New => self.appended += 1,
            },
            RowOutcome::Unchanged => self.unchanged += 1,
            RowOutcome::DryRun => self.planned += 1,
            RowOutcome::Errored => self.errored += 1,
        }
        self.truncated_cells += record.changes.iter().filter(|c| c.truncated).count() as u32;
        self.records.push(record);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Rows that were (or under dry run, would have been) written
    pub fn changed_rows(&self) -> u32 {
        self.written + self.appended + self.planned
    }

    pub fn is_success(&self, max_row_errors: u32) -> bool {
        self.errored <= max_row_errors
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.dry_run {
            parts.push(format!("{} planned", self.planned));
        } else {
            parts.push(format!("{} updated", self.written));
            parts.push(format!("{} new", self.appended));
        }
        parts.push(format!("{} unchanged", self.unchanged));
        parts.push(format!("{} errored", self.errored));
        if self.truncated_cells > 0 {
            parts.push(format!("{} truncated cell{}", self.truncated_cells, if self.truncated_cells > 1 { "s" } else { "" }));
        }
        if self.cancelled {
            parts.push("cancelled".to_string());
        }

        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: RowKind, outcome: RowOutcome, truncated: bool) -> SyncRecord {
        SyncRecord {
            position: 2,
            source_index: 0,
            kind,
            changes: vec![CellChange {
                column: "B".to_string(),
                old_value: String::new(),
                new_value: "v".to_string(),
                truncated,
            }],
            outcome,
            error: None,
            error_kind: None,
        }
    }

    #[test]
    fn test_counters() {
        let mut report = PassReport::new(false);
        report.push(record(RowKind::Existing, RowOutcome::Written, true));
        report.push(record(RowKind::New, RowOutcome::Written, false));
        report.push(record(RowKind::Existing, RowOutcome::Unchanged, false));
        report.push(record(RowKind::Existing, RowOutcome::Errored, false));
        report.finish();

        assert_eq!(report.written, 1);
        assert_eq!(report.appended, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(report.truncated_cells, 1);
        assert_eq!(report.changed_rows(), 2);
        assert!(!report.is_success(0));
        assert!(report.is_success(1));
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_summary_text() {
        let mut report = PassReport::new(true);
        report.push(record(RowKind::Existing, RowOutcome::DryRun, false));
        let summary = report.summary();
        assert!(summary.contains("1 planned"));
        assert!(summary.contains("0 errored"));
    }

    #[test]
    fn test_report_serializes() {
        let mut report = PassReport::new(false);
        report.push(record(RowKind::New, RowOutcome::Written, false));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["records"][0]["kind"], "new");
        assert_eq!(json["records"][0]["outcome"], "written");
        assert_eq!(json["appended"], 1);
    }
}

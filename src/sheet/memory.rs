use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use super::client::SheetClient;
use super::columns::column_letter_to_index;
use super::types::{CellWrite, Row};
use crate::error::{Result, SyncError};

/// In-memory worksheet used by tests
#[derive(Debug, Default)]
pub struct MemorySheet {
    rows: Mutex<Vec<Row>>,
    failing_rows: Mutex<HashSet<u32>>,
    fail_reads: Mutex<bool>,
    reads: Mutex<u32>,
    read_delay: Mutex<Option<Duration>>,
    writes: Mutex<Vec<(u32, Vec<CellWrite>)>>,
}

impl MemorySheet {
    /// Create a sheet whose rows start at row 1 (headers included)
    pub fn with_rows(rows: Vec<Vec<&str>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(String::from).collect())
            .collect();
        MemorySheet {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn fail_writes_to(&self, row_position: u32) {
        self.failing_rows.lock().unwrap().insert(row_position);
    }

    /// Let writes to every row succeed again
    pub fn heal_writes(&self) {
        self.failing_rows.lock().unwrap().clear();
    }

    /// Make each `read_rows` call take at least `delay`
    pub fn slow_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }

    pub fn read_count(&self) -> u32 {
        *self.reads.lock().unwrap()
    }

    /// Every successful write call: (row position, cells)
    pub fn writes(&self) -> Vec<(u32, Vec<CellWrite>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SheetClient for MemorySheet {
    async fn read_rows(&self, _worksheet: &str, skip_header_rows: u32) -> Result<Vec<Row>> {
        *self.reads.lock().unwrap() += 1;
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_reads.lock().unwrap() {
            return Err(SyncError::fetch("simulated read failure"));
        }

        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .skip(skip_header_rows as usize)
            .cloned()
            .collect())
    }

    async fn write_cells(&self, _worksheet: &str, row_position: u32, cells: &[CellWrite]) -> Result<()> {
        if self.failing_rows.lock().unwrap().contains(&row_position) {
            return Err(SyncError::write(row_position, "simulated write failure"));
        }

        let mut rows = self.rows.lock().unwrap();
        let row_index = (row_position - 1) as usize;
        if rows.len() <= row_index {
            rows.resize(row_index + 1, Vec::new());
        }

        let row = &mut rows[row_index];
        for cell in cells {
            let col = column_letter_to_index(&cell.column)
                .ok_or_else(|| SyncError::write(row_position, format!("bad column {}", cell.column)))?;
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col] = cell.value.clone();
        }

        self.writes.lock().unwrap().push((row_position, cells.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_cell_grows_sheet() {
        let sheet = MemorySheet::with_rows(vec![vec!["header"]]);
        sheet.write_cell("Sheet1", 3, "C", "x").await.unwrap();

        let rows = sheet.rows();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], vec!["", "", "x"]);

        let remote = sheet.read_rows("Sheet1", 1).await.unwrap();
        assert_eq!(remote.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_row_rejects_write() {
        let sheet = MemorySheet::default();
        sheet.fail_writes_to(2);
        let err = sheet.write_cell("Sheet1", 2, "A", "x").await.unwrap_err();
        assert!(matches!(err, SyncError::Write { row: 2, .. }));
        assert!(sheet.writes().is_empty());
    }
}

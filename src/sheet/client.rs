use async_trait::async_trait;

use super::types::{CellWrite, Row};
use crate::error::Result;

/// Read/write access to a single remote worksheet.
///
/// Row positions are 1-based sheet row numbers.
#[async_trait]
pub trait SheetClient: Send + Sync {
    /// Rows of `worksheet` below the first `skip_header_rows` rows, in order
    async fn read_rows(&self, worksheet: &str, skip_header_rows: u32) -> Result<Vec<Row>>;

    /// Write several cells of one row. Succeeds or fails as one outcome.
    async fn write_cells(&self, worksheet: &str, row_position: u32, cells: &[CellWrite]) -> Result<()>;

    async fn write_cell(&self, worksheet: &str, row_position: u32, column: &str, value: &str) -> Result<()> {
        self.write_cells(worksheet, row_position, &[CellWrite::new(column, value)])
            .await
    }
}

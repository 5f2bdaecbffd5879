//! Row sources: where candidate rows come from.

pub mod directory;
pub mod watcher;

pub use directory::{compute_checksum, parse_delimited, DirectorySource};
pub use watcher::InputWatcher;

use crate::error::Result;
use crate::sheet::Row;

/// Yields batches of raw rows, before any header-skip
pub trait RowSource: Send {
    /// Rows from newly arrived input, or an empty batch when nothing is new
    fn next_batch(&mut self) -> Result<Vec<Row>>;
}

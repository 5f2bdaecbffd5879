//! Remote worksheet access and the cell-level helpers shared by the sync engine.
//!
//! This module provides:
//! - Column letter parsing and the column-to-field mapper
//! - Cell normalization (sanitizing and truncation)
//! - The `SheetClient` trait and its Sheets API implementation

pub mod types;
pub mod columns;
pub mod normalize;
pub mod client;
pub mod google;

#[cfg(test)]
pub mod memory;

// Re-export commonly used types and functions
pub use types::*;
pub use columns::{parse_column_letter, ColumnMapper, ColumnRef};
pub use normalize::{normalize, normalize_field, NormalizedCell, DEFAULT_MAX_CELL_LENGTH};
pub use client::SheetClient;
pub use google::{load_access_token, GoogleSheetsClient, DEFAULT_API_BASE_URL};

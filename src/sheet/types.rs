use serde::{Deserialize, Serialize};

/// One logical record: ordered cell values, indexed from 0
pub type Row = Vec<String>;

/// A single cell write on a remote row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellWrite {
    pub column: String, // Column letter (A, B, C, etc.)
    pub value: String,
}

impl CellWrite {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        CellWrite {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// A1 range for a single cell, e.g. `'Sheet 1'!B7`
pub fn cell_range(worksheet: &str, column: &str, row_position: u32) -> String {
    format!("{}!{}{}", quote_worksheet(worksheet), column, row_position)
}

/// Quote a worksheet title for use in A1 notation
pub fn quote_worksheet(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

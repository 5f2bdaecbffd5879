use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::sheet::{ColumnRef, DEFAULT_API_BASE_URL, DEFAULT_MAX_CELL_LENGTH};

/// What wakes the watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// File arrival in the input directory, with the interval as a fallback poll
    #[default]
    Files,
    /// Fixed interval only
    Interval,
}

/// Settings as written in the config file, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    pub spreadsheet_id: Option<String>,
    pub worksheet: String,
    pub credentials_path: Option<PathBuf>,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Minimum spacing between any two API requests
    pub request_delay_ms: u64,

    pub input_dir: Option<PathBuf>,
    pub file_pattern: String,
    /// Field delimiter; defaults to `,` for .csv files and tab otherwise
    pub delimiter: Option<char>,

    pub watch_columns: Vec<String>,
    pub update_columns: Vec<String>,
    pub replacements: BTreeMap<String, String>,
    pub column_mapping: BTreeMap<String, usize>,
    pub max_cell_length: usize,
    pub skip_header_rows: u32,
    pub max_row_errors: u32,

    pub watch: bool,
    pub dry_run: bool,
    pub trigger: Trigger,
    pub poll_interval_secs: u64,
    pub debounce_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            worksheet: "Sheet1".to_string(),
            credentials_path: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 10,
            max_retries: 3,
            request_delay_ms: 1_000,
            input_dir: None,
            file_pattern: "*.txt".to_string(),
            delimiter: None,
            watch_columns: Vec::new(),
            update_columns: Vec::new(),
            replacements: BTreeMap::new(),
            column_mapping: BTreeMap::new(),
            max_cell_length: DEFAULT_MAX_CELL_LENGTH,
            skip_header_rows: 0,
            max_row_errors: 0,
            watch: false,
            dry_run: false,
            trigger: Trigger::Files,
            poll_interval_secs: 30,
            debounce_ms: 500,
        }
    }
}

/// Overrides given on the command line; they win over env and file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub dry_run: bool,
    pub watch: bool,
    pub worksheet: Option<String>,
}

/// Validated, immutable configuration for one process run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub credentials_path: PathBuf,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub request_delay: Duration,

    pub input_dir: PathBuf,
    pub file_pattern: glob::Pattern,
    pub delimiter: Option<u8>,

    pub watch_columns: Vec<ColumnRef>,
    pub update_columns: Vec<ColumnRef>,
    /// Replacement literals keyed by column position
    pub replacements: BTreeMap<usize, String>,
    pub max_cell_length: usize,
    pub skip_header_rows: u32,
    pub max_row_errors: u32,

    pub watch: bool,
    pub dry_run: bool,
    pub trigger: Trigger,
    pub poll_interval: Duration,
    pub debounce: Duration,
}

impl SyncConfig {
    /// 1-based sheet row for the aligned source row `index` (after header-skip)
    pub fn row_position(&self, index: usize) -> u32 {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        self.skip_header_rows.saturating_add(index).saturating_add(1)
    }
}

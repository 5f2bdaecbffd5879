use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{CliOverrides, SyncConfig, SyncSettings};
use crate::error::{Result, SyncError};
use crate::sheet::{parse_column_letter, ColumnMapper};

pub const ENV_SPREADSHEET_ID: &str = "SHEET_SYNC_SPREADSHEET_ID";
pub const ENV_WORKSHEET: &str = "SHEET_SYNC_WORKSHEET";
pub const ENV_CREDENTIALS: &str = "SHEET_SYNC_CREDENTIALS";
pub const ENV_DRY_RUN: &str = "SHEET_SYNC_DRY_RUN";

/// `<config dir>/sheet-sync/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sheet-sync").join("config.toml"))
}

/// Load settings from file, environment and CLI flags, then validate them
pub fn load_config(path: Option<&Path>, cli: &CliOverrides) -> Result<SyncConfig> {
    // A missing .env file is fine
    if let Ok(env_file) = dotenvy::dotenv() {
        debug!(path = %env_file.display(), "Loaded environment file");
    }

    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()
            .ok_or_else(|| SyncError::configuration("No config path given and no config directory available"))?,
    };

    let mut settings = read_settings(&path)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    apply_cli_overrides(&mut settings, cli);

    resolve_settings(settings)
}

/// Parse a TOML (or `.json`) settings file. Relative paths in the file are
/// resolved against the file's directory.
pub fn read_settings(path: &Path) -> Result<SyncSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SyncError::configuration(format!("Failed to read config '{}': {}", path.display(), e))
    })?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut settings: SyncSettings = if is_json {
        serde_json::from_str(&content)
            .map_err(|e| SyncError::configuration(format!("Invalid config '{}': {}", path.display(), e)))?
    } else {
        toml::from_str(&content)
            .map_err(|e| SyncError::configuration(format!("Invalid config '{}': {}", path.display(), e)))?
    };

    if let Some(base) = path.parent() {
        settings.input_dir = settings.input_dir.map(|p| relative_to(base, p));
        settings.credentials_path = settings.credentials_path.map(|p| relative_to(base, p));
    }

    Ok(settings)
}

fn relative_to(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

/// Apply `SHEET_SYNC_*` overrides using `lookup` to read variables
pub fn apply_env_overrides<F>(settings: &mut SyncSettings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(id) = lookup(ENV_SPREADSHEET_ID) {
        settings.spreadsheet_id = Some(id);
    }
    if let Some(worksheet) = lookup(ENV_WORKSHEET) {
        settings.worksheet = worksheet;
    }
    if let Some(credentials) = lookup(ENV_CREDENTIALS) {
        settings.credentials_path = Some(PathBuf::from(credentials));
    }
    if let Some(dry_run) = lookup(ENV_DRY_RUN) {
        settings.dry_run = parse_flag(&dry_run).ok_or_else(|| {
            SyncError::configuration(format!("{} must be a boolean, got '{}'", ENV_DRY_RUN, dry_run))
        })?;
    }

    Ok(())
}

pub fn apply_cli_overrides(settings: &mut SyncSettings, cli: &CliOverrides) {
    if cli.dry_run {
        settings.dry_run = true;
    }
    if cli.watch {
        settings.watch = true;
    }
    if let Some(ref worksheet) = cli.worksheet {
        settings.worksheet = worksheet.clone();
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate settings and resolve every column reference
pub fn resolve_settings(settings: SyncSettings) -> Result<SyncConfig> {
    let spreadsheet_id = required(settings.spreadsheet_id, "spreadsheet_id")?;
    let credentials_path = required(settings.credentials_path, "credentials_path")?;
    let input_dir = required(settings.input_dir, "input_dir")?;

    if settings.worksheet.trim().is_empty() {
        return Err(SyncError::configuration("worksheet must not be empty"));
    }
    if settings.watch_columns.is_empty() {
        return Err(SyncError::configuration("watch_columns must name at least one column"));
    }
    if settings.update_columns.is_empty() {
        return Err(SyncError::configuration("update_columns must name at least one column"));
    }
    if settings.max_cell_length == 0 {
        return Err(SyncError::configuration("max_cell_length must be greater than 0"));
    }
    if settings.poll_interval_secs == 0 {
        return Err(SyncError::configuration("poll_interval_secs must be greater than 0"));
    }

    let file_pattern = glob::Pattern::new(&settings.file_pattern).map_err(|e| {
        SyncError::configuration(format!("Invalid file_pattern '{}': {}", settings.file_pattern, e))
    })?;

    let delimiter = match settings.delimiter {
        Some(c) if c.is_ascii() => Some(c as u8),
        Some(c) => {
            return Err(SyncError::configuration(format!(
                "delimiter must be a single ASCII character, got '{}'",
                c
            )))
        }
        None => None,
    };

    let mapper = ColumnMapper::new(&settings.column_mapping)?;
    let watch_columns = mapper.resolve_all(&settings.watch_columns)?;
    let update_columns = mapper.resolve_all(&settings.update_columns)?;

    let mut replacements = BTreeMap::new();
    for (raw, value) in settings.replacements {
        let (letter, position) = parse_column_letter(&raw)?;
        if replacements.contains_key(&position) {
            return Err(SyncError::configuration(format!(
                "Replacement for column {} is given more than once",
                letter
            )));
        }
        if !update_columns.iter().any(|c| c.position == position) {
            warn!(column = %letter, "Replacement for a column outside update_columns is never written");
        }
        replacements.insert(position, value);
    }

    Ok(SyncConfig {
        spreadsheet_id,
        worksheet: settings.worksheet,
        credentials_path,
        api_base_url: settings.api_base_url,
        request_timeout: Duration::from_secs(settings.request_timeout_secs),
        max_retries: settings.max_retries,
        request_delay: Duration::from_millis(settings.request_delay_ms),
        input_dir,
        file_pattern,
        delimiter,
        watch_columns,
        update_columns,
        replacements,
        max_cell_length: settings.max_cell_length,
        skip_header_rows: settings.skip_header_rows,
        max_row_errors: settings.max_row_errors,
        watch: settings.watch,
        dry_run: settings.dry_run,
        trigger: settings.trigger,
        poll_interval: Duration::from_secs(settings.poll_interval_secs),
        debounce: Duration::from_millis(settings.debounce_ms),
    })
}

fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| SyncError::configuration(format!("Missing required setting '{}'", name)))
}

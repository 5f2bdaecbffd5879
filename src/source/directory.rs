use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use super::RowSource;
use crate::error::{Result, SyncError};
use crate::sheet::Row;

/// A candidate input file found during a scan
#[derive(Debug, Clone)]
struct InputFile {
    path: PathBuf,
    modified: SystemTime,
    checksum: String,
}

/// Reads delimited text files dropped into a directory.
///
/// Each file is treated as a full snapshot of the table. A batch is the
/// newest file whose contents have not been seen yet; older unseen files
/// from the same scan are skipped as superseded.
pub struct DirectorySource {
    dir: PathBuf,
    pattern: glob::Pattern,
    delimiter: Option<u8>,
    seen: HashMap<PathBuf, String>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, pattern: glob::Pattern, delimiter: Option<u8>) -> Self {
        DirectorySource {
            dir: dir.into(),
            pattern,
            delimiter,
            seen: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files matching the pattern whose checksum differs from the last one seen
    fn scan(&self) -> Result<Vec<InputFile>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            SyncError::source(format!("Failed to read input dir '{}': {}", self.dir.display(), e))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| self.pattern.matches(n))
                .unwrap_or(false);
            if !matches {
                continue;
            }

            let checksum = compute_checksum(&path)?;
            if self.seen.get(&path) == Some(&checksum) {
                continue;
            }

            files.push(InputFile {
                path,
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                checksum,
            });
        }

        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    }

    fn delimiter_for(&self, path: &Path) -> u8 {
        if let Some(d) = self.delimiter {
            return d;
        }
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            b','
        } else {
            b'\t'
        }
    }
}

impl RowSource for DirectorySource {
    fn next_batch(&mut self) -> Result<Vec<Row>> {
        let mut files = self.scan()?;
        let latest = match files.pop() {
            Some(latest) => latest,
            None => return Ok(Vec::new()),
        };

        for older in files {
            info!(path = %older.path.display(), "Skipping superseded input file");
            self.seen.insert(older.path, older.checksum);
        }

        // Not marked seen until parsed, so a half-written file is retried
        let rows = parse_delimited(&latest.path, self.delimiter_for(&latest.path))?;
        info!(path = %latest.path.display(), rows = rows.len(), "Read input file");
        self.seen.insert(latest.path, latest.checksum);

        Ok(rows)
    }
}

/// Parse a delimited text file into rows, without header handling
pub fn parse_delimited(path: &Path, delimiter: u8) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .quoting(delimiter == b',')
        .from_path(path)
        .map_err(|e| SyncError::source(format!("Failed to open '{}': {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            SyncError::source(format!("Failed to parse '{}' record {}: {}", path.display(), line + 1, e))
        })?;

        let mut row: Row = record.iter().map(str::to_string).collect();
        if line == 0 {
            if let Some(first) = row.first_mut() {
                if let Some(stripped) = first.strip_prefix('\u{feff}') {
                    *first = stripped.to_string();
                }
            }
        }
        rows.push(row);
    }

    debug!(path = %path.display(), rows = rows.len(), "Parsed delimited file");
    Ok(rows)
}

/// Compute SHA-256 checksum of a file
pub fn compute_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| {
        SyncError::source(format!("Failed to open '{}' for checksum: {}", path.display(), e))
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| {
            SyncError::source(format!("Failed to read '{}' for checksum: {}", path.display(), e))
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

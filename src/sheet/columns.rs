use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::error::{Result, SyncError};

/// A resolved column: its letter, its position in the sheet and the
/// field of the source row that feeds it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub letter: String,
    /// Zero-based column position in the remote sheet
    pub position: usize,
    /// Zero-based field index into a source row
    pub field: usize,
}

fn column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})$").expect("valid column pattern"))
}

/// Parse a column reference such as `"B"`, `"aa"` or `"$C"` into its
/// canonical upper-case letter and zero-based position
pub fn parse_column_letter(raw: &str) -> Result<(String, usize)> {
    let caps = column_pattern()
        .captures(raw.trim())
        .ok_or_else(|| SyncError::configuration(format!("Invalid column reference: '{}'", raw)))?;

    let letter = caps[1].to_ascii_uppercase();
    let position = column_letter_to_index(&letter)
        .ok_or_else(|| SyncError::configuration(format!("Invalid column reference: '{}'", raw)))?;

    Ok((letter, position))
}

/// Convert an upper-case column letter (A, B, ..., Z, AA, ...) to a 0-based index
pub fn column_letter_to_index(letter: &str) -> Option<usize> {
    if letter.is_empty() {
        return None;
    }

    let mut n: usize = 0;
    for c in letter.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        n = n.checked_mul(26)?.checked_add((c as u8 - b'A') as usize + 1)?;
    }

    Some(n - 1)
}

/// Maps column letters to source-row fields.
///
/// Columns with an explicit `column_mapping` entry read that field; every
/// other column reads the field at its own position.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapper {
    overrides: HashMap<usize, usize>,
}

impl ColumnMapper {
    pub fn new(column_mapping: &BTreeMap<String, usize>) -> Result<Self> {
        let mut overrides = HashMap::new();

        for (raw, &field) in column_mapping {
            let (letter, position) = parse_column_letter(raw)?;
            if let Some(previous) = overrides.insert(position, field) {
                if previous != field {
                    return Err(SyncError::configuration(format!(
                        "Column {} is mapped to both field {} and field {}",
                        letter, previous, field
                    )));
                }
            }
        }

        Ok(ColumnMapper { overrides })
    }

    /// Source field index for a column letter
    pub fn resolve(&self, letter: &str) -> Result<usize> {
        Ok(self.column(letter)?.field)
    }

    pub fn column(&self, letter: &str) -> Result<ColumnRef> {
        let (letter, position) = parse_column_letter(letter)?;
        let field = self.overrides.get(&position).copied().unwrap_or(position);

        Ok(ColumnRef {
            letter,
            position,
            field,
        })
    }

    /// Resolve a set of letters, deduplicated and ordered by sheet position
    pub fn resolve_all(&self, letters: &[String]) -> Result<Vec<ColumnRef>> {
        let mut seen = BTreeSet::new();
        let mut columns = Vec::new();

        for letter in letters {
            let column = self.column(letter)?;
            if seen.insert(column.position) {
                columns.push(column);
            }
        }

        columns.sort_by_key(|c| c.position);
        Ok(columns)
    }
}

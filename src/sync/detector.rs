use crate::sheet::{normalize_field, ColumnRef, Row};

/// Result of comparing a source row with its aligned remote row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// No remote row at this position yet
    NewRow,
    /// At least one watch column differs; holds the differing letters
    Changed(Vec<String>),
    Unchanged,
}

impl Detection {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Detection::Unchanged)
    }
}

/// Compare watch columns of `source_row` and `remote_row`.
///
/// The source value is read through the column's mapped field, the remote
/// value at the column's own position. Both sides are normalized and then
/// compared exactly, so case and whitespace differences count. A remote row
/// with no content at all is reported as `NewRow` when anything differs.
pub fn detect(
    source_row: &Row,
    remote_row: Option<&Row>,
    watch_columns: &[ColumnRef],
    max_cell_length: usize,
) -> Detection {
    let remote_row = match remote_row {
        Some(row) => row,
        None => return Detection::NewRow,
    };

    let changed: Vec<String> = watch_columns
        .iter()
        .filter(|column| {
            let source = normalize_field(source_row, column.field, max_cell_length);
            let remote = normalize_field(remote_row, column.position, max_cell_length);
            source.value != remote.value
        })
        .map(|column| column.letter.clone())
        .collect();

    if changed.is_empty() {
        Detection::Unchanged
    } else if is_blank(remote_row, max_cell_length) {
        // A position left empty (e.g. by a failed write) is filled like a new row
        Detection::NewRow
    } else {
        Detection::Changed(changed)
    }
}

fn is_blank(row: &Row, max_cell_length: usize) -> bool {
    (0..row.len()).all(|i| normalize_field(row, i, max_cell_length).value.is_empty())
}

pub fn has_changed(
    source_row: &Row,
    remote_row: Option<&Row>,
    watch_columns: &[ColumnRef],
    max_cell_length: usize,
) -> bool {
    detect(source_row, remote_row, watch_columns, max_cell_length).is_changed()
}

use std::collections::BTreeMap;

use super::types::CellChange;
use crate::sheet::{normalize, normalize_field, CellWrite, ColumnRef, Row};

/// A value to be written into one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCell {
    pub column: ColumnRef,
    pub value: String,
    pub truncated: bool,
}

/// The writes for one row, keyed by column position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePlan {
    cells: BTreeMap<usize, PlannedCell>,
}

impl WritePlan {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = &PlannedCell> {
        self.cells.values()
    }

    /// Column position → value
    pub fn values(&self) -> BTreeMap<usize, String> {
        self.cells
            .iter()
            .map(|(&position, cell)| (position, cell.value.clone()))
            .collect()
    }

    pub fn to_cell_writes(&self) -> Vec<CellWrite> {
        self.cells
            .values()
            .map(|cell| CellWrite::new(cell.column.letter.clone(), cell.value.clone()))
            .collect()
    }

    /// Pair each planned value with the current remote value
    pub fn changes(&self, remote_row: Option<&Row>, max_cell_length: usize) -> Vec<CellChange> {
        self.cells
            .values()
            .map(|cell| CellChange {
                column: cell.column.letter.clone(),
                old_value: remote_row
                    .map(|row| normalize_field(row, cell.column.position, max_cell_length).value)
                    .unwrap_or_default(),
                new_value: cell.value.clone(),
                truncated: cell.truncated,
            })
            .collect()
    }

    fn insert(&mut self, cell: PlannedCell) {
        self.cells.insert(cell.column.position, cell);
    }
}

/// Plan the writes for a changed row.
///
/// Every update column gets its replacement literal if one is configured,
/// otherwise the normalized source value from its mapped field.
pub fn plan(
    source_row: &Row,
    update_columns: &[ColumnRef],
    replacements: &BTreeMap<usize, String>,
    max_cell_length: usize,
) -> WritePlan {
    let mut plan = WritePlan::default();

    for column in update_columns {
        let normalized = match replacements.get(&column.position) {
            Some(literal) => normalize(Some(literal), max_cell_length),
            None => normalize_field(source_row, column.field, max_cell_length),
        };

        plan.insert(PlannedCell {
            column: column.clone(),
            value: normalized.value,
            truncated: normalized.truncated,
        });
    }

    plan
}

/// Plan the writes for a row that does not exist remotely yet.
///
/// Update columns are planned as for a changed row; watch columns outside
/// the update set are filled from the source so the next pass sees the
/// row as unchanged.
pub fn plan_new_row(
    source_row: &Row,
    update_columns: &[ColumnRef],
    watch_columns: &[ColumnRef],
    replacements: &BTreeMap<usize, String>,
    max_cell_length: usize,
) -> WritePlan {
    let mut plan = plan(source_row, update_columns, replacements, max_cell_length);

    for column in watch_columns {
        if plan.cells.contains_key(&column.position) {
            continue;
        }
        let normalized = normalize_field(source_row, column.field, max_cell_length);
        plan.insert(PlannedCell {
            column: column.clone(),
            value: normalized.value,
            truncated: normalized.truncated,
        });
    }

    plan
}

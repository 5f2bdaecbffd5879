use serde::{Deserialize, Serialize};

/// Default maximum characters per cell (the Sheets API limit)
pub const DEFAULT_MAX_CELL_LENGTH: usize = 50_000;

/// A cell value after normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCell {
    pub value: String,
    pub truncated: bool,
}

/// Normalize a raw field value for comparison and writing.
///
/// Line endings become `\n`, other control characters except tab are
/// dropped, and the result is cut to `max_length` characters. Missing
/// fields normalize to an empty string.
pub fn normalize(raw: Option<&str>, max_length: usize) -> NormalizedCell {
    let raw = match raw {
        Some(raw) => raw,
        None => {
            return NormalizedCell {
                value: String::new(),
                truncated: false,
            }
        }
    };

    let mut value = String::with_capacity(raw.len().min(max_length));
    let mut count = 0;
    let mut truncated = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        let c = match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                '\n'
            }
            '\n' | '\t' => c,
            c if c.is_control() => continue,
            c => c,
        };

        if count == max_length {
            truncated = true;
            break;
        }
        value.push(c);
        count += 1;
    }

    NormalizedCell { value, truncated }
}

/// Normalized value of field `index` in `row`
pub fn normalize_field(row: &[String], index: usize, max_length: usize) -> NormalizedCell {
    normalize(row.get(index).map(String::as_str), max_length)
}

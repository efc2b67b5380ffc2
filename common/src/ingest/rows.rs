// Row-level mechanics of CSV ingestion: header normalization, positional
// keying, blank-row detection, and bounded batch reads.

use crate::errors::IngestError;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Read;

/// Normalize one header cell: trim, anything outside `[A-Za-z0-9_]`
/// becomes `_`, lowercased.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// A row is blank when every field trims to empty
pub fn is_blank_row(record: &csv::StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Map one record to its field map. Header names key the values where
/// present and non-empty; missing positions default to empty strings and
/// extra or unnamed positions are keyed `col_<n>`.
pub fn map_row(record: &csv::StringRecord, headers: Option<&[String]>) -> HashMap<String, String> {
    let width = headers.map(|h| h.len()).unwrap_or(0).max(record.len());
    let mut fields = HashMap::with_capacity(width);

    for i in 0..width {
        let key = match headers.and_then(|h| h.get(i)) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("col_{}", i),
        };
        let value = record.get(i).unwrap_or("").trim().to_string();
        fields.insert(key, value);
    }

    fields
}

/// One emitted row of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    /// 0-based position over data rows of the source
    pub row_index: i64,
    pub fields: HashMap<String, String>,
}

/// Result of reading one bounded slice of the source
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub rows: Vec<BatchRow>,
    /// Blank rows encountered inside the slice
    pub skipped: usize,
    /// Data rows consumed from the slice: emitted plus skipped. The
    /// continuation offset advances by this, never by emitted alone, so
    /// row indices stay unique across batches.
    pub consumed: usize,
    pub end_of_input: bool,
}

/// Read at most `batch_size` non-blank data rows starting at data-row
/// index `offset` (0-based, header excluded).
pub fn read_batch<R: Read>(
    reader: R,
    has_header: bool,
    offset: i64,
    batch_size: usize,
) -> Result<RawBatch, IngestError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = csv_reader.records();

    let headers: Option<Vec<String>> = if has_header {
        match records.next() {
            Some(record) => {
                let record = record.map_err(|e| IngestError::Parse(e.to_string()))?;
                Some(record.iter().map(normalize_header).collect())
            }
            None => {
                return Ok(RawBatch {
                    end_of_input: true,
                    ..Default::default()
                })
            }
        }
    } else {
        None
    };

    // Skip to the requested data-row offset
    let mut index: i64 = 0;
    while index < offset {
        match records.next() {
            Some(Ok(_)) => index += 1,
            Some(Err(e)) => return Err(IngestError::Parse(e.to_string())),
            None => {
                return Ok(RawBatch {
                    end_of_input: true,
                    ..Default::default()
                })
            }
        }
    }

    let mut batch = RawBatch::default();
    while batch.rows.len() < batch_size {
        let record = match records.next() {
            Some(result) => result.map_err(|e| IngestError::Parse(e.to_string()))?,
            None => {
                batch.end_of_input = true;
                return Ok(batch);
            }
        };

        batch.consumed += 1;
        if is_blank_row(&record) {
            batch.skipped += 1;
            index += 1;
            continue;
        }

        batch.rows.push(BatchRow {
            row_index: index,
            fields: map_row(&record, headers.as_deref()),
        });
        index += 1;
    }

    // Batch full; one peek decides whether a continuation is needed
    batch.end_of_input = records.next().is_none();
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Name "), "name");
        assert_eq!(normalize_header("First Name"), "first_name");
        assert_eq!(normalize_header("Topic/Area"), "topic_area");
        assert_eq!(normalize_header("already_ok_9"), "already_ok_9");
    }

    #[test]
    fn test_map_row_short_record_defaults_empty() {
        let headers = vec!["name".to_string(), "topic".to_string()];
        let record = csv::StringRecord::from(vec!["Alice"]);

        let fields = map_row(&record, Some(&headers));
        assert_eq!(fields.get("name").map(String::as_str), Some("Alice"));
        assert_eq!(fields.get("topic").map(String::as_str), Some(""));
    }

    #[test]
    fn test_map_row_extra_positions_keyed_positionally() {
        let headers = vec!["name".to_string()];
        let record = csv::StringRecord::from(vec!["Alice", "Go"]);

        let fields = map_row(&record, Some(&headers));
        assert_eq!(fields.get("name").map(String::as_str), Some("Alice"));
        assert_eq!(fields.get("col_1").map(String::as_str), Some("Go"));
    }

    #[test]
    fn test_map_row_blank_header_cell_keyed_positionally() {
        let headers = vec!["name".to_string(), String::new()];
        let record = csv::StringRecord::from(vec!["Alice", "Go"]);

        let fields = map_row(&record, Some(&headers));
        assert_eq!(fields.get("col_1").map(String::as_str), Some("Go"));
    }

    #[test]
    fn test_read_batch_with_header() {
        let data = "name,topic\nAlice,Go\nBob,Rust\n";
        let batch = read_batch(Cursor::new(data), true, 0, 10).unwrap();

        assert_eq!(batch.rows.len(), 2);
        assert!(batch.end_of_input);
        assert_eq!(batch.rows[0].row_index, 0);
        assert_eq!(
            batch.rows[0].fields.get("name").map(String::as_str),
            Some("Alice")
        );
        assert_eq!(
            batch.rows[1].fields.get("topic").map(String::as_str),
            Some("Rust")
        );
    }

    #[test]
    fn test_read_batch_without_header_uses_positional_keys() {
        let data = "Alice,Go\nBob,Rust\n";
        let batch = read_batch(Cursor::new(data), false, 0, 10).unwrap();

        assert_eq!(batch.rows.len(), 2);
        assert_eq!(
            batch.rows[0].fields.get("col_0").map(String::as_str),
            Some("Alice")
        );
        assert_eq!(
            batch.rows[1].fields.get("col_1").map(String::as_str),
            Some("Rust")
        );
    }

    #[test]
    fn test_blank_rows_skipped_and_counted() {
        let data = "name,topic\nAlice,Go\n , \nBob,Rust\n";
        let batch = read_batch(Cursor::new(data), true, 0, 10).unwrap();

        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.consumed, 3);
        // Blank rows still occupy a row index
        assert_eq!(batch.rows[1].row_index, 2);
    }

    #[test]
    fn test_batch_windows_cover_file_in_three_calls() {
        let data = "name\nr0\nr1\nr2\nr3\nr4\n";

        let first = read_batch(Cursor::new(data), true, 0, 2).unwrap();
        assert_eq!(first.rows.len(), 2);
        assert!(!first.end_of_input);
        assert_eq!(first.consumed, 2);

        let second = read_batch(Cursor::new(data), true, 2, 2).unwrap();
        assert_eq!(second.rows.len(), 2);
        assert!(!second.end_of_input);

        let third = read_batch(Cursor::new(data), true, 4, 2).unwrap();
        assert_eq!(third.rows.len(), 1);
        assert!(third.end_of_input);
        assert_eq!(third.rows[0].row_index, 4);
    }

    #[test]
    fn test_exact_batch_boundary_detects_end_of_input() {
        let data = "name\nr0\nr1\n";
        let batch = read_batch(Cursor::new(data), true, 0, 2).unwrap();

        assert_eq!(batch.rows.len(), 2);
        assert!(batch.end_of_input);
    }

    #[test]
    fn test_offset_past_end_of_input() {
        let data = "name\nr0\n";
        let batch = read_batch(Cursor::new(data), true, 5, 2).unwrap();

        assert!(batch.rows.is_empty());
        assert!(batch.end_of_input);
    }
}

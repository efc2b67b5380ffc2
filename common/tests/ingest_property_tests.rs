// Property-based tests for batch CSV ingestion

use common::ingest::rows::read_batch;
use proptest::prelude::*;
use std::io::Cursor;

/// One generated source row: two cells, either of which may be blank
fn row_strategy() -> impl Strategy<Value = (String, String)> {
    ("[a-zA-Z0-9 ]{0,10}", "[a-zA-Z0-9 ]{0,10}")
}

fn to_csv(rows: &[(String, String)]) -> String {
    let mut out = String::from("name,topic\n");
    for (a, b) in rows {
        out.push_str(&format!("{},{}\n", a, b));
    }
    out
}

fn is_blank(row: &(String, String)) -> bool {
    row.0.trim().is_empty() && row.1.trim().is_empty()
}

proptest! {
    /// Walking a file in batch windows emits every non-blank row exactly
    /// once, with unique monotonically increasing row indices, and the
    /// continuation offset advances by consumed rows.
    #[test]
    fn property_batch_windows_partition_the_file(
        rows in prop::collection::vec(row_strategy(), 0..40),
        batch_size in 1usize..10,
    ) {
        let csv = to_csv(&rows);
        let expected_emitted = rows.iter().filter(|r| !is_blank(r)).count();

        let mut offset = 0i64;
        let mut emitted_indices = Vec::new();
        let mut total_skipped = 0usize;
        let mut calls = 0usize;

        loop {
            calls += 1;
            prop_assert!(calls < 1000, "batch walk did not terminate");

            let batch = read_batch(Cursor::new(csv.as_bytes()), true, offset, batch_size).unwrap();
            for row in &batch.rows {
                emitted_indices.push(row.row_index);
            }
            total_skipped += batch.skipped;
            prop_assert_eq!(batch.rows.len() + batch.skipped, batch.consumed);

            offset += batch.consumed as i64;
            if batch.end_of_input {
                break;
            }
        }

        prop_assert_eq!(emitted_indices.len(), expected_emitted);
        prop_assert_eq!(emitted_indices.len() + total_skipped, rows.len());

        // Unique and strictly increasing across the whole walk
        for pair in emitted_indices.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    /// Emitted field values match the source cells, keyed by the
    /// normalized header names
    #[test]
    fn property_emitted_fields_match_source(
        rows in prop::collection::vec(row_strategy(), 1..20),
    ) {
        let csv = to_csv(&rows);
        let batch = read_batch(Cursor::new(csv.as_bytes()), true, 0, rows.len() + 1).unwrap();

        for emitted in &batch.rows {
            let source = &rows[emitted.row_index as usize];
            prop_assert_eq!(
                emitted.fields.get("name").map(String::as_str),
                Some(source.0.trim())
            );
            prop_assert_eq!(
                emitted.fields.get("topic").map(String::as_str),
                Some(source.1.trim())
            );
        }
    }
}

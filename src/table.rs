//! Header-checked CSV reading shared by the table loaders.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{LoaderError, Result};

/// A deserialized row together with the line it was read from.
#[derive(Debug)]
pub struct Row<T> {
    pub line: Option<u64>,
    pub value: T,
}

/// Reads every row of `reader` as `T`.
///
/// Fields and headers are trimmed. Every column in `required` must be present
/// in the header, otherwise the whole table is rejected. Rows that fail to
/// parse are pushed onto `warnings` and skipped.
pub fn read_rows<R: Read, T: DeserializeOwned>(
    reader: R,
    table: &str,
    required: &[&str],
    warnings: &mut Vec<LoaderError>,
) -> Result<Vec<Row<T>>> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let headers = rdr.headers()?.clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(LoaderError::MissingField {
                record: format!("{table} header"),
                field: (*column).to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line());
                warn!(table, line, error = %e, "Skipping unreadable record");
                warnings.push(LoaderError::MalformedRecord {
                    line,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let line = record.position().map(|p| p.line());
        match record.deserialize::<T>(Some(&headers)) {
            Ok(value) => rows.push(Row { line, value }),
            Err(e) => {
                warn!(table, line, error = %e, "Skipping record that does not deserialize");
                warnings.push(LoaderError::MalformedRecord {
                    line,
                    message: e.to_string(),
                });
            }
        }
    }

    debug!(table, rows = rows.len(), "Table read");
    Ok(rows)
}

/// Opens `path`, reads it fully with [`read_rows`] and closes it again.
pub fn read_rows_from_path<T: DeserializeOwned>(
    path: &Path,
    table: &str,
    required: &[&str],
    warnings: &mut Vec<LoaderError>,
) -> Result<Vec<Row<T>>> {
    let file = File::open(path)?;
    read_rows(file, table, required, warnings)
}

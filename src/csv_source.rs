//! Tabular input: a delimited file with a header row.
//!
//! The `text`, `label`, and `timestamp` columns are looked up by header
//! name. A missing column is not fatal: it is logged once and its values
//! are `None` for every row. Short rows are tolerated the same way.

use std::fs::File;
use std::path::Path;

use threatload_core::error::{IngestError, Result};
use threatload_core::models::Document;

pub const TEXT_COLUMN: &str = "text";
pub const LABEL_COLUMN: &str = "label";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Read every row of the CSV file at `path`.
///
/// The whole file is decoded before returning, so a malformed file fails
/// before anything has been submitted.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path).map_err(|e| IngestError::from_io(path, e))?;
    read_documents_from(file, path)
}

fn read_documents_from<R: std::io::Read>(input: R, path: &Path) -> Result<Vec<Document>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .clone();

    let column = |name: &str| {
        let idx = headers.iter().position(|h| h.trim() == name);
        if idx.is_none() {
            tracing::warn!(
                path = %path.display(),
                column = name,
                "input is missing a column; its values will be null"
            );
        }
        idx
    };
    let text_idx = column(TEXT_COLUMN);
    let label_idx = column(LABEL_COLUMN);
    let timestamp_idx = column(TIMESTAMP_COLUMN);

    let mut documents = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::to_string);
        documents.push(Document {
            text: field(text_idx),
            label: field(label_idx),
            timestamp: field(timestamp_idx),
        });
    }

    tracing::debug!(path = %path.display(), rows = documents.len(), "read input rows");
    Ok(documents)
}

fn csv_error(path: &Path, err: csv::Error) -> IngestError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => IngestError::from_io(path, e),
        _ => IngestError::Decoding {
            path: path.to_path_buf(),
            message,
        },
    }
}

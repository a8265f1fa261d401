//! Ingestion error types.
//!
//! Individual malformed rows are never fatal: loaders skip them and count
//! them in a `LoadReport`. A dataset only fails outright when it yields zero
//! usable rows, or when the file itself cannot be read or parsed.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Returned when a dataset file cannot be opened or read.
    #[error("cannot read {path}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV reader itself fails (not a single bad row).
    #[error("CSV error in {path}")]
    Csv {
        /// Path to the CSV file.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the testing dataset is not a valid JSON array.
    #[error("JSON error in {path}")]
    Json {
        /// Path to the JSON file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when every row in a dataset was malformed (or the file was
    /// empty). A partially bad dataset loads fine; a fully bad one does not.
    #[error("no usable rows in {path} ({malformed} malformed)")]
    NoUsableRows {
        /// Path to the offending dataset.
        path: PathBuf,
        /// How many rows were skipped as malformed.
        malformed: usize,
    },
}

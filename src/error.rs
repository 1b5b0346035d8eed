//! Ingestion and aggregation error types.

use std::path::PathBuf;

use thiserror::Error;

/// Longest line excerpt carried by a [`IngestError::MalformedRecord`].
pub const MAX_EXCERPT_CHARS: usize = 120;

/// Truncate a raw input line to at most [`MAX_EXCERPT_CHARS`] characters.
pub fn excerpt(line: &str) -> String {
    line.chars().take(MAX_EXCERPT_CHARS).collect()
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("bad line in {file}: {excerpt}")]
    MalformedRecord { file: String, excerpt: String },

    #[error("no .{extension} files found in {}", .dir.display())]
    NoInputFiles { dir: PathBuf, extension: String },

    #[error("write failed for station {station_id}: {source}")]
    WriteFailure {
        station_id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("ingest run {run_id} is not open")]
    RunNotOpen { run_id: i64 },

    #[error("observation {station_id}/{obs_date} has no leading year")]
    InvalidObservationDate { station_id: String, obs_date: String },

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

// -- Tests -------------------------------------------------------------------

//! Daily weather station ingestion and yearly statistics.
//!
//! Station files are parsed by [`reading`], written in batches by
//! [`db::BatchUpserter`] under an audited [`db::RunTracker`] run, driven per
//! directory by [`ingest::DirectoryIngestor`], and summarised per station-year
//! by [`db::YearlyAggregator`].

pub mod db;
pub mod error;
pub mod ingest;
pub mod reading;

pub use error::{IngestError, IngestResult};

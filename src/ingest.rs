//! Ingest a directory of station files into the store.
//!
//! Files are processed one at a time in name order. Each file gets its own
//! audited run; a failure in any file stops the whole pass, leaving earlier
//! files committed and the failing run open.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use indicatif::ProgressBar;

use crate::{
    db::{BatchUpserter, RunTracker, Store, UpsertSummary, DEFAULT_BATCH_SIZE},
    error::{IngestError, IngestResult},
    reading::DailyObservation,
};

/// Progress is logged every this many files, and on the last one.
const LOG_EVERY_FILES: usize = 25;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    /// Extension of eligible input files, without the dot.
    pub extension: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            extension: "txt".to_string(),
        }
    }
}

/// Totals over a directory pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestTotals {
    pub files: usize,
    pub rows_seen: u64,
    pub rows_written: u64,
}

pub struct DirectoryIngestor<'a> {
    store: &'a Store,
    options: IngestOptions,
    progress_bar: ProgressBar,
}

impl<'a> DirectoryIngestor<'a> {
    pub fn new(store: &'a Store, options: IngestOptions) -> Self {
        DirectoryIngestor {
            store,
            options,
            progress_bar: ProgressBar::hidden(),
        }
    }

    /// Report per-file progress on `progress_bar`; its length is set once the
    /// input files are known.
    pub fn with_progress(mut self, progress_bar: ProgressBar) -> Self {
        self.progress_bar = progress_bar;
        self
    }

    pub async fn ingest_directory(&self, data_dir: &Path) -> IngestResult<IngestTotals> {
        let files = discover_files(data_dir, &self.options.extension)?;

        tracing::info!(
            files = files.len(),
            dir = %data_dir.display(),
            "Ingestion started"
        );
        self.progress_bar.set_length(files.len() as u64);

        let mut totals = IngestTotals::default();

        for (i, file_path) in files.iter().enumerate() {
            let summary = self.ingest_file(file_path).await?;

            totals.files += 1;
            totals.rows_seen += summary.rows_seen;
            totals.rows_written += summary.rows_written;
            self.progress_bar.inc(1);

            let n = i + 1;
            if n % LOG_EVERY_FILES == 0 || n == files.len() {
                tracing::info!(
                    "[{}/{}] {} seen={} written={}",
                    n,
                    files.len(),
                    file_name(file_path),
                    summary.rows_seen,
                    summary.rows_written
                );
            }
        }

        self.progress_bar.finish_with_message("Ingestion complete");
        tracing::info!(
            total_seen = totals.rows_seen,
            total_written = totals.rows_written,
            "Ingestion finished"
        );

        Ok(totals)
    }

    /// Ingest one station file under its own run.
    pub async fn ingest_file(&self, file_path: &Path) -> IngestResult<UpsertSummary> {
        let station_id = station_id(file_path);
        let name = file_name(file_path);

        let tracker = RunTracker::new(self.store);
        let run_id = tracker.begin(Some(station_id.as_str())).await?;

        let io_error = |source| IngestError::Io {
            path: file_path.to_path_buf(),
            source,
        };
        let reader = BufReader::new(File::open(file_path).map_err(io_error)?);
        let mut upserter = BatchUpserter::new(self.store, &station_id, self.options.batch_size);

        for line in reader.lines() {
            let line = line.map_err(io_error)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            upserter.push(DailyObservation::from_line(line, &name)?).await?;
        }

        let summary = upserter.finish().await?;
        tracker
            .finish(run_id, summary.rows_seen, summary.rows_written)
            .await?;

        Ok(summary)
    }
}

/// Regular files directly under `dir` with the given extension, sorted by name.
pub fn discover_files(dir: &Path, extension: &str) -> IngestResult<Vec<PathBuf>> {
    let io_error = |source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in dir.read_dir().map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(IngestError::NoInputFiles {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }

    files.sort();

    Ok(files)
}

/// Station id is the file's base name without its extension.
fn station_id(file_path: &Path) -> String {
    file_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(file_path: &Path) -> String {
    file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// -- Tests -------------------------------------------------------------------

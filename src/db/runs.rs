//! Audit rows for ingestion passes.

use serde::Serialize;
use sqlx::FromRow;

use crate::error::{IngestError, IngestResult};

use super::{iso_utc_now, Store};

/// One row of `ingest_run`. `finished_at` stays `None` while the run is open,
/// and forever if the run crashed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct IngestRun {
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub station_id: Option<String>,
    pub rows_seen: i64,
    pub rows_written: i64,
}

pub struct RunTracker<'a> {
    store: &'a Store,
}

impl<'a> RunTracker<'a> {
    pub fn new(store: &'a Store) -> Self {
        RunTracker { store }
    }

    /// Open a run and return its id. The row is committed before returning.
    pub async fn begin(&self, station_id: Option<&str>) -> IngestResult<i64> {
        let result = sqlx::query("INSERT INTO ingest_run (started_at, station_id) VALUES (?1, ?2)")
            .bind(iso_utc_now())
            .bind(station_id)
            .execute(self.store.pool())
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Close an open run with its final counts. Fails if the run is unknown
    /// or already finished.
    pub async fn finish(&self, run_id: i64, rows_seen: u64, rows_written: u64) -> IngestResult<()> {
        let result = sqlx::query(
            "UPDATE ingest_run
             SET finished_at = ?1, rows_seen = ?2, rows_written = ?3
             WHERE run_id = ?4 AND finished_at IS NULL",
        )
        .bind(iso_utc_now())
        .bind(rows_seen as i64)
        .bind(rows_written as i64)
        .bind(run_id)
        .execute(self.store.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(IngestError::RunNotOpen { run_id });
        }

        Ok(())
    }

    pub async fn get(&self, run_id: i64) -> IngestResult<Option<IngestRun>> {
        let run = sqlx::query_as::<_, IngestRun>(
            "SELECT run_id, started_at, finished_at, station_id, rows_seen, rows_written
             FROM ingest_run WHERE run_id = ?1",
        )
        .bind(run_id)
        .fetch_optional(self.store.pool())
        .await?;

        Ok(run)
    }

    /// All runs, oldest first.
    pub async fn list(&self) -> IngestResult<Vec<IngestRun>> {
        let runs = sqlx::query_as::<_, IngestRun>(
            "SELECT run_id, started_at, finished_at, station_id, rows_seen, rows_written
             FROM ingest_run ORDER BY run_id",
        )
        .fetch_all(self.store.pool())
        .await?;

        Ok(runs)
    }
}

// -- Tests -------------------------------------------------------------------

//! SQLite store holding observations, ingest runs and yearly statistics.

pub mod observations;
pub mod query;
pub mod runs;
pub mod yearly;

use std::path::Path;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};

use crate::error::IngestResult;

pub use observations::{BatchUpserter, UpsertSummary, DEFAULT_BATCH_SIZE};
pub use runs::{IngestRun, RunTracker};
pub use yearly::{YearlyAccumulator, YearlyAggregator, YearlyStat};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS weather_observation (
    station_id TEXT NOT NULL,
    obs_date TEXT NOT NULL,
    max_temp_tenth_c INTEGER NULL,
    min_temp_tenth_c INTEGER NULL,
    precip_tenth_mm INTEGER NULL,
    PRIMARY KEY (station_id, obs_date)
);

CREATE INDEX IF NOT EXISTS idx_weather_obs_date
    ON weather_observation (obs_date);

CREATE INDEX IF NOT EXISTS idx_weather_obs_station_date
    ON weather_observation (station_id, obs_date);

CREATE TABLE IF NOT EXISTS ingest_run (
    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT NULL,
    station_id TEXT NULL,
    rows_seen INTEGER NOT NULL DEFAULT 0,
    rows_written INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS weather_yearly_stats (
    station_id TEXT NOT NULL,
    year INTEGER NOT NULL,
    avg_max_temp_c REAL NULL,
    avg_min_temp_c REAL NULL,
    total_precip_cm REAL NULL,
    PRIMARY KEY (station_id, year)
);

CREATE INDEX IF NOT EXISTS idx_stats_station_year
    ON weather_yearly_stats (station_id, year);
";

/// Handle to the backing store. Every component borrows one of these.
///
/// The pool holds a single connection: the store has exactly one writer, and
/// commits on it are immediately visible to subsequent reads.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path) -> IngestResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path.display(), "Opened weather store");

        Ok(Store { pool })
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn init(&self) -> IngestResult<()> {
        for statement in SCHEMA.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Current UTC time as an ISO-8601 string with second precision.
pub(crate) fn iso_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

// -- Tests -------------------------------------------------------------------

//! Batched insert-or-update of daily observations.

use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use crate::{
    error::{IngestError, IngestResult},
    reading::DailyObservation,
};

use super::Store;

pub const DEFAULT_BATCH_SIZE: usize = 5000;

// SQLite caps bound parameters at 32766 per statement; five per row.
const MAX_ROWS_PER_STATEMENT: usize = 6000;

/// A stored observation row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ObservationRow {
    pub station_id: String,
    pub obs_date: String,
    pub max_temp_tenth_c: Option<i64>,
    pub min_temp_tenth_c: Option<i64>,
    pub precip_tenth_mm: Option<i64>,
}

/// Counts reported by [`BatchUpserter::finish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub rows_seen: u64,
    pub rows_written: u64,
}

/// Buffers observations for one station and writes them in batches.
///
/// Each flush runs in its own transaction: a failed flush leaves nothing of
/// that batch behind, while earlier flushes stay committed.
pub struct BatchUpserter<'a> {
    store: &'a Store,
    station_id: String,
    batch_size: usize,
    batch: Vec<DailyObservation>,
    summary: UpsertSummary,
}

impl<'a> BatchUpserter<'a> {
    pub fn new(store: &'a Store, station_id: &str, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);

        BatchUpserter {
            store,
            station_id: station_id.to_string(),
            batch_size,
            batch: Vec::with_capacity(batch_size),
            summary: UpsertSummary::default(),
        }
    }

    /// Queue one observation, flushing when the batch is full.
    pub async fn push(&mut self, observation: DailyObservation) -> IngestResult<()> {
        self.batch.push(observation);
        self.summary.rows_seen += 1;

        if self.batch.len() >= self.batch_size {
            self.flush().await?;
        }

        Ok(())
    }

    /// Flush any remainder and return the final counts.
    pub async fn finish(mut self) -> IngestResult<UpsertSummary> {
        self.flush().await?;

        Ok(self.summary)
    }

    async fn flush(&mut self) -> IngestResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let written = write_batch(self.store, &self.station_id, &self.batch)
            .await
            .map_err(|source| IngestError::WriteFailure {
                station_id: self.station_id.clone(),
                source,
            })?;

        tracing::debug!(
            station_id = %self.station_id,
            rows = self.batch.len(),
            written,
            "Flushed observation batch"
        );

        self.summary.rows_written += written;
        self.batch.clear();

        Ok(())
    }
}

/// Upsert `batch` in one transaction and return the number of rows inserted
/// or changed. Rows whose stored values already match are left untouched and
/// not counted.
async fn write_batch(
    store: &Store,
    station_id: &str,
    batch: &[DailyObservation],
) -> Result<u64, sqlx::Error> {
    let mut transaction = store.pool().begin().await?;
    let mut written = 0;

    for chunk in batch.chunks(MAX_ROWS_PER_STATEMENT) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT INTO weather_observation \
             (station_id, obs_date, max_temp_tenth_c, min_temp_tenth_c, precip_tenth_mm) ",
        );

        qb.push_values(chunk, |mut row, obs| {
            row.push_bind(station_id)
                .push_bind(obs.obs_date.as_str())
                .push_bind(obs.max_temp_tenth_c)
                .push_bind(obs.min_temp_tenth_c)
                .push_bind(obs.precip_tenth_mm);
        });

        // The WHERE clause turns identical re-writes into no-ops so they
        // drop out of rows_affected.
        qb.push(
            " ON CONFLICT (station_id, obs_date) DO UPDATE SET \
               max_temp_tenth_c = excluded.max_temp_tenth_c, \
               min_temp_tenth_c = excluded.min_temp_tenth_c, \
               precip_tenth_mm = excluded.precip_tenth_mm \
             WHERE weather_observation.max_temp_tenth_c IS NOT excluded.max_temp_tenth_c \
                OR weather_observation.min_temp_tenth_c IS NOT excluded.min_temp_tenth_c \
                OR weather_observation.precip_tenth_mm IS NOT excluded.precip_tenth_mm",
        );

        written += qb.build().execute(&mut *transaction).await?.rows_affected();
    }

    transaction.commit().await?;

    Ok(written)
}

/// All observations for `station_id`, ordered by date.
pub async fn station_observations(
    store: &Store,
    station_id: &str,
) -> IngestResult<Vec<ObservationRow>> {
    let rows = sqlx::query_as::<_, ObservationRow>(
        "SELECT station_id, obs_date, max_temp_tenth_c, min_temp_tenth_c, precip_tenth_mm
         FROM weather_observation WHERE station_id = ?1 ORDER BY obs_date",
    )
    .bind(station_id)
    .fetch_all(store.pool())
    .await?;

    Ok(rows)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::test::temp_store;

    fn obs(date: &str, max: Option<i64>, min: Option<i64>, precip: Option<i64>) -> DailyObservation {
        DailyObservation {
            obs_date: date.to_string(),
            max_temp_tenth_c: max,
            min_temp_tenth_c: min,
            precip_tenth_mm: precip,
        }
    }

    fn nth_date(i: i64) -> String {
        format!("{}-{:02}-{:02}", 1900 + i / 372, i / 31 % 12 + 1, i % 31 + 1)
    }

    async fn upsert_all(store: &Store, batch_size: usize, rows: Vec<DailyObservation>) -> UpsertSummary {
        let mut upserter = BatchUpserter::new(store, "S", batch_size);
        for row in rows {
            upserter.push(row).await.unwrap();
        }
        upserter.finish().await.unwrap()
    }

    #[tokio::test]
    async fn should_insert_and_preserve_missing_values() {
        let (_dir, store) = temp_store().await;

        let summary = upsert_all(
            &store,
            DEFAULT_BATCH_SIZE,
            vec![
                obs("1985-01-01", Some(100), Some(0), Some(10)),
                obs("1985-01-02", None, Some(10), None),
            ],
        )
        .await;

        assert_eq!(summary, UpsertSummary { rows_seen: 2, rows_written: 2 });

        let rows = station_observations(&store, "S").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].max_temp_tenth_c, None);
        assert_eq!(rows[1].precip_tenth_mm, None);
        assert_eq!(rows[1].min_temp_tenth_c, Some(10));
    }

    #[tokio::test]
    async fn should_not_count_unchanged_rewrites() {
        let (_dir, store) = temp_store().await;
        let rows = vec![
            obs("1985-01-01", Some(100), Some(0), Some(10)),
            obs("1985-01-02", None, Some(10), None),
        ];

        upsert_all(&store, 1, rows.clone()).await;
        let again = upsert_all(&store, 1, rows).await;

        assert_eq!(again, UpsertSummary { rows_seen: 2, rows_written: 0 });
        assert_eq!(station_observations(&store, "S").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_overwrite_all_fields_on_conflict() {
        let (_dir, store) = temp_store().await;

        upsert_all(&store, 10, vec![obs("1985-01-01", Some(100), Some(0), Some(10))]).await;
        let summary = upsert_all(&store, 10, vec![obs("1985-01-01", None, Some(5), None)]).await;

        assert_eq!(summary.rows_written, 1);
        let rows = station_observations(&store, "S").await.unwrap();
        assert_eq!(rows, vec![ObservationRow {
            station_id: "S".to_string(),
            obs_date: "1985-01-01".to_string(),
            max_temp_tenth_c: None,
            min_temp_tenth_c: Some(5),
            precip_tenth_mm: None,
        }]);
    }

    #[tokio::test]
    async fn should_apply_repeated_keys_in_file_order() {
        let (_dir, store) = temp_store().await;

        upsert_all(
            &store,
            2,
            vec![
                obs("1985-01-01", Some(1), Some(1), Some(1)),
                obs("1985-01-01", Some(2), Some(2), Some(2)),
                obs("1985-01-01", Some(3), Some(3), Some(3)),
            ],
        )
        .await;

        let rows = station_observations(&store, "S").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].max_temp_tenth_c, Some(3));
    }

    #[tokio::test]
    async fn should_write_across_batch_boundaries() {
        let (_dir, store) = temp_store().await;
        let rows: Vec<_> = (0..12_000)
            .map(|i| obs(&nth_date(i), Some(i), None, Some(0)))
            .collect();

        let summary = upsert_all(&store, DEFAULT_BATCH_SIZE, rows).await;

        assert_eq!(summary, UpsertSummary { rows_seen: 12_000, rows_written: 12_000 });
        assert_eq!(station_observations(&store, "S").await.unwrap().len(), 12_000);
    }

    #[tokio::test]
    async fn should_split_oversized_batches_into_statements() {
        let (_dir, store) = temp_store().await;
        let rows: Vec<_> = (0..7_000)
            .map(|i| obs(&nth_date(i), None, Some(i), None))
            .collect();

        let summary = upsert_all(&store, 10_000, rows).await;

        assert_eq!(summary.rows_written, 7_000);
    }

    #[tokio::test]
    async fn should_report_write_failure_and_keep_earlier_batches() {
        let (_dir, store) = temp_store().await;
        sqlx::query(
            "CREATE TRIGGER reject_third BEFORE INSERT ON weather_observation
             WHEN NEW.obs_date = '1985-01-03'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let mut upserter = BatchUpserter::new(&store, "S", 2);
        upserter.push(obs("1985-01-01", Some(1), None, None)).await.unwrap();
        upserter.push(obs("1985-01-02", Some(2), None, None)).await.unwrap();
        upserter.push(obs("1985-01-03", Some(3), None, None)).await.unwrap();
        let err = upserter.push(obs("1985-01-04", Some(4), None, None)).await.unwrap_err();

        assert!(matches!(err, IngestError::WriteFailure { ref station_id, .. } if station_id == "S"));

        let dates: Vec<_> = station_observations(&store, "S")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.obs_date)
            .collect();
        assert_eq!(dates, vec!["1985-01-01", "1985-01-02"]);
    }
}

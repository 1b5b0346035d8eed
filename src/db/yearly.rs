//! Yearly statistics derived from the full observation history.
//!
//! Observations are grouped by station and calendar year. Missing readings
//! are excluded from both sums and divisors, so a group with no readings for
//! a measurement gets a null statistic rather than zero.

use std::collections::BTreeMap;

use futures::TryStreamExt;
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use crate::error::{IngestError, IngestResult};

use super::{observations::ObservationRow, Store};

// Five bound parameters per row, well under SQLite's statement limit.
const STATS_ROWS_PER_STATEMENT: usize = 5000;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct YearlyStat {
    pub station_id: String,
    pub year: i64,
    pub avg_max_temp_c: Option<f64>,
    pub avg_min_temp_c: Option<f64>,
    pub total_precip_cm: Option<f64>,
}

/// Running sums and counts of non-missing readings for one station-year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearlyAccumulator {
    max_temp_sum: i64,
    max_temp_count: u64,
    min_temp_sum: i64,
    min_temp_count: u64,
    precip_sum: i64,
    precip_count: u64,
}

impl YearlyAccumulator {
    pub fn add(&mut self, max_temp: Option<i64>, min_temp: Option<i64>, precip: Option<i64>) {
        if let Some(v) = max_temp {
            self.max_temp_sum += v;
            self.max_temp_count += 1;
        }
        if let Some(v) = min_temp {
            self.min_temp_sum += v;
            self.min_temp_count += 1;
        }
        if let Some(v) = precip {
            self.precip_sum += v;
            self.precip_count += 1;
        }
    }

    /// Mean temperatures in °C and total precipitation in cm, each rounded to
    /// two decimals.
    pub fn finish(&self, station_id: &str, year: i64) -> YearlyStat {
        YearlyStat {
            station_id: station_id.to_string(),
            year,
            avg_max_temp_c: mean(self.max_temp_sum, self.max_temp_count).map(|v| round2(v / 10.0)),
            avg_min_temp_c: mean(self.min_temp_sum, self.min_temp_count).map(|v| round2(v / 10.0)),
            total_precip_cm: (self.precip_count > 0).then(|| round2(self.precip_sum as f64 / 100.0)),
        }
    }
}

fn mean(sum: i64, count: u64) -> Option<f64> {
    (count > 0).then(|| sum as f64 / count as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Year of an ISO `obs_date`, taken from its first four characters.
fn year_of(obs_date: &str) -> Option<i64> {
    obs_date.get(0..4)?.parse().ok()
}

pub struct YearlyAggregator<'a> {
    store: &'a Store,
}

impl<'a> YearlyAggregator<'a> {
    pub fn new(store: &'a Store) -> Self {
        YearlyAggregator { store }
    }

    /// Recompute every station-year present in the observation table and
    /// upsert the results. Returns the number of stat rows inserted or changed.
    ///
    /// Stat rows for station-years that no longer have observations are left
    /// in place.
    pub async fn run(&self) -> IngestResult<u64> {
        tracing::info!("Yearly statistics calculation started");

        let stats = self.compute().await?;
        let changed = self.store_stats(&stats).await?;

        tracing::info!(
            groups = stats.len(),
            changed,
            "Yearly statistics calculation finished"
        );

        Ok(changed)
    }

    /// Scan all observations and fold them into per station-year stats.
    pub async fn compute(&self) -> IngestResult<Vec<YearlyStat>> {
        let mut groups: BTreeMap<(String, i64), YearlyAccumulator> = BTreeMap::new();

        let mut rows = sqlx::query_as::<_, ObservationRow>(
            "SELECT station_id, obs_date, max_temp_tenth_c, min_temp_tenth_c, precip_tenth_mm
             FROM weather_observation",
        )
        .fetch(self.store.pool());

        while let Some(row) = rows.try_next().await? {
            let year = year_of(&row.obs_date).ok_or_else(|| IngestError::InvalidObservationDate {
                station_id: row.station_id.clone(),
                obs_date: row.obs_date.clone(),
            })?;

            groups.entry((row.station_id, year)).or_default().add(
                row.max_temp_tenth_c,
                row.min_temp_tenth_c,
                row.precip_tenth_mm,
            );
        }

        Ok(groups
            .iter()
            .map(|((station_id, year), acc)| acc.finish(station_id, *year))
            .collect())
    }

    async fn store_stats(&self, stats: &[YearlyStat]) -> IngestResult<u64> {
        let mut transaction = self.store.pool().begin().await?;
        let mut changed = 0;

        for chunk in stats.chunks(STATS_ROWS_PER_STATEMENT) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO weather_yearly_stats \
                 (station_id, year, avg_max_temp_c, avg_min_temp_c, total_precip_cm) ",
            );

            qb.push_values(chunk, |mut row, stat| {
                row.push_bind(stat.station_id.as_str())
                    .push_bind(stat.year)
                    .push_bind(stat.avg_max_temp_c)
                    .push_bind(stat.avg_min_temp_c)
                    .push_bind(stat.total_precip_cm);
            });

            qb.push(
                " ON CONFLICT (station_id, year) DO UPDATE SET \
                   avg_max_temp_c = excluded.avg_max_temp_c, \
                   avg_min_temp_c = excluded.avg_min_temp_c, \
                   total_precip_cm = excluded.total_precip_cm \
                 WHERE weather_yearly_stats.avg_max_temp_c IS NOT excluded.avg_max_temp_c \
                    OR weather_yearly_stats.avg_min_temp_c IS NOT excluded.avg_min_temp_c \
                    OR weather_yearly_stats.total_precip_cm IS NOT excluded.total_precip_cm",
            );

            changed += qb.build().execute(&mut *transaction).await?.rows_affected();
        }

        transaction.commit().await?;

        Ok(changed)
    }

    pub async fn get(&self, station_id: &str, year: i64) -> IngestResult<Option<YearlyStat>> {
        let stat = sqlx::query_as::<_, YearlyStat>(
            "SELECT station_id, year, avg_max_temp_c, avg_min_temp_c, total_precip_cm
             FROM weather_yearly_stats WHERE station_id = ?1 AND year = ?2",
        )
        .bind(station_id)
        .bind(year)
        .fetch_optional(self.store.pool())
        .await?;

        Ok(stat)
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db::{test::temp_store, BatchUpserter},
        reading::DailyObservation,
    };

    async fn seed(store: &Store, station_id: &str, rows: &[(&str, Option<i64>, Option<i64>, Option<i64>)]) {
        let mut upserter = BatchUpserter::new(store, station_id, 100);
        for (date, max, min, precip) in rows {
            upserter
                .push(DailyObservation {
                    obs_date: date.to_string(),
                    max_temp_tenth_c: *max,
                    min_temp_tenth_c: *min,
                    precip_tenth_mm: *precip,
                })
                .await
                .unwrap();
        }
        upserter.finish().await.unwrap();
    }

    #[test]
    fn should_exclude_missing_values_from_means_and_sums() {
        let mut acc = YearlyAccumulator::default();
        acc.add(Some(100), Some(0), Some(10));
        acc.add(None, Some(10), None);

        let stat = acc.finish("S", 1985);
        assert_eq!(stat.avg_max_temp_c, Some(10.0));
        assert_eq!(stat.avg_min_temp_c, Some(0.5));
        assert_eq!(stat.total_precip_cm, Some(0.1));
    }

    #[test]
    fn should_yield_null_when_all_values_missing() {
        let mut acc = YearlyAccumulator::default();
        acc.add(None, Some(-50), None);
        acc.add(None, None, None);

        let stat = acc.finish("S", 1990);
        assert_eq!(stat.avg_max_temp_c, None);
        assert_eq!(stat.avg_min_temp_c, Some(-5.0));
        assert_eq!(stat.total_precip_cm, None);
    }

    #[test]
    fn should_round_to_two_decimals() {
        let mut acc = YearlyAccumulator::default();
        acc.add(Some(1), None, Some(1));
        acc.add(Some(2), None, Some(2));
        acc.add(Some(2), None, None);

        let stat = acc.finish("S", 2000);
        // 5 / 3 / 10 = 0.1666..
        assert_eq!(stat.avg_max_temp_c, Some(0.17));
        assert_eq!(stat.total_precip_cm, Some(0.03));
    }

    #[test]
    fn should_take_year_from_date_prefix() {
        assert_eq!(year_of("1985-01-01"), Some(1985));
        assert_eq!(year_of("19"), None);
        assert_eq!(year_of("abcd-01-01"), None);
    }

    #[tokio::test]
    async fn should_aggregate_station_years() {
        let (_dir, store) = temp_store().await;
        seed(
            &store,
            "S",
            &[
                ("1985-01-01", Some(100), Some(0), Some(10)),
                ("1985-01-02", None, Some(10), None),
                ("1986-07-01", Some(300), Some(150), Some(0)),
            ],
        )
        .await;
        seed(&store, "T", &[("1985-03-01", None, None, None)]).await;

        let aggregator = YearlyAggregator::new(&store);
        assert_eq!(aggregator.run().await.unwrap(), 3);

        let s1985 = aggregator.get("S", 1985).await.unwrap().unwrap();
        assert_eq!(s1985.avg_max_temp_c, Some(10.0));
        assert_eq!(s1985.avg_min_temp_c, Some(0.5));
        assert_eq!(s1985.total_precip_cm, Some(0.1));

        let s1986 = aggregator.get("S", 1986).await.unwrap().unwrap();
        assert_eq!(s1986.total_precip_cm, Some(0.0));

        let t1985 = aggregator.get("T", 1985).await.unwrap().unwrap();
        assert_eq!(t1985.avg_max_temp_c, None);
        assert_eq!(t1985.total_precip_cm, None);
    }

    #[tokio::test]
    async fn should_recompute_from_latest_observations() {
        let (_dir, store) = temp_store().await;
        seed(&store, "S", &[("1985-01-01", Some(100), Some(0), Some(10))]).await;

        let aggregator = YearlyAggregator::new(&store);
        assert_eq!(aggregator.run().await.unwrap(), 1);
        assert_eq!(aggregator.run().await.unwrap(), 0);

        seed(&store, "S", &[("1985-01-01", Some(200), Some(0), Some(10))]).await;
        assert_eq!(aggregator.run().await.unwrap(), 1);

        let stat = aggregator.get("S", 1985).await.unwrap().unwrap();
        assert_eq!(stat.avg_max_temp_c, Some(20.0));
    }

    #[tokio::test]
    async fn should_keep_stats_for_deleted_observations() {
        let (_dir, store) = temp_store().await;
        seed(&store, "S", &[("1985-01-01", Some(100), Some(0), Some(10))]).await;

        let aggregator = YearlyAggregator::new(&store);
        aggregator.run().await.unwrap();

        sqlx::query("DELETE FROM weather_observation")
            .execute(store.pool())
            .await
            .unwrap();
        assert_eq!(aggregator.run().await.unwrap(), 0);
        assert!(aggregator.get("S", 1985).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn should_reject_undated_observations() {
        let (_dir, store) = temp_store().await;
        seed(&store, "S", &[("x", Some(1), None, None)]).await;

        let err = YearlyAggregator::new(&store).run().await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidObservationDate { .. }));
    }
}

//! Paginated, filtered reads over observations and yearly statistics.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::error::IngestResult;

use super::{observations::ObservationRow, Store, YearlyStat};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Clamp `limit` to `[1, MAX_LIMIT]` and `offset` to be non-negative.
    pub fn new(limit: i64, offset: i64) -> Self {
        Pagination {
            limit: limit.clamp(1, MAX_LIMIT),
            offset: offset.max(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::new(DEFAULT_LIMIT, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub limit: i64,
    pub offset: i64,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Default)]
pub struct WeatherFilter {
    pub station_id: Option<String>,
    /// Inclusive, `YYYY-MM-DD`.
    pub date_from: Option<String>,
    /// Inclusive, `YYYY-MM-DD`.
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StatsFilter {
    pub station_id: Option<String>,
    pub year: Option<i64>,
}

/// Appends `WHERE a AND b ...` for the given conditions.
struct Conditions<'q> {
    clauses: Vec<(&'static str, Binding<'q>)>,
}

enum Binding<'q> {
    Text(&'q str),
    Int(i64),
}

impl<'q> Conditions<'q> {
    fn new() -> Self {
        Conditions { clauses: Vec::new() }
    }

    fn text(&mut self, clause: &'static str, value: Option<&'q str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.clauses.push((clause, Binding::Text(value)));
        }
    }

    fn int(&mut self, clause: &'static str, value: Option<i64>) {
        if let Some(value) = value {
            self.clauses.push((clause, Binding::Int(value)));
        }
    }

    fn push_to(&self, qb: &mut QueryBuilder<'q, Sqlite>) {
        for (i, (clause, binding)) in self.clauses.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            qb.push(*clause);
            match binding {
                Binding::Text(v) => qb.push_bind(*v),
                Binding::Int(v) => qb.push_bind(*v),
            };
        }
    }
}

/// Observations matching `filter`, ordered by station and date.
pub async fn fetch_weather(
    store: &Store,
    filter: &WeatherFilter,
    page: Pagination,
) -> IngestResult<Page<ObservationRow>> {
    let mut conditions = Conditions::new();
    conditions.text("station_id = ", filter.station_id.as_deref());
    conditions.text("obs_date >= ", filter.date_from.as_deref());
    conditions.text("obs_date <= ", filter.date_to.as_deref());

    let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM weather_observation");
    conditions.push_to(&mut count_qb);
    let count: i64 = count_qb
        .build_query_scalar::<i64>()
        .fetch_one(store.pool())
        .await?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT station_id, obs_date, max_temp_tenth_c, min_temp_tenth_c, precip_tenth_mm \
         FROM weather_observation",
    );
    conditions.push_to(&mut qb);
    qb.push(" ORDER BY station_id, obs_date LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let results = qb
        .build_query_as::<ObservationRow>()
        .fetch_all(store.pool())
        .await?;

    Ok(Page {
        count,
        limit: page.limit,
        offset: page.offset,
        results,
    })
}

/// Yearly stats matching `filter`, ordered by station and year.
pub async fn fetch_yearly_stats(
    store: &Store,
    filter: &StatsFilter,
    page: Pagination,
) -> IngestResult<Page<YearlyStat>> {
    let mut conditions = Conditions::new();
    conditions.text("station_id = ", filter.station_id.as_deref());
    conditions.int("year = ", filter.year);

    let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM weather_yearly_stats");
    conditions.push_to(&mut count_qb);
    let count: i64 = count_qb
        .build_query_scalar::<i64>()
        .fetch_one(store.pool())
        .await?;

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT station_id, year, avg_max_temp_c, avg_min_temp_c, total_precip_cm \
         FROM weather_yearly_stats",
    );
    conditions.push_to(&mut qb);
    qb.push(" ORDER BY station_id, year LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let results = qb
        .build_query_as::<YearlyStat>()
        .fetch_all(store.pool())
        .await?;

    Ok(Page {
        count,
        limit: page.limit,
        offset: page.offset,
        results,
    })
}

// -- Tests -------------------------------------------------------------------

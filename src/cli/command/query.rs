//! Read-only queries, printed as JSON.

use std::path::Path;

use anyhow::Result;
use wxstore::db::query::{fetch_weather, fetch_yearly_stats, Pagination, StatsFilter, WeatherFilter};

use crate::cli::PageArgs;

use super::open_store;

pub async fn weather(db_path: &Path, filter: WeatherFilter, page: &PageArgs) -> Result<String> {
    let store = open_store(db_path).await?;

    let result = fetch_weather(&store, &filter, Pagination::new(page.limit, page.offset)).await;
    store.close().await;

    Ok(serde_json::to_string_pretty(&result?)?)
}

pub async fn yearly(db_path: &Path, filter: StatsFilter, page: &PageArgs) -> Result<String> {
    let store = open_store(db_path).await?;

    let result = fetch_yearly_stats(&store, &filter, Pagination::new(page.limit, page.offset)).await;
    store.close().await;

    Ok(serde_json::to_string_pretty(&result?)?)
}

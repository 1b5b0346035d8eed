use std::path::Path;

use anyhow::Result;
use wxstore::db::YearlyAggregator;

use super::open_store;

pub async fn stats(db_path: &Path) -> Result<String> {
    let store = open_store(db_path).await?;

    let changed = YearlyAggregator::new(&store).run().await;
    store.close().await;

    Ok(format!("Yearly statistics updated: {} rows inserted or changed", changed?))
}

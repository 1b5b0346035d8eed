pub mod ingest;
pub mod query;
pub mod stats;

use std::path::Path;

use anyhow::{Context, Result};
use wxstore::db::Store;

pub use ingest::ingest;
pub use query::{weather, yearly};
pub use stats::stats;

/// Opens the store at `db_path` and makes sure its schema exists.
pub async fn open_store(db_path: &Path) -> Result<Store> {
    let store = Store::open(db_path)
        .await
        .with_context(|| format!("opening database `{}`", db_path.display()))?;
    store.init().await?;

    Ok(store)
}

pub async fn init(db_path: &Path) -> Result<String> {
    let store = open_store(db_path).await?;
    store.close().await;

    Ok(format!("Schema ready in `{}`", db_path.display()))
}

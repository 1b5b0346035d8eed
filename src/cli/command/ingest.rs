use std::path::Path;

use anyhow::Result;
use wxstore::ingest::{DirectoryIngestor, IngestOptions};

use crate::cli::create_progress_bar;

use super::open_store;

pub async fn ingest(db_path: &Path, data_dir: &Path, options: IngestOptions) -> Result<String> {
    let store = open_store(db_path).await?;

    let pb = create_progress_bar(0, "Ingesting station files".to_string());
    let totals = DirectoryIngestor::new(&store, options)
        .with_progress(pb)
        .ingest_directory(data_dir)
        .await;
    store.close().await;
    let totals = totals?;

    Ok(format!(
        "Ingested {} files: {} rows seen, {} rows written",
        totals.files, totals.rows_seen, totals.rows_written
    ))
}

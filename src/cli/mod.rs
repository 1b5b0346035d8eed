//! Command line interface.

pub mod command;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use wxstore::db::DEFAULT_BATCH_SIZE;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "WXSTORE_DB", default_value = "weather.db")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema
    Init {},
    /// Ingest a directory of station files
    Ingest {
        /// Directory holding one `<station_id>.<ext>` file per station
        #[arg(long)]
        data_dir: PathBuf,
        /// Rows buffered per write
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE as u64, value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: u64,
        /// Extension of input files
        #[arg(long, default_value = "txt")]
        extension: String,
    },
    /// Recompute yearly statistics
    Stats {},
    /// Query daily observations
    Weather {
        #[arg(long)]
        station_id: Option<String>,
        /// First date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        date_from: Option<String>,
        /// Last date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        date_to: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Query yearly statistics
    Yearly {
        #[arg(long)]
        station_id: Option<String>,
        #[arg(long)]
        year: Option<i64>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Args)]
pub struct PageArgs {
    /// Clamped to 1..=1000
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    pub limit: i64,
    /// Clamped to 0 or more
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {pos:>6}/{len:6} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    )
}

// -- Tests -------------------------------------------------------------------

mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{command, Cli, Commands};
use tracing_subscriber::EnvFilter;
use wxstore::{
    db::query::{StatsFilter, WeatherFilter},
    ingest::IngestOptions,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(message) => {
            println!("{}", message);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let db = cli.db.as_path();

    match cli.command {
        Commands::Init {} => command::init(db).await,
        Commands::Ingest {
            data_dir,
            batch_size,
            extension,
        } => {
            let options = IngestOptions {
                batch_size: usize::try_from(batch_size)?,
                extension,
            };
            command::ingest(db, &data_dir, options).await
        }
        Commands::Stats {} => command::stats(db).await,
        Commands::Weather {
            station_id,
            date_from,
            date_to,
            page,
        } => {
            let filter = WeatherFilter {
                station_id,
                date_from,
                date_to,
            };
            command::weather(db, filter, &page).await
        }
        Commands::Yearly {
            station_id,
            year,
            page,
        } => command::yearly(db, StatsFilter { station_id, year }, &page).await,
    }
}

use clap::Parser;
use tracing::{error, info};

mod config;
mod db;
mod ingest;
mod util;

use crate::config::{AppConfig, CliArgs};
use crate::db::writer::DuckDbTableWriter;
use crate::ingest::Ingestor;
use crate::util::logging::init_tracing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.json_logs);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let job = match config.job(&args.command) {
        Ok(job) => job,
        Err(e) => {
            error!("Invalid ingestion settings: {}", e);
            return Err(e.into());
        }
    };

    let destination = config.database.destination();
    info!("Connecting to {}", destination.redacted());
    let mut writer = match DuckDbTableWriter::connect(&destination) {
        Ok(writer) => writer,
        Err(e) => {
            error!("Failed to connect to {}: {}", destination.redacted(), e);
            return Err(e.into());
        }
    };

    let ingestor = Ingestor::with_sample_size(config.reader.infer_sample_records);
    match ingestor.run(&job, &mut writer) {
        Ok(summary) => info!(
            "Finished loading {}: {} rows in {} batches",
            summary.table, summary.rows, summary.batches
        ),
        Err(e) => {
            error!("Ingestion into {} failed: {}", job.target_table, e);
            return Err(e.into());
        }
    }

    Ok(())
}

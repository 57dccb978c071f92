use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::db::destination::Destination;
use crate::ingest::schema::SchemaPreset;
use crate::ingest::source::{SourceSpec, YELLOW_TRIPDATA_PREFIX};
use crate::ingest::IngestJob;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    /// Write into this DuckDB file instead of Postgres.
    pub duckdb_path: Option<String>,
}

impl DatabaseConfig {
    pub fn destination(&self) -> Destination {
        match &self.duckdb_path {
            Some(path) => Destination::DuckDb { path: path.clone() },
            None => Destination::Postgres {
                user: self.user.clone(),
                password: self.password.clone(),
                host: self.host.clone(),
                port: self.port,
                database: self.name.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaxiConfig {
    pub year: i32,
    pub month: u32,
    pub target_table: String,
    pub chunksize: usize,
    pub prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReaderConfig {
    pub infer_sample_records: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub taxi: TaxiConfig,
    pub reader: ReaderConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Load a CSV or Parquet dataset into a database table", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Postgres user [default: root]
    #[arg(long, global = true)]
    pub pg_user: Option<String>,

    /// Postgres password [default: root]
    #[arg(long, global = true)]
    pub pg_pass: Option<String>,

    /// Postgres host [default: localhost]
    #[arg(long, global = true)]
    pub pg_host: Option<String>,

    /// Postgres port [default: 5432]
    #[arg(long, global = true)]
    pub pg_port: Option<u16>,

    /// Postgres database [default: ny_taxi]
    #[arg(long, global = true)]
    pub pg_db: Option<String>,

    /// Write into a DuckDB database file instead of Postgres
    #[arg(long, value_name = "PATH", global = true)]
    pub duckdb_path: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest one month of NYC yellow taxi trips
    Taxi(TaxiArgs),
    /// Ingest a CSV or Parquet file from any URL
    Url(UrlArgs),
}

#[derive(Args, Debug)]
pub struct TaxiArgs {
    /// Dataset year [default: 2021]
    #[arg(long)]
    pub year: Option<i32>,

    /// Dataset month [default: 1]
    #[arg(long)]
    pub month: Option<u32>,

    /// Destination table name [default: yellow_taxi_data]
    #[arg(long)]
    pub target_table: Option<String>,

    /// Number of rows per chunk [default: 100000]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunksize: Option<u64>,

    /// Base URL prefix for the dataset
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug)]
pub struct UrlArgs {
    /// URL of the file; a `.parquet` suffix selects the Parquet reader
    #[arg(long)]
    pub url: String,

    /// Destination table name
    #[arg(long)]
    pub target_table: String,

    /// Number of rows per chunk; the whole file is one chunk when omitted
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunksize: Option<u64>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder()
            .set_default("database.user", "root")?
            .set_default("database.password", "root")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432_i64)?
            .set_default("database.name", "ny_taxi")?
            .set_default("taxi.year", 2021_i64)?
            .set_default("taxi.month", 1_i64)?
            .set_default("taxi.target_table", "yellow_taxi_data")?
            .set_default("taxi.chunksize", 100_000_i64)?
            .set_default("taxi.prefix", YELLOW_TRIPDATA_PREFIX)?
            .set_default("reader.infer_sample_records", 0_i64)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "ingest.toml",
                "config/ingest.toml",
                "/etc/taxi-ingest/ingest.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(user) = &args.pg_user {
            config.database.user = user.clone();
        }
        if let Some(password) = &args.pg_pass {
            config.database.password = password.clone();
        }
        if let Some(host) = &args.pg_host {
            config.database.host = host.clone();
        }
        if let Some(port) = args.pg_port {
            config.database.port = port;
        }
        if let Some(name) = &args.pg_db {
            config.database.name = name.clone();
        }
        if let Some(path) = &args.duckdb_path {
            config.database.duckdb_path = Some(path.clone());
        }

        if let Command::Taxi(taxi) = &args.command {
            if let Some(year) = taxi.year {
                config.taxi.year = year;
            }
            if let Some(month) = taxi.month {
                config.taxi.month = month;
            }
            if let Some(table) = &taxi.target_table {
                config.taxi.target_table = table.clone();
            }
            if let Some(chunksize) = taxi.chunksize {
                config.taxi.chunksize = chunksize as usize;
            }
            if let Some(prefix) = &taxi.prefix {
                config.taxi.prefix = prefix.clone();
            }
        }

        Ok(config)
    }

    /// Builds the ingestion job for the selected profile.
    pub fn job(&self, command: &Command) -> Result<IngestJob, ConfigError> {
        match command {
            Command::Taxi(_) => {
                let taxi = &self.taxi;
                if taxi.chunksize == 0 {
                    return Err(ConfigError::Message(
                        "taxi.chunksize must be a positive row count".to_string(),
                    ));
                }
                if NaiveDate::from_ymd_opt(taxi.year, taxi.month, 1).is_none() {
                    return Err(ConfigError::Message(format!(
                        "{}-{} is not a valid dataset month",
                        taxi.year, taxi.month
                    )));
                }

                Ok(IngestJob {
                    source: SourceSpec::Templated {
                        prefix: taxi.prefix.clone(),
                        year: taxi.year,
                        month: taxi.month,
                    },
                    preset: SchemaPreset::yellow_taxi(),
                    chunk_size: Some(taxi.chunksize),
                    target_table: taxi.target_table.clone(),
                })
            }
            Command::Url(url) => Ok(IngestJob {
                source: SourceSpec::Direct(url.url.clone()),
                preset: SchemaPreset::Inferred,
                chunk_size: url.chunksize.map(|c| c as usize),
                target_table: url.target_table.clone(),
            }),
        }
    }
}

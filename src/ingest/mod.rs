pub mod chunk;
pub mod csv;
pub mod parquet;
pub mod schema;
pub mod source;

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use ::parquet::errors::ParquetError;
use tracing::{info, warn};

use crate::db::writer::TableWriter;
use crate::ingest::chunk::Chunks;
use crate::ingest::schema::{SchemaPreset, TableSchema};
use crate::ingest::source::{SourceFormat, SourceSpec};

/// Rows per read when the source is loaded without chunking.
pub const DEFAULT_READ_BATCH_SIZE: usize = 8192;

#[derive(Debug)]
pub enum IngestError {
    Io(std::io::Error),
    Http(reqwest::Error),
    Arrow(ArrowError),
    Parquet(ParquetError),
    Database(duckdb::Error),
    UnsupportedType(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Io(err) => write!(f, "IO error: {}", err),
            IngestError::Http(err) => write!(f, "Download error: {}", err),
            IngestError::Arrow(err) => write!(f, "Parsing error: {}", err),
            IngestError::Parquet(err) => write!(f, "Parquet error: {}", err),
            IngestError::Database(err) => write!(f, "Database error: {}", err),
            IngestError::UnsupportedType(msg) => write!(f, "Unsupported column type: {}", msg),
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IngestError::Io(err) => Some(err),
            IngestError::Http(err) => Some(err),
            IngestError::Arrow(err) => Some(err),
            IngestError::Parquet(err) => Some(err),
            IngestError::Database(err) => Some(err),
            IngestError::UnsupportedType(_) => None,
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err)
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        IngestError::Http(err)
    }
}

impl From<ArrowError> for IngestError {
    fn from(err: ArrowError) -> Self {
        IngestError::Arrow(err)
    }
}

impl From<ParquetError> for IngestError {
    fn from(err: ParquetError) -> Self {
        IngestError::Parquet(err)
    }
}

impl From<duckdb::Error> for IngestError {
    fn from(err: duckdb::Error) -> Self {
        IngestError::Database(err)
    }
}

/// Opens a local file as a lazy stream of record batches.
///
/// Every call starts from the beginning of the file; the returned reader
/// only moves forward.
pub trait FileReader {
    fn open(
        &self,
        path: &Path,
        preset: &SchemaPreset,
        batch_size: usize,
    ) -> Result<Box<dyn RecordBatchReader>, IngestError>;
}

/// Everything one run needs to know about what to load and where.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestJob {
    pub source: SourceSpec,
    pub preset: SchemaPreset,
    pub chunk_size: Option<usize>,
    pub target_table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub table: String,
    pub batches: usize,
    pub rows: usize,
    pub elapsed: Duration,
}

pub struct Ingestor {
    csv_reader: csv::CsvReader,
    parquet_reader: parquet::ParquetReader,
}

impl Ingestor {
    pub fn new() -> Self {
        Self {
            csv_reader: csv::CsvReader::new(),
            parquet_reader: parquet::ParquetReader::new(),
        }
    }

    pub fn with_sample_size(sample_size: usize) -> Self {
        Self {
            csv_reader: csv::CsvReader::with_sample_size(sample_size),
            parquet_reader: parquet::ParquetReader::new(),
        }
    }

    /// Loads the job's source into its target table through `writer`.
    ///
    /// The table is replaced with the first batch's schema before any rows
    /// are appended. Nothing is rolled back on failure: batches appended
    /// before the error stay in the table.
    pub fn run<W: TableWriter>(
        &self,
        job: &IngestJob,
        writer: &mut W,
    ) -> Result<IngestSummary, IngestError> {
        let start_time = Instant::now();

        let url = job.source.resolve();
        let format = SourceFormat::from_url(&url);
        info!("Reading {} as {:?}", url, format);

        let local = source::fetch(&url)?;
        let read_batch_size = job.chunk_size.unwrap_or(DEFAULT_READ_BATCH_SIZE);

        let reader = match format {
            SourceFormat::Csv => self.csv_reader.open(local.path(), &job.preset, read_batch_size)?,
            SourceFormat::Parquet => {
                self.parquet_reader
                    .open(local.path(), &job.preset, read_batch_size)?
            }
        };

        let schema = reader.schema();
        let chunks = Chunks::new(reader, schema, job.chunk_size);
        let mut summary = write_batches(chunks, &job.target_table, writer)?;
        summary.elapsed = start_time.elapsed();

        info!(
            "Ingested {} rows in {} batches into {} ({}ms)",
            summary.rows,
            summary.batches,
            summary.table,
            summary.elapsed.as_millis()
        );
        Ok(summary)
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces `table` on the first batch, then appends every batch in order.
pub fn write_batches<I, W>(
    chunks: Chunks<I>,
    table: &str,
    writer: &mut W,
) -> Result<IngestSummary, IngestError>
where
    I: Iterator<Item = Result<RecordBatch, ArrowError>>,
    W: TableWriter,
{
    let start_time = Instant::now();
    let schema = chunks.schema();
    let mut summary = IngestSummary {
        table: table.to_string(),
        batches: 0,
        rows: 0,
        elapsed: Duration::ZERO,
    };

    for batch in chunks {
        let batch = batch?;

        if summary.batches == 0 {
            writer.replace(table, &TableSchema::from_arrow(table, &batch.schema()))?;
            info!("Replaced table {} ({} columns)", table, batch.num_columns());
        }

        let rows = writer.append(table, batch)?;
        summary.batches += 1;
        summary.rows += rows;
        info!(
            "Appended batch {} ({} rows, {} total) to {}",
            summary.batches, rows, summary.rows, table
        );
    }

    if summary.batches == 0 {
        writer.replace(table, &TableSchema::from_arrow(table, &schema))?;
        warn!("Source had no rows; created empty table {}", table);
    }

    summary.elapsed = start_time.elapsed();
    Ok(summary)
}

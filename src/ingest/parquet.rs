use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::record_batch::RecordBatchReader;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use crate::ingest::chunk::Conform;
use crate::ingest::schema::SchemaPreset;
use crate::ingest::{FileReader, IngestError};

pub struct ParquetReader;

impl ParquetReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ParquetReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileReader for ParquetReader {
    fn open(
        &self,
        path: &Path,
        preset: &SchemaPreset,
        batch_size: usize,
    ) -> Result<Box<dyn RecordBatchReader>, IngestError> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        debug!(
            "Parquet file {} has {} rows in {} row groups",
            path.display(),
            builder.metadata().file_metadata().num_rows(),
            builder.metadata().num_row_groups()
        );

        let schema = Arc::new(preset.resolve(builder.schema()));
        let reader = builder.with_batch_size(batch_size).build()?;

        Ok(Box::new(Conform::new(reader, schema)))
    }
}

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::record_batch::RecordBatchReader;
use flate2::read::MultiGzDecoder;
use tracing::debug;

use crate::ingest::schema::SchemaPreset;
use crate::ingest::{FileReader, IngestError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct CsvReader {
    /// Records scanned for type inference; `None` scans the whole file.
    sample_size: Option<usize>,
}

impl CsvReader {
    pub fn new() -> Self {
        Self { sample_size: None }
    }

    /// A sample size of zero means the whole file.
    pub fn with_sample_size(sample_size: usize) -> Self {
        Self {
            sample_size: (sample_size > 0).then_some(sample_size),
        }
    }
}

impl Default for CsvReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens `path` from the start, gunzipping it when it carries the gzip magic.
fn open_decoded(path: &Path) -> Result<Box<dyn Read>, IngestError> {
    let mut reader = BufReader::new(File::open(path)?);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

impl FileReader for CsvReader {
    fn open(
        &self,
        path: &Path,
        preset: &SchemaPreset,
        batch_size: usize,
    ) -> Result<Box<dyn RecordBatchReader>, IngestError> {
        let format = Format::default().with_header(true);
        let (inferred, records) =
            format.infer_schema(open_decoded(path)?, self.sample_size)?;
        debug!(
            "Inferred {} columns from {} records of {}",
            inferred.fields().len(),
            records,
            path.display()
        );

        let schema = Arc::new(preset.resolve(&inferred));
        let reader = ReaderBuilder::new(schema)
            .with_header(true)
            .with_batch_size(batch_size)
            .build(open_decoded(path)?)?;

        Ok(Box::new(reader))
    }
}

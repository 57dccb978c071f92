use arrow::array::Array;
use arrow::compute::{cast_with_options, concat_batches, CastOptions};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchReader};

/// Re-slices a stream of record batches into batches of exactly
/// `chunk_size` rows; only the final batch may be shorter.
///
/// Without a chunk size the whole stream is gathered into a single batch.
/// Empty input batches are dropped, so an empty source yields nothing.
/// The first error from the inner stream is yielded once and ends the
/// sequence.
pub struct Chunks<I> {
    inner: I,
    schema: SchemaRef,
    chunk_size: Option<usize>,
    pending: Vec<RecordBatch>,
    pending_rows: usize,
    finished: bool,
}

impl<I> Chunks<I>
where
    I: Iterator<Item = Result<RecordBatch, ArrowError>>,
{
    pub fn new(inner: I, schema: SchemaRef, chunk_size: Option<usize>) -> Self {
        Self {
            inner,
            schema,
            chunk_size,
            pending: Vec::new(),
            pending_rows: 0,
            finished: false,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn take(&mut self, rows: usize) -> Result<RecordBatch, ArrowError> {
        let merged = if self.pending.len() == 1 {
            self.pending.remove(0)
        } else {
            let merged = concat_batches(&self.schema, &self.pending)?;
            self.pending.clear();
            merged
        };

        let rest = merged.num_rows() - rows;
        if rest > 0 {
            self.pending.push(merged.slice(rows, rest));
        }
        self.pending_rows = rest;

        Ok(merged.slice(0, rows))
    }
}

impl<I> Iterator for Chunks<I>
where
    I: Iterator<Item = Result<RecordBatch, ArrowError>>,
{
    type Item = Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(size) = self.chunk_size {
                if self.pending_rows >= size {
                    let chunk = self.take(size);
                    if chunk.is_err() {
                        self.finished = true;
                    }
                    return Some(chunk);
                }
            }

            match self.inner.next() {
                Some(Ok(batch)) => {
                    if batch.num_rows() > 0 {
                        self.pending_rows += batch.num_rows();
                        self.pending.push(batch);
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    if self.pending_rows == 0 {
                        return None;
                    }
                    let rows = self.pending_rows;
                    return Some(self.take(rows));
                }
            }
        }
    }
}

/// Casts every batch of the inner stream to `schema`, column by column.
///
/// Casting is strict: a value that does not fit the target type is an
/// error rather than a null.
pub struct Conform<I> {
    inner: I,
    schema: SchemaRef,
}

impl<I> Conform<I> {
    pub fn new(inner: I, schema: SchemaRef) -> Self {
        Self { inner, schema }
    }
}

impl<I> Iterator for Conform<I>
where
    I: Iterator<Item = Result<RecordBatch, ArrowError>>,
{
    type Item = Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|batch| batch.and_then(|batch| conform_batch(&batch, &self.schema)))
    }
}

impl<I> RecordBatchReader for Conform<I>
where
    I: Iterator<Item = Result<RecordBatch, ArrowError>>,
{
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

pub fn conform_batch(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch, ArrowError> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };

    let columns = batch
        .columns()
        .iter()
        .zip(schema.fields())
        .map(|(column, field)| {
            if column.data_type() == field.data_type() {
                Ok(column.clone())
            } else {
                cast_with_options(column, field.data_type(), &options)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    RecordBatch::try_new(schema.clone(), columns)
}

use arrow::record_batch::RecordBatch;
use duckdb::vtab::arrow::ArrowVTab;
use duckdb::vtab::arrow_recordbatch_to_query_params;
use duckdb::Connection;
use tracing::{debug, info};

use crate::db::destination::Destination;
use crate::db::sql::quote_ident;
use crate::ingest::schema::TableSchema;
use crate::ingest::IngestError;

/// Catalog alias the destination is attached under.
pub const DESTINATION_CATALOG: &str = "dest";

/// Bulk-write primitives the ingestor drives.
pub trait TableWriter {
    /// Drops `table` if it exists and recreates it empty with `schema`.
    fn replace(&mut self, table: &str, schema: &TableSchema) -> Result<(), IngestError>;

    /// Appends the batch's rows in order, returning how many were written.
    fn append(&mut self, table: &str, batch: RecordBatch) -> Result<usize, IngestError>;
}

/// Writes through an in-memory DuckDB session with the destination attached.
pub struct DuckDbTableWriter {
    conn: Connection,
}

impl DuckDbTableWriter {
    pub fn connect(destination: &Destination) -> Result<Self, IngestError> {
        let conn = Connection::open_in_memory()?;
        conn.register_table_function::<ArrowVTab>("arrow")?;

        for statement in destination.attach_statements(DESTINATION_CATALOG) {
            conn.execute_batch(&statement)?;
        }
        info!("Attached {} as {}", destination.redacted(), DESTINATION_CATALOG);

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn qualified_name(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(DESTINATION_CATALOG), quote_ident(table))
    }
}

impl TableWriter for DuckDbTableWriter {
    fn replace(&mut self, table: &str, schema: &TableSchema) -> Result<(), IngestError> {
        if let Some(col) = schema.unsupported_columns().first() {
            return Err(IngestError::UnsupportedType(format!(
                "column {} has type {}",
                col.name,
                col.data_type.to_sql_type()
            )));
        }

        let qualified = self.qualified_name(table);
        let sql = format!(
            "DROP TABLE IF EXISTS {};\n{}",
            qualified,
            schema.to_create_table_sql(&qualified)
        );
        debug!("Executing SQL: {}", sql);

        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    fn append(&mut self, table: &str, batch: RecordBatch) -> Result<usize, IngestError> {
        let rows = batch.num_rows();
        let sql = format!(
            "INSERT INTO {} SELECT * FROM arrow(?, ?)",
            self.qualified_name(table)
        );

        let params = arrow_recordbatch_to_query_params(batch);
        self.conn.execute(&sql, params)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray, UInt64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn memory_writer() -> Result<DuckDbTableWriter, IngestError> {
        DuckDbTableWriter::connect(&Destination::DuckDb {
            path: ":memory:".to_string(),
        })
    }

    fn trips(ids: Vec<i64>) -> Result<RecordBatch, arrow::error::ArrowError> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("fare", DataType::Float64, true),
            Field::new("flag", DataType::Utf8, true),
        ]));
        let fares: Vec<Option<f64>> = ids.iter().map(|id| Some(*id as f64 * 1.5)).collect();
        let flags: Vec<Option<&str>> = ids.iter().map(|_| None).collect();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(Float64Array::from(fares)),
                Arc::new(StringArray::from(flags)),
            ],
        )
    }

    fn count(writer: &DuckDbTableWriter, table: &str) -> Result<i64, duckdb::Error> {
        writer.connection().query_row(
            &format!("SELECT COUNT(*) FROM {}", writer.qualified_name(table)),
            [],
            |row| row.get(0),
        )
    }

    #[test]
    fn replace_then_append() -> Result<(), Box<dyn std::error::Error>> {
        let mut writer = memory_writer()?;
        let batch = trips(vec![1, 2, 3])?;
        let schema = TableSchema::from_arrow("trips", &batch.schema());

        writer.replace("trips", &schema)?;
        assert_eq!(count(&writer, "trips")?, 0);

        assert_eq!(writer.append("trips", batch)?, 3);
        assert_eq!(writer.append("trips", trips(vec![4])?)?, 1);
        assert_eq!(count(&writer, "trips")?, 4);

        let (fare, nulls): (f64, i64) = writer.connection().query_row(
            &format!(
                "SELECT SUM(fare), COUNT(*) FILTER (WHERE flag IS NULL) FROM {}",
                writer.qualified_name("trips")
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        assert_eq!(fare, 15.0);
        assert_eq!(nulls, 4);
        Ok(())
    }

    #[test]
    fn replace_discards_existing_rows() -> Result<(), Box<dyn std::error::Error>> {
        let mut writer = memory_writer()?;
        let batch = trips(vec![1, 2])?;
        let schema = TableSchema::from_arrow("trips", &batch.schema());

        writer.replace("trips", &schema)?;
        writer.append("trips", batch)?;
        writer.replace("trips", &schema)?;

        assert_eq!(count(&writer, "trips")?, 0);
        Ok(())
    }

    #[test]
    fn unsupported_column_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut writer = memory_writer()?;
        let schema = Arc::new(Schema::new(vec![Field::new("big", DataType::UInt64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(UInt64Array::from(vec![1u64]))])?;

        let err = writer
            .replace("big", &TableSchema::from_arrow("big", &batch.schema()))
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::UnsupportedType(_)));
        Ok(())
    }
}

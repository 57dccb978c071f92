use arrow::datatypes::{DataType as ArrowType, Field, Schema, TimeUnit};

use crate::db::sql::quote_ident;

/// Column types understood by the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    BigInt,
    Integer,
    SmallInt,
    Double,
    Real,
    String,
    Boolean,
    Date,
    Timestamp,
    TimestampTz,
    Unknown(String),
}

impl DataType {
    pub fn to_sql_type(&self) -> String {
        match self {
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Integer => "INTEGER".to_string(),
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Double => "DOUBLE".to_string(),
            DataType::Real => "REAL".to_string(),
            DataType::String => "VARCHAR".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Timestamp => "TIMESTAMP".to_string(),
            DataType::TimestampTz => "TIMESTAMPTZ".to_string(),
            DataType::Unknown(t) => t.clone(),
        }
    }

    /// Maps an Arrow type to a column type, after storage normalization.
    pub fn from_arrow(data_type: &ArrowType) -> Self {
        match storage_type(data_type) {
            ArrowType::Int64 => DataType::BigInt,
            ArrowType::Int32 => DataType::Integer,
            ArrowType::Int16 => DataType::SmallInt,
            ArrowType::Float64 => DataType::Double,
            ArrowType::Float32 => DataType::Real,
            ArrowType::Utf8 => DataType::String,
            ArrowType::Boolean => DataType::Boolean,
            ArrowType::Date32 => DataType::Date,
            ArrowType::Timestamp(_, None) => DataType::Timestamp,
            ArrowType::Timestamp(_, Some(_)) => DataType::TimestampTz,
            other => DataType::Unknown(other.to_string()),
        }
    }

    /// The Arrow type batches carry for this column. `None` for `Unknown`.
    pub fn to_arrow(&self) -> Option<ArrowType> {
        let data_type = match self {
            DataType::BigInt => ArrowType::Int64,
            DataType::Integer => ArrowType::Int32,
            DataType::SmallInt => ArrowType::Int16,
            DataType::Double => ArrowType::Float64,
            DataType::Real => ArrowType::Float32,
            DataType::String => ArrowType::Utf8,
            DataType::Boolean => ArrowType::Boolean,
            DataType::Date => ArrowType::Date32,
            DataType::Timestamp => ArrowType::Timestamp(TimeUnit::Microsecond, None),
            DataType::TimestampTz => {
                ArrowType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
            }
            DataType::Unknown(_) => return None,
        };
        Some(data_type)
    }
}

/// Normalizes an Arrow type to the one batches are written with.
///
/// Strings collapse to `Utf8`, timestamps to microseconds, and types the
/// destination has no column for are widened to the next signed type.
/// Columns with no values at all are read as strings.
pub fn storage_type(data_type: &ArrowType) -> ArrowType {
    match data_type {
        ArrowType::Null | ArrowType::LargeUtf8 | ArrowType::Utf8View => ArrowType::Utf8,
        ArrowType::Dictionary(_, value) => storage_type(value),
        ArrowType::Int8 | ArrowType::UInt8 => ArrowType::Int16,
        ArrowType::UInt16 => ArrowType::Int32,
        ArrowType::UInt32 => ArrowType::Int64,
        ArrowType::Float16 => ArrowType::Float32,
        ArrowType::Timestamp(_, tz) => ArrowType::Timestamp(TimeUnit::Microsecond, tz.clone()),
        other => other.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn to_sql_definition(&self) -> String {
        let nullable_str = if self.nullable { "" } else { " NOT NULL" };
        format!(
            "{} {}{}",
            quote_ident(&self.name),
            self.data_type.to_sql_type(),
            nullable_str
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn from_arrow(name: &str, schema: &Schema) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|field| ColumnSchema {
                name: field.name().clone(),
                data_type: DataType::from_arrow(field.data_type()),
                nullable: field.is_nullable(),
            })
            .collect();

        Self {
            name: name.to_string(),
            columns,
        }
    }

    /// Columns with no SQL mapping.
    pub fn unsupported_columns(&self) -> Vec<&ColumnSchema> {
        self.columns
            .iter()
            .filter(|col| matches!(col.data_type, DataType::Unknown(_)))
            .collect()
    }

    pub fn to_create_table_sql(&self, qualified_name: &str) -> String {
        let columns_sql: Vec<String> = self
            .columns
            .iter()
            .map(|col| col.to_sql_definition())
            .collect();

        format!(
            "CREATE TABLE {} (\n    {}\n);",
            qualified_name,
            columns_sql.join(",\n    ")
        )
    }
}

/// How column types are decided for a source file.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaPreset {
    /// Every column keeps the type found in the file.
    Inferred,
    /// Named columns are forced to a type; `date_columns` are parsed as
    /// timestamps. Columns not named keep their inferred type.
    Explicit {
        dtypes: Vec<(String, DataType)>,
        date_columns: Vec<String>,
    },
}

impl SchemaPreset {
    /// The NYC yellow taxi trip record layout.
    pub fn yellow_taxi() -> Self {
        let dtypes = [
            ("VendorID", DataType::BigInt),
            ("passenger_count", DataType::BigInt),
            ("trip_distance", DataType::Double),
            ("RatecodeID", DataType::BigInt),
            ("store_and_fwd_flag", DataType::String),
            ("PULocationID", DataType::BigInt),
            ("DOLocationID", DataType::BigInt),
            ("payment_type", DataType::BigInt),
            ("fare_amount", DataType::Double),
            ("extra", DataType::Double),
            ("mta_tax", DataType::Double),
            ("tip_amount", DataType::Double),
            ("tolls_amount", DataType::Double),
            ("improvement_surcharge", DataType::Double),
            ("total_amount", DataType::Double),
            ("congestion_surcharge", DataType::Double),
        ]
        .into_iter()
        .map(|(name, data_type)| (name.to_string(), data_type))
        .collect();

        SchemaPreset::Explicit {
            dtypes,
            date_columns: vec![
                "tpep_pickup_datetime".to_string(),
                "tpep_dropoff_datetime".to_string(),
            ],
        }
    }

    fn declared_type(&self, column: &str) -> Option<ArrowType> {
        match self {
            SchemaPreset::Inferred => None,
            SchemaPreset::Explicit {
                dtypes,
                date_columns,
            } => {
                if date_columns.iter().any(|c| c == column) {
                    return DataType::Timestamp.to_arrow();
                }
                dtypes
                    .iter()
                    .find(|(name, _)| name == column)
                    .and_then(|(_, data_type)| data_type.to_arrow())
            }
        }
    }

    /// Builds the schema batches are read into: declared types where the
    /// preset names a column, the normalized source type everywhere else.
    pub fn resolve(&self, source: &Schema) -> Schema {
        let fields: Vec<Field> = source
            .fields()
            .iter()
            .map(|field| match self.declared_type(field.name()) {
                Some(declared) => Field::new(field.name(), declared, true),
                None => Field::new(
                    field.name(),
                    storage_type(field.data_type()),
                    field.is_nullable(),
                ),
            })
            .collect();

        Schema::new_with_metadata(fields, source.metadata().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yellow_taxi_preset_overrides_declared_columns_only() {
        let inferred = Schema::new(vec![
            Field::new("VendorID", ArrowType::Float64, true),
            Field::new("tpep_pickup_datetime", ArrowType::Utf8, true),
            Field::new("store_and_fwd_flag", ArrowType::Boolean, true),
            Field::new("airport_fee", ArrowType::Float64, true),
        ]);

        let resolved = SchemaPreset::yellow_taxi().resolve(&inferred);

        assert_eq!(resolved.field(0).data_type(), &ArrowType::Int64);
        assert_eq!(
            resolved.field(1).data_type(),
            &ArrowType::Timestamp(TimeUnit::Microsecond, None)
        );
        assert_eq!(resolved.field(2).data_type(), &ArrowType::Utf8);
        assert_eq!(resolved.field(3).data_type(), &ArrowType::Float64);
    }

    #[test]
    fn inferred_preset_normalizes_storage_types() {
        let source = Schema::new(vec![
            Field::new("name", ArrowType::LargeUtf8, false),
            Field::new("at", ArrowType::Timestamp(TimeUnit::Nanosecond, None), true),
            Field::new("small", ArrowType::UInt8, true),
            Field::new("empty", ArrowType::Null, true),
        ]);

        let resolved = SchemaPreset::Inferred.resolve(&source);

        assert_eq!(resolved.field(0).data_type(), &ArrowType::Utf8);
        assert!(!resolved.field(0).is_nullable());
        assert_eq!(
            resolved.field(1).data_type(),
            &ArrowType::Timestamp(TimeUnit::Microsecond, None)
        );
        assert_eq!(resolved.field(2).data_type(), &ArrowType::Int16);
        assert_eq!(resolved.field(3).data_type(), &ArrowType::Utf8);
    }

    #[test]
    fn create_table_sql_quotes_columns() {
        let schema = Schema::new(vec![
            Field::new("VendorID", ArrowType::Int64, true),
            Field::new("total amount", ArrowType::Float64, false),
        ]);
        let table = TableSchema::from_arrow("trips", &schema);

        assert_eq!(
            table.to_create_table_sql("\"dest\".\"trips\""),
            "CREATE TABLE \"dest\".\"trips\" (\n    \"VendorID\" BIGINT,\n    \"total amount\" DOUBLE NOT NULL\n);"
        );
        assert!(table.unsupported_columns().is_empty());
    }

    #[test]
    fn unmapped_types_are_reported() {
        let schema = Schema::new(vec![Field::new("big", ArrowType::UInt64, true)]);
        let table = TableSchema::from_arrow("t", &schema);

        assert_eq!(table.unsupported_columns().len(), 1);
        assert_eq!(table.columns[0].data_type, DataType::Unknown("UInt64".to_string()));
    }
}

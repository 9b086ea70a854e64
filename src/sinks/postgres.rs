//! ## PostgreSQL sink
//!
//! Replaces a table with the contents of the trip table. The whole replacement runs in a
//! single transaction:
//!
//! 1. `CREATE SCHEMA IF NOT EXISTS`
//! 2. `DROP TABLE IF EXISTS` followed by `CREATE TABLE` with columns derived from the
//!    Arrow schema
//! 3. `COPY ... FROM STDIN BINARY` of every row
//! 4. `COMMIT`
//!
//! Concurrent readers therefore see either the previous table or the new one.

use super::TripSink;
use crate::exceptions::{EtlError, EtlResult};
use crate::settings::PostgresSettings;
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Schema,
    TimeUnit, TimestampMicrosecondType,
};
use async_trait::async_trait;
use datafusion::prelude::DataFrame;
use tokio_postgres::binary_copy::BinaryCopyInWriter;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;

/// Quotes an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `<schema>.<table>` destination of the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub schema: String,
    pub table: String,
}

impl TableTarget {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl From<&PostgresSettings> for TableTarget {
    fn from(settings: &PostgresSettings) -> Self {
        Self::new(&settings.schema, &settings.table)
    }
}

/// Column type used for an Arrow type, as (COPY type, DDL type).
pub fn pg_column_type(data_type: &DataType) -> EtlResult<(Type, &'static str)> {
    match data_type {
        DataType::Int16 => Ok((Type::INT2, "SMALLINT")),
        DataType::Int32 => Ok((Type::INT4, "INTEGER")),
        DataType::Int64 => Ok((Type::INT8, "BIGINT")),
        DataType::Float32 => Ok((Type::FLOAT4, "REAL")),
        DataType::Float64 => Ok((Type::FLOAT8, "DOUBLE PRECISION")),
        DataType::Boolean => Ok((Type::BOOL, "BOOLEAN")),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Ok((Type::TEXT, "TEXT")),
        DataType::Date32 => Ok((Type::DATE, "DATE")),
        DataType::Timestamp(_, None) => Ok((Type::TIMESTAMP, "TIMESTAMP")),
        dt => Err(EtlError::UnsupportedType(format!(
            "{:?} cannot be written to PostgreSQL",
            dt
        ))),
    }
}

/// Statements that recreate `target` with the columns of `schema`.
pub fn replace_table_sql(target: &TableTarget, schema: &Schema) -> EtlResult<String> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let (_, ddl) = pg_column_type(field.data_type())?;
            Ok(format!("{} {}", quote_ident(field.name()), ddl))
        })
        .collect::<EtlResult<Vec<_>>>()?;

    Ok(format!(
        "CREATE SCHEMA IF NOT EXISTS {schema};\n\
         DROP TABLE IF EXISTS {table};\n\
         CREATE TABLE {table} ({columns});",
        schema = quote_ident(&target.schema),
        table = target.qualified(),
        columns = columns.join(", "),
    ))
}

/// Binary COPY statement feeding every column of `schema` into `target`.
pub fn copy_sql(target: &TableTarget, schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| quote_ident(field.name()))
        .collect();
    format!(
        "COPY {} ({}) FROM STDIN BINARY",
        target.qualified(),
        columns.join(", ")
    )
}

/// Converts columns whose in-memory form differs from what the COPY writer expects.
fn prepare_column(array: &ArrayRef) -> EtlResult<ArrayRef> {
    match array.data_type() {
        DataType::Timestamp(TimeUnit::Microsecond, None) => Ok(array.clone()),
        DataType::Timestamp(_, None) => Ok(cast(
            array,
            &DataType::Timestamp(TimeUnit::Microsecond, None),
        )?),
        _ => Ok(array.clone()),
    }
}

type SqlValue = Box<dyn ToSql + Sync + Send>;

/// The value at `row`, typed for the COPY writer. Nulls become `None`.
pub fn cell_value(array: &dyn Array, row: usize) -> EtlResult<SqlValue> {
    let valid = array.is_valid(row);
    let value: SqlValue = match array.data_type() {
        DataType::Int16 => Box::new(valid.then(|| array.as_primitive::<Int16Type>().value(row))),
        DataType::Int32 => Box::new(valid.then(|| array.as_primitive::<Int32Type>().value(row))),
        DataType::Int64 => Box::new(valid.then(|| array.as_primitive::<Int64Type>().value(row))),
        DataType::Float32 => {
            Box::new(valid.then(|| array.as_primitive::<Float32Type>().value(row)))
        }
        DataType::Float64 => {
            Box::new(valid.then(|| array.as_primitive::<Float64Type>().value(row)))
        }
        DataType::Boolean => Box::new(valid.then(|| array.as_boolean().value(row))),
        DataType::Utf8 => {
            Box::new(valid.then(|| array.as_string::<i32>().value(row).to_string()))
        }
        DataType::LargeUtf8 => {
            Box::new(valid.then(|| array.as_string::<i64>().value(row).to_string()))
        }
        DataType::Utf8View => {
            Box::new(valid.then(|| array.as_string_view().value(row).to_string()))
        }
        DataType::Date32 => Box::new(if valid {
            array.as_primitive::<Date32Type>().value_as_date(row)
        } else {
            None
        }),
        DataType::Timestamp(TimeUnit::Microsecond, None) => Box::new(if valid {
            array
                .as_primitive::<TimestampMicrosecondType>()
                .value_as_datetime(row)
        } else {
            None
        }),
        dt => {
            return Err(EtlError::UnsupportedType(format!(
                "{:?} cannot be written to PostgreSQL",
                dt
            )))
        }
    };
    Ok(value)
}

/// Full-replace sink for a PostgreSQL table.
pub struct PostgresSink {
    config: tokio_postgres::Config,
    target: TableTarget,
}

impl PostgresSink {
    pub fn new(config: tokio_postgres::Config, target: TableTarget) -> Self {
        Self { config, target }
    }

    pub fn target(&self) -> &TableTarget {
        &self.target
    }

    async fn connect(&self) -> EtlResult<tokio_postgres::Client> {
        let (client, connection) = self.config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });
        Ok(client)
    }
}

#[async_trait]
impl TripSink for PostgresSink {
    fn describe(&self) -> String {
        format!("PostgreSQL table {}", self.target.qualified())
    }

    async fn export(&self, df: DataFrame) -> EtlResult<u64> {
        let schema = df.schema().as_arrow().clone();
        let types = schema
            .fields()
            .iter()
            .map(|field| pg_column_type(field.data_type()).map(|(ty, _)| ty))
            .collect::<EtlResult<Vec<Type>>>()?;
        let ddl = replace_table_sql(&self.target, &schema)?;
        let copy = copy_sql(&self.target, &schema);

        let batches = df.collect().await?;

        let mut client = self.connect().await?;
        let transaction = client.transaction().await?;
        tracing::debug!("Recreating {}", self.target.qualified());
        transaction.batch_execute(&ddl).await?;

        let sink = transaction.copy_in(copy.as_str()).await?;
        let writer = BinaryCopyInWriter::new(sink, &types);
        futures::pin_mut!(writer);
        for batch in &batches {
            let columns = batch
                .columns()
                .iter()
                .map(prepare_column)
                .collect::<EtlResult<Vec<ArrayRef>>>()?;
            for row in 0..batch.num_rows() {
                let values = columns
                    .iter()
                    .map(|column| cell_value(column.as_ref(), row))
                    .collect::<EtlResult<Vec<SqlValue>>>()?;
                let refs: Vec<&(dyn ToSql + Sync)> = values
                    .iter()
                    .map(|v| v.as_ref() as &(dyn ToSql + Sync))
                    .collect();
                writer.as_mut().write(&refs).await?;
            }
        }
        let written = writer.finish().await?;
        transaction.commit().await?;

        Ok(written)
    }
}

//! ## Green trip record schema
//!
//! The fixed column-type map used to parse the green taxi trip files. Columns are
//! matched by their header name, so the order of the columns in the file does not
//! matter, but every typed column must be present.

use crate::exceptions::{EtlError, EtlResult};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::sync::Arc;

pub const VENDOR_ID: &str = "VendorID";
pub const PICKUP_DATETIME: &str = "lpep_pickup_datetime";
pub const DROPOFF_DATETIME: &str = "lpep_dropoff_datetime";
pub const PASSENGER_COUNT: &str = "passenger_count";
pub const TRIP_DISTANCE: &str = "trip_distance";

/// Derived calendar date of the pickup timestamp.
pub const PICKUP_DATE: &str = "lpep_pickup_date";

/// Columns parsed as date-times.
pub const DATETIME_COLUMNS: [&str; 2] = [PICKUP_DATETIME, DROPOFF_DATETIME];

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

/// Every column a trip file must carry, with its type.
pub fn trip_column_types() -> Vec<(&'static str, DataType)> {
    vec![
        (VENDOR_ID, DataType::Int64),
        (PASSENGER_COUNT, DataType::Int64),
        (TRIP_DISTANCE, DataType::Float64),
        ("RatecodeID", DataType::Int64),
        ("store_and_fwd_flag", DataType::Utf8),
        ("PULocationID", DataType::Int64),
        ("DOLocationID", DataType::Int64),
        ("payment_type", DataType::Int64),
        ("fare_amount", DataType::Float64),
        ("extra", DataType::Float64),
        ("mta_tax", DataType::Float64),
        ("tip_amount", DataType::Float64),
        ("tolls_amount", DataType::Float64),
        ("improvement_surcharge", DataType::Float64),
        ("total_amount", DataType::Float64),
        ("congestion_surcharge", DataType::Float64),
        (PICKUP_DATETIME, timestamp_type()),
        (DROPOFF_DATETIME, timestamp_type()),
    ]
}

/// Columns the published files carry on top of the required ones.
fn optional_column_type(name: &str) -> Option<DataType> {
    match name {
        "ehail_fee" => Some(DataType::Float64),
        "trip_type" => Some(DataType::Int64),
        _ => None,
    }
}

/// Builds the Arrow schema for a CSV header, keeping the header's column order.
///
/// Unknown columns are read as `Utf8`. All fields are nullable.
pub fn schema_for_header<S: AsRef<str>>(header: &[S]) -> EtlResult<SchemaRef> {
    let required = trip_column_types();

    let missing: Vec<&str> = required
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !header.iter().any(|h| h.as_ref() == *name))
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::SchemaMismatch(format!(
            "header is missing columns: {}",
            missing.join(", ")
        )));
    }

    let fields: Vec<Field> = header
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let data_type = required
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, dt)| dt.clone())
                .or_else(|| optional_column_type(name))
                .unwrap_or(DataType::Utf8);
            Field::new(name, data_type, true)
        })
        .collect();

    Ok(Arc::new(Schema::new(fields)))
}

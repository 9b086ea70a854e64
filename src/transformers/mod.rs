//! # Trip table transformations
//!
//! The submodules contain the cleaning steps applied to the raw trip table. The standard
//! green taxi pipeline filters out empty trips, derives the pickup date and normalizes
//! the column names, in that order.

pub mod column_names;
pub mod pickup_date;
pub mod row_filter;

use crate::exceptions::{EtlError, EtlResult};
use crate::make_pipeline;
use crate::pipeline::Pipeline;
use crate::schema::{PASSENGER_COUNT, PICKUP_DATE, PICKUP_DATETIME, TRIP_DISTANCE};
use column_names::NormalizeColumnNames;
use datafusion::prelude::*;
use pickup_date::PickupDate;
use row_filter::PositiveTripFilter;

/// Validates that a column exists in the DataFrame.
pub(crate) fn require_column(df: &DataFrame, col_name: &str) -> EtlResult<()> {
    df.schema()
        .field_with_name(None, col_name)
        .map(|_| ())
        .map_err(|_| EtlError::MissingColumn(format!("Column '{}' not found", col_name)))
}

/// The cleaning pipeline of the green taxi job.
pub fn green_taxi_pipeline() -> Pipeline {
    make_pipeline!(
        (
            "positive_trips",
            PositiveTripFilter::new(PASSENGER_COUNT, TRIP_DISTANCE)
        ),
        ("pickup_date", PickupDate::new(PICKUP_DATETIME, PICKUP_DATE)),
        ("normalize_names", NormalizeColumnNames::new()),
    )
}

/// Applies [`green_taxi_pipeline`] to a trip table.
pub fn transform_trips(df: DataFrame) -> EtlResult<DataFrame> {
    green_taxi_pipeline().transform(df)
}

//! ## Dropping empty trips
//!
//! **PositiveTripFilter** keeps only the trips that carried at least one passenger over a
//! positive distance. Rows where either value is null fail the comparison and are dropped.

use super::require_column;
use crate::exceptions::EtlResult;
use crate::pipeline::Transformer;
use datafusion::prelude::*;
use datafusion_expr::{ident, lit};

pub struct PositiveTripFilter {
    pub passenger_count: String,
    pub trip_distance: String,
}

impl PositiveTripFilter {
    pub fn new(passenger_count: impl Into<String>, trip_distance: impl Into<String>) -> Self {
        Self {
            passenger_count: passenger_count.into(),
            trip_distance: trip_distance.into(),
        }
    }
}

impl Transformer for PositiveTripFilter {
    fn transform(&self, df: DataFrame) -> EtlResult<DataFrame> {
        require_column(&df, &self.passenger_count)?;
        require_column(&df, &self.trip_distance)?;

        let predicate = ident(&self.passenger_count)
            .gt(lit(0_i64))
            .and(ident(&self.trip_distance).gt(lit(0.0_f64)));
        Ok(df.filter(predicate)?)
    }
}

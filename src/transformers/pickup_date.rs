//! ## Deriving the pickup date
//!
//! **PickupDate** adds a `Date32` column holding the calendar date of a timestamp column.
//! If the target column already exists it is recomputed in place, which keeps the
//! transformation idempotent.

use super::require_column;
use crate::exceptions::{EtlError, EtlResult};
use crate::pipeline::Transformer;
use datafusion::arrow::datatypes::DataType;
use datafusion::prelude::*;
use datafusion_expr::{cast, ident, Expr};

pub struct PickupDate {
    pub source: String,
    pub target: String,
}

impl PickupDate {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    fn validate_source(&self, df: &DataFrame) -> EtlResult<()> {
        require_column(df, &self.source)?;
        let field = df.schema().field_with_name(None, &self.source)?;
        match field.data_type() {
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => Ok(()),
            dt => Err(EtlError::InvalidParameter(format!(
                "Column '{}' must be a datetime type (Timestamp, Date32, or Date64), but found {:?}",
                self.source, dt
            ))),
        }
    }
}

impl Transformer for PickupDate {
    fn transform(&self, df: DataFrame) -> EtlResult<DataFrame> {
        self.validate_source(&df)?;

        let date_expr = cast(ident(&self.source), DataType::Date32).alias(&self.target);
        let mut replaced = false;
        let mut exprs: Vec<Expr> = Vec::with_capacity(df.schema().fields().len() + 1);
        for field in df.schema().fields() {
            if field.name() == &self.target {
                exprs.push(date_expr.clone());
                replaced = true;
            } else {
                exprs.push(ident(field.name()));
            }
        }
        if !replaced {
            exprs.push(date_expr);
        }

        Ok(df.select(exprs)?)
    }
}

//! ## Normalizing column names
//!
//! **NormalizeColumnNames** replaces spaces with underscores and lowercases every column
//! name, e.g. `VendorID` becomes `vendorid` and `Trip Distance` becomes `trip_distance`.

use crate::exceptions::{EtlError, EtlResult};
use crate::pipeline::Transformer;
use datafusion::prelude::*;
use datafusion_expr::{ident, Expr};
use std::collections::HashMap;

/// Normalized form of a column name.
pub fn normalize_column_name(name: &str) -> String {
    name.replace(' ', "_").to_lowercase()
}

#[derive(Default)]
pub struct NormalizeColumnNames;

impl NormalizeColumnNames {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for NormalizeColumnNames {
    fn transform(&self, df: DataFrame) -> EtlResult<DataFrame> {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut exprs: Vec<Expr> = Vec::with_capacity(df.schema().fields().len());

        for field in df.schema().fields() {
            let original = field.name().as_str();
            let normalized = normalize_column_name(original);
            if let Some(previous) = seen.insert(normalized.clone(), original.to_string()) {
                return Err(EtlError::InvalidParameter(format!(
                    "Columns '{}' and '{}' both normalize to '{}'",
                    previous, original, normalized
                )));
            }
            exprs.push(ident(original).alias(normalized));
        }

        Ok(df.select(exprs)?)
    }
}

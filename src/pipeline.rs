//! ## Transformation pipeline
//!
//! This module provides the abstractions used to chain the cleaning steps applied to the
//! trip table.
//!
//! ### Overview
//!
//! - The [`Transformer`] trait defines a single stateless transformation step.
//! - The [`Pipeline`] struct applies a sequence of named steps in order. Each step only
//!   updates the DataFrame's logical plan, so nothing is executed until the result is
//!   collected or written by a sink.
//! - The [`crate::make_pipeline`] macro simplifies pipeline creation.

use crate::exceptions::{EtlError, EtlResult};
use datafusion::prelude::*;
use std::time::Instant;

/// A step of the transformation pipeline.
///
/// Steps are pure: the output depends on the input DataFrame only.
pub trait Transformer {
    /// Transform the input DataFrame, returning a new DataFrame with the transformation applied.
    ///
    /// # Arguments
    ///
    /// * `df` - The input DataFrame.
    ///
    /// # Returns
    ///
    /// * `EtlResult<DataFrame>` - The transformed DataFrame or an error if the plan is invalid.
    fn transform(&self, df: DataFrame) -> EtlResult<DataFrame>;
}

/// A pipeline that chains a sequence of transformers.
///
/// Each transformer's output is passed as input to the next one.
pub struct Pipeline {
    steps: Vec<(String, Box<dyn Transformer + Send + Sync>)>,
}

impl Pipeline {
    /// Creates a new pipeline.
    ///
    /// # Arguments
    ///
    /// * `steps` - A vector of (name, transformer) pairs (each transformer is already boxed).
    pub fn new(steps: Vec<(String, Box<dyn Transformer + Send + Sync>)>) -> Self {
        Self { steps }
    }

    /// Names of the steps, in application order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Applies every step in order.
    ///
    /// Errors are returned unchanged; the failing step is reported in the log.
    pub fn transform(&self, df: DataFrame) -> EtlResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(EtlError::InvalidParameter(
                "Pipeline must have at least one transformer.".to_string(),
            ));
        }
        let mut current_df = df;
        for (name, step) in self.steps.iter() {
            tracing::debug!("Applying transformer: {}", name);
            let start = Instant::now();
            current_df = step.transform(current_df).inspect_err(|e| {
                tracing::error!("Transformer '{}' failed: {}", name, e);
            })?;
            tracing::debug!("Step '{}' planned in {:?}", name, start.elapsed());
        }
        Ok(current_df)
    }
}

/// Macro to simplify pipeline creation by automatically boxing transformers.
///
/// # Example
///
/// ```rust,no_run
/// use green_taxi_etl::make_pipeline;
/// use green_taxi_etl::transformers::column_names::NormalizeColumnNames;
///
/// let pipeline = make_pipeline!(("normalize_names", NormalizeColumnNames::new()));
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($(($name:expr, $transformer:expr)),+ $(,)?) => {
        {
            let steps: Vec<(String, Box<dyn $crate::pipeline::Transformer + Send + Sync>)> = vec![
                $(
                    ($name.to_string(), Box::new($transformer)),
                )+
            ];
            $crate::pipeline::Pipeline::new(steps)
        }
    };
}

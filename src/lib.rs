//! # Green Taxi ETL
//!
//! Downloads the NYC green taxi trip files, drops trips without passengers or distance,
//! derives the pickup date, normalizes column names and exports the result either to a
//! PostgreSQL table or to a date-partitioned Parquet dataset in Google Cloud Storage.
//!
//! - [`loader`]: fetch and parse the raw CSV files.
//! - [`transformers`]: the cleaning steps, chained with [`pipeline::Pipeline`].
//! - [`sinks`]: the PostgreSQL and Parquet dataset export targets.
//! - [`jobs`]: the two job entry points.

pub mod exceptions;
pub mod io_config;
pub mod jobs;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod settings;
pub mod sinks;
pub mod transformers;

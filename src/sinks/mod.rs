//! # Export targets
//!
//! A [`TripSink`] writes the transformed trip table somewhere and reports how many rows
//! it wrote. Two sinks exist, used by two separate job entry points:
//!
//! - [`postgres::PostgresSink`] replaces a table in a PostgreSQL schema.
//! - [`parquet_dataset::ParquetDatasetSink`] writes a Hive-partitioned Parquet dataset to
//!   an object store.

pub mod parquet_dataset;
pub mod postgres;

use crate::exceptions::EtlResult;
use async_trait::async_trait;
use datafusion::prelude::DataFrame;

#[async_trait]
pub trait TripSink: Send + Sync {
    /// Human readable destination, used in logs.
    fn describe(&self) -> String;

    /// Writes every row of `df`, returning the number of rows written.
    async fn export(&self, df: DataFrame) -> EtlResult<u64>;
}

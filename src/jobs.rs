//! ## Job entry points
//!
//! The job loads and cleans the trip files once per run and hands the result to a single
//! sink. The two exports are separate entry points: a run writes either to PostgreSQL or
//! to the object store, never both.

use crate::exceptions::EtlResult;
use crate::io_config::PostgresProfile;
use crate::loader::TripLoader;
use crate::settings::EtlConfig;
use crate::sinks::parquet_dataset::{gcs_store, DatasetTarget, ParquetDatasetSink};
use crate::sinks::postgres::{PostgresSink, TableTarget};
use crate::sinks::TripSink;
use crate::transformers::transform_trips;
use datafusion::prelude::*;
use std::time::Instant;

/// Loads every configured source and applies the cleaning pipeline.
pub async fn extract_and_transform(
    config: &EtlConfig,
    ctx: &SessionContext,
) -> EtlResult<DataFrame> {
    let raw = TripLoader::from_settings(&config.source).load(ctx).await?;
    transform_trips(raw)
}

/// Writes `df` to `sink`, logging the outcome.
pub async fn run_export(df: DataFrame, sink: &dyn TripSink) -> EtlResult<u64> {
    let destination = sink.describe();
    tracing::info!("Exporting to {}", destination);
    let start = Instant::now();
    let rows = sink.export(df).await?;
    tracing::info!(
        "Wrote {} rows to {} in {:?}",
        rows,
        destination,
        start.elapsed()
    );
    Ok(rows)
}

/// Replaces the configured PostgreSQL table with the cleaned trips.
pub async fn export_to_postgres(config: &EtlConfig) -> EtlResult<u64> {
    // Resolve the connection before downloading anything.
    let profile = PostgresProfile::load(&config.postgres.config_path, &config.postgres.profile)?;
    let sink = PostgresSink::new(profile.pg_config(), TableTarget::from(&config.postgres));

    let ctx = SessionContext::new();
    let trips = extract_and_transform(config, &ctx).await?;
    run_export(trips, &sink).await
}

/// Writes the cleaned trips as a date-partitioned Parquet dataset to GCS.
pub async fn export_to_object_store(config: &EtlConfig) -> EtlResult<u64> {
    let store = gcs_store(&config.gcs)?;
    let sink = ParquetDatasetSink::new(
        store,
        DatasetTarget::from_settings(&config.gcs)?,
        config.gcs.write_mode,
    );

    let ctx = SessionContext::new();
    let trips = extract_and_transform(config, &ctx).await?;
    run_export(trips, &sink).await
}

//! ## Partitioned Parquet dataset sink
//!
//! Writes the trip table as a Hive-style partitioned Parquet dataset:
//!
//! ```text
//! gs://<bucket>/<dataset>/<partition_column>=2020-10-05/<file>.parquet
//! gs://<bucket>/<dataset>/<partition_column>=2020-10-06/<file>.parquet
//! ```
//!
//! The partition column is stored in the directory names only. With
//! [`WriteMode::Overwrite`] every object under `<dataset>/` is deleted before the new
//! files are written; with [`WriteMode::Append`] existing files are kept.
//! Rows without a partition value land in [`NULL_PARTITION`].

use super::TripSink;
use crate::exceptions::{EtlError, EtlResult};
use crate::settings::{GcsSettings, WriteMode};
use crate::transformers::require_column;
use arrow::array::AsArray;
use arrow::datatypes::{DataType, UInt64Type};
use async_trait::async_trait;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::*;
use datafusion::functions::expr_fn::coalesce;
use datafusion_expr::{cast, ident, lit, Expr};
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use std::sync::Arc;
use url::Url;

/// Directory value Hive readers decode as a null partition value.
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Location of the dataset inside an object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetTarget {
    /// URL the store is registered under, e.g. `gs://bucket`.
    pub store_url: Url,
    pub dataset: String,
    pub partition_column: String,
}

impl DatasetTarget {
    pub fn new(
        store_url: &str,
        dataset: impl Into<String>,
        partition_column: impl Into<String>,
    ) -> EtlResult<Self> {
        let dataset: String = dataset.into();
        let dataset = dataset.trim_matches('/').to_string();
        if dataset.is_empty() {
            return Err(EtlError::InvalidParameter(
                "Dataset name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            store_url: Url::parse(store_url)?,
            dataset,
            partition_column: partition_column.into(),
        })
    }

    pub fn from_settings(settings: &GcsSettings) -> EtlResult<Self> {
        Self::new(
            &settings.store_url(),
            &settings.dataset,
            &settings.partition_column,
        )
    }

    /// Directory URL handed to the Parquet writer.
    pub fn dataset_url(&self) -> String {
        format!(
            "{}/{}/",
            self.store_url.as_str().trim_end_matches('/'),
            self.dataset
        )
    }

    /// Object prefix holding every file of the dataset.
    pub fn prefix(&self) -> ObjectPath {
        ObjectPath::from(self.dataset.as_str())
    }
}

/// Builds a Google Cloud Storage client for the configured bucket.
///
/// Credentials come from the environment (`GOOGLE_APPLICATION_CREDENTIALS`,
/// `GOOGLE_SERVICE_ACCOUNT`, ...) unless a credentials file is configured.
pub fn gcs_store(settings: &GcsSettings) -> EtlResult<Arc<dyn ObjectStore>> {
    let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&settings.bucket);
    if let Some(path) = &settings.credentials_path {
        builder = builder.with_application_credentials(path.to_string_lossy());
    }
    tracing::debug!(
        "GCS client for bucket '{}' (project '{}')",
        settings.bucket,
        settings.project_id
    );
    Ok(Arc::new(builder.build()?))
}

pub struct ParquetDatasetSink {
    store: Arc<dyn ObjectStore>,
    target: DatasetTarget,
    write_mode: WriteMode,
}

impl ParquetDatasetSink {
    pub fn new(store: Arc<dyn ObjectStore>, target: DatasetTarget, write_mode: WriteMode) -> Self {
        Self {
            store,
            target,
            write_mode,
        }
    }

    pub fn target(&self) -> &DatasetTarget {
        &self.target
    }

    /// Deletes every object under the dataset prefix, returning how many were removed.
    pub async fn clear_dataset(&self) -> EtlResult<usize> {
        let prefix = self.target.prefix();
        let existing: Vec<ObjectMeta> = self.store.list(Some(&prefix)).try_collect().await?;
        for meta in &existing {
            self.store.delete(&meta.location).await?;
        }
        Ok(existing.len())
    }

    /// Renders the partition column as text so directory names hold ISO dates.
    /// Nulls become [`NULL_PARTITION`] instead of an empty directory value.
    fn partition_values_as_text(&self, df: DataFrame) -> EtlResult<DataFrame> {
        require_column(&df, &self.target.partition_column)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                if field.name() == &self.target.partition_column {
                    coalesce(vec![
                        cast(ident(field.name()), DataType::Utf8),
                        lit(NULL_PARTITION),
                    ])
                    .alias(field.name())
                } else {
                    ident(field.name())
                }
            })
            .collect();
        Ok(df.select(exprs)?)
    }
}

#[async_trait]
impl TripSink for ParquetDatasetSink {
    fn describe(&self) -> String {
        format!(
            "Parquet dataset {} partitioned by {}",
            self.target.dataset_url(),
            self.target.partition_column
        )
    }

    async fn export(&self, df: DataFrame) -> EtlResult<u64> {
        let df = self.partition_values_as_text(df)?;
        df.task_ctx()
            .runtime_env()
            .register_object_store(&self.target.store_url, self.store.clone());

        if self.write_mode == WriteMode::Overwrite {
            let removed = self.clear_dataset().await?;
            tracing::info!(
                "Removed {} existing objects under {}",
                removed,
                self.target.dataset_url()
            );
        }

        let options = DataFrameWriteOptions::new()
            .with_partition_by(vec![self.target.partition_column.clone()]);
        let results = df
            .write_parquet(&self.target.dataset_url(), options, None)
            .await?;

        let written = results
            .iter()
            .filter_map(|batch| batch.column(0).as_primitive_opt::<UInt64Type>())
            .flat_map(|counts| counts.values().iter().copied())
            .sum();
        Ok(written)
    }
}

//! ## Errors for the green taxi ETL job
//!
//! This module defines the error type shared by every stage of the job.
//! It uses the `thiserror` crate to derive the `Error` trait. Failures raised by the
//! underlying libraries (HTTP client, CSV reader, DataFusion, PostgreSQL client,
//! object store) are wrapped as-is so the original message reaches the operator.
//!
//! The `EtlResult` type alias simplifies the signatures of the library functions.
//!
//! ### Example
//!
//! ```rust
//! use green_taxi_etl::exceptions::{EtlError, EtlResult};
//!
//! fn check_urls(urls: &[String]) -> EtlResult<()> {
//!     if urls.is_empty() {
//!         return Err(EtlError::InvalidParameter("no source urls configured".into()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Errors raised while loading, transforming or exporting trip data.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow (including CSV parse failures).
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps errors from the HTTP client used to download source files.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Wraps errors from the PostgreSQL client.
    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] tokio_postgres::Error),

    /// Wraps errors from the object store.
    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    /// Wraps URL parse failures.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    /// Wraps YAML (de)serialization errors.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Indicates a configuration problem (unknown profile, unset environment variable, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Indicates that an invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Indicates that the specified column does not exist in the DataFrame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Indicates that a source file does not match the expected trip schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Indicates a column type that a sink cannot write.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
}

/// A convenient result type for ETL operations.
pub type EtlResult<T> = std::result::Result<T, EtlError>;

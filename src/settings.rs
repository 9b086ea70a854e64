//! ## Job configuration
//!
//! Every environment-specific value of the job (source URLs, target schema and table,
//! bucket and dataset names, credential paths) lives in [`EtlConfig`]. The defaults
//! reproduce the values the job has always used, so running without a configuration
//! file behaves exactly like the hardcoded job. A YAML file may override any subset:
//!
//! ```yaml
//! source:
//!   urls:
//!     - ./data/green_tripdata_2020-10.csv.gz
//! postgres:
//!   profile: default
//!   table: green_taxi_2020_q4
//! gcs:
//!   bucket: my-bucket
//!   write_mode: append
//! ```

use crate::exceptions::EtlResult;
use crate::schema::PICKUP_DATE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const GREEN_TRIPS_RELEASE: &str =
    "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/green";

/// Complete configuration of one job run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub source: SourceSettings,
    pub postgres: PostgresSettings,
    pub gcs: GcsSettings,
}

/// Where the raw trip files come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Locations fetched in order: `http(s)://` URLs, `file://` URLs or local paths.
    pub urls: Vec<String>,
    /// Number of CSV rows per Arrow record batch.
    pub batch_size: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            urls: ["2020-10", "2020-11", "2020-12"]
                .iter()
                .map(|month| format!("{GREEN_TRIPS_RELEASE}/green_tripdata_{month}.csv.gz"))
                .collect(),
            batch_size: 8192,
        }
    }
}

/// Target of the relational sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresSettings {
    /// Path of the `io_config.yaml` holding connection profiles.
    pub config_path: PathBuf,
    /// Profile inside `config_path` to connect with.
    pub profile: String,
    pub schema: String,
    pub table: String,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("io_config.yaml"),
            profile: "dev".to_string(),
            schema: "mage".to_string(),
            table: "green_taxi".to_string(),
        }
    }
}

/// What happens to files already present under the dataset prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Delete everything under the dataset prefix before writing.
    #[default]
    Overwrite,
    /// Add new files next to the existing ones.
    Append,
}

/// Target of the object-store sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcsSettings {
    pub bucket: String,
    /// Informational only: logged with the bucket, never sent to GCS. The bucket name
    /// alone identifies the store and credentials carry their own project.
    pub project_id: String,
    /// Top-level directory of the dataset inside the bucket.
    pub dataset: String,
    pub partition_column: String,
    /// Credentials file; when unset, `GOOGLE_APPLICATION_CREDENTIALS` and friends are used.
    pub credentials_path: Option<PathBuf>,
    pub write_mode: WriteMode,
}

impl Default for GcsSettings {
    fn default() -> Self {
        Self {
            bucket: "mage-zoomcamp-temitope-bamidele".to_string(),
            project_id: "sunny-web-411214".to_string(),
            dataset: "nyc_green_taxi_data".to_string(),
            partition_column: PICKUP_DATE.to_string(),
            credentials_path: None,
            write_mode: WriteMode::Overwrite,
        }
    }
}

impl GcsSettings {
    /// `gs://<bucket>`, the URL the store is registered under.
    pub fn store_url(&self) -> String {
        format!("gs://{}", self.bucket)
    }
}

impl EtlConfig {
    /// Reads a YAML configuration file. Missing keys keep their defaults.
    pub fn from_path(path: &Path) -> EtlResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> EtlResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Uses the file when one is given, the defaults otherwise.
    pub fn load(path: Option<&Path>) -> EtlResult<Self> {
        match path {
            Some(path) => {
                tracing::info!("Reading job configuration from {}", path.display());
                Self::from_path(path)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_hardcoded_job() {
        let config = EtlConfig::default();
        assert_eq!(config.source.urls.len(), 3);
        assert!(config.source.urls[0].ends_with("green_tripdata_2020-10.csv.gz"));
        assert!(config.source.urls[2].ends_with("green_tripdata_2020-12.csv.gz"));
        assert_eq!(config.postgres.schema, "mage");
        assert_eq!(config.postgres.table, "green_taxi");
        assert_eq!(config.postgres.profile, "dev");
        assert_eq!(config.gcs.store_url(), "gs://mage-zoomcamp-temitope-bamidele");
        assert_eq!(config.gcs.dataset, "nyc_green_taxi_data");
        assert_eq!(config.gcs.partition_column, "lpep_pickup_date");
        assert_eq!(config.gcs.write_mode, WriteMode::Overwrite);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EtlConfig::from_yaml(
            "postgres:\n  table: trips\ngcs:\n  write_mode: append\n",
        )
        .unwrap();
        assert_eq!(config.postgres.table, "trips");
        assert_eq!(config.postgres.schema, "mage");
        assert_eq!(config.gcs.write_mode, WriteMode::Append);
        assert_eq!(config.source, SourceSettings::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(EtlConfig::from_yaml("  \n").unwrap(), EtlConfig::default());
    }

    #[test]
    fn test_unknown_write_mode_is_rejected() {
        assert!(EtlConfig::from_yaml("gcs:\n  write_mode: merge\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source:\n  urls: [a.csv.gz, b.csv.gz]\n  batch_size: 16").unwrap();
        let config = EtlConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.source.urls, vec!["a.csv.gz", "b.csv.gz"]);
        assert_eq!(config.source.batch_size, 16);
    }

    #[test]
    fn test_load_without_file() {
        assert_eq!(EtlConfig::load(None).unwrap(), EtlConfig::default());
    }
}

//! ## Loading raw trip files
//!
//! This module downloads the configured trip files one after another, decompresses
//! them, parses them with the fixed trip schema and concatenates everything into a
//! single in-memory table.
//!
//! - **SourceFetcher:** Reads raw bytes from `http(s)://` URLs, `file://` URLs or local paths.
//! - **parse_trip_csv:** Turns the bytes of one file into Arrow record batches.
//! - **TripLoader:** Runs the fetch-and-parse step for every location, in order, and
//!   exposes the result as a DataFusion `DataFrame`.
//!
//! There are no retries: the first failing location aborts the load.

use crate::exceptions::{EtlError, EtlResult};
use crate::schema::schema_for_header;
use crate::settings::SourceSettings;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use flate2::read::GzDecoder;
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::Arc;
use url::Url;

/// Compression of a source file, detected from its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Uncompressed,
}

impl Compression {
    pub fn from_location(location: &str) -> Self {
        // Query strings never carry the extension.
        let path = location.split(['?', '#']).next().unwrap_or(location);
        if path.ends_with(".gz") {
            Compression::Gzip
        } else {
            Compression::Uncompressed
        }
    }

    fn decompress(self, bytes: &[u8]) -> EtlResult<Vec<u8>> {
        match self {
            Compression::Gzip => {
                let mut decoded = Vec::with_capacity(bytes.len() * 4);
                GzDecoder::new(bytes).read_to_end(&mut decoded)?;
                Ok(decoded)
            }
            Compression::Uncompressed => Ok(bytes.to_vec()),
        }
    }
}

/// Fetches the raw bytes of a source location.
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn fetch(&self, location: &str) -> EtlResult<Vec<u8>> {
        match Url::parse(location) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                let response = self.client.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|_| {
                    EtlError::InvalidParameter(format!("Invalid file URL '{}'", location))
                })?;
                Ok(tokio::fs::read(path).await?)
            }
            // Single-letter schemes are Windows drive letters.
            Ok(url) if url.scheme().len() > 1 => Err(EtlError::InvalidParameter(format!(
                "Unsupported scheme '{}' in source '{}'",
                url.scheme(),
                location
            ))),
            _ => Ok(tokio::fs::read(location).await?),
        }
    }
}

/// Parses one (possibly compressed) trip file.
///
/// The header decides the column order; [`schema_for_header`] decides the types.
/// Empty fields are read as nulls in every column, including text columns.
pub fn parse_trip_csv(
    bytes: &[u8],
    compression: Compression,
    batch_size: usize,
) -> EtlResult<(SchemaRef, Vec<RecordBatch>)> {
    if batch_size == 0 {
        return Err(EtlError::InvalidParameter(
            "batch_size must be greater than zero".to_string(),
        ));
    }
    let text = compression.decompress(bytes)?;

    let (header, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(&text), Some(0))?;
    let header: Vec<&str> = header.fields().iter().map(|f| f.name().as_str()).collect();
    let schema = schema_for_header(&header)?;

    let empty_is_null =
        Regex::new("^$").map_err(|e| EtlError::InvalidParameter(e.to_string()))?;
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(batch_size)
        .with_null_regex(empty_is_null)
        .build(Cursor::new(&text))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok((schema, batches))
}

/// Loads every configured trip file into one table.
pub struct TripLoader {
    fetcher: SourceFetcher,
    locations: Vec<String>,
    batch_size: usize,
}

impl TripLoader {
    pub fn new(locations: Vec<String>, batch_size: usize) -> Self {
        Self {
            fetcher: SourceFetcher::new(),
            locations,
            batch_size,
        }
    }

    pub fn from_settings(settings: &SourceSettings) -> Self {
        Self::new(settings.urls.clone(), settings.batch_size)
    }

    /// Fetches and parses every location in order.
    ///
    /// All files must share the schema of the first one.
    pub async fn load_batches(&self) -> EtlResult<(SchemaRef, Vec<RecordBatch>)> {
        if self.locations.is_empty() {
            return Err(EtlError::InvalidParameter(
                "At least one source location is required.".to_string(),
            ));
        }

        let mut table_schema: Option<SchemaRef> = None;
        let mut batches = Vec::new();
        for location in &self.locations {
            let bytes = self.fetcher.fetch(location).await?;
            let (schema, file_batches) = parse_trip_csv(
                &bytes,
                Compression::from_location(location),
                self.batch_size,
            )?;
            let rows: usize = file_batches.iter().map(|b| b.num_rows()).sum();
            tracing::info!("Loaded {} ({} bytes, {} rows)", location, bytes.len(), rows);

            if let Some(expected) = &table_schema {
                if expected != &schema {
                    return Err(EtlError::SchemaMismatch(format!(
                        "Columns of '{}' differ from those of '{}'",
                        location, self.locations[0]
                    )));
                }
            } else {
                tracing::debug!("Trip schema: {:?}", schema);
                table_schema = Some(schema);
            }
            batches.extend(file_batches);
        }

        // Non-empty locations guarantee a schema at this point.
        let schema = table_schema.ok_or_else(|| {
            EtlError::InvalidParameter("No source produced a schema".to_string())
        })?;
        Ok((schema, batches))
    }

    /// Loads all files and registers them as one in-memory partition.
    pub async fn load(&self, ctx: &SessionContext) -> EtlResult<DataFrame> {
        let (schema, batches) = self.load_batches().await?;
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        tracing::info!(
            "Concatenated {} source files into {} rows",
            self.locations.len(),
            total
        );
        let table = MemTable::try_new(schema, vec![batches])?;
        Ok(ctx.read_table(Arc::new(table))?)
    }
}

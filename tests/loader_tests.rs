use arrow::array::{Array, AsArray};
use arrow::record_batch::RecordBatch;
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Date32Type, Float64Type, Int64Type, TimeUnit};
use datafusion::prelude::*;
use flate2::write::GzEncoder;
use green_taxi_etl::exceptions::{EtlError, EtlResult};
use green_taxi_etl::jobs::extract_and_transform;
use green_taxi_etl::loader::{parse_trip_csv, Compression, TripLoader};
use green_taxi_etl::settings::{EtlConfig, SourceSettings};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const HEADER: &str = "VendorID,lpep_pickup_datetime,lpep_dropoff_datetime,store_and_fwd_flag,\
RatecodeID,PULocationID,DOLocationID,passenger_count,trip_distance,fare_amount,extra,mta_tax,\
tip_amount,tolls_amount,ehail_fee,improvement_surcharge,total_amount,payment_type,trip_type,\
congestion_surcharge";

/// One CSV line of a green trip with the given identifying fields.
fn trip_line(vendor: &str, pickup: &str, passengers: &str, distance: &str) -> String {
    format!(
        "{vendor},{pickup},2020-10-05 08:40:00,N,1,74,41,{passengers},{distance},\
         12.5,0.5,0.5,2.0,0,,0.3,15.8,1,1,0"
    )
}

fn csv_text(lines: &[String]) -> String {
    let mut text = String::from(HEADER);
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    text.push('\n');
    text
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Two files: October (gzip, three trips) and November (plain, two trips).
fn write_month_files(dir: &Path) -> Vec<String> {
    let october = csv_text(&[
        trip_line("2", "2020-10-05 08:15:00", "1", "3.2"),
        trip_line("2", "2020-10-05 09:00:00", "0", "2.5"),
        trip_line("1", "2020-10-06 10:00:00", "2", "0"),
    ]);
    let november = csv_text(&[
        trip_line("1", "2020-11-01 00:30:00", "", "1.1"),
        trip_line("2", "2020-11-02 17:45:10", "3", "4.75"),
    ]);
    let oct = write_file(dir, "green_tripdata_2020-10.csv.gz", &gzip(&october));
    let nov = write_file(dir, "green_tripdata_2020-11.csv", november.as_bytes());
    vec![
        oct.to_string_lossy().into_owned(),
        nov.to_string_lossy().into_owned(),
    ]
}

async fn collect_single(df: DataFrame) -> EtlResult<RecordBatch> {
    let schema = Arc::new(df.schema().as_arrow().clone());
    let batches = df.collect().await?;
    Ok(concat_batches(&schema, &batches)?)
}

#[test]
fn test_parse_gzip_csv() -> EtlResult<()> {
    let text = csv_text(&[
        trip_line("2", "2020-10-05 08:15:00", "1", "3.2"),
        trip_line("1", "2020-10-05 09:00:00", "", "0.9"),
    ]);
    let (schema, batches) = parse_trip_csv(&gzip(&text), Compression::Gzip, 1024)?;

    assert_eq!(schema.fields().len(), 20);
    assert_eq!(
        schema.field_with_name("lpep_pickup_datetime")?.data_type(),
        &DataType::Timestamp(TimeUnit::Microsecond, None)
    );
    let batch = concat_batches(&schema, &batches)?;
    assert_eq!(batch.num_rows(), 2);

    let passengers = batch
        .column(schema.index_of("passenger_count")?)
        .as_primitive::<Int64Type>();
    assert_eq!(passengers.value(0), 1);
    assert!(passengers.is_null(1));

    // Empty fields are nulls.
    let ehail = batch.column(schema.index_of("ehail_fee")?);
    assert_eq!(ehail.null_count(), 2);
    Ok(())
}

#[test]
fn test_parse_respects_batch_size() -> EtlResult<()> {
    let lines: Vec<String> = (0..5)
        .map(|i| trip_line("1", &format!("2020-10-0{} 12:00:00", i + 1), "1", "1.0"))
        .collect();
    let text = csv_text(&lines);
    let (_, batches) = parse_trip_csv(text.as_bytes(), Compression::Uncompressed, 2)?;
    assert_eq!(batches.len(), 3);
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 5);
    Ok(())
}

#[test]
fn test_parse_invalid_value_is_arrow_error() {
    let text = csv_text(&[trip_line("2", "2020-10-05 08:15:00", "one", "3.2")]);
    let result = parse_trip_csv(text.as_bytes(), Compression::Uncompressed, 1024);
    assert!(matches!(result, Err(EtlError::ArrowError(_))));
}

#[test]
fn test_parse_missing_column_is_schema_mismatch() {
    let text = "VendorID,lpep_pickup_datetime\n2,2020-10-05 08:15:00\n";
    let result = parse_trip_csv(text.as_bytes(), Compression::Uncompressed, 1024);
    assert!(matches!(result, Err(EtlError::SchemaMismatch(_))));
}

#[test]
fn test_parse_corrupt_gzip_is_io_error() {
    let result = parse_trip_csv(b"definitely not gzip", Compression::Gzip, 1024);
    assert!(matches!(result, Err(EtlError::IoError(_))));
}

#[tokio::test]
async fn test_loader_concatenates_in_source_order() -> EtlResult<()> {
    let dir = TempDir::new()?;
    let locations = write_month_files(dir.path());

    let ctx = SessionContext::new();
    let df = TripLoader::new(locations, 1024).load(&ctx).await?;
    let batch = collect_single(df).await?;

    assert_eq!(batch.num_rows(), 5);
    let distance = batch
        .column(batch.schema().index_of("trip_distance")?)
        .as_primitive::<Float64Type>();
    let distances: Vec<f64> = (0..batch.num_rows()).map(|i| distance.value(i)).collect();
    assert_eq!(distances, vec![3.2, 2.5, 0.0, 1.1, 4.75]);
    Ok(())
}

#[tokio::test]
async fn test_loader_accepts_file_urls() -> EtlResult<()> {
    let dir = TempDir::new()?;
    let locations: Vec<String> = write_month_files(dir.path())
        .iter()
        .map(|path| url::Url::from_file_path(path).unwrap().to_string())
        .collect();

    let (_, batches) = TripLoader::new(locations, 1024).load_batches().await?;
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 5);
    Ok(())
}

#[tokio::test]
async fn test_loader_rejects_differing_schemas() -> EtlResult<()> {
    let dir = TempDir::new()?;
    let mut locations = write_month_files(dir.path());
    let extra = format!(
        "{HEADER},airport_fee\n{},0\n",
        trip_line("2", "2020-12-01 00:00:00", "1", "1.0")
    );
    let december = write_file(dir.path(), "green_tripdata_2020-12.csv", extra.as_bytes());
    locations.push(december.to_string_lossy().into_owned());

    let result = TripLoader::new(locations, 1024).load_batches().await;
    assert!(matches!(result, Err(EtlError::SchemaMismatch(_))));
    Ok(())
}

#[tokio::test]
async fn test_loader_fails_on_first_missing_source() -> EtlResult<()> {
    let dir = TempDir::new()?;
    let mut locations = write_month_files(dir.path());
    locations.insert(1, dir.path().join("missing.csv.gz").to_string_lossy().into_owned());

    let result = TripLoader::new(locations, 1024).load_batches().await;
    assert!(matches!(result, Err(EtlError::IoError(_))));
    Ok(())
}

#[tokio::test]
async fn test_extract_and_transform_from_local_files() -> EtlResult<()> {
    let dir = TempDir::new()?;
    let config = EtlConfig {
        source: SourceSettings {
            urls: write_month_files(dir.path()),
            batch_size: 2,
        },
        ..Default::default()
    };

    let ctx = SessionContext::new();
    let batch = collect_single(extract_and_transform(&config, &ctx).await?).await?;

    // Kept: October 08:15 trip and the November 17:45 trip.
    assert_eq!(batch.num_rows(), 2);
    assert!(batch.schema().index_of("vendorid").is_ok());
    assert!(batch.schema().index_of("pulocationid").is_ok());
    assert!(batch.schema().index_of("VendorID").is_err());

    let dates = batch
        .column(batch.schema().index_of("lpep_pickup_date")?)
        .as_primitive::<Date32Type>();
    assert_eq!(
        dates.value_as_date(0),
        chrono::NaiveDate::from_ymd_opt(2020, 10, 5)
    );
    assert_eq!(
        dates.value_as_date(1),
        chrono::NaiveDate::from_ymd_opt(2020, 11, 2)
    );
    Ok(())
}

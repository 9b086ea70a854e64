//! Loads the green taxi trips and replaces the configured PostgreSQL table with them.
//!
//! Usage: `green-taxi-to-postgres [job-config.yaml]`

use green_taxi_etl::exceptions::EtlResult;
use green_taxi_etl::jobs::export_to_postgres;
use green_taxi_etl::logging::init_job_logging;
use green_taxi_etl::settings::EtlConfig;
use std::path::PathBuf;
use std::process::ExitCode;

async fn run() -> EtlResult<u64> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = EtlConfig::load(config_path.as_deref())?;
    export_to_postgres(&config).await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_job_logging();
    match run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Export to PostgreSQL failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

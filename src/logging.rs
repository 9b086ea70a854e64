//! ## Logging Configuration
//!
//! Logging is set up automatically at program startup using the `ctor` crate.
//! Behavior is controlled by the `DEBUG_GREEN_TAXI_ETL` environment variable:
//!
//! - **Disabled** (default): If the variable is unset, empty, or explicitly set to `"0"` or `"false"`,
//!   no subscriber is installed at startup.
//! - **Enabled**: Any other value enables logging with a maximum log level of `DEBUG`.
//!
//! The job binaries additionally call [`init_job_logging`], which installs an `INFO`
//! subscriber when debug logging was not requested.
//!
//! ### Usage Example
//!
//! ```sh
//! export DEBUG_GREEN_TAXI_ETL=true
//! ```

use ctor::ctor;
use tracing::Level;

/// Name of the environment variable that enables debug logging.
pub const DEBUG_ENV_VAR: &str = "DEBUG_GREEN_TAXI_ETL";

fn debug_requested(value: Option<&str>) -> bool {
    value.is_some_and(|v| !(v == "0" || v == "false" || v.is_empty()))
}

#[ctor]
fn set_debug_level() {
    if debug_requested(std::env::var(DEBUG_ENV_VAR).ok().as_deref()) {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .try_init();
    }
}

/// Installs an `INFO` level subscriber unless one is already active.
pub fn init_job_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .try_init();
}

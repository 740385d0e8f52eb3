use log::{LevelFilter, info};
use notifier_models::errors::SendableError;

use crate::logger::{self, print_env};

/// Install logging and the panic logger, then print the banner.
///
/// Panic backtraces come from `log-panics`, so the process environment is left untouched.
pub fn startup(name: &str, log_file: &str, level: LevelFilter) -> Result<(), SendableError> {
    logger::setup_logger(log_file, level)?;
    log_panics::init();

    info!("--- {} ---", name);
    print_env()?;

    Ok(())
}

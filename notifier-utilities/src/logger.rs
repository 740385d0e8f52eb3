use std::{env, time::SystemTime};
use log::{LevelFilter, info};
use notifier_models::errors::SendableError;

/// Install the global logger: stdout plus an append-only log file.
pub fn setup_logger(log_file: &str, level: LevelFilter) -> Result<(), SendableError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // AMQP frame tracing is noise below info
        .level_for("lapin", level.min(LevelFilter::Info))
        .level_for("amq_protocol", LevelFilter::Warn)
        .chain(std::io::stdout())
        .chain(fern::log_file(log_file)?)
        .apply()?;
    Ok(())
}

pub fn print_env() -> std::io::Result<()> {
    let path = env::current_dir()?;
    info!("The current directory is {}", path.display());
    Ok(())
}

// In: src/observability.rs

//! Logging setup and structured run metrics.
//!
//! The crate only ever talks to the `log` facade. Embedding applications bring
//! their own logger; `init_logging` is the convenience wiring for everything
//! else (CLIs, tests, notebooks).

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Once;

use log::LevelFilter;

use crate::error::SyncResult;

static INIT_LOGGER: Once = Once::new();

/// Logs a structured key-value metric at `debug` level.
///
/// # Example
/// ```
/// use flood_sync::log_metric;
/// let written = 12;
/// log_metric!("event" = "sublayer_reconciled", "name" = "flood_data_2022", "features" = &written);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        if log::log_enabled!(log::Level::Debug) {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("FLOOD_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

/// Installs a global `env_logger` printing `[LEVEL] message` lines.
///
/// With `log_file`, output is appended to that file instead of stderr. Only the
/// first successful call has an effect; later calls return `Ok(())`. A log file
/// that cannot be opened is an `Io` error and leaves logging uninitialised.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> SyncResult<()> {
    if INIT_LOGGER.is_completed() {
        return Ok(());
    }

    // 1. Open the target up front so failures surface as errors, not panics.
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    // 2. Build and install the logger exactly once.
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(level);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        // Another logger may already own the facade (e.g. the host application).
        let _ = builder.try_init();
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopenable_log_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let missing_parent = dir.path().join("no_such_dir").join("run.log");

        let result = init_logging(LevelFilter::Info, Some(&missing_parent));

        // Another test may have installed the logger first, which makes this a no-op.
        if !INIT_LOGGER.is_completed() {
            assert!(matches!(result, Err(crate::error::FloodSyncError::Io(_))));
        }
    }

    #[test]
    fn test_second_call_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");

        init_logging(LevelFilter::Debug, Some(&path)).unwrap();
        assert!(init_logging(LevelFilter::Warn, None).is_ok());
        log_metric!("event" = "logging_ready", "level" = "debug");
    }
}

//! Diagnostic logging for the CLI.
//!
//! Filter comes from `COURIER_LOG` (default `warn`). Output goes to a daily
//! rolling file under `$COURIER_HOME/logs` so stdout and stderr stay reserved
//! for command output; stderr is used only if the log directory is unusable.
//!
//! ```bash
//! COURIER_LOG=courier_core=debug courier deliveries list
//! ```

use courier_core::config::paths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_ENV: &str = "COURIER_LOG";

/// Installs the global subscriber. Keep the guard alive until exit so buffered
/// lines are flushed.
pub fn init() -> WorkerGuard {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, guard) = match file_appender() {
        Ok(appender) => tracing_appender::non_blocking(appender),
        Err(_) => tracing_appender::non_blocking(std::io::stderr()),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init();

    guard
}

fn file_appender() -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("courier")
        .filename_suffix("log")
        .build(paths::log_dir())
}

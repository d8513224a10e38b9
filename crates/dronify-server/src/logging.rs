//! Tracing subscriber setup for the server binary.
//!
//! Development builds print pretty, colored events with span timings.
//! Production writes JSON lines to a daily file under
//! [`ServerConfig::log_dir`] and a compact copy to stdout.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use dronify_core::ServerConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flush guards of the non-blocking writers (file, stdout). Dropping them
/// loses buffered events, so they live until exit.
static WRITER_GUARDS: OnceLock<(WorkerGuard, WorkerGuard)> = OnceLock::new();

/// Environment variable holding the fallback log level when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "DRONIFY_LOG_LEVEL";

/// File name prefix of the rolled log files (`dronify.2024-03-01.log`).
const LOG_FILE_PREFIX: &str = "dronify";

/// Install the global subscriber for `server`.
///
/// `RUST_LOG` wins over `DRONIFY_LOG_LEVEL`, which defaults to `info`.
///
/// # Errors
///
/// Returns an error if the filter does not parse, the log directory cannot
/// be created or opened, or a subscriber is already installed.
pub fn init(server: &ServerConfig) -> anyhow::Result<()> {
    let filter = env_filter()?;
    if server.production {
        init_production(filter, &log_dir(server))
    } else {
        init_development(filter)
    }
}

fn env_filter() -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    EnvFilter::try_new(&level).with_context(|| format!("invalid {LOG_LEVEL_ENV} '{level}'"))
}

fn init_production(filter: EnvFilter, dir: &Path) -> anyhow::Result<()> {
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender(dir)?);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // journald adds its own timestamps and colors
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("a tracing subscriber is already installed")?;

    let _ = WRITER_GUARDS.set((file_guard, stdout_guard));
    tracing::info!(log_dir = %dir.display(), "Logging to rolling files");
    Ok(())
}

fn init_development(filter: EnvFilter) -> anyhow::Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .try_init()
        .context("a tracing subscriber is already installed")
}

/// Daily rolling appender writing `dronify.<date>.log` into `dir`,
/// creating the directory first.
fn file_appender(dir: &Path) -> anyhow::Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("cannot open log files in {}", dir.display()))
}

/// Directory for production log files: the configured one, or a
/// platform default.
#[must_use]
pub fn log_dir(server: &ServerConfig) -> PathBuf {
    server.log_dir.clone().unwrap_or_else(default_log_dir)
}

fn default_log_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/dronify")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "dronify")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}

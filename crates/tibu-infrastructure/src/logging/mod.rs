//! Logging setup.
//!
//! Two layers:
//! - one-line JSON to a daily rolling file (always)
//! - human-readable coloured output on stderr (debug builds only)
//!
//! Each JSON line carries a local ISO 8601 timestamp with offset, level,
//! target, thread id, file, line, fields and the enclosing spans.
//! `RUST_LOG` overrides the configured level.

use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::config::LogLevel;

static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();
static LOGGER_READY: OnceLock<()> = OnceLock::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub const LOG_FILE_PREFIX: &str = "tibu-host.log";

const FILE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";
const CONSOLE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Installs the global subscriber. Safe to call twice; the second call is a no-op.
pub fn init_logger(log_dir: &Path, level: LogLevel) -> anyhow::Result<()> {
    if LOGGER_READY.get().is_some() {
        return Ok(());
    }

    std::fs::create_dir_all(log_dir)?;
    let _ = LOG_DIR.set(log_dir.to_path_buf());

    // Forward `log` records from dependencies into tracing
    let _ = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init();

    let file_appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(guard);

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_timer(ChronoLocal::new(FILE_TIME_FORMAT.to_string()))
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_filter(env_filter(level));

    // stdout is left to command output
    let console_layer = if cfg!(debug_assertions) {
        Some(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_timer(ChronoLocal::new(CONSOLE_TIME_FORMAT.to_string()))
                .with_target(true)
                .with_line_number(true)
                .with_filter(env_filter(LogLevel::Debug.max(level))),
        )
    } else {
        None
    };

    let subscriber = Registry::default().with(json_layer).with(console_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))?;

    let _ = LOGGER_READY.set(());

    tracing::info!(
        target: "tibu::logging",
        log_dir = %log_dir.display(),
        level = level.as_str(),
        version = env!("CARGO_PKG_VERSION"),
        profile = if cfg!(debug_assertions) { "Debug" } else { "Release" },
        "Logger initialized"
    );

    Ok(())
}

fn default_directives(level: LogLevel) -> String {
    // hyper and chromiumoxide stay at warn
    format!(
        "{lvl},tibu_domain={lvl},tibu_infrastructure={lvl},tibu_host={lvl},hyper=warn,chromiumoxide=warn",
        lvl = level.as_str()
    )
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn get_log_dir() -> Option<PathBuf> {
    LOG_DIR.get().cloned()
}

//! Tracing setup for the search server.
//!
//! Events go to stdout (compact, no targets) and to a log file written by a non-blocking
//! worker. The file is `CAMPUS_SEARCH_LOG_FILE` when set, otherwise
//! `logs/campus-search.log`. `RUST_LOG` filters both outputs and defaults to `info`; for
//! example `RUST_LOG=campus_search::processing=debug` adds chunking detail.
//!
//! Pipeline events carry structured fields rather than formatted text:
//!
//! - ingestion: `file`, `department`, then `document_id` and `chunks` on "Document indexed";
//! - search: `department`, `documents`, `candidates`, `results`, `related` on
//!   "Search completed", and `user` when history cannot be recorded;
//! - provider and store failures: `error`, plus `document_id` or `path` where one applies.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable overriding the log file path.
const LOG_FILE_ENV: &str = "CAMPUS_SEARCH_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "campus-search.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the stdout and file subscribers.
///
/// A second call keeps the first subscriber and reports the conflict on stderr.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let file_layer = file_writer().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .compact()
    });

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
    if let Err(err) = result {
        eprintln!("Tracing already initialized: {err}");
    }
}

/// Split the configured log path into the directory and file name the appender expects.
fn log_location(configured: Option<&str>) -> (PathBuf, String) {
    let Some(path) = configured.map(str::trim).filter(|path| !path.is_empty()) else {
        return (PathBuf::from(DEFAULT_LOG_DIR), DEFAULT_LOG_FILE.to_string());
    };
    let path = Path::new(path);
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = path
        .file_name()
        .map_or_else(|| DEFAULT_LOG_FILE.to_string(), |name| name.to_string_lossy().into_owned());
    (directory, file_name)
}

/// Open the log file through a non-blocking appender; `None` disables file logging.
fn file_writer() -> Option<NonBlocking> {
    let configured = std::env::var(LOG_FILE_ENV).ok();
    let (directory, file_name) = log_location(configured.as_deref());
    let appender = match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.as_str())
        .build(&directory)
    {
        Ok(appender) => appender,
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", directory.join(&file_name).display());
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}

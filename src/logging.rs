use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL_ENV: &str = "OBJECTIVE_BOARD_LOG_LEVEL";
const APP_DIR: &str = "objective-board";
const DEFAULT_LEVEL: Level = Level::WARN;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to determine local data directory")]
    NoDataDir,
    #[error("failed to prepare log file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Routes all tracing output to a fresh timestamped file and returns its path.
/// Nothing is written to the terminal by the subscriber.
pub fn init_logging() -> Result<PathBuf, LoggingError> {
    let log_dir = log_directory()?;
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join(log_file_name(Local::now()));
    let (writer, guard) = tracing_appender::non_blocking(fs::File::create(&log_path)?);
    // Dropping the guard would stop the writer before spawned moves finish logging.
    std::mem::forget(guard);

    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|raw| parse_level(&raw))
        .unwrap_or(DEFAULT_LEVEL);

    tracing_subscriber::registry()
        .with(EnvFilter::new(log_directives(level)))
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()?;

    tracing::info!(level = %level, path = %log_path.display(), "logging initialized");
    Ok(log_path)
}

fn log_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("{level},objective_board={level}")
}

fn parse_level(raw: &str) -> Option<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

pub fn log_directory() -> Result<PathBuf, LoggingError> {
    let data_dir = dirs::data_local_dir().ok_or(LoggingError::NoDataDir)?;
    Ok(data_dir.join(APP_DIR).join("logs"))
}

fn log_file_name(now: DateTime<Local>) -> String {
    format!("{APP_DIR}-{}.log", now.format("%Y-%m-%d_%H-%M-%S"))
}

pub fn print_log_location(log_path: &Path) {
    eprintln!("log file: {}", log_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[test]
    fn log_directory_is_app_scoped() {
        let path = log_directory().expect("data dir should resolve");
        assert!(path.ends_with("objective-board/logs"));
    }

    #[test]
    fn log_file_name_carries_timestamp() {
        let now = Local
            .with_ymd_and_hms(2026, 3, 9, 14, 5, 7)
            .single()
            .expect("unambiguous local time");
        assert_eq!(log_file_name(now), "objective-board-2026-03-09_14-05-07.log");
    }

    #[rstest]
    #[case("TRACE", Some(Level::TRACE))]
    #[case(" warning ", Some(Level::WARN))]
    #[case("Error", Some(Level::ERROR))]
    #[case("verbose", None)]
    fn parse_level_accepts_common_spellings(#[case] raw: &str, #[case] expected: Option<Level>) {
        assert_eq!(parse_level(raw), expected);
    }

    #[test]
    fn directives_cover_crate_and_dependencies() {
        assert_eq!(log_directives(DEFAULT_LEVEL), "warn,objective_board=warn");
        assert_eq!(log_directives(Level::DEBUG), "debug,objective_board=debug");
    }
}

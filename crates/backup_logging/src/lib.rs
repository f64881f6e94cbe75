#![deny(missing_docs)]
//! Shared logging utilities for the backup workspace.
//!
//! This crate provides the `backup_*` logging macros used across the codebase,
//! the logger initialization used by the binary, and a minimal test
//! initializer for the global logger.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// `log::trace!` under the workspace's naming.
#[macro_export]
macro_rules! backup_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// `log::debug!` under the workspace's naming.
#[macro_export]
macro_rules! backup_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// `log::info!` under the workspace's naming.
#[macro_export]
macro_rules! backup_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// `log::warn!` under the workspace's naming.
#[macro_export]
macro_rules! backup_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// `log::error!` under the workspace's naming.
#[macro_export]
macro_rules! backup_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to the terminal (stderr for warnings and errors, stdout otherwise).
    Terminal,
    /// Write to the given file, truncating it first.
    File(PathBuf),
    /// Write to both the terminal and the given file.
    Both(PathBuf),
}

/// Initialize the global logger with the specified destination and level.
///
/// A file that cannot be created is reported on stderr and skipped; output
/// then goes to the terminal even for [`LogDestination::File`]. Calling this
/// twice is harmless, the second call is ignored by the `log` facade.
pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let _ = CombinedLogger::init(loggers_for(destination, level));
}

fn loggers_for(destination: LogDestination, level: LevelFilter) -> Vec<Box<dyn SharedLogger>> {
    let config = build_config();
    match destination {
        LogDestination::Terminal => vec![terminal_logger(level, config)],
        LogDestination::File(path) => match create_file_logger(&path, level, config.clone()) {
            Some(file_logger) => vec![file_logger],
            None => vec![terminal_logger(level, config)],
        },
        LogDestination::Both(path) => {
            let mut loggers = vec![terminal_logger(level, config.clone())];
            loggers.extend(create_file_logger(&path, level, config));
            loggers
        }
    }
}

/// Terminal logger for tests. Later calls, and calls after another logger
/// was installed, do nothing.
pub fn initialize_for_tests() {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = CombinedLogger::init(vec![terminal_logger(level, build_config())]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn terminal_logger(level: LevelFilter, config: Config) -> Box<dyn SharedLogger> {
    TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}

fn create_file_logger(
    path: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<Box<dyn SharedLogger>> {
    match File::create(path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", path, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logger_is_skipped_when_path_is_unwritable() {
        let temp = tempfile::TempDir::new().unwrap();
        let bad = temp.path().join("missing").join("backup.log");
        assert!(create_file_logger(&bad, LevelFilter::Info, build_config()).is_none());
    }

    #[test]
    fn file_destination_writes_only_the_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("backup.log");
        let loggers = loggers_for(LogDestination::File(path.clone()), LevelFilter::Info);
        assert_eq!(loggers.len(), 1);
        assert!(path.exists());
        assert_eq!(loggers_for(LogDestination::Both(path), LevelFilter::Info).len(), 2);
    }

    #[test]
    fn unwritable_file_destination_falls_back_to_the_terminal() {
        let temp = tempfile::TempDir::new().unwrap();
        let bad = temp.path().join("missing").join("backup.log");
        let loggers = loggers_for(LogDestination::File(bad), LevelFilter::Warn);
        assert_eq!(loggers.len(), 1);
        assert_eq!(loggers[0].level(), LevelFilter::Warn);
    }

    #[test]
    fn file_logger_creates_the_log_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("backup.log");
        assert!(create_file_logger(&path, LevelFilter::Info, build_config()).is_some());
        assert!(path.exists());
    }
}

use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Crate target prefix; other crates (HTTP stack) are held to warnings
const OWN_TARGET: &str = "birthday_bot";

#[derive(Debug, Clone, Copy)]
struct Levels {
    file: LevelFilter,
    console: LevelFilter,
}

/// Adjusts the installed logger's levels, e.g. once the config file is read
#[derive(Clone)]
pub struct LogHandle {
    levels: Arc<RwLock<Levels>>,
}

impl LogHandle {
    fn new(file_level: LevelFilter, console_level: LevelFilter) -> Self {
        LogHandle {
            levels: Arc::new(RwLock::new(Levels {
                file: file_level,
                console: console_level,
            })),
        }
    }

    fn current(&self) -> Levels {
        *self.levels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, file_level: &str, console_level: &str) -> LevelFilter {
        let levels = Levels {
            file: parse_level(file_level),
            console: parse_level(console_level),
        };
        *self.levels.write().unwrap_or_else(PoisonError::into_inner) = levels;
        levels.file.max(levels.console)
    }

    /// Replace both levels
    pub fn set_levels(&self, file_level: &str, console_level: &str) {
        log::set_max_level(self.update(file_level, console_level));
    }
}

/// Logger that writes to a rotating file and mirrors to stderr
struct BotLogger {
    file_writer: Arc<Mutex<RollingFileAppender>>,
    levels: LogHandle,
}

impl BotLogger {
    fn effective(metadata: &Metadata, level: LevelFilter) -> bool {
        let level = if metadata.target().starts_with(OWN_TARGET) {
            level
        } else {
            level.min(LevelFilter::Warn)
        };
        metadata.level() <= level
    }
}

impl Log for BotLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let levels = self.levels.current();
        Self::effective(metadata, levels.file) || Self::effective(metadata, levels.console)
    }

    fn log(&self, record: &Record) {
        let levels = self.levels.current();
        let to_file = Self::effective(record.metadata(), levels.file);
        let to_console = Self::effective(record.metadata(), levels.console);
        if !to_file && !to_console {
            return;
        }

        let line = format_line(
            chrono::Local::now(),
            record.level(),
            record.target(),
            &record.args().to_string(),
        );

        if to_file
            && let Ok(mut writer) = self.file_writer.lock()
        {
            let _ = writeln!(writer, "{}", line);
        }

        if to_console {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        // RollingFileAppender handles flushing automatically
    }
}

fn format_line(
    timestamp: chrono::DateTime<chrono::Local>,
    level: Level,
    target: &str,
    message: &str,
) -> String {
    format!(
        "{} - {} - {} - {}",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        target,
        level,
        message
    )
}

/// Parse log level string to LevelFilter
pub fn parse_level(level_str: &str) -> LevelFilter {
    match level_str.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info, // Default to info
    }
}

/// Initialize the global logger
/// The returned handle changes levels later without reinstalling.
pub fn init_logger(
    log_file_path: PathBuf,
    file_level: &str,
    console_level: &str,
) -> Result<LogHandle> {
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    // Daily rotation, keep 3 files
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(3)
        .filename_prefix(
            log_file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("birthday-bot"),
        )
        .filename_suffix(
            log_file_path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or("log"),
        )
        .build(
            log_file_path
                .parent()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path"))?,
        )
        .context("Failed to create rotating file appender")?;

    let file_level = parse_level(file_level);
    let console_level = parse_level(console_level);
    let handle = LogHandle::new(file_level, console_level);

    let logger = BotLogger {
        file_writer: Arc::new(Mutex::new(file_appender)),
        levels: handle.clone(),
    };

    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(file_level.max(console_level));

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use log::MetadataBuilder;
    use tempfile::TempDir;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level(" warn "), LevelFilter::Warn);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("loud"), LevelFilter::Info);
    }

    #[test]
    fn test_format_line() {
        let timestamp = chrono::Local
            .with_ymd_and_hms(2024, 5, 12, 8, 30, 0)
            .unwrap();
        assert_eq!(
            format_line(timestamp, Level::Info, "birthday_bot::storage", "Loaded 2 birthdays"),
            "2024-05-12 08:30:00 - birthday_bot::storage - INFO - Loaded 2 birthdays"
        );
    }

    #[test]
    fn test_levels_follow_handle_updates() {
        let dir = TempDir::new().unwrap();
        let handle = LogHandle::new(LevelFilter::Info, LevelFilter::Info);
        let logger = BotLogger {
            file_writer: Arc::new(Mutex::new(RollingFileAppender::new(
                Rotation::NEVER,
                dir.path(),
                "test.log",
            ))),
            levels: handle.clone(),
        };

        let info = MetadataBuilder::new()
            .level(Level::Info)
            .target("birthday_bot::storage::config")
            .build();
        let debug = MetadataBuilder::new()
            .level(Level::Debug)
            .target("birthday_bot::storage::config")
            .build();
        let foreign = MetadataBuilder::new()
            .level(Level::Info)
            .target("reqwest::connect")
            .build();

        // Records logged before the config is read use the defaults
        assert!(logger.enabled(&info));
        assert!(!logger.enabled(&debug));
        assert!(!logger.enabled(&foreign));

        assert_eq!(handle.update("debug", "warn"), LevelFilter::Debug);
        assert!(logger.enabled(&debug));
        assert!(!logger.enabled(&foreign));

        handle.update("error", "error");
        assert!(!logger.enabled(&info));
    }
}

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone)]
enum LogLevel {
    Info(Color),
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy)]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Magenta,
    White,
}

impl Color {
    fn to_ansi_code(self) -> &'static str {
        match self {
            Color::Red => "\x1b[31m",
            Color::Green => "\x1b[32m",
            Color::Blue => "\x1b[34m",
            Color::Yellow => "\x1b[33m",
            Color::Cyan => "\x1b[36m",
            Color::Magenta => "\x1b[35m",
            Color::White => "\x1b[37m",
        }
    }
}

/// Append-only text log shared by every stage of the system.
///
/// Cloning a `Logger` is cheap: every clone appends to the same file.
#[derive(Debug, Clone)]
pub struct Logger {
    log_file: PathBuf,
    console: bool,
}

impl Logger {
    /// Creates a new `Logger` instance.
    ///
    /// # Parameters
    /// - `log_dir`: Directory where the log file lives. Created if missing.
    /// - `name`: Stage name, the file is `<log_dir>/<name>.log`.
    /// - `console`: Whether every line is echoed to stdout as well.
    ///
    /// Existing content is kept: lines are only ever appended.
    pub fn new(log_dir: &Path, name: &str, console: bool) -> Result<Self, LoggerError> {
        if log_dir.exists() && !log_dir.is_dir() {
            return Err(LoggerError::InvalidPath(format!(
                "{} is not a directory.",
                log_dir.display()
            )));
        }
        std::fs::create_dir_all(log_dir)?;

        let sanitized_name = name.replace(&[':', '/', ' '][..], "_");
        let log_file = log_dir.join(format!("{}.log", sanitized_name));

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;

        Ok(Logger { log_file, console })
    }

    /// Path of the file this logger appends to.
    pub fn path(&self) -> &Path {
        &self.log_file
    }

    // Generic method for writing log messages
    fn log(&self, level: LogLevel, message: &str) -> Result<(), LoggerError> {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        let log_message = match &level {
            LogLevel::Info(_) => format!("[INFO] [{}]: {}\n", timestamp, message),
            LogLevel::Warn => format!("[WARN] [{}]: {}\n", timestamp, message),
            LogLevel::Error => format!("[ERROR] [{}]: {}\n", timestamp, message),
        };

        if self.console {
            let colored_message = match &level {
                LogLevel::Info(color) => format!("{}{}\x1b[0m", color.to_ansi_code(), log_message),
                LogLevel::Warn => format!("\x1b[93m{}\x1b[0m", log_message), // Bright Yellow
                LogLevel::Error => format!("\x1b[91m{}\x1b[0m", log_message), // Bright Red
            };
            let mut stdout = io::stdout().lock();
            stdout.write_all(colored_message.as_bytes())?;
            stdout.flush()?;
        }

        // One write per line, the file is opened in append mode
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;
        file.write_all(log_message.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Logs an informational message.
    ///
    /// # Parameters
    /// - `message`: The informational message to log.
    /// - `color`: The color to use for the console output.
    pub fn info(&self, message: &str, color: Color) -> Result<(), LoggerError> {
        self.log(LogLevel::Info(color), message)
    }

    /// Logs a warning message.
    pub fn warn(&self, message: &str) -> Result<(), LoggerError> {
        self.log(LogLevel::Warn, message)
    }

    /// Logs an error message.
    pub fn error(&self, message: &str) -> Result<(), LoggerError> {
        self.log(LogLevel::Error, message)
    }
}

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("I/O Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid Path: {0}")]
    InvalidPath(String),
}

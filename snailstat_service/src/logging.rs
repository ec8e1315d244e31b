/// Structured logging for the analytics service
///
/// Provides context-rich logging with component tags, context identifiers
/// (source, cache key, station) and severity levels on top of the `log`
/// facade. `init_logger` installs an `env_logger` backend that writes to the
/// console and, optionally, appends to a log file for daemon-style runs.

use crate::model::{AnalyticsError, FetchError, Source};
use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(AnalyticsError::Config(format!("unknown log level '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Dataset,
    Cache,
    Engine,
    Service,
    System,
}

impl Component {
    /// `log` target, so `RUST_LOG=snailstat::cache=debug` style filters work.
    pub fn target(&self) -> &'static str {
        match self {
            Component::Dataset => "snailstat::data",
            Component::Cache => "snailstat::cache",
            Component::Engine => "snailstat::engine",
            Component::Service => "snailstat::service",
            Component::System => "snailstat::system",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Dataset => write!(f, "DATA"),
            Component::Cache => write!(f, "CACHE"),
            Component::Engine => write!(f, "ENGINE"),
            Component::Service => write!(f, "SVC"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Routine for a hosted store: gateway errors, slow responses.
    Expected,
    /// Points at a broken URL or a changed snapshot format.
    Unexpected,
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Setup
// ---------------------------------------------------------------------------

/// Initialize the global logger.
///
/// `RUST_LOG`, when set, overrides `min_level`. With `log_file` every entry
/// is appended to that file instead of stderr. Calling this twice is
/// harmless: the second backend is simply not installed.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>) -> Result<(), AnalyticsError> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(min_level.as_log_level().to_level_filter());
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {} {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AnalyticsError::Config(format!("cannot open log file {}: {}", path, e)))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    if builder.try_init().is_err() {
        log::debug!(target: Component::System.target(), "logger already initialised");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

fn emit(level: LogLevel, component: Component, context: Option<&str>, message: &str) {
    let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
    log::log!(
        target: component.target(),
        level.as_log_level(),
        "{}{}: {}",
        component,
        context_part,
        message
    );
}

/// Informational message for `component`.
pub fn info(component: Component, context: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, context, message);
}

/// Log a warning message
pub fn warn(component: Component, context: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, context, message);
}

/// Log an error message
pub fn error(component: Component, context: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, context, message);
}

/// Log a debug message
pub fn debug(component: Component, context: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, context, message);
}

// ---------------------------------------------------------------------------
// Fetch Failures
// ---------------------------------------------------------------------------

/// Classify a dataset fetch failure.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        // Gateway/maintenance responses are routine for the hosted store.
        FetchError::HttpError(502..=504) => FailureType::Expected,
        FetchError::HttpError(_) => FailureType::Unexpected,
        // Parse errors suggest the snapshot format changed under us.
        FetchError::ParseError(_) | FetchError::MissingCollection(_) => FailureType::Unexpected,
        FetchError::Transport(msg) if msg.contains("timed out") => FailureType::Expected,
        FetchError::Transport(_) | FetchError::Io(_) => FailureType::Unknown,
    }
}

/// Log a dataset fetch failure with automatic classification.
pub fn log_fetch_failure(provider: &str, operation: &str, err: &FetchError) {
    let failure_type = classify_fetch_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Component::Dataset, Some(provider), &message),
        FailureType::Unexpected => error(Component::Dataset, Some(provider), &message),
        FailureType::Unknown => warn(Component::Dataset, Some(provider), &message),
    }
}

// ---------------------------------------------------------------------------
// Engine Summary Logging
// ---------------------------------------------------------------------------

/// Log how many records survived an engine's filter step.
pub fn log_filter_summary(operation: &str, source: Source, total: usize, kept: usize) {
    let message = format!("{}: kept {}/{} observations", operation, kept, total);
    if kept == 0 && total > 0 {
        info(Component::Engine, Some(source.as_str()), &message);
    } else {
        debug(Component::Engine, Some(source.as_str()), &message);
    }
}

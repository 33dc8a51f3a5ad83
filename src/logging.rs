/// Structured logging for the curation service
///
/// Every event is emitted through `tracing` with a `component` field naming
/// the subsystem and a `station` field naming the station key, when there is
/// one. `init_logger` installs a console subscriber and, optionally, a plain
/// text copy of every event in a log file.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::model::{CurationError, Result};

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
    /// Directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
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

impl std::str::FromStr for LogLevel {
    type Err = CurationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(CurationError::Config(format!("unknown log level '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Store,
    Raw,
    Reanalysis,
    Constituents,
    Mask,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Store => write!(f, "STORE"),
            Component::Raw => write!(f, "RAW"),
            Component::Reanalysis => write!(f, "ERA5"),
            Component::Constituents => write!(f, "CONST"),
            Component::Mask => write!(f, "MASK"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. a validity window with no samples in it
    Expected,
    /// Unexpected failure - a document or input that violates the schema
    Unexpected,
    /// Unknown - I/O and collaborator failures that may or may not be transient
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

/// Classify a curation failure by its kind
pub fn classify_failure(err: &CurationError) -> FailureType {
    match err {
        CurationError::OutOfWindow { .. } => FailureType::Expected,
        CurationError::InvalidTimestamp { .. }
        | CurationError::InvalidRange(_)
        | CurationError::RangeInversion { .. }
        | CurationError::MalformedKey(_)
        | CurationError::InvalidSeries(_)
        | CurationError::Config(_) => FailureType::Unexpected,
        CurationError::Store { .. } | CurationError::Analysis(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Logger Initialization
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `min_level`. When `log_file` is given,
/// every event is also appended to it without ANSI colours. Fails if a
/// subscriber is already installed or the file cannot be opened.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&Path>,
    console_timestamps: bool,
) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_directive()));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| CurationError::Config(format!("log file {}: {}", path.display(), e)))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    // Each layer is typed by its position in the stack, so the two console
    // variants are built separately and exactly one of them is `Some`.
    let timed_console = console_timestamps.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });
    let plain_console = (!console_timestamps).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(timed_console)
        .with(plain_console)
        .with(file_layer)
        .try_init()
        .map_err(|e| CurationError::Config(format!("logger already initialized: {}", e)))
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(component: Component, station: Option<&str>, message: &str) {
    tracing::info!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(component: Component, station: Option<&str>, message: &str) {
    tracing::warn!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(component: Component, station: Option<&str>, message: &str) {
    tracing::error!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(component: Component, station: Option<&str>, message: &str) {
    tracing::debug!(component = %component, station = station.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failure with automatic classification
pub fn log_failure(
    component: Component,
    station: Option<&str>,
    operation: &str,
    err: &CurationError,
) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(component, station, &message),
        FailureType::Unexpected => error(component, station, &message),
        FailureType::Unknown => warn(component, station, &message),
    }
}

// ---------------------------------------------------------------------------
// Mask Summary Logging
// ---------------------------------------------------------------------------

/// Log how many samples each category removed from the clean series
pub fn log_mask_summary(
    station: &str,
    total: usize,
    timestamps: usize,
    date_ranges: usize,
    tsunamis: usize,
    excluded: usize,
) {
    let message = format!(
        "Mask applied: {}/{} samples excluded (timestamps={}, date_ranges={}, tsunamis={})",
        excluded, total, timestamps, date_ranges, tsunamis
    );

    if total > 0 && excluded == total {
        warn(Component::Mask, Some(station), &message);
    } else {
        info(Component::Mask, Some(station), &message);
    }
}

/// Core data types and error handling for the sea-level curation service.
///
/// This module defines the shared vocabulary imported by all other modules:
/// the UTC instant alias, the names of the decomposed series columns and the
/// error taxonomy. It contains no logic and no I/O.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC-anchored point in time. Every instant stored by this crate is
/// normalized to UTC before it is kept anywhere.
pub type Instant = DateTime<Utc>;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Raw sensor readings, as delivered by the raw record collaborator.
pub const COL_RAW: &str = "raw";

/// Raw readings with every annotated sample set to NaN.
pub const COL_CLEAN: &str = "clean";

/// Samples excluded as single bad readings.
pub const COL_TIMESTAMPS: &str = "timestamps";

/// Samples excluded as part of a bad-data interval.
pub const COL_DATE_RANGES: &str = "date_ranges";

/// Samples excluded because a tsunami dominates the signal.
pub const COL_TSUNAMIS: &str = "tsunamis";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while validating, persisting or applying annotations.
#[derive(Debug, Error)]
pub enum CurationError {
    /// The value could not be parsed as any recognized temporal representation.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// A range input was malformed (wrong arity, out-of-bounds selection).
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A bounded interval did not satisfy `start < end`.
    #[error("range inversion: start {start} is not before end {end}")]
    RangeInversion { start: Instant, end: Instant },

    /// A station key did not split into `provider-provider_id-sensor`.
    #[error("malformed station key '{0}': expected exactly three '-'-separated parts")]
    MalformedKey(String),

    /// I/O failure or schema violation while loading or persisting a document.
    #[error("store error at {}: {reason}", path.display())]
    Store { path: PathBuf, reason: String },

    /// Clipping a raw series to a validity window left nothing.
    #[error("no samples inside validity window {start} .. {end}")]
    OutOfWindow { start: Instant, end: Instant },

    /// A raw series violated its own structural invariants.
    #[error("invalid series: {0}")]
    InvalidSeries(String),

    /// Settings could not be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// The harmonic-analysis collaborator reported a failure.
    #[error("harmonic analysis failed: {0}")]
    Analysis(String),
}

impl CurationError {
    /// Builds a `Store` error from any displayable cause.
    pub fn store(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        CurationError::Store {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CurationError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_column_names_are_distinct() {
        let cols = [COL_RAW, COL_CLEAN, COL_TIMESTAMPS, COL_DATE_RANGES, COL_TSUNAMIS];
        let unique: std::collections::HashSet<_> = cols.iter().collect();
        assert_eq!(unique.len(), cols.len());
    }

    #[test]
    fn test_range_inversion_message_names_both_ends() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let msg = CurationError::RangeInversion { start, end }.to_string();
        assert!(msg.contains("2024-01-02"), "message should name start: {}", msg);
        assert!(msg.contains("2024-01-01"), "message should name end: {}", msg);
    }

    #[test]
    fn test_store_error_names_path() {
        let err = CurationError::store("/tmp/trans/ioc-waka-rad.json", "expected value at line 1");
        let msg = err.to_string();
        assert!(msg.contains("ioc-waka-rad.json"), "got: {}", msg);
        assert!(msg.contains("line 1"), "got: {}", msg);
    }
}

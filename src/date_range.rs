/// Closed time intervals used for bad-data and tsunami annotations.
///
/// A `DateRange` is a value type: two ranges are equal when their endpoints
/// are equal, and ranges sort lexicographically on `(start, end)`. The
/// derived ordering relies on the field declaration order below.

use serde::{Deserialize, Serialize};

use crate::instant::{format_instant, normalize, TimeInput};
use crate::model::{CurationError, Instant, Result};

/// An interval of two UTC instants with `start < end`.
///
/// Fields are private so a `DateRange` can only come out of validated
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "DateRangeDocument", into = "DateRangeDocument")]
pub struct DateRange {
    start: Instant,
    end: Instant,
}

impl DateRange {
    /// Normalizes both endpoints and checks `start < end`.
    ///
    /// Fails with `InvalidTimestamp` if an endpoint does not parse and with
    /// `RangeInversion` if `start >= end`.
    pub fn new(start: impl Into<TimeInput>, end: impl Into<TimeInput>) -> Result<Self> {
        let start = normalize(start)?;
        let end = normalize(end)?;
        if start >= end {
            return Err(CurationError::RangeInversion { start, end });
        }
        Ok(DateRange { start, end })
    }

    /// Builds a range from an ordered pair given as a slice.
    ///
    /// Anything but exactly two elements fails with `InvalidRange`.
    pub fn from_pair<T>(pair: &[T]) -> Result<Self>
    where
        T: Clone + Into<TimeInput>,
    {
        match pair {
            [start, end] => DateRange::new(start.clone(), end.clone()),
            _ => Err(CurationError::InvalidRange(format!(
                "expected exactly 2 endpoints, got {}",
                pair.len()
            ))),
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    /// `true` if `instant` lies within `[start, end]`, both ends inclusive.
    pub fn contains(&self, instant: &Instant) -> bool {
        self.start <= *instant && *instant <= self.end
    }

    /// `true` if the two closed intervals share at least one instant.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// `{ "start": "...", "end": "..." }` as stored in transformation documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DateRangeDocument {
    start: String,
    end: String,
}

impl TryFrom<DateRangeDocument> for DateRange {
    type Error = CurationError;

    fn try_from(doc: DateRangeDocument) -> Result<Self> {
        DateRange::new(doc.start, doc.end)
    }
}

impl From<DateRange> for DateRangeDocument {
    fn from(range: DateRange) -> Self {
        DateRangeDocument {
            start: format_instant(&range.start),
            end: format_instant(&range.end),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
    use std::collections::BTreeSet;

    fn y2010_y2011() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    // --- Construction -------------------------------------------------------

    #[test]
    fn test_from_pair_accepts_every_temporal_representation() {
        let expected = y2010_y2011();

        assert_eq!(DateRange::from_pair(&["2010", "2011"]).unwrap(), expected);
        assert_eq!(DateRange::from_pair(&["2010-01-01", "2011-01-01"]).unwrap(), expected);

        let naive = |y| NaiveDate::from_ymd_opt(y, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(DateRange::from_pair(&[naive(2010), naive(2011)]).unwrap(), expected);

        let aware = |y| Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(DateRange::from_pair(&[aware(2010), aware(2011)]).unwrap(), expected);
    }

    #[test]
    fn test_aware_endpoints_are_converted_to_utc() {
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let start = minus_five.with_ymd_and_hms(2009, 12, 31, 19, 0, 0).unwrap();
        let range = DateRange::new(start, "2011").unwrap();
        assert_eq!(range, y2010_y2011());
    }

    #[test]
    fn test_inverted_and_empty_ranges_are_rejected() {
        let err = DateRange::new("2011", "2010").unwrap_err();
        assert!(matches!(err, CurationError::RangeInversion { .. }), "got {:?}", err);

        let err = DateRange::new("2010", "2010-01-01").unwrap_err();
        assert!(
            matches!(err, CurationError::RangeInversion { .. }),
            "start == end must be rejected, got {:?}",
            err
        );
    }

    #[test]
    fn test_from_pair_rejects_wrong_arity() {
        let empty: [&str; 0] = [];
        for pair in [&empty[..], &["2010"][..], &["2010", "2011", "2012"][..]] {
            let err = DateRange::from_pair(pair).unwrap_err();
            assert!(matches!(err, CurationError::InvalidRange(_)), "got {:?}", err);
        }
    }

    #[test]
    fn test_unparseable_endpoint_is_invalid_timestamp() {
        let err = DateRange::new("2010", "soon").unwrap_err();
        assert!(matches!(err, CurationError::InvalidTimestamp { .. }), "got {:?}", err);
    }

    // --- Ordering -----------------------------------------------------------

    #[test]
    fn test_ordering_is_lexicographic_on_start_then_end() {
        let a = DateRange::new("2010", "2011").unwrap();
        let b = DateRange::new("2010", "2012").unwrap();
        let c = DateRange::new("2009", "2013").unwrap();
        assert!(c < a);
        assert!(a < b);

        let set: BTreeSet<_> = [b, a, c, a].into_iter().collect();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![c, a, b]);
    }

    // --- Membership ---------------------------------------------------------

    #[test]
    fn test_contains_is_inclusive_on_both_ends() {
        let r = y2010_y2011();
        assert!(r.contains(&r.start()));
        assert!(r.contains(&r.end()));
        assert!(!r.contains(&Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 1).unwrap()));
        assert!(!r.contains(&Utc.with_ymd_and_hms(2009, 12, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_ranges_sharing_an_endpoint_overlap() {
        let a = DateRange::new("2010", "2011").unwrap();
        let b = DateRange::new("2011", "2012").unwrap();
        let c = DateRange::new("2012-06", "2013").unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    // --- Wire format --------------------------------------------------------

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&y2010_y2011()).unwrap();
        assert_eq!(json, r#"{"start":"2010-01-01T00:00:00Z","end":"2011-01-01T00:00:00Z"}"#);
    }

    #[test]
    fn test_json_with_inverted_range_is_rejected() {
        let json = r#"{"start":"2011","end":"2010"}"#;
        assert!(serde_json::from_str::<DateRange>(json).is_err());
    }

    #[test]
    fn test_json_with_unknown_field_is_rejected() {
        let json = r#"{"start":"2010","end":"2011","note":"x"}"#;
        assert!(serde_json::from_str::<DateRange>(json).is_err());
    }
}

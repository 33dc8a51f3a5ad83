/// Raw tide-gauge records.
///
/// A `RawSeries` is an instant-indexed sequence of sea-level readings plus
/// the station metadata the rest of the crate needs (identity, latitude for
/// harmonic analysis, nominal sampling interval). How raw records are
/// physically stored is not this crate's concern; `RawRecordSource` is the
/// seam, and `FsRawSource` is a plain JSON-on-disk implementation of it.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::instant::{format_instant, normalize};
use crate::model::{CurationError, Instant, Result};
use crate::stations::StationKey;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub provider: String,
    pub provider_id: String,
    pub sensor: String,
    /// WGS84 latitude, required by harmonic analysis.
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// Nominal sampling interval, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_interval_seconds: Option<i64>,
}

impl SeriesMetadata {
    pub fn station_key(&self) -> StationKey {
        StationKey::new(&self.provider, &self.provider_id, &self.sensor)
    }

    pub fn main_interval(&self) -> Option<Duration> {
        self.main_interval_seconds.map(Duration::seconds)
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Readings with a strictly increasing UTC index. Missing readings are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    index: Vec<Instant>,
    raw: Vec<f64>,
    metadata: SeriesMetadata,
}

impl RawSeries {
    /// Fails with `InvalidSeries` if the columns differ in length or the
    /// index is not strictly increasing.
    pub fn new(index: Vec<Instant>, raw: Vec<f64>, metadata: SeriesMetadata) -> Result<Self> {
        if index.len() != raw.len() {
            return Err(CurationError::InvalidSeries(format!(
                "index has {} entries but raw has {}",
                index.len(),
                raw.len()
            )));
        }
        if let Some(pos) = index.windows(2).position(|w| w[0] >= w[1]) {
            return Err(CurationError::InvalidSeries(format!(
                "index not strictly increasing at position {} ({} >= {})",
                pos + 1,
                format_instant(&index[pos]),
                format_instant(&index[pos + 1])
            )));
        }
        Ok(RawSeries { index, raw, metadata })
    }

    pub fn index(&self) -> &[Instant] {
        &self.index
    }

    pub fn raw(&self) -> &[f64] {
        &self.raw
    }

    pub fn metadata(&self) -> &SeriesMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn first(&self) -> Option<Instant> {
        self.index.first().copied()
    }

    pub fn last(&self) -> Option<Instant> {
        self.index.last().copied()
    }

    /// Position of an exact instant in the index.
    pub fn position(&self, instant: &Instant) -> Option<usize> {
        self.index.binary_search(instant).ok()
    }

    /// Index positions falling within `[start, end]`, both ends inclusive.
    /// Empty when `start > end` or nothing matches.
    pub fn positions_between(&self, start: Instant, end: Instant) -> std::ops::Range<usize> {
        let lo = self.index.partition_point(|t| *t < start);
        let hi = self.index.partition_point(|t| *t <= end);
        lo..hi.max(lo)
    }

    /// Copy of the samples within `[start, end]`, both ends inclusive.
    pub fn clip(&self, start: Instant, end: Instant) -> RawSeries {
        let range = self.positions_between(start, end);
        RawSeries {
            index: self.index[range.clone()].to_vec(),
            raw: self.raw[range].to_vec(),
            metadata: self.metadata.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Supplies the raw record for a station key.
pub trait RawRecordSource {
    fn load_raw(&self, key: &str) -> Result<RawSeries>;
}

/// Reads `{raw_dir}/{provider.lower()}-{provider_id}-{sensor}.json`
/// documents, the same stem transformation documents use.
#[derive(Debug, Clone)]
pub struct FsRawSource {
    dir: PathBuf,
}

impl FsRawSource {
    pub fn new(settings: &Settings) -> Self {
        FsRawSource {
            dir: settings.raw_dir(),
        }
    }

    pub fn path_for(&self, key: &StationKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    pub fn load_raw_from_path(path: &Path) -> Result<RawSeries> {
        let text = std::fs::read_to_string(path).map_err(|e| CurationError::store(path, e))?;
        let doc: RawSeriesDocument =
            serde_json::from_str(&text).map_err(|e| CurationError::store(path, e))?;
        doc.into_series().map_err(|e| CurationError::store(path, e))
    }

    /// Writes `series` as a raw document, to `path` or to the location
    /// derived from its metadata.
    pub fn dump_raw(&self, series: &RawSeries, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.path_for(&series.metadata.station_key()),
        };
        let doc = RawSeriesDocument::from(series);
        let text = serde_json::to_string(&doc).map_err(|e| CurationError::store(&path, e))?;
        crate::store::write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }
}

impl RawRecordSource for FsRawSource {
    fn load_raw(&self, key: &str) -> Result<RawSeries> {
        let station = StationKey::parse(key)?;
        Self::load_raw_from_path(&self.path_for(&station))
    }
}

/// `{ "metadata": {...}, "index": ["..."], "raw": [1.0, null, ...] }`.
/// JSON has no NaN, so missing readings travel as `null`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSeriesDocument {
    metadata: SeriesMetadata,
    index: Vec<String>,
    raw: Vec<Option<f64>>,
}

impl RawSeriesDocument {
    fn into_series(self) -> Result<RawSeries> {
        let index = self
            .index
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>>>()?;
        let raw = self.raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        RawSeries::new(index, raw, self.metadata)
    }
}

impl From<&RawSeries> for RawSeriesDocument {
    fn from(series: &RawSeries) -> Self {
        RawSeriesDocument {
            metadata: series.metadata.clone(),
            index: series.index.iter().map(format_instant).collect(),
            raw: series
                .raw
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn meta() -> SeriesMetadata {
        SeriesMetadata {
            provider: "ioc".to_string(),
            provider_id: "waka".to_string(),
            sensor: "rad".to_string(),
            lat: 45.41,
            lon: Some(141.69),
            main_interval_seconds: Some(3600),
        }
    }

    fn hourly(n: i64) -> RawSeries {
        let t0 = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let index = (0..n).map(|h| t0 + Duration::hours(h)).collect();
        let raw = (0..n).map(|h| h as f64).collect();
        RawSeries::new(index, raw, meta()).unwrap()
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let t0 = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let err = RawSeries::new(vec![t0], vec![1.0, 2.0], meta()).unwrap_err();
        assert!(matches!(err, CurationError::InvalidSeries(_)));
    }

    #[test]
    fn test_non_increasing_index_is_rejected() {
        let t0 = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let err = RawSeries::new(vec![t0, t0], vec![1.0, 2.0], meta()).unwrap_err();
        assert!(matches!(err, CurationError::InvalidSeries(_)));
    }

    #[test]
    fn test_clip_is_inclusive_on_both_ends() {
        let s = hourly(10);
        let clipped = s.clip(s.index()[2], s.index()[5]);
        assert_eq!(clipped.len(), 4);
        assert_eq!(clipped.raw(), &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(clipped.metadata(), s.metadata());
    }

    #[test]
    fn test_clip_between_samples_and_outside() {
        let s = hourly(10);
        let mid = s.index()[2] + Duration::minutes(30);
        assert_eq!(s.clip(mid, s.index()[4]).raw(), &[3.0, 4.0]);

        let later = s.last().unwrap() + Duration::days(1);
        assert!(s.clip(later, later + Duration::days(1)).is_empty());
        assert!(s.clip(s.index()[5], s.index()[2]).is_empty());
    }

    #[test]
    fn test_position_is_exact_match_only() {
        let s = hourly(5);
        assert_eq!(s.position(&s.index()[3]), Some(3));
        assert_eq!(s.position(&(s.index()[3] + Duration::seconds(1))), None);
    }

    #[test]
    fn test_fs_round_trip_keeps_nan() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(tmp.path());
        settings.ensure_dirs().unwrap();
        let source = FsRawSource::new(&settings);

        let t0 = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let series = RawSeries::new(
            vec![t0, t0 + Duration::hours(1), t0 + Duration::hours(2)],
            vec![1.5, f64::NAN, -0.25],
            meta(),
        )
        .unwrap();
        let path = source.dump_raw(&series, None).unwrap();
        assert_eq!(path, settings.raw_dir().join("ioc-waka-rad.json"));

        let back = source.load_raw("ioc-waka-rad").unwrap();
        assert_eq!(back.index(), series.index());
        assert_eq!(back.raw()[0], 1.5);
        assert!(back.raw()[1].is_nan());
        assert_eq!(back.raw()[2], -0.25);
        assert_eq!(back.metadata().main_interval(), Some(Duration::hours(1)));
    }

    #[test]
    fn test_mixed_case_provider_reads_what_was_written() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FsRawSource::new(&Settings::with_data_dir(tmp.path()));

        let t0 = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let mut metadata = meta();
        metadata.provider = "IOC".to_string();
        let index = vec![t0, t0 + Duration::hours(1)];
        let series = RawSeries::new(index, vec![1.0, 2.0], metadata).unwrap();

        let path = source.dump_raw(&series, None).unwrap();
        assert!(path.ends_with("raw/ioc-waka-rad.json"), "got {}", path.display());
        assert_eq!(source.load_raw("IOC-waka-rad").unwrap(), series);
        assert_eq!(source.load_raw("ioc-waka-rad").unwrap(), series);
    }

    #[test]
    fn test_malformed_raw_key_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FsRawSource::new(&Settings::with_data_dir(tmp.path()));
        let err = source.load_raw("ioc-waka").unwrap_err();
        assert!(matches!(err, CurationError::MalformedKey(_)), "got {:?}", err);
    }

    #[test]
    fn test_missing_raw_document_is_store_error() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FsRawSource::new(&Settings::with_data_dir(tmp.path()));
        let err = source.load_raw("ioc-none-rad").unwrap_err();
        assert!(matches!(err, CurationError::Store { .. }), "got {:?}", err);
    }
}

/// The per-station annotation record.
///
/// A `Transformation` says "what is wrong with this station's record and
/// when": a validity window, single bad timestamps, bad date ranges and
/// tsunami intervals. It is the only thing a human edits; the mask pipeline
/// reads it, the store persists it.
///
/// # Validation
/// Fields are private. Every way of producing or changing a record
/// (construction, deserialization, the `set_*` methods and the three `add_*`
/// mutators) validates the new value before it is stored, so an invalid
/// record is never observable. Collections are ordered sets: inserting a
/// value that is already present is a silent no-op.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::date_range::DateRange;
use crate::instant::{format_instant, normalize, normalize_all, TimeInput};
use crate::model::{CurationError, Instant, Result};
use crate::stations::{StationKey, KEY_SEPARATOR};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransformationDocument", into = "TransformationDocument")]
pub struct Transformation {
    provider: String,
    provider_id: String,
    sensor: String,
    notes: String,
    /// Station should be skipped by downstream analysis.
    skip: bool,
    /// Annotation is still work in progress.
    wip: bool,
    start: Instant,
    end: Instant,
    date_ranges: BTreeSet<DateRange>,
    timestamps: BTreeSet<Instant>,
    tsunamis: BTreeSet<DateRange>,
}

impl Transformation {
    /// Creates an untouched record: no exclusions, empty notes, and both
    /// review flags set (not yet reviewed, work in progress).
    ///
    /// Fails with `MalformedKey` if an identity component is empty or
    /// contains the key separator, and with `RangeInversion` if the
    /// validity window is not `start < end`.
    pub fn new(
        provider: impl Into<String>,
        provider_id: impl Into<String>,
        sensor: impl Into<String>,
        start: impl Into<TimeInput>,
        end: impl Into<TimeInput>,
    ) -> Result<Self> {
        let key = StationKey::new(provider, provider_id, sensor);
        validate_identity(&key)?;
        let (start, end) = validate_window(normalize(start)?, normalize(end)?)?;

        Ok(Transformation {
            provider: key.provider,
            provider_id: key.provider_id,
            sensor: key.sensor,
            notes: String::new(),
            skip: true,
            wip: true,
            start,
            end,
            date_ranges: BTreeSet::new(),
            timestamps: BTreeSet::new(),
            tsunamis: BTreeSet::new(),
        })
    }

    /// Creates an untouched record whose validity window spans the whole
    /// raw record, from its first to its last sample.
    pub fn for_station(key: &StationKey, first: Instant, last: Instant) -> Result<Self> {
        Transformation::new(
            key.provider.as_str(),
            key.provider_id.as_str(),
            key.sensor.as_str(),
            first,
            last,
        )
    }

    // --- Identity -----------------------------------------------------------

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    pub fn station_key(&self) -> StationKey {
        StationKey::new(&self.provider, &self.provider_id, &self.sensor)
    }

    /// `{provider.lower()}-{provider_id}-{sensor}.json` under `dir`.
    pub fn canonical_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.station_key().file_stem()))
    }

    // --- Review status ------------------------------------------------------

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn set_skip(&mut self, skip: bool) {
        self.skip = skip;
    }

    pub fn wip(&self) -> bool {
        self.wip
    }

    pub fn set_wip(&mut self, wip: bool) {
        self.wip = wip;
    }

    // --- Validity window ----------------------------------------------------

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    /// Moves the start of the validity window. The record is left untouched
    /// if the new window would be inverted.
    pub fn set_start(&mut self, start: impl Into<TimeInput>) -> Result<()> {
        let (start, _) = validate_window(normalize(start)?, self.end)?;
        self.start = start;
        Ok(())
    }

    /// Moves the end of the validity window. The record is left untouched if
    /// the new window would be inverted.
    pub fn set_end(&mut self, end: impl Into<TimeInput>) -> Result<()> {
        let (_, end) = validate_window(self.start, normalize(end)?)?;
        self.end = end;
        Ok(())
    }

    /// Replaces both ends of the validity window at once, for moves where
    /// the intermediate single-ended state would be inverted.
    pub fn set_window(
        &mut self,
        start: impl Into<TimeInput>,
        end: impl Into<TimeInput>,
    ) -> Result<()> {
        let (start, end) = validate_window(normalize(start)?, normalize(end)?)?;
        self.start = start;
        self.end = end;
        Ok(())
    }

    // --- Exclusions ---------------------------------------------------------

    pub fn date_ranges(&self) -> &BTreeSet<DateRange> {
        &self.date_ranges
    }

    pub fn timestamps(&self) -> &BTreeSet<Instant> {
        &self.timestamps
    }

    pub fn tsunamis(&self) -> &BTreeSet<DateRange> {
        &self.tsunamis
    }

    /// `true` when no exclusion of any category has been recorded.
    pub fn is_untouched(&self) -> bool {
        self.date_ranges.is_empty() && self.timestamps.is_empty() && self.tsunamis.is_empty()
    }

    /// Adds single bad readings. All values are normalized before any is
    /// inserted, so a bad value leaves the record unchanged.
    ///
    /// Returns how many instants were not already present.
    pub fn add_timestamps<I, T>(&mut self, values: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
        T: Into<TimeInput>,
    {
        let validated = normalize_all(values)?;
        Ok(validated
            .into_iter()
            .filter(|t| self.timestamps.insert(*t))
            .count())
    }

    /// Adds a bad-data interval. Returns `false` if it was already present.
    pub fn add_date_range(
        &mut self,
        start: impl Into<TimeInput>,
        end: impl Into<TimeInput>,
    ) -> Result<bool> {
        let range = DateRange::new(start, end)?;
        Ok(self.date_ranges.insert(range))
    }

    /// Adds a tsunami interval. Returns `false` if it was already present.
    pub fn add_tsunami(
        &mut self,
        start: impl Into<TimeInput>,
        end: impl Into<TimeInput>,
    ) -> Result<bool> {
        let range = DateRange::new(start, end)?;
        Ok(self.tsunamis.insert(range))
    }
}

fn validate_identity(key: &StationKey) -> Result<()> {
    let parts = [&key.provider, &key.provider_id, &key.sensor];
    if parts.iter().any(|p| p.is_empty() || p.contains(KEY_SEPARATOR)) {
        return Err(CurationError::MalformedKey(key.to_string()));
    }
    Ok(())
}

fn validate_window(start: Instant, end: Instant) -> Result<(Instant, Instant)> {
    if start >= end {
        return Err(CurationError::RangeInversion { start, end });
    }
    Ok((start, end))
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// The persisted document. Field order here is the field order on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransformationDocument {
    provider: String,
    provider_id: String,
    sensor: String,
    #[serde(default)]
    notes: String,
    #[serde(default = "default_true")]
    skip: bool,
    #[serde(default = "default_true")]
    wip: bool,
    start: String,
    end: String,
    #[serde(default)]
    date_ranges: Vec<DateRange>,
    #[serde(default)]
    timestamps: Vec<String>,
    #[serde(default)]
    tsunamis: Vec<DateRange>,
}

impl TryFrom<TransformationDocument> for Transformation {
    type Error = CurationError;

    fn try_from(doc: TransformationDocument) -> Result<Self> {
        let mut trans =
            Transformation::new(doc.provider, doc.provider_id, doc.sensor, doc.start, doc.end)?;
        trans.notes = doc.notes;
        trans.skip = doc.skip;
        trans.wip = doc.wip;
        trans.add_timestamps(doc.timestamps)?;
        trans.date_ranges.extend(doc.date_ranges);
        trans.tsunamis.extend(doc.tsunamis);
        Ok(trans)
    }
}

impl From<Transformation> for TransformationDocument {
    fn from(trans: Transformation) -> Self {
        TransformationDocument {
            provider: trans.provider,
            provider_id: trans.provider_id,
            sensor: trans.sensor,
            notes: trans.notes,
            skip: trans.skip,
            wip: trans.wip,
            start: format_instant(&trans.start),
            end: format_instant(&trans.end),
            date_ranges: trans.date_ranges.into_iter().collect(),
            timestamps: trans.timestamps.iter().map(format_instant).collect(),
            tsunamis: trans.tsunamis.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

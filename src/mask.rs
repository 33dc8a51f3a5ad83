/// Applying a transformation to a raw series.
///
/// `apply` clips the raw series to the transformation's validity window and
/// splits it into parallel columns over the clipped index:
///
/// - `clean`: raw, with every annotated sample set to NaN
/// - `timestamps`: raw at single bad readings, NaN elsewhere
/// - `date_ranges`: raw inside bad-data intervals, NaN elsewhere
/// - `tsunamis`: raw inside tsunami intervals, NaN elsewhere
///
/// The flag columns are independent. A sample inside both a bad-data
/// interval and a tsunami interval carries its raw value in both columns;
/// only `clean` is exclusive. All interval bounds are inclusive.

use crate::logging;
use crate::model::{
    CurationError, Instant, Result, COL_CLEAN, COL_DATE_RANGES, COL_RAW, COL_TIMESTAMPS,
    COL_TSUNAMIS,
};
use crate::series::{RawRecordSource, RawSeries, SeriesMetadata};
use crate::store::TransformationStore;
use crate::transformation::Transformation;

/// Per-category counts of flagged samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskSummary {
    /// Samples inside the validity window.
    pub total: usize,
    pub timestamps: usize,
    pub date_ranges: usize,
    pub tsunamis: usize,
    /// Samples removed from `clean` by any category, each counted once.
    pub excluded: usize,
}

/// The clean/flagged decomposition of a raw series.
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedSeries {
    index: Vec<Instant>,
    raw: Vec<f64>,
    clean: Vec<f64>,
    timestamps: Vec<f64>,
    date_ranges: Vec<f64>,
    tsunamis: Vec<f64>,
    metadata: SeriesMetadata,
    summary: MaskSummary,
}

impl DecomposedSeries {
    pub fn index(&self) -> &[Instant] {
        &self.index
    }

    pub fn raw(&self) -> &[f64] {
        &self.raw
    }

    pub fn clean(&self) -> &[f64] {
        &self.clean
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn date_ranges(&self) -> &[f64] {
        &self.date_ranges
    }

    pub fn tsunamis(&self) -> &[f64] {
        &self.tsunamis
    }

    pub fn metadata(&self) -> &SeriesMetadata {
        &self.metadata
    }

    pub fn summary(&self) -> MaskSummary {
        self.summary
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Column by name (`raw`, `clean`, `timestamps`, `date_ranges`, `tsunamis`).
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        match name {
            COL_RAW => Some(&self.raw),
            COL_CLEAN => Some(&self.clean),
            COL_TIMESTAMPS => Some(&self.timestamps),
            COL_DATE_RANGES => Some(&self.date_ranges),
            COL_TSUNAMIS => Some(&self.tsunamis),
            _ => None,
        }
    }
}

/// Decomposes `raw` according to `trans`.
///
/// Fails with `OutOfWindow` when no sample of `raw` falls inside the
/// validity window; nothing partial is returned.
pub fn apply(raw: &RawSeries, trans: &Transformation) -> Result<DecomposedSeries> {
    let clipped = raw.clip(trans.start(), trans.end());
    if clipped.is_empty() {
        return Err(CurationError::OutOfWindow {
            start: trans.start(),
            end: trans.end(),
        });
    }

    let n = clipped.len();
    let values = clipped.raw();
    let mut clean = values.to_vec();
    let mut timestamps = vec![f64::NAN; n];
    let mut date_ranges = vec![f64::NAN; n];
    let mut tsunamis = vec![f64::NAN; n];
    let mut excluded = vec![false; n];
    let mut summary = MaskSummary {
        total: n,
        ..MaskSummary::default()
    };

    for t in trans.timestamps() {
        if let Some(i) = clipped.position(t) {
            timestamps[i] = values[i];
            clean[i] = f64::NAN;
            excluded[i] = true;
            summary.timestamps += 1;
        }
    }

    for range in trans.date_ranges() {
        for i in clipped.positions_between(range.start(), range.end()) {
            date_ranges[i] = values[i];
            clean[i] = f64::NAN;
            excluded[i] = true;
        }
    }

    for range in trans.tsunamis() {
        for i in clipped.positions_between(range.start(), range.end()) {
            tsunamis[i] = values[i];
            clean[i] = f64::NAN;
            excluded[i] = true;
        }
    }

    // Overlapping ranges of one category flag a sample once.
    summary.date_ranges = count_flagged(&clipped, trans.date_ranges().iter());
    summary.tsunamis = count_flagged(&clipped, trans.tsunamis().iter());
    summary.excluded = excluded.iter().filter(|e| **e).count();

    let metadata = clipped.metadata().clone();
    let index = clipped.index().to_vec();
    Ok(DecomposedSeries {
        raw: values.to_vec(),
        index,
        clean,
        timestamps,
        date_ranges,
        tsunamis,
        metadata,
        summary,
    })
}

fn count_flagged<'a>(
    series: &RawSeries,
    ranges: impl Iterator<Item = &'a crate::date_range::DateRange>,
) -> usize {
    let mut flagged = vec![false; series.len()];
    for range in ranges {
        for i in series.positions_between(range.start(), range.end()) {
            flagged[i] = true;
        }
    }
    flagged.into_iter().filter(|f| *f).count()
}

/// Loads the station's transformation through `store` and applies it to
/// `raw`. When none was saved, the default is synthesized from `raw`.
pub fn apply_from_store<S: RawRecordSource>(
    store: &TransformationStore<S>,
    raw: &RawSeries,
) -> Result<DecomposedSeries> {
    let key = raw.metadata().station_key().to_string();
    let trans = store.load_for_series(raw)?;
    let decomposed = apply(raw, &trans)
        .inspect_err(|e| {
            logging::log_failure(logging::Component::Mask, Some(&key), "Applying mask", e)
        })?;

    let s = decomposed.summary();
    logging::log_mask_summary(&key, s.total, s.timestamps, s.date_ranges, s.tsunamis, s.excluded);
    Ok(decomposed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

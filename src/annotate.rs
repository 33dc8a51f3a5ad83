/// Turning a selection of samples into annotations.
///
/// Curators pick samples by position on a plotted series; these helpers map
/// the selected positions back to instants of that series and record them on
/// a transformation. Selections may be unordered and may repeat positions.

use crate::model::{CurationError, Instant, Result};
use crate::series::RawSeries;
use crate::transformation::Transformation;

/// Instants at `positions`, sorted. Fails with `InvalidRange` on the first
/// position past the end of the series.
fn selected_instants(series: &RawSeries, positions: &[usize]) -> Result<Vec<Instant>> {
    let index = series.index();
    let mut instants = positions
        .iter()
        .map(|&p| {
            index.get(p).copied().ok_or_else(|| {
                CurationError::InvalidRange(format!(
                    "selected position {} is outside a series of {} samples",
                    p,
                    index.len()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    instants.sort();
    Ok(instants)
}

/// Every selected sample becomes a single bad timestamp. Returns how many
/// were new; an empty selection changes nothing.
pub fn add_selected_timestamps(
    trans: &mut Transformation,
    series: &RawSeries,
    positions: &[usize],
) -> Result<usize> {
    let instants = selected_instants(series, positions)?;
    trans.add_timestamps(instants)
}

/// The earliest and latest selected samples bound a new bad-data range.
/// Returns `Ok(None)` for an empty selection, otherwise whether the range
/// was new. A single-sample selection is an inverted range.
pub fn add_selected_date_range(
    trans: &mut Transformation,
    series: &RawSeries,
    positions: &[usize],
) -> Result<Option<bool>> {
    match bounds(series, positions)? {
        Some((start, end)) => trans.add_date_range(start, end).map(Some),
        None => Ok(None),
    }
}

/// As `add_selected_date_range`, recording a tsunami interval instead.
pub fn add_selected_tsunami(
    trans: &mut Transformation,
    series: &RawSeries,
    positions: &[usize],
) -> Result<Option<bool>> {
    match bounds(series, positions)? {
        Some((start, end)) => trans.add_tsunami(start, end).map(Some),
        None => Ok(None),
    }
}

fn bounds(series: &RawSeries, positions: &[usize]) -> Result<Option<(Instant, Instant)>> {
    let instants = selected_instants(series, positions)?;
    Ok(instants.first().copied().zip(instants.last().copied()))
}

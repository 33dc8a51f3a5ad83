/// Tide-gauge annotation curation.
///
/// Each station/sensor has a human-edited `Transformation` recording what is
/// wrong with its record and when. The `store` persists those records, and
/// `mask` applies one to a raw series to split it into a clean series and
/// three flagged categories (single timestamps, bad date ranges, tsunamis).
///
/// Raw records, reanalysis and harmonic analysis are collaborators reached
/// through `series`, `reanalysis` and `constituents`.

pub mod annotate;
pub mod config;
pub mod constituents;
pub mod date_range;
pub mod instant;
pub mod logging;
pub mod mask;
pub mod model;
pub mod reanalysis;
pub mod series;
pub mod stations;
pub mod store;
pub mod transformation;

pub use config::Settings;
pub use date_range::DateRange;
pub use mask::{apply, DecomposedSeries};
pub use model::{CurationError, Instant, Result};
pub use series::{FsRawSource, RawRecordSource, RawSeries, SeriesMetadata};
pub use stations::StationKey;
pub use store::TransformationStore;
pub use transformation::Transformation;

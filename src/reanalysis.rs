/// Meteorological reanalysis context for a station.
///
/// Reanalysis series are gridded per station, not per sensor, so they are
/// looked up with `stations::era5_id`. They are read-only context for
/// curators and never feed the mask.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::instant::normalize;
use crate::logging::{self, Component};
use crate::model::{CurationError, Instant, Result};
use crate::stations::era5_id;

/// Wind components, sea-level pressure and the wind derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Era5Series {
    pub index: Vec<Instant>,
    /// Eastward 10 m wind, m/s.
    pub u10: Vec<f64>,
    /// Northward 10 m wind, m/s.
    pub v10: Vec<f64>,
    /// Mean sea-level pressure, Pa.
    pub msl: Vec<f64>,
    /// Direction the wind blows from, degrees in `[0, 360)`.
    pub wind_dir: Vec<f64>,
    /// Wind speed, m/s.
    pub wind_mag: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Era5Document {
    index: Vec<String>,
    u10: Vec<Option<f64>>,
    v10: Vec<Option<f64>>,
    msl: Vec<Option<f64>>,
}

/// Meteorological wind direction of the vector `(u, v)`.
pub fn wind_direction(u: f64, v: f64) -> f64 {
    (180.0 + u.atan2(v).to_degrees()).rem_euclid(360.0)
}

pub fn wind_magnitude(u: f64, v: f64) -> f64 {
    u.hypot(v)
}

pub fn era5_path(settings: &Settings, key: &str) -> PathBuf {
    settings.era5_dir().join(format!("{}.json", era5_id(key)))
}

/// Loads the reanalysis series for a station or sensor key.
pub fn load_era5(settings: &Settings, key: &str) -> Result<Era5Series> {
    let path = era5_path(settings, key);
    logging::debug(Component::Reanalysis, Some(key), &format!("Loading {}", path.display()));
    load_era5_from_path(&path).inspect_err(|e| {
        logging::log_failure(Component::Reanalysis, Some(key), "Loading reanalysis", e)
    })
}

pub fn load_era5_from_path(path: &Path) -> Result<Era5Series> {
    let text = std::fs::read_to_string(path).map_err(|e| CurationError::store(path, e))?;
    let doc: Era5Document = serde_json::from_str(&text).map_err(|e| CurationError::store(path, e))?;
    doc.into_series().map_err(|e| CurationError::store(path, e))
}

impl Era5Document {
    fn into_series(self) -> Result<Era5Series> {
        let n = self.index.len();
        if self.u10.len() != n || self.v10.len() != n || self.msl.len() != n {
            return Err(CurationError::InvalidSeries(format!(
                "column lengths differ (index={}, u10={}, v10={}, msl={})",
                n,
                self.u10.len(),
                self.v10.len(),
                self.msl.len()
            )));
        }
        let index = self.index.into_iter().map(normalize).collect::<Result<Vec<_>>>()?;
        let nan = |col: Vec<Option<f64>>| -> Vec<f64> {
            col.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
        };
        let u10 = nan(self.u10);
        let v10 = nan(self.v10);
        let msl = nan(self.msl);

        let wind_dir = u10.iter().zip(&v10).map(|(u, v)| wind_direction(*u, *v)).collect();
        let wind_mag = u10.iter().zip(&v10).map(|(u, v)| wind_magnitude(*u, *v)).collect();

        Ok(Era5Series {
            index,
            u10,
            v10,
            msl,
            wind_dir,
            wind_mag,
        })
    }
}

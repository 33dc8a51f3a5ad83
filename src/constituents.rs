/// Tidal constituents and storm surge.
///
/// Fitting and evaluating the harmonic model is delegated to a
/// `HarmonicAnalysis` implementation; this module only prepares its inputs,
/// strips the per-sample `weights` it reports, persists the constituent
/// payload and subtracts the predicted tide from the clean series.
///
/// The payload is treated as opaque. Numeric lists are held as fixed-width
/// arrays in memory and written back as plain JSON lists, with NaN as `null`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::logging::{self, Component};
use crate::mask::DecomposedSeries;
use crate::model::{CurationError, Instant, Result};
use crate::store::{read_optional, write_atomic};

/// Entry dropped from every solution before it is returned or persisted.
pub const WEIGHTS_KEY: &str = "weights";

/// Default column prefix for the reconstructed tide.
pub const DEFAULT_TIDE_PREFIX: &str = "tide";

pub type Constituents = BTreeMap<String, ConstituentValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstituentValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// List of numbers and nulls, nulls read as NaN. Tried before `List`,
    /// so a numeric list written with NaN entries comes back as an array.
    Array(#[serde(deserialize_with = "nullable_floats")] Box<[f64]>),
    List(Vec<ConstituentValue>),
    Map(BTreeMap<String, ConstituentValue>),
}

/// JSON has no NaN; serde_json writes it as `null`.
fn nullable_floats<'de, D>(deserializer: D) -> std::result::Result<Box<[f64]>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

impl ConstituentValue {
    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            ConstituentValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConstituentValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// The external harmonic-analysis routine.
pub trait HarmonicAnalysis {
    /// Fits constituents to `values` sampled at `index`.
    fn solve(&self, index: &[Instant], values: &[f64], latitude: f64) -> Result<Constituents>;

    /// Predicts the tide at every instant of `index`.
    fn reconstruct(&self, index: &[Instant], constituents: &Constituents) -> Result<Vec<f64>>;
}

/// Removes `weights` from a solution. Returns whether it was present.
pub fn strip_weights(constituents: &mut Constituents) -> bool {
    constituents.remove(WEIGHTS_KEY).is_some()
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Fits constituents to the clean part of a decomposed series at the
/// station's latitude. Masked and missing samples are left out of the fit.
pub fn calc_constituents<A: HarmonicAnalysis + ?Sized>(
    analysis: &A,
    series: &DecomposedSeries,
) -> Result<Constituents> {
    let (index, values): (Vec<Instant>, Vec<f64>) = series
        .index()
        .iter()
        .zip(series.clean())
        .filter(|(_, v)| !v.is_nan())
        .map(|(t, v)| (*t, *v))
        .unzip();
    let key = series.metadata().station_key().to_string();
    if index.is_empty() {
        return Err(CurationError::InvalidSeries(format!(
            "'{}' has no clean samples to fit",
            key
        )));
    }

    logging::debug(
        Component::Constituents,
        Some(&key),
        &format!("Solving with {} clean samples", index.len()),
    );
    let mut constituents = analysis
        .solve(&index, &values, series.metadata().lat)
        .inspect_err(|e| {
            logging::log_failure(Component::Constituents, Some(&key), "Harmonic solve", e)
        })?;
    strip_weights(&mut constituents);
    Ok(constituents)
}

/// Predicted tide and residual surge over a decomposed series' index.
#[derive(Debug, Clone, PartialEq)]
pub struct Surge {
    prefix: String,
    surge_name: String,
    tide: Vec<f64>,
    surge: Vec<f64>,
}

impl Surge {
    pub fn tide(&self) -> &[f64] {
        &self.tide
    }

    pub fn surge(&self) -> &[f64] {
        &self.surge
    }

    /// `{prefix}` for the tide, `{prefix}_surge` for the residual.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        if name == self.prefix {
            Some(&self.tide)
        } else if name == self.surge_name {
            Some(&self.surge)
        } else {
            None
        }
    }

    pub fn column_names(&self) -> [&str; 2] {
        [self.prefix.as_str(), self.surge_name.as_str()]
    }
}

/// Reconstructs the tide at every sample and subtracts it from `clean`.
/// Surge is NaN wherever the clean series is.
pub fn calc_surge<A: HarmonicAnalysis + ?Sized>(
    analysis: &A,
    series: &DecomposedSeries,
    constituents: &Constituents,
    prefix: &str,
) -> Result<Surge> {
    let tide = analysis.reconstruct(series.index(), constituents)?;
    if tide.len() != series.len() {
        return Err(CurationError::Analysis(format!(
            "reconstruction returned {} samples for an index of {}",
            tide.len(),
            series.len()
        )));
    }
    let surge = series.clean().iter().zip(&tide).map(|(c, t)| c - t).collect();
    Ok(Surge {
        prefix: prefix.to_string(),
        surge_name: format!("{}_surge", prefix),
        tide,
        surge,
    })
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// `{constituents_dir}/{key.lower()}.json`.
pub fn constituents_path(settings: &Settings, key: &str) -> PathBuf {
    settings
        .constituents_dir()
        .join(format!("{}.json", key.to_lowercase()))
}

/// Loads saved constituents, or `None` if the station has none yet.
pub fn load_constituents(settings: &Settings, key: &str) -> Result<Option<Constituents>> {
    let path = constituents_path(settings, key);
    match read_optional(&path)? {
        Some(text) => parse(&path, &text).map(Some),
        None => {
            logging::debug(Component::Constituents, Some(key), "No saved constituents");
            Ok(None)
        }
    }
}

pub fn load_constituents_from_path(path: &Path) -> Result<Constituents> {
    let text = std::fs::read_to_string(path).map_err(|e| CurationError::store(path, e))?;
    parse(path, &text)
}

fn parse(path: &Path, text: &str) -> Result<Constituents> {
    serde_json::from_str(text).map_err(|e| CurationError::store(path, e))
}

/// Writes `constituents` without `weights`, to `path` or the canonical
/// location for `key`. Returns the location written.
pub fn dump_constituents(
    settings: &Settings,
    key: &str,
    constituents: &Constituents,
    path: Option<&Path>,
) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => constituents_path(settings, key),
    };
    let mut payload = constituents.clone();
    strip_weights(&mut payload);

    let mut text =
        serde_json::to_string_pretty(&payload).map_err(|e| CurationError::store(&path, e))?;
    text.push('\n');
    write_atomic(&path, text.as_bytes())?;
    logging::info(Component::Constituents, Some(key), &format!("Saved {}", path.display()));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask;
    use crate::series::{RawSeries, SeriesMetadata};
    use crate::transformation::Transformation;
    use chrono::{Duration, TimeZone, Utc};
    use std::cell::RefCell;

    /// "Tide" is the mean of the fitted samples. Records what it was given.
    #[derive(Default)]
    struct MeanTide {
        seen: RefCell<Vec<(usize, f64)>>,
    }

    impl HarmonicAnalysis for MeanTide {
        fn solve(&self, index: &[Instant], values: &[f64], latitude: f64) -> Result<Constituents> {
            self.seen.borrow_mut().push((index.len(), latitude));
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let mut c = Constituents::new();
            c.insert("mean".into(), ConstituentValue::Number(mean));
            let names = vec![ConstituentValue::Text("M2".into())];
            c.insert("name".into(), ConstituentValue::List(names));
            c.insert("A".into(), ConstituentValue::Array(vec![0.5, 0.25].into_boxed_slice()));
            let weights = vec![1.0; values.len()].into_boxed_slice();
            c.insert(WEIGHTS_KEY.into(), ConstituentValue::Array(weights));
            Ok(c)
        }

        fn reconstruct(&self, index: &[Instant], constituents: &Constituents) -> Result<Vec<f64>> {
            let mean = constituents
                .get("mean")
                .and_then(ConstituentValue::as_number)
                .ok_or_else(|| CurationError::Analysis("no mean".into()))?;
            Ok(vec![mean; index.len()])
        }
    }

    fn decomposed() -> DecomposedSeries {
        let t0 = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let meta = SeriesMetadata {
            provider: "IOC".into(),
            provider_id: "waka".into(),
            sensor: "rad".into(),
            lat: 45.4,
            lon: None,
            main_interval_seconds: Some(3600),
        };
        let raw = RawSeries::new(
            (0..6).map(|h| t0 + Duration::hours(h)).collect(),
            vec![1.0, 2.0, 100.0, f64::NAN, 3.0, 4.0],
            meta,
        )
        .unwrap();
        let mut t = Transformation::new("IOC", "waka", "rad", "2012", "2013").unwrap();
        t.add_timestamps([t0 + Duration::hours(2)]).unwrap();
        mask::apply(&raw, &t).unwrap()
    }

    #[test]
    fn test_solve_uses_clean_samples_and_latitude() {
        let analysis = MeanTide::default();
        let c = calc_constituents(&analysis, &decomposed()).unwrap();
        assert_eq!(*analysis.seen.borrow(), vec![(4, 45.4)]);
        assert_eq!(c.get("mean").and_then(ConstituentValue::as_number), Some(2.5));
        assert!(!c.contains_key(WEIGHTS_KEY));
    }

    #[test]
    fn test_surge_is_clean_minus_tide() {
        let analysis = MeanTide::default();
        let series = decomposed();
        let c = calc_constituents(&analysis, &series).unwrap();
        let surge = calc_surge(&analysis, &series, &c, DEFAULT_TIDE_PREFIX).unwrap();

        assert_eq!(surge.column_names(), ["tide", "tide_surge"]);
        assert_eq!(surge.column("tide"), Some(&[2.5; 6][..]));
        let s = surge.column("tide_surge").unwrap();
        assert_eq!(s[0], -1.5);
        assert!(s[2].is_nan(), "masked sample");
        assert!(s[3].is_nan(), "missing sample");
        assert_eq!(s[5], 1.5);
    }

    #[test]
    fn test_short_reconstruction_is_analysis_error() {
        struct Short;
        impl HarmonicAnalysis for Short {
            fn solve(&self, _: &[Instant], _: &[f64], _: f64) -> Result<Constituents> {
                Ok(Constituents::new())
            }
            fn reconstruct(&self, _: &[Instant], _: &Constituents) -> Result<Vec<f64>> {
                Ok(vec![0.0])
            }
        }
        let err = calc_surge(&Short, &decomposed(), &Constituents::new(), "tide").unwrap_err();
        assert!(matches!(err, CurationError::Analysis(_)), "got {:?}", err);
    }

    #[test]
    fn test_persistence_drops_weights_and_keeps_arrays() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(tmp.path());
        let analysis = MeanTide::default();
        let mut c = analysis.solve(&[], &[1.0, 3.0], 0.0).unwrap();
        assert!(c.contains_key(WEIGHTS_KEY));

        assert!(load_constituents(&settings, "IOC-waka-rad").unwrap().is_none());
        let path = dump_constituents(&settings, "IOC-waka-rad", &c, None).unwrap();
        assert_eq!(path, settings.constituents_dir().join("ioc-waka-rad.json"));

        let back = load_constituents(&settings, "ioc-waka-rad").unwrap().unwrap();
        strip_weights(&mut c);
        assert_eq!(back, c);
        assert_eq!(back["A"].as_array(), Some(&[0.5, 0.25][..]));
        assert!(matches!(back["name"], ConstituentValue::List(_)));
    }

    #[test]
    fn test_nested_payload_round_trips() {
        let json = r#"{
            "aux": {"lat": 45.4, "opt": {"method": "ols", "trend": false}},
            "g_ci": [1, 2.5],
            "nothing": null
        }"#;
        let c: Constituents = serde_json::from_str(json).unwrap();
        let aux = match &c["aux"] {
            ConstituentValue::Map(m) => m,
            other => panic!("expected map, got {:?}", other),
        };
        assert_eq!(aux["lat"].as_number(), Some(45.4));
        assert_eq!(c["g_ci"].as_array(), Some(&[1.0, 2.5][..]));
        assert_eq!(c["nothing"], ConstituentValue::Null);

        let text = serde_json::to_string(&c).unwrap();
        let again: Constituents = serde_json::from_str(&text).unwrap();
        assert_eq!(again, c);
    }

    #[test]
    fn test_array_with_nan_stays_an_array() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(tmp.path());
        let mut c = Constituents::new();
        let amplitudes = vec![1.0, f64::NAN, 0.5].into_boxed_slice();
        c.insert("A_ci".into(), ConstituentValue::Array(amplitudes));

        let path = dump_constituents(&settings, "ioc-waka-rad", &c, None).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("null"), "NaN is written as null: {}", text);

        let back = load_constituents_from_path(&path).unwrap();
        let values = back["A_ci"].as_array().expect("numeric list with NaN is an array");
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 0.5);
    }

    #[test]
    fn test_mixed_list_is_not_an_array() {
        let c: Constituents = serde_json::from_str(r#"{"name": ["M2", 1.0]}"#).unwrap();
        assert!(c["name"].as_array().is_none());
        assert!(matches!(c["name"], ConstituentValue::List(_)));
    }
}

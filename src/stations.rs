/// Station identity for the tide-gauge curation service.
///
/// Every station/sensor combination is addressed by a key of the form
/// `provider-provider_id-sensor` (e.g. `ioc-waka-rad`). The key is the
/// single source of truth for document locations: transformation, raw,
/// reanalysis and constituent files are all named after it. Other modules
/// should derive file stems from here rather than formatting keys by hand.

use std::fmt;
use std::path::Path;

use crate::model::{CurationError, Result};

/// Separator between the three key components.
pub const KEY_SEPARATOR: char = '-';

// ---------------------------------------------------------------------------
// Station key
// ---------------------------------------------------------------------------

/// The `(provider, provider_id, sensor)` triple identifying one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationKey {
    pub provider: String,
    pub provider_id: String,
    pub sensor: String,
}

impl StationKey {
    pub fn new(
        provider: impl Into<String>,
        provider_id: impl Into<String>,
        sensor: impl Into<String>,
    ) -> Self {
        StationKey {
            provider: provider.into(),
            provider_id: provider_id.into(),
            sensor: sensor.into(),
        }
    }

    /// Splits `provider-provider_id-sensor` on the fixed separator.
    ///
    /// Fails with `MalformedKey` unless there are exactly three non-empty
    /// components.
    pub fn parse(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [provider, provider_id, sensor]
                if !provider.is_empty() && !provider_id.is_empty() && !sensor.is_empty() =>
            {
                Ok(StationKey::new(*provider, *provider_id, *sensor))
            }
            _ => Err(CurationError::MalformedKey(key.to_string())),
        }
    }

    /// Canonical file stem: the provider is lower-cased, the rest is kept
    /// verbatim.
    pub fn file_stem(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.provider.to_lowercase(),
            self.provider_id,
            self.sensor,
            sep = KEY_SEPARATOR
        )
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.provider,
            self.provider_id,
            self.sensor,
            sep = KEY_SEPARATOR
        )
    }
}

impl std::str::FromStr for StationKey {
    type Err = CurationError;

    fn from_str(s: &str) -> Result<Self> {
        StationKey::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Derived keys
// ---------------------------------------------------------------------------

/// Reanalysis data is gridded per location, not per sensor, so a full
/// `provider-provider_id-sensor` key loses its sensor suffix. Keys with any
/// other number of separators are used unchanged.
pub fn era5_id(key: &str) -> &str {
    if key.matches(KEY_SEPARATOR).count() == 2 {
        key.rsplit_once(KEY_SEPARATOR).map(|(head, _)| head).unwrap_or(key)
    } else {
        key
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Lists the station keys that have a `.json` document in `dir`, sorted.
///
/// File stems that are not valid station keys are skipped. A missing
/// directory yields an empty list.
pub fn discover(dir: &Path) -> Result<Vec<StationKey>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CurationError::store(dir, e)),
    };

    let mut keys = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CurationError::store(dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(key) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| StationKey::parse(s).ok())
        {
            keys.push(key);
        }
    }
    keys.sort();
    Ok(keys)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_into_three_components() {
        let key = StationKey::parse("ioc-waka-rad").expect("valid key");
        assert_eq!(key.provider, "ioc");
        assert_eq!(key.provider_id, "waka");
        assert_eq!(key.sensor, "rad");
    }

    #[test]
    fn test_parse_rejects_wrong_component_count() {
        for bad in ["", "ioc", "onlyone-hyphen", "a-b-c-d", "ioc--rad", "-waka-rad", "ioc-waka-"] {
            let err = StationKey::parse(bad).unwrap_err();
            assert!(
                matches!(err, CurationError::MalformedKey(ref k) if k == bad),
                "'{}' should be MalformedKey, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let key = StationKey::new("IOC", "waka", "rad");
        assert_eq!(key.to_string(), "IOC-waka-rad");
        assert_eq!(key.to_string().parse::<StationKey>().unwrap(), key);
    }

    #[test]
    fn test_file_stem_lowercases_provider_only() {
        let key = StationKey::new("IOC", "WAKA", "Rad");
        assert_eq!(key.file_stem(), "ioc-WAKA-Rad");
    }

    #[test]
    fn test_era5_id_strips_sensor_from_full_keys() {
        assert_eq!(era5_id("ioc-waka-rad"), "ioc-waka");
        assert_eq!(era5_id("ioc-waka"), "ioc-waka");
        assert_eq!(era5_id("waka"), "waka");
        assert_eq!(era5_id("a-b-c-d"), "a-b-c-d");
    }

    #[test]
    fn test_discover_lists_valid_keys_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["uhslc-123-prs.json", "ioc-waka-rad.json", "notes.txt", "bad.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let keys = discover(dir.path()).unwrap();
        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["ioc-waka-rad", "uhslc-123-prs"]);
    }

    #[test]
    fn test_discover_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let keys = discover(&dir.path().join("absent")).unwrap();
        assert!(keys.is_empty());
    }
}

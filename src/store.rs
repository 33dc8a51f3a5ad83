/// Persistence for transformation documents.
///
/// Documents live at `{trans_dir}/{provider.lower()}-{provider_id}-{sensor}.json`
/// as pretty-printed JSON with a trailing newline. A station that has never
/// been annotated has no document; loading it synthesizes an untouched record
/// spanning the whole raw record instead of failing.
///
/// Writes go to a temporary file in the target directory which is then
/// renamed over the destination, so a concurrent reader sees either the old
/// document or the new one, never a torn write.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::logging::{self, Component};
use crate::model::{CurationError, Result};
use crate::series::{FsRawSource, RawRecordSource, RawSeries};
use crate::stations::StationKey;
use crate::transformation::Transformation;

// ---------------------------------------------------------------------------
// Atomic writes
// ---------------------------------------------------------------------------

/// Replaces `path` with `contents` in one rename. Parent directories are
/// created as needed.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| CurationError::store(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CurationError::store(path, e))?;
    tmp.write_all(contents).map_err(|e| CurationError::store(path, e))?;
    tmp.as_file().sync_all().map_err(|e| CurationError::store(path, e))?;
    tmp.persist(path).map_err(|e| CurationError::store(path, e.error))?;
    Ok(())
}

/// Reads a file, mapping "does not exist" to `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CurationError::store(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct TransformationStore<S = FsRawSource> {
    settings: Settings,
    raw: S,
}

impl TransformationStore<FsRawSource> {
    /// Store backed by raw records under `settings.raw_dir()`.
    pub fn new(settings: Settings) -> Self {
        let raw = FsRawSource::new(&settings);
        TransformationStore { settings, raw }
    }
}

impl<S: RawRecordSource> TransformationStore<S> {
    pub fn with_raw_source(settings: Settings, raw: S) -> Self {
        TransformationStore { settings, raw }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn raw_source(&self) -> &S {
        &self.raw
    }

    /// Canonical document location for a station.
    pub fn path_for(&self, key: &StationKey) -> PathBuf {
        self.settings
            .trans_dir()
            .join(format!("{}.json", key.file_stem()))
    }

    /// Loads the document for `key`, or synthesizes a default record from
    /// the raw record's first and last sample when there is none.
    ///
    /// Fails with `MalformedKey` if `key` is not `provider-provider_id-sensor`.
    /// Any failure other than the document being absent propagates.
    pub fn load(&self, key: &str) -> Result<Transformation> {
        let station = StationKey::parse(key)?;
        if let Some(trans) = self.read_saved(key, &station)? {
            return Ok(trans);
        }
        let raw = self.raw.load_raw(key).inspect_err(|e| {
            logging::log_failure(Component::Raw, Some(key), "Loading raw record", e);
        })?;
        synthesize(key, &station, &raw)
    }

    /// As `load` for the station `raw` belongs to, but a default record is
    /// synthesized from `raw` itself instead of fetching the raw record.
    pub fn load_for_series(&self, raw: &RawSeries) -> Result<Transformation> {
        let station = raw.metadata().station_key();
        let key = station.to_string();
        match self.read_saved(&key, &station)? {
            Some(trans) => Ok(trans),
            None => synthesize(&key, &station, raw),
        }
    }

    fn read_saved(&self, key: &str, station: &StationKey) -> Result<Option<Transformation>> {
        let path = self.path_for(station);
        match read_optional(&path)? {
            Some(text) => {
                logging::debug(Component::Store, Some(key), &format!("Loading {}", path.display()));
                parse_document(&path, &text).map(Some)
            }
            None => {
                logging::debug(
                    Component::Store,
                    Some(key),
                    &format!("No document at {}, synthesizing default", path.display()),
                );
                Ok(None)
            }
        }
    }

    /// Strict deserialization of a document at an explicit path.
    pub fn load_from_path(&self, path: &Path) -> Result<Transformation> {
        load_from_path(path)
    }

    /// Writes `trans` to `path`, or to its canonical location when `path` is
    /// `None`. Returns the location written.
    pub fn dump(&self, trans: &Transformation, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => trans.canonical_path(&self.settings.trans_dir()),
        };
        let text = to_document(trans).map_err(|e| CurationError::store(&path, e))?;
        write_atomic(&path, text.as_bytes())?;
        logging::info(
            Component::Store,
            Some(&trans.station_key().to_string()),
            &format!("Saved {}", path.display()),
        );
        Ok(path)
    }
}

/// Untouched record spanning `raw` from its first to its last sample.
fn synthesize(key: &str, station: &StationKey, raw: &RawSeries) -> Result<Transformation> {
    match (raw.first(), raw.last()) {
        (Some(first), Some(last)) => Transformation::for_station(station, first, last),
        _ => Err(CurationError::InvalidSeries(format!(
            "raw record for '{}' has no samples",
            key
        ))),
    }
}

/// Strict deserialization: a missing file, malformed JSON, unknown fields,
/// unparseable instants and inverted ranges are all `Store` errors.
pub fn load_from_path(path: &Path) -> Result<Transformation> {
    let text = std::fs::read_to_string(path).map_err(|e| CurationError::store(path, e))?;
    parse_document(path, &text)
}

fn parse_document(path: &Path, text: &str) -> Result<Transformation> {
    serde_json::from_str(text).map_err(|e| CurationError::store(path, e))
}

/// Canonical textual form: two-space indented JSON plus a trailing newline.
pub fn to_document(trans: &Transformation) -> serde_json::Result<String> {
    let mut text = serde_json::to_string_pretty(trans)?;
    text.push('\n');
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Settings for the curation service.
///
/// All document locations hang off a single data directory:
///
/// ```text
/// {data_dir}/raw/    raw station records
/// {data_dir}/trans/  transformation documents
/// {data_dir}/era5/   reanalysis series
/// {data_dir}/const/  tidal constituents
/// ```
///
/// A `Settings` value is built once and passed explicitly to the store and
/// to every accessor. Nothing in the crate reads the environment on its own.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::model::{CurationError, Result};

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "SEALEVEL_DATA_DIR";

/// Data directory used when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: PathBuf,
}

/// On-disk TOML layout. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    data_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::with_data_dir(DEFAULT_DATA_DIR)
    }
}

impl Settings {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Settings {
            data_dir: data_dir.into(),
        }
    }

    /// Resolves settings with the usual precedence:
    /// environment (including `.env`) > TOML file > default.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let file = match config_file {
            Some(path) => Some(Self::from_toml_file(path)?),
            None => None,
        };
        Ok(Self::resolve(|key| env::var(key).ok(), file))
    }

    /// Precedence logic with an injectable variable lookup, so tests never
    /// touch the process environment.
    pub fn resolve<F>(lookup: F, file: Option<Settings>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            Some(dir) => Settings::with_data_dir(dir),
            None => file.unwrap_or_default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: SettingsFile =
            toml::from_str(text).map_err(|e| CurationError::Config(e.to_string()))?;
        Ok(file
            .data_dir
            .map(Settings::with_data_dir)
            .unwrap_or_default())
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CurationError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    // --- Derived directories ------------------------------------------------

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn trans_dir(&self) -> PathBuf {
        self.data_dir.join("trans")
    }

    pub fn era5_dir(&self) -> PathBuf {
        self.data_dir.join("era5")
    }

    pub fn constituents_dir(&self) -> PathBuf {
        self.data_dir.join("const")
    }

    /// Creates the four data directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.raw_dir(), self.trans_dir(), self.era5_dir(), self.constituents_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| CurationError::store(&dir, e))?;
        }
        Ok(())
    }

    pub fn log_config(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  data_dir         : {}", self.data_dir.display());
        tracing::info!("  raw_dir          : {}", self.raw_dir().display());
        tracing::info!("  trans_dir        : {}", self.trans_dir().display());
        tracing::info!("  era5_dir         : {}", self.era5_dir().display());
        tracing::info!("  constituents_dir : {}", self.constituents_dir().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_directories() {
        let s = Settings::with_data_dir("/srv/sealevel");
        assert_eq!(s.raw_dir(), PathBuf::from("/srv/sealevel/raw"));
        assert_eq!(s.trans_dir(), PathBuf::from("/srv/sealevel/trans"));
        assert_eq!(s.era5_dir(), PathBuf::from("/srv/sealevel/era5"));
        assert_eq!(s.constituents_dir(), PathBuf::from("/srv/sealevel/const"));
    }

    #[test]
    fn test_env_beats_file_beats_default() {
        let file = Settings::with_data_dir("/from/file");

        let from_env = Settings::resolve(
            |k| (k == ENV_DATA_DIR).then(|| "/from/env".to_string()),
            Some(file.clone()),
        );
        assert_eq!(from_env.data_dir, PathBuf::from("/from/env"));

        let from_file = Settings::resolve(|_| None, Some(file.clone()));
        assert_eq!(from_file, file);

        let default = Settings::resolve(|_| None, None);
        assert_eq!(default.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_blank_env_value_is_ignored() {
        let s = Settings::resolve(|_| Some("  ".to_string()), None);
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_toml_parsing() {
        let s = Settings::from_toml_str("data_dir = \"/srv/tide\"\n").unwrap();
        assert_eq!(s.data_dir, PathBuf::from("/srv/tide"));

        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());

        let err = Settings::from_toml_str("raw_dir = \"/x\"").unwrap_err();
        assert!(matches!(err, CurationError::Config(_)), "got {:?}", err);
    }

    #[test]
    fn test_ensure_dirs_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let s = Settings::with_data_dir(tmp.path().join("data"));
        s.ensure_dirs().unwrap();
        assert!(s.raw_dir().is_dir());
        assert!(s.trans_dir().is_dir());
        assert!(s.era5_dir().is_dir());
        assert!(s.constituents_dir().is_dir());
    }
}

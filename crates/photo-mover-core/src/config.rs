use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{MoverError, MoverResult};

/// Default configuration filename, resolved against the working directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// How capture dates are turned into folder names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortMode {
    /// `YYYY-MM`
    #[default]
    #[serde(rename = "Month_Year")]
    MonthYear,
    /// `YYYY-MM-DD`
    #[serde(rename = "Date_Month_Year")]
    DateMonthYear,
}

/// What to do when the destination already holds a file with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMode {
    /// Replace the existing file.
    #[default]
    Overwrite,
    /// Copy under `name_1.ext`, `name_2.ext`, ...
    KeepBoth,
    /// Leave the existing file alone and skip the item.
    Skip,
}

/// User-facing sort settings, persisted as JSON.
///
/// Keys this version does not know about are carried in `extra` and written
/// back unchanged on save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortConfiguration {
    pub sort_mode: SortMode,
    pub output_base_path: PathBuf,
    pub unknown_folder_path: PathBuf,
    pub duplicate_mode: DuplicateMode,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SortConfiguration {
    fn default() -> Self {
        let base = default_pictures_dir().join("iOS_Photos");
        Self {
            sort_mode: SortMode::default(),
            unknown_folder_path: base.join("Unknown"),
            output_base_path: base,
            duplicate_mode: DuplicateMode::default(),
            extra: Map::new(),
        }
    }
}

fn default_pictures_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join("Pictures"))
        .unwrap_or_else(|| PathBuf::from("Pictures"))
}

impl SortConfiguration {
    /// Load configuration from `path`, defaulting every field the file does not set.
    ///
    /// A missing file yields the defaults. An unreadable or malformed file is
    /// logged and also yields the defaults. A single bad field only resets
    /// that field.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Self::default();
        }

        match Self::read(path) {
            Ok(map) => Self::from_map(map),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error loading config, using defaults");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> io::Result<Map<String, Value>> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Merge a stored record over the defaults, key by key.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            sort_mode: take_field(&mut map, "sort_mode", defaults.sort_mode),
            output_base_path: take_field(&mut map, "output_base_path", defaults.output_base_path),
            unknown_folder_path: take_field(
                &mut map,
                "unknown_folder_path",
                defaults.unknown_folder_path,
            ),
            duplicate_mode: take_field(&mut map, "duplicate_mode", defaults.duplicate_mode),
            extra: map,
        }
    }

    /// Save configuration to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> MoverResult<()> {
        let config_err = |source: io::Error| MoverError::Config {
            operation: "save",
            path: path.to_path_buf(),
            source,
        };

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        let file = File::create(&temp_path).map_err(config_err)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| config_err(e.into()))?;
        fs::rename(&temp_path, path).map_err(config_err)?;
        Ok(())
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reject configurations a batch cannot run with.
    pub fn validate(&self) -> MoverResult<()> {
        if self.output_base_path.as_os_str().is_empty() {
            return Err(MoverError::InvalidConfig { field: "output_base_path" });
        }
        if self.unknown_folder_path.as_os_str().is_empty() {
            return Err(MoverError::InvalidConfig { field: "unknown_folder_path" });
        }
        Ok(())
    }
}

fn take_field<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str, default: T) -> T {
    let Some(value) = map.remove(key) else {
        return default;
    };
    match serde_json::from_value(value) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(field = key, error = %e, "invalid config value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        File::create(&path)
            .unwrap()
            .write_all(br#"{"sort_mode": "Date_Month_Year", "duplicate_mode": "keep_both"}"#)
            .unwrap();

        let config = SortConfiguration::load(&path);
        let defaults = SortConfiguration::default();
        assert_eq!(config.sort_mode, SortMode::DateMonthYear);
        assert_eq!(config.duplicate_mode, DuplicateMode::KeepBoth);
        assert_eq!(config.output_base_path, defaults.output_base_path);
        assert_eq!(config.unknown_folder_path, defaults.unknown_folder_path);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        File::create(&path).unwrap().write_all(b"{not json").unwrap();

        assert_eq!(SortConfiguration::load(&path), SortConfiguration::default());
    }

    #[test]
    fn test_save_load_keeps_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        File::create(&path)
            .unwrap()
            .write_all(br#"{"output_base_path": "/data/photos", "window_geometry": "1000x900"}"#)
            .unwrap();

        let mut config = SortConfiguration::load(&path);
        config.duplicate_mode = DuplicateMode::Skip;
        config.save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(raw["window_geometry"], "1000x900");
        assert_eq!(raw["duplicate_mode"], "skip");
        assert_eq!(raw["sort_mode"], "Month_Year");

        let reloaded = SortConfiguration::load(&path);
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.output_base_path, PathBuf::from("/data/photos"));
    }

    #[test]
    fn test_bad_field_keeps_the_rest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let stored = r#"{
            "output_base_path": "/data/photos",
            "sort_mode": "month_year",
            "duplicate_mode": "keep_both",
            "window_geometry": "1000x900"
        }"#;
        File::create(&path).unwrap().write_all(stored.as_bytes()).unwrap();

        let config = SortConfiguration::load(&path);
        assert_eq!(config.sort_mode, SortMode::MonthYear);
        assert_eq!(config.duplicate_mode, DuplicateMode::KeepBoth);
        assert_eq!(config.output_base_path, PathBuf::from("/data/photos"));
        assert_eq!(config.extra["window_geometry"], "1000x900");

        config.save(&path).unwrap();
        let raw: Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(raw["output_base_path"], "/data/photos");
        assert_eq!(raw["window_geometry"], "1000x900");
        assert_eq!(raw["sort_mode"], "Month_Year");
        assert_eq!(raw["duplicate_mode"], "keep_both");
    }

    #[test]
    fn test_non_object_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        File::create(&path).unwrap().write_all(b"[1, 2]").unwrap();

        assert_eq!(SortConfiguration::load(&path), SortConfiguration::default());
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let mut config = SortConfiguration::default();
        assert!(config.validate().is_ok());
        config.unknown_folder_path = PathBuf::new();
        assert!(matches!(
            config.validate(),
            Err(MoverError::InvalidConfig { field: "unknown_folder_path" })
        ));
    }
}

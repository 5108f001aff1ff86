//! Persistent overlay: the durable key-value store beneath the config file.

use super::write_atomic;
use crate::telemetry::Logger;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Hidden directory holding the overlay, created next to the config file.
pub const OVERLAY_DIR_NAME: &str = ".fbt";

/// Overlay file name inside the overlay directory.
pub const OVERLAY_FILE_NAME: &str = "persistent_config.json";

/// Environment variable that relocates the overlay directory.
pub const DATA_DIR_ENV: &str = "FBT_DATA_DIR";

/// Flat JSON object of dotted keys, stored independently of the config file.
///
/// Entries are never evicted. The directory is only created when the overlay
/// is first written.
#[derive(Debug, Clone)]
pub struct PersistentOverlay {
    dir: PathBuf,
    logger: Logger,
}

impl PersistentOverlay {
    /// Overlay stored in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            logger: Logger::disabled(),
        }
    }

    /// Overlay belonging to the config file at `config_path`.
    ///
    /// Uses `$FBT_DATA_DIR` when set, otherwise `.fbt/` next to the config file.
    pub fn for_config(config_path: &Path) -> Self {
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(PathBuf::from(dir)),
            _ => Self::new(default_dir_for(config_path)),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Directory holding the overlay file.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the overlay file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(OVERLAY_FILE_NAME)
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Read every entry. A missing file is an empty overlay.
    pub fn load(&self) -> Result<Map<String, Value>> {
        let path = self.path();
        if !path.exists() {
            return Ok(Map::new());
        }

        let content = std::fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(Error::ConfigParse {
                path,
                message: "persistent overlay must be a JSON object".to_string(),
            }),
            Err(e) => Err(Error::ConfigParse {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Overwrite the overlay with `entries`.
    pub fn save(&self, entries: &Map<String, Value>) -> Result<()> {
        let _log = self.logger.enter();
        let path = self.path();
        let mut json = serde_json::to_string_pretty(entries)?;
        json.push('\n');
        write_atomic(&path, json.as_bytes())?;
        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "saved persistent overlay"
        );
        Ok(())
    }

    /// Set one key (load, mutate, save).
    pub fn update(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value);
        self.save(&entries)
    }

    /// Value stored under `key`, or `default`.
    pub fn get(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.load()?.remove(key).unwrap_or(default))
    }
}

/// `.fbt/` next to `config_path`.
fn default_dir_for(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(OVERLAY_DIR_NAME),
        _ => PathBuf::from(OVERLAY_DIR_NAME),
    }
}

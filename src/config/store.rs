//! Config store: load, validate, merge, and persist the workflow configuration.

use super::overlay::PersistentOverlay;
use super::schema::{WorkflowConfig, default_config, migrate_legacy_sections, validate};
use super::write_atomic;
use crate::telemetry::Logger;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Config file used when no `--config-path` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// The in-memory configuration tree plus the two files backing it.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Value,
    overlay: PersistentOverlay,
    logger: Logger,
}

impl ConfigStore {
    /// Load the config at `path` with its default overlay location.
    pub fn load(path: impl AsRef<Path>, logger: Logger) -> Result<Self> {
        let path = path.as_ref();
        let overlay = PersistentOverlay::for_config(path).with_logger(logger.clone());
        Self::load_with_overlay(path, overlay, logger)
    }

    /// Load the config at `path`, merging `overlay` on top.
    ///
    /// A missing file is replaced by the built-in defaults, which are written
    /// out before the overlay is applied. Validation runs on the merged tree.
    pub fn load_with_overlay(
        path: impl AsRef<Path>,
        overlay: PersistentOverlay,
        logger: Logger,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let _log = logger.enter();

        let mut config = if path.exists() {
            tracing::debug!(path = %path.display(), "loading config");
            read_config_file(&path)?
        } else {
            let config = default_config();
            write_config_file(&path, &config)?;
            tracing::info!(path = %path.display(), "config file not found, wrote defaults");
            config
        };

        if !overlay.exists() {
            overlay.save(&Map::new())?;
            tracing::info!(path = %overlay.path().display(), "created persistent overlay");
        }

        if migrate_legacy_sections(&mut config) {
            tracing::warn!("migrated legacy 'ai_agent' section to 'agent'");
        }

        let entries = overlay.load()?;
        for (key, value) in &entries {
            apply_entry(&mut config, key, value.clone());
        }
        tracing::debug!(entries = entries.len(), "applied persistent overlay");

        validate(&config)?;
        tracing::debug!("configuration validated");

        Ok(Self {
            path,
            config,
            overlay,
            logger,
        })
    }

    /// Replace the logger, e.g. once the `logging` section has been read.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.overlay = self.overlay.with_logger(logger.clone());
        self.logger = logger;
        self
    }

    /// Path of the primary config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn overlay(&self) -> &PersistentOverlay {
        &self.overlay
    }

    /// The merged configuration tree.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Typed view of the merged configuration.
    pub fn settings(&self) -> Result<WorkflowConfig> {
        WorkflowConfig::from_value(&self.config)
    }

    /// Dotted-path lookup (`"commit.author_email"`).
    pub fn get(&self, key_path: &str) -> Option<&Value> {
        lookup(&self.config, key_path)
    }

    /// Dotted-path lookup with a fallback for any missing segment.
    pub fn get_or(&self, key_path: &str, default: Value) -> Value {
        self.get(key_path).cloned().unwrap_or(default)
    }

    /// String value at `key_path`, if present and a string.
    pub fn get_str(&self, key_path: &str) -> Option<&str> {
        self.get(key_path).and_then(Value::as_str)
    }

    /// Set `key_path` to `value`, write it to the overlay, then save everything.
    pub fn set(&mut self, key_path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let _log = self.logger.enter();

        insert_path(&mut self.config, key_path, value.clone());
        self.overlay.update(key_path, value)?;
        tracing::info!(key = key_path, "configuration value set");

        self.save()
    }

    /// Write the full configuration to the overlay and then to the config file.
    pub fn save(&self) -> Result<()> {
        let _log = self.logger.enter();

        let mut entries = self.overlay.load()?;
        entries.extend(flatten(&self.config));
        self.overlay.save(&entries)?;

        write_config_file(&self.path, &self.config)?;
        tracing::info!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str::<Value>(&content).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_config_file(path: &Path, config: &Value) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    write_atomic(path, yaml.as_bytes())
}

/// Follow `key_path` through nested mappings.
///
/// Returns `None` as soon as a segment is missing or the node is not a mapping.
pub fn lookup<'a>(root: &'a Value, key_path: &str) -> Option<&'a Value> {
    key_path
        .split('.')
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

/// Store `value` at `key_path`, creating (or replacing non-mapping) intermediate nodes.
pub fn insert_path(root: &mut Value, key_path: &str, value: Value) {
    let mut node = root;
    let mut segments = key_path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Flatten a tree into dotted keys. Empty mappings are kept as leaves.
pub fn flatten(root: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    if let Value::Object(map) = root {
        for (key, value) in map {
            flatten_into(key.clone(), value, &mut out);
        }
    }
    out
}

fn flatten_into(prefix: String, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(format!("{}.{}", prefix, key), child, out);
            }
        }
        _ => {
            out.insert(prefix, value.clone());
        }
    }
}

/// Apply one overlay entry. Nested mappings merge key by key.
fn apply_entry(config: &mut Value, key: &str, value: Value) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (child, v) in map {
                apply_entry(config, &format!("{}.{}", key, child), v);
            }
        }
        other => insert_path(config, key, other),
    }
}

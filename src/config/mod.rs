//! Configuration management for the feature-branch workflow.
//!
//! Two files back every configuration:
//!
//! ## config.yaml - Primary configuration (disposable)
//!
//! Located at the path given by `--config-path` (default `./config.yaml`).
//! Created from built-in defaults on first load. Safe to delete: it is
//! regenerated on the next run.
//!
//! ## .fbt/persistent_config.json - Persistent overlay (durable)
//!
//! Located next to the config file (or in `$FBT_DATA_DIR`). A flat JSON object
//! of dotted keys (`"repository.path": "/work/app"`) that is applied on top of
//! the parsed config file on every load. Every `set` writes the key here
//! before the config file is rewritten, so values set by the workflow survive
//! a config reset.
//!
//! ## Precedence
//!
//! overlay > config file > built-in defaults (defaults only when the file is absent)

pub mod overlay;
pub mod schema;
pub mod store;

pub use overlay::{DATA_DIR_ENV, OVERLAY_DIR_NAME, OVERLAY_FILE_NAME, PersistentOverlay};
pub use schema::{
    AgentSettings, BranchSettings, CommitSettings, LogLevel, LoggingSettings, MergeSettings,
    MergeStrategy, RepositorySettings, WorkflowConfig, default_config, validate,
};
pub use store::{ConfigStore, DEFAULT_CONFIG_PATH, flatten, insert_path, lookup};

use crate::Result;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `contents` via a temporary file in the same directory.
///
/// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

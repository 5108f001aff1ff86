//! Logger construction.
//!
//! Components never log through a process-wide subscriber. Each one holds a
//! [`Logger`] handed to it at construction and scopes its events to it with
//! [`Logger::enter`]. The binary builds one from the `logging` config section;
//! tests use [`Logger::disabled`].

use std::path::{Path, PathBuf};

use tracing::Dispatch;
use tracing::dispatcher::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::LoggingSettings;
use crate::{Error, Result};

/// Environment variable holding an `EnvFilter` directive that overrides the configured level.
pub const LOG_ENV: &str = "FBT_LOG";

/// An explicit logging sink passed into each component.
#[derive(Clone, Debug)]
pub struct Logger {
    dispatch: Dispatch,
}

/// Keeps the non-blocking file writer flushing until dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

impl Logger {
    /// A logger that discards everything.
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Stderr-only logger used before the configuration is loaded.
    ///
    /// Silent unless `verbosity > 0`.
    pub fn bootstrap(verbosity: u8) -> Self {
        if verbosity == 0 {
            return Self::disabled();
        }
        let layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> =
            vec![stderr_layer(level_from_verbosity(verbosity))];
        Self {
            dispatch: Dispatch::new(Registry::default().with(layers)),
        }
    }

    /// Logger configured from the `logging` section.
    ///
    /// A relative `logging.file` is resolved against `base_dir` (the config
    /// file's directory); an empty one disables file output. `verbosity > 0`
    /// adds stderr output and raises the level to DEBUG (TRACE at 2+).
    pub fn from_settings(
        settings: &LoggingSettings,
        base_dir: &Path,
        verbosity: u8,
    ) -> Result<(Self, LogGuard)> {
        let level = if verbosity > 0 {
            level_from_verbosity(verbosity)
        } else {
            LevelFilter::from_level(settings.level.to_tracing())
        };

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
        let mut file_guard = None;

        if let Some(path) = resolve_log_path(&settings.file, base_dir) {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| Error::Other(format!("invalid log file path: {}", path.display())))?;

            std::fs::create_dir_all(&dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name)
                .build(&dir)
                .map_err(|e| Error::Other(format!("failed to open log file: {}", e)))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            layers.push(Box::new(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(build_filter(level)),
            ));
            file_guard = Some(guard);
        }

        if verbosity > 0 {
            layers.push(stderr_layer(level));
        }

        let logger = Self {
            dispatch: Dispatch::new(Registry::default().with(layers)),
        };
        Ok((logger, LogGuard { _file: file_guard }))
    }

    /// Make this logger the current thread's default until the guard drops.
    pub fn enter(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::disabled()
    }
}

fn stderr_layer(level: LevelFilter) -> Box<dyn Layer<Registry> + Send + Sync> {
    Box::new(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(build_filter(level)),
    )
}

fn build_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy()
}

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Resolve `logging.file` to an absolute-ish path, or `None` when empty.
fn resolve_log_path(file: &str, base_dir: &Path) -> Option<PathBuf> {
    let file = file.trim();
    if file.is_empty() {
        return None;
    }
    let path = expand_home(Path::new(file));
    if path.is_absolute() {
        Some(path)
    } else {
        Some(base_dir.join(path))
    }
}

/// Expand ~ in path to home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

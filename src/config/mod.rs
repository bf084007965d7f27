//! Hub configuration.
//!
//! Stored as JSON. Every field has a default, so an empty object (or a
//! missing file with [`HubConfig::load_or_default`]) is a valid config.
//!
//! # Backup Location
//!
//! Unless `backup_dir` is set, Observation backups go to the platform data
//! directory:
//! - **Linux**: `~/.local/share/dev.datahub-rs/backup/`
//! - **macOS**: `~/Library/Application Support/dev.datahub-rs/backup/`
//! - **Windows**: `%APPDATA%\dev.datahub-rs\backup\`

use crate::error::{HubError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.datahub-rs";

/// Backup subdirectory under the application data directory
pub const BACKUP_DIR_NAME: &str = "backup";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

pub const DEFAULT_COMMAND_QUEUE_DEPTH: usize = 256;
pub const DEFAULT_EVENT_QUEUE_DEPTH: usize = 10_000;

/// Platform data directory for the hub, if one can be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Version for future migration support
    #[serde(default = "default_version")]
    pub version: u32,

    /// Where Observation backups are kept; `None` uses the platform data dir
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Capacity of the bridge's command channel
    #[serde(default = "default_command_queue_depth")]
    pub command_queue_depth: usize,

    /// Capacity of the bridge's event channel
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

fn default_version() -> u32 {
    1
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_command_queue_depth() -> usize {
    DEFAULT_COMMAND_QUEUE_DEPTH
}

fn default_event_queue_depth() -> usize {
    DEFAULT_EVENT_QUEUE_DEPTH
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            backup_dir: None,
            log_filter: default_log_filter(),
            command_queue_depth: DEFAULT_COMMAND_QUEUE_DEPTH,
            event_queue_depth: DEFAULT_EVENT_QUEUE_DEPTH,
        }
    }
}

impl HubConfig {
    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HubError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            HubError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| HubError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            HubError::Config(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_queue_depth == 0 || self.event_queue_depth == 0 {
            return Err(HubError::Config("queue depths must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The backup directory to use: `backup_dir` if set, else
    /// `<data dir>/dev.datahub-rs/backup`.
    pub fn resolved_backup_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.backup_dir {
            return Ok(dir.clone());
        }
        app_data_dir()
            .map(|p| p.join(BACKUP_DIR_NAME))
            .ok_or_else(|| HubError::Config("Could not determine app data directory".to_string()))
    }
}

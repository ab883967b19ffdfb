//! Host configuration
//!
//! One TOML file with a `[watcher]` table and a `[workspace]` table. Every
//! field has a default, so a missing file or a partial file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use session::SessionConfig;
use std::path::{Path, PathBuf};
use tracing::debug;
use watcher::WatcherConfig;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub workspace: SessionConfig,
}

impl HostConfig {
    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.watcher.validate().context("Invalid [watcher] section")?;
        self.workspace.validate().context("Invalid [workspace] section")?;
        Ok(())
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Bad config file {}", path.display()))
    }

    /// Validate, then write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// The defaults as commented TOML
    pub fn example() -> String {
        r#"# canopy configuration

[watcher]
# A written file is reported once its size is stable for this long (50-60000)
stability_threshold_ms = 1000
# Pending writes are re-polled this often; also the polling backend interval (10-10000)
poll_interval_ms = 150
# Poll instead of native notifications (always on for macOS)
use_polling = false

[watcher.ignore]
# Also honor <root>/.gitignore
use_gitignore = false
# Extra gitignore-style patterns, relative to the workspace root
additional_patterns = []

[workspace]
# Workspace-local directory holding the state store
state_dir = ".canopy"
"#
        .to_string()
    }
}

/// `<config dir>/canopy/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("canopy").join(CONFIG_FILE))
}

/// Load from the default location
pub fn load() -> Result<HostConfig> {
    match config_file_path() {
        Some(path) => HostConfig::load_from(&path),
        None => Ok(HostConfig::default()),
    }
}

/// Save to the default location
pub fn save(config: &HostConfig) -> Result<()> {
    let path = config_file_path().context("Could not determine config file path")?;
    config.save_to(&path)
}

/// Write the commented example to `path` unless a config is already
/// there. With `overwrite` an existing file is replaced. Returns whether the
/// file was written.
pub fn init_at(path: &Path, overwrite: bool) -> Result<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, HostConfig::example())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

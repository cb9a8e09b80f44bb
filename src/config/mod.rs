//! Session configuration for `vivify.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                         |
//! |------------|-------------------------------------------------|
//! | `[watch]`  | Debounce timing for the file watcher            |
//! | `[styles]` | Shared style sources, watched like definitions  |
//! | `[themes]` | Theme catalog and the default selection         |
//!
//! # Example
//!
//! ```toml
//! [watch]
//! debounce_ms = 300       # quiet window before a change burst is flushed
//! cooldown_ms = 800       # suppress re-delivery right after a flush
//!
//! [styles]
//! paths = ["styles/common.uis"]
//!
//! [themes]
//! available = ["day", "night"]
//! default = "day"
//! ```
//!
//! Every field has a default; an empty file (or no file) is a valid config.

mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// [watch]
// ============================================================================

/// File watcher timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet window before a change burst is flushed, in milliseconds.
    pub debounce_ms: u64,

    /// Re-delivery suppression window after a flush, in milliseconds.
    /// Filters the editor double-writes that slip past the debounce.
    pub cooldown_ms: u64,
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            cooldown_ms: 800,
        }
    }
}

// ============================================================================
// [styles]
// ============================================================================

/// Shared style sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Watched alongside definition sources; a change reloads the style
    /// store and reapplies every registered instance.
    pub paths: Vec<PathBuf>,
}

// ============================================================================
// [themes]
// ============================================================================

/// Theme catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Names `set_theme` accepts.
    pub available: Vec<String>,

    /// Theme active at session start.
    pub default: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            available: vec!["none".to_string()],
            default: "none".to_string(),
        }
    }
}

// ============================================================================
// Root configuration
// ============================================================================

/// Root configuration structure representing vivify.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub watch: WatchConfig,
    pub styles: StylesConfig,
    pub themes: ThemeConfig,
}

impl ReloadConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml(&text)
    }

    /// Parse and validate config text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.debounce_ms must be nonzero".to_string(),
            ));
        }
        if !self.themes.available.contains(&self.themes.default) {
            return Err(ConfigError::Validation(format!(
                "themes.default `{}` is not listed in themes.available",
                self.themes.default
            )));
        }
        Ok(())
    }
}

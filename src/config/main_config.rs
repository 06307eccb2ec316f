//! Main engine config file: `[dev]`/`[window]`/`[controller]` sections,
//! TOML-backed, grounded on `original_source/src/common/config.cpp`'s
//! load-fill-defaults-then-save-on-close scheme and the teacher's
//! `src/config/*.rs` serde+toml idiom (re-pointed from one ad hoc config
//! struct per feature to the single `main_config` spec names it). Lives
//! next to the executable (`Config::kMainConfigRelPath` in the original is
//! also a bare relative name), not in an OS user-config directory - no
//! save-path discovery is in scope here.
//!
//! Missing keys are filled with `Default::default()` values at load, and
//! the whole file is rewritten with those fill-ins immediately so a fresh
//! install ends up with a fully populated, human-editable config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::error::ConfigError;
use crate::util::log;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    pub fps_logging: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self { fps_logging: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: i64,
    pub height: i64,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { width: 1600, height: 900, fullscreen: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub mouse_sensitivity: f64,
    pub forward_speed: f64,
    pub strafe_speed: f64,
    pub roll_speed: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { mouse_sensitivity: 1.0, forward_speed: 4.0, strafe_speed: 4.0, roll_speed: 1.0 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainConfig {
    #[serde(default)]
    pub dev: DevConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Where this instance was loaded from; `None` means "in-memory only,
    /// `save`/`drop` are no-ops" (used by tests and headless callers).
    #[serde(skip)]
    path: Option<PathBuf>,
}

const CONFIG_FILE_NAME: &str = "config.toml";

impl MainConfig {
    /// Loads from `config.toml` next to the current working directory
    /// (creating a default-filled file there if none exists yet), matching
    /// `Config::mainConfig()`'s lazily-initialized singleton behavior minus
    /// the singleton part - callers own their own `MainConfig` instance.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE_NAME)
    }

    /// Loads from an explicit path, for tests and non-default config
    /// locations. Missing keys are filled with defaults and the file is
    /// immediately rewritten with the filled-in values.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();

        let mut config: MainConfig = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            MainConfig::default()
        };

        config.path = Some(path);
        config.save()?;
        Ok(config)
    }

    /// Rewrites the config file with the current values. No-op if this
    /// instance wasn't loaded from (or pointed at) a path.
    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_to(path, self)
    }
}

fn write_to(path: &Path, config: &MainConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

impl Drop for MainConfig {
    fn drop(&mut self) {
        if let Err(err) = self.save() {
            log::error!("failed to save main config: {err}");
        }
    }
}

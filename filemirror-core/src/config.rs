//! Optional `~/.filemirror/config.yaml`.
//!
//! Every field has a default, so a missing file and an empty file both
//! yield [`MirrorConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, RegistryError};
use crate::link::DEFAULT_WEB_HOST;
use crate::paths;

pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Seconds between background sync passes.
    pub interval_secs: u64,
    /// REST endpoint of the remote provider.
    pub api_base: String,
    /// Host used when formatting links.
    pub web_host: String,
    /// Per-request timeout for provider calls.
    pub timeout_secs: u64,
    /// Fallback location; `~/.filemirror/downloaded` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            api_base: DEFAULT_API_BASE.to_owned(),
            web_host: DEFAULT_WEB_HOST.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            download_dir: None,
        }
    }
}

impl MirrorConfig {
    /// Load `<home>/.filemirror/config.yaml`, falling back to defaults when absent.
    pub fn load_at(home: &Path) -> Result<Self, RegistryError> {
        let path = paths::config_path_at(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| RegistryError::Config { path, source })
    }

    /// `load_at` convenience wrapper.
    pub fn load() -> Result<Self, RegistryError> {
        Self::load_at(&paths::home_dir()?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Resolved fallback location for `home`.
    pub fn download_dir_at(&self, home: &Path) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| paths::downloaded_dir_at(home))
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::credentials::CredentialConfig;

/// Default log filter when `RUST_LOG` is not set.
fn default_log_filter() -> String {
    "warn".to_string()
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter directive, e.g. `"info"` or `"keyring_gnome=debug"`.
    /// `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Credential backend settings.
    #[serde(default)]
    pub credentials: CredentialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            credentials: CredentialConfig::default(),
        }
    }
}

impl Config {
    /// Parse a keyring-gnome TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read keyring-gnome config {}", path.display()))?;
        Self::parse(&content, path)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err)
                .with_context(|| format!("cannot read keyring-gnome config {}", path.display())),
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content)
            .with_context(|| format!("invalid keyring-gnome config {}", path.display()))
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./keyring-gnome.toml` if it exists in current directory
/// 2. `~/.config/keyring-gnome/keyring-gnome.toml` (XDG config directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("keyring-gnome.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("keyring-gnome").join("keyring-gnome.toml");
    }

    local_config
}

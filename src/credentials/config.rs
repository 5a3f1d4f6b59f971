//! Credential backend configuration.
//!
//! Selects a backend by its `backend` tag and builds it.

use serde::{Deserialize, Serialize};

use super::gnome_keyring::{GnomeKeyring, GnomeKeyringConfig};
use super::CredentialBackend;

/// Configuration for a credential backend.
///
/// # Example
///
/// ```toml
/// backend = "gnome-keyring"
/// display_name = "Mail password"
/// keyring = "login"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum CredentialConfig {
    /// GNOME Keyring through libgnome-keyring.
    GnomeKeyring {
        #[serde(flatten)]
        config: GnomeKeyringConfig,
    },
}

impl Default for CredentialConfig {
    fn default() -> Self {
        CredentialConfig::GnomeKeyring {
            config: GnomeKeyringConfig::default(),
        }
    }
}

impl CredentialConfig {
    /// Build a credential backend from this configuration.
    pub fn build(&self) -> Box<dyn CredentialBackend> {
        match self {
            CredentialConfig::GnomeKeyring { config } => Box::new(GnomeKeyring::new(config.clone())),
        }
    }
}

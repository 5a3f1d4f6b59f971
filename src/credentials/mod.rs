//! Credential backend abstraction.
//!
//! A backend stores passwords keyed by service and username. The registry
//! that chooses among backends asks each one whether it
//! [`is_supported`](CredentialBackend::is_supported) before using it.
//!
//! # Configuration
//!
//! The backend is selected by a `[credentials]` table in the config file:
//!
//! ```toml
//! [credentials]
//! backend = "gnome-keyring"
//! display_name = "Generic Password"
//! keyring = "login"
//! ```

mod config;
mod error;
pub mod gnome_keyring;

pub use config::CredentialConfig;
pub use error::{CredentialError, Result};
pub use gnome_keyring::{GnomeKeyring, GnomeKeyringConfig};

use secrecy::SecretString;

/// A password store keyed by service and username.
///
/// Every call is synchronous and may block on an external daemon.
pub trait CredentialBackend: Send + Sync {
    /// Short identifier, matching the `backend` config tag.
    fn name(&self) -> &'static str;

    /// Whether this backend can be used in the current environment.
    ///
    /// Callers are expected to check this and fall back to another backend
    /// instead of treating `false` as an error.
    fn is_supported(&self) -> bool {
        self.check_supported().is_ok()
    }

    /// Like [`is_supported`](Self::is_supported), but says why not.
    fn check_supported(&self) -> Result<()>;

    /// Retrieve a password.
    ///
    /// Returns `Ok(None)` if no password is stored.
    fn get_password(&self, service: &str, username: &str) -> Result<Option<SecretString>>;

    /// Store a password, replacing any existing one.
    fn set_password(&self, service: &str, username: &str, password: &SecretString) -> Result<()>;

    /// Delete a stored password.
    fn delete_password(&self, service: &str, username: &str) -> Result<()>;
}

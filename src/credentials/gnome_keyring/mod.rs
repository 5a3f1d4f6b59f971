//! GNOME Keyring credential backend.
//!
//! Stores `service + username → password` entries through the synchronous
//! "Simple Password Storage" API of `libgnome-keyring`, using the daemon's
//! network password schema (`server` and `user` attributes).
//!
//! The backend is only considered usable when the desktop session looks
//! like GNOME and the native library could be bound. Both checks run before
//! every operation; see [`GnomeKeyring::is_supported`].

mod attributes;
mod library;
mod memory;
mod result_code;

pub use attributes::{build_attributes, ArgType, AttributeKey, Attributes, VarArg, VarArgs};
pub use library::{
    global as global_library, is_available as is_library_available, LoadError, NativeLibrary,
    NativeOp, LIBRARY_NAMES,
};
pub use memory::{MemoryDaemon, MemoryItem};
pub use result_code::ResultCode;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{CredentialError, Result};
use super::CredentialBackend;

/// Display name given to items created by this backend.
pub const DEFAULT_DISPLAY_NAME: &str = "Generic Password";

/// Environment variable consulted to guess the desktop session.
pub const SESSION_VARIABLE: &str = "DESKTOP_SESSION";

/// Value of [`SESSION_VARIABLE`] that identifies a GNOME session.
pub const EXPECTED_SESSION: &str = "gnome";

/// Result of a find-password call.
#[derive(Debug)]
pub struct FoundPassword {
    /// Raw result code as returned by the daemon.
    pub code: i32,
    /// The secret, if the library handed one back.
    pub password: Option<SecretString>,
}

/// The Simple Password Storage calls, one method per native entry point.
///
/// Implementations receive the typed attribute list and return the raw
/// integer result code; interpreting it is left to [`GnomeKeyring`].
///
/// Attribute values are always strings. The daemon's network schema types
/// `port` as uint32, so [`NativeLibrary`] refuses a `port` attribute with
/// [`CredentialError::UnsupportedAttribute`] instead of passing a pointer
/// where a number is read.
pub trait PasswordApi: Send + Sync {
    /// `gnome_keyring_store_password_sync`. `keyring` of `None` selects the
    /// default keyring.
    fn store_password(
        &self,
        keyring: Option<&str>,
        display_name: &str,
        password: &str,
        attributes: &VarArgs,
    ) -> Result<i32>;

    /// `gnome_keyring_find_password_sync`.
    fn find_password(&self, attributes: &VarArgs) -> Result<FoundPassword>;

    /// `gnome_keyring_delete_password_sync`.
    fn delete_password(&self, attributes: &VarArgs) -> Result<i32>;
}

impl<T: PasswordApi + ?Sized> PasswordApi for &T {
    fn store_password(
        &self,
        keyring: Option<&str>,
        display_name: &str,
        password: &str,
        attributes: &VarArgs,
    ) -> Result<i32> {
        (**self).store_password(keyring, display_name, password, attributes)
    }

    fn find_password(&self, attributes: &VarArgs) -> Result<FoundPassword> {
        (**self).find_password(attributes)
    }

    fn delete_password(&self, attributes: &VarArgs) -> Result<i32> {
        (**self).delete_password(attributes)
    }
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

fn default_session_variable() -> String {
    SESSION_VARIABLE.to_string()
}

fn default_expected_session() -> String {
    EXPECTED_SESSION.to_string()
}

/// Configuration for the GNOME Keyring backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GnomeKeyringConfig {
    /// Label shown for new items in keyring managers such as Seahorse.
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Keyring to store new items in. `None` uses the default keyring.
    pub keyring: Option<String>,

    /// Environment variable holding the desktop session name.
    #[serde(default = "default_session_variable")]
    pub session_variable: String,

    /// Session name that must be present for the backend to be supported.
    #[serde(default = "default_expected_session")]
    pub expected_session: String,
}

impl Default for GnomeKeyringConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            keyring: None,
            session_variable: default_session_variable(),
            expected_session: default_expected_session(),
        }
    }
}

/// Whether the native side is usable.
#[derive(Clone)]
enum Binding {
    Bound(Arc<dyn PasswordApi>),
    Unavailable(String),
}

/// Credential backend backed by the GNOME Keyring daemon.
#[derive(Clone)]
pub struct GnomeKeyring {
    config: GnomeKeyringConfig,
    binding: Binding,
}

impl GnomeKeyring {
    /// Create a backend over the process-wide native library binding.
    ///
    /// The first call in a process attempts to load `libgnome-keyring`; a
    /// failure leaves the backend unsupported rather than erroring.
    pub fn new(config: GnomeKeyringConfig) -> Self {
        let binding = match library::global() {
            Ok(native) => Binding::Bound(Arc::new(native)),
            Err(err) => Binding::Unavailable(err.to_string()),
        };
        Self { config, binding }
    }

    /// Create a backend over an explicit [`PasswordApi`].
    pub fn with_api(config: GnomeKeyringConfig, api: Arc<dyn PasswordApi>) -> Self {
        Self {
            config,
            binding: Binding::Bound(api),
        }
    }

    /// Create a backend whose native side is known to be missing.
    pub fn unavailable(config: GnomeKeyringConfig, reason: impl Into<String>) -> Self {
        Self {
            config,
            binding: Binding::Unavailable(reason.into()),
        }
    }

    pub fn config(&self) -> &GnomeKeyringConfig {
        &self.config
    }

    /// True when the desktop session matches and the library is bound.
    pub fn is_supported(&self) -> bool {
        self.api().is_ok()
    }

    /// Like [`is_supported`](Self::is_supported), but says why not.
    pub fn check_supported(&self) -> Result<()> {
        self.api().map(|_| ())
    }

    fn check_session(&self) -> Result<()> {
        let found = std::env::var(&self.config.session_variable).ok();
        if found.as_deref() == Some(self.config.expected_session.as_str()) {
            return Ok(());
        }

        Err(CredentialError::SessionMismatch {
            variable: self.config.session_variable.clone(),
            expected: self.config.expected_session.clone(),
            found,
        })
    }

    fn api(&self) -> Result<&dyn PasswordApi> {
        self.check_session()?;
        match &self.binding {
            Binding::Bound(api) => Ok(api.as_ref()),
            Binding::Unavailable(reason) => Err(CredentialError::Unavailable(reason.clone())),
        }
    }

    /// Look up the password for `username` at `service`.
    ///
    /// Returns `Ok(None)` when no matching item exists.
    pub fn get_password(&self, service: &str, username: &str) -> Result<Option<SecretString>> {
        let api = self.api()?;
        let attributes = Attributes::for_credential(service, username).to_varargs();

        let found = api.find_password(&attributes)?;
        let code = ResultCode::classify(found.code)?;
        debug!(op = %NativeOp::FindPassword, service, result = %code, "gnome-keyring call returned");

        if code.is_not_found() {
            return Ok(None);
        }
        code.check()?;
        Ok(found.password)
    }

    /// Store or replace the password for `username` at `service`.
    pub fn set_password(&self, service: &str, username: &str, password: &SecretString) -> Result<()> {
        let api = self.api()?;
        let attributes = Attributes::for_credential(service, username).to_varargs();

        let code = api.store_password(
            self.config.keyring.as_deref(),
            &self.config.display_name,
            password.expose_secret(),
            &attributes,
        )?;
        let code = ResultCode::classify(code)?;
        debug!(op = %NativeOp::StorePassword, service, result = %code, "gnome-keyring call returned");

        code.check()
    }

    /// Delete the password for `username` at `service`.
    ///
    /// Unlike [`get_password`](Self::get_password), a missing item is an
    /// error: `Err(CredentialError::Failed(ResultCode::NotFound))`.
    pub fn delete_password(&self, service: &str, username: &str) -> Result<()> {
        let api = self.api()?;
        let attributes = Attributes::for_credential(service, username).to_varargs();

        let code = ResultCode::classify(api.delete_password(&attributes)?)?;
        debug!(op = %NativeOp::DeletePassword, service, result = %code, "gnome-keyring call returned");

        code.check()
    }
}

impl Default for GnomeKeyring {
    fn default() -> Self {
        Self::new(GnomeKeyringConfig::default())
    }
}

impl std::fmt::Debug for GnomeKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let binding = match &self.binding {
            Binding::Bound(_) => "bound",
            Binding::Unavailable(_) => "unavailable",
        };
        f.debug_struct("GnomeKeyring")
            .field("config", &self.config)
            .field("binding", &binding)
            .finish()
    }
}

impl CredentialBackend for GnomeKeyring {
    fn name(&self) -> &'static str {
        "gnome-keyring"
    }

    fn check_supported(&self) -> Result<()> {
        GnomeKeyring::check_supported(self)
    }

    fn get_password(&self, service: &str, username: &str) -> Result<Option<SecretString>> {
        GnomeKeyring::get_password(self, service, username)
    }

    fn set_password(&self, service: &str, username: &str, password: &SecretString) -> Result<()> {
        GnomeKeyring::set_password(self, service, username, password)
    }

    fn delete_password(&self, service: &str, username: &str) -> Result<()> {
        GnomeKeyring::delete_password(self, service, username)
    }
}

/// Whether the default GNOME Keyring backend is usable in this process.
pub fn is_supported() -> bool {
    GnomeKeyring::default().is_supported()
}

/// Serializes tests that write the environment against tests that call
/// `dlopen`, which reads it outside the standard library's lock.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::PoisonError;

    fn set_session(variable: &str, value: &str) {
        let _lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        std::env::set_var(variable, value);
    }

    fn config_with_variable(variable: &str) -> GnomeKeyringConfig {
        GnomeKeyringConfig {
            session_variable: variable.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unset_session_is_unsupported() {
        let keyring = GnomeKeyring::with_api(
            config_with_variable("KEYRING_GNOME_TEST_UNSET_SESSION"),
            Arc::new(MemoryDaemon::new()),
        );

        assert!(!keyring.is_supported());
        assert_eq!(
            keyring.check_supported(),
            Err(CredentialError::SessionMismatch {
                variable: "KEYRING_GNOME_TEST_UNSET_SESSION".to_string(),
                expected: "gnome".to_string(),
                found: None,
            })
        );
    }

    #[test]
    fn test_other_session_is_unsupported() {
        set_session("KEYRING_GNOME_TEST_KDE_SESSION", "plasma");
        let keyring = GnomeKeyring::with_api(
            config_with_variable("KEYRING_GNOME_TEST_KDE_SESSION"),
            Arc::new(MemoryDaemon::new()),
        );

        assert!(!keyring.is_supported());
        let err = keyring.get_password("example.com", "alice").unwrap_err();
        assert!(matches!(err, CredentialError::SessionMismatch { .. }));
    }

    #[test]
    fn test_gnome_session_with_api_is_supported() {
        set_session("KEYRING_GNOME_TEST_GNOME_SESSION", "gnome");
        let keyring = GnomeKeyring::with_api(
            config_with_variable("KEYRING_GNOME_TEST_GNOME_SESSION"),
            Arc::new(MemoryDaemon::new()),
        );

        assert!(keyring.is_supported());
    }

    #[test]
    fn test_unavailable_library_is_unsupported() {
        set_session("KEYRING_GNOME_TEST_NO_LIBRARY", "gnome");
        let keyring = GnomeKeyring::unavailable(
            config_with_variable("KEYRING_GNOME_TEST_NO_LIBRARY"),
            "libgnome-keyring.so: not found",
        );

        assert!(!keyring.is_supported());
        assert_eq!(
            keyring.delete_password("example.com", "alice"),
            Err(CredentialError::Unavailable(
                "libgnome-keyring.so: not found".to_string()
            ))
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = GnomeKeyringConfig::default();
        assert_eq!(config.display_name, "Generic Password");
        assert_eq!(config.keyring, None);
        assert_eq!(config.session_variable, "DESKTOP_SESSION");
        assert_eq!(config.expected_session, "gnome");
    }
}

use super::gnome_keyring::ResultCode;

/// Errors raised by credential backends.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    /// An attribute name outside the schema whitelist was supplied.
    #[error("Unsupported attribute \"{0}\"")]
    UnsupportedAttribute(String),

    /// The daemon answered with a non-OK result code.
    #[error("gnome-keyring failed: {0}")]
    Failed(ResultCode),

    /// The daemon answered with an integer outside the known result codes.
    #[error("gnome-keyring returned unknown result code {0}")]
    UnknownResultCode(i32),

    /// The native library could not be bound in this process.
    #[error("gnome-keyring is unavailable: {0}")]
    Unavailable(String),

    /// The desktop session heuristic did not match.
    #[error(
        "{variable}={} does not identify a {expected} desktop session",
        .found.as_deref().unwrap_or("unset")
    )]
    SessionMismatch {
        variable: String,
        expected: String,
        found: Option<String>,
    },

    /// A string bound for the C API contains a NUL byte.
    #[error("{field} contains an interior NUL byte")]
    InteriorNul { field: &'static str },

    /// The stored secret could not be decoded as UTF-8.
    #[error("gnome-keyring returned a password that is not valid UTF-8")]
    InvalidUtf8,
}

impl CredentialError {
    /// The daemon result code carried by a native-call failure.
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            CredentialError::Failed(code) => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T, E = CredentialError> = std::result::Result<T, E>;

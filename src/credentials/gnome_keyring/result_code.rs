//! Result codes returned by the Simple Password Storage calls.
//!
//! Mirrors `GnomeKeyringResult`. Callers only distinguish three outcomes
//! (ok, not found, everything else), but the full variant is kept so error
//! messages say exactly what the daemon reported.

use std::fmt;

use crate::credentials::error::{CredentialError, Result};

/// A `GnomeKeyringResult` value, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,
    Denied = 1,
    NoKeyringDaemon = 2,
    AlreadyUnlocked = 3,
    NoSuchKeyring = 4,
    BadArguments = 5,
    IoError = 6,
    Cancelled = 7,
    KeyringAlreadyExists = 8,
    NotFound = 9,
}

impl ResultCode {
    pub const ALL: [ResultCode; 10] = [
        ResultCode::Ok,
        ResultCode::Denied,
        ResultCode::NoKeyringDaemon,
        ResultCode::AlreadyUnlocked,
        ResultCode::NoSuchKeyring,
        ResultCode::BadArguments,
        ResultCode::IoError,
        ResultCode::Cancelled,
        ResultCode::KeyringAlreadyExists,
        ResultCode::NotFound,
    ];

    /// Map a raw integer from the native library to its variant.
    ///
    /// Anything outside `0..=9` means the library broke its contract and is
    /// reported as [`CredentialError::UnknownResultCode`].
    pub fn classify(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(CredentialError::UnknownResultCode(code))
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }

    pub fn is_not_found(self) -> bool {
        self == ResultCode::NotFound
    }

    /// Fail with [`CredentialError::Failed`] unless the code is OK.
    pub fn check(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(CredentialError::Failed(self))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResultCode::Ok => "ok",
            ResultCode::Denied => "denied",
            ResultCode::NoKeyringDaemon => "no_keyring_daemon",
            ResultCode::AlreadyUnlocked => "already_unlocked",
            ResultCode::NoSuchKeyring => "no_such_keyring",
            ResultCode::BadArguments => "bad_arguments",
            ResultCode::IoError => "io_error",
            ResultCode::Cancelled => "cancelled",
            ResultCode::KeyringAlreadyExists => "keyring_already_exists",
            ResultCode::NotFound => "not_found",
        }
    }
}

impl TryFrom<i32> for ResultCode {
    type Error = CredentialError;

    fn try_from(code: i32) -> Result<Self> {
        Self::classify(code)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_follows_declaration_order() {
        let names = [
            "ok",
            "denied",
            "no_keyring_daemon",
            "already_unlocked",
            "no_such_keyring",
            "bad_arguments",
            "io_error",
            "cancelled",
            "keyring_already_exists",
            "not_found",
        ];

        for (code, name) in (0..).zip(names) {
            let result = ResultCode::classify(code).unwrap();
            assert_eq!(result.code(), code);
            assert_eq!(result.name(), name);
        }
    }

    #[test]
    fn test_predicates() {
        for code in 0..10 {
            let result = ResultCode::classify(code).unwrap();
            assert_eq!(result.is_ok(), code == 0, "is_ok for {code}");
            assert_eq!(result.is_not_found(), code == 9, "is_not_found for {code}");
        }
    }

    #[test]
    fn test_classify_rejects_out_of_range() {
        assert_eq!(
            ResultCode::classify(10),
            Err(CredentialError::UnknownResultCode(10))
        );
        assert_eq!(
            ResultCode::try_from(-1),
            Err(CredentialError::UnknownResultCode(-1))
        );
    }

    #[test]
    fn test_check() {
        assert!(ResultCode::Ok.check().is_ok());

        let err = ResultCode::Denied.check().unwrap_err();
        assert_eq!(err.result_code(), Some(ResultCode::Denied));
        assert_eq!(err.to_string(), "gnome-keyring failed: denied");

        let err = ResultCode::NotFound.check().unwrap_err();
        assert_eq!(err, CredentialError::Failed(ResultCode::NotFound));
    }
}

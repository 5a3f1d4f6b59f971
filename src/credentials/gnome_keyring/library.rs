//! Runtime binding to `libgnome-keyring`.
//!
//! The library is opened with `dlopen` rather than linked, so a missing
//! library only makes the backend unavailable instead of failing process
//! startup. Binding happens once per process ([`global`]); a failure is
//! recorded and never retried.
//!
//! Only the synchronous "Simple Password Storage" calls are bound. The
//! asynchronous API needs C callbacks and is not used.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::fmt;
use std::ptr;
use std::sync::OnceLock;

use secrecy::SecretString;
use tracing::{debug, info};

use super::attributes::{AttributeKey, VarArg, VarArgs};
use super::result_code::ResultCode;
use super::{FoundPassword, PasswordApi};
use crate::credentials::error::{CredentialError, Result};

/// Names tried in order. Debian-like systems only ship the `.0` soname.
pub const LIBRARY_NAMES: [&str; 2] = ["libgnome-keyring.so", "libgnome-keyring.so.0"];

/// Exported `const GnomeKeyringPasswordSchema *` for network passwords.
const NETWORK_PASSWORD_SCHEMA: &CStr = c"GNOME_KEYRING_NETWORK_PASSWORD";

/// Opaque `GnomeKeyringPasswordSchema`.
#[repr(C)]
pub struct PasswordSchema {
    _private: [u8; 0],
}

type StorePasswordFn = unsafe extern "C" fn(
    schema: *const PasswordSchema,
    keyring: *const c_char,
    display_name: *const c_char,
    password: *const c_char,
    ...
) -> c_int;

type FindPasswordFn =
    unsafe extern "C" fn(schema: *const PasswordSchema, password: *mut *mut c_char, ...) -> c_int;

type DeletePasswordFn = unsafe extern "C" fn(schema: *const PasswordSchema, ...) -> c_int;

type FreePasswordFn = unsafe extern "C" fn(password: *mut c_char);

/// Native entry points, one per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    StorePassword,
    FindPassword,
    DeletePassword,
    FreePassword,
}

impl NativeOp {
    pub const ALL: [NativeOp; 4] = [
        NativeOp::StorePassword,
        NativeOp::FindPassword,
        NativeOp::DeletePassword,
        NativeOp::FreePassword,
    ];

    pub fn symbol(self) -> &'static CStr {
        match self {
            NativeOp::StorePassword => c"gnome_keyring_store_password_sync",
            NativeOp::FindPassword => c"gnome_keyring_find_password_sync",
            NativeOp::DeletePassword => c"gnome_keyring_delete_password_sync",
            NativeOp::FreePassword => c"gnome_keyring_free_password",
        }
    }
}

impl fmt::Display for NativeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol().to_string_lossy())
    }
}

/// Why the library could not be bound.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("could not load libgnome-keyring ({})", .attempts.join("; "))]
pub struct LoadError {
    attempts: Vec<String>,
}

impl LoadError {
    /// One `name: loader message` entry per library name tried.
    pub fn attempts(&self) -> &[String] {
        &self.attempts
    }
}

/// A bound copy of `libgnome-keyring`.
pub struct NativeLibrary {
    handle: *mut c_void,
    name: String,
    schema: *const PasswordSchema,
    store_password: StorePasswordFn,
    find_password: FindPasswordFn,
    delete_password: DeletePasswordFn,
    free_password: FreePasswordFn,
}

// The handle, schema and function pointers are immutable after binding and
// the library's sync calls are safe to issue from any thread.
unsafe impl Send for NativeLibrary {}

unsafe impl Sync for NativeLibrary {}

impl NativeLibrary {
    /// Open the first library name that loads and exports every entry point.
    pub fn open<S: AsRef<str>>(names: &[S]) -> Result<Self, LoadError> {
        let mut attempts = Vec::new();

        for name in names {
            let name = name.as_ref();
            match Self::open_one(name) {
                Ok(library) => return Ok(library),
                Err(message) => attempts.push(format!("{name}: {message}")),
            }
        }

        Err(LoadError { attempts })
    }

    fn open_one(name: &str) -> Result<Self, String> {
        let handle = dl_open(name)?;

        // SAFETY: `handle` was just returned by a successful dlopen.
        match unsafe { Self::bind(handle, name) } {
            Ok(library) => Ok(library),
            Err(message) => {
                // SAFETY: nothing bound from `handle` escapes a failed bind.
                unsafe { libc::dlclose(handle) };
                Err(message)
            }
        }
    }

    /// Resolve every symbol from an open handle.
    ///
    /// # Safety
    ///
    /// `handle` must be a live handle returned by `dlopen` for a library
    /// exporting the GNOME Keyring ABI.
    unsafe fn bind(handle: *mut c_void, name: &str) -> Result<Self, String> {
        let store_password = dl_sym(handle, NativeOp::StorePassword.symbol())?;
        let find_password = dl_sym(handle, NativeOp::FindPassword.symbol())?;
        let delete_password = dl_sym(handle, NativeOp::DeletePassword.symbol())?;
        let free_password = dl_sym(handle, NativeOp::FreePassword.symbol())?;

        // The exported symbol is a pointer variable; read its value once.
        let schema_var = dl_sym(handle, NETWORK_PASSWORD_SCHEMA)? as *const *const PasswordSchema;
        let schema = ptr::read(schema_var);
        if schema.is_null() {
            return Err(format!(
                "{} is NULL",
                NETWORK_PASSWORD_SCHEMA.to_string_lossy()
            ));
        }

        Ok(Self {
            handle,
            name: name.to_string(),
            schema,
            store_password: std::mem::transmute::<*mut c_void, StorePasswordFn>(store_password),
            find_password: std::mem::transmute::<*mut c_void, FindPasswordFn>(find_password),
            delete_password: std::mem::transmute::<*mut c_void, DeletePasswordFn>(
                delete_password,
            ),
            free_password: std::mem::transmute::<*mut c_void, FreePasswordFn>(free_password),
        })
    }

    /// The library name that was opened.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        // SAFETY: the function pointers die with `self`.
        unsafe { libc::dlclose(self.handle) };
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

static LIBRARY: OnceLock<Result<NativeLibrary, LoadError>> = OnceLock::new();

/// The process-wide binding, attempted on first use and cached.
pub fn global() -> Result<&'static NativeLibrary, &'static LoadError> {
    LIBRARY
        .get_or_init(|| {
            let result = NativeLibrary::open(&LIBRARY_NAMES);
            match &result {
                Ok(library) => debug!(library = library.name(), "Bound gnome-keyring"),
                Err(err) => info!(error = %err, "gnome-keyring backend unavailable"),
            }
            result
        })
        .as_ref()
}

/// Whether the native library is bound in this process.
pub fn is_available() -> bool {
    global().is_ok()
}

fn dl_open(name: &str) -> Result<*mut c_void, String> {
    let c_name = CString::new(name).map_err(|e| e.to_string())?;
    // SAFETY: `c_name` is NUL-terminated and outlives the call.
    let handle = unsafe { libc::dlopen(c_name.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
    if handle.is_null() {
        Err(dl_error())
    } else {
        Ok(handle)
    }
}

fn dl_sym(handle: *mut c_void, symbol: &CStr) -> Result<*mut c_void, String> {
    // SAFETY: `handle` is live and `symbol` is NUL-terminated. dlerror is
    // cleared first so a NULL result can be attributed to this lookup.
    let address = unsafe {
        libc::dlerror();
        libc::dlsym(handle, symbol.as_ptr())
    };
    if address.is_null() {
        Err(dl_error())
    } else {
        Ok(address)
    }
}

fn dl_error() -> String {
    // SAFETY: dlerror returns NULL or a NUL-terminated, thread-local message.
    unsafe {
        let message = libc::dlerror();
        if message.is_null() {
            "unknown dynamic loader error".to_string()
        } else {
            CStr::from_ptr(message).to_string_lossy().into_owned()
        }
    }
}

/// Room for every whitelisted attribute plus the terminator.
const MAX_VARARGS: usize = 2 * AttributeKey::ALL.len() + 1;

const _: () = assert!(MAX_VARARGS == 11);

/// Varargs lowered to C pointers.
///
/// Unused trailing slots stay NULL. They are passed after the terminator,
/// where the callee never reads them.
struct LoweredArgs {
    _strings: Vec<CString>,
    slots: [*const c_char; MAX_VARARGS],
}

fn lower(args: &VarArgs) -> Result<LoweredArgs> {
    if args.len() > MAX_VARARGS {
        return Err(CredentialError::Failed(ResultCode::BadArguments));
    }

    // The network schema declares `port` as uint32; every slot here is a
    // string, so the library would read the pointer as the port number.
    let port = AttributeKey::Port.as_str();
    if args.iter().step_by(2).any(|arg| matches!(arg, VarArg::Str(key) if key == port)) {
        return Err(CredentialError::UnsupportedAttribute(port.to_string()));
    }

    let mut strings = Vec::with_capacity(args.len());
    let mut slots = [ptr::null(); MAX_VARARGS];

    for (slot, arg) in slots.iter_mut().zip(args) {
        *slot = match arg {
            VarArg::Str(value) => {
                let value = to_cstring(value, "attribute")?;
                let pointer = value.as_ptr();
                strings.push(value);
                pointer
            }
            // Pointer-width so the terminator is read back as a NULL char*.
            VarArg::Int(value) => *value as isize as *const c_char,
        };
    }

    Ok(LoweredArgs {
        _strings: strings,
        slots,
    })
}

fn to_cstring(value: &str, field: &'static str) -> Result<CString> {
    CString::new(value).map_err(|_| CredentialError::InteriorNul { field })
}

/// Call a variadic entry point with the fixed arguments followed by every
/// lowered slot.
macro_rules! call_with_varargs {
    ($function:expr, ($($fixed:expr),*), $slots:expr) => {{
        let s = $slots;
        ($function)(
            $($fixed,)*
            s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7], s[8], s[9], s[10]
        )
    }};
}

impl PasswordApi for NativeLibrary {
    fn store_password(
        &self,
        keyring: Option<&str>,
        display_name: &str,
        password: &str,
        attributes: &VarArgs,
    ) -> Result<i32> {
        let keyring = keyring.map(|name| to_cstring(name, "keyring")).transpose()?;
        let display_name = to_cstring(display_name, "display name")?;
        let password = to_cstring(password, "password")?;
        let args = lower(attributes)?;

        let keyring_ptr = keyring.as_ref().map_or(ptr::null(), |name| name.as_ptr());

        // SAFETY: every pointer refers to a NUL-terminated string that lives
        // until the call returns, and the attribute list is NULL-terminated.
        let code = unsafe {
            call_with_varargs!(
                self.store_password,
                (self.schema, keyring_ptr, display_name.as_ptr(), password.as_ptr()),
                args.slots
            )
        };
        Ok(code)
    }

    fn find_password(&self, attributes: &VarArgs) -> Result<FoundPassword> {
        let args = lower(attributes)?;
        let mut out: *mut c_char = ptr::null_mut();
        let out_ptr: *mut *mut c_char = &mut out;

        // SAFETY: as for store; `out_ptr` points at a local the callee may
        // fill with a library-owned string.
        let code = unsafe { call_with_varargs!(self.find_password, (self.schema, out_ptr), args.slots) };

        if out.is_null() {
            return Ok(FoundPassword {
                code,
                password: None,
            });
        }

        // SAFETY: a non-NULL result is a NUL-terminated string owned by the
        // library until it is handed back to gnome_keyring_free_password.
        let decoded = unsafe { CStr::from_ptr(out) }
            .to_str()
            .map(|value| SecretString::from(value.to_owned()));
        unsafe { (self.free_password)(out) };

        Ok(FoundPassword {
            code,
            password: Some(decoded.map_err(|_| CredentialError::InvalidUtf8)?),
        })
    }

    fn delete_password(&self, attributes: &VarArgs) -> Result<i32> {
        let args = lower(attributes)?;

        // SAFETY: as for store.
        let code = unsafe { call_with_varargs!(self.delete_password, (self.schema), args.slots) };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::gnome_keyring::attributes::Attributes;
    use crate::credentials::gnome_keyring::ENV_LOCK;
    use std::sync::PoisonError;

    #[test]
    fn test_open_missing_library_lists_every_attempt() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let err = NativeLibrary::open(&["libdoes-not-exist.so", "libdoes-not-exist.so.0"])
            .unwrap_err();

        assert_eq!(err.attempts().len(), 2);
        assert!(err.attempts()[0].starts_with("libdoes-not-exist.so:"));
        assert!(err.attempts()[1].starts_with("libdoes-not-exist.so.0:"));
        assert!(err.to_string().starts_with("could not load libgnome-keyring"));
    }

    #[test]
    fn test_open_library_without_keyring_symbols() {
        // libc is always present but exports none of the keyring symbols.
        let _lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let err = NativeLibrary::open(&["libc.so.6"]).unwrap_err();

        assert_eq!(err.attempts().len(), 1);
        assert!(err.attempts()[0].starts_with("libc.so.6:"));
    }

    #[test]
    fn test_symbols_are_distinct() {
        for (i, a) in NativeOp::ALL.iter().enumerate() {
            for b in &NativeOp::ALL[i + 1..] {
                assert_ne!(a.symbol(), b.symbol());
            }
        }
        assert_eq!(
            NativeOp::FindPassword.to_string(),
            "gnome_keyring_find_password_sync"
        );
    }

    #[test]
    fn test_lower_terminates_with_null() {
        let args = Attributes::for_credential("example.com", "alice").to_varargs();
        let lowered = lower(&args).unwrap();

        assert!(!lowered.slots[0].is_null());
        assert!(!lowered.slots[3].is_null());
        assert!(lowered.slots[4].is_null());

        // SAFETY: slots 0..4 point into `lowered._strings`.
        let key = unsafe { CStr::from_ptr(lowered.slots[2]) };
        let value = unsafe { CStr::from_ptr(lowered.slots[3]) };
        assert_eq!(key.to_str().unwrap(), "user");
        assert_eq!(value.to_str().unwrap(), "alice");
    }

    #[test]
    fn test_lower_rejects_interior_nul() {
        let args = Attributes::for_credential("exa\0mple.com", "alice").to_varargs();

        assert_eq!(
            lower(&args).err(),
            Some(CredentialError::InteriorNul { field: "attribute" })
        );
    }

    #[test]
    fn test_lower_rejects_port_attribute() {
        let args = Attributes::for_credential("example.com", "alice")
            .with(AttributeKey::Port, 8080)
            .to_varargs();

        assert_eq!(
            lower(&args).err(),
            Some(CredentialError::UnsupportedAttribute("port".to_string()))
        );
    }

    #[test]
    fn test_lower_accepts_port_as_value() {
        let args = Attributes::for_credential("port", "port").to_varargs();

        assert!(lower(&args).is_ok());
    }
}

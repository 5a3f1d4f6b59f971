//! In-memory stand-in for the keyring daemon, for tests and demos.
//!
//! Speaks the same [`PasswordApi`] contract as the native library: it
//! decodes the varargs list, matches items by attribute subset like
//! `gnome_keyring_find_password_sync`, and answers with raw result codes.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use secrecy::SecretString;

use super::attributes::VarArgs;
use super::result_code::ResultCode;
use super::{FoundPassword, PasswordApi};
use crate::credentials::error::Result;

/// Metadata of an item held by [`MemoryDaemon`]. The password is not exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryItem {
    pub keyring: Option<String>,
    pub display_name: String,
    pub attributes: BTreeMap<String, String>,
}

struct StoredItem {
    item: MemoryItem,
    password: String,
}

/// In-memory keyring daemon.
pub struct MemoryDaemon {
    items: Mutex<Vec<StoredItem>>,
    scripted: Mutex<VecDeque<i32>>,
}

impl MemoryDaemon {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Make the next call fail with `code` without touching any item.
    pub fn fail_next(&self, code: ResultCode) {
        self.respond_next(code.code());
    }

    /// Make the next call return the raw integer `code`, known or not.
    pub fn respond_next(&self, code: i32) {
        self.scripted
            .lock()
            .expect("scripted response lock poisoned")
            .push_back(code);
    }

    /// Snapshot of the stored items, in insertion order.
    pub fn items(&self) -> Vec<MemoryItem> {
        self.items
            .lock()
            .expect("item lock poisoned")
            .iter()
            .map(|stored| stored.item.clone())
            .collect()
    }

    fn scripted_response(&self) -> Option<i32> {
        self.scripted
            .lock()
            .expect("scripted response lock poisoned")
            .pop_front()
    }
}

impl Default for MemoryDaemon {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a varargs list into an attribute map.
fn decode(attributes: &VarArgs) -> Option<BTreeMap<String, String>> {
    attributes.pairs().map(|pairs| {
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    })
}

fn is_match(item: &BTreeMap<String, String>, query: &BTreeMap<String, String>) -> bool {
    query
        .iter()
        .all(|(key, value)| item.get(key) == Some(value))
}

impl PasswordApi for MemoryDaemon {
    fn store_password(
        &self,
        keyring: Option<&str>,
        display_name: &str,
        password: &str,
        attributes: &VarArgs,
    ) -> Result<i32> {
        if let Some(code) = self.scripted_response() {
            return Ok(code);
        }
        let Some(attributes) = decode(attributes) else {
            return Ok(ResultCode::BadArguments.code());
        };

        let item = MemoryItem {
            keyring: keyring.map(str::to_string),
            display_name: display_name.to_string(),
            attributes,
        };
        let mut items = self.items.lock().expect("item lock poisoned");

        // Same keyring and same attribute set updates the existing item.
        match items.iter_mut().find(|stored| {
            stored.item.keyring == item.keyring && stored.item.attributes == item.attributes
        }) {
            Some(stored) => {
                stored.item.display_name = item.display_name;
                stored.password = password.to_string();
            }
            None => items.push(StoredItem {
                item,
                password: password.to_string(),
            }),
        }

        Ok(ResultCode::Ok.code())
    }

    fn find_password(&self, attributes: &VarArgs) -> Result<FoundPassword> {
        if let Some(code) = self.scripted_response() {
            return Ok(FoundPassword {
                code,
                password: None,
            });
        }
        let Some(query) = decode(attributes) else {
            return Ok(FoundPassword {
                code: ResultCode::BadArguments.code(),
                password: None,
            });
        };

        let items = self.items.lock().expect("item lock poisoned");
        let found = match items
            .iter()
            .find(|stored| is_match(&stored.item.attributes, &query))
        {
            Some(stored) => FoundPassword {
                code: ResultCode::Ok.code(),
                password: Some(SecretString::from(stored.password.clone())),
            },
            None => FoundPassword {
                code: ResultCode::NotFound.code(),
                password: None,
            },
        };
        Ok(found)
    }

    fn delete_password(&self, attributes: &VarArgs) -> Result<i32> {
        if let Some(code) = self.scripted_response() {
            return Ok(code);
        }
        let Some(query) = decode(attributes) else {
            return Ok(ResultCode::BadArguments.code());
        };

        let mut items = self.items.lock().expect("item lock poisoned");
        match items
            .iter()
            .position(|stored| is_match(&stored.item.attributes, &query))
        {
            Some(index) => {
                items.remove(index);
                Ok(ResultCode::Ok.code())
            }
            None => Ok(ResultCode::NotFound.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::gnome_keyring::Attributes;
    use secrecy::ExposeSecret;

    #[test]
    fn test_store_replaces_matching_item() {
        let daemon = MemoryDaemon::new();
        let args = Attributes::for_credential("example.com", "alice").to_varargs();

        assert_eq!(daemon.store_password(None, "first", "one", &args), Ok(0));
        assert_eq!(daemon.store_password(None, "second", "two", &args), Ok(0));

        let items = daemon.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].display_name, "second");

        let found = daemon.find_password(&args).unwrap();
        assert_eq!(found.code, 0);
        assert_eq!(found.password.unwrap().expose_secret(), "two");
    }

    #[test]
    fn test_find_matches_attribute_subset() {
        let daemon = MemoryDaemon::new();
        let stored = Attributes::for_credential("example.com", "alice")
            .with(crate::credentials::gnome_keyring::AttributeKey::Protocol, "https")
            .to_varargs();
        daemon.store_password(Some("login"), "x", "secret", &stored).unwrap();

        let query = Attributes::for_credential("example.com", "alice").to_varargs();
        let found = daemon.find_password(&query).unwrap();
        assert_eq!(found.code, ResultCode::Ok.code());

        let other = Attributes::for_credential("example.com", "bob").to_varargs();
        let found = daemon.find_password(&other).unwrap();
        assert_eq!(found.code, ResultCode::NotFound.code());
        assert!(found.password.is_none());
    }

    #[test]
    fn test_scripted_response_is_consumed_once() {
        let daemon = MemoryDaemon::new();
        let args = Attributes::for_credential("example.com", "alice").to_varargs();

        daemon.fail_next(ResultCode::Denied);
        assert_eq!(daemon.delete_password(&args), Ok(ResultCode::Denied.code()));
        assert_eq!(daemon.delete_password(&args), Ok(ResultCode::NotFound.code()));
    }
}

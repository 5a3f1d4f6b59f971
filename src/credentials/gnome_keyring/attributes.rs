//! Attribute marshaling for the network password schema.
//!
//! The Simple Password Storage calls take their attributes as C varargs:
//! `key, value, key, value, ..., NULL`. This module builds that list as
//! plain data ([`VarArgs`]) so it can be inspected and tested without
//! touching the native library. Lowering to raw pointers happens only in
//! [`super::library`].

use std::fmt;
use std::str::FromStr;

use crate::credentials::error::{CredentialError, Result};

/// Attribute names accepted by the `GNOME_KEYRING_NETWORK_PASSWORD` schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    Server,
    Domain,
    User,
    Port,
    Protocol,
}

impl AttributeKey {
    pub const ALL: [AttributeKey; 5] = [
        AttributeKey::Server,
        AttributeKey::Domain,
        AttributeKey::User,
        AttributeKey::Port,
        AttributeKey::Protocol,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttributeKey::Server => "server",
            AttributeKey::Domain => "domain",
            AttributeKey::User => "user",
            AttributeKey::Port => "port",
            AttributeKey::Protocol => "protocol",
        }
    }
}

impl FromStr for AttributeKey {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| CredentialError::UnsupportedAttribute(s.to_string()))
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered attribute set for one call.
///
/// Keeps insertion order. Re-inserting a key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(AttributeKey, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `{server, user}` pair every credential operation uses.
    pub fn for_credential(service: &str, username: &str) -> Self {
        Self::new()
            .with(AttributeKey::Server, service)
            .with(AttributeKey::User, username)
    }

    /// Validate attribute names against the schema whitelist.
    pub fn try_from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let mut attributes = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref().parse::<AttributeKey>()?;
            attributes.insert(key, value);
        }
        Ok(attributes)
    }

    pub fn with(mut self, key: AttributeKey, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: AttributeKey, value: impl ToString) {
        let value = value.to_string();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: AttributeKey) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeKey, &str)> {
        self.entries.iter().map(|(key, value)| (*key, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as `key, value, ..., NULL`.
    pub fn to_varargs(&self) -> VarArgs {
        let mut args = Vec::with_capacity(2 * self.entries.len() + 1);
        for (key, value) in &self.entries {
            args.push(VarArg::Str(key.as_str().to_string()));
            args.push(VarArg::Str(value.clone()));
        }
        args.push(VarArg::SENTINEL);
        VarArgs(args)
    }
}

/// Build the typed varargs list for a mapping of attribute names to values.
///
/// Fails with [`CredentialError::UnsupportedAttribute`] on the first name
/// outside the schema whitelist.
pub fn build_attributes<I, K, V>(pairs: I) -> Result<VarArgs>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: ToString,
{
    Attributes::try_from_pairs(pairs).map(|attributes| attributes.to_varargs())
}

/// C type of a vararg slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Int,
}

/// One typed vararg slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarArg {
    Str(String),
    Int(i32),
}

impl VarArg {
    /// Terminates every attribute list.
    pub const SENTINEL: VarArg = VarArg::Int(0);

    pub fn arg_type(&self) -> ArgType {
        match self {
            VarArg::Str(_) => ArgType::String,
            VarArg::Int(_) => ArgType::Int,
        }
    }
}

/// A NULL-terminated attribute list ready to be lowered for a native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarArgs(Vec<VarArg>);

impl VarArgs {
    pub fn as_slice(&self) -> &[VarArg] {
        &self.0
    }

    /// Number of slots, sentinel included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of positions once every slot is written as `type, value`.
    pub fn flattened_len(&self) -> usize {
        2 * self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VarArg> {
        self.0.iter()
    }

    /// Read the `key, value` pairs back up to the sentinel.
    ///
    /// Returns `None` if the list is not a well-formed string-pair sequence
    /// terminated by `Int(0)`.
    pub fn pairs(&self) -> Option<Vec<(&str, &str)>> {
        let (last, body) = self.0.split_last()?;
        if *last != VarArg::SENTINEL || body.len() % 2 != 0 {
            return None;
        }

        body.chunks_exact(2)
            .map(|pair| match pair {
                [VarArg::Str(key), VarArg::Str(value)] => Some((key.as_str(), value.as_str())),
                _ => None,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a VarArgs {
    type Item = &'a VarArg;
    type IntoIter = std::slice::Iter<'a, VarArg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

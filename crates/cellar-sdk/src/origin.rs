//! Resolution of the key a store is retrieved under.
//!
//! Callers name their store in one of three ways: a literal key, a closure
//! producing one, or an object that knows its own storage key (see
//! [`KeyProvider`]). All of them resolve to a non-empty origin string.

use std::fmt;

use crate::error::{CellarError, CellarResult};

/// A storage key as exposed by a [`KeyProvider`].
pub enum StorageKey<'a> {
    Literal(String),
    Producer(Box<dyn Fn() -> String + 'a>),
}

/// Implemented by application objects that own a store.
///
/// # Examples
///
/// ```
/// use cellar_sdk::{KeyProvider, StorageKey};
///
/// struct Character { id: u32 }
///
/// impl KeyProvider for Character {
///     fn storage_key(&self) -> Option<StorageKey<'_>> {
///         Some(StorageKey::Producer(Box::new(move || format!("character-{}", self.id))))
///     }
/// }
/// ```
pub trait KeyProvider {
    /// The key of this object's store, or `None` if it has none.
    fn storage_key(&self) -> Option<StorageKey<'_>>;
}

/// Where a store's origin comes from.
pub enum KeySource<'a> {
    Key(String),
    Producer(Box<dyn Fn() -> String + 'a>),
    Provider(&'a dyn KeyProvider),
}

impl<'a> KeySource<'a> {
    pub fn producer(f: impl Fn() -> String + 'a) -> Self {
        Self::Producer(Box::new(f))
    }

    pub fn provider(p: &'a dyn KeyProvider) -> Self {
        Self::Provider(p)
    }

    /// Resolve to an origin string.
    ///
    /// Fails with [`CellarError::InvalidOrigin`] when a provider exposes no
    /// key or when the resolved key is empty.
    pub fn resolve(self) -> CellarResult<String> {
        let (kind, key) = match self {
            Self::Key(key) => ("literal key", key),
            Self::Producer(f) => ("key producer", f()),
            Self::Provider(p) => match p.storage_key() {
                Some(StorageKey::Literal(key)) => ("provider key", key),
                Some(StorageKey::Producer(f)) => ("provider key producer", f()),
                None => {
                    return Err(CellarError::InvalidOrigin(
                        "key provider exposes no storage key".into(),
                    ))
                }
            },
        };
        if key.is_empty() {
            return Err(CellarError::InvalidOrigin(format!("{kind} resolved to an empty key")));
        }
        Ok(key)
    }
}

impl From<&str> for KeySource<'_> {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for KeySource<'_> {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<&String> for KeySource<'_> {
    fn from(key: &String) -> Self {
        Self::Key(key.clone())
    }
}

impl<'a> From<&'a dyn KeyProvider> for KeySource<'a> {
    fn from(p: &'a dyn KeyProvider) -> Self {
        Self::Provider(p)
    }
}

impl fmt::Debug for KeySource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

//! Key persistence boundary.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{
    error::{Error, Result},
    key::{KeyRef, Ski},
};

/// Storage for keys, addressed by SKI.
///
/// A read-only store rejects [KeyStore::store_key] with [Error::ReadOnlyStoreViolation] and is
/// left unchanged.
pub trait KeyStore: Send + Sync {
    fn read_only(&self) -> bool;

    fn get_key(&self, ski: &Ski) -> Result<KeyRef>;

    /// Store a key under its SKI. Storing a second key under the same SKI replaces the first.
    fn store_key(&self, key: KeyRef) -> Result<()>;
}

/// Process-local key store.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<Ski, KeyRef>>,
    read_only: bool,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-only store serving a fixed set of keys.
    pub fn sealed(keys: impl IntoIterator<Item = KeyRef>) -> Self {
        Self {
            keys: RwLock::new(keys.into_iter().map(|k| (k.ski().clone(), k)).collect()),
            read_only: true,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn read_only(&self) -> bool {
        self.read_only
    }

    fn get_key(&self, ski: &Ski) -> Result<KeyRef> {
        self.keys
            .read()
            .get(ski)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(ski.clone()))
    }

    fn store_key(&self, key: KeyRef) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnlyStoreViolation);
        }
        tracing::trace!(ski = %key.ski(), "storing key");
        self.keys.write().insert(key.ski().clone(), key);
        Ok(())
    }
}

/// A read-only store that holds nothing. Suitable for providers that only handle ephemeral keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyKeyStore;

impl KeyStore for DummyKeyStore {
    fn read_only(&self) -> bool {
        true
    }

    fn get_key(&self, ski: &Ski) -> Result<KeyRef> {
        Err(Error::KeyNotFound(ski.clone()))
    }

    fn store_key(&self, _key: KeyRef) -> Result<()> {
        Err(Error::ReadOnlyStoreViolation)
    }
}

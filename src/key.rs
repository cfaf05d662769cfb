//! Opaque key handles and their subject key identifiers.

use core::{any::Any, fmt};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Subject key identifier. A stable handle for a key that does not expose its material.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ski(Vec<u8>);

impl Ski {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// SKI of a key given its canonical public encoding (or raw bytes, for symmetric keys).
    pub fn from_public_bytes(encoding: &[u8]) -> Self {
        Self(Sha256::digest(encoding).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Ski {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Ski {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Ski {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ski({self})")
    }
}

/// A key held by a provider.
///
/// Implementations are immutable once constructed. Asymmetric private keys own their public
/// half, which is returned by [Key::public_key].
pub trait Key: fmt::Debug + Send + Sync + 'static {
    /// Raw encoding of the key. Fails with [Error::UnsupportedKeyOperation] for private
    /// material that is not exportable.
    fn bytes(&self) -> Result<Vec<u8>>;

    fn ski(&self) -> &Ski;

    fn symmetric(&self) -> bool;

    fn private(&self) -> bool;

    /// Public half of an asymmetric key pair. Fails with [Error::UnsupportedKeyOperation] for
    /// symmetric keys.
    fn public_key(&self) -> Result<KeyRef>;

    fn as_any(&self) -> &dyn Any;
}

pub type KeyRef = Arc<dyn Key>;

/// Resolve a key handle to the concrete type an algorithm handler works with.
pub fn downcast<K: Key>(key: &dyn Key) -> Result<&K> {
    key.as_any()
        .downcast_ref::<K>()
        .ok_or(Error::UnsupportedKeyOperation("key type does not match the algorithm"))
}
